// self
use crate::obs::HeaderOutcome;

/// Records a header retrieval outcome via the global metrics recorder (when enabled).
pub fn record_header_outcome(outcome: HeaderOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("issuer_token_provider_header_total", "outcome" => outcome.as_str())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}
