// self
use crate::{_prelude::*, obs::HeaderOutcome};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedHeader<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedHeader<F> = F;

/// Span wrapped around a single header retrieval.
#[derive(Clone, Debug)]
pub struct HeaderSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl HeaderSpan {
	/// Creates a new span tagged with the provided stage.
	pub fn new(stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!("issuer_token_provider.header", stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = stage;

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedHeader<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a `debug` event for a cache decision. Never records token material.
pub fn trace_cache_decision(outcome: HeaderOutcome, expires_at: Option<OffsetDateTime>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(outcome = outcome.as_str(), ?expires_at, "token cache decision");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (outcome, expires_at);
	}
}

/// Emits a `debug` event before the issuer is contacted.
pub fn trace_refresh_start(issuer: Option<&Url>, scope: Option<&str>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(issuer = issuer.map(Url::as_str), scope, "requesting token from issuer");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (issuer, scope);
	}
}
