//! Optional observability helpers for header retrieval.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to run every retrieval inside an `issuer_token_provider.header` span
//!   with a `stage` field, plus `debug` events for cache hits and refreshes.
//! - Enable `metrics` to increment the `issuer_token_provider_header_total` counter for
//!   every attempt/cache hit/refresh/failure, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each header retrieval.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeaderOutcome {
	/// Entry to header retrieval.
	Attempt,
	/// Cached token was still valid.
	CacheHit,
	/// A new token was obtained from the issuer.
	Refreshed,
	/// Failure propagated back to the caller.
	Failure,
}
impl HeaderOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			HeaderOutcome::Attempt => "attempt",
			HeaderOutcome::CacheHit => "cache_hit",
			HeaderOutcome::Refreshed => "refreshed",
			HeaderOutcome::Failure => "failure",
		}
	}
}
impl Display for HeaderOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
