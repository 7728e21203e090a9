//! Provider-level error types shared by the issuer client and the token cache.

// self
use crate::{_prelude::*, issuer::IssuerErrorResponse};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error surfaced by header retrieval and token requests.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; raised before any network call.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Token issuer refused to issue a usable token.
	#[error(transparent)]
	Issuer(#[from] IssuerError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Successful issuer response whose body is not a token response.
	#[error("Token issuer returned a malformed token response.")]
	TokenResponseParse {
		/// Structured parsing failure including the offending JSON path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response.
		status: u16,
	},
	/// Successful issuer response with content after the token document.
	#[error("Token issuer returned trailing data after the token response.")]
	TokenResponseTrailingData {
		/// Underlying JSON failure pointing at the trailing content.
		#[source]
		source: serde_json::Error,
		/// HTTP status code of the response.
		status: u16,
	},
	/// The caller's cancellation token fired while waiting for the refresh guard or the issuer.
	#[error("Token request was cancelled.")]
	Cancelled,
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Issuer endpoint cannot be parsed.
	#[error("Issuer endpoint is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},

	/// No authorization scope is configured and no explicit issuer endpoint compensates.
	#[error("An authorization scope is required when no token issuer endpoint is configured.")]
	MissingScope,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Failures reported by (or about) the token issuer.
#[derive(Debug, ThisError)]
pub enum IssuerError {
	/// Issuer answered with a non-success status.
	#[error("{message}")]
	Rejected {
		/// Message including the status code and the best-effort reason.
		message: String,
		/// HTTP status code returned by the issuer.
		status: u16,
		/// Retry-After hint from the issuer, if supplied.
		retry_after: Option<Duration>,
		/// Parsed error body, when the issuer sent one.
		details: Option<IssuerErrorResponse>,
	},
	/// Issuer answered with a success status but no access token.
	#[error("Unable to obtain a token from the token issuer.")]
	EmptyAccessToken,
}
impl IssuerError {
	/// HTTP status code associated with the failure, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Rejected { status, .. } => Some(*status),
			Self::EmptyAccessToken => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the token issuer.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the token issuer.")]
	Io(#[from] std::io::Error),
	/// Transport failure described only by a message.
	#[error("HTTP client error occurred while calling the token issuer: {message}.")]
	Other {
		/// Transport-supplied description.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn rejected_displays_composed_message() {
		let err = Error::from(IssuerError::Rejected {
			message: "Unable to access the token issuer, request returned 503.".into(),
			status: 503,
			retry_after: None,
			details: None,
		});

		assert_eq!(err.to_string(), "Unable to access the token issuer, request returned 503.");
		assert!(matches!(&err, Error::Issuer(issuer) if issuer.status() == Some(503)));
	}

	#[test]
	fn missing_scope_is_a_config_error() {
		let err = Error::from(ConfigError::MissingScope);

		assert!(matches!(err, Error::Config(ConfigError::MissingScope)));
		assert!(err.to_string().contains("authorization scope"));
	}
}
