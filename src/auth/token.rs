//! Cached token entries and the authentication headers rendered from them.

// self
use crate::{_prelude::*, auth::TokenSecret, error::IssuerError, issuer::TokenResponse};

/// Slack subtracted from the issuer-reported lifetime so a cached token is never presented
/// right as the issuer itself expires it.
pub const EXPIRY_SAFETY_MARGIN: Duration = Duration::seconds(5);

/// Token held by a factory between refreshes.
///
/// Entries are only ever replaced wholesale; a token with an empty access token is never
/// constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct CachedToken {
	/// Token type reported by the issuer, used as the header scheme.
	pub token_type: String,
	/// Access token secret; callers must avoid logging it.
	pub access_token: TokenSecret,
	/// Instant after which the entry must be refreshed.
	pub expires_at: OffsetDateTime,
}
impl CachedToken {
	/// Builds a cache entry from an issuer response received for a refresh that started at
	/// `refresh_started_at`.
	///
	/// The expiry is `refresh_started_at + expires_in - EXPIRY_SAFETY_MARGIN`. Responses
	/// without a non-empty access token are rejected with [`IssuerError::EmptyAccessToken`].
	pub fn from_response(
		response: TokenResponse,
		refresh_started_at: OffsetDateTime,
	) -> Result<Self, IssuerError> {
		let access_token = response
			.access_token
			.filter(|token| !token.is_empty())
			.ok_or(IssuerError::EmptyAccessToken)?;
		let lifetime = Duration::seconds(response.expires_in).saturating_sub(EXPIRY_SAFETY_MARGIN);

		Ok(Self {
			token_type: response.token_type,
			access_token: TokenSecret::new(access_token),
			expires_at: refresh_started_at.saturating_add(lifetime),
		})
	}

	/// Returns `true` while `now` is strictly before the expiry instant.
	pub fn is_valid_at(&self, now: OffsetDateTime) -> bool {
		now < self.expires_at
	}

	/// Renders the header presented to downstream services.
	pub fn header(&self) -> AuthenticationHeader {
		AuthenticationHeader {
			scheme: self.token_type.clone(),
			parameter: self.access_token.clone(),
		}
	}
}
impl Debug for CachedToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedToken")
			.field("token_type", &self.token_type)
			.field("access_token", &self.access_token)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// `Authorization` header value split into scheme and credential.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticationHeader {
	/// Header scheme, typically `Bearer`.
	pub scheme: String,
	/// Access token presented after the scheme.
	pub parameter: TokenSecret,
}
impl AuthenticationHeader {
	/// Formats the raw `Authorization` header value. The result contains the secret.
	pub fn to_header_value(&self) -> String {
		format!("{} {}", self.scheme, self.parameter.expose())
	}
}
impl Debug for AuthenticationHeader {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticationHeader")
			.field("scheme", &self.scheme)
			.field("parameter", &self.parameter)
			.finish()
	}
}
impl Display for AuthenticationHeader {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{} {}", self.scheme, self.parameter)
	}
}
