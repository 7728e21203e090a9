//! Credential configuration consumed by [`TokenProviderFactory`](crate::TokenProviderFactory).

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Where the tenant identifier travels in a token request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantPlacement {
	/// `Tenant` query parameter on an explicitly configured issuer endpoint. Default issuer
	/// endpoints do not accept tenant injection, so the tenant is dropped for them.
	#[default]
	Query,
	/// `tenant` field in the form-encoded request body, for every endpoint.
	FormField,
}

/// Client credentials and issuer settings for a single cached token.
///
/// Deserializes from any serde format, e.g. an application settings document:
///
/// ```
/// use issuer_token_provider::TokenProviderOptions;
///
/// let options: TokenProviderOptions = serde_json::from_str(
/// 	r#"{"authorization_scope":"api://orders/.default","client_id":"svc","client_secret":"s3cr3t"}"#,
/// )
/// .unwrap();
///
/// assert!(options.validate().is_ok());
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenProviderOptions {
	/// Token issuer endpoint. Leave unset to infer a default issuer from the scope.
	pub authorization_token_issuer: Option<Url>,
	/// Authorization scope requested for the token.
	pub authorization_scope: Option<String>,
	/// Client credentials identifier.
	pub client_id: String,
	/// Client credentials secret. Never serialized.
	#[serde(skip_serializing)]
	pub client_secret: TokenSecret,
	/// Tenant identifier for multi-tenant issuers.
	pub tenant: Option<String>,
	/// Where the tenant identifier is sent.
	pub tenant_placement: TenantPlacement,
}
impl TokenProviderOptions {
	/// Creates options for the provided client credentials.
	pub fn new(client_id: impl Into<String>, client_secret: impl Into<TokenSecret>) -> Self {
		Self { client_id: client_id.into(), client_secret: client_secret.into(), ..Default::default() }
	}

	/// Sets the authorization scope.
	pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
		self.authorization_scope = Some(scope.into());

		self
	}

	/// Overrides the token issuer endpoint.
	pub fn with_issuer(mut self, issuer: Url) -> Self {
		self.authorization_token_issuer = Some(issuer);

		self
	}

	/// Sets the tenant identifier.
	pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
		self.tenant = Some(tenant.into());

		self
	}

	/// Overrides where the tenant identifier is sent.
	pub fn with_tenant_placement(mut self, placement: TenantPlacement) -> Self {
		self.tenant_placement = placement;

		self
	}

	/// Returns the configured scope, treating an empty string as unset.
	pub fn scope(&self) -> Option<&str> {
		self.authorization_scope.as_deref().filter(|scope| !scope.is_empty())
	}

	/// Checks that a scope is configured unless an explicit issuer endpoint compensates.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.scope().is_none() && self.authorization_token_issuer.is_none() {
			return Err(ConfigError::MissingScope);
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn validate_requires_scope_or_issuer() {
		let bare = TokenProviderOptions::new("client", "secret");

		assert!(matches!(bare.validate(), Err(ConfigError::MissingScope)));
		assert!(bare.clone().with_scope("").validate().is_err());
		assert!(bare.clone().with_scope("custom.scope").validate().is_ok());

		let issuer = Url::parse("https://issuer.example.com/token")
			.expect("Test issuer URL should parse successfully.");

		assert!(bare.with_issuer(issuer).validate().is_ok());
	}

	#[test]
	fn options_deserialize_with_defaults() {
		let options: TokenProviderOptions = serde_json::from_str(
			r#"{
				"authorization_token_issuer": "https://issuer.example.com/token",
				"client_id": "svc",
				"client_secret": "hidden",
				"tenant": "acme",
				"tenant_placement": "form_field"
			}"#,
		)
		.expect("Options document should deserialize.");

		assert_eq!(options.client_secret.expose(), "hidden");
		assert_eq!(options.tenant_placement, TenantPlacement::FormField);
		assert_eq!(options.scope(), None);
		assert!(!format!("{options:?}").contains("hidden"));
	}

	#[test]
	fn serialized_options_omit_client_secret() {
		let options = TokenProviderOptions::new("svc", "hidden").with_scope("custom.scope");
		let document =
			serde_json::to_value(&options).expect("Options should serialize to JSON.");

		assert_eq!(document["client_id"], "svc");
		assert!(document.get("client_secret").is_none());
		assert!(!document.to_string().contains("hidden"));
	}
}
