//! Demonstrates loading provider options from a settings document, validating them, and
//! reusing a cached bearer token against a mock issuer. The issued token is a JWT whose
//! claims are decoded and printed.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use color_eyre::{Result, eyre::eyre};
use httpmock::prelude::*;
// self
use issuer_token_provider::{
	CancellationToken, TokenProviderFactory, TokenProviderOptions, http::ReqwestHttpClient,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let jwt = demo_jwt();
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"token_type\":\"Bearer\",\"expires_in\":900,\"access_token\":\"{jwt}\"}}"
			));
		})
		.await;
	let settings = format!(
		r#"{{
			"authorization_token_issuer": "{}",
			"authorization_scope": "api://orders/.default",
			"client_id": "demo-client",
			"client_secret": "super-secret"
		}}"#,
		server.url("/token")
	);
	let options: TokenProviderOptions = serde_json::from_str(&settings)?;

	if options.client_id.is_empty() || options.client_secret.is_empty() {
		return Err(eyre!("Invalid configuration; current settings are {options:?}."));
	}

	let factory = TokenProviderFactory::new(options)?;
	let provider = factory.provider(ReqwestHttpClient::default());
	let cancel = CancellationToken::new();

	println!(
		"Requesting access to scope {:?} with client id {}.",
		factory.options().authorization_scope,
		factory.options().client_id
	);

	let header = provider.get_authentication_header(&cancel).await?;
	let cached = provider.get_authentication_header(&cancel).await?;

	println!("Retrieved authorization header {header}.");
	println!("Second retrieval reused the cache: {}.", header == cached);

	let payload = header
		.parameter
		.expose()
		.split('.')
		.nth(1)
		.ok_or_else(|| eyre!("Access token is not a JWT."))?;
	let claims: serde_json::Value = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload)?)?;

	println!("Decoded JWT claims: {claims:#}.");

	token_mock.assert_async().await;
	factory.dispose();

	Ok(())
}

fn demo_jwt() -> String {
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
	let claims = URL_SAFE_NO_PAD
		.encode(br#"{"sub":"demo-client","aud":"api://orders","exp":1893456000}"#);

	format!("{header}.{claims}.")
}
