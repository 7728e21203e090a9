#![allow(dead_code)]

// std
use std::sync::{
	Arc,
	atomic::{AtomicI64, Ordering},
};
// crates.io
use issuer_token_provider::{
	TokenProviderFactory, TokenProviderOptions,
	http::ReqwestHttpClient,
	reqwest::Client,
	url::Url,
};
use time::{Duration, OffsetDateTime, macros::datetime};

pub const CLIENT_ID: &str = "client-credentials";
pub const CLIENT_SECRET: &str = "secret-credentials";
pub const SCOPE: &str = "api://orders/.default";

/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
/// `httpmock` during tests.
pub fn test_reqwest_http_client() -> ReqwestHttpClient {
	let client = Client::builder()
		.danger_accept_invalid_certs(true)
		.danger_accept_invalid_hostnames(true)
		.build()
		.expect("Failed to build insecure Reqwest client for tests.");

	ReqwestHttpClient::with_client(client)
}

/// Options pointing at `issuer` with the shared test credentials.
pub fn options(issuer: &str) -> TokenProviderOptions {
	TokenProviderOptions::new(CLIENT_ID, CLIENT_SECRET)
		.with_scope(SCOPE)
		.with_issuer(Url::parse(issuer).expect("Mock issuer endpoint should parse successfully."))
}

/// Clock that only moves when a test advances it.
#[derive(Clone, Default)]
pub struct ManualClock(Arc<AtomicI64>);
impl ManualClock {
	pub const START: OffsetDateTime = datetime!(2026-01-01 0:00 UTC);

	pub fn now(&self) -> OffsetDateTime {
		Self::START + Duration::seconds(self.0.load(Ordering::SeqCst))
	}

	pub fn set_offset(&self, seconds: i64) {
		self.0.store(seconds, Ordering::SeqCst);
	}

	/// Installs this clock on `factory`.
	pub fn install(&self, factory: TokenProviderFactory) -> TokenProviderFactory {
		let clock = self.clone();

		factory.with_clock(move || clock.now())
	}
}
