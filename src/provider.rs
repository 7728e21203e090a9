//! Token cache and single-flight refresh guard.
//!
//! A [`TokenProviderFactory`] owns one cached token behind one async mutex. Every
//! [`TokenProvider`] obtained from it shares that mutex, so the validity check and any
//! refresh happen inside the same critical section: queued callers that acquire the lock
//! after a refresh observe the fresh token and skip the network call.

// self
use crate::{
	_prelude::*,
	auth::{AuthenticationHeader, CachedToken},
	config::TokenProviderOptions,
	http::TokenHttpClient,
	issuer::{IssuerClient, TokenRequest, TransportErrorMapper},
	obs::{self, HeaderOutcome, HeaderSpan},
};
#[cfg(feature = "reqwest")]
use crate::{http::ReqwestHttpClient, issuer::ReqwestTransportErrorMapper};

/// Source of the current instant used for expiry decisions.
pub type Clock = Arc<dyn Fn() -> OffsetDateTime + Send + Sync>;

/// Boxed future returned by [`AuthenticationHeaderProvider::authentication_header`].
pub type HeaderFuture<'a> =
	Pin<Box<dyn Future<Output = Result<AuthenticationHeader>> + 'a + Send>>;

/// Object-safe contract for anything that can produce an `Authorization` header.
pub trait AuthenticationHeaderProvider
where
	Self: Send + Sync,
{
	/// Returns a header for the next outbound call, honoring `cancel`.
	fn authentication_header<'a>(&'a self, cancel: &'a CancellationToken) -> HeaderFuture<'a>;
}

type TokenCache = Arc<AsyncMutex<Option<CachedToken>>>;

/// Long-lived owner of a single cached client-credentials token.
///
/// The factory is meant to live as long as the application needs tokens for its
/// credential set. Providers bound to different transports may be created freely; they all
/// share this factory's cache and refresh guard.
pub struct TokenProviderFactory {
	options: Arc<TokenProviderOptions>,
	cache: TokenCache,
	clock: Clock,
}
impl TokenProviderFactory {
	/// Creates a factory after checking the scope/endpoint configuration rule.
	pub fn new(options: TokenProviderOptions) -> Result<Self> {
		options.validate()?;

		Ok(Self {
			options: Arc::new(options),
			cache: Default::default(),
			clock: Arc::new(OffsetDateTime::now_utc),
		})
	}

	/// Replaces the clock used for expiry decisions. Only providers created afterwards use
	/// the new clock.
	pub fn with_clock(mut self, clock: impl 'static + Fn() -> OffsetDateTime + Send + Sync) -> Self {
		self.clock = Arc::new(clock);

		self
	}

	/// Returns the immutable credential configuration.
	pub fn options(&self) -> &TokenProviderOptions {
		&self.options
	}

	/// Binds a provider to a caller-owned transport and error mapper.
	pub fn provider_with_mapper<C, M>(
		&self,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> TokenProvider<C, M>
	where
		C: ?Sized + TokenHttpClient,
		M: ?Sized + TransportErrorMapper<C::TransportError>,
	{
		TokenProvider {
			options: self.options.clone(),
			cache: self.cache.clone(),
			clock: self.clock.clone(),
			issuer: IssuerClient::new(http_client, mapper),
		}
	}

	/// Returns the cached token's expiry, or `None` when nothing is cached.
	///
	/// Waits for any in-flight refresh to finish.
	pub async fn cached_expiry(&self) -> Option<OffsetDateTime> {
		(*self.cache.lock().await).as_ref().map(|token| token.expires_at)
	}

	/// Retires the factory. Equivalent to dropping it; the refresh guard is released once the
	/// last provider created from this factory is dropped as well.
	pub fn dispose(self) {}
}
#[cfg(feature = "reqwest")]
impl TokenProviderFactory {
	/// Binds a provider to a caller-owned reqwest transport.
	pub fn provider(
		&self,
		http_client: impl Into<Arc<ReqwestHttpClient>>,
	) -> TokenProvider<ReqwestHttpClient, ReqwestTransportErrorMapper> {
		self.provider_with_mapper(http_client, ReqwestTransportErrorMapper)
	}
}
impl Debug for TokenProviderFactory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProviderFactory").field("options", &self.options).finish()
	}
}

/// Issues `Authorization` headers from a factory's cache, refreshing it when needed.
pub struct TokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	options: Arc<TokenProviderOptions>,
	cache: TokenCache,
	clock: Clock,
	issuer: IssuerClient<C, M>,
}
impl<C, M> TokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Returns the header for the next outbound call.
	///
	/// The cache is checked under the refresh guard. If the token is missing or expired the
	/// cache is cleared and the issuer is contacted while the guard is held, so at most one
	/// request is in flight per factory. `cancel` is observed both while waiting for the
	/// guard and during the issuer call; a cancelled retrieval caches nothing.
	pub async fn get_authentication_header(
		&self,
		cancel: &CancellationToken,
	) -> Result<AuthenticationHeader> {
		let span = HeaderSpan::new("get_authentication_header");

		obs::record_header_outcome(HeaderOutcome::Attempt);

		let result = span.instrument(self.header_under_guard(cancel)).await;

		if result.is_err() {
			obs::record_header_outcome(HeaderOutcome::Failure);
		}

		result
	}

	async fn header_under_guard(&self, cancel: &CancellationToken) -> Result<AuthenticationHeader> {
		let mut cache = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled),
			guard = self.cache.lock() => guard,
		};
		let now = (self.clock)();

		if let Some(token) = (*cache).as_ref().filter(|token| token.is_valid_at(now)) {
			obs::record_header_outcome(HeaderOutcome::CacheHit);
			obs::trace_cache_decision(HeaderOutcome::CacheHit, Some(token.expires_at));

			return Ok(token.header());
		}

		*cache = None;

		let refresh_started_at = (self.clock)();
		let options = self.options.as_ref();
		let request = TokenRequest {
			endpoint: options.authorization_token_issuer.as_ref(),
			client_id: &options.client_id,
			scope: options.scope(),
			client_secret: options.client_secret.expose(),
			tenant: options.tenant.as_deref(),
			tenant_placement: options.tenant_placement,
		};

		obs::trace_refresh_start(request.endpoint, request.scope);

		let response = self.issuer.request_token(&request, cancel).await?;
		let token = CachedToken::from_response(response, refresh_started_at)?;
		let header = token.header();

		obs::record_header_outcome(HeaderOutcome::Refreshed);
		obs::trace_cache_decision(HeaderOutcome::Refreshed, Some(token.expires_at));

		*cache = Some(token);

		Ok(header)
	}
}
impl<C, M> AuthenticationHeaderProvider for TokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn authentication_header<'a>(&'a self, cancel: &'a CancellationToken) -> HeaderFuture<'a> {
		Box::pin(self.get_authentication_header(cancel))
	}
}
impl<C, M> Clone for TokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self {
			options: self.options.clone(),
			cache: self.cache.clone(),
			clock: self.clock.clone(),
			issuer: self.issuer.clone(),
		}
	}
}
impl<C, M> Debug for TokenProvider<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProvider").field("options", &self.options).finish()
	}
}
