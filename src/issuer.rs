//! Wire protocol for the client-credentials token issuer.
//!
//! [`IssuerClient`] resolves the issuer endpoint, encodes the form body, sends it through
//! the injected [`TokenHttpClient`], and turns the response into a [`TokenResponse`] or a
//! classified [`Error`]. It holds no cache and takes no locks.

// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		HeaderMap, HeaderValue, Method, Request, StatusCode,
		header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER},
	},
};
use serde::{Deserializer, de::Error as _};
use time::format_description::well_known::Rfc2822;
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	config::TenantPlacement,
	error::{ConfigError, IssuerError, TransportError},
	http::TokenHttpClient,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

/// Default B2C-style issuer, used when no endpoint is configured and the scope is not a
/// `.default` scope.
pub const DEFAULT_B2C_ISSUER: &str = "https://login.microsoftonline.com/logicidentityprod.onmicrosoft.com/oauth2/v2.0/token?p=B2C_1A_ClientCredentials";
/// Default Active-Directory-style issuer, used when no endpoint is configured and the scope
/// ends with `.default`.
pub const DEFAULT_DIRECTORY_ISSUER: &str =
	"https://login.microsoftonline.com/logicidentityprod.onmicrosoft.com/oauth2/v2.0/token";

const DIRECTORY_SCOPE_SUFFIX: &str = ".default";
const TENANT_QUERY_KEY: &str = "Tenant";
const TENANT_FORM_KEY: &str = "tenant";
const UNAUTHORIZED_HINT: &str =
	" Your client credentials may be invalid or are not authorized to request the scope.";

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted while calling `endpoint` into an [`Error`].
	fn map_transport_error(&self, endpoint: &Url, error: HttpClientError<E>) -> Error;
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(&self, _endpoint: &Url, err: HttpClientError<ReqwestError>) -> Error {
		match err {
			HttpClientError::Reqwest(inner) if inner.is_builder() => ConfigError::from(*inner).into(),
			HttpClientError::Reqwest(inner) => TransportError::from(*inner).into(),
			HttpClientError::Http(inner) => ConfigError::from(inner).into(),
			HttpClientError::Io(inner) => TransportError::Io(inner).into(),
			HttpClientError::Other(message) => TransportError::Other { message }.into(),
			_ => TransportError::Other { message: "unrecognized transport failure".into() }.into(),
		}
	}
}

/// Successful token endpoint response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
	/// Token type, used as the header scheme.
	pub token_type: String,
	/// Token lifetime in seconds; numeric strings are accepted.
	#[serde(deserialize_with = "deserialize_expires_in")]
	pub expires_in: i64,
	/// Access token; a missing or `null` field reads as `None` and is rejected by the cache.
	#[serde(default)]
	pub access_token: Option<String>,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("token_type", &self.token_type)
			.field("expires_in", &self.expires_in)
			.field("access_token", &"<redacted>")
			.finish()
	}
}

/// Error body returned by the issuer on non-success statuses. Every field is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssuerErrorResponse {
	/// OAuth error code, e.g. `invalid_client`.
	pub error: Option<String>,
	/// Human-readable description.
	pub error_description: Option<String>,
	/// Issuer-specific numeric error codes.
	pub error_codes: Vec<i64>,
	/// Issuer timestamp of the failure.
	pub timestamp: Option<String>,
	/// Issuer trace identifier.
	pub trace_id: Option<String>,
	/// Issuer correlation identifier.
	pub correlation_id: Option<String>,
}

/// Parameters of a single token request.
#[derive(Clone, Copy, Debug)]
pub struct TokenRequest<'a> {
	/// Explicit issuer endpoint; `None` selects a default issuer from the scope.
	pub endpoint: Option<&'a Url>,
	/// Client credentials identifier.
	pub client_id: &'a str,
	/// Requested scope; sent as an empty field when unset.
	pub scope: Option<&'a str>,
	/// Client credentials secret.
	pub client_secret: &'a str,
	/// Tenant identifier.
	pub tenant: Option<&'a str>,
	/// Where the tenant identifier is sent.
	pub tenant_placement: TenantPlacement,
}

/// Stateless translator between token requests and the issuer's HTTP protocol.
pub struct IssuerClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	error_mapper: Arc<M>,
}
impl<C, M> IssuerClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a client over the caller-provided transport + mapper pair.
	pub fn new(http_client: impl Into<Arc<C>>, error_mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), error_mapper: error_mapper.into() }
	}

	/// Requests a token from the issuer.
	///
	/// The network call races `cancel`; a fired token yields [`Error::Cancelled`].
	pub async fn request_token(
		&self,
		request: &TokenRequest<'_>,
		cancel: &CancellationToken,
	) -> Result<TokenResponse> {
		let endpoint = resolve_endpoint(
			request.endpoint,
			request.scope,
			request.tenant,
			request.tenant_placement,
		)?;
		let http_request = build_http_request(&endpoint, request)?;
		let handle = self.http_client.handle();
		let response = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled),
			result = handle.call(http_request) => result
				.map_err(|err| self.error_mapper.map_transport_error(&endpoint, err))?,
		};

		parse_token_response(response)
	}
}
#[cfg(feature = "reqwest")]
impl IssuerClient<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a client over the default reqwest transport.
	pub fn reqwest(http_client: impl Into<Arc<ReqwestHttpClient>>) -> Self {
		Self::new(http_client, ReqwestTransportErrorMapper)
	}
}
impl<C, M> Clone for IssuerClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn clone(&self) -> Self {
		Self { http_client: self.http_client.clone(), error_mapper: self.error_mapper.clone() }
	}
}
impl<C, M> Debug for IssuerClient<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("IssuerClient(..)")
	}
}

/// Picks the endpoint a token request is sent to.
///
/// An explicit endpoint is used verbatim, except that a query-placed tenant replaces any
/// `Tenant` query pair. Otherwise a scope ending in `.default` selects
/// [`DEFAULT_DIRECTORY_ISSUER`] and any other scope selects [`DEFAULT_B2C_ISSUER`]; default
/// issuers never receive a tenant query pair. Without either an endpoint or a scope the
/// request cannot be routed.
pub fn resolve_endpoint(
	endpoint: Option<&Url>,
	scope: Option<&str>,
	tenant: Option<&str>,
	placement: TenantPlacement,
) -> Result<Url, ConfigError> {
	if let Some(endpoint) = endpoint {
		let mut url = endpoint.clone();

		if let (Some(tenant), TenantPlacement::Query) = (tenant, placement) {
			let retained = url
				.query_pairs()
				.filter(|(key, _)| !key.eq_ignore_ascii_case(TENANT_QUERY_KEY))
				.map(|(key, value)| (key.into_owned(), value.into_owned()))
				.collect::<Vec<_>>();
			let mut pairs = url.query_pairs_mut();

			pairs.clear();
			pairs.extend_pairs(retained);
			pairs.append_pair(TENANT_QUERY_KEY, tenant);
		}

		return Ok(url);
	}

	let scope = scope.filter(|scope| !scope.is_empty()).ok_or(ConfigError::MissingScope)?;
	let default = if scope.ends_with(DIRECTORY_SCOPE_SUFFIX) {
		DEFAULT_DIRECTORY_ISSUER
	} else {
		DEFAULT_B2C_ISSUER
	};

	Url::parse(default).map_err(|source| ConfigError::InvalidEndpoint { source })
}

/// Encodes the form body. The four client-credentials fields are always present.
pub fn encode_form(request: &TokenRequest<'_>) -> String {
	let mut form = FormSerializer::new(String::new());

	form.append_pair("grant_type", "client_credentials")
		.append_pair("client_id", request.client_id)
		.append_pair("scope", request.scope.unwrap_or_default())
		.append_pair("client_secret", request.client_secret);

	if let (Some(tenant), TenantPlacement::FormField) = (request.tenant, request.tenant_placement) {
		form.append_pair(TENANT_FORM_KEY, tenant);
	}

	form.finish()
}

fn build_http_request(endpoint: &Url, request: &TokenRequest<'_>) -> Result<HttpRequest> {
	Request::builder()
		.method(Method::POST)
		.uri(endpoint.as_str())
		.header(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"))
		.header(ACCEPT, HeaderValue::from_static("application/json"))
		.body(encode_form(request).into_bytes())
		.map_err(|err| ConfigError::from(err).into())
}

fn parse_token_response(response: HttpResponse) -> Result<TokenResponse> {
	let status = response.status();

	if !status.is_success() {
		return Err(rejection(status, response.headers(), response.body()).into());
	}

	let mut de = serde_json::Deserializer::from_slice(response.body());
	let parsed = serde_path_to_error::deserialize(&mut de)
		.map_err(|source| Error::TokenResponseParse { source, status: status.as_u16() })?;

	de.end()
		.map_err(|source| Error::TokenResponseTrailingData { source, status: status.as_u16() })?;

	Ok(parsed)
}

/// Builds the error for a non-success response: the issuer's error code when one is
/// present, plus a credentials hint on 401. The error body is parsed on a best-effort basis
/// and never causes a secondary failure.
fn rejection(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> IssuerError {
	let details = serde_json::from_slice::<IssuerErrorResponse>(body).ok();
	let mut message =
		format!("Unable to access the token issuer, request returned {}.", status.as_u16());

	if let Some(code) =
		details.as_ref().and_then(|details| details.error.as_deref()).filter(|e| !e.is_empty())
	{
		message.push_str(&format!(" Reason: {code}."));
	}
	if status == StatusCode::UNAUTHORIZED {
		message.push_str(UNAUTHORIZED_HINT);
	}

	IssuerError::Rejected {
		message,
		status: status.as_u16(),
		retry_after: parse_retry_after(headers),
		details,
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(i64),
		Text(String),
	}

	match Raw::deserialize(deserializer)? {
		Raw::Number(value) => Ok(value),
		Raw::Text(text) => text.trim().parse().map_err(D::Error::custom),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(value: &str) -> Url {
		Url::parse(value).expect("Failed to parse test URL.")
	}

	fn request<'a>(scope: Option<&'a str>, tenant: Option<&'a str>) -> TokenRequest<'a> {
		TokenRequest {
			endpoint: None,
			client_id: "client id",
			scope,
			client_secret: "s&cret",
			tenant,
			tenant_placement: TenantPlacement::Query,
		}
	}

	fn response(status: u16, body: &str) -> HttpResponse {
		let mut response = HttpResponse::new(body.as_bytes().to_vec());

		*response.status_mut() =
			StatusCode::from_u16(status).expect("Test status code should be valid.");

		response
	}

	#[test]
	fn default_endpoint_follows_scope_suffix() {
		let directory =
			resolve_endpoint(None, Some("api://xyz/.default"), None, TenantPlacement::Query)
				.expect("Directory scope should resolve.");
		let b2c = resolve_endpoint(None, Some("custom.scope"), None, TenantPlacement::Query)
			.expect("Custom scope should resolve.");

		assert_eq!(directory.as_str(), DEFAULT_DIRECTORY_ISSUER);
		assert_eq!(b2c, url(DEFAULT_B2C_ISSUER));
	}

	#[test]
	fn default_endpoint_ignores_tenant() {
		let resolved =
			resolve_endpoint(None, Some("api://xyz/.default"), Some("acme"), TenantPlacement::Query)
				.expect("Directory scope should resolve.");

		assert_eq!(resolved.as_str(), DEFAULT_DIRECTORY_ISSUER);
	}

	#[test]
	fn missing_scope_without_endpoint_is_rejected() {
		assert!(matches!(
			resolve_endpoint(None, None, None, TenantPlacement::Query),
			Err(ConfigError::MissingScope)
		));
		assert!(matches!(
			resolve_endpoint(None, Some(""), None, TenantPlacement::Query),
			Err(ConfigError::MissingScope)
		));
	}

	#[test]
	fn explicit_endpoint_is_used_verbatim_with_tenant_query() {
		let explicit = url("https://issuer.example.com/token?p=policy&Tenant=old");
		let plain = resolve_endpoint(Some(&explicit), Some("x/.default"), None, TenantPlacement::Query)
			.expect("Explicit endpoint should resolve.");
		let with_tenant =
			resolve_endpoint(Some(&explicit), None, Some("acme"), TenantPlacement::Query)
				.expect("Explicit endpoint should resolve.");
		let form_placed =
			resolve_endpoint(Some(&explicit), None, Some("acme"), TenantPlacement::FormField)
				.expect("Explicit endpoint should resolve.");

		assert_eq!(plain, explicit);
		assert_eq!(with_tenant.as_str(), "https://issuer.example.com/token?p=policy&Tenant=acme");
		assert_eq!(form_placed, explicit);
	}

	#[test]
	fn form_keeps_all_fields_in_order() {
		assert_eq!(
			encode_form(&request(Some("a b"), None)),
			"grant_type=client_credentials&client_id=client+id&scope=a+b&client_secret=s%26cret"
		);
		assert_eq!(
			encode_form(&request(None, Some("acme"))),
			"grant_type=client_credentials&client_id=client+id&scope=&client_secret=s%26cret"
		);

		let mut form_tenant = request(Some("s"), Some("acme"));

		form_tenant.tenant_placement = TenantPlacement::FormField;

		assert!(encode_form(&form_tenant).ends_with("&tenant=acme"));
	}

	#[test]
	fn rejection_reports_reason_or_unauthorized_hint() {
		let reason = rejection(StatusCode::UNAUTHORIZED, &HeaderMap::new(), br#"{"error":"invalid_client"}"#);
		let hint = rejection(StatusCode::UNAUTHORIZED, &HeaderMap::new(), b"<html>nope</html>");
		let plain = rejection(StatusCode::BAD_GATEWAY, &HeaderMap::new(), b"");

		assert_eq!(
			reason.to_string(),
			format!(
				"Unable to access the token issuer, request returned 401. Reason: invalid_client.{UNAUTHORIZED_HINT}"
			)
		);
		assert!(hint.to_string().ends_with(UNAUTHORIZED_HINT));
		assert_eq!(plain.to_string(), "Unable to access the token issuer, request returned 502.");
	}

	#[test]
	fn rejection_keeps_details_and_retry_after() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, HeaderValue::from_static("30"));

		let err = rejection(
			StatusCode::TOO_MANY_REQUESTS,
			&headers,
			br#"{"error":"throttled","error_codes":[50196],"trace_id":"t-1","correlation_id":"c-1"}"#,
		);

		match err {
			IssuerError::Rejected { status, retry_after, details: Some(details), .. } => {
				assert_eq!(status, 429);
				assert_eq!(retry_after, Some(Duration::seconds(30)));
				assert_eq!(details.error_codes, vec![50196]);
				assert_eq!(details.trace_id.as_deref(), Some("t-1"));
				assert_eq!(details.correlation_id.as_deref(), Some("c-1"));
			},
			other => panic!("Unexpected issuer error: {other:?}."),
		}
	}

	#[test]
	fn success_body_parses_and_accepts_string_lifetime() {
		let parsed = parse_token_response(response(
			200,
			r#"{"token_type":"Bearer","expires_in":"3600","access_token":"abc"}"#,
		))
		.expect("String lifetimes should parse.");

		assert_eq!(parsed.expires_in, 3600);
		assert_eq!(parsed.access_token.as_deref(), Some("abc"));
		assert!(!format!("{parsed:?}").contains("abc"));
	}

	#[test]
	fn malformed_success_body_is_a_parse_error() {
		let err = parse_token_response(response(200, "{\"token_type\":\"Bearer\""))
			.expect_err("Truncated JSON must not parse.");

		assert!(matches!(err, Error::TokenResponseParse { status: 200, .. }));

		let err = parse_token_response(response(200, r#"{"token_type":"Bearer","expires_in":"soon"}"#))
			.expect_err("Non-numeric lifetimes must not parse.");

		match err {
			Error::TokenResponseParse { source, .. } => assert_eq!(source.path().to_string(), "expires_in"),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn trailing_data_after_token_response_is_rejected() {
		let err = parse_token_response(response(
			200,
			r#"{"token_type":"Bearer","expires_in":3600,"access_token":"abc"} garbage"#,
		))
		.expect_err("Content after the token document must not parse.");

		assert!(matches!(err, Error::TokenResponseTrailingData { status: 200, .. }));

		parse_token_response(response(
			200,
			"{\"token_type\":\"Bearer\",\"expires_in\":3600,\"access_token\":\"abc\"}\r\n",
		))
		.expect("Trailing whitespace should be accepted.");
	}

	#[test]
	fn null_access_token_parses_as_missing() {
		let parsed = parse_token_response(response(
			200,
			r#"{"token_type":"Bearer","expires_in":3600,"access_token":null}"#,
		))
		.expect("A null access token should parse.");

		assert_eq!(parsed.access_token, None);
	}

	#[test]
	fn tenant_query_replacement_ignores_key_case() {
		let explicit = url("https://issuer.example.com/token?tenant=old&p=policy&TENANT=older");
		let resolved =
			resolve_endpoint(Some(&explicit), None, Some("acme"), TenantPlacement::Query)
				.expect("Explicit endpoint should resolve.");

		assert_eq!(resolved.as_str(), "https://issuer.example.com/token?p=policy&Tenant=acme");
	}
}
