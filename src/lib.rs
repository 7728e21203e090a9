//! Cached OAuth 2.0 client-credentials bearer tokens for outbound service calls, with a
//! single-flight refresh guard and issuer-aware error reporting.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod issuer;
pub mod obs;
pub mod provider;

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;

pub use auth::{AuthenticationHeader, CachedToken, TokenSecret};
pub use config::{TenantPlacement, TokenProviderOptions};
pub use error::{Error, Result};
pub use provider::{AuthenticationHeaderProvider, TokenProvider, TokenProviderFactory};

#[cfg(test)] use {base64 as _, color_eyre as _, httpmock as _};
