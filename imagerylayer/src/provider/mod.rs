//! Imagery provider abstraction
//!
//! This module provides the trait imagery layers fetch tiles through, an
//! HTTP client abstraction, and a URL-template provider that covers most
//! XYZ and TMS tile endpoints.
//!
//! ```ignore
//! use imagerylayer::provider::{ReqwestClient, UrlTemplateProvider};
//!
//! let http_client = ReqwestClient::new()?;
//! let provider = UrlTemplateProvider::arcgis_world_imagery(http_client);
//! ```

mod http;
#[cfg(test)]
pub(crate) mod mock;
mod template;
mod types;

pub use http::{AsyncHttpClient, ReqwestClient, DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
pub use template::{
    UrlTemplateProvider, ARCGIS_TEMPLATE, DEFAULT_MAX_LEVEL, DEFAULT_TILE_SIZE, USGS_TEMPLATE,
};
pub use types::{ImageryProvider, ProviderError};

#[cfg(test)]
pub use http::tests::MockHttpClient;
