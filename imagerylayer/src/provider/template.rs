//! URL-template imagery provider.
//!
//! Serves tiles from any XYZ or TMS endpoint described by a URL template.
//!
//! # Placeholders
//!
//! - `{x}`: tile column (west to east)
//! - `{y}`: tile row (north to south)
//! - `{reverseY}`: tile row counted from the south (TMS convention)
//! - `{z}`: level
//! - `{s}`: subdomain, rotated across the configured list
//!
//! # Presets
//!
//! - [`UrlTemplateProvider::arcgis_world_imagery`]: Esri World Imagery, global,
//!   Web Mercator, levels 0-19
//! - [`UrlTemplateProvider::usgs_imagery`]: USGS National Map orthoimagery,
//!   United States only, Web Mercator, levels 0-16

use std::sync::Arc;

use image::RgbaImage;
use tracing::trace;

use super::{AsyncHttpClient, ImageryProvider, ProviderError};
use crate::geo::{Extent, TilingScheme, WebMercatorTilingScheme};
use crate::imagery::ImageryTileKey;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default finest level for template providers.
pub const DEFAULT_MAX_LEVEL: u32 = 18;

/// Template for ArcGIS World Imagery tiles.
pub const ARCGIS_TEMPLATE: &str =
    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}";

/// Template for USGS imagery tiles.
pub const USGS_TEMPLATE: &str =
    "https://basemap.nationalmap.gov/arcgis/rest/services/USGSImageryOnly/MapServer/tile/{z}/{y}/{x}";

/// Imagery provider driven by a URL template.
///
/// # Example
///
/// ```no_run
/// use imagerylayer::provider::{ReqwestClient, UrlTemplateProvider};
///
/// let client = ReqwestClient::new().unwrap();
/// let provider = UrlTemplateProvider::new(client, "https://{s}.tile.example.com/{z}/{x}/{y}.png")
///     .with_subdomains(["a", "b", "c"])
///     .with_max_level(17);
/// ```
pub struct UrlTemplateProvider<C: AsyncHttpClient> {
    http_client: C,
    template: String,
    subdomains: Vec<String>,
    tiling_scheme: Arc<dyn TilingScheme>,
    extent: Option<Extent>,
    max_level: u32,
    tile_width: u32,
    tile_height: u32,
    name: String,
}

impl<C: AsyncHttpClient> UrlTemplateProvider<C> {
    /// Creates a provider over a Web Mercator tiling scheme.
    pub fn new(http_client: C, template: impl Into<String>) -> Self {
        Self {
            http_client,
            template: template.into(),
            subdomains: Vec::new(),
            tiling_scheme: Arc::new(WebMercatorTilingScheme::new()),
            extent: None,
            max_level: DEFAULT_MAX_LEVEL,
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            name: "URL template".to_string(),
        }
    }

    /// Esri World Imagery.
    pub fn arcgis_world_imagery(http_client: C) -> Self {
        Self::new(http_client, ARCGIS_TEMPLATE)
            .with_max_level(19)
            .with_name("ArcGIS")
    }

    /// USGS National Map orthoimagery.
    ///
    /// Coverage is limited to the United States; requests elsewhere return
    /// no imagery.
    pub fn usgs_imagery(http_client: C) -> Self {
        Self::new(http_client, USGS_TEMPLATE)
            .with_max_level(16)
            .with_name("USGS")
    }

    /// Sets the subdomains substituted for `{s}`.
    pub fn with_subdomains<I, S>(mut self, subdomains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.subdomains = subdomains.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the tiling scheme the template addresses.
    pub fn with_tiling_scheme(mut self, tiling_scheme: Arc<dyn TilingScheme>) -> Self {
        self.tiling_scheme = tiling_scheme;
        self
    }

    /// Restricts the provider to part of its tiling scheme.
    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent);
        self
    }

    pub fn with_max_level(mut self, max_level: u32) -> Self {
        self.max_level = max_level;
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Expands the template for `key`.
    fn build_url(&self, key: ImageryTileKey) -> Result<String, ProviderError> {
        if key.level() > self.max_level {
            return Err(ProviderError::UnsupportedLevel(key.level()));
        }

        let (_, y_tiles) = self
            .tiling_scheme
            .checked_tile_counts(key.level())
            .ok_or(ProviderError::UnsupportedLevel(key.level()))?;
        let reverse_y = y_tiles.saturating_sub(1).saturating_sub(key.y());

        let mut url = self
            .template
            .replace("{x}", &key.x().to_string())
            .replace("{y}", &key.y().to_string())
            .replace("{reverseY}", &reverse_y.to_string())
            .replace("{z}", &key.level().to_string());

        if url.contains("{s}") {
            if self.subdomains.is_empty() {
                return Err(ProviderError::InvalidUrl(format!(
                    "template '{}' uses {{s}} but no subdomains are configured",
                    self.template
                )));
            }
            let index = (key.x() as usize + key.y() as usize + key.level() as usize)
                % self.subdomains.len();
            url = url.replace("{s}", &self.subdomains[index]);
        }

        url::Url::parse(&url).map_err(|e| ProviderError::InvalidUrl(format!("{}: {}", url, e)))?;

        Ok(url)
    }
}

impl<C: AsyncHttpClient> ImageryProvider for UrlTemplateProvider<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tiling_scheme(&self) -> &dyn TilingScheme {
        self.tiling_scheme.as_ref()
    }

    fn extent(&self) -> Extent {
        self.extent.unwrap_or(*self.tiling_scheme.extent())
    }

    fn max_level(&self) -> u32 {
        self.max_level
    }

    fn tile_width(&self) -> u32 {
        self.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.tile_height
    }

    async fn build_image_url(&self, key: ImageryTileKey) -> Result<String, ProviderError> {
        self.build_url(key)
    }

    async fn request_image(&self, url: &str) -> Result<Option<RgbaImage>, ProviderError> {
        let Some(bytes) = self.http_client.get(url).await? else {
            return Ok(None);
        };

        trace!(url = url, bytes = bytes.len(), "Decoding imagery payload");

        let image = image::load_from_memory(&bytes)
            .map_err(|e| ProviderError::DecodeError(format!("{}: {}", url, e)))?;

        Ok(Some(image.to_rgba8()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::GeographicTilingScheme;
    use crate::provider::MockHttpClient;
    use bytes::Bytes;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Bytes {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        Bytes::from(buffer.into_inner())
    }

    fn provider_with(response: Result<Option<Bytes>, ProviderError>) -> UrlTemplateProvider<MockHttpClient> {
        UrlTemplateProvider::new(
            MockHttpClient { response },
            "https://tiles.example.com/{z}/{x}/{y}.png",
        )
    }

    #[test]
    fn test_url_construction() {
        let provider = provider_with(Ok(None));
        let url = provider.build_url(ImageryTileKey::new(200, 100, 10)).unwrap();
        assert_eq!(url, "https://tiles.example.com/10/200/100.png");
    }

    #[test]
    fn test_reverse_y_uses_tiling_scheme_rows() {
        let provider = UrlTemplateProvider::new(
            MockHttpClient { response: Ok(None) },
            "https://tms.example.com/{z}/{x}/{reverseY}.jpg",
        );
        // Web Mercator level 3 has 8 rows
        let url = provider.build_url(ImageryTileKey::new(1, 2, 3)).unwrap();
        assert_eq!(url, "https://tms.example.com/3/1/5.jpg");

        let provider = provider.with_tiling_scheme(Arc::new(GeographicTilingScheme::new()));
        // Geographic level 3 has 8 rows as well (1 << 3)
        let url = provider.build_url(ImageryTileKey::new(1, 0, 3)).unwrap();
        assert_eq!(url, "https://tms.example.com/3/1/7.jpg");
    }

    #[test]
    fn test_subdomain_rotation() {
        let provider = UrlTemplateProvider::new(
            MockHttpClient { response: Ok(None) },
            "https://{s}.example.com/{z}/{x}/{y}",
        )
        .with_subdomains(["a", "b", "c"]);

        let a = provider.build_url(ImageryTileKey::new(0, 0, 0)).unwrap();
        let b = provider.build_url(ImageryTileKey::new(1, 0, 0)).unwrap();
        let c = provider.build_url(ImageryTileKey::new(1, 1, 0)).unwrap();
        assert!(a.starts_with("https://a."));
        assert!(b.starts_with("https://b."));
        assert!(c.starts_with("https://c."));
    }

    #[test]
    fn test_subdomain_placeholder_without_subdomains() {
        let provider = UrlTemplateProvider::new(
            MockHttpClient { response: Ok(None) },
            "https://{s}.example.com/{z}/{x}/{y}",
        );
        let result = provider.build_url(ImageryTileKey::new(0, 0, 0));
        assert!(matches!(result, Err(ProviderError::InvalidUrl(_))));
    }

    #[test]
    fn test_unsupported_level() {
        let provider = provider_with(Ok(None)).with_max_level(5);
        let result = provider.build_url(ImageryTileKey::new(0, 0, 6));
        assert_eq!(result, Err(ProviderError::UnsupportedLevel(6)));
    }

    #[test]
    fn test_level_beyond_tile_index_is_unsupported() {
        let provider = provider_with(Ok(None)).with_max_level(40);
        let result = provider.build_url(ImageryTileKey::new(0, 0, 35));
        assert_eq!(result, Err(ProviderError::UnsupportedLevel(35)));
    }

    #[test]
    fn test_presets() {
        let arcgis =
            UrlTemplateProvider::arcgis_world_imagery(MockHttpClient { response: Ok(None) });
        assert_eq!(arcgis.name(), "ArcGIS");
        assert_eq!(arcgis.max_level(), 19);
        let url = arcgis.build_url(ImageryTileKey::new(200, 100, 10)).unwrap();
        assert!(url.ends_with("/tile/10/100/200"));

        let usgs = UrlTemplateProvider::usgs_imagery(MockHttpClient { response: Ok(None) });
        assert_eq!(usgs.name(), "USGS");
        assert_eq!(usgs.max_level(), 16);
    }

    #[tokio::test]
    async fn test_request_image_decodes_png() {
        let provider = provider_with(Ok(Some(png_bytes(4, 2))));
        let image = provider
            .request_image("https://tiles.example.com/0/0/0.png")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(image.dimensions(), (4, 2));
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[tokio::test]
    async fn test_request_image_no_content() {
        let provider = provider_with(Ok(None));
        let image = provider
            .request_image("https://tiles.example.com/0/0/0.png")
            .await
            .unwrap();
        assert!(image.is_none());
    }

    #[tokio::test]
    async fn test_request_image_garbage_payload() {
        let provider = provider_with(Ok(Some(Bytes::from_static(b"not an image"))));
        let result = provider
            .request_image("https://tiles.example.com/0/0/0.png")
            .await;
        assert!(matches!(result, Err(ProviderError::DecodeError(_))));
    }

    #[tokio::test]
    async fn test_request_image_http_error() {
        let provider = provider_with(Err(ProviderError::HttpError("HTTP 500".to_string())));
        let result = provider
            .request_image("https://tiles.example.com/0/0/0.png")
            .await;
        assert!(matches!(result, Err(ProviderError::HttpError(_))));
    }
}
