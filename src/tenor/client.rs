use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use strum_macros::Display;
use url::Url;

use crate::request::{parse_successful_response, HttpTransport};

use super::{Category, Image, ImagePreview, SearchResult, TenorError};

pub const DEFAULT_BASE_URL: &str = "https://tenor.googleapis.com/v2/";

/// Full size rendition, the one handed back to callers
const FULL_FORMAT: &str = "gif";
const PREVIEW_FORMAT: &str = "tinygif";

#[derive(Debug, Deserialize)]
pub struct TenorMediaFormat {
    pub url: Option<String>,
    /// [width, height]
    pub dims: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
pub struct TenorResult {
    pub id: String,
    pub title: Option<String>,
    pub content_description: Option<String>,
    pub itemurl: Option<String>,
    pub url: Option<String>,
    /// seconds since the epoch, with a fractional part
    pub created: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub media_formats: Option<HashMap<String, TenorMediaFormat>>,
}

#[derive(Debug, Deserialize)]
pub struct TenorPage {
    pub results: Vec<TenorResult>,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TenorCategory {
    pub name: String,
    pub searchterm: Option<String>,
    pub path: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TenorCategories {
    pub tags: Vec<TenorCategory>,
}

#[derive(Display, Debug, Copy, Clone, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum Endpoint {
    Search,
    /// tenor's name for the trending feed
    Featured,
    Categories,
}

#[derive(Debug, Clone, Default)]
pub struct UrlBuilder {
    pub params: Vec<(&'static str, String)>,
}

impl UrlBuilder {
    pub fn param(&mut self, key: &'static str, value: impl ToString) -> &mut Self {
        self.params.push((key, value.to_string()));
        self
    }
    pub fn build(&self, base_url: &Url, path: &str) -> Result<Url, TenorError> {
        let endpoint = base_url
            .join(path)
            .map_err(|err| TenorError::Configuration(format!("invalid base url: {}", err)))?;
        Url::parse_with_params(endpoint.as_str(), self.params.iter())
            .map_err(|err| TenorError::Configuration(format!("invalid request url: {}", err)))
    }
}

/// Everything needed to make exactly one call to tenor
#[derive(Debug, Clone)]
pub struct TenorRequest {
    pub endpoint: Endpoint,
    pub params: UrlBuilder,
}

fn media(format: &TenorMediaFormat) -> ImagePreview {
    let dims = format.dims.as_deref().unwrap_or_default();
    ImagePreview {
        url: format.url.clone().unwrap_or_default(),
        width: dims.get(0).copied().unwrap_or_default(),
        height: dims.get(1).copied().unwrap_or_default(),
    }
}

fn created_at(created: Option<f64>) -> DateTime<Utc> {
    let epoch = DateTime::<Utc>::from(UNIX_EPOCH);
    match created {
        Some(seconds) if seconds.is_finite() => Utc
            .timestamp_opt(seconds.trunc() as i64, (seconds.fract() * 1e9) as u32)
            .single()
            .unwrap_or(epoch),
        _ => epoch,
    }
}

pub fn map_image(result: TenorResult, status: StatusCode) -> Result<Image, TenorError> {
    let formats = result.media_formats.unwrap_or_default();
    let full = formats
        .get(FULL_FORMAT)
        .map(media)
        .ok_or_else(|| TenorError::RemoteService {
            status,
            message: format!("result {} has no {} rendition", result.id, FULL_FORMAT),
        })?;
    let preview = formats.get(PREVIEW_FORMAT).map(media).unwrap_or_default();
    // older uploads only carry a title
    let description = result
        .content_description
        .filter(|description| !description.is_empty())
        .or(result.title)
        .unwrap_or_default();
    Ok(Image {
        id: result.id,
        remote_url: result.itemurl.unwrap_or_default(),
        short_remote_url: result.url.unwrap_or_default(),
        description,
        created_at: created_at(result.created),
        tags: result.tags.unwrap_or_default(),
        url: full.url,
        height: full.height,
        width: full.width,
        preview,
    })
}

pub fn map_category(category: TenorCategory) -> Category {
    Category {
        name: category.name,
        search_term: category.searchterm.unwrap_or_default(),
        path: category.path.unwrap_or_default(),
        image: category.image.unwrap_or_default(),
    }
}

/// Knows tenor's wire format and nothing about credentials or defaults,
/// those arrive already baked into each [`TenorRequest`]
pub struct TenorClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Url,
}

impl TenorClient {
    pub fn new(transport: Arc<dyn HttpTransport>, mut base_url: Url) -> Self {
        // without the trailing slash `join` would swap out the last segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Self {
            transport,
            base_url,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: &TenorRequest,
    ) -> Result<(StatusCode, T), TenorError> {
        let url = request
            .params
            .build(&self.base_url, &request.endpoint.to_string())?;
        let instant = Instant::now();
        let response = self.transport.get(&url).await?;
        debug!(
            "tenor {} responded with {} in {:?}",
            request.endpoint,
            response.status,
            instant.elapsed()
        );
        let status = response.status;
        let body = parse_successful_response::<T>(&url, response)?;
        Ok((status, body))
    }

    pub async fn images(&self, request: &TenorRequest) -> Result<SearchResult, TenorError> {
        let (status, page) = self.fetch::<TenorPage>(request).await?;
        let images = page
            .results
            .into_iter()
            .map(|result| map_image(result, status))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SearchResult {
            images,
            // tenor sends an empty string once there is nothing left
            next: page.next.filter(|next| !next.is_empty()),
        })
    }

    pub async fn categories(&self, request: &TenorRequest) -> Result<Vec<Category>, TenorError> {
        let (_, categories) = self.fetch::<TenorCategories>(request).await?;
        Ok(categories.tags.into_iter().map(map_category).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Datelike;

    use crate::request::mock::MockTransport;

    use super::*;

    const FULL_RECORD: &str = r#"{
        "id": "1234",
        "title": "",
        "content_description": "Cat Typing GIF",
        "itemurl": "https://tenor.com/view/cat-typing-1234",
        "url": "https://tenor.com/bX1.gif",
        "created": 1600000000.5,
        "tags": ["cat", "typing", "keyboard"],
        "media_formats": {
            "gif": {"url": "https://media.tenor.com/a/cat.gif", "dims": [498, 280]},
            "tinygif": {"url": "https://media.tenor.com/a/cat-tiny.gif", "dims": [220, 124]}
        }
    }"#;

    fn status() -> StatusCode {
        StatusCode::OK
    }

    fn client(transport: Arc<MockTransport>) -> TenorClient {
        TenorClient::new(transport, Url::parse(DEFAULT_BASE_URL).unwrap())
    }

    #[test]
    fn maps_every_field() {
        let raw = serde_json::from_str::<TenorResult>(FULL_RECORD).unwrap();
        let image = map_image(raw, status()).unwrap();
        assert_eq!(image.id, "1234");
        assert_eq!(image.remote_url, "https://tenor.com/view/cat-typing-1234");
        assert_eq!(image.short_remote_url, "https://tenor.com/bX1.gif");
        assert_eq!(image.description, "Cat Typing GIF");
        assert_eq!(image.created_at.timestamp(), 1600000000);
        assert_eq!(image.created_at.timestamp_subsec_millis(), 500);
        assert_eq!(image.tags, ["cat", "typing", "keyboard"]);
        assert_eq!(image.url, "https://media.tenor.com/a/cat.gif");
        assert_eq!((image.width, image.height), (498, 280));
        assert_eq!(
            image.preview,
            ImagePreview {
                url: "https://media.tenor.com/a/cat-tiny.gif".to_owned(),
                width: 220,
                height: 124,
            }
        );
    }

    #[test]
    fn absent_optional_fields_get_defaults() {
        let raw = serde_json::from_str::<TenorResult>(
            r#"{"id": "1", "tags": null, "media_formats": {"gif": {}}, "unknown": 3}"#,
        )
        .unwrap();
        let image = map_image(raw, status()).unwrap();
        assert!(image.tags.is_empty());
        assert_eq!(image.description, "");
        assert_eq!(image.remote_url, "");
        assert_eq!(image.url, "");
        assert_eq!((image.width, image.height), (0, 0));
        assert_eq!(image.preview, ImagePreview::default());
        assert_eq!(image.created_at.year(), 1970);
    }

    #[test]
    fn description_falls_back_to_title() {
        let raw = serde_json::from_str::<TenorResult>(
            r#"{"id": "1", "title": "dancing", "media_formats": {"gif": {}}}"#,
        )
        .unwrap();
        assert_eq!(map_image(raw, status()).unwrap().description, "dancing");
    }

    #[test]
    fn missing_gif_rendition_is_a_remote_error() {
        let raw = serde_json::from_str::<TenorResult>(
            r#"{"id": "1", "media_formats": {"mp4": {"url": "x"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            map_image(raw, status()),
            Err(TenorError::RemoteService { status, .. }) if status == StatusCode::OK
        ));
    }

    #[test]
    fn builds_urls_under_the_base() {
        let mut params = UrlBuilder::default();
        params.param("q", "cat & dog").param("limit", 5);
        let base = Url::parse("http://localhost:8080/v2/").unwrap();
        let url = params.build(&base, "search").unwrap();
        assert_eq!(url.path(), "/v2/search");
        assert_eq!(url.query(), Some("q=cat+%26+dog&limit=5"));
    }

    #[tokio::test]
    async fn base_url_without_trailing_slash_keeps_its_path() {
        let transport = Arc::new(MockTransport::new().respond(200, r#"{"tags": []}"#));
        let client = TenorClient::new(
            Arc::clone(&transport) as Arc<dyn HttpTransport>,
            Url::parse("http://localhost/v2").unwrap(),
        );
        let request = TenorRequest {
            endpoint: Endpoint::Categories,
            params: UrlBuilder::default(),
        };
        client.categories(&request).await.unwrap();
        assert_eq!(transport.last_request().path(), "/v2/categories");
    }

    #[tokio::test]
    async fn images_keep_remote_order_and_cursor() {
        let body = r#"{"results": [
            {"id": "b", "media_formats": {"gif": {"url": "b.gif"}}},
            {"id": "a", "media_formats": {"gif": {"url": "a.gif"}}}
        ], "next": "CAgQ"}"#;
        let transport = Arc::new(MockTransport::new().respond(200, body));
        let request = TenorRequest {
            endpoint: Endpoint::Featured,
            params: UrlBuilder::default(),
        };
        let result = client(Arc::clone(&transport)).images(&request).await.unwrap();
        let ids = result.images.iter().map(|i| i.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, ["b", "a"]);
        assert_eq!(result.next.as_deref(), Some("CAgQ"));
        assert_eq!(transport.last_request().path(), "/v2/featured");
    }

    #[tokio::test]
    async fn empty_cursor_means_no_next_page() {
        let transport = Arc::new(MockTransport::new().respond(200, r#"{"results": [], "next": ""}"#));
        let request = TenorRequest {
            endpoint: Endpoint::Search,
            params: UrlBuilder::default(),
        };
        let result = client(transport).images(&request).await.unwrap();
        assert_eq!(result, SearchResult::default());
    }

    #[tokio::test]
    async fn one_bad_record_fails_the_whole_page() {
        let body = r#"{"results": [
            {"id": "ok", "media_formats": {"gif": {"url": "ok.gif"}}},
            {"id": "bad"}
        ]}"#;
        let transport = Arc::new(MockTransport::new().respond(200, body));
        let request = TenorRequest {
            endpoint: Endpoint::Search,
            params: UrlBuilder::default(),
        };
        assert!(matches!(
            client(transport).images(&request).await,
            Err(TenorError::RemoteService { .. })
        ));
    }

    #[tokio::test]
    async fn maps_categories_in_order() {
        let body = r##"{"locale": "en", "tags": [
            {"searchterm": "excited", "path": "/v2/search?q=excited", "image": "e.gif", "name": "#excited"},
            {"name": "#sad"}
        ]}"##;
        let transport = Arc::new(MockTransport::new().respond(200, body));
        let request = TenorRequest {
            endpoint: Endpoint::Categories,
            params: UrlBuilder::default(),
        };
        let categories = client(transport).categories(&request).await.unwrap();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories[0].name, "#excited");
        assert_eq!(categories[0].search_term, "excited");
        assert_eq!(categories[1].name, "#sad");
        assert_eq!(categories[1].image, "");
    }

    #[tokio::test]
    async fn payload_of_the_wrong_shape_is_a_remote_error() {
        let transport = Arc::new(MockTransport::new().respond(200, r#"{"tags": "nope"}"#));
        let request = TenorRequest {
            endpoint: Endpoint::Categories,
            params: UrlBuilder::default(),
        };
        assert!(matches!(
            client(transport).categories(&request).await,
            Err(TenorError::RemoteService { .. })
        ));
    }
}
