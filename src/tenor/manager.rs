use std::ops::RangeInclusive;
use std::sync::Arc;

use log::debug;
use url::Url;

use crate::request::HttpTransport;

use super::{
    Category, ContentFilter, Endpoint, SearchResult, TenorClient, TenorError, TenorRequest,
    UrlBuilder, DEFAULT_BASE_URL,
};

pub const DEFAULT_CLIENT_KEY: &str = "mcp-tenor-api";
pub const DEFAULT_LOCALE: &str = "en_US";
pub const DEFAULT_COUNTRY: &str = "US";

/// Tenor refuses to return more than 50 results per page
pub const SEARCH_LIMIT_RANGE: RangeInclusive<u32> = 1..=50;

/// Renditions requested for every image, anything else is dropped by tenor
/// before it reaches us
const MEDIA_FILTER: &str = "gif,tinygif";

#[derive(Debug, Clone)]
pub struct TenorSettings {
    pub api_key: Option<String>,
    pub client_key: Option<String>,
    pub country: String,
    pub locale: String,
    pub content_filter: ContentFilter,
    pub base_url: Option<Url>,
}

impl Default for TenorSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            client_key: None,
            country: DEFAULT_COUNTRY.to_owned(),
            locale: DEFAULT_LOCALE.to_owned(),
            content_filter: ContentFilter::default(),
            base_url: None,
        }
    }
}

/// The only way the tool layer talks to tenor. Holds credentials and
/// defaults for the life of the process and never mutates them, so a single
/// instance can serve any number of concurrent calls
pub struct TenorManager {
    api_key: String,
    client_key: String,
    country: String,
    locale: String,
    content_filter: ContentFilter,
    client: TenorClient,
}

impl TenorManager {
    pub fn new(
        settings: TenorSettings,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, TenorError> {
        let api_key = settings
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| TenorError::Configuration("an API key is required".to_owned()))?;
        let base_url = match settings.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL)
                .map_err(|err| TenorError::Configuration(err.to_string()))?,
        };
        Ok(Self {
            api_key,
            client_key: settings
                .client_key
                .unwrap_or_else(|| DEFAULT_CLIENT_KEY.to_owned()),
            country: settings.country,
            locale: settings.locale,
            content_filter: settings.content_filter,
            client: TenorClient::new(transport, base_url),
        })
    }

    fn request(&self, endpoint: Endpoint) -> TenorRequest {
        let mut params = UrlBuilder::default();
        params
            .param("key", &self.api_key)
            .param("client_key", &self.client_key)
            .param("locale", &self.locale)
            .param("country", &self.country)
            .param("contentfilter", self.content_filter);
        TenorRequest { endpoint, params }
    }

    pub async fn search(&self, term: &str, limit: u32) -> Result<SearchResult, TenorError> {
        let term = term.trim();
        if term.is_empty() {
            return Err(TenorError::InvalidArgument(
                "search term must not be empty".to_owned(),
            ));
        }
        if !SEARCH_LIMIT_RANGE.contains(&limit) {
            return Err(TenorError::InvalidArgument(format!(
                "limit must be between {} and {}, got {}",
                SEARCH_LIMIT_RANGE.start(),
                SEARCH_LIMIT_RANGE.end(),
                limit
            )));
        }
        debug!("Searching tenor for {:?} (limit {})", term, limit);
        let mut request = self.request(Endpoint::Search);
        request
            .params
            .param("q", term)
            .param("limit", limit)
            .param("media_filter", MEDIA_FILTER);
        self.client.images(&request).await
    }

    pub async fn trending(&self) -> Result<SearchResult, TenorError> {
        debug!("Fetching trending gifs");
        let mut request = self.request(Endpoint::Featured);
        request.params.param("media_filter", MEDIA_FILTER);
        self.client.images(&request).await
    }

    pub async fn categories(&self) -> Result<Vec<Category>, TenorError> {
        debug!("Fetching tenor categories");
        let request = self.request(Endpoint::Categories);
        self.client.categories(&request).await
    }
}
