use std::env;
use std::str::FromStr;

use log::info;
use strum::IntoEnumIterator;
use url::Url;

use crate::tenor::{
    ContentFilter, TenorError, TenorSettings, DEFAULT_CLIENT_KEY, DEFAULT_COUNTRY, DEFAULT_LOCALE,
};

fn content_filter(value: &str) -> Result<ContentFilter, TenorError> {
    ContentFilter::from_str(&value.trim().to_lowercase()).map_err(|_| {
        let allowed = ContentFilter::iter()
            .map(|filter| filter.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        TenorError::Configuration(format!(
            "CONTENT_FILTER must be one of {}, got {:?}",
            allowed, value
        ))
    })
}

/// Build settings out of anything that behaves like the environment.
/// Blank values count as missing
pub fn settings_from(lookup: impl Fn(&str) -> Option<String>) -> Result<TenorSettings, TenorError> {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    let api_key = var("API_KEY").ok_or_else(|| {
        TenorError::Configuration("API_KEY environment variable is required".to_owned())
    })?;
    let content_filter = match var("CONTENT_FILTER") {
        Some(value) => content_filter(&value)?,
        None => ContentFilter::default(),
    };
    let base_url = var("TENOR_BASE_URL")
        .map(|value| {
            Url::parse(&value).map_err(|err| {
                TenorError::Configuration(format!("TENOR_BASE_URL is not a valid url: {}", err))
            })
        })
        .transpose()?;

    Ok(TenorSettings {
        api_key: Some(api_key),
        client_key: Some(var("CLIENT_KEY").unwrap_or_else(|| DEFAULT_CLIENT_KEY.to_owned())),
        country: var("COUNTRY").unwrap_or_else(|| DEFAULT_COUNTRY.to_owned()),
        locale: var("LOCALE").unwrap_or_else(|| DEFAULT_LOCALE.to_owned()),
        content_filter,
        base_url,
    })
}

/// Reads the process environment, after loading `.env` if one exists
pub fn settings_from_env() -> Result<TenorSettings, TenorError> {
    if let Ok(path) = dotenv::dotenv() {
        info!("Loaded environment from {}", path.display());
    }
    settings_from(|key| env::var(key).ok())
}
