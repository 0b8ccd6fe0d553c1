//! STAC API item search.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::error::{CatalogError, Result};
use videomap_common::{parse_date, BoundingBox, TimeRange};

/// Configuration for the STAC session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StacConfig {
    /// API root, without the trailing `/search`.
    pub api_url: String,

    pub collection: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Items requested per page.
    pub page_limit: usize,

    /// Upper bound on followed `next` links.
    pub max_pages: usize,
}

impl Default for StacConfig {
    fn default() -> Self {
        Self {
            api_url: "https://earth-search.aws.element84.com/v1".to_string(),
            collection: "sentinel-2-l2a".to_string(),
            timeout_secs: 60,
            page_limit: 100,
            max_pages: 50,
        }
    }
}

impl StacConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STAC_API_URL") {
            config.api_url = val;
        }

        if let Ok(val) = std::env::var("STAC_COLLECTION") {
            config.collection = val;
        }

        if let Ok(val) = std::env::var("STAC_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("STAC_PAGE_LIMIT") {
            if let Ok(limit) = val.parse() {
                config.page_limit = limit;
            }
        }

        config
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(format!("api_url must be an http(s) URL, got '{}'", self.api_url));
        }
        if self.collection.is_empty() {
            return Err("collection must not be empty".to_string());
        }
        if self.page_limit == 0 || self.max_pages == 0 {
            return Err("page_limit and max_pages must be positive".to_string());
        }
        Ok(())
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.api_url.trim_end_matches('/'))
    }
}

/// One scene returned by a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: String,
    pub datetime: DateTime<Utc>,
    /// Native projection of the scene, when advertised.
    pub epsg: Option<u32>,
    /// Asset name to href.
    pub assets: BTreeMap<String, String>,
}

impl SceneRecord {
    pub fn asset(&self, name: &str) -> Result<&str> {
        self.assets
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CatalogError::AssetMissing {
                scene: self.id.clone(),
                asset: name.to_string(),
            })
    }
}

#[derive(Debug, Serialize)]
struct SearchBody<'a> {
    collections: [&'a str; 1],
    bbox: [f64; 4],
    datetime: String,
    limit: usize,
}

/// A page of search results.
#[derive(Debug, Deserialize)]
pub(crate) struct ItemCollection {
    #[serde(default)]
    pub features: Vec<StacItem>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StacItem {
    pub id: String,
    #[serde(default)]
    pub properties: ItemProperties,
    #[serde(default)]
    pub assets: BTreeMap<String, StacAsset>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ItemProperties {
    pub datetime: Option<String>,
    #[serde(rename = "proj:epsg")]
    pub epsg: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StacAsset {
    pub href: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub body: Option<Value>,
    #[serde(default)]
    pub merge: bool,
}

/// How to fetch one page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PageRequest {
    Get(String),
    Post { url: String, body: Value },
}

/// A client bound to one STAC API and collection.
#[derive(Debug, Clone)]
pub struct StacSession {
    client: Client,
    config: StacConfig,
}

impl StacSession {
    /// Build the HTTP client for a catalog.
    pub fn open(config: StacConfig) -> Result<Self> {
        config.validate().map_err(CatalogError::config)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()?;

        info!(api_url = %config.api_url, collection = %config.collection, "Opened STAC session");
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &StacConfig {
        &self.config
    }

    /// Find every scene intersecting `bbox` during `range`, oldest first.
    #[instrument(skip(self), fields(collection = %self.config.collection))]
    pub async fn search(&self, bbox: &BoundingBox, range: &TimeRange) -> Result<Vec<SceneRecord>> {
        let datetime = range.to_stac_interval();
        let body = SearchBody {
            collections: [self.config.collection.as_str()],
            bbox: bbox.to_array(),
            datetime: datetime.clone(),
            limit: self.config.page_limit,
        };
        let body = serde_json::to_value(&body).map_err(|e| CatalogError::parse(e.to_string()))?;

        let mut request = PageRequest::Post {
            url: self.config.search_url(),
            body,
        };
        let mut scenes = Vec::new();

        for page in 0..self.config.max_pages {
            let collection = self.fetch(&request).await?;
            debug!(page, items = collection.features.len(), "Fetched search page");

            let next = next_page(&collection.links, &request);
            scenes.extend(into_records(collection.features).into_iter().filter(|scene| {
                let inside = range.contains(&scene.datetime);
                if !inside {
                    warn!(id = %scene.id, datetime = %scene.datetime, "Skipping item outside requested range");
                }
                inside
            }));

            match next {
                Some(next) => request = next,
                None => break,
            }

            if page + 1 == self.config.max_pages {
                warn!(max_pages = self.config.max_pages, "Stopped following next links");
            }
        }

        if scenes.is_empty() {
            return Err(CatalogError::NoScenes {
                bbox: bbox.to_array(),
                datetime,
            });
        }

        scenes.sort_by(|a, b| a.datetime.cmp(&b.datetime).then_with(|| a.id.cmp(&b.id)));
        info!(scenes = scenes.len(), "Found scenes");
        Ok(scenes)
    }

    async fn fetch(&self, request: &PageRequest) -> Result<ItemCollection> {
        let (url, builder) = match request {
            PageRequest::Get(url) => (url, self.client.get(url)),
            PageRequest::Post { url, body } => (url, self.client.post(url).json(body)),
        };

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
                url: url.clone(),
                body: text.chars().take(512).collect(),
            });
        }

        serde_json::from_str(&text).map_err(|e| CatalogError::parse(format!("{}: {}", url, e)))
    }
}

/// Convert raw items, skipping those without a usable datetime.
pub(crate) fn into_records(items: Vec<StacItem>) -> Vec<SceneRecord> {
    items
        .into_iter()
        .filter_map(|item| {
            let datetime = match item.properties.datetime.as_deref().map(parse_date) {
                Some(Ok(dt)) => dt,
                Some(Err(e)) => {
                    warn!(id = %item.id, error = %e, "Skipping item with invalid datetime");
                    return None;
                }
                None => {
                    warn!(id = %item.id, "Skipping item without datetime");
                    return None;
                }
            };

            Some(SceneRecord {
                id: item.id,
                datetime,
                epsg: item.properties.epsg,
                assets: item
                    .assets
                    .into_iter()
                    .map(|(name, asset)| (name, asset.href))
                    .collect(),
            })
        })
        .collect()
}

/// The request for the page after `current`, if the catalog links one.
pub(crate) fn next_page(links: &[Link], current: &PageRequest) -> Option<PageRequest> {
    let link = links.iter().find(|l| l.rel == "next")?;

    let is_post = link
        .method
        .as_deref()
        .map(|m| m.eq_ignore_ascii_case("POST"))
        .unwrap_or(false);
    if !is_post {
        return Some(PageRequest::Get(link.href.clone()));
    }

    let previous = match current {
        PageRequest::Post { body, .. } => body.clone(),
        PageRequest::Get(_) => Value::Object(Default::default()),
    };

    let body = match (&link.body, link.merge) {
        (Some(Value::Object(extra)), true) => {
            let mut merged = previous;
            if let Value::Object(map) = &mut merged {
                for (k, v) in extra {
                    map.insert(k.clone(), v.clone());
                }
            }
            merged
        }
        (Some(body), _) => body.clone(),
        (None, _) => previous,
    };

    Some(PageRequest::Post {
        url: link.href.clone(),
        body,
    })
}
