//! Pets API client and the fetchers built on it.
//!
//! Each fetcher reads its parameters out of the query key, so the key is
//! the only input the cache needs to reproduce a request:
//!
//! - `["breeds", animal]` → `GET /breeds?animal=`
//! - `["search", {animal, breed, location}]` → `GET /pets?animal=&location=&breed=`
//! - `["details", id]` → `GET /pets?id=`

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use stow_client::{FetchError, Fetcher, KeyPart, QueryKey};

use crate::config::ApiConfig;

/// A pet listing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    pub animal: String,
    pub breed: String,
    pub city: String,
    pub state: String,
    pub description: String,
    pub images: Vec<String>,
}

impl Pet {
    /// One-line summary, e.g. `Luna (dog, Havanese) - Seattle, WA`.
    pub fn summary(&self) -> String {
        format!(
            "{} ({}, {}) - {}, {}",
            self.name, self.animal, self.breed, self.city, self.state
        )
    }
}

/// Response of `/breeds`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BreedList {
    pub animal: String,
    pub breeds: Vec<String>,
}

/// Response of `/pets`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PetSearch {
    pub number_of_results: u64,
    pub start_index: u64,
    pub end_index: u64,
    pub has_next: bool,
    pub pets: Vec<Pet>,
}

/// HTTP client for the pets API.
#[derive(Clone)]
pub struct PetsApi {
    client: reqwest::Client,
    base_url: String,
}

impl PetsApi {
    /// Build a client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, ?query, "GET");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

fn text_part(part: Option<&KeyPart>) -> String {
    part.and_then(KeyPart::as_text).unwrap_or_default().to_string()
}

/// Fetches `["breeds", animal]`.
#[derive(Clone)]
pub struct BreedsFetcher(pub PetsApi);

#[async_trait]
impl Fetcher<BreedList> for BreedsFetcher {
    async fn fetch(&self, key: &QueryKey) -> Result<BreedList, FetchError> {
        let animal = text_part(key.part(1));
        if animal.is_empty() {
            return Ok(BreedList::default());
        }
        self.0.get_json("/breeds", &[("animal", animal)]).await
    }
}

/// Fetches `["search", {animal, breed, location}]`.
#[derive(Clone)]
pub struct SearchFetcher(pub PetsApi);

#[async_trait]
impl Fetcher<PetSearch> for SearchFetcher {
    async fn fetch(&self, key: &QueryKey) -> Result<PetSearch, FetchError> {
        let params = key
            .part(1)
            .ok_or_else(|| FetchError::UnsupportedKey(key.to_string()))?;
        let query = [
            ("animal", text_part(params.field("animal"))),
            ("location", text_part(params.field("location"))),
            ("breed", text_part(params.field("breed"))),
        ];
        self.0.get_json("/pets", &query).await
    }
}

/// Fetches `["details", id]`.
#[derive(Clone)]
pub struct DetailsFetcher(pub PetsApi);

#[async_trait]
impl Fetcher<PetSearch> for DetailsFetcher {
    async fn fetch(&self, key: &QueryKey) -> Result<PetSearch, FetchError> {
        match key.part(1) {
            Some(KeyPart::Int(id)) => self.0.get_json("/pets", &[("id", id.to_string())]).await,
            _ => Err(FetchError::UnsupportedKey(key.to_string())),
        }
    }
}

/// Key for the breed list of `animal`.
pub fn breeds_key(animal: &str) -> QueryKey {
    QueryKey::scope("breeds").with(animal)
}

/// Key for a pet search.
pub fn search_key(animal: &str, location: &str, breed: &str) -> QueryKey {
    QueryKey::scope("search").with(KeyPart::map([
        ("animal", animal),
        ("location", location),
        ("breed", breed),
    ]))
}

/// Key for one pet's details.
pub fn details_key(id: i64) -> QueryKey {
    QueryKey::scope("details").with(id)
}
