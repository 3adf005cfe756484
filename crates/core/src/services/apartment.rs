//! Apartment directory client.
//!
//! The apartment service owns houses, apartments and fractional ownership.
//! Votings only read it once, at creation time, to snapshot who may vote.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use condo_common::{AppError, AppResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One apartment as reported by the apartment service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentInfo {
    pub id: Uuid,
    #[serde(default)]
    pub number: i32,
    pub total_area: f64,
    #[serde(default)]
    pub users: Vec<ApartmentShare>,
}

/// A user's fractional share of an apartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApartmentShare {
    pub user_id: Uuid,
    pub share: f64,
}

/// Source of house ownership data.
#[async_trait]
pub trait ApartmentDirectory: Send + Sync {
    /// All apartments of a house with their owners.
    ///
    /// An unknown house yields an empty list; an unreachable directory is
    /// an [`AppError::ExternalService`].
    async fn apartments_by_house(&self, house_id: Uuid) -> AppResult<Vec<ApartmentInfo>>;
}

/// Shared handle to an apartment directory.
pub type ApartmentDirectoryService = Arc<dyn ApartmentDirectory>;

/// Apartment directory backed by the apartment service's HTTP API.
#[derive(Clone)]
pub struct HttpApartmentDirectory {
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpApartmentDirectory {
    /// Create a client for the apartment service at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn house_url(&self, house_id: Uuid) -> String {
        format!("{}/api/apartments/house/{house_id}", self.base_url)
    }
}

#[async_trait]
impl ApartmentDirectory for HttpApartmentDirectory {
    async fn apartments_by_house(&self, house_id: Uuid) -> AppResult<Vec<ApartmentInfo>> {
        let response = self
            .http_client
            .get(self.house_url(house_id))
            .send()
            .await
            .map_err(|e| {
                AppError::ExternalService(format!("Apartment service unreachable: {e}"))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(%house_id, "House not known to the apartment service");
            return Ok(Vec::new());
        }

        if !response.status().is_success() {
            return Err(AppError::ExternalService(format!(
                "Apartment service returned {} for house {house_id}",
                response.status()
            )));
        }

        response.json::<Vec<ApartmentInfo>>().await.map_err(|e| {
            AppError::ExternalService(format!("Invalid apartment service response: {e}"))
        })
    }
}

/// Fixed, in-process apartment directory.
///
/// Used by tests and local runs without an apartment service.
#[derive(Debug, Clone, Default)]
pub struct InMemoryApartmentDirectory {
    houses: HashMap<Uuid, Vec<ApartmentInfo>>,
    unreachable: HashSet<Uuid>,
}

impl InMemoryApartmentDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a house and its apartments.
    #[must_use]
    pub fn with_house(mut self, house_id: Uuid, apartments: Vec<ApartmentInfo>) -> Self {
        self.houses.insert(house_id, apartments);
        self
    }

    /// Make lookups for `house_id` fail as if the service were down.
    #[must_use]
    pub fn with_unreachable_house(mut self, house_id: Uuid) -> Self {
        self.unreachable.insert(house_id);
        self
    }
}

#[async_trait]
impl ApartmentDirectory for InMemoryApartmentDirectory {
    async fn apartments_by_house(&self, house_id: Uuid) -> AppResult<Vec<ApartmentInfo>> {
        if self.unreachable.contains(&house_id) {
            return Err(AppError::ExternalService(format!(
                "Apartment service unreachable for house {house_id}"
            )));
        }
        Ok(self.houses.get(&house_id).cloned().unwrap_or_default())
    }
}
