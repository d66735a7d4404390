//! services/api/src/adapters/search.rs
//!
//! The concrete implementation of the `SearchIndexService` port. Published
//! timetables are pushed to the external search service over HTTP.

use crate::adapters::ids::TimetableIdCodec;
use crate::web::protocol::TimetableView;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use timetable_core::{PortError, PortResult, SearchIndexService, Timetable, TimetableId};

#[derive(Serialize)]
struct RemoveRequest {
    id: String,
}

pub struct SearchIndexAdapter {
    client: Client,
    base_url: String,
    ids: Arc<TimetableIdCodec>,
}

impl SearchIndexAdapter {
    /// Creates a new `SearchIndexAdapter` for the service at `base_url`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        ids: Arc<TimetableIdCodec>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ids,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn encode_id(&self, id: TimetableId) -> PortResult<String> {
        self.ids
            .encode(id)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

/// Anything but a 2xx is a failed index update.
async fn ensure_success(response: Response) -> PortResult<()> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(PortError::Unexpected(format!(
        "search service returned {}: {}",
        status, body
    )))
}

fn unreachable(e: reqwest::Error) -> PortError {
    PortError::Unexpected(format!("search service request failed: {}", e))
}

#[async_trait]
impl SearchIndexService for SearchIndexAdapter {
    async fn add_timetable(&self, timetable: &Timetable) -> PortResult<()> {
        let snapshot = TimetableView::from_domain(timetable, &self.ids)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let response = self
            .client
            .post(self.url("/timetable/add"))
            .json(&snapshot)
            .send()
            .await
            .map_err(unreachable)?;
        ensure_success(response).await
    }

    async fn remove_timetable(&self, id: TimetableId) -> PortResult<()> {
        let body = RemoveRequest {
            id: self.encode_id(id)?,
        };
        let response = self
            .client
            .delete(self.url("/timetable/remove"))
            .json(&body)
            .send()
            .await
            .map_err(unreachable)?;
        ensure_success(response).await
    }
}
