use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::json;

use crate::config::Config;
use crate::model::{GroceryItem, ItemUpdate};

/// HTTP client for the groceries backend: the snapshot read plus the three
/// write endpoints.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: Config,
}

impl ApiClient {
    pub fn new(config: Config) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
        Ok(Self { client, config })
    }

    /// Fetch the full current list.
    pub async fn fetch_snapshot(&self) -> Result<Vec<GroceryItem>> {
        let url = self.config.http_url("/groceries")?;
        let response = check(self.client.get(url).send().await?, "snapshot fetch").await?;
        response
            .json()
            .await
            .context("snapshot body was not a JSON item list")
    }

    /// Create an item. The server echoes the new item back, but list state
    /// is only ever updated from the broadcast event, never from this
    /// response.
    pub async fn create_item(&self, name: &str, quantity: Option<u32>) -> Result<GroceryItem> {
        let url = self.config.http_url("/groceries")?;
        let mut body = json!({ "name": name });
        if let Some(quantity) = quantity {
            body["quantity"] = json!(quantity);
        }
        let response = check(self.client.post(url).json(&body).send().await?, "create").await?;
        response.json().await.context("create response was not an item")
    }

    /// Apply a partial update to one item.
    pub async fn update_item(&self, id: i64, update: &ItemUpdate) -> Result<GroceryItem> {
        let url = self.config.http_url(&format!("/groceries/{id}"))?;
        let response = check(self.client.put(url).json(update).send().await?, "update").await?;
        response.json().await.context("update response was not an item")
    }

    pub async fn delete_item(&self, id: i64) -> Result<()> {
        let url = self.config.http_url(&format!("/groceries/{id}"))?;
        check(self.client.delete(url).send().await?, "delete").await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!("{action} failed: {status} - {body}")
}
