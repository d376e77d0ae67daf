use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    pub async fn create_location(&self, token: &str, npa: u32, city: &str) -> Result<Value> {
        let url = format!("{}/locations", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({ "npa": npa, "city": city }))
            .send()
            .await
            .context("Failed to create location")?;

        Self::data(response, "create location").await
    }

    pub async fn update_location(&self, token: &str, location_id: &str, city: &str) -> Result<Value> {
        let url = format!("{}/locations/{}", self.base_url, location_id);

        let response = self
            .client
            .patch(&url)
            .bearer_auth(token)
            .json(&json!({ "city": city }))
            .send()
            .await
            .context("Failed to update location")?;

        Self::data(response, "update location").await
    }

    pub async fn delete_location(&self, token: &str, location_id: &str) -> Result<()> {
        let url = format!("{}/locations/{}", self.base_url, location_id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .context("Failed to delete location")?;

        Self::data(response, "delete location").await.map(|_| ())
    }

    /// Unwraps the `data` member of the server's response envelope.
    async fn data(response: reqwest::Response, action: &str) -> Result<Value> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            anyhow::bail!("Failed to {}: {} - Response: {}", action, status, body);
        }

        let mut api_response: Value = response.json().await.context("Failed to parse response")?;
        Ok(api_response["data"].take())
    }
}
