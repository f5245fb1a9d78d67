//! Passthrough client for the public SpaceX launch-data API.
//!
//! One unauthenticated GET per call, no retry and no caching. A request
//! timeout is always set.

use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::config::LaunchesConfig;
use crate::error::{RagError, RagResult};
use crate::models::LaunchSummary;
use crate::retry::snippet;

#[derive(Clone)]
pub struct LaunchClient {
    client: reqwest::Client,
    base_url: String,
}

impl LaunchClient {
    pub fn new(config: &LaunchesConfig) -> RagResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::UpstreamLaunchData(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `GET /launches/latest`, reshaped to name, date and outcome.
    pub async fn latest(&self) -> RagResult<LaunchSummary> {
        let body = self.get_json("/launches/latest").await?;
        summarize(&body)
    }

    /// The `limit` most recent raw launch records, newest first.
    pub async fn recent(&self, limit: usize) -> RagResult<Vec<Value>> {
        let body = self.get_json("/launches").await?;
        let Value::Array(mut launches) = body else {
            return Err(RagError::UpstreamLaunchData(
                "expected a JSON array of launches".to_string(),
            ));
        };
        launches.sort_by(|a, b| date_of(b).cmp(date_of(a)));
        launches.truncate(limit);
        Ok(launches)
    }

    async fn get_json(&self, path: &str) -> RagResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RagError::UpstreamLaunchData(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RagError::UpstreamLaunchData(format!(
                "{} returned {}: {}",
                url,
                status,
                snippet(&text)
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::UpstreamLaunchData(format!("malformed JSON from {}: {}", url, e)))
    }
}

fn date_of(launch: &Value) -> &str {
    launch.get("date_utc").and_then(Value::as_str).unwrap_or("")
}

fn summarize(body: &Value) -> RagResult<LaunchSummary> {
    let field = |name: &str| {
        body.get(name)
            .ok_or_else(|| RagError::UpstreamLaunchData(format!("launch record missing '{}'", name)))
    };

    let name = field("name")?
        .as_str()
        .ok_or_else(|| RagError::UpstreamLaunchData("'name' is not a string".to_string()))?;
    let date_utc = field("date_utc")?
        .as_str()
        .ok_or_else(|| RagError::UpstreamLaunchData("'date_utc' is not a string".to_string()))?;
    let success = match field("success")? {
        Value::Bool(b) => Some(*b),
        Value::Null => None,
        _ => {
            return Err(RagError::UpstreamLaunchData(
                "'success' is not a boolean".to_string(),
            ))
        }
    };

    Ok(LaunchSummary {
        name: name.to_string(),
        date_utc: date_utc.to_string(),
        success,
    })
}
