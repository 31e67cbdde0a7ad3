use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::StageError;
use crate::models::TrendPoint;

/// The external trend-source capability. Errors carry the adapter's own
/// message so diagnostics show it verbatim.
#[async_trait]
pub trait TrendSource: Send + Sync {
    async fn fetch(&self, keyword: &str, region: Option<&str>)
        -> Result<Vec<TrendPoint>, StageError>;
}

const SEARCH_URL: &str = "https://serpapi.com/search.json";
const TIMESERIES_WINDOW: &str = "now 12-m";
const MAX_POINTS: usize = 52;

/// Google Trends interest-over-time via SerpAPI.
pub struct SerpApiTrends {
    client: reqwest::Client,
    api_key: String,
}

impl SerpApiTrends {
    pub fn new(api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(SerpApiTrends { client, api_key })
    }
}

#[async_trait]
impl TrendSource for SerpApiTrends {
    async fn fetch(
        &self,
        keyword: &str,
        region: Option<&str>,
    ) -> Result<Vec<TrendPoint>, StageError> {
        if self.api_key.is_empty() {
            return Err(StageError::Fetch("SERPAPI_KEY is not set".to_string()));
        }

        let mut params = vec![
            ("engine", "google_trends".to_string()),
            ("q", keyword.to_string()),
            ("data_type", "TIMESERIES".to_string()),
            ("time", TIMESERIES_WINDOW.to_string()),
            ("tz", "0".to_string()),
            ("api_key", self.api_key.clone()),
        ];
        if let Some(geo) = region {
            params.push(("geo", geo.to_string()));
        }

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&params)
            .send()
            .await
            .map_err(|e| StageError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StageError::Fetch(format!("SerpAPI {status}: {body}")));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| StageError::Fetch(e.to_string()))?;

        if let Some(message) = parsed.error {
            return Err(StageError::Fetch(message));
        }

        let timeline = parsed
            .interest_over_time
            .map(|i| i.timeline_data)
            .unwrap_or_default();
        if timeline.is_empty() {
            return Err(StageError::Fetch(
                "SerpAPI returned an empty timeline".to_string(),
            ));
        }

        Ok(timeline_to_points(&timeline))
    }
}

/// Maps the raw timeline onto the trailing year of points.
fn timeline_to_points(timeline: &[TimelineEntry]) -> Vec<TrendPoint> {
    let start = timeline.len().saturating_sub(MAX_POINTS);
    timeline[start..]
        .iter()
        .map(|entry| TrendPoint {
            label: entry.date.clone(),
            interest: entry.values.first().map(TimelineValue::interest).unwrap_or(0),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    interest_over_time: Option<InterestOverTime>,
}

#[derive(Debug, Deserialize)]
struct InterestOverTime {
    #[serde(default)]
    timeline_data: Vec<TimelineEntry>,
}

#[derive(Debug, Deserialize)]
struct TimelineEntry {
    #[serde(default)]
    date: String,
    #[serde(default)]
    values: Vec<TimelineValue>,
}

#[derive(Debug, Deserialize)]
struct TimelineValue {
    #[serde(default)]
    extracted_value: Option<f64>,
    // SerpAPI sometimes reports the value as a bare string instead.
    #[serde(default)]
    value: Option<serde_json::Value>,
}

impl TimelineValue {
    fn interest(&self) -> i64 {
        if let Some(extracted) = self.extracted_value {
            return extracted.round() as i64;
        }
        match &self.value {
            Some(serde_json::Value::Number(n)) => {
                n.as_f64().map(|f| f.round() as i64).unwrap_or(0)
            }
            Some(serde_json::Value::String(s)) => {
                s.parse::<f64>().map(|f| f.round() as i64).unwrap_or(0)
            }
            _ => 0,
        }
    }
}
