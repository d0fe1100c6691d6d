//! Remote provider over a PostgREST-style HTTP table.
//!
//! # Responsibility
//! - Map records to and from the `couple_records` row shape.
//! - Issue filtered reads, single inserts and delete-all requests.
//!
//! # Invariants
//! - Every request carries the `apikey` header and bearer credentials.
//! - Every request is bounded by the client timeout.
//! - Non-2xx responses become `ProviderError::Status`; bodies are capped.

use super::{Fingerprint, ProviderError, ProviderResult, RecordProvider};
use crate::config::RemoteSettings;
use crate::model::record::{Author, Record, RecordId, TimePeriod};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use log::{info, warn};
use reqwest::header::CONTENT_RANGE;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const REST_PATH: &str = "rest/v1";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// One row of the remote table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRow {
    pub id: RecordId,
    pub user_type: String,
    pub time_period: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub record_date: Option<NaiveDate>,
    /// Server-set; omitted on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl RemoteRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            id: record.id,
            user_type: record.author.as_str().to_string(),
            time_period: record.time_period.as_str().to_string(),
            content: Some(record.text.clone()),
            image_url: record.image.clone(),
            record_date: Some(record.record_date),
            created_at: None,
        }
    }

    /// Converts a row into a record; `fallback_created_at` covers servers that
    /// do not echo the creation timestamp.
    pub fn into_record(self, fallback_created_at: Option<DateTime<Utc>>) -> ProviderResult<Record> {
        let author = Author::parse(&self.user_type).ok_or_else(|| {
            ProviderError::Decode(format!(
                "invalid user_type `{}` in row {}",
                self.user_type, self.id
            ))
        })?;
        let time_period = TimePeriod::parse(&self.time_period).ok_or_else(|| {
            ProviderError::Decode(format!(
                "invalid time_period `{}` in row {}",
                self.time_period, self.id
            ))
        })?;
        let created_at = self.created_at.or(fallback_created_at).ok_or_else(|| {
            ProviderError::Decode(format!("row {} has no created_at", self.id))
        })?;

        Ok(Record {
            id: self.id,
            author,
            time_period,
            text: self.content.unwrap_or_default(),
            image: self.image_url.filter(|image| !image.is_empty()),
            created_at,
            record_date: self.record_date.unwrap_or_else(|| created_at.date_naive()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct FingerprintRow {
    id: RecordId,
    created_at: DateTime<Utc>,
}

/// HTTP table provider.
pub struct RemoteProvider {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl RemoteProvider {
    pub fn new(settings: &RemoteSettings, timeout: Duration) -> ProviderResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: table_endpoint(&settings.base_url, &settings.table),
            api_key: settings.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.client
            .request(method, &self.endpoint)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn fetch_rows<T: for<'de> Deserialize<'de>>(
        &self,
        query: &[(&str, String)],
    ) -> ProviderResult<Vec<T>> {
        let response = ensure_success(self.request(Method::GET).query(query).send().await?).await?;
        Ok(response.json::<Vec<T>>().await?)
    }
}

#[async_trait]
impl RecordProvider for RemoteProvider {
    fn provider_id(&self) -> &str {
        "remote"
    }

    async fn fetch_since(&self, cutoff: DateTime<Utc>) -> ProviderResult<Vec<Record>> {
        let started_at = Instant::now();
        let rows: Vec<RemoteRow> = self.fetch_rows(&fetch_since_query(cutoff)).await?;
        let records = rows
            .into_iter()
            .map(|row| row.into_record(None))
            .collect::<ProviderResult<Vec<_>>>()?;
        info!(
            "event=remote_fetch module=provider status=ok count={} duration_ms={}",
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(records)
    }

    async fn insert(&self, record: &Record) -> ProviderResult<Record> {
        let response = self
            .request(Method::POST)
            .header("Prefer", "return=representation")
            .json(&[RemoteRow::from_record(record)])
            .send()
            .await?;
        let rows: Vec<RemoteRow> = ensure_success(response).await?.json().await?;

        match rows.into_iter().next() {
            Some(row) => row.into_record(Some(record.created_at)),
            None => {
                warn!(
                    "event=remote_insert module=provider status=degraded id={} reason=empty_representation",
                    record.id
                );
                Ok(record.clone())
            }
        }
    }

    async fn delete_all(&self) -> ProviderResult<()> {
        let response = self
            .request(Method::DELETE)
            .query(&[("id", "neq.0")])
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Newest row plus the exact row count from `Content-Range`; one row on
    /// the wire regardless of table size.
    async fn fingerprint(&self) -> ProviderResult<Fingerprint> {
        let response = self
            .request(Method::GET)
            .header("Prefer", "count=exact")
            .query(&[
                ("select", "id,created_at"),
                ("order", "created_at.desc"),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let count = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(content_range_total)
            .ok_or_else(|| {
                ProviderError::Decode("fingerprint response has no Content-Range total".to_string())
            })?;
        let newest = response.json::<Vec<FingerprintRow>>().await?.into_iter().next();

        Ok(Fingerprint {
            count,
            newest_id: newest.as_ref().map(|row| row.id),
            newest_created_at: newest.map(|row| row.created_at),
        })
    }
}

fn table_endpoint(base_url: &str, table: &str) -> String {
    format!("{}/{REST_PATH}/{}", base_url.trim_end_matches('/'), table.trim())
}

fn fetch_since_query(cutoff: DateTime<Utc>) -> Vec<(&'static str, String)> {
    vec![
        ("select", "*".to_string()),
        (
            "created_at",
            format!("gte.{}", cutoff.to_rfc3339_opts(SecondsFormat::Millis, true)),
        ),
        ("order", "created_at.desc".to_string()),
    ]
}

/// Total from a `Content-Range` value such as `0-0/42` or `*/0`.
fn content_range_total(value: &str) -> Option<usize> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

async fn ensure_success(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Status {
        code: status.as_u16(),
        body: cap_chars(&body, MAX_ERROR_BODY_CHARS),
    })
}

fn cap_chars(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut capped: String = flattened.chars().take(max_chars).collect();
    capped.push_str("...");
    capped
}
