//! PostgREST 数据网关
//!
//! Talks to a PostgREST-compatible backend (`/rest/v1/{table}`):
//! - counts: `HEAD` with `Prefer: count=exact`, total read from `Content-Range`
//! - lists: `GET` with `select`, `order` and `limit`
//! - changes: polls the scoped count and emits an event when it moves

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_RANGE;
use serde::de::DeserializeOwned;

use super::{
    ChangeEvent, ChangeStream, DataGateway, GatewayError, RecordSource, ScopedQuery, Table,
};
use crate::models::{
    AccountId, CleaningRecord, CleaningTask, Equipment, FreezingRecord, Product, Reception, Room,
    TemperatureReading,
};

/// Connection settings for [`RestGateway`]
#[derive(Debug, Clone)]
pub struct RestGatewayConfig {
    /// Service root, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Project API key, sent as `apikey`
    pub api_key: String,
    /// User access token; falls back to the API key for `Authorization`
    pub access_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Interval between change-detection probes
    pub change_poll_interval: Duration,
}

/// Clone is cheap: the underlying `reqwest::Client` is reference counted.
#[derive(Clone)]
pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    change_poll_interval: Duration,
}

/// Row listing request
struct ListRequest<'a> {
    table: Table,
    select: &'a str,
    order: Option<&'a str>,
    limit: Option<usize>,
}

impl RestGateway {
    pub fn new(config: RestGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Unreachable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            access_token: config.access_token,
            change_poll_interval: config.change_poll_interval,
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.as_str())
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        builder.header("apikey", &self.api_key).bearer_auth(bearer)
    }

    async fn list<T: DeserializeOwned>(
        &self,
        account: &AccountId,
        request: ListRequest<'_>,
    ) -> Result<Vec<T>, GatewayError> {
        let mut params = ScopedQuery::new(request.table, account).to_query_params();
        params.push(("select".to_string(), request.select.to_string()));
        if let Some(order) = request.order {
            params.push(("order".to_string(), order.to_string()));
        }
        if let Some(limit) = request.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let response = self
            .authorize(self.client.get(self.table_url(request.table)))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(response.json::<Vec<T>>().await?)
    }
}

#[async_trait]
impl DataGateway for RestGateway {
    async fn count(&self, query: &ScopedQuery) -> Result<u64, GatewayError> {
        let mut params = query.to_query_params();
        params.push(("select".to_string(), "id".to_string()));

        let response = self
            .authorize(self.client.head(self.table_url(query.table())))
            .header("Prefer", "count=exact")
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            // HEAD 响应没有 body，只能给出状态说明
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("unknown").to_string(),
            });
        }

        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or_else(|| {
                GatewayError::InvalidResponse(format!(
                    "missing or malformed Content-Range for {}",
                    query.table().as_str()
                ))
            })
    }

    fn subscribe(&self, table: Table, account: &AccountId) -> ChangeStream {
        let gateway = self.clone();
        let account = account.clone();
        let query = ScopedQuery::new(table, &account);

        Box::pin(async_stream::stream! {
            let mut ticker = tokio::time::interval(gateway.change_poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            let mut last_count: Option<u64> = None;

            loop {
                ticker.tick().await;
                match gateway.count(&query).await {
                    Ok(count) => {
                        if matches!(last_count, Some(previous) if previous != count) {
                            yield Ok(ChangeEvent {
                                table,
                                account: account.clone(),
                                observed_at: Utc::now(),
                            });
                        }
                        last_count = Some(count);
                    }
                    Err(e) => yield Err(e),
                }
            }
        })
    }
}

#[async_trait]
impl RecordSource for RestGateway {
    async fn list_equipment(&self, account: &AccountId) -> Result<Vec<Equipment>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::Equipment,
                select: "*",
                order: Some("name.asc"),
                limit: None,
            },
        )
        .await
    }

    async fn list_temperature_readings(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<TemperatureReading>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::TemperatureReadings,
                select: "*",
                order: Some("timestamp.desc"),
                limit: Some(limit),
            },
        )
        .await
    }

    async fn list_products(&self, account: &AccountId) -> Result<Vec<Product>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::Products,
                select: "*",
                order: Some("expiry_date.asc"),
                limit: None,
            },
        )
        .await
    }

    async fn list_receptions(&self, account: &AccountId) -> Result<Vec<Reception>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::Receptions,
                select: "*,reception_items(*)",
                order: Some("delivery_date.desc"),
                limit: None,
            },
        )
        .await
    }

    async fn list_freezing_records(
        &self,
        account: &AccountId,
    ) -> Result<Vec<FreezingRecord>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::FreezingRecords,
                select: "*",
                order: Some("created_at.desc"),
                limit: None,
            },
        )
        .await
    }

    async fn list_rooms(&self, account: &AccountId) -> Result<Vec<Room>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::Rooms,
                select: "*",
                order: Some("name.asc"),
                limit: None,
            },
        )
        .await
    }

    async fn list_cleaning_tasks(
        &self,
        account: &AccountId,
    ) -> Result<Vec<CleaningTask>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::CleaningTasks,
                select: "*",
                order: Some("due_date.asc"),
                limit: None,
            },
        )
        .await
    }

    async fn list_cleaning_records(
        &self,
        account: &AccountId,
        limit: usize,
    ) -> Result<Vec<CleaningRecord>, GatewayError> {
        self.list(
            account,
            ListRequest {
                table: Table::CleaningRecords,
                select: "*",
                order: Some("created_at.desc"),
                limit: Some(limit),
            },
        )
        .await
    }
}

/// Total from a `Content-Range` value such as `0-24/3573` or `*/0`
fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().split_once('/')?;
    total.parse().ok()
}
