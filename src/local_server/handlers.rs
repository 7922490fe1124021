//! HTTP 路由处理器
//!
//! 实现 /api/session、/api/dashboard 和记录列表等 API 端点

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::analytics::calculator::{
    freezing_view, product_view, summarize_cleaning, summarize_freezing, summarize_products,
    summarize_receptions, summarize_temperature,
};
use crate::analytics::{
    CleaningSummary, FreezingSummary, FreezingView, ProductSummary, ProductView,
    ReceptionSummary, StatsWindow, TemperatureSummary,
};
use crate::dashboard::{DashboardSnapshot, MonitorHandle};
use crate::error::AppError;
use crate::gateway::RecordSource;
use crate::models::{
    AccountId, CleaningRecord, CleaningTask, Equipment, Reception, Room, TemperatureReading,
};
use crate::session::{Session, SessionProvider};

/// 温度记录默认条数
pub const DEFAULT_READING_LIMIT: usize = 100;
/// 单次请求最多返回的温度记录
pub const MAX_READING_LIMIT: usize = 500;
/// 清洁记录条数
pub const CLEANING_HISTORY_LIMIT: usize = 50;

/// 共享状态
pub struct AppState {
    pub sessions: SessionProvider,
    pub monitor: MonitorHandle,
    pub records: Arc<dyn RecordSource>,
}

impl AppState {
    fn require_account(&self) -> Result<AccountId, AppError> {
        self.sessions.current_account().ok_or(AppError::NoSession)
    }
}

type SharedState = State<Arc<AppState>>;

/// GET /api/health
///
/// 健康检查端点
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({
        "status": "ok",
        "service": "haccp-dashboard",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

// ===== Session =====

#[derive(Debug, Clone, Deserialize)]
pub struct SignInRequest {
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub signed_in: bool,
    pub session: Option<Session>,
}

/// GET /api/session
pub async fn get_session(State(state): SharedState) -> Json<SessionResponse> {
    let session = state.sessions.current();
    Json(SessionResponse {
        signed_in: session.is_some(),
        session,
    })
}

/// POST /api/session
///
/// 切换当前账户；进行中的统计会被丢弃
pub async fn sign_in(
    State(state): SharedState,
    Json(request): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let account = AccountId::parse(&request.account_id)
        .ok_or_else(|| AppError::InvalidInput("account_id must not be blank".to_string()))?;
    let session = state.sessions.sign_in(account);
    Ok(Json(SessionResponse {
        signed_in: true,
        session: Some(session),
    }))
}

/// DELETE /api/session
pub async fn sign_out(State(state): SharedState) -> StatusCode {
    state.sessions.sign_out();
    StatusCode::NO_CONTENT
}

// ===== Dashboard =====

/// GET /api/dashboard/stats
///
/// 未登录时返回空快照
pub async fn dashboard_stats(State(state): SharedState) -> Json<DashboardSnapshot> {
    Json(state.monitor.snapshot())
}

/// POST /api/dashboard/refresh
pub async fn refresh_dashboard(State(state): SharedState) -> Result<impl IntoResponse, AppError> {
    state.require_account()?;
    if !state.monitor.refresh() {
        return Err(AppError::internal("Dashboard monitor is not running"));
    }
    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "status": "refreshing" }))))
}

// ===== Record pages =====

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadingParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TemperaturePage {
    pub equipment: Vec<Equipment>,
    pub readings: Vec<TemperatureReading>,
    pub summary: TemperatureSummary,
}

#[derive(Debug, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub summary: ProductSummary,
}

#[derive(Debug, Serialize)]
pub struct ReceptionPage {
    pub receptions: Vec<Reception>,
    pub summary: ReceptionSummary,
}

#[derive(Debug, Serialize)]
pub struct FreezingPage {
    pub records: Vec<FreezingView>,
    pub summary: FreezingSummary,
}

#[derive(Debug, Serialize)]
pub struct CleaningPage {
    pub rooms: Vec<Room>,
    pub tasks: Vec<CleaningTask>,
    pub history: Vec<CleaningRecord>,
    pub summary: CleaningSummary,
}

/// GET /api/temperature?limit=
pub async fn temperature_page(
    State(state): SharedState,
    Query(params): Query<ReadingParams>,
) -> Result<Json<TemperaturePage>, AppError> {
    let account = state.require_account()?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_READING_LIMIT)
        .clamp(1, MAX_READING_LIMIT);

    let (equipment, readings) = tokio::try_join!(
        state.records.list_equipment(&account),
        state.records.list_temperature_readings(&account, limit),
    )?;
    let summary = summarize_temperature(&readings);

    Ok(Json(TemperaturePage {
        equipment,
        readings,
        summary,
    }))
}

/// GET /api/products
pub async fn products_page(State(state): SharedState) -> Result<Json<ProductPage>, AppError> {
    let account = state.require_account()?;
    let window = StatsWindow::now_local();

    let products = state.records.list_products(&account).await?;
    let summary = summarize_products(&products, &window);
    let products = products
        .into_iter()
        .map(|p| product_view(p, window.today))
        .collect();

    Ok(Json(ProductPage { products, summary }))
}

/// GET /api/receptions
pub async fn receptions_page(State(state): SharedState) -> Result<Json<ReceptionPage>, AppError> {
    let account = state.require_account()?;
    let window = StatsWindow::now_local();

    let receptions = state.records.list_receptions(&account).await?;
    let summary = summarize_receptions(&receptions, &window);

    Ok(Json(ReceptionPage { receptions, summary }))
}

/// GET /api/freezing
pub async fn freezing_page(State(state): SharedState) -> Result<Json<FreezingPage>, AppError> {
    let account = state.require_account()?;
    let now = chrono::Utc::now();

    let records = state.records.list_freezing_records(&account).await?;
    let summary = summarize_freezing(&records);
    let records = records.into_iter().map(|r| freezing_view(r, now)).collect();

    Ok(Json(FreezingPage { records, summary }))
}

/// GET /api/cleaning
pub async fn cleaning_page(State(state): SharedState) -> Result<Json<CleaningPage>, AppError> {
    let account = state.require_account()?;
    let window = StatsWindow::now_local();

    let (rooms, tasks, history) = tokio::try_join!(
        state.records.list_rooms(&account),
        state.records.list_cleaning_tasks(&account),
        state.records.list_cleaning_records(&account, CLEANING_HISTORY_LIMIT),
    )?;
    let summary = summarize_cleaning(&tasks, &window);

    Ok(Json(CleaningPage {
        rooms,
        tasks,
        history,
        summary,
    }))
}
