use axum::{
    extract::{Query, State},
    Json,
};
use service_core::error::{ApiResponse, AppError};

use super::parse_period;
use crate::{
    dtos::{MonthlyIncomeQuery, RentStatusQuery},
    middleware::{AdminOnly, Authorized},
    models::{MonthlyIncome, RentStatusReport},
    services::stats::{DEFAULT_INCOME_WINDOW, MAX_INCOME_WINDOW},
    AppState,
};

pub async fn rent_status(
    State(state): State<AppState>,
    _auth: Authorized<AdminOnly>,
    Query(query): Query<RentStatusQuery>,
) -> Result<Json<ApiResponse<RentStatusReport>>, AppError> {
    let period = query.period.as_deref().map(parse_period).transpose()?;
    let report = state.stats.rent_status(period).await?;
    Ok(ApiResponse::ok(report))
}

pub async fn monthly_income(
    State(state): State<AppState>,
    _auth: Authorized<AdminOnly>,
    Query(query): Query<MonthlyIncomeQuery>,
) -> Result<Json<ApiResponse<Vec<MonthlyIncome>>>, AppError> {
    let months = match query.months.as_deref() {
        None => DEFAULT_INCOME_WINDOW,
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=MAX_INCOME_WINDOW).contains(m))
            .ok_or_else(|| {
                AppError::UnprocessableEntity(anyhow::anyhow!(
                    "months must be an integer between 1 and {}",
                    MAX_INCOME_WINDOW
                ))
            })?,
    };

    let series = state.stats.monthly_income(months).await?;
    Ok(ApiResponse::ok(series))
}
