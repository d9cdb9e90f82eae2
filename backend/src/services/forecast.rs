//! Consumption forecast over recorded manual consumption

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppResult;
use shared::forecast::rolling_average_forecast;

/// Forecast service
#[derive(Clone)]
pub struct ForecastService {
    db: PgPool,
}

impl ForecastService {
    /// Create a new ForecastService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Expected consumption per article over the next `horizon_days`
    ///
    /// Only MANUAL consumption counts: recipe consumption is already covered
    /// by the meal plan, and corrections or waste are not demand.
    pub async fn forecast(
        &self,
        household_id: Uuid,
        horizon_days: Decimal,
        lookback_days: u32,
    ) -> AppResult<HashMap<Uuid, Decimal>> {
        if lookback_days == 0 {
            return Ok(HashMap::new());
        }
        let since = Utc::now() - Duration::days(i64::from(lookback_days));

        let totals: Vec<(Uuid, Decimal)> = sqlx::query_as(
            r#"
            SELECT l.article_id, SUM(l.quantity)
            FROM consumption_logs l
            JOIN articles a ON a.id = l.article_id
            WHERE l.household_id = $1
              AND l.source = 'MANUAL'
              AND l.direction = 'consumption'
              AND l.consumed_at >= $2
              AND a.consumable
            GROUP BY l.article_id
            "#,
        )
        .bind(household_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let consumed: HashMap<Uuid, Decimal> = totals.into_iter().collect();
        let forecast = rolling_average_forecast(&consumed, lookback_days, horizon_days);

        tracing::debug!(
            household_id = %household_id,
            articles = forecast.len(),
            horizon_days = %horizon_days,
            "Computed consumption forecast"
        );

        Ok(forecast)
    }
}
