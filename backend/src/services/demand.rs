//! Loads the demand signals a shopping list is generated from

use sqlx::PgPool;
use uuid::Uuid;

use super::forecast::ForecastService;
use super::inventory::InventoryService;
use super::recipes::RecipeService;
use super::units::UnitService;
use crate::error::AppResult;
use shared::demand::DemandInputs;
use shared::PlanningWindow;

/// Demand service
#[derive(Clone)]
pub struct DemandService {
    db: PgPool,
}

impl DemandService {
    /// Create a new DemandService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Meals, stock, forecast and units for one planning window
    pub async fn load_inputs(
        &self,
        household_id: Uuid,
        window: &PlanningWindow,
        lookback_days: u32,
    ) -> AppResult<DemandInputs> {
        let meals = RecipeService::new(self.db.clone())
            .pending_meals(household_id, window)
            .await?;
        let articles = InventoryService::new(self.db.clone())
            .load_snapshots(household_id)
            .await?;
        let forecast = ForecastService::new(self.db.clone())
            .forecast(household_id, window.horizon_days(), lookback_days)
            .await?;
        let units = UnitService::new(self.db.clone()).load_catalog(household_id).await?;

        tracing::debug!(
            household_id = %household_id,
            meals = meals.len(),
            articles = articles.len(),
            forecast = forecast.len(),
            units = units.len(),
            "Loaded demand inputs"
        );

        Ok(DemandInputs {
            meals,
            articles,
            forecast,
            units,
        })
    }
}
