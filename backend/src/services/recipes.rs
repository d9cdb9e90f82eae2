//! Recipes, meal plan entries and recipe cooking

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use super::consumption::consume_fifo;
use super::inventory::InventoryService;
use super::units::UnitService;
use crate::error::{AppError, AppResult};
use shared::cooking::{plan_cook, CookLine, MissingIngredient};
use shared::demand::PlannedMeal;
use shared::{
    validate_positive_quantity, ConsumptionSource, MealPlanEntry, PlanningWindow, Recipe,
    RecipeIngredient,
};

/// Recipe service for recipe loading and cooking
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    name: String,
    servings: Decimal,
}

#[derive(Debug, FromRow)]
struct IngredientRow {
    id: Uuid,
    recipe_id: Uuid,
    article_id: Option<Uuid>,
    category: Option<String>,
    name: Option<String>,
    quantity: Decimal,
    unit: String,
    optional: bool,
}

impl From<IngredientRow> for RecipeIngredient {
    fn from(row: IngredientRow) -> Self {
        Self {
            id: row.id,
            recipe_id: row.recipe_id,
            article_id: row.article_id,
            category: row.category,
            name: row.name,
            quantity: row.quantity,
            unit: row.unit,
            optional: row.optional,
        }
    }
}

/// Meal plan entry row; meal type stored as text
#[derive(Debug, FromRow)]
struct MealPlanEntryRow {
    id: Uuid,
    date: NaiveDate,
    meal_type: String,
    recipe_id: Uuid,
    servings: Decimal,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<MealPlanEntryRow> for MealPlanEntry {
    type Error = AppError;

    fn try_from(row: MealPlanEntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            date: row.date,
            meal_type: row.meal_type.parse()?,
            recipe_id: row.recipe_id,
            servings: row.servings,
            completed_at: row.completed_at,
        })
    }
}

const MEAL_COLUMNS: &str = "id, date, meal_type, recipe_id, servings, completed_at";

/// Input for cooking a recipe
#[derive(Debug, Default, Deserialize)]
pub struct CookInput {
    /// Servings to cook; the meal plan entry's or the recipe's servings when absent
    pub servings: Option<Decimal>,
    pub meal_plan_entry_id: Option<Uuid>,
}

/// Outcome of cooking a recipe
///
/// On failure nothing was consumed and `missing` lists every blocking ingredient.
#[derive(Debug, Clone, Serialize)]
pub struct CookResult {
    pub success: bool,
    pub recipe_id: Uuid,
    pub servings: Decimal,
    pub consumed: Vec<CookLine>,
    pub missing: Vec<MissingIngredient>,
}

async fn lock_meal_entry(
    conn: &mut PgConnection,
    household_id: Uuid,
    entry_id: Uuid,
) -> AppResult<MealPlanEntry> {
    sqlx::query_as::<_, MealPlanEntryRow>(&format!(
        "SELECT {MEAL_COLUMNS} FROM meal_plan_entries WHERE id = $1 AND household_id = $2 FOR UPDATE"
    ))
    .bind(entry_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Meal plan entry".to_string()))?
    .try_into()
}

impl RecipeService {
    /// Create a new RecipeService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Load recipes with their ingredients, keyed by id
    pub async fn load_recipes(&self, household_id: Uuid, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Recipe>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let recipes = sqlx::query_as::<_, RecipeRow>(
            "SELECT id, name, servings FROM recipes WHERE household_id = $1 AND id = ANY($2)",
        )
        .bind(household_id)
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        let ingredients = sqlx::query_as::<_, IngredientRow>(
            r#"
            SELECT id, recipe_id, article_id, category, name, quantity, unit, optional
            FROM recipe_ingredients
            WHERE recipe_id = ANY($1)
            ORDER BY recipe_id, position
            "#,
        )
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        let mut by_recipe: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
        for row in ingredients {
            by_recipe.entry(row.recipe_id).or_default().push(row.into());
        }

        Ok(recipes
            .into_iter()
            .map(|r| {
                let recipe = Recipe {
                    id: r.id,
                    name: r.name,
                    servings: r.servings,
                    ingredients: by_recipe.remove(&r.id).unwrap_or_default(),
                };
                (recipe.id, recipe)
            })
            .collect())
    }

    /// Get a recipe with its ingredients
    pub async fn get_recipe(&self, household_id: Uuid, recipe_id: Uuid) -> AppResult<Recipe> {
        self.load_recipes(household_id, &[recipe_id])
            .await?
            .remove(&recipe_id)
            .ok_or_else(|| AppError::NotFound("Recipe".to_string()))
    }

    /// Pending meal plan entries dated inside the window, with their recipes
    pub async fn pending_meals(&self, household_id: Uuid, window: &PlanningWindow) -> AppResult<Vec<PlannedMeal>> {
        let rows = sqlx::query_as::<_, MealPlanEntryRow>(&format!(
            r#"
            SELECT {MEAL_COLUMNS}
            FROM meal_plan_entries
            WHERE household_id = $1
              AND completed_at IS NULL
              AND date BETWEEN $2 AND $3
            ORDER BY date
            "#
        ))
        .bind(household_id)
        .bind(window.shop_date.date_naive())
        .bind(window.plan_until.date_naive())
        .fetch_all(&self.db)
        .await?;

        let entries = rows
            .into_iter()
            .map(MealPlanEntry::try_from)
            .collect::<AppResult<Vec<_>>>()?;

        let mut recipe_ids: Vec<Uuid> = entries.iter().map(|e| e.recipe_id).collect();
        recipe_ids.sort();
        recipe_ids.dedup();
        let recipes = self.load_recipes(household_id, &recipe_ids).await?;

        Ok(entries
            .into_iter()
            .filter_map(|entry| {
                let recipe = recipes.get(&entry.recipe_id)?.clone();
                Some(PlannedMeal { entry, recipe })
            })
            .collect())
    }

    /// Cook a recipe, consuming every required ingredient or nothing at all
    pub async fn cook_recipe(&self, household_id: Uuid, recipe_id: Uuid, input: CookInput) -> AppResult<CookResult> {
        if let Some(servings) = input.servings {
            validate_positive_quantity(servings).map_err(|e| AppError::validation("servings", e))?;
        }

        let recipe = self.get_recipe(household_id, recipe_id).await?;

        let mut tx = self.db.begin().await?;

        let entry = match input.meal_plan_entry_id {
            Some(entry_id) => {
                let entry = lock_meal_entry(&mut tx, household_id, entry_id).await?;
                if entry.recipe_id != recipe.id {
                    return Err(AppError::validation(
                        "meal_plan_entry_id",
                        "Meal plan entry is for a different recipe",
                    ));
                }
                if !entry.is_pending() {
                    return Err(AppError::conflict("meal_plan_entry", "Meal has already been cooked"));
                }
                Some(entry)
            }
            None => None,
        };
        let servings = input
            .servings
            .or(entry.as_ref().map(|e| e.servings))
            .unwrap_or(recipe.servings);

        let articles = InventoryService::new(self.db.clone()).load_snapshots(household_id).await?;
        let units = UnitService::new(self.db.clone()).load_catalog(household_id).await?;
        let plan = plan_cook(&recipe, servings, &articles, &units);

        if !plan.is_ready() {
            tracing::info!(
                recipe = %recipe.name,
                missing = plan.missing.len(),
                "Recipe cannot be cooked"
            );
            return Ok(CookResult {
                success: false,
                recipe_id: recipe.id,
                servings,
                consumed: Vec::new(),
                missing: plan.missing,
            });
        }

        // stock may have moved since the snapshot; the locked batches decide
        let mut missing = Vec::new();
        for line in &plan.lines {
            let outcome = consume_fifo(
                &mut tx,
                household_id,
                line.article_id,
                line.quantity,
                ConsumptionSource::Recipe,
                Some(recipe.id),
                Some(&recipe.name),
            )
            .await?;
            if outcome.remaining > Decimal::ZERO {
                missing.push(MissingIngredient {
                    ingredient_id: line.ingredient_id,
                    article_id: Some(line.article_id),
                    name: line.name.clone(),
                    required: line.quantity,
                    available: outcome.consumed,
                    unit: line.unit.clone(),
                    error: format!("Insufficient stock: short by {} {}", outcome.remaining, line.unit),
                });
            }
        }

        if !missing.is_empty() {
            tx.rollback().await?;
            tracing::info!(recipe = %recipe.name, missing = missing.len(), "Recipe cannot be cooked");
            return Ok(CookResult {
                success: false,
                recipe_id: recipe.id,
                servings,
                consumed: Vec::new(),
                missing,
            });
        }

        if let Some(entry) = &entry {
            sqlx::query("UPDATE meal_plan_entries SET completed_at = NOW() WHERE id = $1")
                .bind(entry.id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            recipe = %recipe.name,
            servings = %servings,
            ingredients = plan.lines.len(),
            "Recipe cooked"
        );

        Ok(CookResult {
            success: true,
            recipe_id: recipe.id,
            servings,
            consumed: plan.lines,
            missing: Vec::new(),
        })
    }
}
