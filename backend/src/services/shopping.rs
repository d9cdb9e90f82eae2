//! Shopping list generation, editing and completion

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use super::demand::DemandService;
use super::inventory::{fetch_article, InventoryService};
use super::units::UnitService;
use crate::config::PlanningConfig;
use crate::error::{AppError, AppResult};
use shared::demand::aggregate;
use shared::planning::{estimate_price, recommend_packs, to_article_unit};
use shared::{
    list_totals, round_display, round_internal, validate_positive_quantity, validate_price,
    Article, Conversion, ItemReason, PlanningWindow, ShoppingList, ShoppingListItem, UnitCatalog,
};

/// Shopping list service
#[derive(Clone)]
pub struct ShoppingListService {
    db: PgPool,
    planning: PlanningConfig,
}

#[derive(Debug, FromRow)]
struct ShoppingListRow {
    id: Uuid,
    name: String,
    shop_date: DateTime<Utc>,
    plan_until_date: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ShoppingListRow {
    fn with_items(self, items: Vec<ShoppingListItem>) -> ShoppingList {
        let (total_items, purchased_items, estimated_total) = list_totals(&items);
        ShoppingList {
            id: self.id,
            name: self.name,
            shop_date: self.shop_date,
            plan_until_date: self.plan_until_date,
            completed_at: self.completed_at,
            created_at: self.created_at,
            items,
            total_items,
            purchased_items,
            estimated_total,
        }
    }
}

/// Shopping list item row; reason stored as text
#[derive(Debug, FromRow)]
struct ShoppingListItemRow {
    id: Uuid,
    list_id: Uuid,
    article_id: Option<Uuid>,
    custom_name: Option<String>,
    needed_quantity: Decimal,
    unit: Option<String>,
    recommended_packs: i32,
    estimated_price: Option<Decimal>,
    is_purchased: bool,
    purchased_quantity: Option<Decimal>,
    actual_price: Option<Decimal>,
    purchase_date: Option<DateTime<Utc>>,
    expiry_date: Option<NaiveDate>,
    reason: String,
    notes: Option<String>,
}

impl TryFrom<ShoppingListItemRow> for ShoppingListItem {
    type Error = AppError;

    fn try_from(row: ShoppingListItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            list_id: row.list_id,
            article_id: row.article_id,
            custom_name: row.custom_name,
            needed_quantity: row.needed_quantity,
            unit: row.unit,
            recommended_packs: row.recommended_packs,
            estimated_price: row.estimated_price,
            is_purchased: row.is_purchased,
            purchased_quantity: row.purchased_quantity,
            actual_price: row.actual_price,
            purchase_date: row.purchase_date,
            expiry_date: row.expiry_date,
            reason: row.reason.parse()?,
            notes: row.notes,
        })
    }
}

const LIST_COLUMNS: &str = "id, name, shop_date, plan_until_date, completed_at, created_at";

const ITEM_COLUMNS: &str = "id, list_id, article_id, custom_name, needed_quantity, unit, \
     recommended_packs, estimated_price, is_purchased, purchased_quantity, actual_price, \
     purchase_date, expiry_date, reason, notes";

/// Input for generating a shopping list
#[derive(Debug, Deserialize, Validate)]
pub struct GenerateListInput {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub name: Option<String>,
    pub shop_date: DateTime<Utc>,
    pub plan_until: DateTime<Utc>,
}

/// Input for adding a manual item
#[derive(Debug, Deserialize, Validate)]
pub struct AddItemInput {
    pub article_id: Option<Uuid>,
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    pub custom_name: Option<String>,
    pub needed_quantity: Decimal,
    pub unit: Option<String>,
    #[validate(range(min = 1, message = "At least one pack"))]
    pub recommended_packs: Option<i32>,
    pub estimated_price: Option<Decimal>,
    pub notes: Option<String>,
}

/// Input for updating an item while shopping
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateItemInput {
    pub needed_quantity: Option<Decimal>,
    #[validate(range(min = 1, message = "At least one pack"))]
    pub recommended_packs: Option<i32>,
    pub is_purchased: Option<bool>,
    pub purchased_quantity: Option<Decimal>,
    pub actual_price: Option<Decimal>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub expiry_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

async fn fetch_list(
    conn: &mut PgConnection,
    household_id: Uuid,
    list_id: Uuid,
    for_update: bool,
) -> AppResult<ShoppingListRow> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    sqlx::query_as::<_, ShoppingListRow>(&format!(
        "SELECT {LIST_COLUMNS} FROM shopping_lists WHERE id = $1 AND household_id = $2{lock}"
    ))
    .bind(list_id)
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| AppError::NotFound("Shopping list".to_string()))
}

async fn fetch_items(conn: &mut PgConnection, list_id: Uuid) -> AppResult<Vec<ShoppingListItem>> {
    sqlx::query_as::<_, ShoppingListItemRow>(&format!(
        "SELECT {ITEM_COLUMNS} FROM shopping_list_items WHERE list_id = $1 ORDER BY position, created_at"
    ))
    .bind(list_id)
    .fetch_all(&mut *conn)
    .await?
    .into_iter()
    .map(ShoppingListItem::try_from)
    .collect()
}

/// Lock an uncompleted list for editing
async fn lock_active_list(conn: &mut PgConnection, household_id: Uuid, list_id: Uuid) -> AppResult<ShoppingListRow> {
    let list = fetch_list(conn, household_id, list_id, true).await?;
    if list.completed_at.is_some() {
        return Err(AppError::conflict(
            "shopping_list",
            format!("Shopping list '{}' is already completed", list.name),
        ));
    }
    Ok(list)
}

/// Most recently created uncompleted list of a household
async fn find_active(conn: &mut PgConnection, household_id: Uuid) -> AppResult<Option<ShoppingListRow>> {
    let list = sqlx::query_as::<_, ShoppingListRow>(&format!(
        r#"
        SELECT {LIST_COLUMNS}
        FROM shopping_lists
        WHERE household_id = $1 AND completed_at IS NULL
        ORDER BY created_at DESC
        LIMIT 1
        "#
    ))
    .bind(household_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(list)
}

/// Advisory lock key serializing list generation per household
fn active_list_lock_key(household_id: Uuid) -> i64 {
    let (high, low) = household_id.as_u64_pair();
    (high ^ low) as i64
}

/// A list quantity in the article's canonical unit
fn canonical_quantity(
    quantity: Decimal,
    unit: Option<&str>,
    article: &Article,
    units: &UnitCatalog,
) -> AppResult<Decimal> {
    match to_article_unit(quantity, unit, article, units) {
        Conversion::Converted(converted) => Ok(converted),
        Conversion::Unconvertible => Err(AppError::UnconvertibleUnits {
            from: unit.unwrap_or(&article.default_unit).to_string(),
            to: article.default_unit.clone(),
        }),
    }
}

/// Expiry of the batch a purchased item turns into
fn batch_expiry(item: &ShoppingListItem, purchased_at: DateTime<Utc>, default_expiry_days: Option<i32>) -> Option<NaiveDate> {
    item.expiry_date.or_else(|| {
        default_expiry_days.map(|days| (purchased_at + Duration::days(i64::from(days))).date_naive())
    })
}

impl ShoppingListService {
    /// Create a new ShoppingListService instance
    pub fn new(db: PgPool, planning: PlanningConfig) -> Self {
        Self { db, planning }
    }

    /// Generate and persist a shopping list for `[shop_date, plan_until]`
    ///
    /// Refused while another list is active unless the planning config
    /// allows several at once.
    pub async fn generate(&self, household_id: Uuid, input: GenerateListInput) -> AppResult<ShoppingList> {
        input.validate()?;
        if input.plan_until < input.shop_date {
            return Err(AppError::validation("plan_until", "Plan-until date must not be before the shop date"));
        }

        let mut tx = self.db.begin().await?;

        if !self.planning.allow_multiple_active_lists {
            // held until commit, so concurrent generations see each other's list
            sqlx::query("SELECT pg_advisory_xact_lock($1)")
                .bind(active_list_lock_key(household_id))
                .execute(&mut *tx)
                .await?;
            if let Some(active) = find_active(&mut tx, household_id).await? {
                return Err(AppError::conflict(
                    "shopping_list",
                    format!("Shopping list '{}' is still active", active.name),
                ));
            }
        }

        let window = PlanningWindow::new(input.shop_date, input.plan_until);
        let inputs = DemandService::new(self.db.clone())
            .load_inputs(household_id, &window, self.planning.forecast_lookback_days)
            .await?;
        let needs = aggregate(input.shop_date, input.plan_until, &inputs);

        let inventory = InventoryService::new(self.db.clone());
        let history_limit = self.planning.price_history_limit;
        let mut priced = Vec::with_capacity(needs.len());
        for need in needs {
            if need.mixed_units {
                tracing::warn!(
                    item = %need.name,
                    unit = %need.unit,
                    "Recipe units could not all be converted; quantity mixes units"
                );
            }
            let (packs, price) = match need.article_id.and_then(|id| inputs.articles.get(&id)) {
                Some(snapshot) => {
                    let packs = recommend_packs(need.needed_quantity, &need.unit, &snapshot.article, &inputs.units);
                    if packs.fallback {
                        tracing::warn!(
                            article = %snapshot.article.name,
                            package_unit = snapshot.article.package_unit_symbol(),
                            unit = %need.unit,
                            "Package size not convertible; recommending one pack"
                        );
                    }
                    let history = inventory
                        .price_history(snapshot.article.id, i64::from(history_limit))
                        .await?;
                    (packs.packs, estimate_price(&history, packs.packs, history_limit as usize))
                }
                None => (1, None),
            };
            priced.push((need, packs, price));
        }

        let name = input
            .name
            .unwrap_or_else(|| format!("Shopping {}", input.shop_date.format("%Y-%m-%d")));

        let list = sqlx::query_as::<_, ShoppingListRow>(&format!(
            r#"
            INSERT INTO shopping_lists (household_id, name, shop_date, plan_until_date)
            VALUES ($1, $2, $3, $4)
            RETURNING {LIST_COLUMNS}
            "#
        ))
        .bind(household_id)
        .bind(&name)
        .bind(input.shop_date)
        .bind(input.plan_until)
        .fetch_one(&mut *tx)
        .await?;

        let mut items = Vec::with_capacity(priced.len());
        for (position, (need, packs, price)) in priced.into_iter().enumerate() {
            let custom_name = need.article_id.is_none().then(|| need.name.clone());
            let row = sqlx::query_as::<_, ShoppingListItemRow>(&format!(
                r#"
                INSERT INTO shopping_list_items (list_id, article_id, custom_name, needed_quantity, unit,
                                                 recommended_packs, estimated_price, reason, notes, position)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                RETURNING {ITEM_COLUMNS}
                "#
            ))
            .bind(list.id)
            .bind(need.article_id)
            .bind(custom_name)
            .bind(need.needed_quantity)
            .bind(&need.unit)
            .bind(packs)
            .bind(price)
            .bind(need.reason.as_str())
            .bind(&need.notes)
            .bind(position as i32)
            .fetch_one(&mut *tx)
            .await?;
            items.push(ShoppingListItem::try_from(row)?);
        }

        tx.commit().await?;

        tracing::info!(
            list_id = %list.id,
            name = %list.name,
            items = items.len(),
            "Shopping list generated"
        );

        Ok(list.with_items(items))
    }

    /// Get a list with its items and totals
    pub async fn get_list(&self, household_id: Uuid, list_id: Uuid) -> AppResult<ShoppingList> {
        let mut conn = self.db.acquire().await?;
        let list = fetch_list(&mut conn, household_id, list_id, false).await?;
        let items = fetch_items(&mut conn, list.id).await?;
        Ok(list.with_items(items))
    }

    /// Most recently created uncompleted list
    pub async fn get_active(&self, household_id: Uuid) -> AppResult<Option<ShoppingList>> {
        let mut conn = self.db.acquire().await?;
        match find_active(&mut conn, household_id).await? {
            Some(list) => {
                let items = fetch_items(&mut conn, list.id).await?;
                Ok(Some(list.with_items(items)))
            }
            None => Ok(None),
        }
    }

    /// Add a MANUAL item to an uncompleted list
    ///
    /// Items linked to an article are stored in the article's canonical unit.
    pub async fn add_item(&self, household_id: Uuid, list_id: Uuid, input: AddItemInput) -> AppResult<ShoppingListItem> {
        input.validate()?;
        validate_positive_quantity(input.needed_quantity)
            .map_err(|e| AppError::validation("needed_quantity", e))?;
        if let Some(price) = input.estimated_price {
            validate_price(price).map_err(|e| AppError::validation("estimated_price", e))?;
        }
        let custom_name = input
            .custom_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        if input.article_id.is_none() && custom_name.is_none() {
            return Err(AppError::validation("custom_name", "Either an article or a custom name is required"));
        }

        let mut tx = self.db.begin().await?;
        lock_active_list(&mut tx, household_id, list_id).await?;

        let (needed_quantity, unit) = match input.article_id {
            Some(article_id) => {
                let article = fetch_article(&mut tx, household_id, article_id).await?;
                let units = UnitService::new(self.db.clone()).load_catalog(household_id).await?;
                let quantity =
                    canonical_quantity(input.needed_quantity, input.unit.as_deref(), &article, &units)?;
                (quantity, Some(article.default_unit))
            }
            None => (input.needed_quantity, input.unit),
        };
        let needed_quantity = round_display(needed_quantity);
        validate_positive_quantity(needed_quantity).map_err(|e| AppError::validation("needed_quantity", e))?;

        let row = sqlx::query_as::<_, ShoppingListItemRow>(&format!(
            r#"
            INSERT INTO shopping_list_items (list_id, article_id, custom_name, needed_quantity, unit,
                                             recommended_packs, estimated_price, reason, notes, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9,
                    (SELECT COALESCE(MAX(position) + 1, 0) FROM shopping_list_items WHERE list_id = $1))
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(list_id)
        .bind(input.article_id)
        .bind(custom_name)
        .bind(needed_quantity)
        .bind(unit)
        .bind(input.recommended_packs.unwrap_or(1))
        .bind(input.estimated_price)
        .bind(ItemReason::Manual.as_str())
        .bind(input.notes)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    /// Update quantities or purchase fields of an item
    ///
    /// Marking an item purchased without a date stamps it with the current time.
    pub async fn update_item(
        &self,
        household_id: Uuid,
        list_id: Uuid,
        item_id: Uuid,
        input: UpdateItemInput,
    ) -> AppResult<ShoppingListItem> {
        input.validate()?;
        if let Some(quantity) = input.needed_quantity {
            validate_positive_quantity(quantity).map_err(|e| AppError::validation("needed_quantity", e))?;
        }
        if let Some(quantity) = input.purchased_quantity {
            validate_positive_quantity(quantity).map_err(|e| AppError::validation("purchased_quantity", e))?;
        }
        if let Some(price) = input.actual_price {
            validate_price(price).map_err(|e| AppError::validation("actual_price", e))?;
        }

        let mut tx = self.db.begin().await?;
        lock_active_list(&mut tx, household_id, list_id).await?;

        let purchase_date = match (input.is_purchased, input.purchase_date) {
            (_, Some(date)) => Some(date),
            (Some(true), None) => Some(Utc::now()),
            _ => None,
        };

        let row = sqlx::query_as::<_, ShoppingListItemRow>(&format!(
            r#"
            UPDATE shopping_list_items
            SET needed_quantity = COALESCE($3, needed_quantity),
                recommended_packs = COALESCE($4, recommended_packs),
                is_purchased = COALESCE($5, is_purchased),
                purchased_quantity = COALESCE($6, purchased_quantity),
                actual_price = COALESCE($7, actual_price),
                purchase_date = COALESCE($8, purchase_date),
                expiry_date = COALESCE($9, expiry_date),
                notes = COALESCE($10, notes)
            WHERE id = $1 AND list_id = $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id)
        .bind(list_id)
        .bind(input.needed_quantity.map(round_display))
        .bind(input.recommended_packs)
        .bind(input.is_purchased)
        .bind(input.purchased_quantity.map(round_display))
        .bind(input.actual_price)
        .bind(purchase_date)
        .bind(input.expiry_date)
        .bind(input.notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Shopping list item".to_string()))?;

        tx.commit().await?;

        row.try_into()
    }

    /// Remove an item from an uncompleted list
    pub async fn delete_item(&self, household_id: Uuid, list_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        lock_active_list(&mut tx, household_id, list_id).await?;

        let result = sqlx::query("DELETE FROM shopping_list_items WHERE id = $1 AND list_id = $2")
            .bind(item_id)
            .bind(list_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Shopping list item".to_string()));
        }

        tx.commit().await?;
        Ok(())
    }

    /// Delete an uncompleted list with its items
    pub async fn delete_list(&self, household_id: Uuid, list_id: Uuid) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        let list = lock_active_list(&mut tx, household_id, list_id).await?;

        sqlx::query("DELETE FROM shopping_lists WHERE id = $1")
            .bind(list.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(list_id = %list_id, name = %list.name, "Shopping list deleted");
        Ok(())
    }

    /// Complete a list, turning purchased article items into batches
    pub async fn complete_list(&self, household_id: Uuid, list_id: Uuid) -> AppResult<ShoppingList> {
        let mut tx = self.db.begin().await?;
        lock_active_list(&mut tx, household_id, list_id).await?;

        let items = fetch_items(&mut tx, list_id).await?;
        let units = UnitService::new(self.db.clone()).load_catalog(household_id).await?;
        let mut stocked = 0usize;

        for item in items.iter().filter(|i| i.is_purchased) {
            let Some(article_id) = item.article_id else {
                continue;
            };
            let article = fetch_article(&mut tx, household_id, article_id).await?;
            let quantity = round_internal(canonical_quantity(
                item.stocked_quantity(),
                item.unit.as_deref(),
                &article,
                &units,
            )?);
            if quantity <= Decimal::ZERO {
                tracing::warn!(item_id = %item.id, "Purchased item without quantity; no batch created");
                continue;
            }

            let purchased_at = item.purchase_date.unwrap_or_else(Utc::now);
            let expiry = batch_expiry(item, purchased_at, article.default_expiry_days);

            sqlx::query(
                r#"
                INSERT INTO batches (household_id, article_id, quantity, initial_quantity, purchase_date,
                                     expiry_date, purchase_price, notes)
                VALUES ($1, $2, $3, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(household_id)
            .bind(article_id)
            .bind(quantity)
            .bind(purchased_at)
            .bind(expiry)
            .bind(item.effective_price())
            .bind(&item.notes)
            .execute(&mut *tx)
            .await?;
            stocked += 1;
        }

        let list = sqlx::query_as::<_, ShoppingListRow>(&format!(
            "UPDATE shopping_lists SET completed_at = NOW() WHERE id = $1 RETURNING {LIST_COLUMNS}"
        ))
        .bind(list_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            list_id = %list.id,
            name = %list.name,
            batches_created = stocked,
            "Shopping list completed"
        );

        Ok(list.with_items(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use shared::Unit;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn flour() -> Article {
        Article {
            id: Uuid::new_v4(),
            name: "Flour".to_string(),
            default_unit: "g".to_string(),
            package_size: dec("1000"),
            package_unit: None,
            min_stock: None,
            default_expiry_days: None,
            nutrition: None,
            category: None,
            consumable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn mass_units() -> UnitCatalog {
        UnitCatalog::new(vec![
            Unit::new("Gram", "g").in_group("mass", dec("1")),
            Unit::new("Kilogram", "kg").in_group("mass", dec("1000")),
        ])
    }

    fn item(expiry: Option<NaiveDate>) -> ShoppingListItem {
        ShoppingListItem {
            id: Uuid::new_v4(),
            list_id: Uuid::new_v4(),
            article_id: Some(Uuid::new_v4()),
            custom_name: None,
            needed_quantity: Decimal::new(2, 0),
            unit: Some("pcs".to_string()),
            recommended_packs: 1,
            estimated_price: None,
            is_purchased: true,
            purchased_quantity: None,
            actual_price: None,
            purchase_date: None,
            expiry_date: expiry,
            reason: ItemReason::Manual,
            notes: None,
        }
    }

    #[test]
    fn test_manual_item_stored_in_canonical_unit() {
        let quantity = canonical_quantity(dec("2"), Some("kg"), &flour(), &mass_units()).unwrap();
        assert_eq!(quantity, dec("2000"));

        let unchanged = canonical_quantity(dec("750"), None, &flour(), &mass_units()).unwrap();
        assert_eq!(unchanged, dec("750"));
    }

    #[test]
    fn test_manual_item_unconvertible_unit_rejected() {
        let err = canonical_quantity(dec("2"), Some("cup"), &flour(), &mass_units()).unwrap_err();
        assert!(matches!(
            err,
            AppError::UnconvertibleUnits { ref from, ref to } if from == "cup" && to == "g"
        ));
    }

    #[test]
    fn test_active_list_lock_key_per_household() {
        let household = Uuid::new_v4();
        assert_eq!(active_list_lock_key(household), active_list_lock_key(household));

        let a = Uuid::from_u128(0x0000_0001_0000_0000_0000_0000_0000_0002);
        let b = Uuid::from_u128(0x0000_0001_0000_0000_0000_0000_0000_0003);
        assert_ne!(active_list_lock_key(a), active_list_lock_key(b));
    }

    #[test]
    fn test_batch_expiry_prefers_recorded_date() {
        let recorded = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let purchased = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        assert_eq!(batch_expiry(&item(Some(recorded)), purchased, Some(7)), Some(recorded));
    }

    #[test]
    fn test_batch_expiry_from_default_days() {
        let purchased = Utc.with_ymd_and_hms(2024, 4, 1, 10, 0, 0).unwrap();
        assert_eq!(
            batch_expiry(&item(None), purchased, Some(7)),
            NaiveDate::from_ymd_opt(2024, 4, 8)
        );
        assert_eq!(batch_expiry(&item(None), purchased, None), None);
    }
}
