//! Demand aggregation for shopping list generation
//!
//! Three demand signals feed a shopping list: planned recipes, the
//! consumption forecast and minimum-stock thresholds. Recipe demand is
//! collected per [`DemandKey`] and normalized into each article's canonical
//! unit; [`net_demand`] then nets every article against its current stock.
//!
//! Each article is handled by exactly one branch, first match wins:
//! recipe-covered, then forecast-only, then low-stock-only.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::conversion::{Conversion, UnitCatalog};
use crate::models::{ArticleSnapshot, ItemReason, MealPlanEntry, Recipe, RecipeIngredient};
use crate::rounding::{round_display, round_internal};
use crate::types::PlanningWindow;

/// Identity under which demand from different sources is merged
///
/// `Unresolved` keys are unique per ingredient line and never merge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum DemandKey {
    Article(Uuid),
    /// Normalized (trimmed, lowercase) category string
    Category(String),
    Unresolved(Uuid),
}

impl DemandKey {
    /// Key for a recipe ingredient
    pub fn for_ingredient(ingredient: &RecipeIngredient) -> Self {
        if let Some(article_id) = ingredient.article_id {
            return DemandKey::Article(article_id);
        }
        match ingredient.category_key() {
            Some(category) => DemandKey::Category(category.to_lowercase()),
            None => DemandKey::Unresolved(ingredient.id),
        }
    }

    pub fn article_id(&self) -> Option<Uuid> {
        match self {
            DemandKey::Article(id) => Some(*id),
            _ => None,
        }
    }
}

/// A planned meal together with the recipe it cooks
#[derive(Debug, Clone)]
pub struct PlannedMeal {
    pub entry: MealPlanEntry,
    pub recipe: Recipe,
}

/// Recipe demand accumulated under one key
#[derive(Debug, Clone, Serialize)]
pub struct DemandLine {
    pub key: DemandKey,
    pub name: String,
    /// Unit the quantity is expressed in
    pub unit: String,
    pub quantity: Decimal,
    /// Set when a contribution could not be converted and was added as-is
    pub mixed_units: bool,
    pub unconverted_units: Vec<String>,
}

impl DemandLine {
    fn note(&self) -> Option<String> {
        if !self.mixed_units {
            return None;
        }
        Some(format!(
            "Includes quantities in {} that could not be converted to {}",
            self.unconverted_units.join(", "),
            self.unit
        ))
    }
}

/// Recipe demand keyed by [`DemandKey`], in order of first appearance
#[derive(Debug, Clone, Default)]
pub struct RecipeDemand {
    lines: Vec<DemandLine>,
    index: HashMap<DemandKey, usize>,
}

impl RecipeDemand {
    pub fn lines(&self) -> &[DemandLine] {
        &self.lines
    }

    pub fn get(&self, key: &DemandKey) -> Option<&DemandLine> {
        self.index.get(key).map(|&i| &self.lines[i])
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add a contribution already expressed in its final unit
    fn add(&mut self, key: DemandKey, name: String, unit: &str, quantity: Decimal, units: &UnitCatalog) {
        let Some(&i) = self.index.get(&key) else {
            self.index.insert(key.clone(), self.lines.len());
            self.lines.push(DemandLine {
                key,
                name,
                unit: unit.to_string(),
                quantity: round_internal(quantity),
                mixed_units: false,
                unconverted_units: Vec::new(),
            });
            return;
        };

        let line = &mut self.lines[i];
        let quantity = match units.convert(quantity, unit, &line.unit) {
            Conversion::Converted(q) => q,
            Conversion::Unconvertible => {
                line.mark_unconverted(unit);
                quantity
            }
        };
        line.quantity = round_internal(line.quantity + quantity);
    }
}

impl DemandLine {
    fn mark_unconverted(&mut self, unit: &str) {
        self.mixed_units = true;
        if !self.unconverted_units.iter().any(|u| u == unit) {
            self.unconverted_units.push(unit.to_string());
        }
    }
}

/// Collect recipe demand for pending meals inside the window
///
/// Ingredient quantities are scaled by `entry.servings / recipe.servings`.
/// Ingredients of non-consumable articles are skipped. When an article
/// ingredient's unit cannot be converted into the article's canonical unit
/// the original quantity is kept and the line is flagged as mixed.
pub fn aggregate_recipe_demand(
    window: &PlanningWindow,
    meals: &[PlannedMeal],
    articles: &HashMap<Uuid, ArticleSnapshot>,
    units: &UnitCatalog,
) -> RecipeDemand {
    let mut demand = RecipeDemand::default();

    for meal in meals {
        if !meal.entry.is_pending() || !window.contains(meal.entry.date) {
            continue;
        }
        let factor = meal.recipe.scale_factor(meal.entry.servings);

        for ingredient in &meal.recipe.ingredients {
            let needed = round_internal(ingredient.quantity * factor);
            let key = DemandKey::for_ingredient(ingredient);

            match key.article_id().and_then(|id| articles.get(&id)) {
                Some(snapshot) => {
                    let article = &snapshot.article;
                    if !article.consumable {
                        continue;
                    }
                    let canonical = article.default_unit.as_str();
                    match units.convert(needed, &ingredient.unit, canonical) {
                        Conversion::Converted(q) => {
                            demand.add(key, article.name.clone(), canonical, q, units)
                        }
                        Conversion::Unconvertible => {
                            // keep the raw amount rather than dropping the demand
                            demand.add(key.clone(), article.name.clone(), canonical, needed, units);
                            if let Some(&i) = demand.index.get(&key) {
                                demand.lines[i].mark_unconverted(&ingredient.unit);
                            }
                        }
                    }
                }
                // article reference that no longer exists: keep it visible on its own
                None if key.article_id().is_some() => demand.add(
                    DemandKey::Unresolved(ingredient.id),
                    ingredient.label(),
                    &ingredient.unit,
                    needed,
                    units,
                ),
                None => demand.add(key, ingredient.label(), &ingredient.unit, needed, units),
            }
        }
    }

    demand
}

/// One positive net need, ready to become a shopping list item
#[derive(Debug, Clone, Serialize)]
pub struct NetNeed {
    pub key: DemandKey,
    pub article_id: Option<Uuid>,
    pub name: String,
    pub unit: String,
    pub recipe_need: Decimal,
    pub forecast_need: Decimal,
    pub min_stock: Decimal,
    pub current_stock: Decimal,
    /// Two decimals, strictly positive
    pub needed_quantity: Decimal,
    pub reason: ItemReason,
    pub mixed_units: bool,
    pub notes: Option<String>,
}

/// `recipe + forecast + min_stock - current_stock`, four then two decimals
pub fn net_need_formula(
    recipe_need: Decimal,
    forecast_need: Decimal,
    min_stock: Decimal,
    current_stock: Decimal,
) -> Decimal {
    round_display(round_internal(recipe_need + forecast_need + min_stock - current_stock))
}

/// Net every demand signal against current stock
///
/// Output order: recipe lines (first appearance), then forecast-only
/// articles, then low-stock-only articles, the latter two by article name.
pub fn net_demand(
    recipe: &RecipeDemand,
    forecast: &HashMap<Uuid, Decimal>,
    articles: &HashMap<Uuid, ArticleSnapshot>,
) -> Vec<NetNeed> {
    let mut needs = Vec::new();
    let mut handled: HashSet<Uuid> = HashSet::new();

    for line in recipe.lines() {
        let article_id = line.key.article_id();
        let snapshot = article_id.and_then(|id| articles.get(&id));
        let (forecast_need, min_stock, current_stock) = match (article_id, snapshot) {
            (Some(id), Some(s)) => {
                handled.insert(id);
                (
                    forecast.get(&id).copied().unwrap_or_default(),
                    s.article.min_stock.unwrap_or_default(),
                    s.current_stock,
                )
            }
            _ => (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO),
        };

        let needed = net_need_formula(line.quantity, forecast_need, min_stock, current_stock);
        if needed > Decimal::ZERO {
            needs.push(NetNeed {
                key: line.key.clone(),
                article_id,
                name: line.name.clone(),
                unit: line.unit.clone(),
                recipe_need: line.quantity,
                forecast_need,
                min_stock,
                current_stock,
                needed_quantity: needed,
                reason: ItemReason::Recipe,
                mixed_units: line.mixed_units,
                notes: line.note(),
            });
        }
    }

    let mut forecast_only: Vec<(&ArticleSnapshot, Decimal)> = forecast
        .iter()
        .filter(|(id, q)| !handled.contains(*id) && **q > Decimal::ZERO)
        .filter_map(|(id, q)| articles.get(id).map(|s| (s, *q)))
        .collect();
    forecast_only.sort_by(|a, b| a.0.article.name.cmp(&b.0.article.name));

    for (snapshot, forecast_need) in forecast_only {
        handled.insert(snapshot.article.id);
        let min_stock = snapshot.article.min_stock.unwrap_or_default();
        let needed = net_need_formula(Decimal::ZERO, forecast_need, min_stock, snapshot.current_stock);
        if needed > Decimal::ZERO {
            needs.push(article_need(snapshot, Decimal::ZERO, forecast_need, needed, ItemReason::Forecast));
        }
    }

    let mut low_stock: Vec<&ArticleSnapshot> = articles
        .values()
        .filter(|s| !handled.contains(&s.article.id) && s.article.min_stock.is_some())
        .collect();
    low_stock.sort_by(|a, b| a.article.name.cmp(&b.article.name));

    for snapshot in low_stock {
        let min_stock = snapshot.article.min_stock.unwrap_or_default();
        let needed = net_need_formula(Decimal::ZERO, Decimal::ZERO, min_stock, snapshot.current_stock);
        if needed > Decimal::ZERO {
            needs.push(article_need(snapshot, Decimal::ZERO, Decimal::ZERO, needed, ItemReason::LowStock));
        }
    }

    needs
}

fn article_need(
    snapshot: &ArticleSnapshot,
    recipe_need: Decimal,
    forecast_need: Decimal,
    needed_quantity: Decimal,
    reason: ItemReason,
) -> NetNeed {
    let article = &snapshot.article;
    NetNeed {
        key: DemandKey::Article(article.id),
        article_id: Some(article.id),
        name: article.name.clone(),
        unit: article.default_unit.clone(),
        recipe_need,
        forecast_need,
        min_stock: article.min_stock.unwrap_or_default(),
        current_stock: snapshot.current_stock,
        needed_quantity,
        reason,
        mixed_units: false,
        notes: None,
    }
}

/// Everything the aggregator reads, loaded by the caller
#[derive(Debug, Clone, Default)]
pub struct DemandInputs {
    pub meals: Vec<PlannedMeal>,
    pub articles: HashMap<Uuid, ArticleSnapshot>,
    pub forecast: HashMap<Uuid, Decimal>,
    pub units: UnitCatalog,
}

/// Run the full aggregation over `[shop_date, plan_until]`
pub fn aggregate(
    shop_date: DateTime<Utc>,
    plan_until: DateTime<Utc>,
    inputs: &DemandInputs,
) -> Vec<NetNeed> {
    let window = PlanningWindow::new(shop_date, plan_until);
    let recipe = aggregate_recipe_demand(&window, &inputs.meals, &inputs.articles, &inputs.units);
    net_demand(&recipe, &inputs.forecast, &inputs.articles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, MealType, Unit};
    use chrono::{Duration, TimeZone};
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn article(name: &str, unit: &str, package: &str, min_stock: Option<&str>) -> Article {
        Article {
            id: Uuid::new_v4(),
            name: name.to_string(),
            default_unit: unit.to_string(),
            package_size: dec(package),
            package_unit: None,
            min_stock: min_stock.map(dec),
            default_expiry_days: None,
            nutrition: None,
            category: None,
            consumable: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ingredient(recipe_id: Uuid, article_id: Option<Uuid>, category: Option<&str>, qty: &str, unit: &str) -> RecipeIngredient {
        RecipeIngredient {
            id: Uuid::new_v4(),
            recipe_id,
            article_id,
            category: category.map(str::to_string),
            name: None,
            quantity: dec(qty),
            unit: unit.to_string(),
            optional: false,
        }
    }

    fn meal(ingredients: Vec<RecipeIngredient>, recipe_servings: &str, servings: &str, day: i64) -> PlannedMeal {
        let recipe_id = ingredients.first().map(|i| i.recipe_id).unwrap_or_else(Uuid::new_v4);
        PlannedMeal {
            entry: MealPlanEntry {
                id: Uuid::new_v4(),
                date: (shop_date() + Duration::days(day)).date_naive(),
                meal_type: MealType::Dinner,
                recipe_id,
                servings: dec(servings),
                completed_at: None,
            },
            recipe: Recipe {
                id: recipe_id,
                name: "Test".to_string(),
                servings: dec(recipe_servings),
                ingredients,
            },
        }
    }

    fn shop_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn snapshots(list: Vec<(Article, &str)>) -> HashMap<Uuid, ArticleSnapshot> {
        list.into_iter()
            .map(|(article, stock)| {
                (
                    article.id,
                    ArticleSnapshot {
                        article,
                        current_stock: dec(stock),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_milk_scenario() {
        let milk = article("Milk", "ml", "1000", None);
        let recipe_id = Uuid::new_v4();
        let inputs = DemandInputs {
            meals: vec![meal(vec![ingredient(recipe_id, Some(milk.id), None, "1500", "ml")], "2", "2", 1)],
            articles: snapshots(vec![(milk, "200")]),
            ..Default::default()
        };

        let needs = aggregate(shop_date(), shop_date() + Duration::days(7), &inputs);
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].needed_quantity, dec("1300"));
        assert_eq!(needs[0].reason, ItemReason::Recipe);
    }

    #[test]
    fn test_servings_scale_and_unit_normalization() {
        let flour = article("Flour", "g", "1000", None);
        let units = UnitCatalog::new(vec![
            Unit::new("Gram", "g").in_group("mass", dec("1")),
            Unit::new("Kilogram", "kg").in_group("mass", dec("1000")),
        ]);
        let recipe_id = Uuid::new_v4();
        let inputs = DemandInputs {
            meals: vec![
                meal(vec![ingredient(recipe_id, Some(flour.id), None, "0.5", "kg")], "4", "8", 0),
                meal(vec![ingredient(recipe_id, Some(flour.id), None, "250", "g")], "1", "1", 2),
            ],
            articles: snapshots(vec![(flour, "0")]),
            units,
            ..Default::default()
        };

        let needs = aggregate(shop_date(), shop_date() + Duration::days(7), &inputs);
        assert_eq!(needs.len(), 1);
        // 0.5 kg * 2 = 1000 g, plus 250 g
        assert_eq!(needs[0].needed_quantity, dec("1250"));
        assert!(!needs[0].mixed_units);
    }

    #[test]
    fn test_unconvertible_ingredient_keeps_raw_quantity() {
        let eggs = article("Eggs", "pcs", "10", None);
        let recipe_id = Uuid::new_v4();
        let inputs = DemandInputs {
            meals: vec![meal(vec![ingredient(recipe_id, Some(eggs.id), None, "200", "g")], "1", "1", 0)],
            articles: snapshots(vec![(eggs, "0")]),
            ..Default::default()
        };

        let needs = aggregate(shop_date(), shop_date() + Duration::days(1), &inputs);
        assert_eq!(needs[0].needed_quantity, dec("200"));
        assert!(needs[0].mixed_units);
        assert!(needs[0].notes.as_deref().unwrap_or_default().contains('g'));
    }

    #[test]
    fn test_meals_outside_window_or_completed_are_ignored() {
        let rice = article("Rice", "g", "1000", None);
        let recipe_id = Uuid::new_v4();
        let mut cooked = meal(vec![ingredient(recipe_id, Some(rice.id), None, "300", "g")], "1", "1", 1);
        cooked.entry.completed_at = Some(Utc::now());
        let inputs = DemandInputs {
            meals: vec![
                cooked,
                meal(vec![ingredient(recipe_id, Some(rice.id), None, "300", "g")], "1", "1", 30),
            ],
            articles: snapshots(vec![(rice, "0")]),
            ..Default::default()
        };

        assert!(aggregate(shop_date(), shop_date() + Duration::days(7), &inputs).is_empty());
    }

    #[test]
    fn test_category_lines_merge_case_insensitively() {
        let recipe_id = Uuid::new_v4();
        let inputs = DemandInputs {
            meals: vec![meal(
                vec![
                    ingredient(recipe_id, None, Some("Cheese"), "100", "g"),
                    ingredient(recipe_id, None, Some(" cheese "), "50", "g"),
                ],
                "1",
                "1",
                0,
            )],
            ..Default::default()
        };

        let needs = aggregate(shop_date(), shop_date() + Duration::days(1), &inputs);
        assert_eq!(needs.len(), 1);
        assert_eq!(needs[0].key, DemandKey::Category("cheese".to_string()));
        assert_eq!(needs[0].needed_quantity, dec("150"));
        assert_eq!(needs[0].article_id, None);
    }

    #[test]
    fn test_recipe_demand_lookup_by_key() {
        let milk = article("Milk", "ml", "1000", None);
        let milk_id = milk.id;
        let recipe_id = Uuid::new_v4();
        let meals = vec![meal(
            vec![
                ingredient(recipe_id, Some(milk_id), None, "250", "ml"),
                ingredient(recipe_id, None, Some("Bread"), "1", "pcs"),
            ],
            "1",
            "1",
            0,
        )];
        let window = PlanningWindow::new(shop_date(), shop_date() + Duration::days(1));

        let demand = aggregate_recipe_demand(&window, &meals, &snapshots(vec![(milk, "0")]), &UnitCatalog::default());
        assert_eq!(demand.len(), 2);
        assert_eq!(demand.get(&DemandKey::Article(milk_id)).map(|l| l.quantity), Some(dec("250")));
        assert!(demand.get(&DemandKey::Category("bread".to_string())).is_some());

        let empty = aggregate_recipe_demand(&window, &[], &HashMap::new(), &UnitCatalog::default());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_unresolved_lines_never_merge() {
        let recipe_id = Uuid::new_v4();
        let inputs = DemandInputs {
            meals: vec![meal(
                vec![
                    ingredient(recipe_id, None, None, "1", "pcs"),
                    ingredient(recipe_id, None, None, "1", "pcs"),
                ],
                "1",
                "1",
                0,
            )],
            ..Default::default()
        };

        let needs = aggregate(shop_date(), shop_date() + Duration::days(1), &inputs);
        assert_eq!(needs.len(), 2);
        assert!(needs.iter().all(|n| matches!(n.key, DemandKey::Unresolved(_))));
    }

    #[test]
    fn test_branches_are_exclusive_and_ordered() {
        let pasta = article("Pasta", "g", "500", Some("500"));
        let coffee = article("Coffee", "g", "250", Some("250"));
        let soap = article("Soap", "pcs", "1", Some("2"));
        let recipe_id = Uuid::new_v4();
        let mut forecast = HashMap::new();
        forecast.insert(pasta.id, dec("100"));
        forecast.insert(coffee.id, dec("300"));
        let inputs = DemandInputs {
            meals: vec![meal(vec![ingredient(recipe_id, Some(pasta.id), None, "400", "g")], "1", "1", 0)],
            articles: snapshots(vec![(pasta, "200"), (coffee, "100"), (soap, "0")]),
            forecast,
            ..Default::default()
        };

        let needs = aggregate(shop_date(), shop_date() + Duration::days(7), &inputs);
        let reasons: Vec<ItemReason> = needs.iter().map(|n| n.reason).collect();
        assert_eq!(reasons, vec![ItemReason::Recipe, ItemReason::Forecast, ItemReason::LowStock]);
        // 400 + 100 + 500 - 200
        assert_eq!(needs[0].needed_quantity, dec("800"));
        // 300 + 250 - 100
        assert_eq!(needs[1].needed_quantity, dec("450"));
        assert_eq!(needs[2].needed_quantity, dec("2"));
    }

    #[test]
    fn test_covered_stock_produces_no_item() {
        let oil = article("Oil", "ml", "750", Some("100"));
        let inputs = DemandInputs {
            articles: snapshots(vec![(oil, "500")]),
            ..Default::default()
        };
        assert!(aggregate(shop_date(), shop_date() + Duration::days(7), &inputs).is_empty());
    }

    #[test]
    fn test_non_consumable_ingredient_skipped() {
        let mut foil = article("Foil", "pcs", "1", None);
        foil.consumable = false;
        let recipe_id = Uuid::new_v4();
        let inputs = DemandInputs {
            meals: vec![meal(vec![ingredient(recipe_id, Some(foil.id), None, "1", "pcs")], "1", "1", 0)],
            articles: snapshots(vec![(foil, "0")]),
            ..Default::default()
        };
        assert!(aggregate(shop_date(), shop_date() + Duration::days(1), &inputs).is_empty());
    }
}
