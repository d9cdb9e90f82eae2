//! Recipe cooking plan
//!
//! Resolves every required ingredient of a recipe to an article, converts
//! the scaled quantity into the article's canonical unit and reserves it
//! against current stock. Cooking only proceeds when nothing is missing.

use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::conversion::{Conversion, UnitCatalog};
use crate::models::{ArticleSnapshot, Recipe, RecipeIngredient};
use crate::rounding::round_internal;

/// One ingredient ready to be consumed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookLine {
    pub ingredient_id: Uuid,
    pub article_id: Uuid,
    pub name: String,
    /// Quantity in the article's canonical unit
    pub quantity: Decimal,
    pub unit: String,
}

/// An ingredient that blocks cooking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingIngredient {
    pub ingredient_id: Uuid,
    pub article_id: Option<Uuid>,
    pub name: String,
    pub required: Decimal,
    pub available: Decimal,
    pub unit: String,
    pub error: String,
}

/// Result of planning a cook
#[derive(Debug, Clone, Default, Serialize)]
pub struct CookPlan {
    pub lines: Vec<CookLine>,
    pub missing: Vec<MissingIngredient>,
}

impl CookPlan {
    pub fn is_ready(&self) -> bool {
        self.missing.is_empty()
    }
}

/// Article an ingredient resolves to
///
/// A category ingredient picks the matching consumable article with the most
/// stock, ties broken by name.
pub fn resolve_article<'a>(
    ingredient: &RecipeIngredient,
    articles: &'a HashMap<Uuid, ArticleSnapshot>,
) -> Option<&'a ArticleSnapshot> {
    if let Some(article_id) = ingredient.article_id {
        return articles.get(&article_id);
    }
    let category = ingredient.category_key()?;
    articles
        .values()
        .filter(|s| s.article.consumable && s.article.matches_category(category))
        .max_by(|a, b| {
            a.current_stock
                .cmp(&b.current_stock)
                .then_with(|| b.article.name.cmp(&a.article.name))
        })
}

/// Plan cooking `servings` of `recipe`
///
/// Optional ingredients and non-consumable articles are skipped. Stock is
/// reserved cumulatively so two lines drawing on one article cannot both
/// claim the same units.
pub fn plan_cook(
    recipe: &Recipe,
    servings: Decimal,
    articles: &HashMap<Uuid, ArticleSnapshot>,
    units: &UnitCatalog,
) -> CookPlan {
    let factor = recipe.scale_factor(servings);
    let mut reserved: HashMap<Uuid, Decimal> = HashMap::new();
    let mut plan = CookPlan::default();

    for ingredient in recipe.ingredients.iter().filter(|i| !i.optional) {
        let needed = round_internal(ingredient.quantity * factor);

        let Some(snapshot) = resolve_article(ingredient, articles) else {
            plan.missing.push(MissingIngredient {
                ingredient_id: ingredient.id,
                article_id: ingredient.article_id,
                name: ingredient.label(),
                required: needed,
                available: Decimal::ZERO,
                unit: ingredient.unit.clone(),
                error: "No matching article in inventory".to_string(),
            });
            continue;
        };
        let article = &snapshot.article;
        if !article.consumable {
            continue;
        }

        let quantity = match units.convert(needed, &ingredient.unit, &article.default_unit) {
            Conversion::Converted(q) => round_internal(q),
            Conversion::Unconvertible => {
                plan.missing.push(MissingIngredient {
                    ingredient_id: ingredient.id,
                    article_id: Some(article.id),
                    name: article.name.clone(),
                    required: needed,
                    available: snapshot.current_stock,
                    unit: ingredient.unit.clone(),
                    error: format!(
                        "Cannot convert {} to {}",
                        ingredient.unit, article.default_unit
                    ),
                });
                continue;
            }
        };

        let already = reserved.entry(article.id).or_insert(Decimal::ZERO);
        let available = (snapshot.current_stock - *already).max(Decimal::ZERO);
        if quantity > available {
            plan.missing.push(MissingIngredient {
                ingredient_id: ingredient.id,
                article_id: Some(article.id),
                name: article.name.clone(),
                required: quantity,
                available,
                unit: article.default_unit.clone(),
                error: format!(
                    "Insufficient stock: short by {} {}",
                    quantity - available,
                    article.default_unit
                ),
            });
            continue;
        }
        *already += quantity;

        plan.lines.push(CookLine {
            ingredient_id: ingredient.id,
            article_id: article.id,
            name: article.name.clone(),
            quantity,
            unit: article.default_unit.clone(),
        });
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Article, Unit};
    use chrono::Utc;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn snapshot(name: &str, unit: &str, category: Option<&str>, stock: &str) -> ArticleSnapshot {
        ArticleSnapshot {
            article: Article {
                id: Uuid::new_v4(),
                name: name.to_string(),
                default_unit: unit.to_string(),
                package_size: dec("1"),
                package_unit: None,
                min_stock: None,
                default_expiry_days: None,
                nutrition: None,
                category: category.map(str::to_string),
                consumable: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            current_stock: dec(stock),
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

    fn catalog() -> UnitCatalog {
        UnitCatalog::new(vec![
            Unit::new("Gram", "g").in_group("mass", dec("1")),
            Unit::new("Kilogram", "kg").in_group("mass", dec("1000")),
            Unit::new("Millilitre", "ml").in_group("volume", dec("1")),
        ])
    }

    fn by_id(snapshots: Vec<ArticleSnapshot>) -> HashMap<Uuid, ArticleSnapshot> {
        snapshots.into_iter().map(|s| (s.article.id, s)).collect()
    }

    #[test]
    fn test_plan_converts_and_scales() {
        let flour = snapshot("Flour", "g", None, "2000");
        let recipe_id = Uuid::new_v4();
        let recipe = Recipe {
            id: recipe_id,
            name: "Bread".to_string(),
            servings: dec("2"),
            ingredients: vec![ingredient(recipe_id, Some(flour.article.id), None, "0.5", "kg")],
        };
        let articles = by_id(vec![flour]);

        let plan = plan_cook(&recipe, dec("4"), &articles, &catalog());
        assert!(plan.is_ready());
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.lines[0].quantity, dec("1000"));
        assert_eq!(plan.lines[0].unit, "g");
    }

    #[test]
    fn test_unconvertible_unit_is_missing() {
        let flour = snapshot("Flour", "g", None, "2000");
        let flour_id = flour.article.id;
        let recipe_id = Uuid::new_v4();
        let recipe = Recipe {
            id: recipe_id,
            name: "Bread".to_string(),
            servings: dec("1"),
            ingredients: vec![ingredient(recipe_id, Some(flour_id), None, "200", "ml")],
        };
        let articles = by_id(vec![flour]);

        let plan = plan_cook(&recipe, dec("1"), &articles, &catalog());
        assert!(!plan.is_ready());
        assert!(plan.lines.is_empty());
        assert_eq!(plan.missing[0].article_id, Some(flour_id));
        assert!(plan.missing[0].error.contains("Cannot convert"));
    }

    #[test]
    fn test_cumulative_reservation() {
        let milk = snapshot("Milk", "ml", None, "300");
        let milk_id = milk.article.id;
        let recipe_id = Uuid::new_v4();
        let recipe = Recipe {
            id: recipe_id,
            name: "Pancakes".to_string(),
            servings: dec("1"),
            ingredients: vec![
                ingredient(recipe_id, Some(milk_id), None, "200", "ml"),
                ingredient(recipe_id, Some(milk_id), None, "200", "ml"),
            ],
        };
        let articles = by_id(vec![milk]);

        let plan = plan_cook(&recipe, dec("1"), &articles, &catalog());
        assert_eq!(plan.lines.len(), 1);
        assert_eq!(plan.missing.len(), 1);
        assert_eq!(plan.missing[0].available, dec("100"));
    }

    #[test]
    fn test_category_prefers_most_stock() {
        let low = snapshot("Whole milk", "ml", Some("milk"), "100");
        let high = snapshot("Oat milk", "ml", Some("Milk"), "900");
        let high_id = high.article.id;
        let recipe_id = Uuid::new_v4();
        let recipe = Recipe {
            id: recipe_id,
            name: "Porridge".to_string(),
            servings: dec("1"),
            ingredients: vec![ingredient(recipe_id, None, Some(" milk "), "250", "ml")],
        };
        let articles = by_id(vec![low, high]);

        let plan = plan_cook(&recipe, dec("1"), &articles, &catalog());
        assert!(plan.is_ready());
        assert_eq!(plan.lines[0].article_id, high_id);
    }

    #[test]
    fn test_optional_and_unknown_ingredients() {
        let recipe_id = Uuid::new_v4();
        let mut optional = ingredient(recipe_id, None, Some("parsley"), "5", "g");
        optional.optional = true;
        let unknown = ingredient(recipe_id, Some(Uuid::new_v4()), None, "1", "g");
        let recipe = Recipe {
            id: recipe_id,
            name: "Soup".to_string(),
            servings: dec("1"),
            ingredients: vec![optional, unknown],
        };

        let plan = plan_cook(&recipe, dec("1"), &HashMap::new(), &catalog());
        assert_eq!(plan.missing.len(), 1);
        assert_eq!(plan.missing[0].available, Decimal::ZERO);
    }
}
