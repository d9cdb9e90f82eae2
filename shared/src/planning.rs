//! Purchase planning: package rounding and price estimation

use rust_decimal::Decimal;
use serde::Serialize;

use crate::conversion::{Conversion, UnitCatalog};
use crate::models::Article;
use crate::rounding::{ceil_packs, round_display};

/// Recommended package count for one line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PackRecommendation {
    pub packs: i32,
    /// True when the package size could not be expressed in the need's unit
    /// and the count defaulted to a single pack
    pub fallback: bool,
}

/// `ceil(need / package_size)` with the package size converted into `need_unit`
pub fn recommend_packs(
    need: Decimal,
    need_unit: &str,
    article: &Article,
    units: &UnitCatalog,
) -> PackRecommendation {
    match units.convert(article.package_size, article.package_unit_symbol(), need_unit) {
        Conversion::Converted(size) if size > Decimal::ZERO => PackRecommendation {
            packs: ceil_packs(need, size),
            fallback: false,
        },
        _ => PackRecommendation {
            packs: 1,
            fallback: true,
        },
    }
}

/// Express a list quantity in the article's canonical unit
///
/// A missing unit means the quantity is already canonical.
pub fn to_article_unit(
    quantity: Decimal,
    unit: Option<&str>,
    article: &Article,
    units: &UnitCatalog,
) -> Conversion {
    let from = unit.unwrap_or(&article.default_unit);
    units.convert(quantity, from, &article.default_unit)
}

/// Average price per pack over the newest `limit` prices, times `packs`
///
/// Returns None without history so that "unknown" stays distinct from "free".
pub fn estimate_price(history: &[Decimal], packs: i32, limit: usize) -> Option<Decimal> {
    let recent = &history[..history.len().min(limit)];
    if recent.is_empty() {
        return None;
    }
    let average = recent.iter().sum::<Decimal>() / Decimal::from(recent.len() as u64);
    Some(round_display(average * Decimal::from(packs)))
}
