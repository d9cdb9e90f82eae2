//! FIFO batch allocation
//!
//! Batches are drained soonest-expiring first (no expiry sorts last), then
//! oldest purchase first. This module only plans the allocation; the
//! backend applies it inside a transaction.

use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Batch;
use crate::rounding::round_internal;

/// FIFO ordering of two batches
pub fn fifo_cmp(a: &Batch, b: &Batch) -> Ordering {
    let by_expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry.then_with(|| a.purchase_date.cmp(&b.purchase_date))
}

/// Sort batches into consumption order
pub fn sort_fifo(batches: &mut [Batch]) {
    batches.sort_by(fifo_cmp);
}

/// Amount taken from one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub batch_id: Uuid,
    pub take: Decimal,
    /// Batch quantity after the take
    pub left_in_batch: Decimal,
}

/// Planned consumption; `consumed + remaining` always equals the request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FifoPlan {
    pub requested: Decimal,
    pub allocations: Vec<Allocation>,
    pub consumed: Decimal,
    /// Shortfall left when stock ran out
    pub remaining: Decimal,
}

impl FifoPlan {
    pub fn is_complete(&self) -> bool {
        self.remaining.is_zero()
    }
}

/// Plan the consumption of `requested` across `batches`
///
/// Never fails on short stock: it takes what exists and reports the rest
/// in `remaining`.
pub fn plan_fifo(batches: &[Batch], requested: Decimal) -> FifoPlan {
    let mut ordered: Vec<&Batch> = batches.iter().filter(|b| b.quantity > Decimal::ZERO).collect();
    ordered.sort_by(|a, b| fifo_cmp(a, b));

    let mut remaining = requested.max(Decimal::ZERO);
    let mut allocations = Vec::new();

    for batch in ordered {
        if remaining <= Decimal::ZERO {
            break;
        }
        let take = batch.quantity.min(remaining);
        allocations.push(Allocation {
            batch_id: batch.id,
            take,
            left_in_batch: batch.quantity - take,
        });
        remaining -= take;
    }

    let consumed = requested.max(Decimal::ZERO) - remaining;
    FifoPlan {
        requested,
        allocations,
        consumed,
        remaining,
    }
}

/// How a declared stock level is reached from the batches on hand
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    Unchanged,
    /// Surplus booked as one new batch of this size
    Add(Decimal),
    /// Deficit drained FIFO
    Consume(FifoPlan),
}

/// Stock correction decided against the current batches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionPlan {
    pub previous_stock: Decimal,
    /// `actual - previous` at internal precision
    pub difference: Decimal,
    pub correction: Correction,
}

impl CorrectionPlan {
    pub fn new_stock(&self) -> Decimal {
        match &self.correction {
            Correction::Unchanged => self.previous_stock,
            Correction::Add(amount) => self.previous_stock + amount,
            Correction::Consume(plan) => self.previous_stock - plan.consumed,
        }
    }
}

/// Plan the correction that brings `batches` to `actual_stock`
pub fn plan_correction(batches: &[Batch], actual_stock: Decimal) -> CorrectionPlan {
    let previous_stock: Decimal = batches.iter().map(|b| b.quantity).sum();
    let difference = round_internal(actual_stock - previous_stock);
    let correction = match difference.cmp(&Decimal::ZERO) {
        Ordering::Greater => Correction::Add(difference),
        Ordering::Less => Correction::Consume(plan_fifo(batches, difference.abs())),
        Ordering::Equal => Correction::Unchanged,
    };
    CorrectionPlan {
        previous_stock,
        difference,
        correction,
    }
}

/// Direct consumption from a single batch that holds too little
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("insufficient stock in batch: requested {requested}, available {available}, short by {shortfall}")]
pub struct BatchShortfall {
    pub requested: Decimal,
    pub available: Decimal,
    pub shortfall: Decimal,
}

/// Check a direct batch take; there is no fallback to other batches
pub fn take_from_batch(batch: &Batch, requested: Decimal) -> Result<Allocation, BatchShortfall> {
    if requested > batch.quantity {
        return Err(BatchShortfall {
            requested,
            available: batch.quantity,
            shortfall: requested - batch.quantity,
        });
    }
    Ok(Allocation {
        batch_id: batch.id,
        take: requested,
        left_in_batch: batch.quantity - requested,
    })
}
