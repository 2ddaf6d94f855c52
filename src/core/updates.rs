//! Pending-update policy.
//!
//! A staged `update_amount` is folded into `actual_amount` according to the
//! dataset's [`UpdateType`]: `Add` accumulates, `Replace` overwrites. The diff is
//! re-derived and the staged amount cleared so it can never be applied twice.

use crate::{
    errors::Result,
    models::{Dataset, UpdateType, ensure_finite},
};
use chrono::NaiveDate;
use std::fmt::Write;

/// Record of one applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedUpdate {
    /// Dataset the update was applied to
    pub dataset_id: i64,
    /// Dataset title at the time of application
    pub title: String,
    /// Mode that was used
    pub update_type: UpdateType,
    /// Staged amount that was consumed
    pub amount: f64,
    /// Actual amount before the update
    pub previous_actual: f64,
    /// Actual amount after the update
    pub new_actual: f64,
    /// Diff amount after the update
    pub new_diff: f64,
}

/// Result of applying every pending update in the active groups.
#[derive(Debug, Clone)]
pub struct UpdateRunResult {
    /// One record per applied update, in display order
    pub applied: Vec<AppliedUpdate>,
    /// Number of incremental updates
    pub added_count: usize,
    /// Number of absolute updates
    pub replaced_count: usize,
    /// Date stamped on every touched dataset
    pub update_date: NaiveDate,
}

/// Applies the pending update of `dataset`, if any, stamping `on` as its update date.
///
/// Returns `None` and leaves the dataset untouched when nothing is pending.
///
/// # Errors
/// Returns [`crate::errors::Error::InvalidAmount`] and leaves the dataset
/// untouched when the resulting actual or diff amount would not be finite.
pub fn apply_pending(dataset: &mut Dataset, on: NaiveDate) -> Result<Option<AppliedUpdate>> {
    let Some(amount) = dataset.update_amount else {
        return Ok(None);
    };
    let previous_actual = dataset.actual_amount;

    let new_actual = match dataset.update_type {
        UpdateType::Add => previous_actual + amount,
        UpdateType::Replace => amount,
    };
    ensure_finite("actual_amount", new_actual)?;
    ensure_finite("diff_amount", new_actual - dataset.debit_amount)?;

    dataset.actual_amount = new_actual;
    dataset.recompute_diff();
    dataset.update_amount = None;
    dataset.last_update_date = Some(on);

    Ok(Some(AppliedUpdate {
        dataset_id: dataset.id.unwrap_or_default(),
        title: dataset.title.clone(),
        update_type: dataset.update_type,
        amount,
        previous_actual,
        new_actual: dataset.actual_amount,
        new_diff: dataset.diff_amount,
    }))
}

/// Formats an update run into a human-readable summary string.
#[must_use]
pub fn format_update_summary(result: &UpdateRunResult) -> String {
    let mut summary = format!(
        "Update run - {} - Applied {} update(s)\n",
        result.update_date.format("%Y-%m-%d"),
        result.applied.len()
    );

    // write! is infallible when writing to String
    let _ = writeln!(
        summary,
        "  Added: {} | Replaced: {}",
        result.added_count, result.replaced_count
    );

    for update in &result.applied {
        let sign = match update.update_type {
            UpdateType::Add => "+",
            UpdateType::Replace => "=",
        };
        let _ = writeln!(
            summary,
            "  {} {}{:.2} | {:.2} -> {:.2} (diff {:+.2})",
            update.title,
            sign,
            update.amount,
            update.previous_actual,
            update.new_actual,
            update.new_diff
        );
    }

    summary
}
