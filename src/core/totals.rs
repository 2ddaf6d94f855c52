//! Aggregate sums over datasets.
//!
//! Totals are always derived from current membership; nothing here is cached.

use crate::models::{AmountField, Dataset};
use std::fmt::Write;

/// All six active aggregates at once.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    /// Sum of invoice amounts
    pub invoice_amount: f64,
    /// Sum of monthly amounts
    pub monthly_amount: f64,
    /// Sum of actual amounts
    pub actual_amount: f64,
    /// Sum of debit amounts
    pub debit_amount: f64,
    /// Sum of diff amounts
    pub diff_amount: f64,
    /// Sum of pending update amounts
    pub update_amount: f64,
}

impl Totals {
    /// Sums every field over the given datasets in one pass.
    #[must_use]
    pub fn from_datasets<'a>(datasets: impl IntoIterator<Item = &'a Dataset>) -> Self {
        datasets.into_iter().fold(Self::default(), |mut totals, dataset| {
            totals.invoice_amount += dataset.amount(AmountField::Invoice);
            totals.monthly_amount += dataset.amount(AmountField::Monthly);
            totals.actual_amount += dataset.amount(AmountField::Actual);
            totals.debit_amount += dataset.amount(AmountField::Debit);
            totals.diff_amount += dataset.amount(AmountField::Diff);
            totals.update_amount += dataset.amount(AmountField::Update);
            totals
        })
    }

    /// Value of a single field.
    #[must_use]
    pub const fn get(&self, field: AmountField) -> f64 {
        match field {
            AmountField::Invoice => self.invoice_amount,
            AmountField::Monthly => self.monthly_amount,
            AmountField::Actual => self.actual_amount,
            AmountField::Debit => self.debit_amount,
            AmountField::Diff => self.diff_amount,
            AmountField::Update => self.update_amount,
        }
    }
}

/// Sums one field over the given datasets.
pub fn sum_field<'a>(datasets: impl IntoIterator<Item = &'a Dataset>, field: AmountField) -> f64 {
    datasets.into_iter().map(|dataset| dataset.amount(field)).sum()
}

/// Formats totals into a short multi-line summary, useful for logging.
#[must_use]
pub fn format_totals_summary(totals: &Totals) -> String {
    let mut summary = String::from("Active totals\n");

    let rows = [
        ("Invoice", totals.invoice_amount),
        ("Monthly", totals.monthly_amount),
        ("Actual", totals.actual_amount),
        ("Debit", totals.debit_amount),
        ("Diff", totals.diff_amount),
        ("Pending", totals.update_amount),
    ];

    for (label, amount) in rows {
        // write! into a String cannot fail
        let _ = writeln!(summary, "  {label:<8} {amount:>12.2}");
    }

    summary
}
