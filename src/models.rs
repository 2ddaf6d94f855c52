//! Domain shapes held by the store: datagroups, datasets and their enumerations.
//!
//! Field names serialize in camelCase, the document shape the remote store
//! exchanges, so a serialized collection reads back into an equal structure.

use crate::errors::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Payment type code of datasets that accept recurring actual-amount updates.
pub const RECURRING_PAYMENT_TYPE: i32 = 1;

/// Truncates a number to two decimal places without rounding.
#[must_use]
pub fn trim_decimals(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

/// Billing period of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    /// Billed every month
    #[default]
    #[serde(rename = "month")]
    Monthly,
    /// Billed every three months
    #[serde(rename = "quarter")]
    Quarterly,
    /// Billed every six months
    #[serde(rename = "halfyear")]
    HalfYearly,
    /// Billed once a year
    #[serde(rename = "year")]
    Yearly,
}

impl Interval {
    /// Number of months covered by one period.
    #[must_use]
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::HalfYearly => 6,
            Self::Yearly => 12,
        }
    }

    /// Text code used in storage and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "month",
            Self::Quarterly => "quarter",
            Self::HalfYearly => "halfyear",
            Self::Yearly => "year",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "month" => Ok(Self::Monthly),
            "quarter" => Ok(Self::Quarterly),
            "halfyear" => Ok(Self::HalfYearly),
            "year" => Ok(Self::Yearly),
            other => Err(Error::InvalidValue {
                field: "interval",
                value: other.to_string(),
            }),
        }
    }
}

/// How a pending update amount is applied to the actual amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpdateType {
    /// `actual := actual + update`
    #[default]
    #[serde(rename = "add")]
    Add,
    /// `actual := update`
    #[serde(rename = "equals")]
    Replace,
}

impl UpdateType {
    /// The other mode.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Add => Self::Replace,
            Self::Replace => Self::Add,
        }
    }

    /// Text code used in storage and configuration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "equals",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "add" => Ok(Self::Add),
            "equals" => Ok(Self::Replace),
            other => Err(Error::InvalidValue {
                field: "update_type",
                value: other.to_string(),
            }),
        }
    }
}

/// Numeric dataset fields that can be summed across the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AmountField {
    /// `invoice_amount`
    Invoice,
    /// `monthly_amount`
    Monthly,
    /// `actual_amount`
    Actual,
    /// `debit_amount`
    Debit,
    /// `diff_amount`
    Diff,
    /// `update_amount`, absent counts as zero
    Update,
}

impl AmountField {
    /// All summable fields in display order.
    pub const ALL: [Self; 6] = [
        Self::Invoice,
        Self::Monthly,
        Self::Actual,
        Self::Debit,
        Self::Diff,
        Self::Update,
    ];
}

/// A single tracked financial obligation (invoice, subscription, ...).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    /// Store-wide unique id, unset until the dataset is added
    pub id: Option<i64>,
    /// Display title
    pub title: String,
    /// Id of the owning datagroup
    pub group_id: i64,
    /// Billing period
    pub interval: Interval,
    /// Payment type code, see [`RECURRING_PAYMENT_TYPE`]
    #[serde(rename = "type")]
    pub payment_type: i32,
    /// Amount of one invoice
    pub invoice_amount: f64,
    /// Date of the next invoice
    pub invoice_date: Option<NaiveDate>,
    /// Date of the previous invoice
    pub last_invoice_date: Option<NaiveDate>,
    /// Date the last pending update was applied
    pub last_update_date: Option<NaiveDate>,
    /// Invoice amount normalized to a monthly rate
    pub monthly_amount: f64,
    /// Paid-to-date total
    pub actual_amount: f64,
    /// Expected total for the period
    pub debit_amount: f64,
    /// `actual_amount - debit_amount`, kept in sync by the store
    pub diff_amount: f64,
    /// Staged update, `None` when nothing is pending
    pub update_amount: Option<f64>,
    /// How the staged update is applied
    pub update_type: UpdateType,
}

impl Dataset {
    /// Creates an unsaved dataset with zeroed amounts.
    #[must_use]
    pub fn new(title: impl Into<String>, group_id: i64, interval: Interval, payment_type: i32) -> Self {
        Self {
            title: title.into(),
            group_id,
            interval,
            payment_type,
            ..Self::default()
        }
    }

    /// Whether this dataset takes recurring actual-amount updates.
    #[must_use]
    pub const fn supports_updates(&self) -> bool {
        self.payment_type == RECURRING_PAYMENT_TYPE
    }

    /// Value of a summable field; an absent update amount reads as zero.
    #[must_use]
    pub fn amount(&self, field: AmountField) -> f64 {
        match field {
            AmountField::Invoice => self.invoice_amount,
            AmountField::Monthly => self.monthly_amount,
            AmountField::Actual => self.actual_amount,
            AmountField::Debit => self.debit_amount,
            AmountField::Diff => self.diff_amount,
            AmountField::Update => self.update_amount.unwrap_or(0.0),
        }
    }

    /// Re-derives `diff_amount` from actual and debit.
    pub fn recompute_diff(&mut self) {
        self.diff_amount = self.actual_amount - self.debit_amount;
    }

    /// Invoice amount spread over the months of one interval, truncated to cents.
    #[must_use]
    pub fn normalized_monthly_amount(&self) -> f64 {
        trim_decimals(self.invoice_amount / f64::from(self.interval.months()))
    }

    /// Checks that every amount is finite.
    pub fn validate_amounts(&self) -> Result<()> {
        let amounts = [
            ("invoice_amount", self.invoice_amount),
            ("monthly_amount", self.monthly_amount),
            ("actual_amount", self.actual_amount),
            ("debit_amount", self.debit_amount),
            ("diff_amount", self.diff_amount),
        ];
        for (field, amount) in amounts {
            ensure_finite(field, amount)?;
        }
        if let Some(amount) = self.update_amount {
            ensure_finite("update_amount", amount)?;
        }
        Ok(())
    }
}

/// A named, orderable bucket of datasets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datagroup {
    /// Store-wide unique id, unset until the group is added
    pub id: Option<i64>,
    /// Display title
    pub title: String,
    /// Inactive groups are left out of totals and update runs
    pub active: bool,
    /// Owned datasets in display order
    pub datasets: Vec<Dataset>,
}

impl Datagroup {
    /// Creates an unsaved, active, empty group.
    #[must_use]
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            active: true,
            datasets: Vec::new(),
        }
    }

    /// Sum of a field over this group's datasets, regardless of the active flag.
    #[must_use]
    pub fn total(&self, field: AmountField) -> f64 {
        self.datasets.iter().map(|d| d.amount(field)).sum()
    }
}

/// Rejects NaN and infinite values.
pub(crate) fn ensure_finite(field: &'static str, amount: f64) -> Result<()> {
    if amount.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidAmount { field, amount })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_trim_decimals_truncates() {
        assert_eq!(trim_decimals(10.999), 10.99);
        assert_eq!(trim_decimals(-3.456), -3.45);
        assert_eq!(trim_decimals(5.0), 5.0);
    }

    #[test]
    fn test_interval_codes_parse() {
        for interval in [
            Interval::Monthly,
            Interval::Quarterly,
            Interval::HalfYearly,
            Interval::Yearly,
        ] {
            assert_eq!(interval.as_str().parse::<Interval>().unwrap(), interval);
        }
        assert!(matches!(
            "weekly".parse::<Interval>(),
            Err(Error::InvalidValue { field: "interval", .. })
        ));
    }

    #[test]
    fn test_update_type_toggle_and_codes() {
        assert_eq!(UpdateType::Add.toggled(), UpdateType::Replace);
        assert_eq!(UpdateType::Replace.toggled(), UpdateType::Add);
        assert_eq!("equals".parse::<UpdateType>().unwrap(), UpdateType::Replace);
        assert!("set".parse::<UpdateType>().is_err());
    }

    #[test]
    fn test_normalized_monthly_amount() {
        let mut dataset = Dataset::new("Insurance", 1, Interval::Yearly, 2);
        dataset.invoice_amount = 1500.0;
        assert_eq!(dataset.normalized_monthly_amount(), 125.0);

        dataset.interval = Interval::Quarterly;
        dataset.invoice_amount = 100.0;
        assert_eq!(dataset.normalized_monthly_amount(), 33.33);
    }

    #[test]
    fn test_amount_reads_absent_update_as_zero() {
        let mut dataset = Dataset::new("Rent", 1, Interval::Monthly, RECURRING_PAYMENT_TYPE);
        assert_eq!(dataset.amount(AmountField::Update), 0.0);
        dataset.update_amount = Some(12.5);
        assert_eq!(dataset.amount(AmountField::Update), 12.5);
        assert!(dataset.supports_updates());
    }

    #[test]
    fn test_validate_amounts_rejects_nan() {
        let mut dataset = Dataset::new("Power", 1, Interval::Monthly, 1);
        assert!(dataset.validate_amounts().is_ok());
        dataset.update_amount = Some(f64::NAN);
        assert!(matches!(
            dataset.validate_amounts(),
            Err(Error::InvalidAmount { field: "update_amount", .. })
        ));
    }

    #[test]
    fn test_serde_uses_document_field_names() {
        let mut dataset = Dataset::new("Phone", 3, Interval::HalfYearly, 1);
        dataset.id = Some(7);
        dataset.update_type = UpdateType::Replace;
        let json = serde_json::to_value(&dataset).unwrap();
        assert_eq!(json["groupId"], 3);
        assert_eq!(json["type"], 1);
        assert_eq!(json["interval"], "halfyear");
        assert_eq!(json["updateType"], "equals");
        assert!(json["updateAmount"].is_null());
    }
}
