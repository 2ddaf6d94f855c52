//! Datagroup configuration loading from config.toml
//!
//! This module loads the initial datagroups (and optional datasets) used to
//! seed an empty store on first run. Dates are quoted `YYYY-MM-DD` strings.

use crate::{
    core::store::Store,
    errors::{Error, Result},
    models::{Datagroup, Dataset, Interval, RECURRING_PAYMENT_TYPE, UpdateType},
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Environment variable naming an alternative config file
pub const CONFIG_PATH_VAR: &str = "BILLBIRD_CONFIG";

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Datagroups to seed, in display order
    #[serde(default)]
    pub datagroups: Vec<DatagroupConfig>,
}

/// Configuration for a single seed datagroup
#[derive(Debug, Deserialize, Clone)]
pub struct DatagroupConfig {
    /// Title of the datagroup
    pub title: String,
    /// Whether the group counts towards totals
    #[serde(default = "default_active")]
    pub active: bool,
    /// Datasets created inside this group
    #[serde(default)]
    pub datasets: Vec<DatasetConfig>,
}

/// Configuration for a single seed dataset
#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    /// Title of the dataset
    pub title: String,
    /// Billing period code (`"month"`, `"quarter"`, `"halfyear"`, `"year"`)
    #[serde(default)]
    pub interval: Interval,
    /// Payment type code, recurring by default
    #[serde(default = "default_payment_type", rename = "type")]
    pub payment_type: i32,
    /// Amount of one invoice
    #[serde(default)]
    pub invoice_amount: f64,
    /// Date of the next invoice
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    /// Monthly rate; derived from the invoice amount when omitted
    #[serde(default)]
    pub monthly_amount: Option<f64>,
    /// Expected total for the period
    #[serde(default)]
    pub debit_amount: f64,
    /// Paid-to-date total
    #[serde(default)]
    pub actual_amount: f64,
    /// Update mode (`"add"` or `"equals"`)
    #[serde(default)]
    pub update_type: UpdateType,
}

const fn default_active() -> bool {
    true
}

const fn default_payment_type() -> i32 {
    RECURRING_PAYMENT_TYPE
}

impl DatasetConfig {
    fn to_dataset(&self, group_id: i64) -> Dataset {
        let mut dataset = Dataset::new(self.title.clone(), group_id, self.interval, self.payment_type);
        dataset.invoice_amount = self.invoice_amount;
        dataset.invoice_date = self.invoice_date;
        dataset.debit_amount = self.debit_amount;
        dataset.actual_amount = self.actual_amount;
        dataset.update_type = self.update_type;
        dataset.monthly_amount = self
            .monthly_amount
            .unwrap_or_else(|| dataset.normalized_monthly_amount());
        dataset
    }
}

impl Config {
    /// Adds every configured datagroup and dataset to `store`.
    ///
    /// Ids are allocated by the store. Returns the number of datasets created.
    pub fn seed(&self, store: &mut Store) -> Result<usize> {
        let mut seeded = 0;
        for group_config in &self.datagroups {
            let mut group = Datagroup::new(group_config.title.clone());
            group.active = group_config.active;
            let group_id = store.add_datagroup(group)?;

            for dataset_config in &group_config.datasets {
                store.add_dataset_checked(dataset_config.to_dataset(group_id))?;
                seeded += 1;
            }
        }
        info!(
            "Seeded {} datagroup(s) with {} dataset(s)",
            self.datagroups.len(),
            seeded
        );
        Ok(seeded)
    }
}

/// Loads datagroup configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read ([`Error::Io`])
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())
        .inspect_err(|e| debug!("Failed to read config file {:?}: {}", path.as_ref(), e))?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads the configuration from `BILLBIRD_CONFIG`, or `./config.toml` when unset.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config.toml".to_string());
    load_config(path)
}
