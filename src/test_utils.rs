//! Shared test utilities for `billbird`.
//!
//! This module provides fixture builders for datasets, datagroups and stores,
//! plus an in-memory database with all tables created.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use crate::{
    core::store::Store,
    errors::Result,
    models::{Datagroup, Dataset, Interval, RECURRING_PAYMENT_TYPE},
};
use chrono::NaiveDate;
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Installs a tracing subscriber that writes through the test harness.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")))
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Fixed date used wherever a test needs "today".
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid fixture date")
}

/// Creates a saved, recurring, monthly dataset with a consistent diff.
///
/// # Defaults
/// * `title`: `"Dataset <id>"`
/// * `interval`: monthly
/// * `payment_type`: recurring
/// * all other amounts zero, no pending update
pub fn test_dataset(id: i64, group_id: i64, actual_amount: f64, debit_amount: f64) -> Dataset {
    let mut dataset = Dataset::new(
        format!("Dataset {id}"),
        group_id,
        Interval::Monthly,
        RECURRING_PAYMENT_TYPE,
    );
    dataset.id = Some(id);
    dataset.actual_amount = actual_amount;
    dataset.debit_amount = debit_amount;
    dataset.recompute_diff();
    dataset
}

/// Creates a saved, active, empty datagroup.
pub fn test_datagroup(id: i64, title: &str) -> Datagroup {
    let mut group = Datagroup::new(title);
    group.id = Some(id);
    group
}

/// A store with two active groups.
///
/// * group 1 `"Household"`: datasets 1 (actual 100, debit 120) and 2 (40 / 40)
/// * group 2 `"Subscriptions"`: dataset 3 (15 / 10)
pub fn populated_store() -> Store {
    let mut store = Store::new();
    store.add_datagroup(test_datagroup(1, "Household")).unwrap();
    store.add_datagroup(test_datagroup(2, "Subscriptions")).unwrap();

    let mut rent = test_dataset(1, 1, 100.0, 120.0);
    rent.invoice_amount = 240.0;
    rent.monthly_amount = 20.0;
    store.add_dataset(rent).unwrap();

    let mut power = test_dataset(2, 1, 40.0, 40.0);
    power.invoice_amount = 40.0;
    power.monthly_amount = 40.0;
    store.add_dataset(power).unwrap();

    let mut music = test_dataset(3, 2, 15.0, 10.0);
    music.invoice_amount = 60.0;
    music.interval = Interval::HalfYearly;
    music.monthly_amount = 10.0;
    store.add_dataset(music).unwrap();

    store
}
