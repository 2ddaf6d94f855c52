//! Snapshot persistence - marshals the whole datagroup collection to and from the database.
//!
//! The in-memory [`Store`] stays the source of truth. [`save_store`] replaces the
//! persisted rows with the current collection inside one database transaction,
//! and [`load_store`] rebuilds a store in display order, re-checking every
//! invariant. Bookkeeping timestamps live in the `system_state` table.

use crate::{
    core::store::Store,
    entities::{Datagroup, Dataset, SystemState, datagroup, dataset, system_state},
    errors::{Error, Result},
    models,
};
use chrono::{NaiveDate, NaiveDateTime, Utc};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::HashMap;
use tracing::{debug, info};

/// `system_state` key holding the time of the last save
pub const LAST_SAVED_KEY: &str = "last_saved";
/// `system_state` key holding the date of the last pending-update run
pub const LAST_UPDATE_RUN_KEY: &str = "last_update_run";

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Replaces the persisted collection with the current contents of `store`.
///
/// All rows are rewritten inside a single transaction, so a failed save leaves
/// the previous snapshot intact.
pub async fn save_store(db: &DatabaseConnection, store: &Store) -> Result<()> {
    write_snapshot(db, store, None).await
}

/// Like [`save_store`], and records `run_date` as the last pending-update run
/// in the same transaction.
///
/// The run is only marked done once the amounts it produced are persisted.
pub async fn save_store_with_update_run(
    db: &DatabaseConnection,
    store: &Store,
    run_date: NaiveDate,
) -> Result<()> {
    write_snapshot(db, store, Some(run_date)).await
}

async fn write_snapshot(
    db: &DatabaseConnection,
    store: &Store,
    run_date: Option<NaiveDate>,
) -> Result<()> {
    let txn = db.begin().await?;

    Dataset::delete_many().exec(&txn).await?;
    Datagroup::delete_many().exec(&txn).await?;

    for (group_position, group) in store.datagroups().iter().enumerate() {
        datagroup_row(group, group_position)?.insert(&txn).await?;
        for (position, item) in group.datasets.iter().enumerate() {
            dataset_row(item, position)?.insert(&txn).await?;
        }
    }

    let now = Utc::now().naive_utc();
    set_state_value(&txn, LAST_SAVED_KEY, &now.format(DATETIME_FORMAT).to_string()).await?;
    if let Some(date) = run_date {
        set_state_value(&txn, LAST_UPDATE_RUN_KEY, &date.format(DATE_FORMAT).to_string()).await?;
    }

    txn.commit().await?;
    info!(
        "Saved {} datagroup(s) and {} dataset(s)",
        store.datagroups().len(),
        store.dataset_count()
    );
    Ok(())
}

/// Rebuilds a store from the persisted rows.
///
/// Fails with a validation error when a dataset references a datagroup that
/// was not persisted, or when any store invariant does not hold.
pub async fn load_store(db: &DatabaseConnection) -> Result<Store> {
    let group_rows = Datagroup::find()
        .order_by_asc(datagroup::Column::Position)
        .all(db)
        .await?;
    let dataset_rows = Dataset::find()
        .order_by_asc(dataset::Column::GroupId)
        .order_by_asc(dataset::Column::Position)
        .all(db)
        .await?;
    debug!(
        "Loaded {} datagroup row(s) and {} dataset row(s)",
        group_rows.len(),
        dataset_rows.len()
    );

    let mut by_group: HashMap<i64, Vec<models::Dataset>> = HashMap::new();
    for row in dataset_rows {
        by_group
            .entry(row.group_id)
            .or_default()
            .push(models::Dataset::try_from(row)?);
    }

    let mut datagroups = Vec::with_capacity(group_rows.len());
    for row in group_rows {
        datagroups.push(models::Datagroup {
            id: Some(row.id),
            title: row.title,
            active: row.active,
            datasets: by_group.remove(&row.id).unwrap_or_default(),
        });
    }

    if let Some(orphan_group) = by_group.keys().min() {
        return Err(Error::Validation {
            message: format!("persisted datasets reference missing datagroup {orphan_group}"),
        });
    }

    Store::from_datagroups(datagroups)
}

/// Time of the last successful [`save_store`], if any.
pub async fn last_saved(db: &DatabaseConnection) -> Result<Option<NaiveDateTime>> {
    get_state_value(db, LAST_SAVED_KEY)
        .await?
        .map(|value| {
            NaiveDateTime::parse_from_str(&value, DATETIME_FORMAT).map_err(|e| Error::Config {
                message: format!("Failed to parse last save time: {e}"),
            })
        })
        .transpose()
}

/// Date of the last recorded pending-update run, if any.
pub async fn last_update_run(db: &DatabaseConnection) -> Result<Option<NaiveDate>> {
    get_state_value(db, LAST_UPDATE_RUN_KEY)
        .await?
        .map(|value| {
            NaiveDate::parse_from_str(&value, DATE_FORMAT).map_err(|e| Error::Config {
                message: format!("Failed to parse last update run date: {e}"),
            })
        })
        .transpose()
}

/// Records the date of a pending-update run.
pub async fn record_update_run(db: &DatabaseConnection, date: NaiveDate) -> Result<()> {
    set_state_value(db, LAST_UPDATE_RUN_KEY, &date.format(DATE_FORMAT).to_string()).await
}

async fn get_state_value<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    Ok(SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?
        .map(|state| state.value))
}

async fn set_state_value<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let new_state = system_state::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        new_state.insert(db).await?;
    }

    Ok(())
}

fn datagroup_row(group: &models::Datagroup, position: usize) -> Result<datagroup::ActiveModel> {
    let id = group.id.ok_or_else(|| Error::Validation {
        message: format!("datagroup {:?} has no id", group.title),
    })?;
    Ok(datagroup::ActiveModel {
        id: Set(id),
        title: Set(group.title.clone()),
        active: Set(group.active),
        position: Set(i32::try_from(position)?),
    })
}

fn dataset_row(item: &models::Dataset, position: usize) -> Result<dataset::ActiveModel> {
    let id = item.id.ok_or_else(|| Error::Validation {
        message: format!("dataset {:?} has no id", item.title),
    })?;
    Ok(dataset::ActiveModel {
        id: Set(id),
        group_id: Set(item.group_id),
        position: Set(i32::try_from(position)?),
        title: Set(item.title.clone()),
        interval: Set(item.interval.as_str().to_string()),
        payment_type: Set(item.payment_type),
        invoice_amount: Set(item.invoice_amount),
        invoice_date: Set(item.invoice_date),
        last_invoice_date: Set(item.last_invoice_date),
        last_update_date: Set(item.last_update_date),
        monthly_amount: Set(item.monthly_amount),
        actual_amount: Set(item.actual_amount),
        debit_amount: Set(item.debit_amount),
        diff_amount: Set(item.diff_amount),
        update_amount: Set(item.update_amount),
        update_type: Set(item.update_type.as_str().to_string()),
    })
}

impl TryFrom<dataset::Model> for models::Dataset {
    type Error = Error;

    fn try_from(row: dataset::Model) -> Result<Self> {
        Ok(Self {
            id: Some(row.id),
            title: row.title,
            group_id: row.group_id,
            interval: row.interval.parse()?,
            payment_type: row.payment_type,
            invoice_amount: row.invoice_amount,
            invoice_date: row.invoice_date,
            last_invoice_date: row.last_invoice_date,
            last_update_date: row.last_update_date,
            monthly_amount: row.monthly_amount,
            actual_amount: row.actual_amount,
            debit_amount: row.debit_amount,
            diff_amount: row.diff_amount,
            update_amount: row.update_amount,
            update_type: row.update_type.parse()?,
        })
    }
}
