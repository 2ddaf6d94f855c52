//! In-memory datagroup store - the source of truth for all datagroups and datasets.
//!
//! The store owns its state exclusively. Queries hand out shared borrows, so
//! callers cannot bypass the mutation methods below. Aggregates are derived on
//! every call; no sums are cached.
//!
//! Lookups by id that find nothing are silent no-ops in the default methods.
//! Each of those has a `*_checked` counterpart that reports the missing entity.

use crate::{
    core::{
        events::{DEFAULT_EVENT_CAPACITY, DatasetField, StoreEvent},
        totals::{Totals, sum_field},
        updates::{AppliedUpdate, UpdateRunResult, apply_pending},
    },
    errors::{Error, Result},
    models::{AmountField, Datagroup, Dataset, UpdateType, ensure_finite},
};
use chrono::NaiveDate;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// A single-field edit applied to every dataset carrying a given id.
///
/// Numeric changes treat `None` as zero, except [`DatasetChange::UpdateAmount`]
/// where `None` means "no pending update".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DatasetChange {
    /// Overwrite the actual amount
    ActualAmount(Option<f64>),
    /// Add to the actual amount
    AddActualAmount(Option<f64>),
    /// Overwrite the debit amount
    DebitAmount(Option<f64>),
    /// Overwrite the stored diff
    DiffAmount(Option<f64>),
    /// Overwrite the monthly amount
    MonthlyAmount(Option<f64>),
    /// Set or clear the invoice date
    InvoiceDate(Option<NaiveDate>),
    /// Set or clear the last invoice date
    LastInvoiceDate(Option<NaiveDate>),
    /// Set or clear the last update date
    LastUpdateDate(Option<NaiveDate>),
    /// Stage or clear a pending update
    UpdateAmount(Option<f64>),
    /// Switch the update mode
    UpdateType(UpdateType),
}

impl DatasetChange {
    const fn field(self) -> DatasetField {
        match self {
            Self::ActualAmount(_) | Self::AddActualAmount(_) => DatasetField::ActualAmount,
            Self::DebitAmount(_) => DatasetField::DebitAmount,
            Self::DiffAmount(_) => DatasetField::DiffAmount,
            Self::MonthlyAmount(_) => DatasetField::MonthlyAmount,
            Self::InvoiceDate(_) => DatasetField::InvoiceDate,
            Self::LastInvoiceDate(_) => DatasetField::LastInvoiceDate,
            Self::LastUpdateDate(_) => DatasetField::LastUpdateDate,
            Self::UpdateAmount(_) => DatasetField::UpdateAmount,
            Self::UpdateType(_) => DatasetField::UpdateType,
        }
    }

    fn validate(self) -> Result<()> {
        let (field, amount) = match self {
            Self::ActualAmount(a) | Self::AddActualAmount(a) => ("actual_amount", a),
            Self::DebitAmount(a) => ("debit_amount", a),
            Self::DiffAmount(a) => ("diff_amount", a),
            Self::MonthlyAmount(a) => ("monthly_amount", a),
            Self::UpdateAmount(a) => ("update_amount", a),
            Self::InvoiceDate(_)
            | Self::LastInvoiceDate(_)
            | Self::LastUpdateDate(_)
            | Self::UpdateType(_) => return Ok(()),
        };
        amount.map_or(Ok(()), |amount| ensure_finite(field, amount))
    }

    fn apply(self, dataset: &mut Dataset) {
        match self {
            Self::ActualAmount(amount) => {
                dataset.actual_amount = amount.unwrap_or(0.0);
                dataset.recompute_diff();
            }
            Self::AddActualAmount(amount) => {
                dataset.actual_amount += amount.unwrap_or(0.0);
                dataset.recompute_diff();
            }
            Self::DebitAmount(amount) => {
                dataset.debit_amount = amount.unwrap_or(0.0);
                dataset.recompute_diff();
            }
            Self::DiffAmount(amount) => dataset.diff_amount = amount.unwrap_or(0.0),
            Self::MonthlyAmount(amount) => dataset.monthly_amount = amount.unwrap_or(0.0),
            Self::InvoiceDate(date) => dataset.invoice_date = date,
            Self::LastInvoiceDate(date) => dataset.last_invoice_date = date,
            Self::LastUpdateDate(date) => dataset.last_update_date = date,
            Self::UpdateAmount(amount) => dataset.update_amount = amount,
            Self::UpdateType(update_type) => dataset.update_type = update_type,
        }
    }
}

/// Ordered collection of datagroups with invariant-preserving mutations.
#[derive(Debug)]
pub struct Store {
    datagroups: Vec<Datagroup>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Creates an empty store whose subscribers buffer up to `capacity` events.
    #[must_use]
    pub fn with_event_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            datagroups: Vec::new(),
            events,
        }
    }

    /// Builds a store from a previously marshaled collection, checking every invariant.
    ///
    /// All ids must be set, unique per entity kind, every dataset must name the
    /// group that contains it, and every amount must be finite.
    pub fn from_datagroups(datagroups: Vec<Datagroup>) -> Result<Self> {
        let mut store = Self::new();
        for group in datagroups {
            let id = group.id.ok_or_else(|| Error::Validation {
                message: format!("datagroup {:?} has no id", group.title),
            })?;
            if store.group_index(id).is_some() {
                return Err(Error::DuplicateDatagroupId { id });
            }
            store.validate_members(&group, id, None)?;
            store.datagroups.push(group);
        }
        debug!(
            "Store built from {} datagroup(s) holding {} dataset(s)",
            store.datagroups.len(),
            store.dataset_count()
        );
        Ok(store)
    }

    /// Registers a new observer. Events emitted before this call are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // --- Queries ---

    /// All datagroups in display order.
    #[must_use]
    pub fn datagroups(&self) -> &[Datagroup] {
        &self.datagroups
    }

    /// Owned copy of the whole collection, for marshaling.
    #[must_use]
    pub fn to_snapshot(&self) -> Vec<Datagroup> {
        self.datagroups.clone()
    }

    /// Consumes the store and returns its collection.
    #[must_use]
    pub fn into_datagroups(self) -> Vec<Datagroup> {
        self.datagroups
    }

    /// Finds a datagroup by id.
    #[must_use]
    pub fn datagroup(&self, id: i64) -> Option<&Datagroup> {
        self.datagroups.iter().find(|group| group.id == Some(id))
    }

    /// Finds a dataset by id anywhere in the store.
    #[must_use]
    pub fn dataset(&self, id: i64) -> Option<&Dataset> {
        self.datagroups
            .iter()
            .flat_map(|group| group.datasets.iter())
            .find(|dataset| dataset.id == Some(id))
    }

    /// Every dataset, group order first, then order within the group.
    #[must_use]
    pub fn all_datasets(&self) -> Vec<&Dataset> {
        self.datagroups
            .iter()
            .flat_map(|group| group.datasets.iter())
            .collect()
    }

    /// Total number of datasets across all groups.
    #[must_use]
    pub fn dataset_count(&self) -> usize {
        self.datagroups.iter().map(|group| group.datasets.len()).sum()
    }

    fn active_datasets(&self) -> impl Iterator<Item = &Dataset> {
        self.datagroups
            .iter()
            .filter(|group| group.active)
            .flat_map(|group| group.datasets.iter())
    }

    /// Sum of `field` over datasets of active groups. Zero for an empty or all-inactive store.
    #[must_use]
    pub fn total(&self, field: AmountField) -> f64 {
        sum_field(self.active_datasets(), field)
    }

    /// All six active aggregates.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals::from_datasets(self.active_datasets())
    }

    /// Active sum of invoice amounts.
    #[must_use]
    pub fn total_invoice_amount(&self) -> f64 {
        self.total(AmountField::Invoice)
    }

    /// Active sum of monthly amounts.
    #[must_use]
    pub fn total_monthly_amount(&self) -> f64 {
        self.total(AmountField::Monthly)
    }

    /// Active sum of actual amounts.
    #[must_use]
    pub fn total_actual_amount(&self) -> f64 {
        self.total(AmountField::Actual)
    }

    /// Active sum of debit amounts.
    #[must_use]
    pub fn total_debit_amount(&self) -> f64 {
        self.total(AmountField::Debit)
    }

    /// Active sum of diff amounts.
    #[must_use]
    pub fn total_diff_amount(&self) -> f64 {
        self.total(AmountField::Diff)
    }

    /// Active sum of pending update amounts.
    #[must_use]
    pub fn total_update_amount(&self) -> f64 {
        self.total(AmountField::Update)
    }

    /// One more than the highest datagroup id (unset ids count as 0), or 1 when empty.
    #[must_use]
    pub fn next_datagroup_id(&self) -> i64 {
        self.datagroups
            .iter()
            .map(|group| group.id.unwrap_or(0))
            .max()
            .map_or(1, |max| max + 1)
    }

    /// One more than the highest dataset id (unset ids count as 0), or 1 when empty.
    #[must_use]
    pub fn next_dataset_id(&self) -> i64 {
        self.datagroups
            .iter()
            .flat_map(|group| group.datasets.iter())
            .map(|dataset| dataset.id.unwrap_or(0))
            .max()
            .map_or(1, |max| max + 1)
    }

    // --- Datagroup mutations ---

    /// Appends a group, allocating an id when unset. Returns the group's id.
    ///
    /// A colliding id is rejected. Any datasets carried by the group must
    /// already satisfy the ownership invariants.
    pub fn add_datagroup(&mut self, mut group: Datagroup) -> Result<i64> {
        let id = group.id.unwrap_or_else(|| self.next_datagroup_id());
        if self.group_index(id).is_some() {
            warn!("Rejected datagroup {:?}: id {} already in use", group.title, id);
            return Err(Error::DuplicateDatagroupId { id });
        }
        self.validate_members(&group, id, None)?;

        group.id = Some(id);
        for dataset in &mut group.datasets {
            dataset.recompute_diff();
        }
        debug!("Adding datagroup {} ({:?})", id, group.title);
        self.datagroups.push(group);
        self.emit(StoreEvent::DatagroupAdded { id });
        Ok(id)
    }

    /// Removes an empty group. Missing ids are ignored; non-empty groups are rejected.
    pub fn delete_datagroup(&mut self, id: i64) -> Result<Option<Datagroup>> {
        let Some(index) = self.group_index(id) else {
            debug!("delete_datagroup: no datagroup {}", id);
            return Ok(None);
        };
        let datasets = self.datagroups[index].datasets.len();
        if datasets > 0 {
            warn!("Refusing to delete datagroup {} holding {} dataset(s)", id, datasets);
            return Err(Error::DatagroupNotEmpty { id, datasets });
        }
        let removed = self.datagroups.remove(index);
        self.emit(StoreEvent::DatagroupRemoved { id, datasets: 0 });
        Ok(Some(removed))
    }

    /// Like [`Self::delete_datagroup`], but a missing id is an error.
    pub fn delete_datagroup_checked(&mut self, id: i64) -> Result<Datagroup> {
        self.delete_datagroup(id)?
            .ok_or(Error::DatagroupNotFound { id })
    }

    /// Removes a group together with every dataset it owns.
    pub fn delete_datagroup_cascade(&mut self, id: i64) -> Option<Datagroup> {
        let Some(index) = self.group_index(id) else {
            debug!("delete_datagroup_cascade: no datagroup {}", id);
            return None;
        };
        let removed = self.datagroups.remove(index);
        info!(
            "Deleted datagroup {} and {} dataset(s)",
            id,
            removed.datasets.len()
        );
        self.emit(StoreEvent::DatagroupRemoved {
            id,
            datasets: removed.datasets.len(),
        });
        Some(removed)
    }

    /// Swaps the stored group with the same id for `group`, keeping its position.
    ///
    /// Returns `Ok(false)` when no group matches.
    pub fn replace_datagroup(&mut self, mut group: Datagroup) -> Result<bool> {
        let Some(index) = group.id.and_then(|id| self.group_index(id)) else {
            debug!("replace_datagroup: no datagroup {:?}", group.id);
            return Ok(false);
        };
        let id = group.id.unwrap_or_default();
        self.validate_members(&group, id, Some(index))?;

        for dataset in &mut group.datasets {
            dataset.recompute_diff();
        }
        self.datagroups[index] = group;
        self.emit(StoreEvent::DatagroupReplaced { id });
        Ok(true)
    }

    /// Like [`Self::replace_datagroup`], but a missing id is an error.
    pub fn replace_datagroup_checked(&mut self, group: Datagroup) -> Result<()> {
        let id = group.id.unwrap_or_default();
        if self.replace_datagroup(group)? {
            Ok(())
        } else {
            Err(Error::DatagroupNotFound { id })
        }
    }

    /// Marks a group active. Returns whether a group matched.
    pub fn activate_datagroup(&mut self, id: i64) -> bool {
        self.set_group_active(id, true)
    }

    /// Marks a group inactive; views collapse it. Returns whether a group matched.
    pub fn deactivate_datagroup(&mut self, id: i64) -> bool {
        self.set_group_active(id, false)
    }

    /// Like [`Self::activate_datagroup`], but a missing id is an error.
    pub fn activate_datagroup_checked(&mut self, id: i64) -> Result<()> {
        self.set_group_active(id, true)
            .then_some(())
            .ok_or(Error::DatagroupNotFound { id })
    }

    /// Like [`Self::deactivate_datagroup`], but a missing id is an error.
    pub fn deactivate_datagroup_checked(&mut self, id: i64) -> Result<()> {
        self.set_group_active(id, false)
            .then_some(())
            .ok_or(Error::DatagroupNotFound { id })
    }

    fn set_group_active(&mut self, id: i64, active: bool) -> bool {
        let Some(index) = self.group_index(id) else {
            debug!("set_group_active: no datagroup {}", id);
            return false;
        };
        self.datagroups[index].active = active;
        self.emit(if active {
            StoreEvent::DatagroupActivated { id }
        } else {
            StoreEvent::DatagroupDeactivated { id }
        });
        true
    }

    // --- Dataset mutations ---

    /// Appends a dataset to the group named by its `group_id`.
    ///
    /// Allocates an id when unset and re-derives the diff. Returns `Ok(None)`
    /// when no group matches; a colliding id or a non-finite amount is rejected.
    pub fn add_dataset(&mut self, mut dataset: Dataset) -> Result<Option<i64>> {
        dataset.validate_amounts()?;
        let group_id = dataset.group_id;
        let Some(index) = self.group_index(group_id) else {
            debug!("add_dataset: no datagroup {} for {:?}", group_id, dataset.title);
            return Ok(None);
        };

        let id = dataset.id.unwrap_or_else(|| self.next_dataset_id());
        if self.dataset(id).is_some() {
            warn!("Rejected dataset {:?}: id {} already in use", dataset.title, id);
            return Err(Error::DuplicateDatasetId { id });
        }

        dataset.id = Some(id);
        dataset.recompute_diff();
        debug!("Adding dataset {} ({:?}) to datagroup {}", id, dataset.title, group_id);
        self.datagroups[index].datasets.push(dataset);
        self.emit(StoreEvent::DatasetAdded { id, group_id });
        Ok(Some(id))
    }

    /// Like [`Self::add_dataset`], but a missing owning group is an error.
    pub fn add_dataset_checked(&mut self, dataset: Dataset) -> Result<i64> {
        let group_id = dataset.group_id;
        self.add_dataset(dataset)?
            .ok_or(Error::DatagroupNotFound { id: group_id })
    }

    /// Removes the dataset with `dataset.id` from the group named by `dataset.group_id`.
    pub fn delete_dataset(&mut self, dataset: &Dataset) -> Option<Dataset> {
        let id = dataset.id?;
        let group_id = dataset.group_id;
        let Some(group) = self
            .datagroups
            .iter_mut()
            .find(|group| group.id == Some(group_id))
        else {
            debug!("delete_dataset: no datagroup {}", group_id);
            return None;
        };
        let Some(position) = group.datasets.iter().position(|d| d.id == Some(id)) else {
            debug!("delete_dataset: no dataset {} in datagroup {}", id, group_id);
            return None;
        };
        let removed = group.datasets.remove(position);
        self.emit(StoreEvent::DatasetRemoved { id, group_id });
        Some(removed)
    }

    /// Like [`Self::delete_dataset`], but a missing dataset is an error.
    pub fn delete_dataset_checked(&mut self, dataset: &Dataset) -> Result<Dataset> {
        self.delete_dataset(dataset)
            .ok_or(Error::DatasetNotFound {
                id: dataset.id.unwrap_or_default(),
            })
    }

    /// Replaces the stored dataset with the same id.
    ///
    /// Same owning group: replaced in place. Different group: removed from the
    /// old group and inserted at the front of the new one. A target group that
    /// does not exist is rejected before anything changes. Returns `Ok(false)`
    /// when no dataset matches.
    pub fn replace_dataset(&mut self, mut dataset: Dataset) -> Result<bool> {
        dataset.validate_amounts()?;
        let Some(id) = dataset.id else {
            debug!("replace_dataset: dataset {:?} has no id", dataset.title);
            return Ok(false);
        };
        let Some((group_index, position)) = self.locate_dataset(id) else {
            debug!("replace_dataset: no dataset {}", id);
            return Ok(false);
        };
        dataset.recompute_diff();

        let from_group = self.datagroups[group_index].id.unwrap_or_default();
        let to_group = dataset.group_id;
        if from_group == to_group {
            self.datagroups[group_index].datasets[position] = dataset;
            self.emit(StoreEvent::DatasetReplaced {
                id,
                group_id: to_group,
            });
            return Ok(true);
        }

        let Some(target) = self.group_index(to_group) else {
            warn!("Refusing to move dataset {} into missing datagroup {}", id, to_group);
            return Err(Error::DatagroupNotFound { id: to_group });
        };
        self.datagroups[group_index].datasets.remove(position);
        self.datagroups[target].datasets.insert(0, dataset);
        debug!("Moved dataset {} from datagroup {} to {}", id, from_group, to_group);
        self.emit(StoreEvent::DatasetMoved {
            id,
            from_group,
            to_group,
        });
        Ok(true)
    }

    /// Like [`Self::replace_dataset`], but a missing dataset is an error.
    pub fn replace_dataset_checked(&mut self, dataset: Dataset) -> Result<()> {
        let id = dataset.id.unwrap_or_default();
        if self.replace_dataset(dataset)? {
            Ok(())
        } else {
            Err(Error::DatasetNotFound { id })
        }
    }

    /// Applies `change` to every dataset with this id. Returns how many matched.
    ///
    /// Ids are matched store-wide, without group scoping.
    pub fn change_dataset(&mut self, id: i64, change: DatasetChange) -> Result<usize> {
        change.validate()?;
        // Sums of finite amounts can still overflow; check every target before touching any
        for dataset in self.all_datasets().into_iter().filter(|d| d.id == Some(id)) {
            let mut changed = dataset.clone();
            change.apply(&mut changed);
            changed.validate_amounts()?;
        }
        let mut matched = 0;
        for dataset in self.datasets_with_id(id) {
            change.apply(dataset);
            matched += 1;
        }
        if matched == 0 {
            debug!("change_dataset: no dataset {} for {:?}", id, change);
        } else {
            self.emit(StoreEvent::DatasetChanged {
                id,
                field: change.field(),
            });
        }
        Ok(matched)
    }

    /// Like [`Self::change_dataset`], but a missing dataset is an error.
    pub fn change_dataset_checked(&mut self, id: i64, change: DatasetChange) -> Result<()> {
        match self.change_dataset(id, change)? {
            0 => Err(Error::DatasetNotFound { id }),
            _ => Ok(()),
        }
    }

    /// Sets the actual amount (`None` -> 0) and re-derives the diff.
    pub fn set_actual_amount(&mut self, id: i64, amount: Option<f64>) -> Result<()> {
        self.change_dataset(id, DatasetChange::ActualAmount(amount))
            .map(drop)
    }

    /// Adds to the actual amount (`None` adds 0) and re-derives the diff.
    pub fn add_actual_amount(&mut self, id: i64, amount: Option<f64>) -> Result<()> {
        self.change_dataset(id, DatasetChange::AddActualAmount(amount))
            .map(drop)
    }

    /// Sets the debit amount (`None` -> 0) and re-derives the diff.
    pub fn set_debit_amount(&mut self, id: i64, amount: Option<f64>) -> Result<()> {
        self.change_dataset(id, DatasetChange::DebitAmount(amount))
            .map(drop)
    }

    /// Overrides the stored diff (`None` -> 0).
    pub fn set_diff_amount(&mut self, id: i64, amount: Option<f64>) -> Result<()> {
        self.change_dataset(id, DatasetChange::DiffAmount(amount))
            .map(drop)
    }

    /// Sets the monthly amount (`None` -> 0).
    pub fn set_monthly_amount(&mut self, id: i64, amount: Option<f64>) -> Result<()> {
        self.change_dataset(id, DatasetChange::MonthlyAmount(amount))
            .map(drop)
    }

    /// Sets or clears the invoice date.
    pub fn set_invoice_date(&mut self, id: i64, date: Option<NaiveDate>) -> Result<()> {
        self.change_dataset(id, DatasetChange::InvoiceDate(date))
            .map(drop)
    }

    /// Sets or clears the last invoice date.
    pub fn set_last_invoice_date(&mut self, id: i64, date: Option<NaiveDate>) -> Result<()> {
        self.change_dataset(id, DatasetChange::LastInvoiceDate(date))
            .map(drop)
    }

    /// Sets or clears the last update date.
    pub fn set_last_update_date(&mut self, id: i64, date: Option<NaiveDate>) -> Result<()> {
        self.change_dataset(id, DatasetChange::LastUpdateDate(date))
            .map(drop)
    }

    /// Stages a pending update; `None` clears it (distinct from staging zero).
    pub fn set_update_amount(&mut self, id: i64, amount: Option<f64>) -> Result<()> {
        self.change_dataset(id, DatasetChange::UpdateAmount(amount))
            .map(drop)
    }

    /// Switches the update mode. No amount changes.
    pub fn set_update_type(&mut self, id: i64, update_type: UpdateType) -> Result<()> {
        self.change_dataset(id, DatasetChange::UpdateType(update_type))
            .map(drop)
    }

    /// Flips the update mode between add and replace. Returns how many matched.
    pub fn toggle_update_type(&mut self, id: i64) -> usize {
        let mut matched = 0;
        for dataset in self.datasets_with_id(id) {
            dataset.update_type = dataset.update_type.toggled();
            matched += 1;
        }
        if matched > 0 {
            self.emit(StoreEvent::DatasetChanged {
                id,
                field: DatasetField::UpdateType,
            });
        }
        matched
    }

    /// Stages the monthly amount as the pending update. Returns how many matched.
    pub fn fill_update_amount(&mut self, id: i64) -> usize {
        let mut matched = 0;
        for dataset in self.datasets_with_id(id) {
            dataset.update_amount = Some(dataset.monthly_amount);
            matched += 1;
        }
        if matched > 0 {
            self.emit(StoreEvent::DatasetChanged {
                id,
                field: DatasetField::UpdateAmount,
            });
        }
        matched
    }

    /// Stores the invoice amount normalized to a monthly rate. Returns how many matched.
    pub fn refresh_monthly_amount(&mut self, id: i64) -> usize {
        let mut matched = 0;
        for dataset in self.datasets_with_id(id) {
            dataset.monthly_amount = dataset.normalized_monthly_amount();
            matched += 1;
        }
        if matched > 0 {
            self.emit(StoreEvent::DatasetChanged {
                id,
                field: DatasetField::MonthlyAmount,
            });
        }
        matched
    }

    // --- Pending updates ---

    /// Applies the pending update of one dataset.
    ///
    /// Returns `Ok(None)` when the dataset is unknown, has nothing pending, or
    /// sits in an inactive group. An update whose result would not be finite is
    /// rejected and stays staged.
    pub fn apply_pending_update(&mut self, id: i64, on: NaiveDate) -> Result<Option<AppliedUpdate>> {
        let Some((group_index, position)) = self.locate_dataset(id) else {
            return Ok(None);
        };
        let group = &mut self.datagroups[group_index];
        if !group.active {
            debug!("apply_pending_update: dataset {} is in inactive datagroup {:?}", id, group.id);
            return Ok(None);
        }
        let Some(applied) = apply_pending(&mut group.datasets[position], on)? else {
            return Ok(None);
        };
        self.emit(StoreEvent::UpdateApplied {
            id,
            update_type: applied.update_type,
            amount: applied.amount,
        });
        Ok(Some(applied))
    }

    /// Applies every pending update of recurring datasets in active groups.
    ///
    /// Updates whose result would not be finite are logged and stay staged.
    pub fn apply_pending_updates(&mut self, on: NaiveDate) -> UpdateRunResult {
        let mut applied = Vec::new();
        for group in self.datagroups.iter_mut().filter(|group| group.active) {
            for dataset in group
                .datasets
                .iter_mut()
                .filter(|dataset| dataset.supports_updates())
            {
                match apply_pending(dataset, on) {
                    Ok(Some(update)) => applied.push(update),
                    Ok(None) => {}
                    Err(e) => warn!("Skipped pending update of dataset {:?}: {}", dataset.id, e),
                }
            }
        }

        for update in &applied {
            self.emit(StoreEvent::UpdateApplied {
                id: update.dataset_id,
                update_type: update.update_type,
                amount: update.amount,
            });
        }

        let added_count = applied
            .iter()
            .filter(|update| update.update_type == UpdateType::Add)
            .count();
        let replaced_count = applied.len() - added_count;
        info!("Applied {} pending update(s)", applied.len());

        UpdateRunResult {
            applied,
            added_count,
            replaced_count,
            update_date: on,
        }
    }

    // --- Internals ---

    fn emit(&self, event: StoreEvent) {
        // No subscribers is not an error
        let _ = self.events.send(event);
    }

    fn group_index(&self, id: i64) -> Option<usize> {
        self.datagroups.iter().position(|group| group.id == Some(id))
    }

    fn locate_dataset(&self, id: i64) -> Option<(usize, usize)> {
        self.datagroups
            .iter()
            .enumerate()
            .find_map(|(group_index, group)| {
                group
                    .datasets
                    .iter()
                    .position(|dataset| dataset.id == Some(id))
                    .map(|position| (group_index, position))
            })
    }

    fn datasets_with_id(&mut self, id: i64) -> impl Iterator<Item = &mut Dataset> {
        self.datagroups
            .iter_mut()
            .flat_map(|group| group.datasets.iter_mut())
            .filter(move |dataset| dataset.id == Some(id))
    }

    /// Checks that `group`'s datasets may live under `group_id`.
    ///
    /// The group at `replacing` (if any) is ignored when looking for id collisions.
    fn validate_members(&self, group: &Datagroup, group_id: i64, replacing: Option<usize>) -> Result<()> {
        let mut seen = HashSet::new();
        for dataset in &group.datasets {
            let Some(id) = dataset.id else {
                return Err(Error::Validation {
                    message: format!("dataset {:?} in datagroup {group_id} has no id", dataset.title),
                });
            };
            if dataset.group_id != group_id {
                return Err(Error::Validation {
                    message: format!(
                        "dataset {id} names datagroup {} but is stored in datagroup {group_id}",
                        dataset.group_id
                    ),
                });
            }
            let owned_elsewhere = self
                .datagroups
                .iter()
                .enumerate()
                .filter(|(index, _)| Some(*index) != replacing)
                .any(|(_, other)| other.datasets.iter().any(|d| d.id == Some(id)));
            if !seen.insert(id) || owned_elsewhere {
                return Err(Error::DuplicateDatasetId { id });
            }
            dataset.validate_amounts()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        models::{Interval, RECURRING_PAYMENT_TYPE},
        test_utils::{init_test_tracing, populated_store, test_datagroup, test_dataset, test_date},
    };

    fn ids(datasets: &[Dataset]) -> Vec<i64> {
        datasets.iter().filter_map(|d| d.id).collect()
    }

    #[test]
    fn test_empty_store_queries() {
        let store = Store::new();
        assert!(store.all_datasets().is_empty());
        assert_eq!(store.next_datagroup_id(), 1);
        assert_eq!(store.next_dataset_id(), 1);
        for field in AmountField::ALL {
            assert_eq!(store.total(field), 0.0);
        }
    }

    #[test]
    fn test_all_datasets_preserves_group_then_insertion_order() {
        let store = populated_store();
        let flattened: Vec<i64> = store.all_datasets().iter().filter_map(|d| d.id).collect();
        assert_eq!(flattened, vec![1, 2, 3]);

        let per_group: usize = store.datagroups().iter().map(|g| g.datasets.len()).sum();
        assert_eq!(store.all_datasets().len(), per_group);
        assert_eq!(store.dataset_count(), per_group);
    }

    #[test]
    fn test_next_ids_follow_maximum() {
        let mut store = Store::new();
        store.add_datagroup(test_datagroup(2, "Home")).unwrap();
        store.add_datagroup(test_datagroup(5, "Car")).unwrap();
        assert_eq!(store.next_datagroup_id(), 6);

        store.add_dataset(test_dataset(2, 2, 0.0, 0.0)).unwrap();
        store.add_dataset(test_dataset(5, 5, 0.0, 0.0)).unwrap();
        assert_eq!(store.next_dataset_id(), 6);
    }

    #[test]
    fn test_next_dataset_id_tracks_live_maximum() {
        let mut store = populated_store();
        let first = store.dataset(1).unwrap().clone();
        let last = store.dataset(3).unwrap().clone();
        store.delete_dataset(&first);
        assert_eq!(store.next_dataset_id(), 4);
        store.delete_dataset(&last);
        assert_eq!(store.next_dataset_id(), 3);
        assert!(store.dataset(2).is_some());
    }

    #[test]
    fn test_add_datagroup_allocates_id_when_unset() {
        let mut store = Store::new();
        let first = store.add_datagroup(Datagroup::new("Home")).unwrap();
        let second = store.add_datagroup(Datagroup::new("Car")).unwrap();
        assert_eq!((first, second), (1, 2));
        assert!(store.datagroup(2).unwrap().datasets.is_empty());
        assert!(store.datagroup(2).unwrap().active);
    }

    #[test]
    fn test_add_datagroup_rejects_duplicate_id() {
        init_test_tracing();
        let mut store = populated_store();
        let result = store.add_datagroup(test_datagroup(1, "Again"));
        assert!(matches!(result, Err(Error::DuplicateDatagroupId { id: 1 })));
        assert_eq!(store.datagroups().len(), 2);
    }

    #[test]
    fn test_add_datagroup_rejects_foreign_members() {
        let mut store = populated_store();
        let mut group = test_datagroup(9, "Imported");
        group.datasets.push(test_dataset(1, 9, 0.0, 0.0));
        assert!(matches!(
            store.add_datagroup(group),
            Err(Error::DuplicateDatasetId { id: 1 })
        ));

        let mut group = test_datagroup(9, "Imported");
        group.datasets.push(test_dataset(40, 3, 0.0, 0.0));
        assert!(matches!(
            store.add_datagroup(group),
            Err(Error::Validation { .. })
        ));
    }

    #[test]
    fn test_add_dataset_appends_to_owning_group() {
        let mut store = populated_store();
        let mut dataset = Dataset::new("Gym", 1, Interval::Monthly, RECURRING_PAYMENT_TYPE);
        dataset.actual_amount = 30.0;
        dataset.debit_amount = 25.0;

        let id = store.add_dataset(dataset).unwrap();
        assert_eq!(id, Some(4));

        let group = store.datagroup(1).unwrap();
        assert_eq!(ids(&group.datasets), vec![1, 2, 4]);
        assert_eq!(store.dataset(4).unwrap().diff_amount, 5.0);
        assert!(store.datagroup(2).unwrap().datasets.iter().all(|d| d.id != Some(4)));
    }

    #[test]
    fn test_add_dataset_missing_group_is_noop() {
        let mut store = populated_store();
        let before = store.to_snapshot();
        assert_eq!(store.add_dataset(test_dataset(10, 99, 0.0, 0.0)).unwrap(), None);
        assert_eq!(store.to_snapshot(), before);

        assert!(matches!(
            store.add_dataset_checked(test_dataset(10, 99, 0.0, 0.0)),
            Err(Error::DatagroupNotFound { id: 99 })
        ));
    }

    #[test]
    fn test_add_dataset_rejects_duplicate_and_nan() {
        let mut store = populated_store();
        assert!(matches!(
            store.add_dataset(test_dataset(2, 2, 0.0, 0.0)),
            Err(Error::DuplicateDatasetId { id: 2 })
        ));

        let mut dataset = test_dataset(11, 1, 0.0, 0.0);
        dataset.update_amount = Some(f64::NAN);
        assert!(matches!(
            store.add_dataset(dataset),
            Err(Error::InvalidAmount { .. })
        ));
        assert_eq!(store.dataset_count(), 3);
    }

    #[test]
    fn test_delete_dataset() {
        let mut store = populated_store();
        let target = store.dataset(2).unwrap().clone();

        let removed = store.delete_dataset(&target).unwrap();
        assert_eq!(removed.id, Some(2));
        assert!(store.dataset(2).is_none());
        assert_eq!(ids(&store.datagroup(1).unwrap().datasets), vec![1]);
    }

    #[test]
    fn test_delete_missing_dataset_is_noop() {
        let mut store = populated_store();
        let before = store.to_snapshot();

        assert!(store.delete_dataset(&test_dataset(77, 1, 0.0, 0.0)).is_none());
        // right id, wrong group
        assert!(store.delete_dataset(&test_dataset(3, 1, 0.0, 0.0)).is_none());
        assert_eq!(store.to_snapshot(), before);

        assert!(matches!(
            store.delete_dataset_checked(&test_dataset(77, 1, 0.0, 0.0)),
            Err(Error::DatasetNotFound { id: 77 })
        ));
    }

    #[test]
    fn test_delete_datagroup_rejects_non_empty() {
        let mut store = populated_store();
        assert!(matches!(
            store.delete_datagroup(1),
            Err(Error::DatagroupNotEmpty { id: 1, datasets: 2 })
        ));
        assert!(store.datagroup(1).is_some());
    }

    #[test]
    fn test_delete_datagroup_empty_and_missing() {
        let mut store = populated_store();
        store.add_datagroup(test_datagroup(3, "Empty")).unwrap();

        assert_eq!(store.delete_datagroup(3).unwrap().unwrap().title, "Empty");
        assert!(store.delete_datagroup(3).unwrap().is_none());
        assert!(matches!(
            store.delete_datagroup_checked(3),
            Err(Error::DatagroupNotFound { id: 3 })
        ));
    }

    #[test]
    fn test_delete_datagroup_cascade_removes_datasets() {
        let mut store = populated_store();
        let removed = store.delete_datagroup_cascade(1).unwrap();
        assert_eq!(removed.datasets.len(), 2);
        assert!(store.dataset(1).is_none());
        assert!(store.dataset(2).is_none());
        assert_eq!(store.all_datasets().len(), 1);
        assert!(store.delete_datagroup_cascade(1).is_none());
    }

    #[test]
    fn test_replace_datagroup_keeps_position() {
        let mut store = populated_store();
        let mut group = store.datagroup(1).unwrap().clone();
        group.title = "Renamed".to_string();

        assert!(store.replace_datagroup(group).unwrap());
        assert_eq!(store.datagroups()[0].title, "Renamed");
        assert_eq!(store.datagroups()[1].id, Some(2));

        assert!(!store.replace_datagroup(test_datagroup(50, "Ghost")).unwrap());
        assert!(matches!(
            store.replace_datagroup_checked(test_datagroup(50, "Ghost")),
            Err(Error::DatagroupNotFound { id: 50 })
        ));
    }

    #[test]
    fn test_replace_datagroup_rejects_stolen_dataset() {
        let mut store = populated_store();
        let mut group = store.datagroup(1).unwrap().clone();
        group.datasets.push(test_dataset(3, 1, 0.0, 0.0));

        assert!(matches!(
            store.replace_datagroup(group),
            Err(Error::DuplicateDatasetId { id: 3 })
        ));
        assert_eq!(store.datagroup(1).unwrap().datasets.len(), 2);
    }

    #[test]
    fn test_replace_dataset_same_group_keeps_position() {
        let mut store = populated_store();
        let mut dataset = store.dataset(1).unwrap().clone();
        dataset.title = "Updated".to_string();
        dataset.actual_amount = 500.0;

        assert!(store.replace_dataset(dataset).unwrap());
        let group = store.datagroup(1).unwrap();
        assert_eq!(ids(&group.datasets), vec![1, 2]);
        assert_eq!(group.datasets[0].title, "Updated");
        assert_eq!(group.datasets[0].diff_amount, 500.0 - group.datasets[0].debit_amount);
    }

    #[test]
    fn test_replace_dataset_moves_to_front_of_new_group() {
        let mut store = populated_store();
        let mut dataset = store.dataset(2).unwrap().clone();
        dataset.group_id = 2;

        assert!(store.replace_dataset(dataset).unwrap());
        assert_eq!(ids(&store.datagroup(1).unwrap().datasets), vec![1]);
        assert_eq!(ids(&store.datagroup(2).unwrap().datasets), vec![2, 3]);
        assert_eq!(store.dataset(2).unwrap().group_id, 2);
    }

    #[test]
    fn test_replace_dataset_into_missing_group_is_rejected() {
        let mut store = populated_store();
        let before = store.to_snapshot();
        let mut dataset = store.dataset(2).unwrap().clone();
        dataset.group_id = 42;

        assert!(matches!(
            store.replace_dataset(dataset),
            Err(Error::DatagroupNotFound { id: 42 })
        ));
        assert_eq!(store.to_snapshot(), before);
    }

    #[test]
    fn test_replace_missing_dataset_is_noop() {
        let mut store = populated_store();
        assert!(!store.replace_dataset(test_dataset(99, 1, 0.0, 0.0)).unwrap());
        assert!(matches!(
            store.replace_dataset_checked(test_dataset(99, 1, 0.0, 0.0)),
            Err(Error::DatasetNotFound { id: 99 })
        ));
    }

    #[test]
    fn test_inactive_groups_do_not_count() {
        let mut store = populated_store();
        let all_active = store.totals();
        let group_two_actual = store.datagroup(2).unwrap().total(AmountField::Actual);

        assert!(store.deactivate_datagroup(2));
        assert_eq!(
            store.total_actual_amount(),
            all_active.actual_amount - group_two_actual
        );

        assert!(store.deactivate_datagroup(1));
        for field in AmountField::ALL {
            assert_eq!(store.total(field), 0.0);
        }

        store.activate_datagroup(1);
        store.activate_datagroup(2);
        assert_eq!(store.totals(), all_active);
    }

    #[test]
    fn test_activation_on_missing_group() {
        let mut store = populated_store();
        assert!(!store.activate_datagroup(9));
        assert!(!store.deactivate_datagroup(9));
        assert!(matches!(
            store.deactivate_datagroup_checked(9),
            Err(Error::DatagroupNotFound { id: 9 })
        ));
        assert!(store.activate_datagroup_checked(1).is_ok());
    }

    #[test]
    fn test_named_totals_match_fields() {
        let mut store = populated_store();
        store.set_update_amount(1, Some(20.0)).unwrap();
        let totals = store.totals();
        assert_eq!(store.total_invoice_amount(), totals.invoice_amount);
        assert_eq!(store.total_monthly_amount(), totals.monthly_amount);
        assert_eq!(store.total_actual_amount(), totals.actual_amount);
        assert_eq!(store.total_debit_amount(), totals.debit_amount);
        assert_eq!(store.total_diff_amount(), totals.diff_amount);
        assert_eq!(store.total_update_amount(), 20.0);
    }

    #[test]
    fn test_amount_setters_keep_diff_in_sync() {
        let mut store = populated_store();
        store.set_actual_amount(1, Some(100.0)).unwrap();
        store.set_debit_amount(1, Some(120.0)).unwrap();
        assert_eq!(store.dataset(1).unwrap().diff_amount, -20.0);

        store.add_actual_amount(1, Some(50.0)).unwrap();
        assert_eq!(store.dataset(1).unwrap().actual_amount, 150.0);
        assert_eq!(store.dataset(1).unwrap().diff_amount, 30.0);

        store.add_actual_amount(1, None).unwrap();
        assert_eq!(store.dataset(1).unwrap().actual_amount, 150.0);
    }

    #[test]
    fn test_numeric_setters_coerce_none_to_zero() {
        let mut store = populated_store();
        store.set_actual_amount(1, None).unwrap();
        store.set_debit_amount(1, None).unwrap();
        store.set_monthly_amount(1, None).unwrap();
        let dataset = store.dataset(1).unwrap();
        assert_eq!(dataset.actual_amount, 0.0);
        assert_eq!(dataset.debit_amount, 0.0);
        assert_eq!(dataset.monthly_amount, 0.0);
        assert_eq!(dataset.diff_amount, 0.0);
    }

    #[test]
    fn test_update_amount_keeps_none_distinct_from_zero() {
        let mut store = populated_store();
        store.set_update_amount(1, Some(0.0)).unwrap();
        assert_eq!(store.dataset(1).unwrap().update_amount, Some(0.0));
        store.set_update_amount(1, None).unwrap();
        assert_eq!(store.dataset(1).unwrap().update_amount, None);

        assert!(matches!(
            store.set_update_amount(1, Some(f64::NAN)),
            Err(Error::InvalidAmount { field: "update_amount", .. })
        ));
        assert_eq!(store.dataset(1).unwrap().update_amount, None);
    }

    #[test]
    fn test_date_and_type_setters() {
        let mut store = populated_store();
        let date = test_date();
        store.set_invoice_date(2, Some(date)).unwrap();
        store.set_last_invoice_date(2, Some(date)).unwrap();
        store.set_last_update_date(2, Some(date)).unwrap();
        store.set_update_type(2, UpdateType::Replace).unwrap();
        store.set_diff_amount(2, Some(7.0)).unwrap();

        let dataset = store.dataset(2).unwrap();
        assert_eq!(dataset.invoice_date, Some(date));
        assert_eq!(dataset.last_invoice_date, Some(date));
        assert_eq!(dataset.last_update_date, Some(date));
        assert_eq!(dataset.update_type, UpdateType::Replace);
        assert_eq!(dataset.diff_amount, 7.0);

        store.set_invoice_date(2, None).unwrap();
        assert_eq!(store.dataset(2).unwrap().invoice_date, None);
    }

    #[test]
    fn test_setters_on_missing_dataset() {
        let mut store = populated_store();
        let before = store.to_snapshot();
        store.set_actual_amount(404, Some(1.0)).unwrap();
        assert_eq!(store.change_dataset(404, DatasetChange::DebitAmount(Some(2.0))).unwrap(), 0);
        assert_eq!(store.to_snapshot(), before);

        assert!(matches!(
            store.change_dataset_checked(404, DatasetChange::DebitAmount(Some(2.0))),
            Err(Error::DatasetNotFound { id: 404 })
        ));
    }

    #[test]
    fn test_toggle_update_type_changes_no_amounts() {
        let mut store = populated_store();
        store.set_update_amount(1, Some(25.0)).unwrap();
        let before = store.dataset(1).unwrap().clone();

        assert_eq!(store.toggle_update_type(1), 1);
        let after = store.dataset(1).unwrap();
        assert_eq!(after.update_type, before.update_type.toggled());
        assert_eq!(after.actual_amount, before.actual_amount);
        assert_eq!(after.update_amount, before.update_amount);
        assert_eq!(store.toggle_update_type(404), 0);
    }

    #[test]
    fn test_refresh_monthly_amount() {
        let mut store = populated_store();
        let mut dataset = store.dataset(3).unwrap().clone();
        dataset.interval = Interval::Yearly;
        dataset.invoice_amount = 1500.0;
        store.replace_dataset(dataset).unwrap();

        assert_eq!(store.refresh_monthly_amount(3), 1);
        assert_eq!(store.dataset(3).unwrap().monthly_amount, 125.0);
    }

    #[test]
    fn test_apply_pending_update_add_then_replace() {
        let mut store = populated_store();
        store.set_actual_amount(1, Some(100.0)).unwrap();
        store.set_debit_amount(1, Some(120.0)).unwrap();
        store.set_update_amount(1, Some(50.0)).unwrap();
        store.set_update_type(1, UpdateType::Add).unwrap();

        let applied = store.apply_pending_update(1, test_date()).unwrap().unwrap();
        assert_eq!(applied.new_actual, 150.0);
        let dataset = store.dataset(1).unwrap();
        assert_eq!(dataset.actual_amount, 150.0);
        assert_eq!(dataset.diff_amount, 30.0);
        assert_eq!(dataset.update_amount, None);

        store.set_update_amount(1, Some(75.0)).unwrap();
        store.set_update_type(1, UpdateType::Replace).unwrap();
        store.apply_pending_update(1, test_date()).unwrap().unwrap();
        assert_eq!(store.dataset(1).unwrap().actual_amount, 75.0);
        assert!(store.apply_pending_update(1, test_date()).unwrap().is_none());
    }

    #[test]
    fn test_apply_pending_update_skips_inactive_group() {
        let mut store = populated_store();
        store.set_update_amount(3, Some(10.0)).unwrap();
        store.deactivate_datagroup(2);

        assert!(store.apply_pending_update(3, test_date()).unwrap().is_none());
        assert_eq!(store.dataset(3).unwrap().update_amount, Some(10.0));
    }

    #[test]
    fn test_fill_update_amount_stages_monthly_rate() {
        let mut store = populated_store();
        let mut events = store.subscribe();
        let before = store.dataset(1).unwrap().clone();

        assert_eq!(store.fill_update_amount(1), 1);
        assert_eq!(store.dataset(1).unwrap().update_amount, Some(before.monthly_amount));
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::DatasetChanged {
                id: 1,
                field: DatasetField::UpdateAmount
            }
        );

        store.apply_pending_update(1, test_date()).unwrap().unwrap();
        let after = store.dataset(1).unwrap();
        assert_eq!(after.actual_amount, before.actual_amount + before.monthly_amount);
        assert_eq!(after.diff_amount, after.actual_amount - after.debit_amount);
        assert_eq!(after.update_amount, None);

        assert_eq!(store.fill_update_amount(404), 0);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_overflowing_changes_are_rejected() {
        let mut store = populated_store();
        store.set_actual_amount(1, Some(f64::MAX)).unwrap();
        let before = store.dataset(1).unwrap().clone();

        let result = store.add_actual_amount(1, Some(f64::MAX));
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));
        let result = store.set_debit_amount(1, Some(-f64::MAX));
        assert!(matches!(
            result,
            Err(Error::InvalidAmount {
                field: "diff_amount",
                ..
            })
        ));
        assert_eq!(store.dataset(1).unwrap(), &before);
    }

    #[test]
    fn test_overflowing_pending_update_stays_staged() {
        let mut store = populated_store();
        store.set_actual_amount(1, Some(f64::MAX)).unwrap();
        store.set_update_amount(1, Some(f64::MAX)).unwrap();
        store.set_update_amount(2, Some(5.0)).unwrap();

        let result = store.apply_pending_update(1, test_date());
        assert!(matches!(result, Err(Error::InvalidAmount { .. })));

        let run = store.apply_pending_updates(test_date());
        assert_eq!(run.applied.len(), 1);
        assert_eq!(run.applied[0].dataset_id, 2);
        let dataset = store.dataset(1).unwrap();
        assert_eq!(dataset.actual_amount, f64::MAX);
        assert_eq!(dataset.update_amount, Some(f64::MAX));
    }

    #[test]
    fn test_apply_pending_updates_run() {
        let mut store = populated_store();
        store.set_update_amount(1, Some(10.0)).unwrap();
        store.set_update_amount(2, Some(99.0)).unwrap();
        store.set_update_type(2, UpdateType::Replace).unwrap();
        store.set_update_amount(3, Some(5.0)).unwrap();
        store.deactivate_datagroup(2);

        let result = store.apply_pending_updates(test_date());
        assert_eq!(result.applied.len(), 2);
        assert_eq!(result.added_count, 1);
        assert_eq!(result.replaced_count, 1);
        assert_eq!(store.dataset(2).unwrap().actual_amount, 99.0);
        assert_eq!(store.dataset(3).unwrap().update_amount, Some(5.0));
        assert_eq!(store.total_update_amount(), 0.0);
    }

    #[test]
    fn test_apply_pending_updates_skips_non_recurring_types() {
        let mut store = populated_store();
        let mut dataset = store.dataset(1).unwrap().clone();
        dataset.payment_type = 2;
        dataset.update_amount = Some(10.0);
        store.replace_dataset(dataset).unwrap();

        let result = store.apply_pending_updates(test_date());
        assert!(result.applied.is_empty());
        assert_eq!(store.dataset(1).unwrap().update_amount, Some(10.0));
    }

    #[test]
    fn test_subscribers_see_mutations_in_order() {
        let mut store = Store::new();
        let mut events = store.subscribe();

        let group = store.add_datagroup(Datagroup::new("Home")).unwrap();
        let dataset = store
            .add_dataset(test_dataset(1, group, 10.0, 5.0))
            .unwrap()
            .unwrap();
        store.set_update_amount(dataset, Some(3.0)).unwrap();
        store.deactivate_datagroup(group);
        store.set_actual_amount(404, Some(1.0)).unwrap();

        assert_eq!(events.try_recv().unwrap(), StoreEvent::DatagroupAdded { id: 1 });
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::DatasetAdded { id: 1, group_id: 1 }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::DatasetChanged {
                id: 1,
                field: DatasetField::UpdateAmount
            }
        );
        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::DatagroupDeactivated { id: 1 }
        );
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_move_emits_moved_event() {
        let mut store = populated_store();
        let mut events = store.subscribe();
        let mut dataset = store.dataset(1).unwrap().clone();
        dataset.group_id = 2;
        store.replace_dataset(dataset).unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::DatasetMoved {
                id: 1,
                from_group: 1,
                to_group: 2
            }
        );
    }

    #[test]
    fn test_document_round_trip_reproduces_store() {
        let mut store = populated_store();
        store.set_update_amount(2, Some(4.5)).unwrap();
        store.set_invoice_date(3, Some(test_date())).unwrap();
        store.deactivate_datagroup(2);

        let json = serde_json::to_string(&store.to_snapshot()).unwrap();
        let decoded: Vec<Datagroup> = serde_json::from_str(&json).unwrap();
        let rebuilt = Store::from_datagroups(decoded).unwrap();

        assert_eq!(rebuilt.datagroups(), store.datagroups());
        assert_eq!(rebuilt.totals(), store.totals());
    }

    #[test]
    fn test_from_datagroups_validates() {
        let snapshot = populated_store().into_datagroups();
        let rebuilt = Store::from_datagroups(snapshot.clone()).unwrap();
        assert_eq!(rebuilt.datagroups(), snapshot.as_slice());

        let mut duplicated = snapshot.clone();
        duplicated.push(snapshot[0].clone());
        assert!(matches!(
            Store::from_datagroups(duplicated),
            Err(Error::DuplicateDatagroupId { id: 1 })
        ));

        let mut unnamed = snapshot;
        unnamed[1].id = None;
        assert!(matches!(
            Store::from_datagroups(unnamed),
            Err(Error::Validation { .. })
        ));
    }
}
