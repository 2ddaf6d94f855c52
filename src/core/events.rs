//! Change notifications emitted by the store after every successful mutation.
//!
//! Observers call [`Store::subscribe`](crate::core::store::Store::subscribe) and
//! drain the receiver; events are delivered in mutation order and a mutation's
//! effects are already visible to queries by the time its event is sent.

use crate::models::UpdateType;

/// Default number of undelivered events kept per subscriber before it lags.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Dataset field touched by a single-field setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetField {
    /// Actual amount (diff recomputed)
    ActualAmount,
    /// Debit amount (diff recomputed)
    DebitAmount,
    /// Diff amount override
    DiffAmount,
    /// Monthly amount
    MonthlyAmount,
    /// Invoice date
    InvoiceDate,
    /// Last invoice date
    LastInvoiceDate,
    /// Last update date
    LastUpdateDate,
    /// Pending update amount
    UpdateAmount,
    /// Update mode
    UpdateType,
}

/// One observable state transition.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// A group was appended
    DatagroupAdded {
        /// Group id
        id: i64,
    },
    /// A group was removed together with `datasets` owned datasets
    DatagroupRemoved {
        /// Group id
        id: i64,
        /// Number of datasets removed with it
        datasets: usize,
    },
    /// A group was swapped in place
    DatagroupReplaced {
        /// Group id
        id: i64,
    },
    /// A group now counts towards totals
    DatagroupActivated {
        /// Group id
        id: i64,
    },
    /// A group no longer counts towards totals; views collapse it
    DatagroupDeactivated {
        /// Group id
        id: i64,
    },
    /// A dataset was appended to its group
    DatasetAdded {
        /// Dataset id
        id: i64,
        /// Owning group
        group_id: i64,
    },
    /// A dataset was removed from its group
    DatasetRemoved {
        /// Dataset id
        id: i64,
        /// Former owning group
        group_id: i64,
    },
    /// A dataset was replaced at the same position
    DatasetReplaced {
        /// Dataset id
        id: i64,
        /// Owning group
        group_id: i64,
    },
    /// A dataset moved to the front of another group
    DatasetMoved {
        /// Dataset id
        id: i64,
        /// Previous owner
        from_group: i64,
        /// New owner
        to_group: i64,
    },
    /// A single field of a dataset changed
    DatasetChanged {
        /// Dataset id
        id: i64,
        /// Field that changed
        field: DatasetField,
    },
    /// A pending update was folded into the actual amount
    UpdateApplied {
        /// Dataset id
        id: i64,
        /// Mode used
        update_type: UpdateType,
        /// Amount applied
        amount: f64,
    },
}
