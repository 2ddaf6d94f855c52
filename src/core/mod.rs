//! Core business logic - the in-memory store, its aggregates and the update policy.
//!
//! Nothing here knows about persistence; [`snapshot`] depends on the store, never
//! the other way round.

/// Change notifications for observers
pub mod events;
/// Marshaling the collection to and from the database
pub mod snapshot;
/// The datagroup/dataset store
pub mod store;
/// Aggregate sums
pub mod totals;
/// Pending-update application policy
pub mod updates;

pub use events::{DatasetField, StoreEvent};
pub use store::{DatasetChange, Store};
pub use totals::Totals;
pub use updates::{AppliedUpdate, UpdateRunResult};
