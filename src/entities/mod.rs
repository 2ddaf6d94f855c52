//! Entity module - Contains all SeaORM entity definitions for the persisted store.
//! These entities are the marshaled form of the in-memory datagroup collection.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod datagroup;
pub mod dataset;
pub mod system_state;

// Re-export specific types to avoid conflicts
pub use datagroup::{Column as DatagroupColumn, Entity as Datagroup, Model as DatagroupModel};
pub use dataset::{Column as DatasetColumn, Entity as Dataset, Model as DatasetModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
