//! Datagroup entity - One row per datagroup of the persisted store.
//!
//! `position` records the display order so a reloaded store keeps it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Datagroup database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "datagroups")]
pub struct Model {
    /// Store-assigned identifier, never generated by the database
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    /// Display title
    pub title: String,
    /// Whether the group counts towards totals
    pub active: bool,
    /// Zero-based display position
    pub position: i32,
}

/// Defines relationships between Datagroup and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One datagroup owns many datasets
    #[sea_orm(has_many = "super::dataset::Entity")]
    Datasets,
}

impl Related<super::dataset::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Datasets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
