//! Dataset entity - One row per tracked obligation.
//!
//! Enumerations are stored as their text codes (`interval`, `update_type`);
//! `position` is the zero-based order inside the owning datagroup.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Dataset database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "datasets")]
pub struct Model {
    /// Store-assigned identifier, never generated by the database
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    /// Owning datagroup
    pub group_id: i64,
    /// Zero-based position inside the datagroup
    pub position: i32,
    /// Display title
    pub title: String,
    /// Interval code: `"month"`, `"quarter"`, `"halfyear"` or `"year"`
    pub interval: String,
    /// Payment type code
    pub payment_type: i32,
    /// Amount of one invoice
    pub invoice_amount: f64,
    /// Date of the next invoice
    pub invoice_date: Option<Date>,
    /// Date of the previous invoice
    pub last_invoice_date: Option<Date>,
    /// Date the last pending update was applied
    pub last_update_date: Option<Date>,
    /// Monthly rate
    pub monthly_amount: f64,
    /// Paid-to-date total
    pub actual_amount: f64,
    /// Expected total
    pub debit_amount: f64,
    /// Stored `actual - debit`
    pub diff_amount: f64,
    /// Pending update, NULL when none
    pub update_amount: Option<f64>,
    /// Update mode code: `"add"` or `"equals"`
    pub update_type: String,
}

/// Defines relationships between Dataset and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each dataset belongs to one datagroup
    #[sea_orm(
        belongs_to = "super::datagroup::Entity",
        from = "Column::GroupId",
        to = "super::datagroup::Column::Id"
    )]
    Datagroup,
}

impl Related<super::datagroup::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Datagroup.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
