//! The module contains the `Truck` struct and its storage model.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

/// A delivery truck. Loads, daily sales and end-of-day reconciliations are
/// all attributed to one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Truck {
    pub id: Uuid,
    pub plate: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Truck {
    pub fn new(plate: String, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            plate,
            name,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "trucks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub plate: String,
    pub name: String,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoices::Entity")]
    Invoices,
    #[sea_orm(has_many = "super::truck_loads::Entity")]
    TruckLoads,
    #[sea_orm(has_many = "super::reconciliations::Entity")]
    Reconciliations,
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::truck_loads::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TruckLoads.def()
    }
}

impl Related<super::reconciliations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reconciliations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Truck> for ActiveModel {
    fn from(truck: &Truck) -> Self {
        Self {
            id: ActiveValue::Set(truck.id.to_string()),
            plate: ActiveValue::Set(truck.plate.clone()),
            name: ActiveValue::Set(truck.name.clone()),
            created_at: ActiveValue::Set(truck.created_at),
        }
    }
}

impl TryFrom<Model> for Truck {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "truck")?,
            plate: model.plate,
            name: model.name,
            created_at: model.created_at,
        })
    }
}
