//! The module contains the `TruckLoad` struct and its storage model.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

/// Lifecycle of a load: transitions are forward-only.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruckLoadStatus {
    Loaded,
    InTransit,
    Completed,
}

impl TruckLoadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Loaded => "loaded",
            Self::InTransit => "in_transit",
            Self::Completed => "completed",
        }
    }

    /// Next state in `loaded → in_transit → completed`, if any.
    pub(crate) fn next(self) -> Option<TruckLoadStatus> {
        match self {
            Self::Loaded => Some(Self::InTransit),
            Self::InTransit => Some(Self::Completed),
            Self::Completed => None,
        }
    }
}

impl TryFrom<&str> for TruckLoadStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "loaded" => Ok(Self::Loaded),
            "in_transit" => Ok(Self::InTransit),
            "completed" => Ok(Self::Completed),
            other => Err(EngineError::InvalidArgument(format!(
                "invalid truck load status: {other}"
            ))),
        }
    }
}

/// Product loaded onto a truck for a day of sales.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TruckLoad {
    pub id: Uuid,
    pub truck_id: Uuid,
    pub load_date: NaiveDate,
    pub total_weight: f64,
    pub cage_count: i32,
    pub status: TruckLoadStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TruckLoad {
    pub(crate) fn new(
        truck_id: Uuid,
        load_date: NaiveDate,
        total_weight: f64,
        cage_count: i32,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            truck_id,
            load_date,
            total_weight,
            cage_count,
            status: TruckLoadStatus::Loaded,
            notes,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "truck_loads")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub truck_id: String,
    pub load_date: Date,
    pub total_weight: f64,
    pub cage_count: i32,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::trucks::Entity",
        from = "Column::TruckId",
        to = "super::trucks::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Trucks,
}

impl Related<super::trucks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trucks.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&TruckLoad> for ActiveModel {
    fn from(load: &TruckLoad) -> Self {
        Self {
            id: ActiveValue::Set(load.id.to_string()),
            truck_id: ActiveValue::Set(load.truck_id.to_string()),
            load_date: ActiveValue::Set(load.load_date),
            total_weight: ActiveValue::Set(load.total_weight),
            cage_count: ActiveValue::Set(load.cage_count),
            status: ActiveValue::Set(load.status.as_str().to_string()),
            notes: ActiveValue::Set(load.notes.clone()),
            created_at: ActiveValue::Set(load.created_at),
        }
    }
}

impl TryFrom<Model> for TruckLoad {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "truck load")?,
            truck_id: parse_uuid(&model.truck_id, "truck")?,
            load_date: model.load_date,
            total_weight: model.total_weight,
            cage_count: model.cage_count,
            status: TruckLoadStatus::try_from(model.status.as_str())?,
            notes: model.notes,
            created_at: model.created_at,
        })
    }
}
