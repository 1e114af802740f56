//! Daily reconciliation primitives.
//!
//! One record per truck per day captures what was loaded against what was
//! actually sold. The status machine is
//! `pending → completed → under_investigation → completed`; weight fields
//! are only ever recomputed through the explicit recalculate operation.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, util::parse_uuid};

/// Tolerance for comparing stored weights and percentages, which accumulate
/// float noise from summed doubles.
pub(crate) const WEIGHT_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Pending,
    Completed,
    UnderInvestigation,
}

impl ReconciliationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::UnderInvestigation => "under_investigation",
        }
    }
}

impl TryFrom<&str> for ReconciliationStatus {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "under_investigation" => Ok(Self::UnderInvestigation),
            other => Err(EngineError::InvalidArgument(format!(
                "invalid reconciliation status: {other}"
            ))),
        }
    }
}

/// Derive `(wastage_weight, wastage_percentage)` from raw weights.
///
/// Zero load yields 0% rather than dividing by zero.
pub(crate) fn derive_wastage(load_weight: f64, sold_weight: f64) -> ResultEngine<(f64, f64)> {
    if load_weight < 0.0 || sold_weight < 0.0 {
        return Err(EngineError::InvalidArgument(
            "weights must be >= 0".to_string(),
        ));
    }
    if sold_weight - load_weight > WEIGHT_TOLERANCE {
        return Err(EngineError::InvalidArgument(
            "sold weight exceeds load weight".to_string(),
        ));
    }

    let wastage = (load_weight - sold_weight).max(0.0);
    let percentage = if load_weight > 0.0 {
        wastage / load_weight * 100.0
    } else {
        0.0
    };
    Ok((wastage, percentage))
}

/// End-of-day closing record for one truck.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyReconciliation {
    pub id: Uuid,
    pub truck_id: Uuid,
    pub recon_date: NaiveDate,
    pub load_weight: f64,
    pub sold_weight: f64,
    pub wastage_weight: f64,
    pub wastage_percentage: f64,
    pub status: ReconciliationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyReconciliation {
    pub(crate) fn new(
        truck_id: Uuid,
        recon_date: NaiveDate,
        load_weight: f64,
        sold_weight: f64,
    ) -> ResultEngine<Self> {
        let (wastage_weight, wastage_percentage) = derive_wastage(load_weight, sold_weight)?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            truck_id,
            recon_date,
            load_weight,
            sold_weight,
            wastage_weight,
            wastage_percentage,
            status: ReconciliationStatus::Completed,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the stored weights and derived fields agree.
    ///
    /// A failing record should be treated as untrustworthy by downstream
    /// analytics until it is repaired and recalculated.
    pub fn is_consistent(&self) -> bool {
        if self.load_weight < 0.0 || self.sold_weight < 0.0 {
            return false;
        }
        if self.sold_weight - self.load_weight > WEIGHT_TOLERANCE {
            return false;
        }
        if (self.wastage_weight - (self.load_weight - self.sold_weight)).abs() > WEIGHT_TOLERANCE {
            return false;
        }
        let expected_percentage = if self.load_weight > 0.0 {
            self.wastage_weight / self.load_weight * 100.0
        } else {
            0.0
        };
        (self.wastage_percentage - expected_percentage).abs() <= WEIGHT_TOLERANCE
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "daily_reconciliations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub truck_id: String,
    pub recon_date: Date,
    pub load_weight: f64,
    pub sold_weight: f64,
    pub wastage_weight: f64,
    pub wastage_percentage: f64,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
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

impl From<&DailyReconciliation> for ActiveModel {
    fn from(record: &DailyReconciliation) -> Self {
        Self {
            id: ActiveValue::Set(record.id.to_string()),
            truck_id: ActiveValue::Set(record.truck_id.to_string()),
            recon_date: ActiveValue::Set(record.recon_date),
            load_weight: ActiveValue::Set(record.load_weight),
            sold_weight: ActiveValue::Set(record.sold_weight),
            wastage_weight: ActiveValue::Set(record.wastage_weight),
            wastage_percentage: ActiveValue::Set(record.wastage_percentage),
            status: ActiveValue::Set(record.status.as_str().to_string()),
            notes: ActiveValue::Set(record.notes.clone()),
            created_at: ActiveValue::Set(record.created_at),
            updated_at: ActiveValue::Set(record.updated_at),
        }
    }
}

impl TryFrom<Model> for DailyReconciliation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "reconciliation")?,
            truck_id: parse_uuid(&model.truck_id, "truck")?,
            recon_date: model.recon_date,
            load_weight: model.load_weight,
            sold_weight: model.sold_weight,
            wastage_weight: model.wastage_weight,
            wastage_percentage: model.wastage_percentage,
            status: ReconciliationStatus::try_from(model.status.as_str())?,
            notes: model.notes,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_wastage_arithmetic() {
        let (wastage, percentage) = derive_wastage(1000.0, 950.0).unwrap();
        assert_eq!(wastage, 50.0);
        assert_eq!(percentage, 5.0);
    }

    #[test]
    fn derive_wastage_zero_load() {
        let (wastage, percentage) = derive_wastage(0.0, 0.0).unwrap();
        assert_eq!(wastage, 0.0);
        assert_eq!(percentage, 0.0);
    }

    #[test]
    fn derive_wastage_rejects_sold_above_load() {
        assert!(matches!(
            derive_wastage(100.0, 150.0),
            Err(EngineError::InvalidArgument(_))
        ));
        assert!(matches!(
            derive_wastage(-1.0, 0.0),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn consistency_detects_tampered_fields() {
        let mut record =
            DailyReconciliation::new(Uuid::new_v4(), NaiveDate::from_ymd_opt(2026, 4, 2).unwrap(), 1000.0, 950.0)
                .unwrap();
        assert!(record.is_consistent());

        record.wastage_weight = 70.0;
        assert!(!record.is_consistent());
    }

    #[test]
    fn status_round_trips() {
        for status in [
            ReconciliationStatus::Pending,
            ReconciliationStatus::Completed,
            ReconciliationStatus::UnderInvestigation,
        ] {
            assert_eq!(
                ReconciliationStatus::try_from(status.as_str()).unwrap(),
                status
            );
        }
    }
}
