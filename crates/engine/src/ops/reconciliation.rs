use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, QuerySelect, TransactionTrait,
    prelude::*,
};
use uuid::Uuid;

use crate::{
    DailyReconciliation, EngineError, ReconciliationStatus, ResultEngine,
    reconciliations::{self, WEIGHT_TOLERANCE, derive_wastage},
    util::append_note,
};

use super::{Engine, normalize_required_text, with_tx};

impl Engine {
    /// Create the closing reconciliation record for a truck-day.
    ///
    /// One record per truck per day: duplicates are rejected, never
    /// overwritten.
    pub async fn create_reconciliation(
        &self,
        truck_id: Uuid,
        date: NaiveDate,
        load_weight: f64,
        sold_weight: f64,
    ) -> ResultEngine<DailyReconciliation> {
        let record = DailyReconciliation::new(truck_id, date, load_weight, sold_weight)?;

        with_tx!(self, |db_tx| {
            self.require_truck(&db_tx, truck_id).await?;
            let existing = reconciliations::Entity::find()
                .filter(reconciliations::Column::TruckId.eq(truck_id.to_string()))
                .filter(reconciliations::Column::ReconDate.eq(date))
                .one(&db_tx)
                .await?;
            if existing.is_some() {
                Err(EngineError::AlreadyExists(format!(
                    "reconciliation for truck {truck_id} on {date}"
                )))
            } else {
                reconciliations::ActiveModel::from(&record)
                    .insert(&db_tx)
                    .await?;
                Ok(record)
            }
        })
    }

    /// Build the day's reconciliation from the recorded loads and invoices.
    pub async fn reconcile_truck_day(
        &self,
        truck_id: Uuid,
        date: NaiveDate,
    ) -> ResultEngine<DailyReconciliation> {
        let load_weight = self.sum_loaded_weight(&self.database, truck_id, date).await?;
        let sold_weight = self.sum_sold_weight(&self.database, truck_id, date).await?;
        self.create_reconciliation(truck_id, date, load_weight, sold_weight)
            .await
    }

    /// Re-derive the wastage fields from the stored weights.
    ///
    /// Used to repair a record after a manual correction to its raw weights;
    /// never re-fetches the weights from the source data. Returns whether
    /// anything changed.
    pub async fn recalculate_reconciliation(
        &self,
        reconciliation_id: Uuid,
    ) -> ResultEngine<bool> {
        with_tx!(self, |db_tx| {
            let model = self
                .require_reconciliation(&db_tx, reconciliation_id)
                .await?;
            let (wastage, percentage) = derive_wastage(model.load_weight, model.sold_weight)?;
            let changed = (wastage - model.wastage_weight).abs() > WEIGHT_TOLERANCE
                || (percentage - model.wastage_percentage).abs() > WEIGHT_TOLERANCE;
            if changed {
                reconciliations::ActiveModel {
                    id: ActiveValue::Set(model.id.clone()),
                    wastage_weight: ActiveValue::Set(wastage),
                    wastage_percentage: ActiveValue::Set(percentage),
                    updated_at: ActiveValue::Set(Utc::now()),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
            }
            Ok(changed)
        })
    }

    /// Check a record's stored weights and derived fields agree.
    pub async fn validate_reconciliation_integrity(
        &self,
        reconciliation_id: Uuid,
    ) -> ResultEngine<bool> {
        let model = self
            .require_reconciliation(&self.database, reconciliation_id)
            .await?;
        let record = DailyReconciliation::try_from(model)?;
        Ok(record.is_consistent())
    }

    /// Escalate a record to `under_investigation`, appending the reason to
    /// its notes.
    ///
    /// Manual escalation only: the anomaly scan reports candidates, it never
    /// flags them itself.
    pub async fn flag_for_investigation(
        &self,
        reconciliation_id: Uuid,
        reason: &str,
    ) -> ResultEngine<bool> {
        let reason = normalize_required_text(reason, "investigation reason")?;

        with_tx!(self, |db_tx| {
            let model = self
                .require_reconciliation(&db_tx, reconciliation_id)
                .await?;
            let notes = append_note(model.notes.as_deref(), &reason);
            reconciliations::ActiveModel {
                id: ActiveValue::Set(model.id.clone()),
                status: ActiveValue::Set(
                    ReconciliationStatus::UnderInvestigation.as_str().to_string(),
                ),
                notes: ActiveValue::Set(Some(notes)),
                updated_at: ActiveValue::Set(Utc::now()),
                ..Default::default()
            }
            .update(&db_tx)
            .await?;
            Ok(true)
        })
    }

    /// Close an investigation back to `completed`, appending the review note.
    pub async fn resolve_investigation(
        &self,
        reconciliation_id: Uuid,
        note: &str,
    ) -> ResultEngine<bool> {
        let note = normalize_required_text(note, "review note")?;

        with_tx!(self, |db_tx| {
            let model = self
                .require_reconciliation(&db_tx, reconciliation_id)
                .await?;
            let status = ReconciliationStatus::try_from(model.status.as_str())?;
            if status != ReconciliationStatus::UnderInvestigation {
                Err(EngineError::InvalidArgument(
                    "reconciliation is not under investigation".to_string(),
                ))
            } else {
                let notes = append_note(model.notes.as_deref(), &note);
                reconciliations::ActiveModel {
                    id: ActiveValue::Set(model.id.clone()),
                    status: ActiveValue::Set(ReconciliationStatus::Completed.as_str().to_string()),
                    notes: ActiveValue::Set(Some(notes)),
                    updated_at: ActiveValue::Set(Utc::now()),
                    ..Default::default()
                }
                .update(&db_tx)
                .await?;
                Ok(true)
            }
        })
    }

    /// Most recent reconciliations for a truck.
    pub async fn list_reconciliations_for_truck(
        &self,
        truck_id: Uuid,
        limit: u64,
    ) -> ResultEngine<Vec<DailyReconciliation>> {
        self.require_truck(&self.database, truck_id).await?;

        let models = reconciliations::Entity::find()
            .filter(reconciliations::Column::TruckId.eq(truck_id.to_string()))
            .order_by_desc(reconciliations::Column::ReconDate)
            .limit(limit)
            .all(&self.database)
            .await?;
        models
            .into_iter()
            .map(DailyReconciliation::try_from)
            .collect()
    }

    pub(in crate::ops) async fn require_reconciliation<C: ConnectionTrait>(
        &self,
        conn: &C,
        reconciliation_id: Uuid,
    ) -> ResultEngine<reconciliations::Model> {
        reconciliations::Entity::find_by_id(reconciliation_id.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("reconciliation {reconciliation_id}")))
    }
}
