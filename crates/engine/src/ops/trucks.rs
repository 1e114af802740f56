use chrono::NaiveDate;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, Statement, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, Truck, TruckLoad, TruckLoadStatus, truck_loads, trucks,
};

use super::{Engine, normalize_optional_text, normalize_required_text, with_tx};

impl Engine {
    /// Register a new truck. Plates are unique.
    pub async fn new_truck(&self, plate: &str, name: &str) -> ResultEngine<Truck> {
        let plate = normalize_required_text(plate, "truck plate")?;
        let name = normalize_required_text(name, "truck name")?;

        let existing = trucks::Entity::find()
            .filter(trucks::Column::Plate.eq(plate.clone()))
            .one(&self.database)
            .await?;
        if existing.is_some() {
            return Err(EngineError::AlreadyExists(format!(
                "truck with plate {plate}"
            )));
        }

        let truck = Truck::new(plate, name);
        trucks::ActiveModel::from(&truck)
            .insert(&self.database)
            .await?;
        Ok(truck)
    }

    pub(crate) async fn require_truck<C: ConnectionTrait>(
        &self,
        conn: &C,
        truck_id: Uuid,
    ) -> ResultEngine<trucks::Model> {
        trucks::Entity::find_by_id(truck_id.to_string())
            .one(conn)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("truck {truck_id}")))
    }

    /// Record a load placed on a truck for a day of sales.
    pub async fn new_truck_load(
        &self,
        truck_id: Uuid,
        load_date: NaiveDate,
        total_weight: f64,
        cage_count: i32,
        notes: Option<&str>,
    ) -> ResultEngine<TruckLoad> {
        if total_weight < 0.0 {
            return Err(EngineError::InvalidArgument(
                "load weight must be >= 0".to_string(),
            ));
        }
        if cage_count < 0 {
            return Err(EngineError::InvalidArgument(
                "cage count must be >= 0".to_string(),
            ));
        }
        self.require_truck(&self.database, truck_id).await?;

        let load = TruckLoad::new(
            truck_id,
            load_date,
            total_weight,
            cage_count,
            normalize_optional_text(notes),
        );
        truck_loads::ActiveModel::from(&load)
            .insert(&self.database)
            .await?;
        Ok(load)
    }

    /// Advance a truck load along `loaded → in_transit → completed`.
    pub async fn advance_truck_load(&self, load_id: Uuid) -> ResultEngine<TruckLoadStatus> {
        with_tx!(self, |db_tx| {
            let model = truck_loads::Entity::find_by_id(load_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("truck load {load_id}")))?;
            let status = TruckLoadStatus::try_from(model.status.as_str())?;
            match status.next() {
                None => Err(EngineError::InvalidArgument(
                    "truck load already completed".to_string(),
                )),
                Some(next) => {
                    truck_loads::ActiveModel {
                        id: ActiveValue::Set(model.id.clone()),
                        status: ActiveValue::Set(next.as_str().to_string()),
                        ..Default::default()
                    }
                    .update(&db_tx)
                    .await?;
                    Ok(next)
                }
            }
        })
    }

    /// Total weight loaded onto a truck for a day.
    pub async fn loaded_weight(&self, truck_id: Uuid, date: NaiveDate) -> ResultEngine<f64> {
        self.require_truck(&self.database, truck_id).await?;
        self.sum_loaded_weight(&self.database, truck_id, date).await
    }

    /// Total net weight invoiced off a truck for a day.
    pub async fn sold_weight(&self, truck_id: Uuid, date: NaiveDate) -> ResultEngine<f64> {
        self.require_truck(&self.database, truck_id).await?;
        self.sum_sold_weight(&self.database, truck_id, date).await
    }

    pub(in crate::ops) async fn sum_loaded_weight<C: ConnectionTrait>(
        &self,
        conn: &C,
        truck_id: Uuid,
        date: NaiveDate,
    ) -> ResultEngine<f64> {
        Self::sum_weight(
            conn,
            "SELECT COALESCE(SUM(total_weight), 0.0) AS sum \
             FROM truck_loads \
             WHERE truck_id = ? AND load_date = ?",
            truck_id,
            date,
        )
        .await
    }

    pub(in crate::ops) async fn sum_sold_weight<C: ConnectionTrait>(
        &self,
        conn: &C,
        truck_id: Uuid,
        date: NaiveDate,
    ) -> ResultEngine<f64> {
        Self::sum_weight(
            conn,
            "SELECT COALESCE(SUM(net_weight), 0.0) AS sum \
             FROM invoices \
             WHERE truck_id = ? AND issued_on = ?",
            truck_id,
            date,
        )
        .await
    }

    async fn sum_weight<C: ConnectionTrait>(
        conn: &C,
        sql: &str,
        truck_id: Uuid,
        date: NaiveDate,
    ) -> ResultEngine<f64> {
        let stmt = Statement::from_sql_and_values(
            conn.get_database_backend(),
            sql,
            vec![truck_id.to_string().into(), date.into()],
        );
        let row = conn.query_one(stmt).await?;
        Ok(row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0.0))
    }
}
