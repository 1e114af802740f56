//! Invoice primitives.
//!
//! An invoice is an append-only sale record. Its amounts are derived once,
//! when the draft is built, and are never recomputed on read.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine,
    util::{BALANCE_TOLERANCE, parse_uuid, round_currency},
};

/// Pre-validated invoice input for [`Engine::post_invoice`].
///
/// The draft owns the weight/price arithmetic so callers cannot hand the
/// engine inconsistent amounts; the engine checks the derived fields but
/// never recomputes them.
///
/// [`Engine::post_invoice`]: crate::Engine::post_invoice
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceDraft {
    pub number: String,
    pub customer_id: Uuid,
    pub truck_id: Uuid,
    pub issued_on: NaiveDate,
    pub gross_weight: f64,
    pub tare_weight: f64,
    pub net_weight: f64,
    pub unit_price: f64,
    pub discount_percentage: f64,
    pub total: f64,
    pub final_amount: f64,
}

impl InvoiceDraft {
    /// Build a draft, deriving net weight and amounts from the raw inputs.
    pub fn new(
        number: &str,
        customer_id: Uuid,
        truck_id: Uuid,
        issued_on: NaiveDate,
        gross_weight: f64,
        tare_weight: f64,
        unit_price: f64,
        discount_percentage: f64,
    ) -> ResultEngine<Self> {
        validate_inputs(
            number,
            gross_weight,
            tare_weight,
            unit_price,
            discount_percentage,
        )?;

        let net_weight = gross_weight - tare_weight;
        let total = round_currency(net_weight * unit_price);
        let final_amount = round_currency(total * (1.0 - discount_percentage / 100.0));

        Ok(Self {
            number: number.trim().to_string(),
            customer_id,
            truck_id,
            issued_on,
            gross_weight,
            tare_weight,
            net_weight,
            unit_price,
            discount_percentage,
            total,
            final_amount,
        })
    }

    /// Check the derived fields are consistent without recomputing them.
    pub(crate) fn validate(&self) -> ResultEngine<()> {
        validate_inputs(
            &self.number,
            self.gross_weight,
            self.tare_weight,
            self.unit_price,
            self.discount_percentage,
        )?;

        if (self.net_weight - (self.gross_weight - self.tare_weight)).abs() > BALANCE_TOLERANCE {
            return Err(EngineError::InvalidArgument(
                "net weight does not match gross minus tare".to_string(),
            ));
        }
        if (self.total - self.net_weight * self.unit_price).abs() > BALANCE_TOLERANCE {
            return Err(EngineError::InvalidArgument(
                "total does not match net weight times unit price".to_string(),
            ));
        }
        let expected_final = self.total * (1.0 - self.discount_percentage / 100.0);
        if (self.final_amount - expected_final).abs() > BALANCE_TOLERANCE {
            return Err(EngineError::InvalidArgument(
                "final amount does not match total minus discount".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_inputs(
    number: &str,
    gross_weight: f64,
    tare_weight: f64,
    unit_price: f64,
    discount_percentage: f64,
) -> ResultEngine<()> {
    if number.trim().is_empty() {
        return Err(EngineError::InvalidArgument(
            "invoice number must not be empty".to_string(),
        ));
    }
    if gross_weight < 0.0 || tare_weight < 0.0 {
        return Err(EngineError::InvalidArgument(
            "weights must be >= 0".to_string(),
        ));
    }
    if tare_weight > gross_weight {
        return Err(EngineError::InvalidArgument(
            "tare weight exceeds gross weight".to_string(),
        ));
    }
    if unit_price < 0.0 {
        return Err(EngineError::InvalidArgument(
            "unit price must be >= 0".to_string(),
        ));
    }
    if !(0.0..=100.0).contains(&discount_percentage) {
        return Err(EngineError::InvalidArgument(
            "discount percentage must be within 0..=100".to_string(),
        ));
    }
    Ok(())
}

/// A committed invoice, immutable once posted.
///
/// `previous_balance`/`current_balance` snapshot the customer balance around
/// the posting, so statements can be reproduced without replaying history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Uuid,
    pub truck_id: Uuid,
    pub issued_on: NaiveDate,
    pub gross_weight: f64,
    pub tare_weight: f64,
    pub net_weight: f64,
    pub unit_price: f64,
    pub discount_percentage: f64,
    pub total: f64,
    pub final_amount: f64,
    pub previous_balance: f64,
    pub current_balance: f64,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub(crate) fn from_draft(
        draft: &InvoiceDraft,
        previous_balance: f64,
        current_balance: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            number: draft.number.clone(),
            customer_id: draft.customer_id,
            truck_id: draft.truck_id,
            issued_on: draft.issued_on,
            gross_weight: draft.gross_weight,
            tare_weight: draft.tare_weight,
            net_weight: draft.net_weight,
            unit_price: draft.unit_price,
            discount_percentage: draft.discount_percentage,
            total: draft.total,
            final_amount: draft.final_amount,
            previous_balance,
            current_balance,
            created_at: Utc::now(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "invoices")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub number: String,
    pub customer_id: String,
    pub truck_id: String,
    pub issued_on: Date,
    pub gross_weight: f64,
    pub tare_weight: f64,
    pub net_weight: f64,
    pub unit_price: f64,
    pub discount_percentage: f64,
    pub total: f64,
    pub final_amount: f64,
    pub previous_balance: f64,
    pub current_balance: f64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Customers,
    #[sea_orm(
        belongs_to = "super::trucks::Entity",
        from = "Column::TruckId",
        to = "super::trucks::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Trucks,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::trucks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Trucks.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Invoice> for ActiveModel {
    fn from(invoice: &Invoice) -> Self {
        Self {
            id: ActiveValue::Set(invoice.id.to_string()),
            number: ActiveValue::Set(invoice.number.clone()),
            customer_id: ActiveValue::Set(invoice.customer_id.to_string()),
            truck_id: ActiveValue::Set(invoice.truck_id.to_string()),
            issued_on: ActiveValue::Set(invoice.issued_on),
            gross_weight: ActiveValue::Set(invoice.gross_weight),
            tare_weight: ActiveValue::Set(invoice.tare_weight),
            net_weight: ActiveValue::Set(invoice.net_weight),
            unit_price: ActiveValue::Set(invoice.unit_price),
            discount_percentage: ActiveValue::Set(invoice.discount_percentage),
            total: ActiveValue::Set(invoice.total),
            final_amount: ActiveValue::Set(invoice.final_amount),
            previous_balance: ActiveValue::Set(invoice.previous_balance),
            current_balance: ActiveValue::Set(invoice.current_balance),
            created_at: ActiveValue::Set(invoice.created_at),
        }
    }
}

impl TryFrom<Model> for Invoice {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "invoice")?,
            number: model.number,
            customer_id: parse_uuid(&model.customer_id, "customer")?,
            truck_id: parse_uuid(&model.truck_id, "truck")?,
            issued_on: model.issued_on,
            gross_weight: model.gross_weight,
            tare_weight: model.tare_weight,
            net_weight: model.net_weight,
            unit_price: model.unit_price,
            discount_percentage: model.discount_percentage,
            total: model.total,
            final_amount: model.final_amount,
            previous_balance: model.previous_balance,
            current_balance: model.current_balance,
            created_at: model.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    #[test]
    fn draft_derives_amounts() {
        let draft = InvoiceDraft::new(
            "202603150001",
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(),
            120.0,
            20.0,
            2.5,
            10.0,
        )
        .unwrap();

        assert_eq!(draft.net_weight, 100.0);
        assert_eq!(draft.total, 250.0);
        assert_eq!(draft.final_amount, 225.0);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn draft_rejects_tare_above_gross() {
        let err = InvoiceDraft::new(
            "202603150001",
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(),
            50.0,
            60.0,
            2.5,
            0.0,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn draft_rejects_discount_above_hundred() {
        let err = InvoiceDraft::new(
            "202603150001",
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(),
            100.0,
            0.0,
            2.5,
            120.0,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[test]
    fn tampered_amounts_fail_validation() {
        let mut draft = InvoiceDraft::new(
            "202603150001",
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(),
            120.0,
            20.0,
            2.5,
            0.0,
        )
        .unwrap();
        draft.final_amount += 5.0;
        assert!(matches!(
            draft.validate(),
            Err(EngineError::InvalidArgument(_))
        ));
    }
}
