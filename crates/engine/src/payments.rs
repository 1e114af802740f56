//! Payment primitives.
//!
//! A payment credits a customer balance. It may settle a specific invoice or
//! stay unallocated; either way it is append-only once posted.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EngineError, util::parse_uuid};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Cheque,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::BankTransfer => "bank_transfer",
            Self::Cheque => "cheque",
        }
    }
}

impl TryFrom<&str> for PaymentMethod {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "cash" => Ok(Self::Cash),
            "bank_transfer" => Ok(Self::BankTransfer),
            "cheque" => Ok(Self::Cheque),
            other => Err(EngineError::InvalidArgument(format!(
                "invalid payment method: {other}"
            ))),
        }
    }
}

/// Input for [`Engine::post_payment`].
///
/// [`Engine::post_payment`]: crate::Engine::post_payment
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub customer_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount: f64,
    pub method: PaymentMethod,
    pub received_at: DateTime<Utc>,
}

/// A committed payment, immutable once posted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub amount: f64,
    pub method: PaymentMethod,
    pub received_at: DateTime<Utc>,
}

impl Payment {
    pub(crate) fn from_draft(draft: &PaymentDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id: draft.customer_id,
            invoice_id: draft.invoice_id,
            amount: draft.amount,
            method: draft.method,
            received_at: draft.received_at,
        }
    }
}

/// Result of a posted payment.
///
/// Overpayment is accepted business behavior, not an error; `overpaid_by`
/// carries the excess over the balance at posting time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PostedPayment {
    pub payment: Payment,
    pub new_balance: f64,
    pub overpaid_by: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: f64,
    pub method: String,
    pub received_at: DateTimeUtc,
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
        belongs_to = "super::invoices::Entity",
        from = "Column::InvoiceId",
        to = "super::invoices::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Invoices,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Payment> for ActiveModel {
    fn from(payment: &Payment) -> Self {
        Self {
            id: ActiveValue::Set(payment.id.to_string()),
            customer_id: ActiveValue::Set(payment.customer_id.to_string()),
            invoice_id: ActiveValue::Set(payment.invoice_id.map(|id| id.to_string())),
            amount: ActiveValue::Set(payment.amount),
            method: ActiveValue::Set(payment.method.as_str().to_string()),
            received_at: ActiveValue::Set(payment.received_at),
        }
    }
}

impl TryFrom<Model> for Payment {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: parse_uuid(&model.id, "payment")?,
            customer_id: parse_uuid(&model.customer_id, "customer")?,
            invoice_id: model
                .invoice_id
                .as_deref()
                .map(|id| parse_uuid(id, "invoice"))
                .transpose()?,
            amount: model.amount,
            method: PaymentMethod::try_from(model.method.as_str())?,
            received_at: model.received_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_round_trips() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::BankTransfer,
            PaymentMethod::Cheque,
        ] {
            assert_eq!(PaymentMethod::try_from(method.as_str()).unwrap(), method);
        }
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert!(PaymentMethod::try_from("iou").is_err());
    }
}
