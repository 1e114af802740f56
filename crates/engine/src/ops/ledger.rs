use chrono::Utc;
use sea_orm::{
    DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{
    EngineError, Invoice, InvoiceDraft, Payment, PaymentDraft, PostedPayment, ResultEngine,
    customers, invoices, payments,
    util::{BALANCE_TOLERANCE, round_currency},
};

use super::Engine;

/// Bound on whole-unit retries when a posting loses the optimistic
/// concurrency check on the customer row, or the storage rejects the writer
/// mid-unit. With N contending postings every round commits exactly one, so
/// the bound is only reachable under pathological contention.
const MAX_POSTING_ATTEMPTS: u32 = 16;

impl Engine {
    /// Post an invoice against a customer balance as one atomic unit.
    ///
    /// This:
    /// - stamps `previous_balance`/`current_balance` from the balance read
    ///   inside the same transaction
    /// - persists the invoice row
    /// - moves the cached customer balance, guarded by the row version
    ///
    /// Two postings against the same customer never both observe the
    /// pre-update balance: the loser of the version check is rolled back and
    /// the whole unit retried. Amounts must be pre-computed on the draft; the
    /// engine checks them but does not recompute.
    pub async fn post_invoice(&self, draft: InvoiceDraft) -> ResultEngine<Invoice> {
        draft.validate()?;

        for attempt in 0..MAX_POSTING_ATTEMPTS {
            match self.try_post_invoice(&draft).await {
                Ok(Some(invoice)) => return Ok(invoice),
                Ok(None) => {
                    tracing::debug!(
                        attempt,
                        customer_id = %draft.customer_id,
                        "invoice posting raced a concurrent balance write, retrying"
                    );
                }
                Err(err) if retryable(&err) && attempt + 1 < MAX_POSTING_ATTEMPTS => {
                    tracing::debug!(attempt, error = %err, "storage rejected posting unit, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(EngineError::TransactionFailed(format!(
            "invoice posting for customer {} exhausted retries",
            draft.customer_id
        )))
    }

    async fn try_post_invoice(&self, draft: &InvoiceDraft) -> ResultEngine<Option<Invoice>> {
        let db_tx = self.database.begin().await?;

        let customer = self.require_customer(&db_tx, draft.customer_id).await?;
        self.require_truck(&db_tx, draft.truck_id).await?;

        let previous_balance = customer.balance;
        let current_balance = round_currency(previous_balance + draft.final_amount);
        let invoice = Invoice::from_draft(draft, previous_balance, current_balance);

        invoices::ActiveModel::from(&invoice).insert(&db_tx).await?;
        if !Self::claim_customer_balance(&db_tx, &customer, current_balance).await? {
            db_tx.rollback().await?;
            return Ok(None);
        }
        db_tx
            .commit()
            .await
            .map_err(|err| EngineError::TransactionFailed(err.to_string()))?;
        Ok(Some(invoice))
    }

    /// Post a payment against a customer balance as one atomic unit.
    ///
    /// Overpayment is accepted business behavior, not an error: the balance
    /// is clamped at zero, the excess is reported on the result and logged as
    /// a warning.
    pub async fn post_payment(&self, draft: PaymentDraft) -> ResultEngine<PostedPayment> {
        if draft.amount <= 0.0 {
            return Err(EngineError::InvalidArgument(
                "payment amount must be > 0".to_string(),
            ));
        }

        for attempt in 0..MAX_POSTING_ATTEMPTS {
            match self.try_post_payment(&draft).await {
                Ok(Some(posted)) => return Ok(posted),
                Ok(None) => {
                    tracing::debug!(
                        attempt,
                        customer_id = %draft.customer_id,
                        "payment posting raced a concurrent balance write, retrying"
                    );
                }
                Err(err) if retryable(&err) && attempt + 1 < MAX_POSTING_ATTEMPTS => {
                    tracing::debug!(attempt, error = %err, "storage rejected posting unit, retrying");
                }
                Err(err) => return Err(err),
            }
        }
        Err(EngineError::TransactionFailed(format!(
            "payment posting for customer {} exhausted retries",
            draft.customer_id
        )))
    }

    async fn try_post_payment(&self, draft: &PaymentDraft) -> ResultEngine<Option<PostedPayment>> {
        let db_tx = self.database.begin().await?;

        let customer = self.require_customer(&db_tx, draft.customer_id).await?;
        if let Some(invoice_id) = draft.invoice_id {
            let invoice = invoices::Entity::find_by_id(invoice_id.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("invoice {invoice_id}")))?;
            if invoice.customer_id != customer.id {
                return Err(EngineError::InvalidArgument(
                    "payment invoice belongs to another customer".to_string(),
                ));
            }
        }

        let excess = round_currency(draft.amount - customer.balance);
        let overpaid_by = (excess > BALANCE_TOLERANCE).then_some(excess);
        if let Some(excess) = overpaid_by {
            tracing::warn!(
                customer_id = %customer.id,
                amount = draft.amount,
                balance = customer.balance,
                excess,
                "payment exceeds outstanding balance, clamping at zero"
            );
        }
        let new_balance = round_currency((customer.balance - draft.amount).max(0.0));

        let payment = Payment::from_draft(draft);
        payments::ActiveModel::from(&payment).insert(&db_tx).await?;
        if !Self::claim_customer_balance(&db_tx, &customer, new_balance).await? {
            db_tx.rollback().await?;
            return Ok(None);
        }
        db_tx
            .commit()
            .await
            .map_err(|err| EngineError::TransactionFailed(err.to_string()))?;
        Ok(Some(PostedPayment {
            payment,
            new_balance,
            overpaid_by,
        }))
    }

    /// Most recent invoices for a customer.
    pub async fn list_invoices_for_customer(
        &self,
        customer_id: Uuid,
        limit: u64,
    ) -> ResultEngine<Vec<Invoice>> {
        self.require_customer(&self.database, customer_id).await?;

        let models = invoices::Entity::find()
            .filter(invoices::Column::CustomerId.eq(customer_id.to_string()))
            .order_by_desc(invoices::Column::CreatedAt)
            .limit(limit)
            .all(&self.database)
            .await?;
        models.into_iter().map(Invoice::try_from).collect()
    }

    /// Conditionally write a customer's cached balance, guarded by the row
    /// version read in the same transaction. Returns `false` when the row
    /// moved underneath us.
    pub(in crate::ops) async fn claim_customer_balance(
        db_tx: &DatabaseTransaction,
        customer: &customers::Model,
        new_balance: f64,
    ) -> ResultEngine<bool> {
        let result = customers::Entity::update_many()
            .col_expr(customers::Column::Balance, Expr::value(new_balance))
            .col_expr(customers::Column::Version, Expr::value(customer.version + 1))
            .col_expr(customers::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(customers::Column::Id.eq(customer.id.clone()))
            .filter(customers::Column::Version.eq(customer.version))
            .exec(db_tx)
            .await?;
        Ok(result.rows_affected == 1)
    }
}

/// Storage-level failures are safe to retry because the whole unit rolled
/// back; validation and lookup failures are not.
fn retryable(err: &EngineError) -> bool {
    matches!(
        err,
        EngineError::Database(_) | EngineError::TransactionFailed(_)
    )
}
