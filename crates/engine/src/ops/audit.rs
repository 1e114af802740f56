use std::collections::HashMap;

use sea_orm::{ConnectionTrait, Statement, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, customers,
    util::{BALANCE_TOLERANCE, parse_uuid, round_currency},
};

use super::{Engine, with_tx};

/// Outcome of a balance audit for one customer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BalanceAudit {
    /// Recomputed balance minus the cached one; zero when no repair was
    /// needed.
    pub drift: f64,
    pub new_balance: f64,
}

impl Engine {
    /// Recompute one customer's balance from its full invoice/payment
    /// history.
    ///
    /// Drift beyond the fixed tolerance overwrites the cached balance; runs
    /// with no intervening postings are idempotent and write nothing.
    pub async fn recompute_balance(&self, customer_id: Uuid) -> ResultEngine<BalanceAudit> {
        with_tx!(self, |db_tx| {
            let customer = self.require_customer(&db_tx, customer_id).await?;
            let recomputed = Self::ledger_balance(&db_tx, &customer.id).await?;
            let drift = round_currency(recomputed - customer.balance);

            if drift.abs() > BALANCE_TOLERANCE {
                tracing::warn!(
                    customer_id = %customer.id,
                    drift,
                    cached = customer.balance,
                    recomputed,
                    "repairing drifted customer balance"
                );
                if Self::claim_customer_balance(&db_tx, &customer, recomputed).await? {
                    Ok(BalanceAudit {
                        drift,
                        new_balance: recomputed,
                    })
                } else {
                    Err(EngineError::TransactionFailed(format!(
                        "customer {customer_id} changed during audit"
                    )))
                }
            } else {
                Ok(BalanceAudit {
                    drift: 0.0,
                    new_balance: customer.balance,
                })
            }
        })
    }

    /// Recompute every customer's balance, repairing drifted rows in one
    /// transaction. Returns the non-zero drifts by customer id.
    pub async fn recompute_all_balances(&self) -> ResultEngine<HashMap<Uuid, f64>> {
        with_tx!(self, |db_tx| {
            let models = customers::Entity::find().all(&db_tx).await?;
            let mut drifts = HashMap::new();
            for customer in models {
                let recomputed = Self::ledger_balance(&db_tx, &customer.id).await?;
                let drift = round_currency(recomputed - customer.balance);
                if drift.abs() <= BALANCE_TOLERANCE {
                    continue;
                }
                tracing::warn!(
                    customer_id = %customer.id,
                    drift,
                    "repairing drifted customer balance"
                );
                if !Self::claim_customer_balance(&db_tx, &customer, recomputed).await? {
                    // A posting moved the row mid-audit; the measured drift no
                    // longer describes the stored balance.
                    tracing::debug!(
                        customer_id = %customer.id,
                        "customer changed during audit, skipping repair"
                    );
                    continue;
                }
                drifts.insert(parse_uuid(&customer.id, "customer")?, drift);
            }
            Ok(drifts)
        })
    }

    /// Balance derived from the append-only history: invoiced minus paid.
    async fn ledger_balance<C: ConnectionTrait>(
        conn: &C,
        customer_id: &str,
    ) -> ResultEngine<f64> {
        let invoiced = Self::sum_amount(
            conn,
            "SELECT COALESCE(SUM(final_amount), 0.0) AS sum \
             FROM invoices \
             WHERE customer_id = ?",
            customer_id,
        )
        .await?;
        let paid = Self::sum_amount(
            conn,
            "SELECT COALESCE(SUM(amount), 0.0) AS sum \
             FROM payments \
             WHERE customer_id = ?",
            customer_id,
        )
        .await?;
        Ok(round_currency(invoiced - paid))
    }

    async fn sum_amount<C: ConnectionTrait>(
        conn: &C,
        sql: &str,
        customer_id: &str,
    ) -> ResultEngine<f64> {
        let stmt = Statement::from_sql_and_values(
            conn.get_database_backend(),
            sql,
            vec![customer_id.into()],
        );
        let row = conn.query_one(stmt).await?;
        Ok(row.and_then(|r| r.try_get("", "sum").ok()).unwrap_or(0.0))
    }
}
