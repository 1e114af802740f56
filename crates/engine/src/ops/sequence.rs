use chrono::{NaiveDate, Utc};
use rand::Rng;
use sea_orm::{
    ActiveValue, ConnectionTrait, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{EngineError, ResultEngine, invoices, sequences};

use super::Engine;

/// Collision retries before allocation gives up.
const MAX_SEQUENCE_ATTEMPTS: u32 = 10;
/// Internal retries for seeding the per-date counter row.
const MAX_COUNTER_ATTEMPTS: u32 = 3;

impl Engine {
    /// Allocate a date-scoped invoice number (`YYYYMMDD` + 4-digit sequence).
    ///
    /// The per-date counter row is the primary allocator. The legacy
    /// scan-and-increment path takes over when the counter cannot be used,
    /// and candidates that turn out to exist are retried with a random
    /// disambiguating suffix, up to a fixed attempt bound. When the sequence
    /// tables cannot be read at all, a timestamp identifier is returned
    /// rather than blocking invoicing.
    pub async fn allocate_invoice_number(&self, date: NaiveDate) -> ResultEngine<String> {
        let prefix = sequences::date_prefix(date);

        let base_seq = match self.counter_next_seq(&prefix).await {
            Ok(seq) => seq,
            Err(EngineError::Database(_) | EngineError::TransactionFailed(_)) => {
                tracing::debug!(%prefix, "sequence counter unavailable, scanning existing numbers");
                match self.scan_next_seq(&prefix).await {
                    Ok(seq) => seq,
                    Err(EngineError::Database(err)) => {
                        tracing::warn!(
                            %prefix,
                            error = %err,
                            "invoice number read failed, issuing timestamp identifier"
                        );
                        return Ok(sequences::timestamp_number(Utc::now()));
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        let base = sequences::format_number(&prefix, base_seq);
        let mut candidate = base.clone();
        for attempt in 0..MAX_SEQUENCE_ATTEMPTS {
            match self.invoice_number_taken(&candidate).await {
                Ok(false) => return Ok(candidate),
                Ok(true) => {
                    tracing::debug!(%candidate, attempt, "invoice number collision, retrying");
                    let suffix: u32 = rand::thread_rng().gen_range(10..100);
                    candidate = format!("{base}-{suffix}");
                }
                Err(EngineError::Database(err)) => {
                    tracing::warn!(
                        %candidate,
                        error = %err,
                        "invoice number read failed, issuing timestamp identifier"
                    );
                    return Ok(sequences::timestamp_number(Utc::now()));
                }
                Err(err) => return Err(err),
            }
        }
        Err(EngineError::AllocationExhausted(prefix))
    }

    /// Atomically increment the per-date counter, seeding it from the largest
    /// existing number on first use.
    async fn counter_next_seq(&self, prefix: &str) -> ResultEngine<i64> {
        for _attempt in 0..MAX_COUNTER_ATTEMPTS {
            let db_tx = self.database.begin().await?;

            let bumped = sequences::Entity::update_many()
                .col_expr(
                    sequences::Column::LastSeq,
                    Expr::col(sequences::Column::LastSeq).add(1),
                )
                .filter(sequences::Column::Prefix.eq(prefix.to_string()))
                .exec(&db_tx)
                .await?;

            if bumped.rows_affected == 0 {
                let seed = self.scan_max_seq(&db_tx, prefix).await? + 1;
                let inserted = sequences::ActiveModel {
                    prefix: ActiveValue::Set(prefix.to_string()),
                    last_seq: ActiveValue::Set(seed),
                }
                .insert(&db_tx)
                .await;
                match inserted {
                    Ok(_) => {
                        db_tx.commit().await?;
                        return Ok(seed);
                    }
                    Err(err) => {
                        // Another allocator seeded the row first; re-run the
                        // increment against it.
                        tracing::debug!(%prefix, error = %err, "counter seed raced, retrying");
                        db_tx.rollback().await?;
                        continue;
                    }
                }
            }

            let model = sequences::Entity::find_by_id(prefix.to_string())
                .one(&db_tx)
                .await?
                .ok_or_else(|| EngineError::NotFound(format!("invoice sequence {prefix}")))?;
            db_tx.commit().await?;
            return Ok(model.last_seq);
        }
        Err(EngineError::TransactionFailed(format!(
            "invoice sequence seeding for prefix {prefix} exhausted retries"
        )))
    }

    /// Legacy allocator: read the largest existing number and increment.
    async fn scan_next_seq(&self, prefix: &str) -> ResultEngine<i64> {
        Ok(self.scan_max_seq(&self.database, prefix).await? + 1)
    }

    async fn scan_max_seq<C: ConnectionTrait>(
        &self,
        conn: &C,
        prefix: &str,
    ) -> ResultEngine<i64> {
        let latest = invoices::Entity::find()
            .filter(invoices::Column::Number.like(format!("{prefix}%")))
            .order_by_desc(invoices::Column::Number)
            .one(conn)
            .await?;
        Ok(latest
            .and_then(|model| sequences::parse_sequence(&model.number, prefix))
            .unwrap_or(0))
    }

    async fn invoice_number_taken(&self, number: &str) -> ResultEngine<bool> {
        let existing = invoices::Entity::find()
            .filter(invoices::Column::Number.eq(number.to_string()))
            .one(&self.database)
            .await?;
        Ok(existing.is_some())
    }
}
