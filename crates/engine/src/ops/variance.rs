use std::collections::HashMap;

use chrono::{Duration, Utc};
use sea_orm::{QueryFilter, QueryOrder, prelude::*};
use uuid::Uuid;

use crate::{DailyReconciliation, ResultEngine, reconciliations, variance};

use super::Engine;

/// Occurrences above threshold before a truck counts as a recurring problem
/// rather than a one-off.
const CONSISTENT_PATTERN_MIN_OCCURRENCES: usize = 3;

impl Engine {
    /// Statistical outlier scan over a trailing window of reconciliations.
    ///
    /// Flags records whose wastage percentage exceeds
    /// `mean + k_std_dev · stddev` of the window, across every record status.
    /// Fewer than two records in the window yields no anomalies.
    pub async fn find_wastage_anomalies(
        &self,
        window_days: i64,
        k_std_dev: f64,
    ) -> ResultEngine<Vec<DailyReconciliation>> {
        let cutoff = Utc::now().date_naive() - Duration::days(window_days);
        let models = reconciliations::Entity::find()
            .filter(reconciliations::Column::ReconDate.gte(cutoff))
            .order_by_asc(reconciliations::Column::ReconDate)
            .all(&self.database)
            .await?;
        let records: Vec<DailyReconciliation> = models
            .into_iter()
            .map(DailyReconciliation::try_from)
            .collect::<ResultEngine<_>>()?;
        if records.len() < 2 {
            return Ok(Vec::new());
        }

        let percentages: Vec<f64> = records.iter().map(|r| r.wastage_percentage).collect();
        let mean = variance::mean(&percentages);
        let std_dev = variance::population_std_dev(&percentages);
        let threshold = mean + k_std_dev * std_dev;

        Ok(records
            .into_iter()
            .filter(|record| record.wastage_percentage > threshold)
            .collect())
    }

    /// Group trucks repeatedly above a fixed wastage threshold within the
    /// day range: a recurring operational problem, not a statistical one-off.
    pub async fn find_consistent_variance_patterns(
        &self,
        threshold: f64,
        day_range: i64,
    ) -> ResultEngine<HashMap<Uuid, Vec<DailyReconciliation>>> {
        let cutoff = Utc::now().date_naive() - Duration::days(day_range);
        let models = reconciliations::Entity::find()
            .filter(reconciliations::Column::ReconDate.gte(cutoff))
            .filter(reconciliations::Column::WastagePercentage.gt(threshold))
            .order_by_asc(reconciliations::Column::ReconDate)
            .all(&self.database)
            .await?;

        let mut by_truck: HashMap<Uuid, Vec<DailyReconciliation>> = HashMap::new();
        for model in models {
            let record = DailyReconciliation::try_from(model)?;
            by_truck.entry(record.truck_id).or_default().push(record);
        }
        by_truck.retain(|_, records| records.len() >= CONSISTENT_PATTERN_MIN_OCCURRENCES);
        Ok(by_truck)
    }
}
