use async_trait::async_trait;
use chrono::Duration;
use sar_types::{in_force, Money, Transaction, Typology};

use crate::collaborator::TypologyDetector;
use crate::config::DetectionConfig;
use crate::error::PipelineResult;

pub const STRUCTURING_ID: &str = "TYP-01";
pub const RAPID_MOVEMENT_ID: &str = "TYP-02";

/// Rule-based typology detector.
///
/// Two rules:
/// - *Structuring*: inbound cash deposits just below the reporting
///   threshold, clustered inside a rolling window.
/// - *Rapid movement of funds*: outbound wire or crypto transfers shortly
///   after an inbound cash deposit.
pub struct RuleBasedDetector {
    config: DetectionConfig,
}

impl RuleBasedDetector {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    fn structuring(&self, transactions: &[Transaction]) -> Option<Typology> {
        let floor = self.config.band_floor_minor();
        let threshold = self.config.reporting_threshold_minor;
        let mut deposits: Vec<&Transaction> = transactions
            .iter()
            .filter(|t| t.is_cash_deposit() && (floor..threshold).contains(&t.amount.minor_units))
            .collect();
        deposits.sort_by_key(|t| t.timestamp);

        // Densest run of deposits inside one window.
        let window = Duration::days(self.config.structuring_window_days);
        let mut best: &[&Transaction] = &[];
        for start in 0..deposits.len() {
            let first = deposits[start].timestamp;
            let len = deposits[start..]
                .iter()
                .take_while(|t| t.timestamp - first <= window)
                .count();
            if len > best.len() {
                best = &deposits[start..start + len];
            }
        }

        let n = best.len();
        if n == 0 || n < self.config.min_structuring_deposits {
            return None;
        }

        let currency = best[0].amount.currency.clone();
        let low = best.iter().map(|t| t.amount.minor_units).min().unwrap_or_default();
        let high = best.iter().map(|t| t.amount.minor_units).max().unwrap_or_default();
        let total: i64 = best.iter().map(|t| t.amount.minor_units).sum();
        let span = (best[n - 1].timestamp - best[0].timestamp).num_days();

        Some(Typology {
            id: STRUCTURING_ID.into(),
            name: "Structuring / Smurfing".into(),
            description: format!(
                "Multiple cash deposits just under the {} reporting threshold.",
                Money::new(threshold, currency.clone())
            ),
            confidence: round2((0.5 + 0.16 * n as f64).min(0.99)),
            related_transactions: best.iter().map(|t| t.id.clone()).collect(),
            rationale: vec![
                format!(
                    "{n} cash deposits between {} and {} were made within {} days.",
                    Money::new(low, currency.clone()),
                    Money::new(high, currency.clone()),
                    span.max(1),
                ),
                format!(
                    "Every deposit falls within {:.0}% below the {} currency transaction reporting threshold.",
                    self.config.structuring_band * 100.0,
                    Money::new(threshold, currency.clone()),
                ),
                format!(
                    "Aggregate cash deposited across the window: {}.",
                    Money::new(total, currency)
                ),
            ],
        })
    }

    fn rapid_movement(&self, transactions: &[Transaction]) -> Option<Typology> {
        let window = Duration::days(self.config.rapid_movement_window_days);
        let deposits: Vec<&Transaction> =
            transactions.iter().filter(|t| t.is_cash_deposit()).collect();

        let mut movements: Vec<(&Transaction, &Transaction)> = transactions
            .iter()
            .filter(|t| t.is_outbound_transfer())
            .filter_map(|out| {
                deposits
                    .iter()
                    .filter(|d| d.timestamp <= out.timestamp && out.timestamp - d.timestamp <= window)
                    .max_by_key(|d| d.timestamp)
                    .map(|d| (out, *d))
            })
            .collect();
        if movements.is_empty() {
            return None;
        }
        movements.sort_by_key(|(out, _)| out.timestamp);

        let n = movements.len();
        let currency = movements[0].0.amount.currency.clone();
        let total: u64 = movements.iter().map(|(out, _)| out.amount.magnitude()).sum();

        let mut rationale = vec![format!(
            "{n} outbound transfers totalling {} left the account within {} days of a cash deposit.",
            Money::new(i64::try_from(total).unwrap_or(i64::MAX), currency),
            self.config.rapid_movement_window_days,
        )];
        rationale.extend(movements.iter().map(|(out, dep)| {
            format!(
                "{} sent {} to {} {} hours after cash deposit {}.",
                out.id,
                out.amount,
                out.counterparty,
                (out.timestamp - dep.timestamp).num_hours(),
                dep.id,
            )
        }));

        Some(Typology {
            id: RAPID_MOVEMENT_ID.into(),
            name: "Rapid Movement of Funds".into(),
            description: "Funds are transferred out almost immediately after being deposited."
                .into(),
            confidence: round2((0.65 + 0.1 * n as f64).min(0.99)),
            related_transactions: movements.iter().map(|(out, _)| out.id.clone()).collect(),
            rationale,
        })
    }
}

impl Default for RuleBasedDetector {
    fn default() -> Self {
        Self::new(DetectionConfig::default())
    }
}

#[async_trait]
impl TypologyDetector for RuleBasedDetector {
    fn name(&self) -> &str {
        "rule-based-detector"
    }

    async fn detect(&self, transactions: &[Transaction]) -> PipelineResult<Vec<Typology>> {
        let current: Vec<Transaction> = in_force(transactions).cloned().collect();
        let detected: Vec<Typology> = [self.structuring(&current), self.rapid_movement(&current)]
            .into_iter()
            .flatten()
            .collect();
        tracing::debug!(
            transactions = transactions.len(),
            detected = detected.len(),
            "rule-based detection finished"
        );
        Ok(detected)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
