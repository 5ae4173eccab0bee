use chrono::{DateTime, NaiveDate, Utc};
use sar_types::{Case, CaseStatus, RiskLevel};
use serde::{Deserialize, Serialize};

/// Portfolio counters for the investigations dashboard.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    /// Cases not yet filed.
    pub open_cases: usize,
    /// Open cases with a `High` risk level.
    pub high_risk_alerts: usize,
    pub sars_filed: usize,
    /// Mean days from opening to filing, over filed cases.
    pub avg_resolution_days: Option<f64>,
    pub last_updated: DateTime<Utc>,
}

impl DashboardMetrics {
    /// Tally over `(case, filed_on)` pairs.
    pub fn tally<'a>(cases: impl IntoIterator<Item = (&'a Case, Option<NaiveDate>)>) -> Self {
        let mut metrics = Self {
            open_cases: 0,
            high_risk_alerts: 0,
            sars_filed: 0,
            avg_resolution_days: None,
            last_updated: Utc::now(),
        };
        let mut resolution_days = Vec::new();

        for (case, filed_on) in cases {
            if case.status == CaseStatus::Filed {
                metrics.sars_filed += 1;
                if let Some(filed_on) = filed_on {
                    resolution_days.push((filed_on - case.opened_on).num_days().max(0) as f64);
                }
                continue;
            }
            metrics.open_cases += 1;
            if case.risk_level() == RiskLevel::High {
                metrics.high_risk_alerts += 1;
            }
        }

        if !resolution_days.is_empty() {
            let mean = resolution_days.iter().sum::<f64>() / resolution_days.len() as f64;
            metrics.avg_resolution_days = Some((mean * 10.0).round() / 10.0);
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    use sar_types::Customer;

    use super::*;

    fn case(id: &str, risk_score: u8, status: CaseStatus) -> Case {
        Case {
            id: id.into(),
            customer: Customer {
                id: "CUST-1".into(),
                name: "Customer".into(),
            },
            opened_on: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            risk_score,
            status,
            assignee: None,
            transactions: vec![],
            typologies: vec![],
            narrative: None,
        }
    }

    #[test]
    fn counts_open_high_risk_and_filed() {
        let cases = [
            case("SAR-1", 92, CaseStatus::InReview),
            case("SAR-2", 75, CaseStatus::Open),
            case("SAR-3", 85, CaseStatus::Filed),
            case("SAR-4", 45, CaseStatus::Filed),
        ];
        let filed = NaiveDate::from_ymd_opt(2023, 10, 5);
        let metrics = DashboardMetrics::tally(cases.iter().map(|c| {
            let filed_on = (c.status == CaseStatus::Filed).then_some(filed).flatten();
            (c, filed_on)
        }));

        assert_eq!(metrics.open_cases, 2);
        assert_eq!(metrics.high_risk_alerts, 1);
        assert_eq!(metrics.sars_filed, 2);
        assert_eq!(metrics.avg_resolution_days, Some(4.0));
    }

    #[test]
    fn no_filings_no_average() {
        let cases = [case("SAR-1", 10, CaseStatus::Open)];
        let metrics = DashboardMetrics::tally(cases.iter().map(|c| (c, None)));
        assert_eq!(metrics.avg_resolution_days, None);
        assert_eq!(metrics.high_risk_alerts, 0);
    }
}
