use async_trait::async_trait;
use sar_types::{in_force, Money, NarrativeSection, SectionId, Transaction, Typology};

use crate::collaborator::{DraftContext, NarrativeGenerator};
use crate::error::PipelineResult;

pub const EXECUTIVE_SUMMARY_ID: &str = "executive-summary";
pub const CONCLUSION_ID: &str = "conclusion";

const FILING_AUTHORITY: &str = "31 C.F.R. 1020.320(a)(2)";

/// Deterministic template narrative generator.
///
/// Produces an executive summary, one activity section per typology, and a
/// conclusion. Activity sections spell out every cited transaction as
/// `ID (CCY amount on date)` so the fact checker can verify them.
#[derive(Debug, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self {
        Self
    }

    fn executive_summary(
        context: &DraftContext,
        transactions: &[Transaction],
        typologies: &[Typology],
    ) -> NarrativeSection {
        let flagged: Vec<&Transaction> = in_force(transactions).filter(|t| t.flagged).collect();
        let currency = transactions
            .first()
            .map(|t| t.amount.currency.clone())
            .unwrap_or_else(|| "USD".into());
        let total: i64 = flagged.iter().map(|t| t.amount.magnitude() as i64).sum();

        let mut body = format!(
            "A review of transaction activity for {} ({}) was conducted under case {}.",
            context.customer.name, context.customer.id, context.case_id
        );
        let first = flagged.iter().map(|t| t.date()).min();
        let last = flagged.iter().map(|t| t.date()).max();
        if let (Some(first), Some(last)) = (first, last) {
            body.push_str(&format!(
                " The activity under review occurred between {first} and {last}, \
                 comprising {} flagged transactions totaling {} in aggregate flows.",
                flagged.len(),
                Money::new(total, currency)
            ));
        } else {
            body.push_str(" No flagged activity was found in the evidence.");
        }
        match typologies.len() {
            0 => body.push_str(" No suspicious activity typology was identified."),
            1 => body.push_str(" One suspicious activity typology was identified."),
            n => body.push_str(&format!(" {n} suspicious activity typologies were identified.")),
        }

        NarrativeSection {
            id: EXECUTIVE_SUMMARY_ID.into(),
            title: "1.0 Executive Summary".into(),
            body,
            citations: Vec::new(),
        }
    }

    fn activity(
        number: usize,
        typology: &Typology,
        transactions: &[Transaction],
    ) -> NarrativeSection {
        let references: Vec<String> = typology
            .related_transactions
            .iter()
            .map(|id| {
                transactions
                    .iter()
                    .find(|t| &t.id == id)
                    .map(Transaction::evidence_reference)
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();

        let mut body = format!(
            "{} Detection confidence: {}%. Supporting evidence: {}.",
            typology.description,
            typology.confidence_percent(),
            references.join("; ")
        );
        for statement in &typology.rationale {
            body.push(' ');
            body.push_str(statement);
        }

        NarrativeSection {
            id: SectionId::from(format!("activity-{}", typology.id.as_str().to_lowercase()).as_str()),
            title: format!("{number}.0 {}", typology.name),
            body,
            citations: typology.related_transactions.clone(),
        }
    }

    fn conclusion(number: usize, typologies: &[Typology]) -> NarrativeSection {
        let body = if typologies.is_empty() {
            "The reviewed activity did not meet any typology criteria. \
             Filing is not recommended without further investigation."
                .to_string()
        } else {
            let names: Vec<&str> = typologies.iter().map(|t| t.name.as_str()).collect();
            format!(
                "The pattern of activity ({}) is inconsistent with the customer's historical \
                 profile and stated business purpose. SAR filing is recommended pursuant to {FILING_AUTHORITY}.",
                names.join(", ")
            )
        };
        NarrativeSection {
            id: CONCLUSION_ID.into(),
            title: format!("{number}.0 Conclusion"),
            body,
            citations: Vec::new(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for TemplateGenerator {
    fn name(&self) -> &str {
        "template-generator"
    }

    async fn draft(
        &self,
        context: &DraftContext,
        transactions: &[Transaction],
        typologies: &[Typology],
    ) -> PipelineResult<Vec<NarrativeSection>> {
        let mut sections = Vec::with_capacity(typologies.len() + 2);
        sections.push(Self::executive_summary(context, transactions, typologies));
        for (i, typology) in typologies.iter().enumerate() {
            sections.push(Self::activity(i + 2, typology, transactions));
        }
        sections.push(Self::conclusion(typologies.len() + 2, typologies));
        Ok(sections)
    }
}
