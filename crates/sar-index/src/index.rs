//! The bidirectional citation map.
//!
//! [`CrossReferenceIndex`] is immutable once built. Callers replace the whole
//! index when its inputs change; there are no incremental updates that could
//! leave one direction out of step with the other.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use sar_types::{NarrativeSection, SectionId, Transaction, TransactionId, Typology, TypologyId};

use crate::error::{IndexError, IndexResult};
use crate::referrer::Referrer;

/// Everything that cites one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransactionRefs {
    pub sections: BTreeSet<SectionId>,
    pub typologies: BTreeSet<TypologyId>,
}

/// Cross-reference index over a case's transactions, typologies and
/// narrative sections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrossReferenceIndex {
    by_transaction: BTreeMap<TransactionId, TransactionRefs>,
    by_section: BTreeMap<SectionId, Vec<TransactionId>>,
}

impl CrossReferenceIndex {
    /// Build the index.
    ///
    /// Every transaction gets an entry, cited or not. A citation repeated
    /// within one section or typology is recorded once, at its first
    /// position. Fails with [`IndexError::DanglingReference`] on the first
    /// citation to an unknown transaction.
    pub fn build(
        transactions: &[Transaction],
        typologies: &[Typology],
        sections: &[NarrativeSection],
    ) -> IndexResult<Self> {
        let mut by_transaction: BTreeMap<TransactionId, TransactionRefs> = transactions
            .iter()
            .map(|tx| (tx.id.clone(), TransactionRefs::default()))
            .collect();

        let mut seen_typologies: HashSet<&TypologyId> = HashSet::new();
        for typology in typologies {
            if !seen_typologies.insert(&typology.id) {
                return Err(IndexError::DuplicateTypology(typology.id.clone()));
            }
            let referrer = Referrer::Typology(typology.id.clone());
            let cited = resolve(&referrer, &typology.related_transactions, &by_transaction)?;
            for tx in &cited {
                if let Some(refs) = by_transaction.get_mut(tx) {
                    refs.typologies.insert(typology.id.clone());
                }
            }
        }

        let mut by_section: BTreeMap<SectionId, Vec<TransactionId>> = BTreeMap::new();
        for section in sections {
            if by_section.contains_key(&section.id) {
                return Err(IndexError::DuplicateSection(section.id.clone()));
            }
            let referrer = Referrer::Section(section.id.clone());
            let cited = resolve(&referrer, &section.citations, &by_transaction)?;
            for tx in &cited {
                if let Some(refs) = by_transaction.get_mut(tx) {
                    refs.sections.insert(section.id.clone());
                }
            }
            by_section.insert(section.id.clone(), cited);
        }

        tracing::debug!(
            transactions = by_transaction.len(),
            typologies = seen_typologies.len(),
            sections = by_section.len(),
            "cross-reference index built"
        );

        Ok(Self {
            by_transaction,
            by_section,
        })
    }

    // ---------------------------------------------------------------
    // Transaction -> referrers
    // ---------------------------------------------------------------

    /// Sections citing a transaction.
    pub fn citations_for(&self, tx: &TransactionId) -> IndexResult<&BTreeSet<SectionId>> {
        self.refs(tx).map(|refs| &refs.sections)
    }

    /// Typologies the transaction is evidence for.
    pub fn typologies_for(&self, tx: &TransactionId) -> IndexResult<&BTreeSet<TypologyId>> {
        self.refs(tx).map(|refs| &refs.typologies)
    }

    pub fn refs(&self, tx: &TransactionId) -> IndexResult<&TransactionRefs> {
        self.by_transaction
            .get(tx)
            .ok_or_else(|| IndexError::UnknownTransaction(tx.clone()))
    }

    // ---------------------------------------------------------------
    // Referrer -> transactions
    // ---------------------------------------------------------------

    /// Transactions cited by a section, in citation order.
    pub fn transactions_for(&self, section: &SectionId) -> IndexResult<&[TransactionId]> {
        self.by_section
            .get(section)
            .map(Vec::as_slice)
            .ok_or_else(|| IndexError::UnknownSection(section.clone()))
    }
}

/// Check every citation against the known transactions, dropping repeats.
fn resolve(
    referrer: &Referrer,
    citations: &[TransactionId],
    known: &BTreeMap<TransactionId, TransactionRefs>,
) -> IndexResult<Vec<TransactionId>> {
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(citations.len());
    for tx in citations {
        if !known.contains_key(tx) {
            return Err(IndexError::DanglingReference {
                referrer: referrer.clone(),
                transaction: tx.clone(),
            });
        }
        if seen.insert(tx) {
            resolved.push(tx.clone());
        }
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use sar_types::{Direction, Instrument, Money};

    use super::*;

    fn tx(id: &str) -> Transaction {
        Transaction {
            id: id.into(),
            timestamp: Utc.with_ymd_and_hms(2023, 10, 12, 9, 0, 0).unwrap(),
            amount: Money::from_major(9_800, "USD"),
            counterparty: "Cash Deposit".into(),
            instrument: Instrument::Cash,
            direction: Direction::Inbound,
            flagged: true,
            description: None,
            supersedes: None,
        }
    }

    fn section(id: &str, citations: &[&str]) -> NarrativeSection {
        NarrativeSection {
            id: id.into(),
            title: id.to_string(),
            body: String::new(),
            citations: citations.iter().map(|c| TransactionId::from(*c)).collect(),
        }
    }

    fn typology(id: &str, related: &[&str]) -> Typology {
        Typology {
            id: id.into(),
            name: "Structuring / Smurfing".into(),
            description: String::new(),
            confidence: 0.98,
            related_transactions: related.iter().map(|c| TransactionId::from(*c)).collect(),
            rationale: vec![],
        }
    }

    fn txs(ids: &[&str]) -> Vec<Transaction> {
        ids.iter().map(|id| tx(id)).collect()
    }

    // -----------------------------------------------------------------------
    // Bidirectional lookups
    // -----------------------------------------------------------------------

    #[test]
    fn section_citations_are_inverse() {
        let index = CrossReferenceIndex::build(
            &txs(&["T1", "T2", "T3"]),
            &[],
            &[section("S", &["T1", "T3"])],
        )
        .unwrap();

        assert!(index.citations_for(&"T1".into()).unwrap().contains(&SectionId::from("S")));
        assert!(index.citations_for(&"T3".into()).unwrap().contains(&SectionId::from("S")));
        assert!(index.citations_for(&"T2".into()).unwrap().is_empty());
        assert_eq!(
            index.transactions_for(&"S".into()).unwrap(),
            [TransactionId::from("T1"), TransactionId::from("T3")]
        );
    }

    #[test]
    fn typology_links_both_ways() {
        let index = CrossReferenceIndex::build(
            &txs(&["TRX-8921", "TRX-8922", "TRX-8940"]),
            &[typology("TYP-01", &["TRX-8921", "TRX-8922"])],
            &[],
        )
        .unwrap();

        assert!(index
            .typologies_for(&"TRX-8921".into())
            .unwrap()
            .contains(&TypologyId::from("TYP-01")));
        assert!(index.typologies_for(&"TRX-8940".into()).unwrap().is_empty());
        assert!(index.citations_for(&"TRX-8921".into()).unwrap().is_empty());
        assert_eq!(
            index.refs(&"TRX-8922".into()).unwrap().typologies.len(),
            1
        );
    }

    #[test]
    fn repeated_citation_recorded_once_in_order() {
        let index = CrossReferenceIndex::build(
            &txs(&["T1", "T2"]),
            &[],
            &[section("S", &["T2", "T1", "T2"])],
        )
        .unwrap();
        assert_eq!(
            index.transactions_for(&"S".into()).unwrap(),
            [TransactionId::from("T2"), TransactionId::from("T1")]
        );
    }

    // -----------------------------------------------------------------------
    // Construction failures
    // -----------------------------------------------------------------------

    #[test]
    fn dangling_section_citation_fails() {
        let err = CrossReferenceIndex::build(&txs(&["T1"]), &[], &[section("S", &["T1", "T9"])])
            .unwrap_err();
        assert_eq!(
            err,
            IndexError::DanglingReference {
                referrer: Referrer::Section("S".into()),
                transaction: "T9".into(),
            }
        );
    }

    #[test]
    fn dangling_typology_reference_fails() {
        let err = CrossReferenceIndex::build(&txs(&["T1"]), &[typology("TYP-02", &["T7"])], &[])
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::DanglingReference { referrer: Referrer::Typology(_), .. }
        ));
    }

    #[test]
    fn duplicate_section_id_fails() {
        let err = CrossReferenceIndex::build(
            &txs(&["T1"]),
            &[],
            &[section("S", &["T1"]), section("S", &[])],
        )
        .unwrap_err();
        assert_eq!(err, IndexError::DuplicateSection("S".into()));
    }

    #[test]
    fn duplicate_typology_id_fails() {
        let err = CrossReferenceIndex::build(
            &txs(&["T1", "T2"]),
            &[typology("TYP-01", &["T1"]), typology("TYP-01", &["T2"])],
            &[],
        )
        .unwrap_err();
        assert_eq!(err, IndexError::DuplicateTypology("TYP-01".into()));
    }

    #[test]
    fn unknown_lookups_are_errors() {
        let index = CrossReferenceIndex::build(&txs(&["T1"]), &[], &[]).unwrap();
        assert!(matches!(
            index.citations_for(&"T404".into()),
            Err(IndexError::UnknownTransaction(_))
        ));
        assert!(matches!(
            index.transactions_for(&"S404".into()),
            Err(IndexError::UnknownSection(_))
        ));
    }

    #[test]
    fn referrer_display() {
        assert_eq!(Referrer::Section("sec-1".into()).to_string(), "section sec-1");
        assert_eq!(Referrer::Typology("TYP-01".into()).to_string(), "typology TYP-01");
    }

    // -----------------------------------------------------------------------
    // Inverse property
    // -----------------------------------------------------------------------

    proptest! {
        #[test]
        fn citations_for_is_exact_inverse(
            cites in proptest::collection::vec(proptest::collection::vec(0usize..8, 0..6), 0..5)
        ) {
            let ids: Vec<String> = (0..8).map(|i| format!("T{i}")).collect();
            let transactions: Vec<_> = ids.iter().map(|id| tx(id)).collect();
            let sections: Vec<_> = cites
                .iter()
                .enumerate()
                .map(|(n, picks)| NarrativeSection {
                    id: SectionId::from(format!("S{n}").as_str()),
                    title: String::new(),
                    body: String::new(),
                    citations: picks.iter().map(|&i| TransactionId::from(ids[i].as_str())).collect(),
                })
                .collect();

            let index = CrossReferenceIndex::build(&transactions, &[], &sections).unwrap();

            for s in &sections {
                for t in &transactions {
                    let forward = index.transactions_for(&s.id).unwrap().contains(&t.id);
                    let inverse = index.citations_for(&t.id).unwrap().contains(&s.id);
                    prop_assert_eq!(forward, inverse);
                    prop_assert_eq!(forward, s.citations.contains(&t.id));
                }
            }
        }
    }
}
