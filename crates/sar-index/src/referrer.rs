use std::fmt;

use serde::{Deserialize, Serialize};
use sar_types::{SectionId, TypologyId};

/// Something that cites transactions.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Referrer {
    Section(SectionId),
    Typology(TypologyId),
}

impl fmt::Display for Referrer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Section(id) => write!(f, "section {id}"),
            Self::Typology(id) => write!(f, "typology {id}"),
        }
    }
}
