use serde::Serialize;

use crate::domain::{AssayId, AssayKind};
use crate::error::KiraError;

pub const TOX21_ASSAYS: &[&str] = &[
    "tox21-ahr-p1",
    "tox21-ap1-agonist-p1",
    "tox21-ar-bla-agonist-p1",
    "tox21-ar-bla-antagonist-p1",
    "tox21-ar-mda-kb2-luc-agonist-p1",
    "tox21-ar-mda-kb2-luc-agonist-p3",
    "tox21-ar-mda-kb2-luc-antagonist-p1",
    "tox21-ar-mda-kb2-luc-antagonist-p2",
    "tox21-are-bla-p1",
    "tox21-aromatase-p1",
    "tox21-car-agonist-p1",
    "tox21-car-antagonist-p1",
    "tox21-casp3-cho-p1",
    "tox21-casp3-hepg2-p1",
    "tox21-dt40-p1",
    "tox21-elg1-luc-agonist-p1",
    "tox21-er-bla-agonist-p2",
    "tox21-er-bla-antagonist-p1",
    "tox21-er-luc-bg1-4e2-agonist-p2",
    "tox21-er-luc-bg1-4e2-agonist-p4",
    "tox21-er-luc-bg1-4e2-antagonist-p1",
    "tox21-er-luc-bg1-4e2-antagonist-p2",
    "tox21-erb-bla-antagonist-p1",
    "tox21-erb-bla-p1",
    "tox21-err-p1",
    "tox21-esre-bla-p1",
    "tox21-fxr-bla-agonist-p2",
    "tox21-fxr-bla-antagonist-p1",
    "tox21-gh3-tre-agonist-p1",
    "tox21-gh3-tre-antagonist-p1",
    "tox21-gr-hela-bla-agonist-p1",
    "tox21-gr-hela-bla-antagonist-p1",
    "tox21-h2ax-cho-p2",
    "tox21-hdac-p1",
    "tox21-hre-bla-agonist-p1",
    "tox21-hse-bla-p1",
    "tox21-luc-biochem-p1",
    "tox21-mitotox-p1",
    "tox21-nfkb-bla-agonist-p1",
    "tox21-p53-bla-p1",
    "tox21-pgc-err-p1",
    "tox21-ppard-bla-agonist-p1",
    "tox21-ppard-bla-antagonist-p1",
    "tox21-pparg-bla-agonist-p1",
    "tox21-pparg-bla-antagonist-p1",
    "tox21-pr-bla-agonist-p1",
    "tox21-pr-bla-antagonist-p1",
    "tox21-pxr-p1",
    "tox21-rar-agonist-p1",
    "tox21-rar-antagonist-p2",
    "tox21-ror-cho-antagonist-p1",
    "tox21-rt-viability-hek293-p1",
    "tox21-rt-viability-hepg2-p1",
    "tox21-rxr-bla-agonist-p1",
    "tox21-sbe-bla-agonist-p1",
    "tox21-sbe-bla-antagonist-p1",
    "tox21-shh-3t3-gli3-agonist-p1",
    "tox21-shh-3t3-gli3-antagonist-p1",
    "tox21-trhr-hek293-p1",
    "tox21-tshr-agonist-p1",
    "tox21-tshr-antagonist-p1",
    "tox21-tshr-wt-p1",
    "tox21-vdr-bla-agonist-p1",
    "tox21-vdr-bla-antagonist-p1",
];

/// Ordered, duplicate-free list of assays a run iterates over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    assays: Vec<AssayId>,
}

impl Catalog {
    pub fn tox21() -> Self {
        let assays = TOX21_ASSAYS
            .iter()
            .filter_map(|id| id.parse().ok())
            .collect();
        Self { assays }
    }

    /// Restricts the full catalog to `ids`, keeping catalog order.
    pub fn subset<S: AsRef<str>>(ids: &[S]) -> Result<Self, KiraError> {
        let wanted = ids
            .iter()
            .map(|id| id.as_ref().parse::<AssayId>())
            .collect::<Result<Vec<_>, KiraError>>()?;
        let assays = Self::tox21()
            .assays
            .into_iter()
            .filter(|assay| wanted.contains(assay))
            .collect();
        Ok(Self { assays })
    }

    pub fn len(&self) -> usize {
        self.assays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assays.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssayId> {
        self.assays.iter()
    }

    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.assays
            .iter()
            .map(|assay| CatalogEntry {
                assay: assay.clone(),
                kind: assay.kind(),
                column: assay.column_name(),
            })
            .collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::tox21()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry {
    pub assay: AssayId,
    pub kind: AssayKind,
    pub column: String,
}
