//! Classification tables: which codes and specimens feed which stream.

use std::collections::{BTreeMap, BTreeSet};

use panel_core::Measurement;

/// Where a blood-gas specimen was drawn, as far as matching is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecimenSite {
    Arterial,
    Central,
}

/// Item codes and specimen prefixes used to route source rows.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceCatalog {
    pub cardiac_output_items: BTreeSet<i64>,
    pub cardiac_index_items: BTreeSet<i64>,
    pub arterial_items: BTreeMap<i64, Measurement>,
    pub central_items: BTreeMap<i64, Measurement>,
    pub arterial_prefixes: Vec<String>,
    pub central_prefixes: Vec<String>,
    pub venous_prefixes: Vec<String>,
}

impl Default for SourceCatalog {
    fn default() -> Self {
        Self {
            cardiac_output_items: [2136, 220088, 224604, 224842, 227543, 228117, 228369]
                .into_iter()
                .collect(),
            cardiac_index_items: [90, 116, 2135, 224368, 228368].into_iter().collect(),
            arterial_items: [
                (50817, Measurement::ArterialSat),
                (50818, Measurement::ArterialPco2),
                (50820, Measurement::ArterialPh),
            ]
            .into_iter()
            .collect(),
            central_items: [
                (50817, Measurement::CentralSat),
                (50818, Measurement::CentralPco2),
            ]
            .into_iter()
            .collect(),
            arterial_prefixes: vec!["ART".to_string()],
            central_prefixes: vec!["CENTRAL".to_string()],
            venous_prefixes: vec!["VEN".to_string()],
        }
    }
}

impl SourceCatalog {
    pub fn is_cardiac_output(&self, itemid: i64) -> bool {
        self.cardiac_output_items.contains(&itemid)
    }

    pub fn is_cardiac_index(&self, itemid: i64) -> bool {
        self.cardiac_index_items.contains(&itemid)
    }

    /// Prefix match on the upper-cased specimen type. Venous specimens count
    /// as central only when `include_venous` is set.
    pub fn classify_specimen(&self, specimen: &str, include_venous: bool) -> Option<SpecimenSite> {
        let specimen = specimen.trim().to_uppercase();
        let starts_with_any = |prefixes: &[String]| {
            prefixes
                .iter()
                .any(|prefix| specimen.starts_with(prefix.as_str()))
        };

        if starts_with_any(self.arterial_prefixes.as_slice()) {
            Some(SpecimenSite::Arterial)
        } else if starts_with_any(self.central_prefixes.as_slice())
            || (include_venous && starts_with_any(self.venous_prefixes.as_slice()))
        {
            Some(SpecimenSite::Central)
        } else {
            None
        }
    }

    /// Stream for a blood-gas item drawn at `site`, if the catalog tracks it.
    pub fn blood_gas_measurement(&self, site: SpecimenSite, itemid: i64) -> Option<Measurement> {
        let items = match site {
            SpecimenSite::Arterial => &self.arterial_items,
            SpecimenSite::Central => &self.central_items,
        };
        items.get(&itemid).copied()
    }
}
