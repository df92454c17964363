//! CSV sources to matched-measurement panel, and the panel back to CSV.

mod catalog;
mod parse;
mod sources;
mod writer;

use std::fs::File;
use std::path::{Path, PathBuf};

use panel_core::{assemble, PanelConfig, PanelError, PanelRow, PanelSources};

pub use catalog::{SourceCatalog, SpecimenSite};
pub use parse::{parse_id, parse_timestamp, parse_value, RowIssue};
pub use sources::{
    load_anchors, load_blood_gas, load_cardiac_index, load_hemoglobin_temperature, LoadStats,
    LoadedStreams,
};
pub use writer::{write_panel, write_panel_file};

pub const BLOOD_GAS_FILE: &str = "cardiac_swan_blood_gases.csv";
pub const HGB_TEMP_FILE: &str = "cardiac_swan_hemoglobin_temperature.csv";
pub const SWAN_FILE: &str = "cardiac_swan_swanmeasures.csv";
pub const OUTPUT_FILE: &str = "cardiac_swan_matched_measurements.csv";

/// Locations of the three input sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFiles {
    pub swan: PathBuf,
    pub blood_gas: PathBuf,
    pub hgb_temp: PathBuf,
}

impl SourceFiles {
    /// Default file names under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            swan: dir.join(SWAN_FILE),
            blood_gas: dir.join(BLOOD_GAS_FILE),
            hgb_temp: dir.join(HGB_TEMP_FILE),
        }
    }
}

/// Load every source, build the per-stream indices and assemble one row per anchor.
pub fn build_panel(
    files: &SourceFiles,
    catalog: &SourceCatalog,
    config: &PanelConfig,
) -> Result<Vec<PanelRow>, PanelError> {
    config.validate()?;

    let anchors = load_anchors(open(&files.swan)?, catalog)?;
    if anchors.is_empty() {
        return Err(PanelError::EmptyAnchorSet);
    }

    let mut sources = PanelSources::new();
    let blood_gas = load_blood_gas(open(&files.blood_gas)?, catalog, config.include_venous)?;
    sources.extend(blood_gas.streams);
    sources.extend(load_hemoglobin_temperature(open(&files.hgb_temp)?)?.streams);
    sources.extend(load_cardiac_index(open(&files.swan)?, catalog)?.streams);

    assemble(&anchors, &sources, config)
}

fn open(path: &Path) -> Result<File, PanelError> {
    File::open(path).map_err(|err| PanelError::Io(format!("{}: {err}", path.display())))
}
