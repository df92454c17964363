//! Source loaders. Anchor rows fail loudly; measurement rows are dropped and counted.

use std::collections::BTreeMap;
use std::io::Read;

use panel_core::{Anchor, AnchorSet, EntityKey, Measurement, PanelError, Record, SeriesIndex};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::catalog::SourceCatalog;
use crate::parse::{parse_item_code, parse_key, parse_timestamp, parse_value, RowIssue};

const CHARTEVENTS: &str = "chartevents";
const LABEVENTS: &str = "labevents";

const SWAN_COLUMNS: [&str; 5] = ["itemid", "subject_id", "hadm_id", "icustay_id", "charttime"];
const BLOOD_GAS_COLUMNS: [&str; 6] = [
    "itemid",
    "subject_id",
    "hadm_id",
    "icustay_id",
    "charttime",
    "specimen_type",
];
const HGB_TEMP_COLUMNS: [&str; 5] = [
    "measurement",
    "subject_id",
    "hadm_id",
    "icustay_id",
    "charttime",
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SwanRow {
    itemid: String,
    subject_id: String,
    hadm_id: String,
    icustay_id: String,
    charttime: String,
    valuenum: String,
    valueuom: String,
    label: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BloodGasRow {
    itemid: String,
    subject_id: String,
    hadm_id: String,
    icustay_id: String,
    charttime: String,
    valuenum: String,
    valueuom: String,
    lab_label: String,
    specimen_type: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HgbTempRow {
    measurement: String,
    subject_id: String,
    hadm_id: String,
    icustay_id: String,
    charttime: String,
    valuenum: String,
    valueuom: String,
    label: String,
    source_table: String,
}

/// Row accounting for one source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Data rows read, header excluded.
    pub read: usize,
    pub kept: usize,
    /// Rows that belonged to a stream but could not be parsed.
    pub dropped: usize,
    /// Rows that belong to no configured stream.
    pub ignored: usize,
}

impl LoadStats {
    fn report(&self, source: &str) {
        info!(
            source,
            read = self.read,
            kept = self.kept,
            dropped = self.dropped,
            ignored = self.ignored,
            "loaded source"
        );
        if self.dropped > 0 {
            warn!(source, dropped = self.dropped, "dropped malformed measurement rows");
        }
    }
}

/// Indices built from one source, one per stream the source feeds.
#[derive(Debug, Clone, Default)]
pub struct LoadedStreams {
    pub streams: Vec<(Measurement, SeriesIndex)>,
    pub stats: LoadStats,
}

impl LoadedStreams {
    pub fn index(&self, measurement: Measurement) -> Option<&SeriesIndex> {
        self.streams
            .iter()
            .find(|(m, _)| *m == measurement)
            .map(|(_, index)| index)
    }
}

#[derive(Default)]
struct StreamCollector {
    records: BTreeMap<Measurement, Vec<(EntityKey, Record)>>,
    stats: LoadStats,
}

impl StreamCollector {
    fn accept(
        &mut self,
        measurement: Measurement,
        line: u64,
        entry: Result<(EntityKey, Record), RowIssue>,
    ) {
        match entry {
            Ok(entry) => {
                self.stats.kept += 1;
                self.records.entry(measurement).or_default().push(entry);
            }
            Err(issue) => self.drop_row(line, issue),
        }
    }

    fn drop_row(&mut self, line: u64, issue: RowIssue) {
        self.stats.dropped += 1;
        debug!(line, %issue, "dropping measurement row");
    }

    fn ignore(&mut self) {
        self.stats.ignored += 1;
    }

    /// Every stream in `streams` gets an index, even when no row reached it.
    fn finish(mut self, source: &str, read: usize, streams: &[Measurement]) -> LoadedStreams {
        self.stats.read = read;
        self.stats.report(source);
        let streams = streams
            .iter()
            .map(|&measurement| {
                let records = self.records.remove(&measurement).unwrap_or_default();
                (measurement, SeriesIndex::build(records))
            })
            .collect();
        LoadedStreams {
            streams,
            stats: self.stats,
        }
    }
}

fn measurement_entry(
    ids: (&str, &str, &str),
    charttime: &str,
    valuenum: &str,
    unit: String,
    label: String,
    source: String,
) -> Result<(EntityKey, Record), RowIssue> {
    let key = parse_key(ids.0, ids.1, ids.2)?;
    let time = parse_timestamp(charttime)?;
    Ok((
        key,
        Record {
            time,
            value: parse_value(valuenum),
            unit,
            label,
            source,
        },
    ))
}

/// Cardiac-output anchors from the swan source, sorted by key then time.
///
/// Any malformed swan row is fatal, since its code may mark an anchor.
pub fn load_anchors<R: Read>(reader: R, catalog: &SourceCatalog) -> Result<AnchorSet, PanelError> {
    let rows: Vec<(u64, SwanRow)> = read_rows(reader, &SWAN_COLUMNS)?;
    let mut anchors = Vec::new();

    for (line, row) in rows {
        let fail = |issue: RowIssue| PanelError::AnchorRow {
            line,
            reason: issue.to_string(),
        };
        let itemid = parse_item_code(&row.itemid).map_err(fail)?;
        if !catalog.is_cardiac_output(itemid) {
            continue;
        }
        let key = parse_key(&row.subject_id, &row.hadm_id, &row.icustay_id).map_err(fail)?;
        let time = parse_timestamp(&row.charttime).map_err(fail)?;
        anchors.push(Anchor {
            key,
            time,
            value: parse_value(&row.valuenum),
            unit: row.valueuom,
            label: row.label,
            source: CHARTEVENTS.to_string(),
        });
    }

    info!(anchors = anchors.len(), "loaded cardiac output anchors");
    Ok(AnchorSet::new(anchors))
}

/// Cardiac-index stream from the swan source.
pub fn load_cardiac_index<R: Read>(
    reader: R,
    catalog: &SourceCatalog,
) -> Result<LoadedStreams, PanelError> {
    let rows: Vec<(u64, SwanRow)> = read_rows(reader, &SWAN_COLUMNS)?;
    let read = rows.len();
    let mut collector = StreamCollector::default();

    for (line, row) in rows {
        let itemid = match parse_item_code(&row.itemid) {
            Ok(itemid) => itemid,
            Err(issue) => {
                collector.drop_row(line, issue);
                continue;
            }
        };
        if !catalog.is_cardiac_index(itemid) {
            collector.ignore();
            continue;
        }
        let entry = measurement_entry(
            (&row.subject_id, &row.hadm_id, &row.icustay_id),
            &row.charttime,
            &row.valuenum,
            row.valueuom,
            row.label,
            CHARTEVENTS.to_string(),
        );
        collector.accept(Measurement::CardiacIndex, line, entry);
    }

    Ok(collector.finish("cardiac_index", read, &[Measurement::CardiacIndex]))
}

/// Arterial and central blood-gas streams, routed by specimen type and item code.
pub fn load_blood_gas<R: Read>(
    reader: R,
    catalog: &SourceCatalog,
    include_venous: bool,
) -> Result<LoadedStreams, PanelError> {
    let rows: Vec<(u64, BloodGasRow)> = read_rows(reader, &BLOOD_GAS_COLUMNS)?;
    let read = rows.len();
    let mut collector = StreamCollector::default();

    for (line, row) in rows {
        let Some(site) = catalog.classify_specimen(&row.specimen_type, include_venous) else {
            collector.ignore();
            continue;
        };
        let itemid = match parse_item_code(&row.itemid) {
            Ok(itemid) => itemid,
            Err(issue) => {
                collector.drop_row(line, issue);
                continue;
            }
        };
        let Some(measurement) = catalog.blood_gas_measurement(site, itemid) else {
            collector.ignore();
            continue;
        };
        let entry = measurement_entry(
            (&row.subject_id, &row.hadm_id, &row.icustay_id),
            &row.charttime,
            &row.valuenum,
            row.valueuom,
            row.lab_label,
            LABEVENTS.to_string(),
        );
        collector.accept(measurement, line, entry);
    }

    let mut streams: Vec<Measurement> = catalog
        .arterial_items
        .values()
        .chain(catalog.central_items.values())
        .copied()
        .collect();
    streams.sort();
    streams.dedup();

    Ok(collector.finish("blood_gas", read, &streams))
}

/// Hemoglobin and temperature streams, selected by the `measurement` column.
pub fn load_hemoglobin_temperature<R: Read>(reader: R) -> Result<LoadedStreams, PanelError> {
    let rows: Vec<(u64, HgbTempRow)> = read_rows(reader, &HGB_TEMP_COLUMNS)?;
    let read = rows.len();
    let mut collector = StreamCollector::default();

    for (line, row) in rows {
        let measurement = match row.measurement.trim().to_lowercase().as_str() {
            "hemoglobin" => Measurement::Hemoglobin,
            "temperature" => Measurement::Temperature,
            _ => {
                collector.ignore();
                continue;
            }
        };
        let entry = measurement_entry(
            (&row.subject_id, &row.hadm_id, &row.icustay_id),
            &row.charttime,
            &row.valuenum,
            row.valueuom,
            row.label,
            row.source_table,
        );
        collector.accept(measurement, line, entry);
    }

    Ok(collector.finish(
        "hemoglobin_temperature",
        read,
        &[Measurement::Hemoglobin, Measurement::Temperature],
    ))
}

/// Reads every data row with its 1-based line number. Short rows are padded
/// with empty fields; a missing required header is an error.
fn read_rows<R, T>(reader: R, required: &[&str]) -> Result<Vec<(u64, T)>, PanelError>
where
    R: Read,
    T: DeserializeOwned,
{
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);
    let headers = reader.headers().map_err(csv_error)?.clone();
    for column in required {
        if !headers.iter().any(|header| header == *column) {
            return Err(PanelError::MissingColumn(column.to_string()));
        }
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let line = record.position().map_or(0, |position| position.line());
        let row: T = record.deserialize(Some(&headers)).map_err(csv_error)?;
        rows.push((line, row));
    }
    Ok(rows)
}

pub(crate) fn csv_error(err: csv::Error) -> PanelError {
    PanelError::Csv(err.to_string())
}
