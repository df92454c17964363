//! Dựng bảng kết quả: mỗi mốc một dòng, lược đồ cột cố định.

use std::collections::HashMap;

use crate::{
    Anchor, AnchorSet, MatchedRecord, Measurement, PanelConfig, PanelError, SeriesIndex,
    TIMESTAMP_FORMAT,
};

const ANCHOR_TYPE: &str = "cardiac_output";

const ANCHOR_COLUMNS: [&str; 11] = [
    "anchor_type",
    "subject_id",
    "hadm_id",
    "icustay_id",
    "anchor_time",
    "cardiac_output_value",
    "cardiac_output_unit",
    "cardiac_output_label",
    "cardiac_output_source",
    "cardiac_output_time",
    "cardiac_output_delta_minutes",
];

const MEASUREMENT_SUFFIXES: [&str; 6] = [
    "value",
    "unit",
    "label",
    "source",
    "time",
    "delta_minutes",
];

/// Các chỉ mục đã dựng sẵn cho từng luồng số đo; chỉ đọc sau khi dựng.
#[derive(Debug, Clone, Default)]
pub struct PanelSources {
    indices: HashMap<Measurement, SeriesIndex>,
}

impl PanelSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, measurement: Measurement, index: SeriesIndex) {
        self.indices.insert(measurement, index);
    }

    pub fn with(mut self, measurement: Measurement, index: SeriesIndex) -> Self {
        self.insert(measurement, index);
        self
    }

    pub fn get(&self, measurement: Measurement) -> Option<&SeriesIndex> {
        self.indices.get(&measurement)
    }
}

impl Extend<(Measurement, SeriesIndex)> for PanelSources {
    fn extend<I: IntoIterator<Item = (Measurement, SeriesIndex)>>(&mut self, iter: I) {
        self.indices.extend(iter);
    }
}

/// Một dòng kết quả: mốc cùng kết quả ghép cho mọi luồng theo `Measurement::ALL`.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub anchor: Anchor,
    matches: Vec<(Measurement, Option<MatchedRecord>)>,
}

impl PanelRow {
    /// Tên cột theo đúng thứ tự ghi ra file.
    pub fn header() -> Vec<String> {
        let mut columns: Vec<String> = ANCHOR_COLUMNS.iter().map(|c| c.to_string()).collect();
        for measurement in Measurement::ALL {
            for suffix in MEASUREMENT_SUFFIXES {
                columns.push(format!("{}_{suffix}", measurement.name()));
            }
        }
        columns
    }

    pub fn matched(&self, measurement: Measurement) -> Option<&MatchedRecord> {
        self.matches
            .iter()
            .find(|(m, _)| *m == measurement)
            .and_then(|(_, matched)| matched.as_ref())
    }

    /// Giá trị đã định dạng, cùng thứ tự với `PanelRow::header`.
    pub fn values(&self) -> Vec<String> {
        let anchor = &self.anchor;
        let anchor_time = anchor.time.format(TIMESTAMP_FORMAT).to_string();
        let mut values = vec![
            ANCHOR_TYPE.to_string(),
            anchor.key.subject_id.to_string(),
            anchor.key.hadm_id.to_string(),
            anchor.key.icustay_id.to_string(),
            anchor_time.clone(),
            format_optional(anchor.value),
            anchor.unit.clone(),
            anchor.label.clone(),
            anchor.source.clone(),
            anchor_time,
            format_number(0.0),
        ];

        for (_, matched) in &self.matches {
            match matched {
                Some(matched) => {
                    let record = &matched.record;
                    values.push(format_optional(record.value));
                    values.push(record.unit.clone());
                    values.push(record.label.clone());
                    values.push(record.source.clone());
                    values.push(record.time.format(TIMESTAMP_FORMAT).to_string());
                    values.push(format_number(round3(matched.delta_minutes())));
                }
                None => values.extend(MEASUREMENT_SUFFIXES.iter().map(|_| String::new())),
            }
        }
        values
    }

    /// Tra một ô theo tên cột.
    pub fn get(&self, column: &str) -> Option<String> {
        let position = Self::header().iter().position(|c| c == column)?;
        self.values().into_iter().nth(position)
    }
}

/// Bộ dựng dòng: luồng chưa được gán được điền "không khớp".
#[derive(Debug, Clone)]
pub struct PanelRowBuilder {
    anchor: Anchor,
    matches: HashMap<Measurement, MatchedRecord>,
}

impl PanelRowBuilder {
    pub fn new(anchor: Anchor) -> Self {
        Self {
            anchor,
            matches: HashMap::new(),
        }
    }

    pub fn set(&mut self, measurement: Measurement, matched: Option<MatchedRecord>) -> &mut Self {
        match matched {
            Some(matched) => {
                self.matches.insert(measurement, matched);
            }
            None => {
                self.matches.remove(&measurement);
            }
        }
        self
    }

    pub fn build(mut self) -> PanelRow {
        let matches = Measurement::ALL
            .into_iter()
            .map(|measurement| (measurement, self.matches.remove(&measurement)))
            .collect();
        PanelRow {
            anchor: self.anchor,
            matches,
        }
    }
}

/// Ghép mọi luồng cho từng mốc, giữ nguyên thứ tự của tập mốc.
///
/// Luồng không có chỉ mục trong `sources` được coi như rỗng.
pub fn assemble(
    anchors: &AnchorSet,
    sources: &PanelSources,
    config: &PanelConfig,
) -> Result<Vec<PanelRow>, PanelError> {
    if anchors.is_empty() {
        return Err(PanelError::EmptyAnchorSet);
    }

    let rows = anchors
        .iter()
        .map(|anchor| {
            let mut builder = PanelRowBuilder::new(anchor.clone());
            for measurement in Measurement::ALL {
                let tolerance = config.tolerance(measurement.group());
                let matched = sources
                    .get(measurement)
                    .and_then(|index| index.nearest(&anchor.key, anchor.time, tolerance));
                builder.set(measurement, matched);
            }
            builder.build()
        })
        .collect();

    Ok(rows)
}

/// Dạng số ngắn nhất còn khôi phục được, luôn có phần thập phân (`10.0`, `7.35`).
///
/// Dưới 1e-4 hoặc từ 1e16 trở lên dùng dạng mũ có dấu, tối thiểu hai chữ số (`5e-05`, `1e+16`).
pub fn format_number(value: f64) -> String {
    let text = format!("{value:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => text,
    }
}

fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
