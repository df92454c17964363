//! Logic lõi ghép số đo quanh các mốc cung lượng tim (cardiac output).

mod panel;
mod series;

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub use panel::{assemble, format_number, PanelRow, PanelRowBuilder, PanelSources};
pub use series::{MatchedRecord, SeriesIndex};

/// Định dạng thời gian dùng cho cả dữ liệu vào lẫn bảng kết quả.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Giá trị thay thế khi thiếu mã bệnh nhân / nhập viện / lượt ICU.
pub const MISSING_ID: i64 = -1;

/// Khóa định danh một lượt nằm ICU: (bệnh nhân, nhập viện, lượt ICU).
///
/// Thứ tự khai báo trường quyết định thứ tự sắp xếp của mốc.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityKey {
    pub subject_id: i64,
    pub hadm_id: i64,
    pub icustay_id: i64,
}

impl EntityKey {
    pub fn new(subject_id: i64, hadm_id: i64, icustay_id: i64) -> Self {
        Self {
            subject_id,
            hadm_id,
            icustay_id,
        }
    }
}

/// Một quan sát có dấu thời gian thuộc một lượt ICU.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Record {
    pub time: NaiveDateTime,
    pub value: Option<f64>,
    pub unit: String,
    pub label: String,
    pub source: String,
}

/// Mốc cung lượng tim: điểm neo cho một dòng kết quả.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anchor {
    pub key: EntityKey,
    pub time: NaiveDateTime,
    pub value: Option<f64>,
    pub unit: String,
    pub label: String,
    pub source: String,
}

/// Tập mốc đã sắp xếp theo (bệnh nhân, nhập viện, lượt ICU, thời gian).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorSet {
    anchors: Vec<Anchor>,
}

impl AnchorSet {
    /// Sắp xếp ổn định; các mốc trùng khóa và trùng giờ giữ nguyên thứ tự đọc vào.
    pub fn new(mut anchors: Vec<Anchor>) -> Self {
        anchors.sort_by_key(|anchor| (anchor.key, anchor.time));
        Self { anchors }
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anchor> {
        self.anchors.iter()
    }

    pub fn as_slice(&self) -> &[Anchor] {
        &self.anchors
    }
}

impl FromIterator<Anchor> for AnchorSet {
    fn from_iter<I: IntoIterator<Item = Anchor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Nhóm dung sai thời gian, mỗi nhóm cấu hình độc lập.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceGroup {
    BloodGas,
    Hemoglobin,
    Temperature,
    CardiacIndex,
}

/// Các luồng số đo được ghép vào bảng, theo đúng thứ tự cột đầu ra.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Measurement {
    ArterialSat,
    ArterialPco2,
    ArterialPh,
    CentralSat,
    CentralPco2,
    Hemoglobin,
    Temperature,
    CardiacIndex,
}

impl Measurement {
    pub const ALL: [Measurement; 8] = [
        Measurement::ArterialSat,
        Measurement::ArterialPco2,
        Measurement::ArterialPh,
        Measurement::CentralSat,
        Measurement::CentralPco2,
        Measurement::Hemoglobin,
        Measurement::Temperature,
        Measurement::CardiacIndex,
    ];

    /// Tiền tố tên cột trong bảng kết quả.
    pub fn name(self) -> &'static str {
        match self {
            Measurement::ArterialSat => "arterial_sat",
            Measurement::ArterialPco2 => "arterial_pco2",
            Measurement::ArterialPh => "arterial_ph",
            Measurement::CentralSat => "central_sat",
            Measurement::CentralPco2 => "central_pco2",
            Measurement::Hemoglobin => "hemoglobin",
            Measurement::Temperature => "temperature",
            Measurement::CardiacIndex => "cardiac_index",
        }
    }

    pub fn group(self) -> ToleranceGroup {
        match self {
            Measurement::ArterialSat
            | Measurement::ArterialPco2
            | Measurement::ArterialPh
            | Measurement::CentralSat
            | Measurement::CentralPco2 => ToleranceGroup::BloodGas,
            Measurement::Hemoglobin => ToleranceGroup::Hemoglobin,
            Measurement::Temperature => ToleranceGroup::Temperature,
            Measurement::CardiacIndex => ToleranceGroup::CardiacIndex,
        }
    }
}

/// Cấu hình cửa sổ dung sai (phút) và lựa chọn mẫu tĩnh mạch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PanelConfig {
    pub bloodgas_window_minutes: f64,
    pub hemoglobin_window_minutes: f64,
    pub temperature_window_minutes: f64,
    pub cardiac_index_window_minutes: f64,
    /// Chấp nhận mẫu tĩnh mạch (VEN) thay cho mẫu trung tâm.
    pub include_venous: bool,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            bloodgas_window_minutes: 15.0,
            hemoglobin_window_minutes: 720.0,
            temperature_window_minutes: 30.0,
            cardiac_index_window_minutes: 15.0,
            include_venous: true,
        }
    }
}

impl PanelConfig {
    pub fn window_minutes(&self, group: ToleranceGroup) -> f64 {
        match group {
            ToleranceGroup::BloodGas => self.bloodgas_window_minutes,
            ToleranceGroup::Hemoglobin => self.hemoglobin_window_minutes,
            ToleranceGroup::Temperature => self.temperature_window_minutes,
            ToleranceGroup::CardiacIndex => self.cardiac_index_window_minutes,
        }
    }

    /// Dung sai của nhóm, làm tròn tới mili giây.
    pub fn tolerance(&self, group: ToleranceGroup) -> Duration {
        Duration::milliseconds((self.window_minutes(group) * 60_000.0).round() as i64)
    }

    /// Từ chối cửa sổ âm hoặc không hữu hạn.
    pub fn validate(&self) -> Result<(), PanelError> {
        for group in [
            ToleranceGroup::BloodGas,
            ToleranceGroup::Hemoglobin,
            ToleranceGroup::Temperature,
            ToleranceGroup::CardiacIndex,
        ] {
            let minutes = self.window_minutes(group);
            if !minutes.is_finite() || minutes < 0.0 {
                return Err(PanelError::InvalidWindow { group, minutes });
            }
        }
        Ok(())
    }
}

/// Lỗi chung khi dựng bảng ghép số đo.
#[derive(Debug, thiserror::Error)]
pub enum PanelError {
    #[error("Không tìm thấy mốc cung lượng tim nào")]
    EmptyAnchorSet,
    #[error("Dòng mốc {line} không hợp lệ: {reason}")]
    AnchorRow { line: u64, reason: String },
    #[error("Thiếu cột bắt buộc: {0}")]
    MissingColumn(String),
    #[error("Cửa sổ dung sai {group:?} không hợp lệ: {minutes} phút")]
    InvalidWindow { group: ToleranceGroup, minutes: f64 },
    #[error("Không đọc/ghi được CSV: {0}")]
    Csv(String),
    #[error("Lỗi vào/ra: {0}")]
    Io(String),
}

impl From<std::io::Error> for PanelError {
    fn from(err: std::io::Error) -> Self {
        PanelError::Io(err.to_string())
    }
}
