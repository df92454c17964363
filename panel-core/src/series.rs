//! Chỉ mục chuỗi thời gian theo lượt ICU và tìm bản ghi gần nhất.

use std::collections::HashMap;

use chrono::{Duration, NaiveDateTime};

use crate::{EntityKey, Record};

/// Bản ghi được chọn kèm độ lệch tuyệt đối so với mốc.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedRecord {
    pub record: Record,
    pub delta: Duration,
}

impl MatchedRecord {
    /// Độ lệch tính bằng phút, chưa làm tròn.
    pub fn delta_minutes(&self) -> f64 {
        self.delta.num_milliseconds() as f64 / 60_000.0
    }
}

/// Ánh xạ khóa lượt ICU -> dãy bản ghi tăng dần theo thời gian.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeriesIndex {
    buckets: HashMap<EntityKey, Vec<Record>>,
}

impl SeriesIndex {
    /// Gom nhóm theo khóa rồi sắp xếp ổn định theo thời gian.
    pub fn build<I>(records: I) -> Self
    where
        I: IntoIterator<Item = (EntityKey, Record)>,
    {
        let mut buckets: HashMap<EntityKey, Vec<Record>> = HashMap::new();
        for (key, record) in records {
            buckets.entry(key).or_default().push(record);
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by_key(|record| record.time);
        }
        Self { buckets }
    }

    pub fn bucket(&self, key: &EntityKey) -> Option<&[Record]> {
        self.buckets.get(key).map(Vec::as_slice)
    }

    /// Số lượt ICU có dữ liệu.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Tìm bản ghi gần `target` nhất trong cùng lượt ICU.
    ///
    /// Chỉ xét hai ứng viên quanh điểm chèn trái nhất. Khi hai ứng viên cách đều,
    /// bản ghi sớm hơn được chọn. Độ lệch bằng đúng `tolerance` vẫn được chấp nhận.
    pub fn nearest(
        &self,
        key: &EntityKey,
        target: NaiveDateTime,
        tolerance: Duration,
    ) -> Option<MatchedRecord> {
        let bucket = self.buckets.get(key)?;
        let idx = bucket.partition_point(|record| record.time < target);

        let mut best: Option<(&Record, Duration)> = None;
        for candidate in [idx.checked_sub(1), Some(idx)].into_iter().flatten() {
            let Some(record) = bucket.get(candidate) else {
                continue;
            };
            let delta = abs_delta(record.time, target);
            if best.map_or(true, |(_, best_delta)| delta < best_delta) {
                best = Some((record, delta));
            }
        }

        let (record, delta) = best?;
        if delta > tolerance {
            return None;
        }

        Some(MatchedRecord {
            record: record.clone(),
            delta,
        })
    }
}

impl FromIterator<(EntityKey, Record)> for SeriesIndex {
    fn from_iter<I: IntoIterator<Item = (EntityKey, Record)>>(iter: I) -> Self {
        Self::build(iter)
    }
}

fn abs_delta(a: NaiveDateTime, b: NaiveDateTime) -> Duration {
    if a >= b {
        a - b
    } else {
        b - a
    }
}
