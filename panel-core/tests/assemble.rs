use chrono::NaiveDateTime;
use panel_core::{
    assemble, format_number, Anchor, AnchorSet, EntityKey, Measurement, PanelConfig, PanelError,
    PanelRow, PanelSources, Record, SeriesIndex, TIMESTAMP_FORMAT,
};

fn at(text: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).expect("Thời gian mẫu không hợp lệ")
}

fn anchor(key: EntityKey, time: &str) -> Anchor {
    Anchor {
        key,
        time: at(time),
        value: Some(4.2),
        unit: "L/min".to_string(),
        label: "Cardiac Output (thermodilution)".to_string(),
        source: "chartevents".to_string(),
    }
}

fn ph(time: &str, value: f64) -> Record {
    Record {
        time: at(time),
        value: Some(value),
        unit: "units".to_string(),
        label: "pH".to_string(),
        source: "labevents".to_string(),
    }
}

fn key() -> EntityKey {
    EntityKey::new(1, 10, 100)
}

#[test]
fn arterial_ph_within_window_is_matched() {
    let anchors = AnchorSet::new(vec![anchor(key(), "2021-01-01 08:00:00")]);
    let sources = PanelSources::new().with(
        Measurement::ArterialPh,
        SeriesIndex::build(vec![(key(), ph("2021-01-01 07:50:00", 7.35))]),
    );

    let rows = assemble(&anchors, &sources, &PanelConfig::default()).expect("Không dựng được bảng");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("arterial_ph_value").as_deref(), Some("7.35"));
    assert_eq!(rows[0].get("arterial_ph_delta_minutes").as_deref(), Some("10.0"));
    assert_eq!(
        rows[0].get("arterial_ph_time").as_deref(),
        Some("2021-01-01 07:50:00")
    );
    assert_eq!(rows[0].get("arterial_ph_source").as_deref(), Some("labevents"));
}

#[test]
fn arterial_ph_outside_window_is_empty() {
    let anchors = AnchorSet::new(vec![anchor(key(), "2021-01-01 08:00:00")]);
    let sources = PanelSources::new().with(
        Measurement::ArterialPh,
        SeriesIndex::build(vec![(key(), ph("2021-01-01 07:40:00", 7.35))]),
    );

    let rows = assemble(&anchors, &sources, &PanelConfig::default()).expect("Không dựng được bảng");

    assert_eq!(rows[0].get("arterial_ph_value").as_deref(), Some(""));
    assert_eq!(rows[0].get("arterial_ph_delta_minutes").as_deref(), Some(""));
    assert!(rows[0].matched(Measurement::ArterialPh).is_none());
}

#[test]
fn tolerance_groups_are_independent() {
    let anchors = AnchorSet::new(vec![anchor(key(), "2021-01-01 08:00:00")]);
    let hemoglobin = Record {
        label: "Hemoglobin".to_string(),
        ..ph("2021-01-01 02:00:00", 9.8)
    };
    let sources = PanelSources::new()
        .with(
            Measurement::Hemoglobin,
            SeriesIndex::build(vec![(key(), hemoglobin.clone())]),
        )
        .with(
            Measurement::ArterialSat,
            SeriesIndex::build(vec![(key(), hemoglobin)]),
        );

    let rows = assemble(&anchors, &sources, &PanelConfig::default()).expect("Không dựng được bảng");

    assert_eq!(rows[0].get("hemoglobin_value").as_deref(), Some("9.8"));
    assert_eq!(rows[0].get("hemoglobin_delta_minutes").as_deref(), Some("360.0"));
    assert_eq!(rows[0].get("arterial_sat_value").as_deref(), Some(""));
}

#[test]
fn one_row_per_anchor_in_key_then_time_order() {
    let other = EntityKey::new(0, 5, 50);
    let anchors = AnchorSet::new(vec![
        anchor(key(), "2021-01-01 09:00:00"),
        anchor(key(), "2021-01-01 08:00:00"),
        anchor(other, "2021-01-02 08:00:00"),
    ]);
    let sources = PanelSources::new().with(
        Measurement::ArterialPh,
        SeriesIndex::build(vec![(key(), ph("2021-01-01 08:05:00", 7.4))]),
    );

    let rows = assemble(&anchors, &sources, &PanelConfig::default()).expect("Không dựng được bảng");

    assert_eq!(rows.len(), 3);
    let order: Vec<_> = rows
        .iter()
        .map(|row| (row.anchor.key.subject_id, row.get("anchor_time").unwrap_or_default()))
        .collect();
    assert_eq!(
        order,
        vec![
            (0, "2021-01-02 08:00:00".to_string()),
            (1, "2021-01-01 08:00:00".to_string()),
            (1, "2021-01-01 09:00:00".to_string()),
        ]
    );
    assert_eq!(rows[1].get("arterial_ph_value").as_deref(), Some("7.4"));
    assert_eq!(rows[2].get("arterial_ph_value").as_deref(), Some(""));
}

#[test]
fn every_row_has_the_full_schema() {
    let anchors = AnchorSet::new(vec![
        anchor(key(), "2021-01-01 08:00:00"),
        anchor(EntityKey::new(-1, -1, -1), "2021-01-01 08:00:00"),
    ]);
    let sources = PanelSources::new().with(
        Measurement::Temperature,
        SeriesIndex::build(vec![(key(), ph("2021-01-01 08:00:00", 37.1))]),
    );

    let rows = assemble(&anchors, &sources, &PanelConfig::default()).expect("Không dựng được bảng");
    let header = PanelRow::header();

    assert_eq!(header.len(), 11 + 6 * Measurement::ALL.len());
    assert_eq!(header[0], "anchor_type");
    assert_eq!(header[11], "arterial_sat_value");
    assert_eq!(header.last().map(String::as_str), Some("cardiac_index_delta_minutes"));
    for row in &rows {
        assert_eq!(row.values().len(), header.len());
    }
    assert_eq!(rows[0].get("subject_id").as_deref(), Some("-1"));
    assert_eq!(rows[0].get("temperature_value").as_deref(), Some(""));
    assert_eq!(rows[1].get("temperature_value").as_deref(), Some("37.1"));
    assert_eq!(rows[1].get("temperature_delta_minutes").as_deref(), Some("0.0"));
}

#[test]
fn anchor_columns_describe_the_cardiac_output_reading() {
    let anchors = AnchorSet::new(vec![anchor(key(), "2021-01-01 08:00:00")]);
    let rows = assemble(&anchors, &PanelSources::new(), &PanelConfig::default())
        .expect("Không dựng được bảng");

    let values = rows[0].values();
    assert_eq!(
        &values[..11],
        &[
            "cardiac_output",
            "1",
            "10",
            "100",
            "2021-01-01 08:00:00",
            "4.2",
            "L/min",
            "Cardiac Output (thermodilution)",
            "chartevents",
            "2021-01-01 08:00:00",
            "0.0",
        ]
    );
    assert!(values[11..].iter().all(String::is_empty));
}

#[test]
fn empty_anchor_set_is_fatal() {
    let err = assemble(
        &AnchorSet::default(),
        &PanelSources::new(),
        &PanelConfig::default(),
    )
    .expect_err("Tập mốc rỗng phải báo lỗi");
    assert!(matches!(err, PanelError::EmptyAnchorSet));
}

#[test]
fn config_fills_missing_fields_with_defaults() {
    let config: PanelConfig =
        serde_json::from_str(r#"{"bloodgas_window_minutes": 5.0, "include_venous": false}"#)
            .expect("Không đọc được config");

    assert_eq!(config.bloodgas_window_minutes, 5.0);
    assert_eq!(config.hemoglobin_window_minutes, 720.0);
    assert!(!config.include_venous);
    assert!(config.validate().is_ok());

    let invalid = PanelConfig {
        temperature_window_minutes: -1.0,
        ..PanelConfig::default()
    };
    assert!(matches!(
        invalid.validate(),
        Err(PanelError::InvalidWindow { .. })
    ));
}

#[test]
fn numbers_keep_a_fraction_or_a_signed_exponent() {
    assert_eq!(format_number(10.0), "10.0");
    assert_eq!(format_number(7.35), "7.35");
    assert_eq!(format_number(0.0001), "0.0001");
    assert_eq!(format_number(0.00005), "5e-05");
    assert_eq!(format_number(1.5e-7), "1.5e-07");
    assert_eq!(format_number(1e15), "1000000000000000.0");
    assert_eq!(format_number(1e16), "1e+16");
    assert_eq!(format_number(-2.5e120), "-2.5e+120");
}
