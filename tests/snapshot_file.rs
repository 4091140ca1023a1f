use chrono::{NaiveDateTime, TimeZone, Utc};
use fieldclimate_snapshot::client::{RawData, Station};
use fieldclimate_snapshot::season::{MemorySeasonStore, SeasonAccumulator, SeasonRecord};
use fieldclimate_snapshot::sensors;
use fieldclimate_snapshot::snapshot::{self, WeatherSnapshot};
use std::fs;
use tempfile::TempDir;

const STATION_RESPONSE: &str = r#"{
    "name": { "original": "03114DE5", "custom": "כוכב השחר" },
    "meta": {
        "rainCurrentDay": { "sum": 1.2 },
        "rain7d": { "vals": [3.14, 6.0, 1.2], "sum": 10.34 },
        "airTemperatureDailyMinimum": 7.5
    }
}"#;

const RAW_DATA_RESPONSE: &str = r#"{
    "dates": [
        "2026-01-28 10:15:00",
        "2026-01-28 10:30:00",
        "2026-01-28 10:45:00",
        "2026-01-28 11:00:00"
    ],
    "data": [
        {
            "name_original": "HC Air temperature",
            "values": { "avg": [13.9, 14.1, 14.0, 14.24], "max": [14.2, 14.6, 14.6, 14.4], "min": [13.5, 13.8, 13.9, 14.0] }
        },
        {
            "name_original": "U-sonic wind speed",
            "values": { "avg": [2.0, 2.5, 3.0, 2.5], "max": [5.0, 7.0, 6.0, 4.0] }
        },
        {
            "name_original": "U-sonic wind dir",
            "values": { "last": [180, 190, 200, 46] }
        },
        {
            "name_original": "Precipitation",
            "values": { "sum": [0.2, 0.4, 0.0, 0.6] }
        }
    ]
}"#;

fn now() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2026-01-28 11:05:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

#[test]
fn test_end_to_end_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("weather-data.json");

    let station: Station = serde_json::from_str(STATION_RESPONSE).unwrap();
    let raw: RawData = serde_json::from_str(RAW_DATA_RESPONSE).unwrap();
    let readings = sensors::extract(&station, &raw, now());

    let mut previous = SeasonRecord::baseline();
    previous.last_daily_rain = 6.0;
    let mut acc = SeasonAccumulator::new(MemorySeasonStore::new(Some(previous)));
    let update = acc.update(now().date(), readings.rain.today).unwrap();

    let generated_at = Utc.with_ymd_and_hms(2026, 1, 28, 9, 5, 0).unwrap();
    let snap = snapshot::assemble(&station, &readings, update.season_rain(), 25.0, generated_at);
    snap.write(&output).unwrap();

    let content = fs::read_to_string(&output).unwrap();
    assert!(content.contains("כוכב השחר"), "non-Latin text should be written unescaped");

    let written: WeatherSnapshot = serde_json::from_str(&content).unwrap();
    assert_eq!(snap, written);

    assert_eq!("2026-01-28T09:05:00Z", written.last_update);
    assert_eq!("כוכב השחר", written.station_name);
    assert_eq!(Some(14.2), written.temperature.current);
    assert_eq!(Some(14.6), written.temperature.max);
    assert_eq!(Some("10:30".to_owned()), written.temperature.max_time);
    assert_eq!(Some(13.5), written.temperature.min);
    assert_eq!(Some("10:15".to_owned()), written.temperature.min_time);
    assert_eq!(Some(9.0), written.wind.speed);
    assert_eq!(Some(25.2), written.wind.max);
    assert_eq!(Some("10:30".to_owned()), written.wind.max_time);
    assert_eq!(Some("צ-מז".to_owned()), written.wind.direction);
    assert_eq!(1.2, written.rain.today);
    assert_eq!(1.2, written.rain.last_hour);
    assert_eq!(10.3, written.rain.week);
    // 223.2 + 6.0 completed, 1.2 today, 25.0 before the station
    assert_eq!(255.4, written.rain.season);
    assert_eq!([0.0, 0.0, 0.0, 0.0, 3.1, 6.0, 1.2], written.rain.daily_7d);
}

#[test]
fn test_write_overwrites_previous_snapshot() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("weather-data.json");
    fs::write(&output, "stale contents that are longer than nothing at all").unwrap();

    let generated_at = Utc.with_ymd_and_hms(2026, 1, 28, 9, 5, 0).unwrap();
    let snap = snapshot::assemble(
        &Station::default(),
        &sensors::Readings::default(),
        0.0,
        25.0,
        generated_at,
    );
    snap.write(&output).unwrap();

    let written: WeatherSnapshot = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(snapshot::DEFAULT_STATION_NAME, written.station_name);
    assert_eq!(25.0, written.rain.season);
}
