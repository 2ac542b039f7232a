//! Base dataset loader.
//!
//! Reads the cleaned GeoJSON FeatureCollection from disk and materializes it
//! as a DataFrame with the derived `year`, `lat`, `lon` columns. A missing or
//! unparseable file is fatal (the dashboard cannot serve anything without the
//! base dataset); individual malformed features are skipped and counted, in
//! line with the upstream cleaning rules.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use polars::datatypes::TimeUnit;
use polars::prelude::*;
use serde::Deserialize;
use tracing::debug;

use crate::error::AqError;
use crate::pollutants::Pollutant;
use crate::schema::measurements;

#[derive(Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    geometry: Option<Geometry>,
    properties: Option<Properties>,
}

#[derive(Deserialize)]
struct Geometry {
    coordinates: Option<Vec<f64>>,
}

#[derive(Deserialize)]
struct Properties {
    country: Option<String>,
    country_name_en: Option<String>,
    location: Option<String>,
    measurements_parameter: Option<String>,
    measurements_value: Option<f64>,
    measurements_unit: Option<String>,
    measurements_lastupdated: Option<String>,
}

/// Load the cleaned measurement dataset.
///
/// Every surviving row has a pollutant from the fixed enumeration, a
/// non-negative value, both coordinates, a country code, and a timestamp
/// that parsed to a calendar year.
pub fn load_features(path: &Path) -> Result<DataFrame, AqError> {
    let raw = fs::read_to_string(path)?;
    let collection: FeatureCollection = serde_json::from_str(&raw)?;

    let total = collection.features.len();
    let mut country: Vec<String> = Vec::new();
    let mut country_name: Vec<Option<String>> = Vec::new();
    let mut location: Vec<Option<String>> = Vec::new();
    let mut parameter: Vec<&'static str> = Vec::new();
    let mut value: Vec<f64> = Vec::new();
    let mut unit: Vec<Option<String>> = Vec::new();
    let mut last_updated: Vec<i64> = Vec::new();
    let mut year: Vec<i32> = Vec::new();
    let mut lat: Vec<f64> = Vec::new();
    let mut lon: Vec<f64> = Vec::new();

    for feature in collection.features {
        let Some(row) = extract_row(&feature) else {
            continue;
        };
        country.push(row.country);
        country_name.push(row.country_name);
        location.push(row.location);
        parameter.push(row.parameter.as_str());
        value.push(row.value);
        unit.push(row.unit);
        last_updated.push(row.timestamp_us);
        year.push(row.year);
        lat.push(row.lat);
        lon.push(row.lon);
    }

    debug!(
        kept = country.len(),
        skipped = total - country.len(),
        path = %path.display(),
        "base dataset loaded"
    );

    let df = df!(
        measurements::COUNTRY => country,
        measurements::COUNTRY_NAME_EN => country_name,
        measurements::LOCATION => location,
        measurements::PARAMETER => parameter,
        measurements::VALUE => value,
        measurements::UNIT => unit,
        measurements::LAST_UPDATED => last_updated,
        measurements::YEAR => year,
        measurements::LAT => lat,
        measurements::LON => lon,
    )?;

    let df = df
        .lazy()
        .with_columns([col(measurements::LAST_UPDATED)
            .cast(DataType::Datetime(TimeUnit::Microseconds, None))])
        .collect()?;

    Ok(df)
}

struct ExtractedRow {
    country: String,
    country_name: Option<String>,
    location: Option<String>,
    parameter: Pollutant,
    value: f64,
    unit: Option<String>,
    timestamp_us: i64,
    year: i32,
    lat: f64,
    lon: f64,
}

/// The single normalization point between raw features and the tabular
/// schema. Returns `None` for any feature that violates the row contract.
fn extract_row(feature: &Feature) -> Option<ExtractedRow> {
    let props = feature.properties.as_ref()?;
    let coords = feature.geometry.as_ref()?.coordinates.as_ref()?;
    if coords.len() != 2 {
        return None;
    }
    // GeoJSON stores [lon, lat].
    let (lon, lat) = (coords[0], coords[1]);
    if !lon.is_finite() || !lat.is_finite() {
        return None;
    }

    let parameter = Pollutant::parse(props.measurements_parameter.as_deref()?)?;
    let value = props.measurements_value?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }

    let country = props.country.as_deref()?.trim().to_string();
    if country.is_empty() {
        return None;
    }

    let (timestamp_us, year) = parse_timestamp(props.measurements_lastupdated.as_deref()?)?;

    Some(ExtractedRow {
        country,
        country_name: props.country_name_en.clone(),
        location: props.location.clone(),
        parameter,
        value,
        unit: props.measurements_unit.clone(),
        timestamp_us,
        year,
        lat,
        lon,
    })
}

/// Parse an ISO-8601-ish timestamp to (epoch microseconds, calendar year).
/// Accepts RFC 3339 and the common naive spellings; naive times read as UTC.
fn parse_timestamp(text: &str) -> Option<(i64, i32)> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        let utc = dt.with_timezone(&Utc);
        return Some((utc.timestamp_micros(), utc.year()));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            let utc = naive.and_utc();
            return Some((utc.timestamp_micros(), utc.year()));
        }
    }
    None
}
