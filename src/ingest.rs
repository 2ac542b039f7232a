//! Upstream API plumbing that the core owns: record normalization and the
//! pagination/backoff policy. The HTTP client itself is an external
//! collaborator; this module only decides what to do with its responses,
//! so the aggregation invariants stay isolated from upstream schema drift.

use std::time::Duration;

use serde_json::Value;

/// Page size used against the upstream API.
pub const PAGE_LIMIT: usize = 1000;

/// Minimum wait after a rate-limit response.
pub const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// A raw upstream measurement flattened to a fixed field set. Everything is
/// optional here; the loader's row contract decides what survives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMeasurement {
    pub country_code: Option<String>,
    pub country_name: Option<String>,
    pub location_name: Option<String>,
    pub parameter: Option<String>,
    pub unit: Option<String>,
    pub value: Option<f64>,
    pub last_updated: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

fn string_at(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Flatten one raw API measurement into [`RawMeasurement`].
///
/// The upstream endpoints disagree on nesting across versions: the country
/// may live under `location.country` (object or bare string) or at the
/// root; parameter name/units come from the `parameter` object or from the
/// first sensor; the timestamp is either a `datetime` object with a `utc`
/// field or a plain string. This is the single normalization point - no
/// aggregation code ever touches the raw shape.
pub fn normalize_record(m: &Value) -> RawMeasurement {
    let coords = m.get("coordinates");
    let lat = coords.and_then(|c| c.get("latitude")).and_then(Value::as_f64);
    let lon = coords.and_then(|c| c.get("longitude")).and_then(Value::as_f64);

    let location = m.get("location");
    let country_obj = location
        .and_then(|l| l.get("country"))
        .or_else(|| m.get("country"));
    let (country_code, country_name) = match country_obj {
        Some(Value::Object(map)) => (
            map.get("code").and_then(Value::as_str).map(str::to_string),
            map.get("name").and_then(Value::as_str).map(str::to_string),
        ),
        Some(Value::String(code)) => (Some(code.clone()), None),
        _ => (None, None),
    };

    let location_name = location
        .and_then(|l| l.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| string_at(m, "location_name"))
        .or_else(|| m.get("location").and_then(Value::as_str).map(str::to_string));

    let mut parameter = None;
    let mut unit = None;
    if let Some(param) = m.get("parameter") {
        parameter = string_at(param, "name");
        unit = string_at(param, "units");
    }
    if parameter.is_none() {
        if let Some(sensor) = m.get("sensors").and_then(|s| s.get(0)) {
            if let Some(sensor_param) = sensor.get("parameter") {
                parameter = string_at(sensor_param, "name");
                unit = string_at(sensor_param, "units");
            }
        }
    }

    let last_updated = match m.get("datetime") {
        Some(Value::Object(map)) => map.get("utc").and_then(Value::as_str).map(str::to_string),
        Some(Value::String(text)) => Some(text.clone()),
        _ => None,
    };

    RawMeasurement {
        country_code,
        country_name,
        location_name,
        parameter,
        unit,
        value: m.get("value").and_then(Value::as_f64),
        last_updated,
        lat,
        lon,
    }
}

/// What to do after one page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStep {
    Continue { next_page: u32 },
    Done,
}

/// Pagination state for one paginated listing.
///
/// Fetching stops when a page comes back empty or short, or when the
/// cumulative count reaches the server-reported `meta.found` total.
#[derive(Debug, Clone)]
pub struct PagePlan {
    limit: usize,
    page: u32,
    fetched: usize,
}

impl Default for PagePlan {
    fn default() -> Self {
        Self::new(PAGE_LIMIT)
    }
}

impl PagePlan {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            page: 1,
            fetched: 0,
        }
    }

    /// Page number to request next (1-based).
    pub fn current_page(&self) -> u32 {
        self.page
    }

    /// Total records accepted so far.
    pub fn fetched(&self) -> usize {
        self.fetched
    }

    /// Record one received page and decide whether to continue.
    /// `found` is the server's `meta.found` total when present.
    pub fn record_page(&mut self, received: usize, found: Option<usize>) -> PageStep {
        self.fetched += received;
        if received < self.limit {
            return PageStep::Done;
        }
        if let Some(total) = found {
            if self.fetched >= total {
                return PageStep::Done;
            }
        }
        self.page += 1;
        PageStep::Continue {
            next_page: self.page,
        }
    }
}

/// Policy for an upstream HTTP status.
///
/// 429 gets a bounded retry with a fixed minimum backoff; any other
/// non-success status ends the listing early rather than retrying (the
/// partial result is served, logged upstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDisposition {
    Accept,
    RetryAfter(Duration),
    GiveUp,
}

pub fn disposition_for_status(status: u16) -> FetchDisposition {
    match status {
        200 => FetchDisposition::Accept,
        429 => FetchDisposition::RetryAfter(RATE_LIMIT_BACKOFF),
        _ => FetchDisposition::GiveUp,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_nested_location_shape() {
        let raw = json!({
            "value": 12.5,
            "coordinates": {"latitude": 48.85, "longitude": 2.35},
            "location": {"name": "Paris Centre", "country": {"code": "FR", "name": "France"}},
            "parameter": {"name": "pm25", "units": "µg/m³"},
            "datetime": {"utc": "2020-06-01T10:00:00Z", "local": "2020-06-01T12:00:00+02:00"}
        });
        let record = normalize_record(&raw);
        assert_eq!(record.country_code.as_deref(), Some("FR"));
        assert_eq!(record.country_name.as_deref(), Some("France"));
        assert_eq!(record.location_name.as_deref(), Some("Paris Centre"));
        assert_eq!(record.parameter.as_deref(), Some("pm25"));
        assert_eq!(record.unit.as_deref(), Some("µg/m³"));
        assert_eq!(record.value, Some(12.5));
        assert_eq!(record.last_updated.as_deref(), Some("2020-06-01T10:00:00Z"));
        assert_eq!(record.lat, Some(48.85));
        assert_eq!(record.lon, Some(2.35));
    }

    #[test]
    fn normalizes_flat_shape_with_sensor_parameter() {
        let raw = json!({
            "value": 30.0,
            "country": "US",
            "location_name": "NYC Station",
            "sensors": [{"name": "sensor-1", "parameter": {"name": "no2", "units": "ppm"}}],
            "datetime": "2021-01-15T08:30:00Z"
        });
        let record = normalize_record(&raw);
        assert_eq!(record.country_code.as_deref(), Some("US"));
        assert_eq!(record.country_name, None);
        assert_eq!(record.location_name.as_deref(), Some("NYC Station"));
        assert_eq!(record.parameter.as_deref(), Some("no2"));
        assert_eq!(record.unit.as_deref(), Some("ppm"));
        assert_eq!(record.last_updated.as_deref(), Some("2021-01-15T08:30:00Z"));
    }

    #[test]
    fn missing_fields_normalize_to_none() {
        let record = normalize_record(&json!({}));
        assert_eq!(record, RawMeasurement::default());
    }

    #[test]
    fn pagination_stops_on_short_page() {
        let mut plan = PagePlan::new(1000);
        assert_eq!(
            plan.record_page(1000, Some(2500)),
            PageStep::Continue { next_page: 2 }
        );
        assert_eq!(
            plan.record_page(1000, Some(2500)),
            PageStep::Continue { next_page: 3 }
        );
        assert_eq!(plan.record_page(500, Some(2500)), PageStep::Done);
        assert_eq!(plan.fetched(), 2500);
    }

    #[test]
    fn pagination_stops_when_found_total_reached() {
        let mut plan = PagePlan::new(1000);
        assert_eq!(
            plan.record_page(1000, Some(2000)),
            PageStep::Continue { next_page: 2 }
        );
        assert_eq!(plan.record_page(1000, Some(2000)), PageStep::Done);
    }

    #[test]
    fn pagination_stops_on_empty_page() {
        let mut plan = PagePlan::default();
        assert_eq!(plan.record_page(0, None), PageStep::Done);
    }

    #[test]
    fn status_dispositions() {
        assert_eq!(disposition_for_status(200), FetchDisposition::Accept);
        assert_eq!(
            disposition_for_status(429),
            FetchDisposition::RetryAfter(RATE_LIMIT_BACKOFF)
        );
        assert_eq!(disposition_for_status(500), FetchDisposition::GiveUp);
        assert_eq!(disposition_for_status(404), FetchDisposition::GiveUp);
    }
}
