//! Column-name constants for the airq-aggkit schema.
//! Single source of truth - exported to Python via PyO3.

// ── Measurement columns (cleaned GeoJSON properties + derived) ──────────────
pub mod measurements {
    pub const COUNTRY: &str = "country";
    pub const COUNTRY_NAME_EN: &str = "country_name_en";
    pub const LOCATION: &str = "location";
    pub const PARAMETER: &str = "measurements_parameter";
    pub const VALUE: &str = "measurements_value";
    pub const UNIT: &str = "measurements_unit";
    pub const LAST_UPDATED: &str = "measurements_lastupdated";

    // Derived on load from the timestamp and the feature geometry.
    pub const YEAR: &str = "year";
    pub const LAT: &str = "lat";
    pub const LON: &str = "lon";
}

// ── World country reference columns ─────────────────────────────────────────
pub mod reference {
    pub const COUNTRY_ISO3: &str = "country_iso3";
    pub const COUNTRY_NAME: &str = "country_name";
}

// ── Aggregate output columns ────────────────────────────────────────────────
pub mod aggregate {
    pub const AVG_POLLUTION: &str = "avg_pollution";
    pub const COUNTRY_ISO3: &str = "country_iso3";

    pub const REGION: &str = "region";
    pub const YEARS_LOST: &str = "years_lost";
    pub const AVG_YEARS_LOST: &str = "avg_years_lost";
    pub const AVG_PM25: &str = "avg_pm25";
    pub const NB_MEASUREMENTS: &str = "nb_measurements";

    pub const PM25_BAND: &str = "pm25_band";
}
