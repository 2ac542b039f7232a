//! The fixed pollutant enumeration plus the static display lookups
//! (marker colors and qualitative level thresholds) used by the UI layer.
//!
//! Classification helpers never fail: anything outside the enumeration maps
//! to a neutral fallback (`NEUTRAL_COLOR` / `Level::Unknown`).

/// Hex color for unrecognized pollutants.
pub const NEUTRAL_COLOR: &str = "#6B7280";

/// WHO guideline for PM2.5 in µg/m³; concentrations at or below it cost
/// no life expectancy under the AQLI model.
pub const PM25_WHO_GUIDELINE: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pollutant {
    Pm25,
    Pm10,
    Co,
    No2,
    So2,
    O3,
}

impl Pollutant {
    pub const ALL: [Pollutant; 6] = [
        Pollutant::Pm25,
        Pollutant::Pm10,
        Pollutant::Co,
        Pollutant::No2,
        Pollutant::So2,
        Pollutant::O3,
    ];

    /// Canonical name as it appears in the cleaned dataset.
    pub fn as_str(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "PM2.5",
            Pollutant::Pm10 => "PM10",
            Pollutant::Co => "CO",
            Pollutant::No2 => "NO2",
            Pollutant::So2 => "SO2",
            Pollutant::O3 => "O3",
        }
    }

    /// Parse a dataset or API spelling ("PM2.5", "pm25", ...).
    pub fn parse(name: &str) -> Option<Pollutant> {
        match name.to_ascii_uppercase().as_str() {
            "PM2.5" | "PM25" => Some(Pollutant::Pm25),
            "PM10" => Some(Pollutant::Pm10),
            "CO" => Some(Pollutant::Co),
            "NO2" => Some(Pollutant::No2),
            "SO2" => Some(Pollutant::So2),
            "O3" => Some(Pollutant::O3),
            _ => None,
        }
    }

    /// Numeric parameter id used by the upstream API (v3).
    pub fn api_parameter_id(self) -> u32 {
        match self {
            Pollutant::Pm10 => 1,
            Pollutant::Pm25 => 2,
            Pollutant::No2 => 3,
            Pollutant::O3 => 4,
            Pollutant::So2 => 5,
            Pollutant::Co => 6,
        }
    }

    /// Hex color used for map markers and legend accents.
    pub fn color(self) -> &'static str {
        match self {
            Pollutant::Pm25 => "#EF4444",
            Pollutant::Pm10 => "#F97316",
            Pollutant::Co => "#A855F7",
            Pollutant::No2 => "#3B82F6",
            Pollutant::So2 => "#10B981",
            Pollutant::O3 => "#06B6D4",
        }
    }

    /// Qualitative level boundaries (good / moderate / poor upper bounds),
    /// in the pollutant's measurement unit.
    fn thresholds(self) -> [f64; 3] {
        match self {
            Pollutant::Pm25 => [15.0, 35.0, 55.0],
            Pollutant::Pm10 => [50.0, 100.0, 150.0],
            Pollutant::No2 => [40.0, 100.0, 200.0],
            Pollutant::So2 => [20.0, 80.0, 250.0],
            Pollutant::O3 => [100.0, 160.0, 240.0],
            Pollutant::Co => [4000.0, 10000.0, 20000.0],
        }
    }
}

/// Qualitative pollution level for a measured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Good,
    Moderate,
    Poor,
    VeryPoor,
    Unknown,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Good => "Good",
            Level::Moderate => "Moderate",
            Level::Poor => "Poor",
            Level::VeryPoor => "Very poor",
            Level::Unknown => "Unknown",
        }
    }
}

/// Color for a pollutant name, neutral gray when unrecognized.
pub fn color_for(name: &str) -> &'static str {
    Pollutant::parse(name).map_or(NEUTRAL_COLOR, Pollutant::color)
}

/// Classify a measured value against the pollutant's thresholds.
/// Unrecognized pollutants classify as `Unknown`, never an error.
pub fn level_for(name: &str, value: f64) -> Level {
    let Some(pollutant) = Pollutant::parse(name) else {
        return Level::Unknown;
    };
    let [good, moderate, poor] = pollutant.thresholds();
    if value <= good {
        Level::Good
    } else if value <= moderate {
        Level::Moderate
    } else if value <= poor {
        Level::Poor
    } else {
        Level::VeryPoor
    }
}
