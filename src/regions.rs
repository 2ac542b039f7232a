//! Macro-region assignment and the AQLI dose-response model.
//!
//! The region mapping is total: any 2-letter code outside the table maps to
//! [`OTHER`]. Regional breakdowns treat that bucket as noise and exclude it.

use crate::pollutants::PM25_WHO_GUIDELINE;

/// Catch-all label for codes absent from the mapping table.
pub const OTHER: &str = "Other";

/// Years of life lost per µg/m³ of PM2.5 above the WHO guideline.
const YEARS_LOST_PER_UG: f64 = 0.098;

static REGION_TABLE: &[(&str, &str)] = &[
    // South Asia
    ("IN", "South Asia"),
    ("PK", "South Asia"),
    ("BD", "South Asia"),
    ("NP", "South Asia"),
    ("LK", "South Asia"),
    ("AF", "South Asia"),
    ("BT", "South Asia"),
    ("MV", "South Asia"),
    // East Asia
    ("CN", "East Asia"),
    ("JP", "East Asia"),
    ("KR", "East Asia"),
    ("KP", "East Asia"),
    ("TW", "East Asia"),
    ("MN", "East Asia"),
    ("HK", "East Asia"),
    ("MO", "East Asia"),
    // Southeast Asia
    ("TH", "Southeast Asia"),
    ("VN", "Southeast Asia"),
    ("ID", "Southeast Asia"),
    ("PH", "Southeast Asia"),
    ("MY", "Southeast Asia"),
    ("SG", "Southeast Asia"),
    ("MM", "Southeast Asia"),
    ("KH", "Southeast Asia"),
    ("LA", "Southeast Asia"),
    ("BN", "Southeast Asia"),
    ("TL", "Southeast Asia"),
    // Middle East
    ("SA", "Middle East"),
    ("AE", "Middle East"),
    ("IR", "Middle East"),
    ("IQ", "Middle East"),
    ("IL", "Middle East"),
    ("JO", "Middle East"),
    ("LB", "Middle East"),
    ("SY", "Middle East"),
    ("YE", "Middle East"),
    ("OM", "Middle East"),
    ("KW", "Middle East"),
    ("QA", "Middle East"),
    ("BH", "Middle East"),
    ("PS", "Middle East"),
    ("TR", "Middle East"),
    // Western Europe
    ("FR", "Western Europe"),
    ("DE", "Western Europe"),
    ("GB", "Western Europe"),
    ("IT", "Western Europe"),
    ("ES", "Western Europe"),
    ("PT", "Western Europe"),
    ("NL", "Western Europe"),
    ("BE", "Western Europe"),
    ("CH", "Western Europe"),
    ("AT", "Western Europe"),
    ("IE", "Western Europe"),
    ("LU", "Western Europe"),
    ("MC", "Western Europe"),
    ("LI", "Western Europe"),
    ("AD", "Western Europe"),
    // Northern Europe
    ("SE", "Northern Europe"),
    ("NO", "Northern Europe"),
    ("DK", "Northern Europe"),
    ("FI", "Northern Europe"),
    ("IS", "Northern Europe"),
    ("EE", "Northern Europe"),
    ("LV", "Northern Europe"),
    ("LT", "Northern Europe"),
    // Eastern Europe
    ("PL", "Eastern Europe"),
    ("CZ", "Eastern Europe"),
    ("SK", "Eastern Europe"),
    ("HU", "Eastern Europe"),
    ("RO", "Eastern Europe"),
    ("BG", "Eastern Europe"),
    ("UA", "Eastern Europe"),
    ("BY", "Eastern Europe"),
    ("MD", "Eastern Europe"),
    ("RU", "Eastern Europe"),
    // Southern Europe
    ("GR", "Southern Europe"),
    ("HR", "Southern Europe"),
    ("SI", "Southern Europe"),
    ("BA", "Southern Europe"),
    ("RS", "Southern Europe"),
    ("ME", "Southern Europe"),
    ("MK", "Southern Europe"),
    ("AL", "Southern Europe"),
    ("XK", "Southern Europe"),
    ("CY", "Southern Europe"),
    ("MT", "Southern Europe"),
    // North America
    ("US", "North America"),
    ("CA", "North America"),
    ("MX", "North America"),
    // Central America and the Caribbean
    ("GT", "Central America"),
    ("HN", "Central America"),
    ("SV", "Central America"),
    ("NI", "Central America"),
    ("CR", "Central America"),
    ("PA", "Central America"),
    ("BZ", "Central America"),
    ("CU", "Central America"),
    ("DO", "Central America"),
    ("HT", "Central America"),
    ("JM", "Central America"),
    ("TT", "Central America"),
    ("BB", "Central America"),
    ("BS", "Central America"),
    // South America
    ("BR", "South America"),
    ("AR", "South America"),
    ("CL", "South America"),
    ("CO", "South America"),
    ("PE", "South America"),
    ("VE", "South America"),
    ("EC", "South America"),
    ("BO", "South America"),
    ("PY", "South America"),
    ("UY", "South America"),
    ("GY", "South America"),
    ("SR", "South America"),
    ("GF", "South America"),
    // North Africa
    ("EG", "North Africa"),
    ("DZ", "North Africa"),
    ("MA", "North Africa"),
    ("TN", "North Africa"),
    ("LY", "North Africa"),
    ("SD", "North Africa"),
    // Sub-Saharan Africa (West)
    ("NG", "Sub-Saharan Africa"),
    ("GH", "Sub-Saharan Africa"),
    ("CI", "Sub-Saharan Africa"),
    ("SN", "Sub-Saharan Africa"),
    ("ML", "Sub-Saharan Africa"),
    ("BF", "Sub-Saharan Africa"),
    ("NE", "Sub-Saharan Africa"),
    ("GN", "Sub-Saharan Africa"),
    ("SL", "Sub-Saharan Africa"),
    ("LR", "Sub-Saharan Africa"),
    ("TG", "Sub-Saharan Africa"),
    ("BJ", "Sub-Saharan Africa"),
    // Sub-Saharan Africa (East)
    ("KE", "Sub-Saharan Africa"),
    ("TZ", "Sub-Saharan Africa"),
    ("UG", "Sub-Saharan Africa"),
    ("ET", "Sub-Saharan Africa"),
    ("SO", "Sub-Saharan Africa"),
    ("RW", "Sub-Saharan Africa"),
    ("BI", "Sub-Saharan Africa"),
    ("DJ", "Sub-Saharan Africa"),
    ("ER", "Sub-Saharan Africa"),
    ("SS", "Sub-Saharan Africa"),
    // Sub-Saharan Africa (South)
    ("ZA", "Sub-Saharan Africa"),
    ("ZW", "Sub-Saharan Africa"),
    ("ZM", "Sub-Saharan Africa"),
    ("MW", "Sub-Saharan Africa"),
    ("MZ", "Sub-Saharan Africa"),
    ("BW", "Sub-Saharan Africa"),
    ("NA", "Sub-Saharan Africa"),
    ("LS", "Sub-Saharan Africa"),
    ("SZ", "Sub-Saharan Africa"),
    ("AO", "Sub-Saharan Africa"),
    // Sub-Saharan Africa (Central)
    ("CD", "Sub-Saharan Africa"),
    ("CG", "Sub-Saharan Africa"),
    ("CM", "Sub-Saharan Africa"),
    ("CF", "Sub-Saharan Africa"),
    ("TD", "Sub-Saharan Africa"),
    ("GA", "Sub-Saharan Africa"),
    ("GQ", "Sub-Saharan Africa"),
    // Oceania
    ("AU", "Oceania"),
    ("NZ", "Oceania"),
    ("PG", "Oceania"),
    ("FJ", "Oceania"),
    ("SB", "Oceania"),
    ("VU", "Oceania"),
    ("NC", "Oceania"),
    ("PF", "Oceania"),
    ("WS", "Oceania"),
    ("TO", "Oceania"),
    ("KI", "Oceania"),
];

/// Macro-region for a 2-letter country code. Total and deterministic:
/// unmapped or malformed codes get the catch-all label.
pub fn region_for(alpha2: &str) -> &'static str {
    let code = alpha2.trim().to_ascii_uppercase();
    REGION_TABLE
        .iter()
        .find(|(c2, _)| *c2 == code)
        .map(|(_, region)| *region)
        .unwrap_or(OTHER)
}

/// Years of life expectancy lost for a PM2.5 concentration in µg/m³,
/// per the AQLI linear dose-response model, rounded to 2 decimals.
pub fn years_lost(pm25_concentration: f64) -> f64 {
    if pm25_concentration <= PM25_WHO_GUIDELINE {
        return 0.0;
    }
    let excess = pm25_concentration - PM25_WHO_GUIDELINE;
    (excess * YEARS_LOST_PER_UG * 100.0).round() / 100.0
}
