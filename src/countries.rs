//! ISO 3166-1 country reference data.
//!
//! Backs both the 2-letter to 3-letter resolver and the exhaustive world
//! country table the choropleth merge joins against. The table is immutable
//! for the process lifetime, so lookups are memoized once in a `OnceLock`.

use std::collections::HashMap;
use std::sync::OnceLock;

use polars::prelude::*;

use crate::error::AqError;
use crate::schema::reference;

/// One ISO 3166-1 entry: alpha-2 code, alpha-3 code, English short name.
pub struct CountryRef {
    pub alpha2: &'static str,
    pub alpha3: &'static str,
    pub name: &'static str,
}

const fn c(alpha2: &'static str, alpha3: &'static str, name: &'static str) -> CountryRef {
    CountryRef {
        alpha2,
        alpha3,
        name,
    }
}

/// The full ISO 3166-1 assignment, unique by both codes.
pub static COUNTRIES: &[CountryRef] = &[
    c("AF", "AFG", "Afghanistan"),
    c("AX", "ALA", "Åland Islands"),
    c("AL", "ALB", "Albania"),
    c("DZ", "DZA", "Algeria"),
    c("AS", "ASM", "American Samoa"),
    c("AD", "AND", "Andorra"),
    c("AO", "AGO", "Angola"),
    c("AI", "AIA", "Anguilla"),
    c("AQ", "ATA", "Antarctica"),
    c("AG", "ATG", "Antigua and Barbuda"),
    c("AR", "ARG", "Argentina"),
    c("AM", "ARM", "Armenia"),
    c("AW", "ABW", "Aruba"),
    c("AU", "AUS", "Australia"),
    c("AT", "AUT", "Austria"),
    c("AZ", "AZE", "Azerbaijan"),
    c("BS", "BHS", "Bahamas"),
    c("BH", "BHR", "Bahrain"),
    c("BD", "BGD", "Bangladesh"),
    c("BB", "BRB", "Barbados"),
    c("BY", "BLR", "Belarus"),
    c("BE", "BEL", "Belgium"),
    c("BZ", "BLZ", "Belize"),
    c("BJ", "BEN", "Benin"),
    c("BM", "BMU", "Bermuda"),
    c("BT", "BTN", "Bhutan"),
    c("BO", "BOL", "Bolivia"),
    c("BQ", "BES", "Bonaire, Sint Eustatius and Saba"),
    c("BA", "BIH", "Bosnia and Herzegovina"),
    c("BW", "BWA", "Botswana"),
    c("BV", "BVT", "Bouvet Island"),
    c("BR", "BRA", "Brazil"),
    c("IO", "IOT", "British Indian Ocean Territory"),
    c("BN", "BRN", "Brunei Darussalam"),
    c("BG", "BGR", "Bulgaria"),
    c("BF", "BFA", "Burkina Faso"),
    c("BI", "BDI", "Burundi"),
    c("CV", "CPV", "Cabo Verde"),
    c("KH", "KHM", "Cambodia"),
    c("CM", "CMR", "Cameroon"),
    c("CA", "CAN", "Canada"),
    c("KY", "CYM", "Cayman Islands"),
    c("CF", "CAF", "Central African Republic"),
    c("TD", "TCD", "Chad"),
    c("CL", "CHL", "Chile"),
    c("CN", "CHN", "China"),
    c("CX", "CXR", "Christmas Island"),
    c("CC", "CCK", "Cocos (Keeling) Islands"),
    c("CO", "COL", "Colombia"),
    c("KM", "COM", "Comoros"),
    c("CG", "COG", "Congo"),
    c("CD", "COD", "Congo, Democratic Republic of the"),
    c("CK", "COK", "Cook Islands"),
    c("CR", "CRI", "Costa Rica"),
    c("CI", "CIV", "Côte d'Ivoire"),
    c("HR", "HRV", "Croatia"),
    c("CU", "CUB", "Cuba"),
    c("CW", "CUW", "Curaçao"),
    c("CY", "CYP", "Cyprus"),
    c("CZ", "CZE", "Czechia"),
    c("DK", "DNK", "Denmark"),
    c("DJ", "DJI", "Djibouti"),
    c("DM", "DMA", "Dominica"),
    c("DO", "DOM", "Dominican Republic"),
    c("EC", "ECU", "Ecuador"),
    c("EG", "EGY", "Egypt"),
    c("SV", "SLV", "El Salvador"),
    c("GQ", "GNQ", "Equatorial Guinea"),
    c("ER", "ERI", "Eritrea"),
    c("EE", "EST", "Estonia"),
    c("SZ", "SWZ", "Eswatini"),
    c("ET", "ETH", "Ethiopia"),
    c("FK", "FLK", "Falkland Islands (Malvinas)"),
    c("FO", "FRO", "Faroe Islands"),
    c("FJ", "FJI", "Fiji"),
    c("FI", "FIN", "Finland"),
    c("FR", "FRA", "France"),
    c("GF", "GUF", "French Guiana"),
    c("PF", "PYF", "French Polynesia"),
    c("TF", "ATF", "French Southern Territories"),
    c("GA", "GAB", "Gabon"),
    c("GM", "GMB", "Gambia"),
    c("GE", "GEO", "Georgia"),
    c("DE", "DEU", "Germany"),
    c("GH", "GHA", "Ghana"),
    c("GI", "GIB", "Gibraltar"),
    c("GR", "GRC", "Greece"),
    c("GL", "GRL", "Greenland"),
    c("GD", "GRD", "Grenada"),
    c("GP", "GLP", "Guadeloupe"),
    c("GU", "GUM", "Guam"),
    c("GT", "GTM", "Guatemala"),
    c("GG", "GGY", "Guernsey"),
    c("GN", "GIN", "Guinea"),
    c("GW", "GNB", "Guinea-Bissau"),
    c("GY", "GUY", "Guyana"),
    c("HT", "HTI", "Haiti"),
    c("HM", "HMD", "Heard Island and McDonald Islands"),
    c("VA", "VAT", "Holy See"),
    c("HN", "HND", "Honduras"),
    c("HK", "HKG", "Hong Kong"),
    c("HU", "HUN", "Hungary"),
    c("IS", "ISL", "Iceland"),
    c("IN", "IND", "India"),
    c("ID", "IDN", "Indonesia"),
    c("IR", "IRN", "Iran, Islamic Republic of"),
    c("IQ", "IRQ", "Iraq"),
    c("IE", "IRL", "Ireland"),
    c("IM", "IMN", "Isle of Man"),
    c("IL", "ISR", "Israel"),
    c("IT", "ITA", "Italy"),
    c("JM", "JAM", "Jamaica"),
    c("JP", "JPN", "Japan"),
    c("JE", "JEY", "Jersey"),
    c("JO", "JOR", "Jordan"),
    c("KZ", "KAZ", "Kazakhstan"),
    c("KE", "KEN", "Kenya"),
    c("KI", "KIR", "Kiribati"),
    c("KP", "PRK", "Korea, Democratic People's Republic of"),
    c("KR", "KOR", "Korea, Republic of"),
    c("KW", "KWT", "Kuwait"),
    c("KG", "KGZ", "Kyrgyzstan"),
    c("LA", "LAO", "Lao People's Democratic Republic"),
    c("LV", "LVA", "Latvia"),
    c("LB", "LBN", "Lebanon"),
    c("LS", "LSO", "Lesotho"),
    c("LR", "LBR", "Liberia"),
    c("LY", "LBY", "Libya"),
    c("LI", "LIE", "Liechtenstein"),
    c("LT", "LTU", "Lithuania"),
    c("LU", "LUX", "Luxembourg"),
    c("MO", "MAC", "Macao"),
    c("MG", "MDG", "Madagascar"),
    c("MW", "MWI", "Malawi"),
    c("MY", "MYS", "Malaysia"),
    c("MV", "MDV", "Maldives"),
    c("ML", "MLI", "Mali"),
    c("MT", "MLT", "Malta"),
    c("MH", "MHL", "Marshall Islands"),
    c("MQ", "MTQ", "Martinique"),
    c("MR", "MRT", "Mauritania"),
    c("MU", "MUS", "Mauritius"),
    c("YT", "MYT", "Mayotte"),
    c("MX", "MEX", "Mexico"),
    c("FM", "FSM", "Micronesia, Federated States of"),
    c("MD", "MDA", "Moldova, Republic of"),
    c("MC", "MCO", "Monaco"),
    c("MN", "MNG", "Mongolia"),
    c("ME", "MNE", "Montenegro"),
    c("MS", "MSR", "Montserrat"),
    c("MA", "MAR", "Morocco"),
    c("MZ", "MOZ", "Mozambique"),
    c("MM", "MMR", "Myanmar"),
    c("NA", "NAM", "Namibia"),
    c("NR", "NRU", "Nauru"),
    c("NP", "NPL", "Nepal"),
    c("NL", "NLD", "Netherlands"),
    c("NC", "NCL", "New Caledonia"),
    c("NZ", "NZL", "New Zealand"),
    c("NI", "NIC", "Nicaragua"),
    c("NE", "NER", "Niger"),
    c("NG", "NGA", "Nigeria"),
    c("NU", "NIU", "Niue"),
    c("NF", "NFK", "Norfolk Island"),
    c("MK", "MKD", "North Macedonia"),
    c("MP", "MNP", "Northern Mariana Islands"),
    c("NO", "NOR", "Norway"),
    c("OM", "OMN", "Oman"),
    c("PK", "PAK", "Pakistan"),
    c("PW", "PLW", "Palau"),
    c("PS", "PSE", "Palestine, State of"),
    c("PA", "PAN", "Panama"),
    c("PG", "PNG", "Papua New Guinea"),
    c("PY", "PRY", "Paraguay"),
    c("PE", "PER", "Peru"),
    c("PH", "PHL", "Philippines"),
    c("PN", "PCN", "Pitcairn"),
    c("PL", "POL", "Poland"),
    c("PT", "PRT", "Portugal"),
    c("PR", "PRI", "Puerto Rico"),
    c("QA", "QAT", "Qatar"),
    c("RE", "REU", "Réunion"),
    c("RO", "ROU", "Romania"),
    c("RU", "RUS", "Russian Federation"),
    c("RW", "RWA", "Rwanda"),
    c("BL", "BLM", "Saint Barthélemy"),
    c("SH", "SHN", "Saint Helena, Ascension and Tristan da Cunha"),
    c("KN", "KNA", "Saint Kitts and Nevis"),
    c("LC", "LCA", "Saint Lucia"),
    c("MF", "MAF", "Saint Martin (French part)"),
    c("PM", "SPM", "Saint Pierre and Miquelon"),
    c("VC", "VCT", "Saint Vincent and the Grenadines"),
    c("WS", "WSM", "Samoa"),
    c("SM", "SMR", "San Marino"),
    c("ST", "STP", "Sao Tome and Principe"),
    c("SA", "SAU", "Saudi Arabia"),
    c("SN", "SEN", "Senegal"),
    c("RS", "SRB", "Serbia"),
    c("SC", "SYC", "Seychelles"),
    c("SL", "SLE", "Sierra Leone"),
    c("SG", "SGP", "Singapore"),
    c("SX", "SXM", "Sint Maarten (Dutch part)"),
    c("SK", "SVK", "Slovakia"),
    c("SI", "SVN", "Slovenia"),
    c("SB", "SLB", "Solomon Islands"),
    c("SO", "SOM", "Somalia"),
    c("ZA", "ZAF", "South Africa"),
    c("GS", "SGS", "South Georgia and the South Sandwich Islands"),
    c("SS", "SSD", "South Sudan"),
    c("ES", "ESP", "Spain"),
    c("LK", "LKA", "Sri Lanka"),
    c("SD", "SDN", "Sudan"),
    c("SR", "SUR", "Suriname"),
    c("SJ", "SJM", "Svalbard and Jan Mayen"),
    c("SE", "SWE", "Sweden"),
    c("CH", "CHE", "Switzerland"),
    c("SY", "SYR", "Syrian Arab Republic"),
    c("TW", "TWN", "Taiwan, Province of China"),
    c("TJ", "TJK", "Tajikistan"),
    c("TZ", "TZA", "Tanzania, United Republic of"),
    c("TH", "THA", "Thailand"),
    c("TL", "TLS", "Timor-Leste"),
    c("TG", "TGO", "Togo"),
    c("TK", "TKL", "Tokelau"),
    c("TO", "TON", "Tonga"),
    c("TT", "TTO", "Trinidad and Tobago"),
    c("TN", "TUN", "Tunisia"),
    c("TR", "TUR", "Türkiye"),
    c("TM", "TKM", "Turkmenistan"),
    c("TC", "TCA", "Turks and Caicos Islands"),
    c("TV", "TUV", "Tuvalu"),
    c("UG", "UGA", "Uganda"),
    c("UA", "UKR", "Ukraine"),
    c("AE", "ARE", "United Arab Emirates"),
    c("GB", "GBR", "United Kingdom"),
    c("US", "USA", "United States"),
    c("UM", "UMI", "United States Minor Outlying Islands"),
    c("UY", "URY", "Uruguay"),
    c("UZ", "UZB", "Uzbekistan"),
    c("VU", "VUT", "Vanuatu"),
    c("VE", "VEN", "Venezuela"),
    c("VN", "VNM", "Viet Nam"),
    c("VG", "VGB", "Virgin Islands, British"),
    c("VI", "VIR", "Virgin Islands, U.S."),
    c("WF", "WLF", "Wallis and Futuna"),
    c("EH", "ESH", "Western Sahara"),
    c("YE", "YEM", "Yemen"),
    c("ZM", "ZMB", "Zambia"),
    c("ZW", "ZWE", "Zimbabwe"),
];

fn alpha2_index() -> &'static HashMap<&'static str, &'static CountryRef> {
    static INDEX: OnceLock<HashMap<&'static str, &'static CountryRef>> = OnceLock::new();
    INDEX.get_or_init(|| COUNTRIES.iter().map(|entry| (entry.alpha2, entry)).collect())
}

/// Resolve a 2-letter code to its reference entry.
///
/// Returns `None` for anything outside ISO 3166-1 instead of failing, so
/// call sites make an explicit keep-or-drop decision. Case-insensitive.
pub fn resolve(alpha2: &str) -> Option<&'static CountryRef> {
    let code = alpha2.trim().to_ascii_uppercase();
    alpha2_index().get(code.as_str()).copied()
}

/// Resolve a 2-letter code to the 3-letter equivalent.
pub fn iso2_to_iso3(alpha2: &str) -> Option<&'static str> {
    resolve(alpha2).map(|entry| entry.alpha3)
}

/// Build the world country reference frame: one row per ISO 3166-1 entry,
/// columns `country_iso3` and `country_name`, unique by `country_iso3`.
pub fn all_countries_frame() -> Result<DataFrame, AqError> {
    let iso3: Vec<&str> = COUNTRIES.iter().map(|entry| entry.alpha3).collect();
    let names: Vec<&str> = COUNTRIES.iter().map(|entry| entry.name).collect();
    let df = df!(
        reference::COUNTRY_ISO3 => iso3,
        reference::COUNTRY_NAME => names,
    )?;
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn resolves_known_codes() {
        assert_eq!(iso2_to_iso3("FR"), Some("FRA"));
        assert_eq!(iso2_to_iso3("US"), Some("USA"));
        assert_eq!(iso2_to_iso3("fr"), Some("FRA"));
        assert_eq!(resolve("DE").map(|e| e.name), Some("Germany"));
    }

    #[test]
    fn unknown_codes_resolve_to_none() {
        assert_eq!(iso2_to_iso3("ZZ"), None);
        assert_eq!(iso2_to_iso3(""), None);
        assert_eq!(iso2_to_iso3("FRA"), None);
    }

    #[test]
    fn table_is_unique_by_both_codes() {
        let mut seen2 = HashSet::new();
        let mut seen3 = HashSet::new();
        for entry in COUNTRIES {
            assert_eq!(entry.alpha2.len(), 2, "bad alpha2: {}", entry.alpha2);
            assert_eq!(entry.alpha3.len(), 3, "bad alpha3: {}", entry.alpha3);
            assert!(seen2.insert(entry.alpha2), "duplicate alpha2: {}", entry.alpha2);
            assert!(seen3.insert(entry.alpha3), "duplicate alpha3: {}", entry.alpha3);
        }
    }

    #[test]
    fn reference_frame_matches_table() {
        let df = all_countries_frame().unwrap();
        assert_eq!(df.height(), COUNTRIES.len());
        let unique = df
            .column(reference::COUNTRY_ISO3)
            .unwrap()
            .as_materialized_series()
            .n_unique()
            .unwrap();
        assert_eq!(unique, COUNTRIES.len());
    }
}
