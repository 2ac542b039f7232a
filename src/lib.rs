use pyo3::prelude::*;
use pyo3::types::PyModule;

pub mod cache;
pub mod countries;
pub mod error;
pub mod ingest;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod pollutants;
pub mod regions;
pub mod schema;
pub mod session;

use model::AirQualityModel;
use session::PollutantSelection;

/// Export schema constants as Python submodules
fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
    // Measurements
    let measurements = PyModule::new(m.py(), "measurements")?;
    measurements.add("COUNTRY", schema::measurements::COUNTRY)?;
    measurements.add("COUNTRY_NAME_EN", schema::measurements::COUNTRY_NAME_EN)?;
    measurements.add("LOCATION", schema::measurements::LOCATION)?;
    measurements.add("PARAMETER", schema::measurements::PARAMETER)?;
    measurements.add("VALUE", schema::measurements::VALUE)?;
    measurements.add("UNIT", schema::measurements::UNIT)?;
    measurements.add("LAST_UPDATED", schema::measurements::LAST_UPDATED)?;
    measurements.add("YEAR", schema::measurements::YEAR)?;
    measurements.add("LAT", schema::measurements::LAT)?;
    measurements.add("LON", schema::measurements::LON)?;
    m.add_submodule(&measurements)?;

    // Reference
    let reference = PyModule::new(m.py(), "reference")?;
    reference.add("COUNTRY_ISO3", schema::reference::COUNTRY_ISO3)?;
    reference.add("COUNTRY_NAME", schema::reference::COUNTRY_NAME)?;
    m.add_submodule(&reference)?;

    // Aggregates
    let aggregate = PyModule::new(m.py(), "aggregate")?;
    aggregate.add("AVG_POLLUTION", schema::aggregate::AVG_POLLUTION)?;
    aggregate.add("COUNTRY_ISO3", schema::aggregate::COUNTRY_ISO3)?;
    aggregate.add("REGION", schema::aggregate::REGION)?;
    aggregate.add("YEARS_LOST", schema::aggregate::YEARS_LOST)?;
    aggregate.add("AVG_YEARS_LOST", schema::aggregate::AVG_YEARS_LOST)?;
    aggregate.add("AVG_PM25", schema::aggregate::AVG_PM25)?;
    aggregate.add("NB_MEASUREMENTS", schema::aggregate::NB_MEASUREMENTS)?;
    aggregate.add("PM25_BAND", schema::aggregate::PM25_BAND)?;
    m.add_submodule(&aggregate)?;

    Ok(())
}

/// Hex color for a pollutant name; neutral gray when unrecognized.
#[pyfunction]
fn pollutant_color(name: &str) -> String {
    pollutants::color_for(name).to_string()
}

/// Qualitative pollution level for a measured value; "Unknown" when the
/// pollutant is not in the enumeration.
#[pyfunction]
fn pollution_level(name: &str, value: f64) -> String {
    pollutants::level_for(name, value).as_str().to_string()
}

/// Years of life lost for a PM2.5 concentration per the AQLI model.
#[pyfunction]
fn years_lost(pm25_concentration: f64) -> f64 {
    regions::years_lost(pm25_concentration)
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<AirQualityModel>()?;
    m.add_class::<PollutantSelection>()?;
    m.add_function(wrap_pyfunction!(pollutant_color, m)?)?;
    m.add_function(wrap_pyfunction!(pollution_level, m)?)?;
    m.add_function(wrap_pyfunction!(years_lost, m)?)?;
    add_schema_exports(m)?;
    Ok(())
}
