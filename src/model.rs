//! The model object the dashboard layer holds onto.
//!
//! Ties the loader, the reference tables, and the aggregation pipeline
//! together behind the tiered frame cache, and exposes the whole operation
//! surface to Python. All Python-facing methods take primitive arguments
//! and return frames; the cache is the only side effect.

use std::path::PathBuf;

use polars::prelude::*;
use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;

use crate::cache::{CacheKey, FrameCache, Tier, TierTtls};
use crate::countries;
use crate::error::AqError;
use crate::loader;
use crate::pipeline;

#[pyclass]
pub struct AirQualityModel {
    data_path: PathBuf,
    cache: FrameCache,
}

impl AirQualityModel {
    pub fn with_ttls(data_path: PathBuf, ttls: TierTtls) -> Self {
        Self {
            data_path,
            cache: FrameCache::new(ttls),
        }
    }

    /// The base dataset, loaded at most once per base-tier TTL window.
    pub fn base_frame(&self) -> Result<DataFrame, AqError> {
        self.cache
            .get_or_try_build(CacheKey::op("load_base"), Tier::Base, || {
                loader::load_features(&self.data_path)
            })
    }

    /// World country reference frame, effectively static per process.
    pub fn reference_frame(&self) -> Result<DataFrame, AqError> {
        self.cache
            .get_or_try_build(CacheKey::op("all_countries"), Tier::Static, || {
                countries::all_countries_frame()
            })
    }

    pub fn filtered_frame(
        &self,
        year: i32,
        pollutants: Option<&[String]>,
    ) -> Result<DataFrame, AqError> {
        let key = CacheKey::for_view("filtered", year, pollutants);
        self.cache.get_or_try_build(key, Tier::View, || {
            let base = self.base_frame()?;
            pipeline::filter_measurements(&base, year, pollutants)
        })
    }

    pub fn country_pollution_frame(
        &self,
        year: i32,
        pollutants: Option<&[String]>,
    ) -> Result<DataFrame, AqError> {
        let key = CacheKey::for_view("country_pollution", year, pollutants);
        self.cache.get_or_try_build(key, Tier::View, || {
            let filtered = self.filtered_frame(year, pollutants)?;
            pipeline::country_pollution(&filtered)
        })
    }

    pub fn world_pollution_frame(
        &self,
        year: i32,
        pollutants: Option<&[String]>,
    ) -> Result<DataFrame, AqError> {
        let key = CacheKey::for_view("world_pollution", year, pollutants);
        self.cache.get_or_try_build(key, Tier::View, || {
            let reference_frame = self.reference_frame()?;
            let premerge = self.country_pollution_frame(year, pollutants)?;
            pipeline::world_pollution(&reference_frame, &premerge)
        })
    }

    /// Pre-merge choropleth bounds for the same key as `world_pollution`.
    pub fn scale_bounds(
        &self,
        year: i32,
        pollutants: Option<&[String]>,
    ) -> Result<(f64, f64), AqError> {
        let premerge = self.country_pollution_frame(year, pollutants)?;
        pipeline::value_bounds(&premerge)
    }

    pub fn regional_years_lost_frame(&self, year: i32) -> Result<DataFrame, AqError> {
        let key = CacheKey::for_year("regional_years_lost", year);
        self.cache.get_or_try_build(key, Tier::View, || {
            let base = self.base_frame()?;
            pipeline::regional_years_lost(&base, year)
        })
    }

    pub fn years_lost_by_band_frame(&self, year: i32) -> Result<DataFrame, AqError> {
        let key = CacheKey::for_year("years_lost_by_band", year);
        self.cache.get_or_try_build(key, Tier::View, || {
            let base = self.base_frame()?;
            pipeline::years_lost_by_band(&base, year)
        })
    }

    /// Top-N ranking. The full ranking is cached once per key; `n` only
    /// truncates the cached frame.
    pub fn top_countries_frame(
        &self,
        year: i32,
        pollutants: Option<&[String]>,
        n: usize,
    ) -> Result<DataFrame, AqError> {
        let key = CacheKey::for_view("top_countries", year, pollutants);
        let ranked = self.cache.get_or_try_build(key, Tier::View, || {
            let filtered = self.filtered_frame(year, pollutants)?;
            pipeline::rank_countries(&filtered)
        })?;
        Ok(ranked.head(Some(n)))
    }

    pub fn distinct_country_count(
        &self,
        year: i32,
        pollutants: Option<&[String]>,
    ) -> Result<usize, AqError> {
        let filtered = self.filtered_frame(year, pollutants)?;
        pipeline::country_count(&filtered)
    }
}

#[pymethods]
impl AirQualityModel {
    #[new]
    fn new(data_path: PathBuf) -> Self {
        Self::with_ttls(data_path, TierTtls::default())
    }

    /// Load (or reuse) the cleaned base dataset.
    fn load_base(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.base_frame()?))
    }

    /// Measurements for a year, optionally restricted to a pollutant set.
    /// An empty or missing set means no pollutant filtering.
    #[pyo3(signature = (year, pollutants=None))]
    fn filtered(&self, year: i32, pollutants: Option<Vec<String>>) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.filtered_frame(year, pollutants.as_deref())?))
    }

    /// Mean pollution per country with resolved ISO-3 codes; countries whose
    /// code does not resolve are dropped.
    #[pyo3(signature = (year, pollutants=None))]
    fn country_pollution(
        &self,
        year: i32,
        pollutants: Option<Vec<String>>,
    ) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(
            self.country_pollution_frame(year, pollutants.as_deref())?,
        ))
    }

    /// One row per world country; countries without measurements carry a
    /// zero placeholder. Direct input to the choropleth trace.
    #[pyo3(signature = (year, pollutants=None))]
    fn world_pollution(
        &self,
        year: i32,
        pollutants: Option<Vec<String>>,
    ) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(
            self.world_pollution_frame(year, pollutants.as_deref())?,
        ))
    }

    /// (zmin, zmax) for the choropleth color scale, from the pre-merge
    /// aggregate. Defaults to (0.0, 1.0) when there is no data.
    #[pyo3(signature = (year, pollutants=None))]
    fn value_bounds(
        &self,
        year: i32,
        pollutants: Option<Vec<String>>,
    ) -> PyResult<(f64, f64)> {
        Ok(self.scale_bounds(year, pollutants.as_deref())?)
    }

    /// Mean years of life lost and mean PM2.5 per macro-region.
    fn regional_years_lost(&self, year: i32) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.regional_years_lost_frame(year)?))
    }

    /// Mean years of life lost per PM2.5 concentration band.
    fn years_lost_by_band(&self, year: i32) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.years_lost_by_band_frame(year)?))
    }

    /// Top `n` countries by mean measurement value.
    #[pyo3(signature = (year, pollutants=None, n=5))]
    fn top_countries(
        &self,
        year: i32,
        pollutants: Option<Vec<String>>,
        n: usize,
    ) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(
            self.top_countries_frame(year, pollutants.as_deref(), n)?,
        ))
    }

    /// Number of distinct countries with measurements for the key.
    #[pyo3(signature = (year, pollutants=None))]
    fn country_count(&self, year: i32, pollutants: Option<Vec<String>>) -> PyResult<usize> {
        Ok(self.distinct_country_count(year, pollutants.as_deref())?)
    }

    /// ISO-2 to ISO-3 conversion; None when the code is not recognized.
    #[staticmethod]
    fn resolve(code2: &str) -> Option<String> {
        countries::iso2_to_iso3(code2).map(str::to_string)
    }

    /// The full world country reference table.
    fn all_countries(&self) -> PyResult<PyDataFrame> {
        Ok(PyDataFrame(self.reference_frame()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{aggregate, reference};
    use std::io::Write;
    use std::time::Duration;

    fn scenario_geojson() -> tempfile::NamedTempFile {
        let mut features = Vec::new();
        let rows = [
            ("FR", "France", "PM2.5", 10.0, "2020-03-01T10:00:00Z"),
            ("FR", "France", "PM2.5", 20.0, "2020-04-01T10:00:00Z"),
            ("FR", "France", "PM2.5", 30.0, "2020-05-01T10:00:00Z"),
            ("US", "United States", "PM2.5", 5.0, "2020-06-01T10:00:00Z"),
            ("ZZ", "Nowhere", "PM2.5", 7.0, "2020-06-01T10:00:00Z"),
            ("FR", "France", "NO2", 42.0, "2019-06-01T10:00:00Z"),
        ];
        for (country, name, parameter, value, timestamp) in rows {
            features.push(format!(
                r#"{{"type":"Feature","geometry":{{"type":"Point","coordinates":[2.0, 48.0]}},
                    "properties":{{"country":"{country}","country_name_en":"{name}",
                    "measurements_parameter":"{parameter}","measurements_value":{value},
                    "measurements_unit":"µg/m³","measurements_lastupdated":"{timestamp}"}}}}"#
            ));
        }
        let body = format!(
            r#"{{"type":"FeatureCollection","features":[{}]}}"#,
            features.join(",")
        );
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(body.as_bytes()).expect("write geojson");
        file
    }

    fn model(file: &tempfile::NamedTempFile) -> AirQualityModel {
        AirQualityModel::with_ttls(file.path().to_path_buf(), TierTtls::default())
    }

    #[test]
    fn scenario_world_merge() {
        let file = scenario_geojson();
        let model = model(&file);
        let filter = vec!["PM2.5".to_string()];

        let premerge = model.country_pollution_frame(2020, Some(&filter)).unwrap();
        assert_eq!(premerge.height(), 2); // FR and US; ZZ dropped

        let world = model.world_pollution_frame(2020, Some(&filter)).unwrap();
        let reference_frame = model.reference_frame().unwrap();
        assert_eq!(world.height(), reference_frame.height());

        let code3 = world
            .column(reference::COUNTRY_ISO3)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .clone();
        let means = world
            .column(aggregate::AVG_POLLUTION)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .clone();
        for i in 0..world.height() {
            let mean = means.get(i).unwrap();
            match code3.get(i).unwrap() {
                "FRA" => assert_eq!(mean, 20.0),
                "USA" => assert_eq!(mean, 5.0),
                _ => assert_eq!(mean, 0.0),
            }
        }

        assert_eq!(model.scale_bounds(2020, Some(&filter)).unwrap(), (5.0, 20.0));
    }

    #[test]
    fn permuted_filters_share_cached_views() {
        let file = scenario_geojson();
        let model = model(&file);
        let a = vec!["PM2.5".to_string(), "NO2".to_string()];
        let b = vec!["NO2".to_string(), "PM2.5".to_string()];
        let fa = model.filtered_frame(2020, Some(&a)).unwrap();
        let fb = model.filtered_frame(2020, Some(&b)).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn expired_base_is_reloaded() {
        let file = scenario_geojson();
        let ttls = TierTtls {
            static_data: Duration::from_secs(3600),
            base: Duration::ZERO,
            view: Duration::ZERO,
        };
        let model = AirQualityModel::with_ttls(file.path().to_path_buf(), ttls);
        let first = model.base_frame().unwrap();
        let second = model.base_frame().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn missing_dataset_is_propagated() {
        let model = AirQualityModel::with_ttls(
            PathBuf::from("/nonexistent/cleaneddata.geojson"),
            TierTtls::default(),
        );
        assert!(model.base_frame().is_err());
        assert!(model.filtered_frame(2020, None).is_err());
    }

    #[test]
    fn ranking_truncates_cached_frame() {
        let file = scenario_geojson();
        let model = model(&file);
        let top1 = model.top_countries_frame(2020, None, 1).unwrap();
        assert_eq!(top1.height(), 1);
        let top5 = model.top_countries_frame(2020, None, 5).unwrap();
        assert_eq!(top5.height(), 3); // FR, US, ZZ groups in 2020
    }

    #[test]
    fn country_count_counts_distinct_codes() {
        let file = scenario_geojson();
        let model = model(&file);
        assert_eq!(model.distinct_country_count(2020, None).unwrap(), 3);
        assert_eq!(model.distinct_country_count(2019, None).unwrap(), 1);
    }
}
