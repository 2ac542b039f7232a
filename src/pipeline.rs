//! The aggregation pipeline.
//!
//! Pure functions from DataFrames to DataFrames; the caching and the Python
//! surface live in [`crate::model`]. Each function mirrors one operation of
//! the dashboard core: year/pollutant filtering, per-country means, the
//! world-reference left join, the regional AQLI breakdown, PM2.5 banding,
//! and the top-N ranking.

use polars::prelude::*;
use tracing::debug;

use crate::countries;
use crate::error::AqError;
use crate::pollutants::Pollutant;
use crate::regions::{self, years_lost};
use crate::schema::{aggregate, measurements, reference};

/// Default scale bounds when the pre-merge aggregate is empty, so the
/// choropleth renderer never sees NaN bounds.
pub const EMPTY_BOUNDS: (f64, f64) = (0.0, 1.0);

/// Rows of `base` matching `year` and, when non-empty, the pollutant set.
///
/// `None` and the empty set both mean "no pollutant filtering". An empty
/// result is a valid outcome, not an error.
pub fn filter_measurements(
    base: &DataFrame,
    year: i32,
    pollutants: Option<&[String]>,
) -> Result<DataFrame, AqError> {
    let mut lazy = base
        .clone()
        .lazy()
        .filter(col(measurements::YEAR).eq(lit(year)));

    if let Some(names) = pollutants {
        if !names.is_empty() {
            let wanted = Series::new("pollutants".into(), names.to_vec());
            lazy = lazy.filter(col(measurements::PARAMETER).is_in(lit(wanted), false));
        }
    }

    Ok(lazy.collect()?)
}

/// Mean measurement value grouped by 2-letter country code, resolved to
/// ISO-3. Groups whose code does not resolve are dropped (partial data is
/// acceptable); the drop count is logged for observability.
pub fn country_pollution(filtered: &DataFrame) -> Result<DataFrame, AqError> {
    let grouped = filtered
        .clone()
        .lazy()
        .group_by([col(measurements::COUNTRY)])
        .agg([col(measurements::VALUE)
            .mean()
            .alias(aggregate::AVG_POLLUTION)])
        .sort([measurements::COUNTRY], SortMultipleOptions::default())
        .collect()?;

    let codes = grouped
        .column(measurements::COUNTRY)?
        .as_materialized_series()
        .str()?
        .clone();
    let means = grouped
        .column(aggregate::AVG_POLLUTION)?
        .as_materialized_series()
        .f64()?
        .clone();

    let mut kept_code2: Vec<String> = Vec::new();
    let mut kept_mean: Vec<f64> = Vec::new();
    let mut kept_code3: Vec<&'static str> = Vec::new();
    let mut dropped = 0usize;

    for i in 0..grouped.height() {
        let (Some(code2), Some(mean)) = (codes.get(i), means.get(i)) else {
            dropped += 1;
            continue;
        };
        match countries::iso2_to_iso3(code2) {
            Some(code3) => {
                kept_code2.push(code2.to_string());
                kept_mean.push(mean);
                kept_code3.push(code3);
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(dropped, "country groups with unresolvable codes dropped");
    }

    let df = df!(
        measurements::COUNTRY => kept_code2,
        aggregate::AVG_POLLUTION => kept_mean,
        aggregate::COUNTRY_ISO3 => kept_code3,
    )?;
    Ok(df)
}

/// Choropleth scale bounds from the pre-merge aggregate. Computed before
/// the zero-fill merge so the synthetic zeros do not collapse the scale;
/// falls back to [`EMPTY_BOUNDS`] when there is nothing to aggregate.
pub fn value_bounds(premerge: &DataFrame) -> Result<(f64, f64), AqError> {
    if premerge.height() == 0 {
        return Ok(EMPTY_BOUNDS);
    }
    let means = premerge
        .column(aggregate::AVG_POLLUTION)?
        .as_materialized_series()
        .f64()?
        .clone();
    match (means.min(), means.max()) {
        (Some(min), Some(max)) => Ok((min, max)),
        _ => Ok(EMPTY_BOUNDS),
    }
}

/// Left-join the world country reference against the per-country aggregate.
/// Every reference country appears exactly once; countries without
/// measurements get a zero placeholder, never a missing row.
pub fn world_pollution(
    reference_frame: &DataFrame,
    premerge: &DataFrame,
) -> Result<DataFrame, AqError> {
    let merged = reference_frame
        .clone()
        .lazy()
        .join(
            premerge
                .clone()
                .lazy()
                .select([col(aggregate::COUNTRY_ISO3), col(aggregate::AVG_POLLUTION)]),
            [col(reference::COUNTRY_ISO3)],
            [col(aggregate::COUNTRY_ISO3)],
            JoinArgs::new(JoinType::Left),
        )
        .with_columns([col(aggregate::AVG_POLLUTION).fill_null(lit(0.0))])
        .collect()?;
    Ok(merged)
}

/// Per-region mean years of life lost and mean concentration, over the
/// PM2.5 subset of `base` for `year`. The dose-response model is defined
/// for PM2.5 only, so the restriction is fixed, not user-configurable.
/// The catch-all region is excluded; output sorts ascending by mean
/// years lost for rendering.
pub fn regional_years_lost(base: &DataFrame, year: i32) -> Result<DataFrame, AqError> {
    let pm25 = pm25_subset(base, year)?;
    let pm25 = with_years_lost_columns(pm25)?;

    let grouped = pm25
        .lazy()
        .group_by([col(aggregate::REGION)])
        .agg([
            col(aggregate::YEARS_LOST)
                .mean()
                .alias(aggregate::AVG_YEARS_LOST),
            col(measurements::VALUE).mean().alias(aggregate::AVG_PM25),
            col(measurements::VALUE)
                .count()
                .alias(aggregate::NB_MEASUREMENTS),
        ])
        .filter(col(aggregate::REGION).neq(lit(regions::OTHER)))
        .sort([aggregate::AVG_YEARS_LOST], SortMultipleOptions::default())
        .collect()?;

    Ok(grouped)
}

/// PM2.5 concentration bands for the years-lost histogram: inclusive
/// upper bound and display label.
const PM25_BANDS: [(f64, &str); 10] = [
    (5.0, "0-5"),
    (15.0, "5-15"),
    (25.0, "15-25"),
    (35.0, "25-35"),
    (50.0, "35-50"),
    (75.0, "50-75"),
    (100.0, "75-100"),
    (150.0, "100-150"),
    (200.0, "150-200"),
    (f64::INFINITY, "200+"),
];

/// Scratch column carrying the band's ordinal through the group-by; not
/// part of the output schema.
const BAND_INDEX: &str = "band_index";

fn band_for(value: f64) -> (u32, &'static str) {
    for (index, (upper, label)) in PM25_BANDS.iter().enumerate() {
        if value <= *upper {
            return (index as u32, label);
        }
    }
    let last = PM25_BANDS.len() - 1;
    (last as u32, PM25_BANDS[last].1)
}

/// Mean years lost and measurement count per PM2.5 concentration band for
/// `year`, in band order.
pub fn years_lost_by_band(base: &DataFrame, year: i32) -> Result<DataFrame, AqError> {
    let pm25 = pm25_subset(base, year)?;

    let values = pm25
        .column(measurements::VALUE)?
        .as_materialized_series()
        .f64()?
        .clone();
    let mut band_index: Vec<u32> = Vec::with_capacity(pm25.height());
    let mut band_label: Vec<&'static str> = Vec::with_capacity(pm25.height());
    let mut lost: Vec<f64> = Vec::with_capacity(pm25.height());
    for i in 0..pm25.height() {
        let value = values.get(i).unwrap_or(0.0);
        let (index, label) = band_for(value);
        band_index.push(index);
        band_label.push(label);
        lost.push(years_lost(value));
    }

    let pm25 = pm25.hstack(&[
        Column::new(BAND_INDEX.into(), band_index),
        Column::new(aggregate::PM25_BAND.into(), band_label),
        Column::new(aggregate::YEARS_LOST.into(), lost),
    ])?;

    let grouped = pm25
        .lazy()
        .group_by([col(BAND_INDEX), col(aggregate::PM25_BAND)])
        .agg([
            col(aggregate::YEARS_LOST)
                .mean()
                .alias(aggregate::AVG_YEARS_LOST),
            col(measurements::VALUE)
                .count()
                .alias(aggregate::NB_MEASUREMENTS),
        ])
        .sort([BAND_INDEX], SortMultipleOptions::default())
        .select([
            col(aggregate::PM25_BAND),
            col(aggregate::AVG_YEARS_LOST),
            col(aggregate::NB_MEASUREMENTS),
        ])
        .collect()?;

    Ok(grouped)
}

/// Full country ranking by mean measurement value over `filtered`: mean
/// value, first-seen unit, most recent timestamp per
/// `(country, country_name_en)` group, sorted descending. Ties break on
/// ascending country code so ordering is deterministic across runs.
pub fn rank_countries(filtered: &DataFrame) -> Result<DataFrame, AqError> {
    let ranked = filtered
        .clone()
        .lazy()
        .group_by([
            col(measurements::COUNTRY),
            col(measurements::COUNTRY_NAME_EN),
        ])
        .agg([
            col(measurements::VALUE)
                .mean()
                .alias(aggregate::AVG_POLLUTION),
            col(measurements::UNIT).first(),
            col(measurements::LAST_UPDATED).max(),
        ])
        .sort(
            [aggregate::AVG_POLLUTION, measurements::COUNTRY],
            SortMultipleOptions::default().with_order_descending_multi([true, false]),
        )
        .collect()?;
    Ok(ranked)
}

/// The first `n` rows of [`rank_countries`].
pub fn top_countries(filtered: &DataFrame, n: usize) -> Result<DataFrame, AqError> {
    Ok(rank_countries(filtered)?.head(Some(n)))
}

/// Number of distinct countries contributing to `filtered`.
pub fn country_count(filtered: &DataFrame) -> Result<usize, AqError> {
    let count = filtered
        .column(measurements::COUNTRY)?
        .as_materialized_series()
        .n_unique()?;
    Ok(count)
}

fn pm25_subset(base: &DataFrame, year: i32) -> Result<DataFrame, AqError> {
    let subset = base
        .clone()
        .lazy()
        .filter(
            col(measurements::YEAR)
                .eq(lit(year))
                .and(col(measurements::PARAMETER).eq(lit(Pollutant::Pm25.as_str()))),
        )
        .collect()?;
    Ok(subset)
}

fn with_years_lost_columns(pm25: DataFrame) -> Result<DataFrame, AqError> {
    let codes = pm25
        .column(measurements::COUNTRY)?
        .as_materialized_series()
        .str()?
        .clone();
    let values = pm25
        .column(measurements::VALUE)?
        .as_materialized_series()
        .f64()?
        .clone();

    let mut region: Vec<&'static str> = Vec::with_capacity(pm25.height());
    let mut lost: Vec<f64> = Vec::with_capacity(pm25.height());
    for i in 0..pm25.height() {
        region.push(regions::region_for(codes.get(i).unwrap_or("")));
        lost.push(years_lost(values.get(i).unwrap_or(0.0)));
    }

    let pm25 = pm25.hstack(&[
        Column::new(aggregate::REGION.into(), region),
        Column::new(aggregate::YEARS_LOST.into(), lost),
    ])?;
    Ok(pm25)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_frame() -> DataFrame {
        df!(
            measurements::COUNTRY => ["FR", "FR", "FR", "US", "ZZ", "IN", "FR"],
            measurements::COUNTRY_NAME_EN => [
                Some("France"), Some("France"), Some("France"),
                Some("United States"), None, Some("India"), Some("France"),
            ],
            measurements::LOCATION => [
                Some("Paris"), Some("Lyon"), Some("Lille"),
                Some("New York"), None, Some("Delhi"), Some("Paris"),
            ],
            measurements::PARAMETER => ["PM2.5", "PM2.5", "PM2.5", "PM2.5", "PM2.5", "PM2.5", "NO2"],
            measurements::VALUE => [10.0, 20.0, 30.0, 5.0, 7.0, 55.0, 42.0],
            measurements::UNIT => [Some("µg/m³"); 7],
            measurements::LAST_UPDATED => [100i64, 200, 300, 400, 500, 600, 700],
            measurements::YEAR => [2020i32, 2020, 2020, 2020, 2020, 2020, 2020],
            measurements::LAT => [48.85, 45.76, 50.63, 40.7, 0.0, 28.6, 48.85],
            measurements::LON => [2.35, 4.84, 3.06, -74.0, 0.0, 77.2, 2.35],
        )
        .unwrap()
    }

    fn pm25_filter() -> Vec<String> {
        vec!["PM2.5".to_string()]
    }

    #[test]
    fn filtering_is_invariant_under_permutation() {
        let base = base_frame();
        let a = vec!["PM2.5".to_string(), "NO2".to_string()];
        let b = vec!["NO2".to_string(), "PM2.5".to_string()];
        let fa = filter_measurements(&base, 2020, Some(&a)).unwrap();
        let fb = filter_measurements(&base, 2020, Some(&b)).unwrap();
        assert_eq!(fa, fb);
    }

    #[test]
    fn empty_filter_means_no_filter() {
        let base = base_frame();
        let all = filter_measurements(&base, 2020, None).unwrap();
        let empty = filter_measurements(&base, 2020, Some(&[])).unwrap();
        assert_eq!(all, empty);
        assert_eq!(all.height(), 7);
    }

    #[test]
    fn no_matching_year_yields_empty_frame_not_error() {
        let base = base_frame();
        let none = filter_measurements(&base, 1999, None).unwrap();
        assert_eq!(none.height(), 0);
    }

    #[test]
    fn country_means_resolve_and_drop_unmapped() {
        let base = base_frame();
        let filtered = filter_measurements(&base, 2020, Some(&pm25_filter())).unwrap();
        let premerge = country_pollution(&filtered).unwrap();

        // FR, US, IN survive; ZZ is dropped.
        assert_eq!(premerge.height(), 3);
        let code3 = premerge
            .column(aggregate::COUNTRY_ISO3)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .clone();
        let means = premerge
            .column(aggregate::AVG_POLLUTION)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .clone();

        let mut by_code3: Vec<(String, f64)> = (0..premerge.height())
            .map(|i| (code3.get(i).unwrap().to_string(), means.get(i).unwrap()))
            .collect();
        by_code3.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            by_code3,
            vec![
                ("FRA".to_string(), 20.0),
                ("IND".to_string(), 55.0),
                ("USA".to_string(), 5.0),
            ]
        );

        for i in 0..premerge.height() {
            assert!(countries::resolve(
                premerge
                    .column(measurements::COUNTRY)
                    .unwrap()
                    .as_materialized_series()
                    .str()
                    .unwrap()
                    .get(i)
                    .unwrap()
            )
            .is_some());
        }
    }

    #[test]
    fn merge_covers_every_reference_country_exactly_once() {
        let base = base_frame();
        let filtered = filter_measurements(&base, 2020, Some(&pm25_filter())).unwrap();
        let premerge = country_pollution(&filtered).unwrap();
        let reference_frame = countries::all_countries_frame().unwrap();
        let world = world_pollution(&reference_frame, &premerge).unwrap();

        assert_eq!(world.height(), reference_frame.height());
        let unique = world
            .column(reference::COUNTRY_ISO3)
            .unwrap()
            .as_materialized_series()
            .n_unique()
            .unwrap();
        assert_eq!(unique, reference_frame.height());

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
        let mut fra = None;
        let mut usa = None;
        let mut nonzero = 0;
        for i in 0..world.height() {
            let mean = means.get(i).unwrap();
            match code3.get(i).unwrap() {
                "FRA" => fra = Some(mean),
                "USA" => usa = Some(mean),
                _ => {}
            }
            if mean != 0.0 {
                nonzero += 1;
            }
        }
        assert_eq!(fra, Some(20.0));
        assert_eq!(usa, Some(5.0));
        assert_eq!(nonzero, 3);
    }

    #[test]
    fn bounds_come_from_the_premerge_aggregate() {
        let base = base_frame();
        let filtered = filter_measurements(&base, 2020, Some(&pm25_filter())).unwrap();
        let premerge = country_pollution(&filtered).unwrap();
        assert_eq!(value_bounds(&premerge).unwrap(), (5.0, 55.0));
    }

    #[test]
    fn empty_aggregate_gets_default_bounds() {
        let base = base_frame();
        let filtered = filter_measurements(&base, 1999, None).unwrap();
        let premerge = country_pollution(&filtered).unwrap();
        assert_eq!(premerge.height(), 0);
        assert_eq!(value_bounds(&premerge).unwrap(), EMPTY_BOUNDS);

        let reference_frame = countries::all_countries_frame().unwrap();
        let world = world_pollution(&reference_frame, &premerge).unwrap();
        assert_eq!(world.height(), reference_frame.height());
    }

    #[test]
    fn regional_breakdown_excludes_other_and_sorts_ascending() {
        let base = base_frame();
        let regional = regional_years_lost(&base, 2020).unwrap();

        let region = regional
            .column(aggregate::REGION)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .clone();
        let lost = regional
            .column(aggregate::AVG_YEARS_LOST)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .clone();

        // ZZ maps to the catch-all bucket and is excluded. NO2 rows are out
        // entirely, so FR averages over PM2.5 only.
        let labels: Vec<&str> = (0..regional.height()).map(|i| region.get(i).unwrap()).collect();
        assert!(!labels.contains(&regions::OTHER));
        assert_eq!(labels.len(), 3);

        let mut previous = f64::MIN;
        for i in 0..regional.height() {
            let value = lost.get(i).unwrap();
            assert!(value >= previous);
            previous = value;
        }

        // North America: one US record at 5.0 µg/m³, at the guideline.
        assert_eq!(labels[0], "North America");
        assert_eq!(lost.get(0), Some(0.0));
        // South Asia: one IN record at 55.0 → (55-5)*0.098 = 4.9.
        assert_eq!(labels[2], "South Asia");
        assert_eq!(lost.get(2), Some(4.9));
    }

    #[test]
    fn band_histogram_groups_in_band_order() {
        let base = base_frame();
        let banded = years_lost_by_band(&base, 2020).unwrap();

        let bands = banded
            .column(aggregate::PM25_BAND)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .clone();
        let labels: Vec<&str> = (0..banded.height()).map(|i| bands.get(i).unwrap()).collect();
        // Values 5,7,10,20,30,55 → bands 0-5, 5-15 (x3), 15-25, 25-35, 50-75.
        assert_eq!(labels, vec!["0-5", "5-15", "15-25", "25-35", "50-75"]);

        let counts = banded
            .column(aggregate::NB_MEASUREMENTS)
            .unwrap()
            .as_materialized_series()
            .u32()
            .unwrap()
            .clone();
        assert_eq!(counts.get(1), Some(2));
    }

    #[test]
    fn ranking_is_bounded_sorted_and_deterministic() {
        let base = base_frame();
        let filtered = filter_measurements(&base, 2020, None).unwrap();
        let top = top_countries(&filtered, 5).unwrap();

        assert!(top.height() <= 5);
        let means = top
            .column(aggregate::AVG_POLLUTION)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .clone();
        let mut previous = f64::MAX;
        for i in 0..top.height() {
            let value = means.get(i).unwrap();
            assert!(value <= previous);
            previous = value;
        }

        let top2 = top_countries(&filtered, 2).unwrap();
        assert_eq!(top2.height(), 2);
    }

    #[test]
    fn ranking_ties_break_on_country_code() {
        let frame = df!(
            measurements::COUNTRY => ["US", "FR"],
            measurements::COUNTRY_NAME_EN => [Some("United States"), Some("France")],
            measurements::LOCATION => [None::<&str>, None],
            measurements::PARAMETER => ["PM2.5", "PM2.5"],
            measurements::VALUE => [10.0, 10.0],
            measurements::UNIT => [Some("µg/m³"), Some("µg/m³")],
            measurements::LAST_UPDATED => [1i64, 2],
            measurements::YEAR => [2020i32, 2020],
            measurements::LAT => [0.0, 0.0],
            measurements::LON => [0.0, 0.0],
        )
        .unwrap();
        let top = top_countries(&frame, 5).unwrap();
        let codes = top
            .column(measurements::COUNTRY)
            .unwrap()
            .as_materialized_series()
            .str()
            .unwrap()
            .clone();
        assert_eq!(codes.get(0), Some("FR"));
        assert_eq!(codes.get(1), Some("US"));
    }

    #[test]
    fn distinct_country_count() {
        let base = base_frame();
        let filtered = filter_measurements(&base, 2020, None).unwrap();
        assert_eq!(country_count(&filtered).unwrap(), 4);
    }
}
