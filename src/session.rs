//! Session-scoped pollutant selection.
//!
//! The UI toggles pollutants on and off per session; the selection is an
//! explicit object handed to the aggregation calls, never process-global
//! state, so concurrent sessions cannot interfere. An empty selection means
//! "no filter / show all".

use std::collections::BTreeSet;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::pollutants::Pollutant;

#[pyclass]
#[derive(Debug, Clone, Default)]
pub struct PollutantSelection {
    selected: BTreeSet<String>,
}

impl PollutantSelection {
    /// Toggle a pollutant, returning whether it is now selected.
    /// `None` if the name is outside the fixed enumeration.
    pub fn toggle_name(&mut self, name: &str) -> Option<bool> {
        let canonical = Pollutant::parse(name)?.as_str().to_string();
        if self.selected.remove(&canonical) {
            Some(false)
        } else {
            self.selected.insert(canonical);
            Some(true)
        }
    }

    /// The selection as a filter argument: sorted names, or `None` when
    /// nothing is selected.
    pub fn as_filter(&self) -> Option<Vec<String>> {
        if self.selected.is_empty() {
            None
        } else {
            Some(self.selected.iter().cloned().collect())
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        Pollutant::parse(name)
            .map(|p| self.selected.contains(p.as_str()))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

#[pymethods]
impl PollutantSelection {
    #[new]
    fn new() -> Self {
        Self::default()
    }

    /// Toggle a pollutant button. Returns True when the pollutant is now
    /// selected, False when it was deselected.
    fn toggle(&mut self, name: &str) -> PyResult<bool> {
        self.toggle_name(name)
            .ok_or_else(|| PyValueError::new_err(format!("Unknown pollutant: '{name}'")))
    }

    /// Sorted selected pollutant names, or None when the selection is empty
    /// (pass straight to the filtered/aggregation calls).
    #[pyo3(name = "as_filter")]
    fn as_filter_py(&self) -> Option<Vec<String>> {
        self.as_filter()
    }

    #[pyo3(name = "is_selected")]
    fn is_selected_py(&self, name: &str) -> bool {
        self.contains(name)
    }

    fn clear(&mut self) {
        self.selected.clear();
    }

    fn __len__(&self) -> usize {
        self.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_membership() {
        let mut selection = PollutantSelection::default();
        assert_eq!(selection.toggle_name("PM2.5"), Some(true));
        assert!(selection.contains("PM2.5"));
        assert_eq!(selection.toggle_name("PM2.5"), Some(false));
        assert!(selection.is_empty());
    }

    #[test]
    fn unknown_pollutant_is_rejected() {
        let mut selection = PollutantSelection::default();
        assert_eq!(selection.toggle_name("CO2"), None);
        assert!(selection.is_empty());
    }

    #[test]
    fn filter_is_sorted_and_none_when_empty() {
        let mut selection = PollutantSelection::default();
        assert_eq!(selection.as_filter(), None);
        selection.toggle_name("SO2");
        selection.toggle_name("NO2");
        selection.toggle_name("PM2.5");
        assert_eq!(
            selection.as_filter(),
            Some(vec![
                "NO2".to_string(),
                "PM2.5".to_string(),
                "SO2".to_string()
            ])
        );
    }

    #[test]
    fn spelling_variants_share_one_slot() {
        let mut selection = PollutantSelection::default();
        selection.toggle_name("pm25");
        assert!(selection.contains("PM2.5"));
        assert_eq!(selection.toggle_name("PM2.5"), Some(false));
        assert!(selection.is_empty());
    }
}
