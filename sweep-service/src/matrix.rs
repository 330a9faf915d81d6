// Parameter Matrix Expansion
// Expands a parameter matrix into concrete case combinations, minus the
// combinations a study declares as known-invalid.

use serde::{Deserialize, Serialize};

use crate::error::{SweepError, SweepResult};

/// Tolerance when comparing candidate values against exclusion rules.
pub const VALUE_TOLERANCE: f64 = 1e-10;

/// Named parameter axes with their candidate values. Insertion order is the
/// cartesian key order, so two expansions of the same matrix always agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMatrix {
    entries: Vec<(String, Vec<f64>)>,
}

impl ParameterMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter axis. Re-inserting an existing name replaces its values
    /// without changing its position.
    pub fn insert(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = values;
        } else {
            self.entries.push((name, values));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    /// Size of the full cartesian product, before exclusions.
    pub fn total_combinations(&self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }
        self.entries.iter().map(|(_, v)| v.len()).product()
    }

    /// Parse a matrix from a JSON object string, e.g.
    /// `{"Gf":[8,10],"length_scale_paramete":[5e-5,10e-5]}`.
    /// Key order in the document becomes the cartesian key order.
    pub fn from_json(text: &str) -> SweepResult<Self> {
        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| SweepError::Configuration(format!("unparseable matrix JSON: {}", e)))?;
        let object = value.as_object().ok_or_else(|| {
            SweepError::Configuration("parameter matrix must be a JSON object".to_string())
        })?;

        let mut matrix = Self::new();
        for (name, values) in object {
            let list = values.as_array().ok_or_else(|| {
                SweepError::Configuration(format!("values for '{}' must be an array", name))
            })?;
            let mut parsed = Vec::with_capacity(list.len());
            for v in list {
                let number = v.as_f64().ok_or_else(|| {
                    SweepError::Configuration(format!("non-numeric value for '{}': {}", name, v))
                })?;
                parsed.push(number);
            }
            matrix.insert(name.clone(), parsed);
        }
        Ok(matrix)
    }
}

/// Partial name→value binding that marks combinations as not runnable.
/// A combination is excluded when every pair of the rule matches it within
/// [`VALUE_TOLERANCE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExclusionRule {
    pairs: Vec<(String, f64)>,
}

impl ExclusionRule {
    pub fn new(pairs: Vec<(String, f64)>) -> Self {
        Self { pairs }
    }

    /// Build a rule from the flattened `[name, value, name, value, ...]` form
    /// used by the exclusion-list argument.
    pub fn from_flat(flat: &[serde_json::Value]) -> SweepResult<Self> {
        if flat.len() % 2 != 0 {
            return Err(SweepError::Configuration(format!(
                "exclusion rule has odd length {}: pairs must be complete",
                flat.len()
            )));
        }
        let mut pairs = Vec::with_capacity(flat.len() / 2);
        for chunk in flat.chunks(2) {
            let name = chunk[0].as_str().ok_or_else(|| {
                SweepError::Configuration(format!(
                    "exclusion rule parameter name must be a string, got {}",
                    chunk[0]
                ))
            })?;
            let value = chunk[1].as_f64().ok_or_else(|| {
                SweepError::Configuration(format!(
                    "exclusion rule value for '{}' must be numeric, got {}",
                    name, chunk[1]
                ))
            })?;
            pairs.push((name.to_string(), value));
        }
        Ok(Self { pairs })
    }

    /// Parse a whole exclusion list from a JSON array-of-arrays string.
    pub fn list_from_json(text: &str) -> SweepResult<Vec<Self>> {
        let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            SweepError::Configuration(format!("unparseable exclusion JSON: {}", e))
        })?;
        let outer = value.as_array().ok_or_else(|| {
            SweepError::Configuration("exclusion list must be a JSON array".to_string())
        })?;
        outer
            .iter()
            .map(|rule| {
                let flat = rule.as_array().ok_or_else(|| {
                    SweepError::Configuration(format!(
                        "each exclusion rule must be an array, got {}",
                        rule
                    ))
                })?;
                Self::from_flat(flat)
            })
            .collect()
    }

    pub fn pairs(&self) -> &[(String, f64)] {
        &self.pairs
    }

    /// True when every parameter the rule names is present in the combination
    /// with a matching value.
    pub fn matches(&self, combination: &ParameterCombination) -> bool {
        self.pairs.iter().all(|(name, value)| {
            combination
                .get(name)
                .map(|bound| (bound - value).abs() <= VALUE_TOLERANCE)
                .unwrap_or(false)
        })
    }
}

/// One fully bound combination, in matrix key order. Created by expansion and
/// consumed to name and render exactly one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterCombination {
    pairs: Vec<(String, f64)>,
}

impl ParameterCombination {
    pub fn new(pairs: Vec<(String, f64)>) -> Self {
        Self { pairs }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.pairs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.pairs.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Matrix expander: pure cartesian product plus exclusion filtering.
pub struct MatrixExpander;

impl MatrixExpander {
    /// Expand a matrix into the valid combinations, in key order with the last
    /// key varying fastest. Deterministic and total: the same inputs always
    /// yield the same ordered output.
    pub fn expand(
        matrix: &ParameterMatrix,
        exclusions: &[ExclusionRule],
    ) -> SweepResult<Vec<ParameterCombination>> {
        if matrix.is_empty() {
            return Err(SweepError::Configuration(
                "parameter matrix is empty".to_string(),
            ));
        }
        for (name, values) in matrix.iter() {
            if values.is_empty() {
                return Err(SweepError::Configuration(format!(
                    "parameter '{}' has no candidate values",
                    name
                )));
            }
        }

        let mut combinations = Vec::with_capacity(matrix.total_combinations());
        let mut indices = vec![0usize; matrix.len()];
        let axes: Vec<(&str, &[f64])> = matrix.iter().collect();

        loop {
            let pairs = axes
                .iter()
                .zip(indices.iter())
                .map(|((name, values), &i)| (name.to_string(), values[i]))
                .collect();
            combinations.push(ParameterCombination::new(pairs));

            // Odometer increment, last axis fastest.
            let mut axis = axes.len();
            loop {
                if axis == 0 {
                    return Ok(combinations
                        .into_iter()
                        .filter(|combo| !exclusions.iter().any(|rule| rule.matches(combo)))
                        .collect());
                }
                axis -= 1;
                indices[axis] += 1;
                if indices[axis] < axes[axis].1.len() {
                    break;
                }
                indices[axis] = 0;
            }
        }
    }
}
