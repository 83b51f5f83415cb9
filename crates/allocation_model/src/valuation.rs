use std::collections::BTreeMap;

pub type Good = String;

/// Normalized valuation snapshot for one agent. Built once from the raw
/// table; never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct ValuationProfile {
    normalized: BTreeMap<Good, f64>,
    dispersion: f64,
}

impl ValuationProfile {
    /// Rescales `raw` so the normalized values sum to `target`. A raw table
    /// summing to zero distributes `target` equally instead of dividing by it.
    pub fn from_raw(raw: &BTreeMap<Good, f64>, target: f64) -> Self {
        let sum: f64 = raw.values().sum();
        let normalized: BTreeMap<Good, f64> = if raw.is_empty() {
            BTreeMap::new()
        } else if sum == 0.0 {
            let share = target / raw.len() as f64;
            raw.keys().map(|good| (good.clone(), share)).collect()
        } else {
            let scale = target / sum;
            raw.iter()
                .map(|(good, value)| (good.clone(), value * scale))
                .collect()
        };
        let dispersion = sample_std_dev(&normalized.values().copied().collect::<Vec<_>>());
        Self {
            normalized,
            dispersion,
        }
    }

    pub fn value(&self, good: &str) -> f64 {
        self.normalized.get(good).copied().unwrap_or(0.0)
    }

    pub fn bundle_value(&self, goods: &[Good]) -> f64 {
        goods.iter().map(|good| self.value(good)).sum()
    }

    pub fn dispersion(&self) -> f64 {
        self.dispersion
    }

    pub fn normalized(&self) -> &BTreeMap<Good, f64> {
        &self.normalized
    }
}

fn sample_std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}
