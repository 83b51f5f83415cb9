use std::collections::BTreeMap;

use allocation_model::{Agent, Allocation, Instance};

/// Pairwise envy derived from one allocation. Derived on demand, never stored.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvyReport {
    matrix: BTreeMap<String, BTreeMap<String, f64>>,
    by_envier: BTreeMap<String, f64>,
    total: f64,
}

impl EnvyReport {
    pub fn envy(&self, envier: &str, envied: &str) -> f64 {
        self.matrix
            .get(envier)
            .and_then(|row| row.get(envied))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn by_envier(&self, envier: &str) -> f64 {
        self.by_envier.get(envier).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn matrix(&self) -> &BTreeMap<String, BTreeMap<String, f64>> {
        &self.matrix
    }
}

/// envy(i, j) = max(0, v_i(B_j) - v_i(B_i)).
pub fn envy_report(instance: &Instance, allocation: &Allocation) -> EnvyReport {
    build_report(instance, allocation, plain_envy)
}

/// EFX-envy: envy toward B_j after removing the item the envier values least.
pub fn efx_envy_report(instance: &Instance, allocation: &Allocation) -> EnvyReport {
    build_report(instance, allocation, efx_envy)
}

/// Ordered (envier, envied) pairs with strictly positive EFX-envy, in roster
/// order of both sides. This is the redistribution phase's work queue.
pub fn efx_envy_pairs(instance: &Instance, allocation: &Allocation) -> Vec<(String, String)> {
    let report = efx_envy_report(instance, allocation);
    let mut pairs = Vec::new();
    for envier in instance.agents() {
        for envied in instance.agents() {
            if envier.name() != envied.name() && report.envy(envier.name(), envied.name()) > 0.0 {
                pairs.push((envier.name().to_string(), envied.name().to_string()));
            }
        }
    }
    pairs
}

fn build_report(
    instance: &Instance,
    allocation: &Allocation,
    pair_envy: fn(&Agent, &Allocation, &str) -> f64,
) -> EnvyReport {
    let mut matrix = BTreeMap::new();
    let mut by_envier = BTreeMap::new();
    let mut total = 0.0;
    for envier in instance.agents() {
        let mut row = BTreeMap::new();
        let mut row_total = 0.0;
        for envied in instance.agents() {
            let value = if envier.name() == envied.name() {
                0.0
            } else {
                pair_envy(envier, allocation, envied.name())
            };
            row.insert(envied.name().to_string(), value);
            row_total += value;
        }
        matrix.insert(envier.name().to_string(), row);
        by_envier.insert(envier.name().to_string(), row_total);
        total += row_total;
    }
    EnvyReport {
        matrix,
        by_envier,
        total,
    }
}

fn plain_envy(envier: &Agent, allocation: &Allocation, envied: &str) -> f64 {
    let own = envier.bundle_value(allocation.bundle(envier.name()));
    let other = envier.bundle_value(allocation.bundle(envied));
    (other - own).max(0.0)
}

fn efx_envy(envier: &Agent, allocation: &Allocation, envied: &str) -> f64 {
    let envied_bundle = allocation.bundle(envied);
    if envied_bundle.is_empty() {
        return 0.0;
    }
    let own = envier.bundle_value(allocation.bundle(envier.name()));

    let mut least_index = 0;
    let mut least_value = f64::INFINITY;
    for (index, good) in envied_bundle.iter().enumerate() {
        let value = envier.value(good);
        if value < least_value {
            least_value = value;
            least_index = index;
        }
    }
    let reduced: f64 = envied_bundle
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != least_index)
        .map(|(_, good)| envier.value(good))
        .sum();
    (reduced - own).max(0.0)
}
