use std::collections::BTreeMap;

use serde::Serialize;

use crate::instance::Instance;
use crate::valuation::Good;

/// One assignment of goods to agents with cached utilities. Utilities are
/// derived from the instance's normalized profiles at construction time.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Allocation {
    assignment: BTreeMap<String, Vec<Good>>,
    utility: BTreeMap<String, f64>,
}

impl Allocation {
    pub fn from_assignment(instance: &Instance, mut assignment: BTreeMap<String, Vec<Good>>) -> Self {
        for agent in instance.agents() {
            assignment.entry(agent.name().to_string()).or_default();
        }
        let utility = instance
            .agents()
            .iter()
            .map(|agent| {
                let bundle = assignment
                    .get(agent.name())
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                (agent.name().to_string(), agent.bundle_value(bundle))
            })
            .collect();
        Self {
            assignment,
            utility,
        }
    }

    pub fn bundle(&self, name: &str) -> &[Good] {
        self.assignment
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn utility(&self, name: &str) -> f64 {
        self.utility.get(name).copied().unwrap_or(0.0)
    }

    pub fn assignment(&self) -> &BTreeMap<String, Vec<Good>> {
        &self.assignment
    }

    pub fn assigned_count(&self) -> usize {
        self.assignment.values().map(Vec::len).sum()
    }
}
