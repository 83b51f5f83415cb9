use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use allocation_model::{Allocation, Good, Instance};
use envy_analysis::{check_efx, envy_report};

use crate::config::EngineConfig;
use crate::redistribution::{self, RedistributionError};
use crate::{champion_graph, round_robin};

/// Execution record of the redistribution phase, shaped for storage next to
/// the instance that produced it. Envy figures are plain-envy totals.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Phase2Diagnostics {
    pub executed: bool,
    pub steps: usize,
    pub improvements_found: bool,
    pub efx_achieved: bool,
    pub envy_reduction: f64,
    pub initial_envy: f64,
    pub final_envy: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FinderOutcome {
    pub allocation: Allocation,
    pub efx: bool,
    pub phase2: Phase2Diagnostics,
}

#[derive(Clone, Debug, PartialEq)]
pub enum FinderError {
    Redistribution(RedistributionError),
}

impl Display for FinderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Redistribution(inner) => write!(f, "{inner}"),
        }
    }
}

impl Error for FinderError {}

impl From<RedistributionError> for FinderError {
    fn from(inner: RedistributionError) -> Self {
        Self::Redistribution(inner)
    }
}

/// Runs the three phases in sequence: round robin, champion graph for the
/// leftovers, and (only when the result is not EFX) cut-and-choose
/// redistribution. Valuation profiles are never touched after construction.
pub struct AllocationFinder<'a> {
    instance: &'a Instance,
    config: EngineConfig,
}

impl<'a> AllocationFinder<'a> {
    pub fn new(instance: &'a Instance, config: EngineConfig) -> Self {
        Self { instance, config }
    }

    pub fn find(&self) -> Result<FinderOutcome, FinderError> {
        let mut assignment = round_robin::run(self.instance, &self.config.phase1a);
        let remaining: Vec<Good> = {
            let assigned: BTreeSet<&Good> = assignment.values().flatten().collect();
            self.instance
                .goods()
                .iter()
                .filter(|good| !assigned.contains(good))
                .cloned()
                .collect()
        };
        champion_graph::assign_remaining(
            self.instance,
            &mut assignment,
            &remaining,
            &self.config.phase1b,
        );
        let mut allocation = Allocation::from_assignment(self.instance, assignment);

        let mut phase2 = Phase2Diagnostics::default();
        let mut efx = check_efx(self.instance, &allocation);
        if !efx {
            phase2.executed = true;
            phase2.initial_envy = envy_report(self.instance, &allocation).total();
            phase2.final_envy = phase2.initial_envy;

            let outcome = redistribution::run(self.instance, allocation.clone())?;
            allocation = outcome.allocation;
            phase2.steps = outcome.steps;
            phase2.improvements_found = true;
            phase2.final_envy = envy_report(self.instance, &allocation).total();
            phase2.envy_reduction = phase2.initial_envy - phase2.final_envy;
            efx = check_efx(self.instance, &allocation);
            phase2.efx_achieved = efx;
        }

        Ok(FinderOutcome {
            allocation,
            efx,
            phase2,
        })
    }
}
