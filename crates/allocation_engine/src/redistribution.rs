use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

use allocation_model::{Agent, Allocation, Good, Instance};
use envy_analysis::{efx_envy_pairs, efx_envy_report};

/// Canonical snapshot for termination detection: the queued envy pairs plus
/// the sorted holdings of every agent involved in them. Compared structurally
/// in a set, never hashed.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Phase2State {
    pairs: Vec<(String, String)>,
    holdings: Vec<(String, Vec<Good>)>,
}

impl Phase2State {
    fn capture(queue: &[(String, String)], allocation: &Allocation) -> Self {
        let mut involved: BTreeSet<&String> = BTreeSet::new();
        for (envier, envied) in queue {
            involved.insert(envier);
            involved.insert(envied);
        }
        let holdings = involved
            .into_iter()
            .map(|name| {
                let mut goods = allocation.bundle(name).to_vec();
                goods.sort();
                (name.clone(), goods)
            })
            .collect();
        let mut pairs = queue.to_vec();
        pairs.sort();
        Self { pairs, holdings }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RedistributionError {
    CycleDetected { steps: usize },
    Exhausted { steps: usize, residual_efx_envy: f64 },
}

impl Display for RedistributionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleDetected { steps } => {
                write!(f, "redistribution revisited a prior state at step {steps}")
            }
            Self::Exhausted {
                steps,
                residual_efx_envy,
            } => {
                write!(
                    f,
                    "redistribution queue exhausted after {steps} steps with residual EFX-envy {residual_efx_envy}"
                )
            }
        }
    }
}

impl Error for RedistributionError {}

#[derive(Clone, Debug, PartialEq)]
pub struct RedistributionOutcome {
    pub allocation: Allocation,
    pub steps: usize,
}

/// Cut-and-choose repair between EFX-envying pairs, iterated until total
/// EFX-envy reaches exactly zero or the run is declared structurally stuck.
/// The queue is recomputed only when a step is accepted; rejected and skipped
/// pairs drain the current queue.
pub fn run(
    instance: &Instance,
    allocation: Allocation,
) -> Result<RedistributionOutcome, RedistributionError> {
    let mut current = allocation;
    let mut queue = efx_envy_pairs(instance, &current);
    let mut seen: BTreeSet<Phase2State> = BTreeSet::new();
    let mut steps = 0;

    while !queue.is_empty() {
        steps += 1;
        let state = Phase2State::capture(&queue, &current);
        if !seen.insert(state) {
            return Err(RedistributionError::CycleDetected { steps });
        }

        let (envier_name, envied_name) = queue.remove(0);
        let (Some(envier), Some(envied)) = (
            instance.agent(&envier_name),
            instance.agent(&envied_name),
        ) else {
            continue;
        };

        let current_efx_envy = efx_envy_report(instance, &current).total();

        let mut combined = current.bundle(&envier_name).to_vec();
        combined.extend_from_slice(current.bundle(&envied_name));
        if combined.len() < 2 {
            continue;
        }
        let Some((side_a, side_b)) = efx_division(envier, &combined) else {
            continue;
        };

        // The envied agent chooses; ties keep side A for the envier to lose.
        let value_a = envied.bundle_value(&side_a);
        let value_b = envied.bundle_value(&side_b);
        let (envied_side, envier_side) = if value_a >= value_b {
            (side_a, side_b)
        } else {
            (side_b, side_a)
        };

        let mut next_assignment = current.assignment().clone();
        next_assignment.insert(envier_name, envier_side);
        next_assignment.insert(envied_name, envied_side);
        let candidate = Allocation::from_assignment(instance, next_assignment);
        let new_efx_envy = efx_envy_report(instance, &candidate).total();

        let total_after = if new_efx_envy < current_efx_envy {
            current = candidate;
            queue = efx_envy_pairs(instance, &current);
            seen.clear();
            new_efx_envy
        } else {
            current_efx_envy
        };

        if total_after == 0.0 {
            return Ok(RedistributionOutcome {
                allocation: current,
                steps,
            });
        }
    }

    let residual = efx_envy_report(instance, &current).total();
    if residual == 0.0 {
        Ok(RedistributionOutcome {
            allocation: current,
            steps,
        })
    } else {
        Err(RedistributionError::Exhausted {
            steps,
            residual_efx_envy: residual,
        })
    }
}

fn efx_division(envier: &Agent, combined: &[Good]) -> Option<(Vec<Good>, Vec<Good>)> {
    let (side_a, side_b) = split_division(envier, combined)?;
    if division_is_efx(envier, &side_a, &side_b) {
        Some((side_a, side_b))
    } else {
        None
    }
}

/// Greedy balancing by the divider's own values: deal the goods in descending
/// value order, switching sides whenever the receiving side pulls ahead,
/// never on the last item. An empty side steals one item from the other.
fn split_division(agent: &Agent, goods: &[Good]) -> Option<(Vec<Good>, Vec<Good>)> {
    if goods.len() < 2 {
        return None;
    }
    let mut sorted: Vec<Good> = goods.to_vec();
    sorted.sort_by(|a, b| {
        agent
            .value(b)
            .partial_cmp(&agent.value(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total = sorted.len();
    let mut side_a: Vec<Good> = Vec::new();
    let mut side_b: Vec<Good> = Vec::new();
    let mut filling_a = true;
    for good in sorted {
        if filling_a {
            side_a.push(good);
            if agent.bundle_value(&side_a) > agent.bundle_value(&side_b) && total > side_a.len() {
                filling_a = false;
            }
        } else {
            side_b.push(good);
            if agent.bundle_value(&side_b) > agent.bundle_value(&side_a)
                && total > side_a.len() + side_b.len()
            {
                filling_a = true;
            }
        }
    }

    if side_a.is_empty() {
        side_a.push(side_b.pop()?);
    } else if side_b.is_empty() {
        side_b.push(side_a.pop()?);
    }
    Some((side_a, side_b))
}

/// The division stands only if the divider, holding either side, would not
/// envy the other side after any single removal from it.
fn division_is_efx(agent: &Agent, side_a: &[Good], side_b: &[Good]) -> bool {
    if side_a.is_empty() || side_b.is_empty() {
        return false;
    }
    let value_a = agent.bundle_value(side_a);
    let value_b = agent.bundle_value(side_b);
    for removed in side_b {
        let reduced: f64 = side_b
            .iter()
            .filter(|good| *good != removed)
            .map(|good| agent.value(good))
            .sum();
        if value_a < reduced {
            return false;
        }
    }
    for removed in side_a {
        let reduced: f64 = side_a
            .iter()
            .filter(|good| *good != removed)
            .map(|good| agent.value(good))
            .sum();
        if value_b < reduced {
            return false;
        }
    }
    true
}
