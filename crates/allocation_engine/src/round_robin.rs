use std::collections::BTreeMap;

use allocation_model::{Agent, Good, Instance};

use crate::config::Phase1aConfig;

/// Single round-robin pass: one pick per agent, sharpest preferences first.
/// Agents with higher valuation dispersion pick earlier; equal dispersions
/// break lexicographically by name. Each picker weighs its own sacrifice
/// against the greedy benefit to later pickers. Goods left over feed the
/// champion-graph phase.
pub fn run(instance: &Instance, config: &Phase1aConfig) -> BTreeMap<String, Vec<Good>> {
    let mut assignment: BTreeMap<String, Vec<Good>> = instance
        .agents()
        .iter()
        .map(|agent| (agent.name().to_string(), Vec::new()))
        .collect();
    let mut pool: Vec<Good> = instance.goods().to_vec();

    let order = pick_order(instance);
    for (turn, agent) in order.iter().enumerate() {
        if pool.is_empty() {
            break;
        }
        let followers = &order[turn + 1..];
        let options = top_options(agent, &pool, config.top_options_to_consider);
        let Some(best) = options.first() else { break };

        let chosen = if followers.is_empty() {
            best.good.clone()
        } else {
            choose_with_consideration(&options, followers, &pool, config)
        };

        assignment
            .entry(agent.name().to_string())
            .or_default()
            .push(chosen.clone());
        pool.retain(|good| *good != chosen);
    }
    assignment
}

fn pick_order(instance: &Instance) -> Vec<&Agent> {
    let mut order: Vec<&Agent> = instance.agents().iter().collect();
    order.sort_by(|a, b| {
        b.dispersion()
            .partial_cmp(&a.dispersion())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name().cmp(b.name()))
    });
    order
}

#[derive(Clone, Debug)]
struct RankedOption {
    good: Good,
    value: f64,
}

fn top_options(agent: &Agent, pool: &[Good], top_n: usize) -> Vec<RankedOption> {
    let mut options: Vec<RankedOption> = pool
        .iter()
        .map(|good| RankedOption {
            good: good.clone(),
            value: agent.value(good),
        })
        .collect();
    options.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(std::cmp::Ordering::Equal));
    options.truncate(top_n);
    options
}

fn choose_with_consideration(
    options: &[RankedOption],
    followers: &[&Agent],
    pool: &[Good],
    config: &Phase1aConfig,
) -> Good {
    let best_value = options[0].value;
    let mut best_choice = options[0].good.clone();
    let mut best_score = 0.0;
    let mut tied: Vec<Good> = Vec::new();

    for option in options {
        let sacrifice = best_value - option.value;
        let sacrifice_ratio = if best_value > 0.0 {
            sacrifice / best_value
        } else {
            0.0
        };
        if sacrifice_ratio > config.max_sacrifice_threshold {
            continue;
        }

        let pool_after: Vec<Good> = pool
            .iter()
            .filter(|good| **good != option.good)
            .cloned()
            .collect();
        let benefit = future_benefit(followers, &pool_after);
        let score = benefit - sacrifice;

        if score > best_score + config.tie_tolerance {
            best_score = score;
            best_choice = option.good.clone();
            tied = vec![option.good.clone()];
        } else if (score - best_score).abs() <= config.tie_tolerance && best_score > 0.0 {
            tied.push(option.good.clone());
        }
    }

    if tied.len() > 1 {
        best_choice = break_tie_by_opportunity_cost(&tied, followers[0], pool);
    }
    best_choice
}

/// Greedy one-pass lookahead: each follower in order takes its best-valued
/// remaining good; the summed picks are averaged over all followers.
fn future_benefit(followers: &[&Agent], pool_after: &[Good]) -> f64 {
    if followers.is_empty() || pool_after.is_empty() {
        return 0.0;
    }
    let mut simulated: Vec<Good> = pool_after.to_vec();
    let mut total = 0.0;
    for follower in followers {
        if simulated.is_empty() {
            break;
        }
        let mut best_value = 0.0;
        let mut best_index: Option<usize> = None;
        for (index, good) in simulated.iter().enumerate() {
            let value = follower.value(good);
            if value > best_value {
                best_value = value;
                best_index = Some(index);
            }
        }
        if let Some(index) = best_index {
            total += best_value;
            simulated.remove(index);
        }
    }
    total / followers.len() as f64
}

/// Among score-tied options, take the one least harmful to the very next
/// picker: lowest (most negative) gap between what that picker loses here and
/// its best alternative afterwards.
fn break_tie_by_opportunity_cost(tied: &[Good], next_agent: &Agent, pool: &[Good]) -> Good {
    let mut best = tied[0].clone();
    let mut lowest_cost = f64::INFINITY;
    for good in tied {
        let remaining: Vec<&Good> = pool.iter().filter(|g| *g != good).collect();
        let cost = if remaining.is_empty() {
            -next_agent.value(good)
        } else {
            let best_alternative = remaining
                .iter()
                .map(|g| next_agent.value(g))
                .fold(f64::NEG_INFINITY, f64::max);
            next_agent.value(good) - best_alternative
        };
        if cost < lowest_cost {
            lowest_cost = cost;
            best = good.clone();
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocation_model::PlayerSpec;

    fn instance(tables: &[(&str, [f64; 4])]) -> Instance {
        let goods = ["A", "B", "C", "D"];
        let players = tables
            .iter()
            .map(|(name, values)| PlayerSpec {
                name: name.to_string(),
                valuation: goods
                    .iter()
                    .zip(values.iter())
                    .map(|(good, value)| (good.to_string(), *value))
                    .collect(),
            })
            .collect();
        Instance::new(goods.iter().map(|g| g.to_string()).collect(), players, 1.0)
            .expect("instance")
    }

    fn bundle<'a>(assignment: &'a BTreeMap<String, Vec<Good>>, name: &str) -> &'a [Good] {
        assignment.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    #[test]
    fn order_follows_dispersion_then_name() {
        let instance = instance(&[
            ("P1", [7.0, 1.0, 1.0, 1.0]),
            ("P2", [1.0, 6.0, 2.0, 1.0]),
            ("P3", [2.0, 2.0, 5.0, 1.0]),
            ("P4", [3.0, 3.0, 2.0, 2.0]),
        ]);
        let order: Vec<&str> = pick_order(&instance).iter().map(|a| a.name()).collect();
        assert_eq!(order, vec!["P1", "P2", "P3", "P4"]);
    }

    #[test]
    fn each_agent_takes_its_clear_favorite() {
        let instance = instance(&[
            ("P1", [7.0, 1.0, 1.0, 1.0]),
            ("P2", [1.0, 6.0, 2.0, 1.0]),
            ("P3", [2.0, 2.0, 5.0, 1.0]),
            ("P4", [3.0, 3.0, 2.0, 2.0]),
        ]);
        let assignment = run(&instance, &Phase1aConfig::default());
        assert_eq!(bundle(&assignment, "P1"), ["A".to_string()]);
        assert_eq!(bundle(&assignment, "P2"), ["B".to_string()]);
        assert_eq!(bundle(&assignment, "P3"), ["C".to_string()]);
        assert_eq!(bundle(&assignment, "P4"), ["D".to_string()]);
    }

    #[test]
    fn score_ties_break_by_opportunity_cost_for_the_next_picker() {
        // P1 is indifferent between A and B and both leave the followers the
        // same greedy haul; the tie resolves toward B because P2 cares less
        // about losing B than A.
        let instance = instance(&[
            ("P1", [40.0, 40.0, 15.0, 5.0]),
            ("P2", [20.0, 10.0, 30.0, 40.0]),
            ("P3", [20.0, 20.0, 25.0, 35.0]),
            ("P4", [25.0, 25.0, 24.0, 26.0]),
        ]);
        let order: Vec<&str> = pick_order(&instance).iter().map(|a| a.name()).collect();
        assert_eq!(order, vec!["P1", "P2", "P3", "P4"]);

        let assignment = run(&instance, &Phase1aConfig::default());
        assert_eq!(bundle(&assignment, "P1"), ["B".to_string()]);
        assert_eq!(bundle(&assignment, "P2"), ["D".to_string()]);
        assert_eq!(bundle(&assignment, "P3"), ["C".to_string()]);
        assert_eq!(bundle(&assignment, "P4"), ["A".to_string()]);
    }

    #[test]
    fn leftover_goods_stay_in_the_pool() {
        let goods = ["A", "B", "C", "D", "E", "F"];
        let players = ["P1", "P2", "P3", "P4"]
            .iter()
            .enumerate()
            .map(|(index, name)| PlayerSpec {
                name: name.to_string(),
                valuation: goods
                    .iter()
                    .enumerate()
                    .map(|(j, good)| {
                        let value = if j == index { 10.0 } else { 1.0 + j as f64 * 0.01 };
                        (good.to_string(), value)
                    })
                    .collect(),
            })
            .collect();
        let instance = Instance::new(
            goods.iter().map(|g| g.to_string()).collect(),
            players,
            1.0,
        )
        .expect("instance");

        let assignment = run(&instance, &Phase1aConfig::default());
        let assigned: usize = assignment.values().map(Vec::len).sum();
        assert_eq!(assigned, 4);
    }
}
