use std::collections::BTreeMap;

use allocation_model::{Agent, Allocation, Good, Instance};
use envy_analysis::{efx_envy_report, envy_report};

use crate::config::Phase1bConfig;

/// Assign each leftover good, in original goods order, by building a fresh
/// champion graph around it and resolving any cycle it induces.
pub fn assign_remaining(
    instance: &Instance,
    assignment: &mut BTreeMap<String, Vec<Good>>,
    remaining: &[Good],
    config: &Phase1bConfig,
) {
    for good in remaining {
        assign_good(instance, assignment, good, config);
    }
}

fn assign_good(
    instance: &Instance,
    assignment: &mut BTreeMap<String, Vec<Good>>,
    good: &Good,
    config: &Phase1bConfig,
) {
    let graph = build_champion_graph(instance, assignment, good);
    let cycles = find_cycles(instance, &graph);
    if cycles.is_empty() {
        assign_to_source(instance, assignment, good, &graph);
    } else {
        let cycle = choose_best_cycle(instance, assignment, &cycles, good);
        resolve_cycle(instance, assignment, &cycle, good, config);
    }
}

/// Edge j -> c means c would gain the most, strictly positively, by swapping
/// its bundle for B_j plus the candidate good. Gain ties prefer the poorer
/// candidate.
fn build_champion_graph(
    instance: &Instance,
    assignment: &BTreeMap<String, Vec<Good>>,
    good: &Good,
) -> BTreeMap<String, String> {
    let mut graph = BTreeMap::new();
    for target in instance.agents() {
        let mut hypothetical = assignment.get(target.name()).cloned().unwrap_or_default();
        hypothetical.push(good.clone());

        let mut best_champion: Option<&Agent> = None;
        let mut best_gain = -1.0;
        let mut best_current_utility = f64::INFINITY;
        for candidate in instance.agents() {
            if candidate.name() == target.name() {
                continue;
            }
            let current_utility = candidate.bundle_value(bundle_of(assignment, candidate.name()));
            let gain = candidate.bundle_value(&hypothetical) - current_utility;
            if gain > best_gain || (gain == best_gain && current_utility < best_current_utility) {
                best_gain = gain;
                best_champion = Some(candidate);
                best_current_utility = current_utility;
            }
        }
        if let Some(champion) = best_champion {
            if best_gain > 0.0 {
                graph.insert(target.name().to_string(), champion.name().to_string());
            }
        }
    }
    graph
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Unvisited,
    OnPath,
    Done,
}

/// Iterative pointer-chase over the functional graph (out-degree <= 1): walk
/// from each unvisited node, marking the path; hitting a path node closes a
/// cycle, hitting an already-finished node cannot yield a new one.
fn find_cycles(instance: &Instance, graph: &BTreeMap<String, String>) -> Vec<Vec<String>> {
    let mut visit: BTreeMap<&str, Visit> = instance
        .agents()
        .iter()
        .map(|agent| (agent.name(), Visit::Unvisited))
        .collect();
    let mut cycles = Vec::new();

    for start in instance.agents().iter().map(Agent::name) {
        if !graph.contains_key(start) || visit.get(start) != Some(&Visit::Unvisited) {
            continue;
        }
        let mut path: Vec<&str> = Vec::new();
        let mut node = start;
        loop {
            match visit.get(node).copied().unwrap_or(Visit::Done) {
                Visit::Done => break,
                Visit::OnPath => {
                    if let Some(position) = path.iter().position(|n| *n == node) {
                        cycles.push(path[position..].iter().map(|n| n.to_string()).collect());
                    }
                    break;
                }
                Visit::Unvisited => {
                    visit.insert(node, Visit::OnPath);
                    path.push(node);
                    match graph.get(node) {
                        Some(next) => node = next.as_str(),
                        None => break,
                    }
                }
            }
        }
        for walked in path {
            visit.insert(walked, Visit::Done);
        }
    }
    cycles
}

fn choose_best_cycle(
    instance: &Instance,
    assignment: &BTreeMap<String, Vec<Good>>,
    cycles: &[Vec<String>],
    good: &Good,
) -> Vec<String> {
    if cycles.len() == 1 {
        return cycles[0].clone();
    }
    let mut best = &cycles[0];
    let mut best_reduction = 0.0;
    for cycle in cycles {
        let reduction = envy_reduction(instance, assignment, cycle, good);
        if reduction > best_reduction {
            best_reduction = reduction;
            best = cycle;
        }
    }
    best.clone()
}

/// Summed strictly positive gains of each member receiving the next member's
/// bundle, the cycle head also receiving the candidate good.
fn envy_reduction(
    instance: &Instance,
    assignment: &BTreeMap<String, Vec<Good>>,
    cycle: &[String],
    good: &Good,
) -> f64 {
    let mut total = 0.0;
    for (index, name) in cycle.iter().enumerate() {
        let Some(agent) = instance.agent(name) else {
            continue;
        };
        let current = agent.bundle_value(bundle_of(assignment, name));
        let next_name = &cycle[(index + 1) % cycle.len()];
        let mut next_bundle = assignment.get(next_name).cloned().unwrap_or_default();
        if index == 0 {
            next_bundle.push(good.clone());
        }
        let gain = agent.bundle_value(&next_bundle) - current;
        if gain > 0.0 {
            total += gain;
        }
    }
    total
}

/// Try handing the good to each cycle member outright, then try rotating the
/// bundles around the cycle; keep whichever leaves less total EFX-envy (plain
/// envy breaks ties, exact ties keep the direct hand-off).
fn resolve_cycle(
    instance: &Instance,
    assignment: &mut BTreeMap<String, Vec<Good>>,
    cycle: &[String],
    good: &Good,
    config: &Phase1bConfig,
) {
    let tolerance = config.tie_tolerance;

    let mut best_efx = f64::INFINITY;
    let mut best_envy = f64::INFINITY;
    let mut best_recipient: Option<String> = None;
    let mut tied: Vec<String> = Vec::new();

    for name in cycle {
        let mut test = assignment.clone();
        test.entry(name.clone()).or_default().push(good.clone());
        let (test_efx, test_envy) = envy_totals(instance, test);

        if test_efx < best_efx - tolerance {
            best_efx = test_efx;
            best_envy = test_envy;
            best_recipient = Some(name.clone());
            tied = vec![name.clone()];
        } else if (test_efx - best_efx).abs() <= tolerance {
            if test_envy < best_envy - tolerance {
                best_efx = test_efx;
                best_envy = test_envy;
                best_recipient = Some(name.clone());
                tied = vec![name.clone()];
            } else if (test_envy - best_envy).abs() <= tolerance {
                if test_efx < best_efx {
                    best_efx = test_efx;
                }
                if test_envy < best_envy {
                    best_envy = test_envy;
                }
                if !tied.contains(name) {
                    tied.push(name.clone());
                }
                if tied.len() == 1 {
                    if let Some(previous) = &best_recipient {
                        if !tied.contains(previous) {
                            tied.insert(0, previous.clone());
                        }
                    }
                }
                best_recipient = Some(name.clone());
            }
        }
    }

    let direct_recipient = if tied.len() > 1 {
        tied.iter()
            .min()
            .cloned()
            .unwrap_or_else(|| cycle[0].clone())
    } else {
        best_recipient.unwrap_or_else(|| cycle[0].clone())
    };

    let mut rotated = assignment.clone();
    let originals: BTreeMap<&String, Vec<Good>> = cycle
        .iter()
        .map(|name| (name, assignment.get(name).cloned().unwrap_or_default()))
        .collect();
    for (index, name) in cycle.iter().enumerate() {
        let next_name = &cycle[(index + 1) % cycle.len()];
        rotated.insert(name.clone(), originals[next_name].clone());
    }
    rotated
        .entry(cycle[0].clone())
        .or_default()
        .push(good.clone());
    let (rotation_efx, rotation_envy) = envy_totals(instance, rotated.clone());

    if (rotation_efx, rotation_envy) < (best_efx, best_envy) {
        *assignment = rotated;
    } else {
        assignment
            .entry(direct_recipient)
            .or_default()
            .push(good.clone());
    }
}

/// No cycle: hand the good to the poorest source (an agent whose augmented
/// bundle nobody covets); if every bundle is coveted, to whoever values the
/// good most.
fn assign_to_source(
    instance: &Instance,
    assignment: &mut BTreeMap<String, Vec<Good>>,
    good: &Good,
    graph: &BTreeMap<String, String>,
) {
    let sources: Vec<&Agent> = instance
        .agents()
        .iter()
        .filter(|agent| !graph.contains_key(agent.name()))
        .collect();

    let recipient = if sources.is_empty() {
        let mut best: Option<&Agent> = None;
        let mut best_value = -1.0;
        for agent in instance.agents() {
            let value = agent.value(good);
            if value > best_value {
                best_value = value;
                best = Some(agent);
            }
        }
        best
    } else {
        let mut best: Option<&Agent> = None;
        let mut lowest_utility = f64::INFINITY;
        for source in sources {
            let utility = source.bundle_value(bundle_of(assignment, source.name()));
            if utility < lowest_utility {
                lowest_utility = utility;
                best = Some(source);
            }
        }
        best
    };

    if let Some(agent) = recipient {
        assignment
            .entry(agent.name().to_string())
            .or_default()
            .push(good.clone());
    }
}

fn envy_totals(instance: &Instance, assignment: BTreeMap<String, Vec<Good>>) -> (f64, f64) {
    let allocation = Allocation::from_assignment(instance, assignment);
    (
        efx_envy_report(instance, &allocation).total(),
        envy_report(instance, &allocation).total(),
    )
}

fn bundle_of<'a>(assignment: &'a BTreeMap<String, Vec<Good>>, name: &str) -> &'a [Good] {
    assignment.get(name).map(Vec::as_slice).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocation_model::PlayerSpec;

    fn instance(goods: &[&str], tables: &[(&str, &[f64])]) -> Instance {
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

    fn assignment(bundles: &[(&str, &[&str])]) -> BTreeMap<String, Vec<Good>> {
        bundles
            .iter()
            .map(|(name, goods)| {
                (
                    name.to_string(),
                    goods.iter().map(|g| g.to_string()).collect(),
                )
            })
            .collect()
    }

    #[test]
    fn acyclic_graph_sends_the_good_to_the_poorest_source() {
        let instance = instance(
            &["A", "B", "C", "D"],
            &[
                ("P1", &[5.0, 3.0, 1.0, 2.0]),
                ("P2", &[2.0, 5.0, 3.0, 1.0]),
                ("P3", &[1.0, 2.0, 5.0, 3.0]),
                ("P4", &[3.0, 1.0, 2.0, 5.0]),
            ],
        );
        let mut current = assignment(&[("P1", &["A"]), ("P2", &["B"]), ("P3", &["C"]), ("P4", &[])]);
        let good = "D".to_string();

        let graph = build_champion_graph(&instance, &current, &good);
        // Empty-handed P4 champions every augmented bundle; its own draws no edge.
        assert_eq!(graph.get("P1"), Some(&"P4".to_string()));
        assert_eq!(graph.get("P2"), Some(&"P4".to_string()));
        assert_eq!(graph.get("P3"), Some(&"P4".to_string()));
        assert_eq!(graph.get("P4"), None);
        assert!(find_cycles(&instance, &graph).is_empty());

        assign_good(&instance, &mut current, &good, &Phase1bConfig::default());
        assert_eq!(current["P4"], vec!["D".to_string()]);
    }

    #[test]
    fn two_cycle_resolves_by_rotation_when_it_clears_efx_envy() {
        let instance = instance(
            &["X", "Y", "G3", "G4", "Z"],
            &[
                ("P1", &[4.0, 7.0, 1.0, 1.0, 7.0]),
                ("P2", &[7.0, 4.0, 1.0, 1.0, 7.0]),
                ("P3", &[2.0, 2.0, 10.0, 2.0, 4.0]),
                ("P4", &[2.0, 2.0, 2.0, 10.0, 4.0]),
            ],
        );
        let mut current = assignment(&[
            ("P1", &["X"]),
            ("P2", &["Y"]),
            ("P3", &["G3"]),
            ("P4", &["G4"]),
        ]);
        let good = "Z".to_string();

        let graph = build_champion_graph(&instance, &current, &good);
        assert_eq!(graph.get("P1"), Some(&"P2".to_string()));
        assert_eq!(graph.get("P2"), Some(&"P1".to_string()));
        let cycles = find_cycles(&instance, &graph);
        assert_eq!(cycles, vec![vec!["P1".to_string(), "P2".to_string()]]);

        assign_good(&instance, &mut current, &good, &Phase1bConfig::default());
        // Rotation: P1 takes P2's bundle plus the good, P2 takes P1's old one.
        assert_eq!(current["P1"], vec!["Y".to_string(), "Z".to_string()]);
        assert_eq!(current["P2"], vec!["X".to_string()]);
        assert_eq!(current["P3"], vec!["G3".to_string()]);
        assert_eq!(current["P4"], vec!["G4".to_string()]);
    }
}
