use allocation_model::{Allocation, Instance};

/// EFX verdict for a full allocation. For every ordered pair (i, j) with a
/// nonempty bundle B_j, some single removal from B_j must bring its value to
/// i down to i's own utility; a pair where every removal leaves envy fails
/// the whole allocation. Total and side-effect free.
pub fn check_efx(instance: &Instance, allocation: &Allocation) -> bool {
    for envier in instance.agents() {
        for envied in instance.agents() {
            if envier.name() == envied.name() {
                continue;
            }
            let envied_bundle = allocation.bundle(envied.name());
            if envied_bundle.is_empty() {
                continue;
            }
            let own = allocation.utility(envier.name());

            let mut envy_survives_every_removal = true;
            for removed in envied_bundle {
                let reduced: f64 = envied_bundle
                    .iter()
                    .filter(|good| *good != removed)
                    .map(|good| envier.value(good))
                    .sum();
                if own >= reduced {
                    envy_survives_every_removal = false;
                    break;
                }
            }
            if envy_survives_every_removal {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocation_model::PlayerSpec;
    use std::collections::BTreeMap;

    fn instance() -> Instance {
        let tables = [
            ("P1", [5.0, 3.0, 1.0, 2.0]),
            ("P2", [2.0, 5.0, 3.0, 1.0]),
            ("P3", [1.0, 2.0, 5.0, 3.0]),
            ("P4", [3.0, 1.0, 2.0, 5.0]),
        ];
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

    fn allocate(instance: &Instance, bundles: &[(&str, &[&str])]) -> Allocation {
        let assignment: BTreeMap<String, Vec<String>> = bundles
            .iter()
            .map(|(name, goods)| {
                (
                    name.to_string(),
                    goods.iter().map(|g| g.to_string()).collect(),
                )
            })
            .collect();
        Allocation::from_assignment(instance, assignment)
    }

    #[test]
    fn one_favorite_good_each_is_efx() {
        let instance = instance();
        let allocation = allocate(
            &instance,
            &[("P1", &["A"]), ("P2", &["B"]), ("P3", &["C"]), ("P4", &["D"])],
        );
        assert!(check_efx(&instance, &allocation));
    }

    #[test]
    fn empty_handed_agent_envying_a_pair_is_not_efx() {
        let instance = instance();
        let allocation = allocate(
            &instance,
            &[("P1", &["A", "D"]), ("P2", &["B"]), ("P3", &["C"])],
        );
        // P4 holds nothing and envies P1 after removing either item.
        assert!(!check_efx(&instance, &allocation));
    }

    #[test]
    fn concentrated_bundle_is_not_efx() {
        let instance = instance();
        let allocation = allocate(&instance, &[("P1", &["A", "B", "C"]), ("P2", &["D"])]);
        // P3 envies P1's bundle after removing any single item.
        assert!(!check_efx(&instance, &allocation));
    }

    #[test]
    fn envy_cleared_by_some_removal_passes_that_pair() {
        let instance = instance();
        let allocation = allocate(
            &instance,
            &[("P1", &["B"]), ("P2", &["A", "C"]), ("P3", &["D"])],
        );
        // P1 vs P2 clears once A is removed, but P4 holds nothing and still
        // envies P2 whichever item goes.
        assert!(!check_efx(&instance, &allocation));
    }

    #[test]
    fn checker_is_pure() {
        let instance = instance();
        let allocation = allocate(
            &instance,
            &[("P1", &["A", "D"]), ("P2", &["B"]), ("P3", &["C"])],
        );
        let before = allocation.clone();
        let first = check_efx(&instance, &allocation);
        let second = check_efx(&instance, &allocation);
        assert_eq!(first, second);
        assert_eq!(allocation, before);
    }
}
