use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::valuation::{Good, ValuationProfile};

pub const PLAYER_COUNT: usize = 4;

/// Raw input for one player, as supplied by callers or loaded from storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSpec {
    pub name: String,
    pub valuation: BTreeMap<Good, f64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    name: String,
    raw: BTreeMap<Good, f64>,
    profile: ValuationProfile,
}

impl Agent {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self, good: &str) -> f64 {
        self.profile.value(good)
    }

    pub fn bundle_value(&self, goods: &[Good]) -> f64 {
        self.profile.bundle_value(goods)
    }

    pub fn dispersion(&self) -> f64 {
        self.profile.dispersion()
    }

    pub fn profile(&self) -> &ValuationProfile {
        &self.profile
    }

    pub fn raw_valuation(&self) -> &BTreeMap<Good, f64> {
        &self.raw
    }
}

/// A validated problem input: the ordered goods and the four agents with
/// their normalized valuation profiles.
#[derive(Clone, Debug, PartialEq)]
pub struct Instance {
    goods: Vec<Good>,
    agents: Vec<Agent>,
}

impl Instance {
    pub fn new(
        goods: Vec<Good>,
        players: Vec<PlayerSpec>,
        normalization_target: f64,
    ) -> Result<Self, ModelError> {
        if players.len() != PLAYER_COUNT {
            return Err(ModelError::WrongPlayerCount(players.len()));
        }
        let mut seen_goods: BTreeSet<&Good> = BTreeSet::new();
        for good in &goods {
            if !seen_goods.insert(good) {
                return Err(ModelError::DuplicateGood(good.clone()));
            }
        }
        let mut seen_names: BTreeSet<&str> = BTreeSet::new();
        for player in &players {
            if !seen_names.insert(player.name.as_str()) {
                return Err(ModelError::DuplicateAgent(player.name.clone()));
            }
            for good in &goods {
                match player.valuation.get(good) {
                    None => {
                        return Err(ModelError::MissingValuation {
                            player: player.name.clone(),
                            good: good.clone(),
                        });
                    }
                    Some(value) if *value < 0.0 => {
                        return Err(ModelError::NegativeValuation {
                            player: player.name.clone(),
                            good: good.clone(),
                            value: *value,
                        });
                    }
                    Some(_) => {}
                }
            }
        }
        let agents = players
            .into_iter()
            .map(|player| {
                let profile = ValuationProfile::from_raw(&player.valuation, normalization_target);
                Agent {
                    name: player.name,
                    raw: player.valuation,
                    profile,
                }
            })
            .collect();
        Ok(Self { goods, agents })
    }

    pub fn goods(&self) -> &[Good] {
        &self.goods
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|agent| agent.name() == name)
    }

    /// The raw input this instance was built from, for persistence and replay.
    pub fn player_specs(&self) -> Vec<PlayerSpec> {
        self.agents
            .iter()
            .map(|agent| PlayerSpec {
                name: agent.name().to_string(),
                valuation: agent.raw_valuation().clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, entries: &[(&str, f64)]) -> PlayerSpec {
        PlayerSpec {
            name: name.to_string(),
            valuation: entries
                .iter()
                .map(|(good, value)| (good.to_string(), *value))
                .collect(),
        }
    }

    fn goods(labels: &[&str]) -> Vec<Good> {
        labels.iter().map(|label| label.to_string()).collect()
    }

    #[test]
    fn rejects_player_counts_other_than_four() {
        let players = vec![spec("P1", &[("A", 1.0)]), spec("P2", &[("A", 1.0)])];
        assert_eq!(
            Instance::new(goods(&["A"]), players, 1.0),
            Err(ModelError::WrongPlayerCount(2))
        );
    }

    #[test]
    fn rejects_duplicate_names_goods_and_missing_values() {
        let full = |name: &str| spec(name, &[("A", 1.0), ("B", 2.0)]);
        let dup_names = vec![full("P1"), full("P1"), full("P3"), full("P4")];
        assert_eq!(
            Instance::new(goods(&["A", "B"]), dup_names, 1.0),
            Err(ModelError::DuplicateAgent("P1".to_string()))
        );

        let players = vec![full("P1"), full("P2"), full("P3"), full("P4")];
        assert_eq!(
            Instance::new(goods(&["A", "A"]), players.clone(), 1.0),
            Err(ModelError::DuplicateGood("A".to_string()))
        );

        let mut missing = players.clone();
        missing[2] = spec("P3", &[("A", 1.0)]);
        assert_eq!(
            Instance::new(goods(&["A", "B"]), missing, 1.0),
            Err(ModelError::MissingValuation {
                player: "P3".to_string(),
                good: "B".to_string(),
            })
        );

        let mut negative = players;
        negative[1] = spec("P2", &[("A", 1.0), ("B", -3.0)]);
        assert_eq!(
            Instance::new(goods(&["A", "B"]), negative, 1.0),
            Err(ModelError::NegativeValuation {
                player: "P2".to_string(),
                good: "B".to_string(),
                value: -3.0,
            })
        );
    }

    #[test]
    fn agents_carry_normalized_profiles_and_raw_tables() {
        let players = vec![
            spec("P1", &[("A", 6.0), ("B", 4.0)]),
            spec("P2", &[("A", 1.0), ("B", 1.0)]),
            spec("P3", &[("A", 2.0), ("B", 8.0)]),
            spec("P4", &[("A", 5.0), ("B", 5.0)]),
        ];
        let instance = Instance::new(goods(&["A", "B"]), players.clone(), 1.0).expect("instance");
        assert_eq!(instance.agents().len(), 4);
        assert!((instance.agents()[0].value("A") - 0.6).abs() < 1e-12);
        assert_eq!(instance.agents()[0].raw_valuation()["A"], 6.0);
        assert_eq!(instance.player_specs(), players);
        assert!(instance.agent("P3").is_some());
        assert!(instance.agent("P9").is_none());
    }
}
