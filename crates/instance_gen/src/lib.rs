use std::collections::BTreeMap;

use rand::Rng;

use allocation_model::{Good, PlayerSpec};

pub const DEFAULT_BASE_EPSILON: f64 = 1e-4;
pub const DEFAULT_VALUE_RANGE: (u32, u32) = (1, 10);

const PLAYER_NAMES: [&str; 4] = ["P1", "P2", "P3", "P4"];

/// Good labels in generation order: A..Z, then AA..ZZ, and so on.
pub fn generate_goods(count: usize) -> Vec<Good> {
    let mut goods = Vec::with_capacity(count);
    let mut width = 1u32;
    let mut block = 26usize;
    let mut index = 0usize;
    while goods.len() < count {
        if index == block {
            width += 1;
            block = 26usize.pow(width);
            index = 0;
        }
        let mut label = String::with_capacity(width as usize);
        for position in (0..width).rev() {
            let digit = index / 26usize.pow(position) % 26;
            label.push((b'A' + digit as u8) as char);
        }
        goods.push(label);
        index += 1;
    }
    goods
}

/// Epsilon small enough that the index-weighted perturbation cannot reorder
/// any subset comparison: base / 2^(m + 1) for m goods.
pub fn non_degeneracy_epsilon(good_count: usize, base_epsilon: f64) -> f64 {
    base_epsilon / 2f64.powi(good_count as i32 + 1)
}

/// Adds epsilon * 2^(j + 1) to every player's value for the good at index j.
/// The additive term grows strictly with the good index, so ties between
/// subsets break while each player's preference order is preserved.
pub fn apply_perturbation(
    players: &[PlayerSpec],
    goods: &[Good],
    epsilon: f64,
) -> Vec<PlayerSpec> {
    players
        .iter()
        .map(|player| {
            let valuation: BTreeMap<Good, f64> = goods
                .iter()
                .enumerate()
                .map(|(index, good)| {
                    let base = player.valuation.get(good).copied().unwrap_or(0.0);
                    (good.clone(), base + epsilon * 2f64.powi(index as i32 + 1))
                })
                .collect();
            PlayerSpec {
                name: player.name.clone(),
                valuation,
            }
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedCase {
    pub goods: Vec<Good>,
    pub players: Vec<PlayerSpec>,
    pub epsilon: f64,
}

/// Random 4-player case: integer valuations drawn uniformly from
/// `value_range`, perturbation always applied.
pub fn random_case<R: Rng>(
    good_count: usize,
    value_range: (u32, u32),
    base_epsilon: f64,
    rng: &mut R,
) -> GeneratedCase {
    let goods = generate_goods(good_count);
    let raw: Vec<PlayerSpec> = PLAYER_NAMES
        .iter()
        .map(|name| PlayerSpec {
            name: (*name).to_string(),
            valuation: goods
                .iter()
                .map(|good| {
                    let value = rng.gen_range(value_range.0..=value_range.1) as f64;
                    (good.clone(), value)
                })
                .collect(),
        })
        .collect();
    let epsilon = non_degeneracy_epsilon(goods.len(), base_epsilon);
    let players = apply_perturbation(&raw, &goods, epsilon);
    GeneratedCase {
        goods,
        players,
        epsilon,
    }
}
