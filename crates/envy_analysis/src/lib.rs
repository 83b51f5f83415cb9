pub mod checker;
pub mod envy;

pub use checker::check_efx;
pub use envy::{EnvyReport, efx_envy_pairs, efx_envy_report, envy_report};
