pub mod champion_graph;
pub mod config;
pub mod finder;
pub mod redistribution;
pub mod round_robin;

pub use config::{EngineConfig, Phase1aConfig, Phase1bConfig};
pub use finder::{AllocationFinder, FinderError, FinderOutcome, Phase2Diagnostics};
pub use redistribution::{RedistributionError, RedistributionOutcome};
