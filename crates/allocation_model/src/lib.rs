pub mod allocation;
pub mod error;
pub mod instance;
pub mod valuation;

pub use allocation::Allocation;
pub use error::ModelError;
pub use instance::{Agent, Instance, PLAYER_COUNT, PlayerSpec};
pub use valuation::{Good, ValuationProfile};
