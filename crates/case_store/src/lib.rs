use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub mod failed;
pub mod phase2;

pub use failed::{DEFAULT_FAILED_CASE_FILE, FailedCase, FailedCaseStore};
pub use phase2::{DEFAULT_PHASE2_CASE_FILE, Phase2Case, Phase2CaseStore};

#[derive(Clone, Debug, PartialEq)]
pub enum StoreError {
    Io(String),
    Format(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(message) => write!(f, "store i/o error: {message}"),
            Self::Format(message) => write!(f, "store format error: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Raw (pre-normalization) valuations for one player, as persisted. Replay
/// rebuilds instances from these so a stored run reproduces exactly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredPlayer {
    pub name: String,
    pub valuation: BTreeMap<String, f64>,
}

/// Missing or undecodable files read as an empty store; only writes fail.
fn load_entries<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => {
            return Err(StoreError::Io(format!(
                "failed to read {}: {error}",
                path.display()
            )));
        }
    };
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&text).unwrap_or_default())
}

fn save_entries<T: Serialize>(path: &Path, entries: &[T]) -> Result<(), StoreError> {
    let payload = serde_json::to_string_pretty(entries).map_err(|error| {
        StoreError::Format(format!("failed to encode {}: {error}", path.display()))
    })?;
    fs::write(path, payload)
        .map_err(|error| StoreError::Io(format!("failed to write {}: {error}", path.display())))
}

fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
