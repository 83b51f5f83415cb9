use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{StoreError, StoredPlayer, load_entries, save_entries, timestamp_now};

pub const DEFAULT_FAILED_CASE_FILE: &str = "failed_tests.json";

/// An instance the finder could not certify as EFX, kept for replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailedCase {
    pub timestamp: String,
    pub test_mode: String,
    pub num_goods: usize,
    pub goods: Vec<String>,
    pub players: Vec<StoredPlayer>,
}

pub struct FailedCaseStore {
    path: PathBuf,
}

impl FailedCaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one case and returns the new total count.
    pub fn append(
        &self,
        goods: &[String],
        players: &[StoredPlayer],
        test_mode: &str,
    ) -> Result<usize, StoreError> {
        let mut entries = self.load_all()?;
        entries.push(FailedCase {
            timestamp: timestamp_now(),
            test_mode: test_mode.to_string(),
            num_goods: goods.len(),
            goods: goods.to_vec(),
            players: players.to_vec(),
        });
        save_entries(&self.path, &entries)?;
        Ok(entries.len())
    }

    pub fn load_all(&self) -> Result<Vec<FailedCase>, StoreError> {
        load_entries(&self.path)
    }

    /// 1-based lookup, as shown in listings.
    pub fn get(&self, index: usize) -> Result<Option<FailedCase>, StoreError> {
        let entries = self.load_all()?;
        if index >= 1 && index <= entries.len() {
            Ok(Some(entries[index - 1].clone()))
        } else {
            Ok(None)
        }
    }

    pub fn delete(&self, index: usize) -> Result<bool, StoreError> {
        let mut entries = self.load_all()?;
        if index >= 1 && index <= entries.len() {
            entries.remove(index - 1);
            save_entries(&self.path, &entries)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        save_entries::<FailedCase>(&self.path, &[])
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load_all()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_store() -> FailedCaseStore {
        let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "failed_cases_{}_{unique}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        FailedCaseStore::new(path)
    }

    fn players() -> Vec<StoredPlayer> {
        ["P1", "P2", "P3", "P4"]
            .iter()
            .map(|name| StoredPlayer {
                name: name.to_string(),
                valuation: BTreeMap::from([("A".to_string(), 3.0), ("B".to_string(), 7.0)]),
            })
            .collect()
    }

    #[test]
    fn append_load_round_trips_raw_valuations() {
        let store = scratch_store();
        let goods = vec!["A".to_string(), "B".to_string()];
        assert_eq!(store.append(&goods, &players(), "single").expect("append"), 1);
        assert_eq!(store.append(&goods, &players(), "batch").expect("append"), 2);

        let entries = store.load_all().expect("load");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].test_mode, "single");
        assert_eq!(entries[0].num_goods, 2);
        assert_eq!(entries[0].players, players());
        assert_eq!(entries[1].test_mode, "batch");

        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn get_and_delete_use_one_based_indices() {
        let store = scratch_store();
        let goods = vec!["A".to_string(), "B".to_string()];
        store.append(&goods, &players(), "single").expect("append");
        store.append(&goods, &players(), "batch").expect("append");

        assert!(store.get(0).expect("get").is_none());
        assert_eq!(store.get(2).expect("get").map(|c| c.test_mode), Some("batch".to_string()));
        assert!(store.get(3).expect("get").is_none());

        assert!(store.delete(1).expect("delete"));
        assert!(!store.delete(5).expect("delete"));
        assert_eq!(store.count().expect("count"), 1);
        assert_eq!(
            store.get(1).expect("get").map(|c| c.test_mode),
            Some("batch".to_string())
        );

        store.clear().expect("clear");
        assert_eq!(store.count().expect("count"), 0);

        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn missing_and_corrupt_files_read_as_empty() {
        let store = scratch_store();
        assert_eq!(store.count().expect("count"), 0);

        std::fs::write(store.path(), "not json at all").expect("write");
        assert_eq!(store.count().expect("count"), 0);

        let _ = std::fs::remove_file(store.path());
    }
}
