use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use allocation_engine::Phase2Diagnostics;

use crate::{StoreError, StoredPlayer, load_entries, save_entries, timestamp_now};

pub const DEFAULT_PHASE2_CASE_FILE: &str = "phase2_tests.json";

/// An instance whose run reached the redistribution phase, kept with the
/// phase's execution record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Phase2Case {
    pub id: usize,
    pub timestamp: String,
    pub test_mode: String,
    pub goods: Vec<String>,
    pub players: Vec<StoredPlayer>,
    pub phase2: Phase2Diagnostics,
}

pub struct Phase2CaseStore {
    path: PathBuf,
}

impl Phase2CaseStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one case and returns its assigned id.
    pub fn append(
        &self,
        goods: &[String],
        players: &[StoredPlayer],
        test_mode: &str,
        phase2: Phase2Diagnostics,
    ) -> Result<usize, StoreError> {
        let mut entries = self.load_all()?;
        let id = entries.len() + 1;
        entries.push(Phase2Case {
            id,
            timestamp: timestamp_now(),
            test_mode: test_mode.to_string(),
            goods: goods.to_vec(),
            players: players.to_vec(),
            phase2,
        });
        save_entries(&self.path, &entries)?;
        Ok(id)
    }

    pub fn load_all(&self) -> Result<Vec<Phase2Case>, StoreError> {
        load_entries(&self.path)
    }

    pub fn get(&self, id: usize) -> Result<Option<Phase2Case>, StoreError> {
        let entries = self.load_all()?;
        if id >= 1 && id <= entries.len() {
            Ok(Some(entries[id - 1].clone()))
        } else {
            Ok(None)
        }
    }

    /// Deletion renumbers the remaining cases densely from 1.
    pub fn delete(&self, id: usize) -> Result<bool, StoreError> {
        let mut entries = self.load_all()?;
        if id >= 1 && id <= entries.len() {
            entries.remove(id - 1);
            for (index, entry) in entries.iter_mut().enumerate() {
                entry.id = index + 1;
            }
            save_entries(&self.path, &entries)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        save_entries::<Phase2Case>(&self.path, &[])
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

    fn scratch_store() -> Phase2CaseStore {
        let unique = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "phase2_cases_{}_{unique}.json",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        Phase2CaseStore::new(path)
    }

    fn players() -> Vec<StoredPlayer> {
        ["P1", "P2", "P3", "P4"]
            .iter()
            .map(|name| StoredPlayer {
                name: name.to_string(),
                valuation: BTreeMap::from([("A".to_string(), 1.0)]),
            })
            .collect()
    }

    fn diagnostics(steps: usize) -> Phase2Diagnostics {
        Phase2Diagnostics {
            executed: true,
            steps,
            improvements_found: true,
            efx_achieved: true,
            envy_reduction: 0.25,
            initial_envy: 0.5,
            final_envy: 0.25,
        }
    }

    #[test]
    fn appended_cases_get_sequential_ids() {
        let store = scratch_store();
        let goods = vec!["A".to_string()];
        assert_eq!(
            store
                .append(&goods, &players(), "single", diagnostics(1))
                .expect("append"),
            1
        );
        assert_eq!(
            store
                .append(&goods, &players(), "single", diagnostics(2))
                .expect("append"),
            2
        );
        let loaded = store.get(2).expect("get").expect("case");
        assert_eq!(loaded.id, 2);
        assert_eq!(loaded.phase2.steps, 2);

        let _ = std::fs::remove_file(store.path());
    }

    #[test]
    fn deletion_renumbers_the_remaining_cases() {
        let store = scratch_store();
        let goods = vec!["A".to_string()];
        for steps in 1..=3 {
            store
                .append(&goods, &players(), "batch", diagnostics(steps))
                .expect("append");
        }
        assert!(store.delete(2).expect("delete"));
        let entries = store.load_all().expect("load");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[0].phase2.steps, 1);
        assert_eq!(entries[1].id, 2);
        assert_eq!(entries[1].phase2.steps, 3);

        store.clear().expect("clear");
        assert_eq!(store.count().expect("count"), 0);

        let _ = std::fs::remove_file(store.path());
    }
}
