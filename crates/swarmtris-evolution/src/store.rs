//! Policy persistence between phases.
//!
//! During the `persist` phase every agent saves its policy under its label;
//! during `crossover` each agent loads two parents by label. Any store that
//! can hold JSON by label works.

use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};

use crate::AgentId;

/// Storage label of an agent's policy (`agent-<id>`).
#[must_use]
pub fn policy_label(id: AgentId) -> String {
    format!("agent-{}", id.index())
}

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum PolicyStoreError {
    #[display("no policy stored under '{label}'")]
    Missing { label: String },
    #[display("policy file I/O failed: {}", path.display())]
    Io { path: PathBuf, source: io::Error },
    #[display("policy '{label}' could not be encoded or decoded")]
    Json {
        label: String,
        source: serde_json::Error,
    },
}

/// Keyed storage for policies.
pub trait PolicyStore<P>: Send + Sync + 'static {
    fn save(&self, label: &str, policy: &P) -> Result<(), PolicyStoreError>;
    fn load(&self, label: &str) -> Result<P, PolicyStoreError>;
}

/// In-process store holding each policy as a JSON string.
#[derive(Debug, Default)]
pub struct MemoryPolicyStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryPolicyStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<P> PolicyStore<P> for MemoryPolicyStore
where
    P: Serialize + DeserializeOwned,
{
    fn save(&self, label: &str, policy: &P) -> Result<(), PolicyStoreError> {
        let json = serde_json::to_string(policy).map_err(|source| PolicyStoreError::Json {
            label: label.to_owned(),
            source,
        })?;
        self.entries.write().insert(label.to_owned(), json);
        Ok(())
    }

    fn load(&self, label: &str) -> Result<P, PolicyStoreError> {
        let entries = self.entries.read();
        let json = entries.get(label).ok_or_else(|| PolicyStoreError::Missing {
            label: label.to_owned(),
        })?;
        serde_json::from_str(json).map_err(|source| PolicyStoreError::Json {
            label: label.to_owned(),
            source,
        })
    }
}

/// Store writing one pretty-printed `<label>.json` file per policy.
#[derive(Debug, Clone)]
pub struct JsonDirPolicyStore {
    dir: PathBuf,
}

impl JsonDirPolicyStore {
    /// Opens a store in `dir`, creating the directory if needed.
    pub fn new<D>(dir: D) -> Result<Self, PolicyStoreError>
    where
        D: Into<PathBuf>,
    {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| PolicyStoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn path_for(&self, label: &str) -> PathBuf {
        self.dir.join(format!("{label}.json"))
    }
}

impl<P> PolicyStore<P> for JsonDirPolicyStore
where
    P: Serialize + DeserializeOwned,
{
    fn save(&self, label: &str, policy: &P) -> Result<(), PolicyStoreError> {
        let path = self.path_for(label);
        let json = serde_json::to_string_pretty(policy).map_err(|source| {
            PolicyStoreError::Json {
                label: label.to_owned(),
                source,
            }
        })?;
        fs::write(&path, json).map_err(|source| PolicyStoreError::Io { path, source })
    }

    fn load(&self, label: &str) -> Result<P, PolicyStoreError> {
        let path = self.path_for(label);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PolicyStoreError::Missing {
                    label: label.to_owned(),
                });
            }
            Err(source) => return Err(PolicyStoreError::Io { path, source }),
        };
        serde_json::from_str(&json).map_err(|source| PolicyStoreError::Json {
            label: label.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::{SystemTime, UNIX_EPOCH};

    use rand::SeedableRng as _;
    use rand_pcg::Pcg32;

    use super::*;
    use crate::NeuralPolicy;

    fn policy() -> NeuralPolicy {
        NeuralPolicy::random(8, 4, &mut Pcg32::seed_from_u64(3))
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "swarmtris-{name}-{}-{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn test_policy_label() {
        assert_eq!(policy_label(AgentId::new(17)), "agent-17");
    }

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryPolicyStore::new();
        let policy = policy();
        store.save("agent-0", &policy).unwrap();
        assert_eq!(store.len(), 1);
        let loaded: NeuralPolicy = store.load("agent-0").unwrap();
        assert_eq!(loaded, policy);
    }

    #[test]
    fn test_memory_store_missing() {
        let store = MemoryPolicyStore::new();
        let err = PolicyStore::<NeuralPolicy>::load(&store, "agent-9").unwrap_err();
        assert!(matches!(err, PolicyStoreError::Missing { ref label } if label == "agent-9"));
        assert_eq!(err.to_string(), "no policy stored under 'agent-9'");
    }

    #[test]
    fn test_dir_store_round_trip() {
        let dir = scratch_dir("store");
        let store = JsonDirPolicyStore::new(&dir).unwrap();
        let policy = policy();
        store.save("agent-3", &policy).unwrap();
        assert!(store.path_for("agent-3").is_file());

        let loaded: NeuralPolicy = store.load("agent-3").unwrap();
        assert_eq!(loaded, policy);

        let missing = PolicyStore::<NeuralPolicy>::load(&store, "agent-4");
        assert!(matches!(missing, Err(PolicyStoreError::Missing { .. })));

        fs::write(store.path_for("agent-5"), "not json").unwrap();
        let invalid = PolicyStore::<NeuralPolicy>::load(&store, "agent-5");
        assert!(matches!(invalid, Err(PolicyStoreError::Json { .. })));

        fs::remove_dir_all(dir).unwrap();
    }
}
