//! Disposer facts
//!
//! A process-wide, append-only map from function identity to whether the
//! function disposes the disposable values it receives. Reads run
//! concurrently; each key is written at most once.
//!
//! Facts persist to a small binary file (`postcard`):
//!
//! ```text
//! magic "CCFT" | version u32 | [(FuncKey, DisposerFact)]
//! ```
//!
//! A store may be given such a file as a fallback. It is read on the first
//! lookup that misses the in-memory map.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::{debug, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::types::FuncKey;

/// Fact file magic number (first 4 bytes)
const FACTS_MAGIC: &[u8; 4] = b"CCFT";

/// Current fact file format version
const FACTS_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisposerFact {
    pub is_disposer: bool,
}

impl DisposerFact {
    pub const DISPOSER: DisposerFact = DisposerFact { is_disposer: true };
    pub const NOT_DISPOSER: DisposerFact = DisposerFact { is_disposer: false };
}

impl fmt::Display for DisposerFact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_disposer {
            f.write_str("is closer")
        } else {
            f.write_str("is not closer")
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct FactFile {
    magic: [u8; 4],
    version: u32,
    facts: Vec<(FuncKey, DisposerFact)>,
}

#[derive(Debug)]
pub enum FactError {
    Io(std::io::Error),
    Serialization(postcard::Error),
    InvalidMagic,
    UnsupportedVersion(u32),
    /// A key was exported twice with different facts
    Conflict {
        key: FuncKey,
        existing: DisposerFact,
        new: DisposerFact,
    },
}

impl fmt::Display for FactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactError::Io(e) => write!(f, "I/O error: {}", e),
            FactError::Serialization(e) => write!(f, "Serialization error: {}", e),
            FactError::InvalidMagic => write!(f, "Invalid fact file magic number"),
            FactError::UnsupportedVersion(v) => write!(f, "Unsupported fact file version: {}", v),
            FactError::Conflict { key, existing, new } => write!(
                f,
                "conflicting facts for {}: already \"{}\", got \"{}\"",
                key, existing, new
            ),
        }
    }
}

impl std::error::Error for FactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FactError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FactError {
    fn from(e: std::io::Error) -> Self {
        FactError::Io(e)
    }
}

impl From<postcard::Error> for FactError {
    fn from(e: postcard::Error) -> Self {
        FactError::Serialization(e)
    }
}

#[derive(Debug, Default)]
pub struct FactStore {
    facts: RwLock<BTreeMap<FuncKey, DisposerFact>>,
    fallback: Option<PathBuf>,
    fallback_facts: OnceLock<BTreeMap<FuncKey, DisposerFact>>,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that consults the fact file at `path` on lookup misses
    pub fn with_fallback(path: impl Into<PathBuf>) -> Self {
        Self {
            fallback: Some(path.into()),
            ..Self::default()
        }
    }

    /// Record a fact; re-exporting an identical fact is a no-op
    pub fn export(&self, key: FuncKey, fact: DisposerFact) -> Result<(), FactError> {
        let mut facts = self.facts.write();
        match facts.get(&key) {
            Some(existing) if *existing == fact => Ok(()),
            Some(existing) => Err(FactError::Conflict {
                existing: *existing,
                key,
                new: fact,
            }),
            None => {
                facts.insert(key, fact);
                Ok(())
            }
        }
    }

    /// Fact for `key`, if any function with that identity was summarized
    pub fn import(&self, key: &FuncKey) -> Option<DisposerFact> {
        if let Some(fact) = self.facts.read().get(key) {
            return Some(*fact);
        }
        self.fallback_facts().and_then(|facts| facts.get(key).copied())
    }

    pub fn is_disposer(&self, key: &FuncKey) -> bool {
        self.import(key).is_some_and(|fact| fact.is_disposer)
    }

    /// Whether `key` was exported to this store (fallback facts excluded)
    pub fn contains(&self, key: &FuncKey) -> bool {
        self.facts.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.facts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.read().is_empty()
    }

    /// All exported facts, ordered by key
    pub fn snapshot(&self) -> Vec<(FuncKey, DisposerFact)> {
        self.facts
            .read()
            .iter()
            .map(|(key, fact)| (key.clone(), *fact))
            .collect()
    }

    /// Write the exported facts to `path`
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FactError> {
        let file = FactFile {
            magic: *FACTS_MAGIC,
            version: FACTS_VERSION,
            facts: self.snapshot(),
        };

        let bytes = postcard::to_allocvec(&file)?;
        fs::write(path, bytes)?;

        Ok(())
    }

    /// Read a fact file into a new store
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FactError> {
        let store = Self::new();
        {
            let mut facts = store.facts.write();
            facts.extend(read_fact_file(path.as_ref())?);
        }
        Ok(store)
    }

    fn fallback_facts(&self) -> Option<&BTreeMap<FuncKey, DisposerFact>> {
        let path = self.fallback.as_ref()?;
        Some(self.fallback_facts.get_or_init(|| match read_fact_file(path) {
            Ok(facts) => {
                debug!("imported {} facts from {}", facts.len(), path.display());
                facts
            }
            Err(e) => {
                warn!("ignoring fact file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        }))
    }
}

fn read_fact_file(path: &Path) -> Result<BTreeMap<FuncKey, DisposerFact>, FactError> {
    let bytes = fs::read(path)?;
    let file: FactFile = postcard::from_bytes(&bytes)?;

    if &file.magic != FACTS_MAGIC {
        return Err(FactError::InvalidMagic);
    }

    if file.version != FACTS_VERSION {
        return Err(FactError::UnsupportedVersion(file.version));
    }

    Ok(file.facts.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("closecheck-{}-{}.facts", name, std::process::id()))
    }

    #[test]
    fn test_export_is_write_once() {
        let store = FactStore::new();
        let key = FuncKey::from("app.closeBody");

        store.export(key.clone(), DisposerFact::DISPOSER).unwrap();
        store.export(key.clone(), DisposerFact::DISPOSER).unwrap();
        let err = store.export(key.clone(), DisposerFact::NOT_DISPOSER).unwrap_err();

        assert!(matches!(err, FactError::Conflict { .. }));
        assert_eq!(store.import(&key), Some(DisposerFact::DISPOSER));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_absent_facts_are_unknown() {
        let store = FactStore::new();
        assert_eq!(store.import(&FuncKey::from("app.missing")), None);
        assert!(!store.is_disposer(&FuncKey::from("app.missing")));
    }

    #[test]
    fn test_display() {
        assert_eq!(DisposerFact::DISPOSER.to_string(), "is closer");
        assert_eq!(DisposerFact::NOT_DISPOSER.to_string(), "is not closer");
    }

    #[test]
    fn test_save_and_load() {
        let path = temp_path("save");
        let store = FactStore::new();
        store
            .export(FuncKey::from("(app.closer).closeBody"), DisposerFact::DISPOSER)
            .unwrap();
        store
            .export(FuncKey::from("app.doNothing"), DisposerFact::NOT_DISPOSER)
            .unwrap();
        store.save(&path).unwrap();

        let loaded = FactStore::load(&path).unwrap();
        assert_eq!(loaded.snapshot(), store.snapshot());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let path = temp_path("magic");
        let file = FactFile {
            magic: *b"BLAD",
            version: FACTS_VERSION,
            facts: Vec::new(),
        };
        fs::write(&path, postcard::to_allocvec(&file).unwrap()).unwrap();

        assert!(matches!(FactStore::load(&path), Err(FactError::InvalidMagic)));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_rejects_future_versions() {
        let path = temp_path("version");
        let file = FactFile {
            magic: *FACTS_MAGIC,
            version: 7,
            facts: Vec::new(),
        };
        fs::write(&path, postcard::to_allocvec(&file).unwrap()).unwrap();

        assert!(matches!(
            FactStore::load(&path),
            Err(FactError::UnsupportedVersion(7))
        ));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_fallback_is_read_on_miss() {
        let path = temp_path("fallback");
        let upstream = FactStore::new();
        upstream
            .export(FuncKey::from("lib.Close"), DisposerFact::DISPOSER)
            .unwrap();
        upstream.save(&path).unwrap();

        let store = FactStore::with_fallback(&path);
        store
            .export(FuncKey::from("app.run"), DisposerFact::NOT_DISPOSER)
            .unwrap();

        assert_eq!(store.import(&FuncKey::from("app.run")), Some(DisposerFact::NOT_DISPOSER));
        assert!(store.is_disposer(&FuncKey::from("lib.Close")));
        assert!(!store.contains(&FuncKey::from("lib.Close")));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_missing_fallback_means_unknown() {
        let store = FactStore::with_fallback(temp_path("does-not-exist"));
        assert_eq!(store.import(&FuncKey::from("lib.Close")), None);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let store = Arc::new(FactStore::new());
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let key = FuncKey::from(format!("pkg{}.f{}", worker, i).as_str());
                        store.export(key.clone(), DisposerFact::DISPOSER).unwrap();
                        assert!(store.is_disposer(&key));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 200);
    }
}
