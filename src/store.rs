use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
};

use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};
use thiserror::Error;

use crate::pipeline::FeatureVector;

pub type SampleSet = Vec<FeatureVector>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read gesture store {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse gesture store {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode gesture store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write gesture store {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// Label → samples in insertion order. Serialized as a JSON object whose
/// key order follows that insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
struct Entries(Vec<(String, SampleSet)>);

impl Entries {
    fn upsert(&mut self, label: String, samples: SampleSet) {
        match self.0.iter_mut().find(|(existing, _)| *existing == label) {
            Some(slot) => slot.1 = samples,
            None => self.0.push((label, samples)),
        }
    }
}

impl Serialize for Entries {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (label, samples) in &self.0 {
            map.serialize_entry(label, samples)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from gesture label to a list of sample vectors")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Entries, A::Error> {
                let mut entries = Entries::default();
                while let Some((label, samples)) = access.next_entry::<String, SampleSet>()? {
                    entries.upsert(label, samples);
                }
                Ok(entries)
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// The durable gesture library: one JSON file, rewritten whole on save.
#[derive(Clone, Debug)]
pub struct GestureStore {
    path: PathBuf,
    entries: Entries,
}

impl GestureStore {
    /// Empty store bound to `path`; nothing is read.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Entries::default(),
        }
    }

    /// Reads the store, falling back to an empty one when the file is
    /// missing or cannot be parsed.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if !path.exists() {
            log::info!(
                "no gesture store at {}, starting with an empty library",
                path.display()
            );
            return Self::new(path);
        }

        match Self::try_load(&path) {
            Ok(store) => {
                log::info!(
                    "loaded {} gestures from {}",
                    store.len(),
                    store.path.display()
                );
                store
            }
            Err(err) => {
                log::warn!("{err}; starting with an empty library");
                Self::new(path)
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let entries = serde_json::from_str(&raw).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn save(&self) -> Result<(), StoreError> {
        let mut encoded = serde_json::to_string_pretty(&self.entries)?;
        encoded.push('\n');

        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, encoded).map_err(write_err)?;
        if let Err(source) = fs::rename(&staging, &self.path) {
            if let Err(err) = fs::remove_file(&staging) {
                log::warn!("failed to remove {}: {err}", staging.display());
            }
            return Err(write_err(source));
        }

        log::info!(
            "saved {} gestures to {}",
            self.len(),
            self.path.display()
        );
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, label: &str) -> Option<&[FeatureVector]> {
        self.entries
            .0
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, samples)| samples.as_slice())
    }

    /// Replaces the samples of `label`. New labels go to the end.
    pub fn put(&mut self, label: impl Into<String>, samples: SampleSet) {
        self.entries.upsert(label.into(), samples);
    }

    pub fn remove(&mut self, label: &str) -> Option<SampleSet> {
        let idx = self.entries.0.iter().position(|(existing, _)| existing == label)?;
        Some(self.entries.0.remove(idx).1)
    }

    pub fn all(&self) -> impl Iterator<Item = (&str, &[FeatureVector])> {
        self.entries
            .0
            .iter()
            .map(|(label, samples)| (label.as_str(), samples.as_slice()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.0.iter().map(|(label, _)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(flat: &[f64]) -> FeatureVector {
        FeatureVector::from_flat(flat).unwrap()
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = GestureStore::load(dir.path().join("gesture_data.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn garbage_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesture_data.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(GestureStore::load(&path).is_empty());
        assert!(matches!(
            GestureStore::try_load(&path),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn malformed_sample_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesture_data.json");
        fs::write(&path, r#"{ "wave": [[2, 0.1]] }"#).unwrap();
        assert!(GestureStore::load(&path).is_empty());
    }

    #[test]
    fn save_then_load_preserves_order_and_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("gesture_data.json");
        let mut store = GestureStore::new(&path);
        store.put("zeta", vec![vector(&[0.0]), vector(&[3.0, 0.4, 0.5, 0.2, 0.3])]);
        store.put("alpha", vec![vector(&[2.0, 0.1, 0.2])]);
        store.save().unwrap();

        let loaded = GestureStore::load(&path);
        assert_eq!(loaded.labels().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
        assert_eq!(loaded.get("zeta").unwrap().len(), 2);
        assert_eq!(loaded.get("zeta").unwrap()[1].flat_len(), 5);
        assert_eq!(loaded.get("alpha"), store.get("alpha"));
    }

    #[test]
    fn resaving_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.json");
        let second = dir.path().join("second.json");

        let mut store = GestureStore::new(&first);
        store.put("peace", vec![vector(&[3.0, 0.71, 0.66, 0.12, 0.18])]);
        store.put("fist", vec![vector(&[0.0]), vector(&[0.0])]);
        store.put("wave", vec![vector(&[2.0, 0.1, 0.2])]);
        store.save().unwrap();

        let original = fs::read(&first).unwrap();
        let mut reloaded = GestureStore::load(&first);
        reloaded.path = second.clone();
        reloaded.save().unwrap();
        assert_eq!(fs::read(&second).unwrap(), original);
    }

    #[test]
    fn failed_rename_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesture_data.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("occupied"), b"").unwrap();

        let mut store = GestureStore::new(&path);
        store.put("fist", vec![vector(&[0.0])]);
        assert!(matches!(store.save(), Err(StoreError::Write { .. })));
        assert!(!dir.path().join("gesture_data.json.tmp").exists());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn put_replaces_in_place() {
        let mut store = GestureStore::new("unused.json");
        store.put("a", vec![vector(&[0.0])]);
        store.put("b", vec![vector(&[0.0])]);
        store.put("a", vec![vector(&[2.0, 0.1, 0.2])]);
        assert_eq!(store.labels().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap()[0].finger_count(), 2);
        assert_eq!(store.remove("a").map(|s| s.len()), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn duplicate_keys_keep_first_position_and_last_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesture_data.json");
        fs::write(
            &path,
            r#"{ "a": [[0]], "b": [[0]], "a": [[2, 0.5, 0.5]] }"#,
        )
        .unwrap();
        let store = GestureStore::load(&path);
        assert_eq!(store.labels().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap()[0].finger_count(), 2);
    }
}
