use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::sync::RwLock;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::BiolinksError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, BiolinksError>;
    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), BiolinksError>;
    fn find_by_index(
        &self,
        bucket: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Vec<u8>>, BiolinksError>;
}

pub fn get_record<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    bucket: &str,
    key: &str,
) -> Result<Option<T>, BiolinksError> {
    let Some(bytes) = store.get(bucket, key)? else {
        return Ok(None);
    };
    let record =
        serde_json::from_slice(&bytes).map_err(|err| BiolinksError::StoreRead(err.to_string()))?;
    Ok(Some(record))
}

pub fn set_record<T: Serialize>(
    store: &dyn KeyValueStore,
    bucket: &str,
    key: &str,
    record: &T,
) -> Result<(), BiolinksError> {
    let bytes =
        serde_json::to_vec(record).map_err(|err| BiolinksError::StoreWrite(err.to_string()))?;
    store.set(bucket, key, &bytes)
}

fn field_matches(bytes: &[u8], field: &str, value: &str) -> bool {
    let Ok(record) = serde_json::from_slice::<serde_json::Value>(bytes) else {
        return false;
    };
    record
        .get(field)
        .and_then(|v| v.as_str())
        .map(|v| v == value)
        .unwrap_or(false)
}

#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, BiolinksError> {
        let buckets = self
            .buckets
            .read()
            .map_err(|err| BiolinksError::StoreRead(err.to_string()))?;
        Ok(buckets
            .get(bucket)
            .and_then(|records| records.get(key))
            .cloned())
    }

    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), BiolinksError> {
        let mut buckets = self
            .buckets
            .write()
            .map_err(|err| BiolinksError::StoreWrite(err.to_string()))?;
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn find_by_index(
        &self,
        bucket: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Vec<u8>>, BiolinksError> {
        let buckets = self
            .buckets
            .read()
            .map_err(|err| BiolinksError::StoreRead(err.to_string()))?;
        let Some(records) = buckets.get(bucket) else {
            return Ok(None);
        };
        Ok(records
            .values()
            .find(|bytes| field_matches(bytes, field, value))
            .cloned())
    }
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: Utf8PathBuf,
}

impl FileStore {
    pub fn open(root: Utf8PathBuf) -> Result<Self, BiolinksError> {
        fs::create_dir_all(root.as_std_path())
            .map_err(|err| BiolinksError::Filesystem(err.to_string()))?;
        Ok(Self { root })
    }

    pub fn open_default() -> Result<Self, BiolinksError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("biolinks")).ok()
            })
            .ok_or_else(|| {
                BiolinksError::Filesystem("unable to resolve cache directory".to_string())
            })?;
        Self::open(root)
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn record_path(&self, bucket: &str, key: &str) -> Utf8PathBuf {
        self.root
            .join(bucket)
            .join(format!("{}.json", sanitize_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>, BiolinksError> {
        let path = self.record_path(bucket, key);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        fs::read(path.as_std_path())
            .map(Some)
            .map_err(|err| BiolinksError::StoreRead(err.to_string()))
    }

    fn set(&self, bucket: &str, key: &str, value: &[u8]) -> Result<(), BiolinksError> {
        let path = self.record_path(bucket, key);
        let parent = path
            .parent()
            .ok_or_else(|| BiolinksError::StoreWrite("invalid record path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| BiolinksError::StoreWrite(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("biolinks-record")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| BiolinksError::StoreWrite(err.to_string()))?;
        fs::write(temp.path(), value).map_err(|err| BiolinksError::StoreWrite(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| BiolinksError::StoreWrite(err.to_string()))?;
        Ok(())
    }

    fn find_by_index(
        &self,
        bucket: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Vec<u8>>, BiolinksError> {
        let bucket_dir = self.root.join(bucket);
        if !bucket_dir.as_std_path().exists() {
            return Ok(None);
        }
        let entries = fs::read_dir(bucket_dir.as_std_path())
            .map_err(|err| BiolinksError::StoreRead(err.to_string()))?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| BiolinksError::StoreRead(err.to_string()))?;
            let path = entry.path();
            if path.extension().map(|ext| ext == "json").unwrap_or(false) {
                paths.push(path);
            }
        }
        paths.sort();
        for path in paths {
            let bytes =
                fs::read(&path).map_err(|err| BiolinksError::StoreRead(err.to_string()))?;
            if field_matches(&bytes, field, value) {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

fn sanitize_key(key: &str) -> String {
    key.replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Row {
        id: String,
        value: u32,
    }

    #[test]
    fn memory_round_trip() {
        let store = MemoryStore::new();
        let row = Row {
            id: "A1".to_string(),
            value: 7,
        };
        set_record(&store, "rows", "A1", &row).unwrap();
        let loaded: Row = get_record(&store, "rows", "A1").unwrap().unwrap();
        assert_eq!(loaded, row);
        let missing: Option<Row> = get_record(&store, "rows", "B2").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn memory_find_by_index() {
        let store = MemoryStore::new();
        set_record(
            &store,
            "rows",
            "first",
            &Row {
                id: "NM_0001".to_string(),
                value: 1,
            },
        )
        .unwrap();
        set_record(
            &store,
            "rows",
            "second",
            &Row {
                id: "NM_0002".to_string(),
                value: 2,
            },
        )
        .unwrap();

        let bytes = store
            .find_by_index("rows", "id", "NM_0002")
            .unwrap()
            .unwrap();
        let row: Row = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(row.value, 2);
        assert!(store.find_by_index("rows", "id", "NM_0003").unwrap().is_none());
        assert!(store.find_by_index("other", "id", "NM_0001").unwrap().is_none());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = FileStore::open(root.clone()).unwrap();

        store.set("GO", "GO:0005524", b"{\"id\":\"GO:0005524\"}").unwrap();
        let bytes = store.get("GO", "GO:0005524").unwrap().unwrap();
        assert_eq!(bytes, b"{\"id\":\"GO:0005524\"}");
        assert!(root.join("GO").join("GO:0005524.json").as_std_path().exists());
        assert!(store.get("GO", "GO:0000000").unwrap().is_none());
    }

    #[test]
    fn file_key_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = FileStore::open(root.clone()).unwrap();

        store.set("rows", "a/b", b"{}").unwrap();
        assert!(root.join("rows").join("a%2Fb.json").as_std_path().exists());
        assert_eq!(store.get("rows", "a/b").unwrap().unwrap(), b"{}");
    }

    #[test]
    fn file_overwrite_wins() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        let store = FileStore::open(root).unwrap();

        store.set("rows", "k", b"old").unwrap();
        store.set("rows", "k", b"new").unwrap();
        assert_eq!(store.get("rows", "k").unwrap().unwrap(), b"new");
    }
}
