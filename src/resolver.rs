use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::BiolinksError;
use crate::store::{self, KeyValueStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mapping {
    pub id: String,
    pub relations: Vec<String>,
}

pub fn mapping_bucket(namespace: &str) -> String {
    format!("mapping:{namespace}")
}

pub struct IdResolver<'a> {
    store: &'a dyn KeyValueStore,
    namespaces: Vec<String>,
}

impl<'a> IdResolver<'a> {
    pub fn new(store: &'a dyn KeyValueStore, namespaces: &[String]) -> Self {
        let mut namespaces = namespaces.to_vec();
        namespaces.sort();
        namespaces.dedup();
        Self { store, namespaces }
    }

    pub fn resolve(&self, query: &str) -> Result<Vec<String>, BiolinksError> {
        if let Some((namespace, rest)) = query.split_once(':') {
            if self.namespaces.iter().any(|ns| ns == namespace) {
                if let Some(mapping) = self.lookup(namespace, rest)? {
                    return Ok(mapping.relations);
                }
            }
        }

        for namespace in &self.namespaces {
            if let Some(mapping) = self.lookup(namespace, query)? {
                return Ok(mapping.relations);
            }
            if namespace.starts_with("RefSeq") {
                for suffix in 0..10 {
                    let versioned = format!("{query}.{suffix}");
                    if let Some(mapping) = self.lookup(namespace, &versioned)? {
                        return Ok(mapping.relations);
                    }
                }
            }
        }

        Err(BiolinksError::ConversionFailed(query.to_string()))
    }

    pub fn resolve_all(&self, queries: &[String]) -> Vec<String> {
        let mut converted = Vec::new();
        for query in queries {
            match self.resolve(query) {
                Ok(relations) => converted.extend(relations),
                Err(err) => {
                    debug!("{err}; forwarding query as-is");
                    converted.push(query.clone());
                }
            }
        }
        converted
    }

    fn lookup(&self, namespace: &str, id: &str) -> Result<Option<Mapping>, BiolinksError> {
        let bucket = mapping_bucket(namespace);
        let Some(bytes) = self.store.find_by_index(&bucket, "id", id)? else {
            return Ok(None);
        };
        let mapping = serde_json::from_slice(&bytes)
            .map_err(|err| BiolinksError::StoreRead(err.to_string()))?;
        Ok(Some(mapping))
    }
}

pub fn ingest_mappings(
    store: &dyn KeyValueStore,
    namespaces: &[String],
    content: &str,
) -> Result<usize, BiolinksError> {
    let mut grouped: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for line in content.lines() {
        let mut fields = line.split('\t');
        let (Some(accession), Some(namespace), Some(id)) =
            (fields.next(), fields.next(), fields.next())
        else {
            continue;
        };
        if accession.is_empty() || id.is_empty() {
            continue;
        }
        if !namespaces.iter().any(|ns| ns == namespace) {
            continue;
        }
        grouped
            .entry((namespace.to_string(), id.to_string()))
            .or_default()
            .push(accession.to_string());
    }

    let mut count = 0;
    for ((namespace, id), relations) in grouped {
        let mapping = Mapping {
            id: id.clone(),
            relations,
        };
        store::set_record(store, &mapping_bucket(&namespace), &id, &mapping)?;
        count += 1;
    }
    info!("ingested {count} id mappings");

    Ok(count)
}
