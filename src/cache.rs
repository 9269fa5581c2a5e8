use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::BiolinksError;
use crate::store::{self, KeyValueStore};

pub trait Cacheable: Serialize + DeserializeOwned {
    const BUCKET: &'static str;
    const ALIAS_BUCKET: Option<&'static str> = None;

    fn cache_key(&self) -> &str;
    fn fetched_at(&self) -> DateTime<Utc>;
    fn stamp(&mut self, now: DateTime<Utc>);

    fn aliases(&self) -> Vec<String> {
        Vec::new()
    }
}

pub struct Cache<'a> {
    store: &'a dyn KeyValueStore,
    ttl: Duration,
}

impl<'a> Cache<'a> {
    pub fn new(store: &'a dyn KeyValueStore, ttl_days: i64) -> Self {
        Self {
            store,
            ttl: Duration::days(ttl_days),
        }
    }

    pub fn lookup<R: Cacheable>(&self, id: &str) -> Result<R, BiolinksError> {
        let key = self.canonical_key::<R>(id)?;
        let record: R = store::get_record(self.store, R::BUCKET, &key)?
            .ok_or_else(|| BiolinksError::CacheMiss(id.to_string()))?;
        if Utc::now() - record.fetched_at() >= self.ttl {
            return Err(BiolinksError::CacheStale(id.to_string()));
        }
        Ok(record)
    }

    pub fn save<R: Cacheable>(&self, record: &mut R) -> Result<(), BiolinksError> {
        record.stamp(Utc::now());
        if let Some(alias_bucket) = R::ALIAS_BUCKET {
            let canonical = record.cache_key().to_string();
            for alias in record.aliases() {
                store::set_record(self.store, alias_bucket, &alias, &canonical)?;
            }
        }
        store::set_record(self.store, R::BUCKET, record.cache_key(), record)
    }

    pub fn load_or_fetch<R, F>(&self, ids: &[String], fetch: F) -> Vec<R>
    where
        R: Cacheable,
        F: FnOnce(&[String]) -> Result<Vec<R>, BiolinksError>,
    {
        let mut records = Vec::new();
        let mut missed = Vec::new();

        for id in ids {
            match self.lookup::<R>(id) {
                Ok(record) => records.push(record),
                Err(err) => {
                    debug!("cache lookup failed for {id}: {err}");
                    missed.push(id.clone());
                }
            }
        }

        if missed.is_empty() {
            return records;
        }

        match fetch(&missed) {
            Ok(fetched) => {
                for mut record in fetched {
                    if let Err(err) = self.save(&mut record) {
                        warn!(
                            "failed to cache {} record {}: {err}",
                            R::BUCKET,
                            record.cache_key()
                        );
                    }
                    records.push(record);
                }
            }
            Err(err) => warn!("failed to fetch {} records: {err}", R::BUCKET),
        }

        records
    }

    fn canonical_key<R: Cacheable>(&self, id: &str) -> Result<String, BiolinksError> {
        let Some(alias_bucket) = R::ALIAS_BUCKET else {
            return Ok(id.to_string());
        };
        match store::get_record::<String>(self.store, alias_bucket, id)? {
            Some(canonical) => Ok(canonical),
            None => Ok(id.to_string()),
        }
    }
}
