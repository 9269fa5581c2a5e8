use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::{self, HttpTextFetcher};
use crate::cache::Cacheable;
use crate::error::BiolinksError;
use crate::kegg::{self, Domain, PathwayLink};
use crate::links::{LinkContext, UnifiedLink};

pub const LINK_BATCH_LIMIT: usize = 4000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDbRecord {
    pub id: String,
    pub links: Vec<PathwayLink>,
    pub fetched_at: DateTime<Utc>,
}

impl LinkDbRecord {
    fn new(subject: &str) -> Self {
        Self {
            id: subject.to_string(),
            links: vec![PathwayLink {
                id: subject.to_string(),
                domain: Domain::Gene,
                description: String::new(),
            }],
            fetched_at: DateTime::UNIX_EPOCH,
        }
    }

    pub fn orthology(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.domain == Domain::Orthology)
            .map(|link| link.id.as_str())
    }

    pub fn unified_links(&self, ctx: &LinkContext) -> Vec<UnifiedLink> {
        let orthology = match self.orthology() {
            Some(ko) => match kegg::lookup_orthology(ctx.store, ko) {
                Ok(record) => record,
                Err(err) => {
                    debug!("orthology lookup failed for {ko}: {err}");
                    None
                }
            },
            None => None,
        };

        let mut links = Vec::new();
        for link in &self.links {
            let mut item = link.unified_link(ctx);
            if item.text.is_none() {
                if let Some(record) = &orthology {
                    if let Some(description) = record.description_for(&link.id, link.domain) {
                        if !description.is_empty() {
                            item.text = Some(description.to_string());
                        }
                    }
                }
            }
            links.push(item);
        }
        links
    }
}

impl Cacheable for LinkDbRecord {
    const BUCKET: &'static str = "LinkDB";

    fn cache_key(&self) -> &str {
        &self.id
    }

    fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        self.fetched_at = now;
    }
}

pub fn parse_links(body: &str) -> Vec<LinkDbRecord> {
    let mut records = Vec::new();
    let mut current: Option<LinkDbRecord> = None;

    for line in body.lines() {
        if line.is_empty() {
            continue;
        }
        let Some((subject, rest)) = line.split_once('\t') else {
            debug!("skipping malformed linkdb line: {line}");
            continue;
        };
        let target = match rest.split_once('\t') {
            Some((target, _)) => target,
            None => rest,
        };
        let Some((tag, linked)) = target.split_once(':') else {
            debug!("skipping linkdb target without namespace: {target}");
            continue;
        };

        let subject_changed = current
            .as_ref()
            .map(|record| record.id != subject)
            .unwrap_or(true);
        if subject_changed {
            if let Some(record) = current.take() {
                records.push(record);
            }
            current = Some(LinkDbRecord::new(subject));
        }

        if let Some(domain) = domain_for_tag(tag) {
            if let Some(record) = current.as_mut() {
                record.links.push(PathwayLink {
                    id: linked.to_string(),
                    domain,
                    description: String::new(),
                });
            }
        }
    }
    if let Some(record) = current.take() {
        records.push(record);
    }

    records
}

fn domain_for_tag(tag: &str) -> Option<Domain> {
    match tag {
        "path" => Some(Domain::Pathway),
        "ds" => Some(Domain::Disease),
        "ko" => Some(Domain::Orthology),
        "br" => Some(Domain::Brite),
        _ => None,
    }
}

pub trait LinkDbClient: Send + Sync {
    fn fetch(&self, ids: &[String]) -> Result<Vec<LinkDbRecord>, BiolinksError>;
}

#[derive(Clone)]
pub struct LinkDbHttpClient {
    fetcher: HttpTextFetcher,
    base: String,
}

impl LinkDbHttpClient {
    pub fn new(base: &str) -> Result<Self, BiolinksError> {
        Ok(Self {
            fetcher: HttpTextFetcher::new()?,
            base: base.to_string(),
        })
    }
}

impl LinkDbClient for LinkDbHttpClient {
    fn fetch(&self, ids: &[String]) -> Result<Vec<LinkDbRecord>, BiolinksError> {
        let body = batch::fetch_batched(&self.fetcher, &self.base, ids, "+", LINK_BATCH_LIMIT)?;
        Ok(parse_links(&body))
    }
}
