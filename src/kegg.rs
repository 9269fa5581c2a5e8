use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::batch::{self, TextFetcher};
use crate::error::BiolinksError;
use crate::links::{LinkContext, UnifiedLink};
use crate::store::{self, KeyValueStore};

pub const BUCKET: &str = "KeggOrthology";

pub const ENTRY_BATCH_LIMIT: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Domain {
    Gene,
    Pathway,
    Disease,
    Orthology,
    Brite,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Gene => "GENE",
            Domain::Pathway => "PATHWAY",
            Domain::Disease => "DISEASE",
            Domain::Orthology => "ORTHOLOGY",
            Domain::Brite => "BRITE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathwayLink {
    pub id: String,
    pub domain: Domain,
    pub description: String,
}

impl PathwayLink {
    pub fn unified_link(&self, ctx: &LinkContext) -> UnifiedLink {
        let link = ctx.hosts.link("KEGG", &self.id).unwrap_or_default();
        UnifiedLink::new(
            &format!("KEGG_{}", self.domain.as_str()),
            &self.id,
            &link,
            &self.description,
        )
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrthologyRecord {
    pub id: String,
    pub description: String,
    pub links: Vec<PathwayLink>,
}

impl OrthologyRecord {
    pub fn description_for(&self, id: &str, domain: Domain) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.id == id && link.domain == domain)
            .map(|link| link.description.as_str())
    }
}

enum Section {
    Outside,
    Pathway,
    Disease,
}

pub fn parse_flat_entry(entry: &str) -> OrthologyRecord {
    let mut record = OrthologyRecord::default();
    let mut links = Vec::new();
    let mut section = Section::Outside;

    for line in entry.lines() {
        let continuation = line.starts_with(' ');
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            section = Section::Outside;
            continue;
        }

        if continuation {
            let domain = match section {
                Section::Pathway => Some(Domain::Pathway),
                Section::Disease => Some(Domain::Disease),
                Section::Outside => None,
            };
            if let Some(domain) = domain {
                links.push(PathwayLink {
                    id: fields[0].to_string(),
                    domain,
                    description: fields[1..].join(" "),
                });
            }
            continue;
        }

        match fields[0] {
            "ENTRY" => {
                section = Section::Outside;
                if let Some(id) = fields.get(1) {
                    record.id = id.to_string();
                }
            }
            "DEFINITION" => {
                section = Section::Outside;
                record.description = fields[1..].join(" ");
            }
            "PATHWAY" => {
                section = Section::Pathway;
                if fields.len() >= 2 {
                    links.push(PathwayLink {
                        id: fields[1].to_string(),
                        domain: Domain::Pathway,
                        description: fields[2..].join(" "),
                    });
                }
            }
            "DISEASE" => {
                section = Section::Disease;
                if fields.len() >= 2 {
                    links.push(PathwayLink {
                        id: fields[1].to_string(),
                        domain: Domain::Disease,
                        description: fields[2..].join(" "),
                    });
                }
            }
            _ => section = Section::Outside,
        }
    }

    record.links = links;
    record
}

pub fn ingest_orthology(
    store: &dyn KeyValueStore,
    fetcher: &dyn TextFetcher,
    list_url: &str,
    entry_base: &str,
) -> Result<usize, BiolinksError> {
    let list = fetcher.get_text(list_url)?;

    let mut ids = Vec::new();
    for line in list.lines() {
        let Some((ko, _)) = line.split_once('\t') else {
            continue;
        };
        let id = ko.split_once(':').map(|(_, id)| id).unwrap_or(ko);
        if !id.is_empty() {
            ids.push(id.to_string());
        }
    }

    let body = batch::fetch_batched(fetcher, entry_base, &ids, ",", ENTRY_BATCH_LIMIT)?;

    let mut count = 0;
    for entry in body.split("///") {
        if entry.trim().is_empty() {
            continue;
        }
        let record = parse_flat_entry(entry);
        if record.id.is_empty() {
            warn!("skipping orthology entry without ENTRY id");
            continue;
        }
        store::set_record(store, BUCKET, &record.id, &record)?;
        count += 1;
    }
    info!("ingested {count} orthology records");

    Ok(count)
}

pub fn lookup_orthology(
    store: &dyn KeyValueStore,
    id: &str,
) -> Result<Option<OrthologyRecord>, BiolinksError> {
    store::get_record(store, BUCKET, id)
}
