use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::Cacheable;
use crate::error::BiolinksError;
use crate::hosts;
use crate::linkdb::LinkDbRecord;
use crate::links::{LinkBundle, LinkContext, LinkSource, UnifiedLink};
use crate::ontology;
use crate::store;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "@value", default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossReference {
    #[serde(rename = "@type", default)]
    pub db: String,
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(rename = "property", default)]
    pub properties: Vec<Property>,
}

impl CrossReference {
    pub fn unified_links(&self, ctx: &LinkContext, origin: &str) -> Vec<UnifiedLink> {
        let mut links = match self.db.as_str() {
            "GO" => match ontology::lookup(ctx.store, &self.id) {
                Ok(Some(term)) => term.unified_links(ctx),
                Ok(None) => Vec::new(),
                Err(err) => {
                    debug!("ontology lookup failed for {}: {err}", self.id);
                    Vec::new()
                }
            },
            "KEGG" => {
                match store::get_record::<LinkDbRecord>(ctx.store, LinkDbRecord::BUCKET, &self.id)
                {
                    Ok(Some(record)) => record.unified_links(ctx),
                    Ok(None) => {
                        debug!("no linkdb record cached for {}", self.id);
                        Vec::new()
                    }
                    Err(err) => {
                        debug!("linkdb lookup failed for {}: {err}", self.id);
                        Vec::new()
                    }
                }
            }
            "UniGene" => {
                let (org, cid) = self.id.split_once('.').unwrap_or((self.id.as_str(), ""));
                let query = format!("ORG={org}&CID={cid}");
                let link = ctx.hosts.link(&self.db, &query).unwrap_or_default();
                vec![UnifiedLink::new(&self.db, &self.id, &link, "")]
            }
            _ => match ctx.hosts.template(&self.db) {
                Ok(template) => {
                    let link = hosts::fill_gene_and_id(template, origin, &self.id);
                    vec![UnifiedLink::new(&self.db, &self.id, &link, "")]
                }
                Err(_) => vec![UnifiedLink::new(&self.db, &self.id, "", &self.id)],
            },
        };

        if self.db == "RefSeq" {
            if let Some(property) = self
                .properties
                .iter()
                .find(|property| property.kind == "nucleotide sequence ID")
            {
                let link = ctx
                    .hosts
                    .link("Nucleotide", &property.value)
                    .unwrap_or_default();
                links.push(UnifiedLink::new(&self.db, &property.value, &link, ""));
            }
        }

        links
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NameGroup {
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    #[serde(rename = "shortName", default)]
    pub short_names: Vec<String>,
    #[serde(rename = "ecNumber", default)]
    pub ec_numbers: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProteinNaming {
    #[serde(rename = "recommendedName", default)]
    pub recommended: NameGroup,
    #[serde(rename = "alternativeName", default)]
    pub alternatives: Vec<NameGroup>,
    #[serde(rename = "submittedName", default)]
    pub submitted: Vec<NameGroup>,
}

impl ProteinNaming {
    pub fn unified_links(&self, origin: &str) -> Vec<UnifiedLink> {
        let mut links = group_links(&self.recommended, origin, "Recommended");
        for group in &self.alternatives {
            links.extend(group_links(group, origin, "Alternative"));
        }
        for group in &self.submitted {
            links.extend(group_links(group, origin, "Submitted"));
        }
        links
    }
}

fn group_links(group: &NameGroup, origin: &str, role: &str) -> Vec<UnifiedLink> {
    let mut links = vec![UnifiedLink::new(
        &format!("Full Name ({role})"),
        origin,
        "",
        &group.full_name,
    )];
    for name in &group.short_names {
        links.push(UnifiedLink::new(
            &format!("Short Name ({role})"),
            origin,
            "",
            name,
        ));
    }
    for ec_number in &group.ec_numbers {
        links.push(UnifiedLink::new(
            &format!("EC Number ({role})"),
            origin,
            "",
            ec_number,
        ));
    }
    links
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lineage {
    #[serde(rename = "taxon", default)]
    pub taxa: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Organism {
    #[serde(rename = "dbReference", default)]
    pub db_references: Vec<CrossReference>,
    #[serde(default)]
    pub lineage: Lineage,
}

impl Organism {
    pub fn unified_links(&self, ctx: &LinkContext) -> Vec<UnifiedLink> {
        let Some(taxon) = self.db_references.first() else {
            return Vec::new();
        };
        let uniprot = ctx
            .hosts
            .link("UniProtTaxonomy", &taxon.id)
            .unwrap_or_default();
        let ncbi = ctx.hosts.link("NCBITaxonomy", &taxon.id).unwrap_or_default();
        vec![
            UnifiedLink::new("UniProt Taxonomy", &taxon.id, &uniprot, ""),
            UnifiedLink::new("NCBI Taxonomy", &taxon.id, &ncbi, ""),
            UnifiedLink::new("Lineage", &taxon.id, "", &self.lineage.taxa.join("; ")),
        ]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneLocation {
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(rename = "name", default)]
    pub names: Vec<String>,
}

impl GeneLocation {
    pub fn unified_links(&self) -> Vec<UnifiedLink> {
        let name = self.names.first().map(String::as_str).unwrap_or_default();
        vec![UnifiedLink::new("Gene Location", name, "", &self.kind)]
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Interactant {
    #[serde(rename = "@intactId", default)]
    pub intact_id: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Disease {
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub acronym: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentEntry {
    #[serde(rename = "@type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "disease", default)]
    pub diseases: Vec<Disease>,
    #[serde(rename = "interactant", default)]
    pub interactants: Vec<Interactant>,
}

impl CommentEntry {
    pub fn unified_links(&self, origin: &str) -> Vec<UnifiedLink> {
        match self.kind.as_str() {
            "interaction" => {
                let (Some(first), Some(second)) =
                    (self.interactants.first(), self.interactants.get(1))
                else {
                    debug!("interaction comment on {origin} lacks two interactants");
                    return Vec::new();
                };
                vec![UnifiedLink::new(
                    &self.kind,
                    &second.id,
                    "",
                    &format!("{}:{}", first.intact_id, second.intact_id),
                )]
            }
            "disease" => self
                .diseases
                .iter()
                .map(|disease| {
                    UnifiedLink::new(
                        &self.kind,
                        &disease.id,
                        "",
                        &format!(
                            "{} ({}) : {} ({})",
                            disease.name, disease.acronym, disease.description, self.text
                        ),
                    )
                })
                .collect(),
            _ => vec![UnifiedLink::new(&self.kind, origin, "", &self.text)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProteinRecord {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "accession", default)]
    pub accessions: Vec<String>,
    #[serde(rename = "name", default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub protein: ProteinNaming,
    #[serde(default)]
    pub organism: Organism,
    #[serde(rename = "geneLocation", default)]
    pub gene_locations: Vec<GeneLocation>,
    #[serde(rename = "comment", default)]
    pub comments: Vec<CommentEntry>,
    #[serde(rename = "dbReference", default)]
    pub db_references: Vec<CrossReference>,
    #[serde(default = "epoch")]
    pub fetched_at: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl ProteinRecord {
    pub fn bundle(&self, ctx: &LinkContext) -> LinkBundle {
        let mut links = Vec::new();

        for accession in &self.accessions {
            let link = ctx.hosts.link("UniProtKB-AC", accession).unwrap_or_default();
            links.push(UnifiedLink::new("UniProtKB-AC", accession, &link, ""));
        }
        for name in &self.names {
            let link = ctx.hosts.link("UniProtKB-ID", name).unwrap_or_default();
            links.push(UnifiedLink::new("UniProtKB-ID", name, &link, ""));
        }

        let mut sources = vec![
            LinkSource::Naming {
                naming: &self.protein,
                origin: &self.id,
            },
            LinkSource::Organism(&self.organism),
        ];
        for location in &self.gene_locations {
            sources.push(LinkSource::GeneLocation(location));
        }
        for comment in &self.comments {
            sources.push(LinkSource::Comment {
                comment,
                origin: &self.id,
            });
        }
        for reference in &self.db_references {
            sources.push(LinkSource::CrossReference {
                reference,
                origin: &self.id,
            });
        }

        for source in &sources {
            links.extend(source.unified_links(ctx));
        }

        LinkBundle::new(&self.id, links)
    }
}

impl Cacheable for ProteinRecord {
    const BUCKET: &'static str = "UniProt";
    const ALIAS_BUCKET: Option<&'static str> = Some("UniProtMapping");

    fn cache_key(&self) -> &str {
        &self.id
    }

    fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        self.fetched_at = now;
    }

    fn aliases(&self) -> Vec<String> {
        self.accessions.clone()
    }
}

#[derive(Debug, Deserialize)]
struct UniprotResponse {
    #[serde(rename = "entry", default)]
    entries: Vec<ProteinRecord>,
}

pub fn parse_entries(xml: &str) -> Result<Vec<ProteinRecord>, BiolinksError> {
    let response: UniprotResponse =
        quick_xml::de::from_str(xml).map_err(|err| BiolinksError::Xml(err.to_string()))?;

    let mut entries = Vec::new();
    for mut entry in response.entries {
        let Some(canonical) = entry.accessions.first() else {
            warn!("skipping uniprot entry without an accession");
            continue;
        };
        entry.id = canonical.clone();
        entries.push(entry);
    }
    Ok(entries)
}

pub trait UniprotClient: Send + Sync {
    fn fetch(&self, ids: &[String]) -> Result<Vec<ProteinRecord>, BiolinksError>;
}

#[derive(Clone)]
pub struct UniprotHttpClient {
    client: Client,
    upload_client: Client,
    entry_base: String,
    upload_url: String,
}

impl UniprotHttpClient {
    pub fn new(entry_base: &str, upload_url: &str) -> Result<Self, BiolinksError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("biolinks/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| BiolinksError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|err| BiolinksError::Http(err.to_string()))?;
        let upload_client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| BiolinksError::Http(err.to_string()))?;
        Ok(Self {
            client,
            upload_client,
            entry_base: entry_base.trim_end_matches('/').to_string(),
            upload_url: upload_url.to_string(),
        })
    }

    fn send_with_retries<F>(
        &self,
        mut make_req: F,
    ) -> Result<reqwest::blocking::Response, BiolinksError>
    where
        F: FnMut() -> reqwest::blocking::RequestBuilder,
    {
        const MAX_RETRIES: usize = 3;
        const BASE_DELAY_MS: u64 = 200;
        let mut attempt = 0usize;
        loop {
            let response = make_req().send();
            match response {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if attempt < MAX_RETRIES && is_retryable_status(status) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Ok(resp);
                }
                Err(err) => {
                    if attempt < MAX_RETRIES && is_retryable_error(&err) {
                        let delay = BASE_DELAY_MS * (attempt as u64 + 1);
                        std::thread::sleep(Duration::from_millis(delay));
                        attempt += 1;
                        continue;
                    }
                    return Err(BiolinksError::Http(err.to_string()));
                }
            }
        }
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, BiolinksError> {
        let status = response.status().as_u16();
        if (200..=299).contains(&status) {
            return Ok(response);
        }
        let message = response
            .text()
            .unwrap_or_else(|_| "uniprot request failed".to_string());
        if (400..=499).contains(&status) {
            return Err(BiolinksError::ClientRequest { status, message });
        }
        if (500..=599).contains(&status) {
            return Err(BiolinksError::ServerRequest { status, message });
        }
        Err(BiolinksError::UnknownRequest { status, message })
    }

    fn fetch_single(&self, id: &str) -> Result<String, BiolinksError> {
        let url = format!("{}/{}.xml", self.entry_base, id);
        let response = self.send_with_retries(|| self.client.get(&url))?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| BiolinksError::Http(err.to_string()))
    }

    fn fetch_many(&self, ids: &[String]) -> Result<String, BiolinksError> {
        let mut list = String::new();
        for id in ids {
            list.push_str(id);
            list.push('\n');
        }

        let response = self.send_with_retries(|| {
            let form = Form::new()
                .part("file", Part::text(list.clone()).file_name("list.txt"))
                .text("format", "xml")
                .text("from", "ACC+ID")
                .text("to", "ACC");
            self.upload_client.post(&self.upload_url).multipart(form)
        })?;
        let response = Self::handle_status(response)?;
        response
            .text()
            .map_err(|err| BiolinksError::Http(err.to_string()))
    }
}

impl UniprotClient for UniprotHttpClient {
    fn fetch(&self, ids: &[String]) -> Result<Vec<ProteinRecord>, BiolinksError> {
        let body = if ids.len() == 1 {
            self.fetch_single(&ids[0])?
        } else {
            self.fetch_many(ids)?
        };
        parse_entries(&body)
    }
}

fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_request()
}
