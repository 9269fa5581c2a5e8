use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::BiolinksError;
use crate::links::{LinkContext, UnifiedLink};
use crate::store::{self, KeyValueStore};

pub const BUCKET: &str = "GO";

const ANTISLIM_SUBSET: &str = "goantislim_grouping";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologyTerm {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub definition: String,
    pub slim: bool,
}

impl OntologyTerm {
    pub fn unified_links(&self, ctx: &LinkContext) -> Vec<UnifiedLink> {
        let namespace = self
            .namespace
            .split_once('_')
            .map(|(_, tail)| tail)
            .unwrap_or(self.namespace.as_str());
        let link = ctx.hosts.link("GO", &self.id).unwrap_or_default();
        let item = UnifiedLink::new(&format!("GO_{namespace}"), &self.id, &link, &self.definition);

        if self.slim {
            let slim = UnifiedLink::new(
                &format!("GOslim_{namespace}"),
                &self.id,
                &link,
                &self.definition,
            );
            return vec![item, slim];
        }

        vec![item]
    }
}

pub fn parse_obo(content: &str) -> Vec<OntologyTerm> {
    let mut terms = Vec::new();
    let mut current: Option<OntologyTerm> = None;

    for line in content.lines() {
        if line.starts_with('[') {
            close_stanza(&mut current, &mut terms);
            if line == "[Term]" {
                current = Some(OntologyTerm::default());
            }
            continue;
        }
        if line.is_empty() {
            close_stanza(&mut current, &mut terms);
            continue;
        }
        let Some(term) = current.as_mut() else {
            continue;
        };
        let Some((prefix, body)) = line.split_once(": ") else {
            continue;
        };
        match prefix {
            "id" => term.id = body.to_string(),
            "name" => term.name = body.to_string(),
            "namespace" => term.namespace = body.to_string(),
            "def" => term.definition = body.to_string(),
            "subset" => term.slim = body != ANTISLIM_SUBSET,
            _ => {}
        }
    }
    close_stanza(&mut current, &mut terms);

    terms
}

fn close_stanza(current: &mut Option<OntologyTerm>, terms: &mut Vec<OntologyTerm>) {
    if let Some(term) = current.take() {
        if term.id.is_empty() {
            warn!("dropping ontology stanza without id (name: {:?})", term.name);
        } else {
            terms.push(term);
        }
    }
}

pub fn ingest(
    store: &dyn KeyValueStore,
    client: &dyn OntologyClient,
) -> Result<usize, BiolinksError> {
    let content = client.download()?;
    let terms = parse_obo(&content);
    for term in &terms {
        store::set_record(store, BUCKET, &term.id, term)?;
    }
    info!("ingested {} ontology terms", terms.len());
    Ok(terms.len())
}

pub fn lookup(
    store: &dyn KeyValueStore,
    id: &str,
) -> Result<Option<OntologyTerm>, BiolinksError> {
    store::get_record(store, BUCKET, id)
}

pub trait OntologyClient: Send + Sync {
    fn download(&self) -> Result<String, BiolinksError>;
}

#[derive(Clone)]
pub struct OntologyHttpClient {
    client: Client,
    url: String,
}

impl OntologyHttpClient {
    pub fn new(url: &str) -> Result<Self, BiolinksError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("biolinks/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| BiolinksError::Http(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| BiolinksError::Http(err.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl OntologyClient for OntologyHttpClient {
    fn download(&self) -> Result<String, BiolinksError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|err| BiolinksError::Http(err.to_string()))?;
        let status = response.status().as_u16();
        if !(200..=299).contains(&status) {
            let message = response
                .text()
                .unwrap_or_else(|_| "ontology download failed".to_string());
            if (400..=499).contains(&status) {
                return Err(BiolinksError::ClientRequest { status, message });
            }
            if (500..=599).contains(&status) {
                return Err(BiolinksError::ServerRequest { status, message });
            }
            return Err(BiolinksError::UnknownRequest { status, message });
        }
        let bytes = response
            .bytes()
            .map_err(|err| BiolinksError::Http(err.to_string()))?;
        if self.url.ends_with(".gz") {
            let mut decoder = GzDecoder::new(bytes.as_ref());
            let mut text = String::new();
            decoder
                .read_to_string(&mut text)
                .map_err(|err| BiolinksError::Http(err.to_string()))?;
            return Ok(text);
        }
        String::from_utf8(bytes.to_vec()).map_err(|err| BiolinksError::Http(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hosts::HostTable;
    use crate::store::MemoryStore;

    const OBO_SAMPLE: &str = "\
format-version: 1.2

[Term]
id: GO:0005524
name: ATP binding
namespace: molecular_function
def: \"Binding to ATP, adenosine 5'-triphosphate.\" [ISBN:0198506732]
subset: goslim_chembl

[Term]
id: GO:0006810
name: transport
namespace: biological_process
def: \"The directed movement of substances: into, out of or within a cell.\" [GOC:dos]
subset: goantislim_grouping

[Typedef]
id: part_of
name: part of

[Term]
name: orphan stanza without id
namespace: cellular_component
";

    #[test]
    fn parses_terms_and_slim_flags() {
        let terms = parse_obo(OBO_SAMPLE);
        assert_eq!(terms.len(), 2);

        assert_eq!(terms[0].id, "GO:0005524");
        assert_eq!(terms[0].name, "ATP binding");
        assert_eq!(terms[0].namespace, "molecular_function");
        assert!(terms[0].slim);

        assert_eq!(terms[1].id, "GO:0006810");
        assert!(!terms[1].slim);
    }

    #[test]
    fn definition_keeps_embedded_separator() {
        let terms = parse_obo(OBO_SAMPLE);
        assert_eq!(
            terms[1].definition,
            "\"The directed movement of substances: into, out of or within a cell.\" [GOC:dos]"
        );
    }

    #[test]
    fn stanza_without_id_is_dropped() {
        let terms = parse_obo("[Term]\nname: nameless\n\n[Term]\nid: GO:1\nname: ok\n");
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].id, "GO:1");
    }

    #[test]
    fn slim_term_fans_out_to_two_tags() {
        let store = MemoryStore::new();
        let hosts = HostTable::from_lines("GO https://example.org/term/:id\n");
        let ctx = LinkContext {
            hosts: &hosts,
            store: &store,
        };

        let term = OntologyTerm {
            id: "GO:0005524".to_string(),
            name: "ATP binding".to_string(),
            namespace: "molecular_function".to_string(),
            definition: "def".to_string(),
            slim: true,
        };

        let links = term.unified_links(&ctx);
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].db, "GO_function");
        assert_eq!(links[1].db, "GOslim_function");
        assert_eq!(
            links[0].link.as_deref(),
            Some("https://example.org/term/GO:0005524")
        );
    }

    #[test]
    fn missing_host_degrades_to_text_only() {
        let store = MemoryStore::new();
        let hosts = HostTable::default();
        let ctx = LinkContext {
            hosts: &hosts,
            store: &store,
        };

        let term = OntologyTerm {
            id: "GO:0005524".to_string(),
            namespace: "molecular_function".to_string(),
            definition: "def".to_string(),
            ..OntologyTerm::default()
        };

        let links = term.unified_links(&ctx);
        assert!(links[0].link.is_none());
        assert_eq!(links[0].text.as_deref(), Some("def"));
    }

    struct FixtureClient;

    impl OntologyClient for FixtureClient {
        fn download(&self) -> Result<String, BiolinksError> {
            Ok(OBO_SAMPLE.to_string())
        }
    }

    #[test]
    fn ingest_stores_terms_by_id() {
        let store = MemoryStore::new();
        let count = ingest(&store, &FixtureClient).unwrap();
        assert_eq!(count, 2);

        let term = lookup(&store, "GO:0005524").unwrap().unwrap();
        assert_eq!(term.name, "ATP binding");
        assert!(lookup(&store, "GO:9999999").unwrap().is_none());
    }
}
