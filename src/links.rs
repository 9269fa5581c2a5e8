use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hosts::HostTable;
use crate::kegg::PathwayLink;
use crate::linkdb::LinkDbRecord;
use crate::ontology::OntologyTerm;
use crate::store::KeyValueStore;
use crate::uniprot::{CommentEntry, CrossReference, GeneLocation, Organism, ProteinNaming};

pub struct LinkContext<'a> {
    pub hosts: &'a HostTable,
    pub store: &'a dyn KeyValueStore,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnifiedLink {
    pub db: String,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl UnifiedLink {
    pub fn new(db: &str, id: &str, link: &str, text: &str) -> Self {
        Self {
            db: db.to_string(),
            id: id.to_string(),
            link: (!link.is_empty()).then(|| link.to_string()),
            text: (!text.is_empty()).then(|| text.to_string()),
        }
    }

    pub fn html_rows(&self) -> Vec<String> {
        let mut rows = Vec::new();
        if let Some(link) = &self.link {
            rows.push(format!(
                "<tr><td>{}</td><td>{}</td><td><a href=\"{}\">{}</a></td></tr>",
                self.db, self.id, link, link
            ));
        }
        if let Some(text) = &self.text {
            rows.push(format!(
                "<tr><td># {}</td><td>{}</td><td>{}</td></tr>",
                self.db, self.id, text
            ));
        }
        rows
    }

    pub fn tsv_rows(&self) -> Vec<String> {
        let mut rows = Vec::new();
        if let Some(link) = &self.link {
            rows.push([self.db.as_str(), self.id.as_str(), link].join("\t"));
        }
        if let Some(text) = &self.text {
            rows.push([format!("# {}", self.db).as_str(), self.id.as_str(), text].join("\t"));
        }
        rows
    }
}

#[derive(Debug, Clone)]
pub struct LinkBundle {
    pub id: String,
    pub links: Vec<UnifiedLink>,
    pub built_at: DateTime<Utc>,
}

impl LinkBundle {
    pub fn new(id: &str, links: Vec<UnifiedLink>) -> Self {
        Self {
            id: id.to_string(),
            links,
            built_at: Utc::now(),
        }
    }

    pub fn empty(id: &str) -> Self {
        Self::new(id, Vec::new())
    }
}

pub enum LinkSource<'a> {
    Ontology(&'a OntologyTerm),
    Pathway(&'a PathwayLink),
    LinkDb(&'a LinkDbRecord),
    Naming {
        naming: &'a ProteinNaming,
        origin: &'a str,
    },
    Organism(&'a Organism),
    GeneLocation(&'a GeneLocation),
    Comment {
        comment: &'a CommentEntry,
        origin: &'a str,
    },
    CrossReference {
        reference: &'a CrossReference,
        origin: &'a str,
    },
}

impl LinkSource<'_> {
    pub fn unified_links(&self, ctx: &LinkContext) -> Vec<UnifiedLink> {
        match self {
            LinkSource::Ontology(term) => term.unified_links(ctx),
            LinkSource::Pathway(link) => vec![link.unified_link(ctx)],
            LinkSource::LinkDb(record) => record.unified_links(ctx),
            LinkSource::Naming { naming, origin } => naming.unified_links(origin),
            LinkSource::Organism(organism) => organism.unified_links(ctx),
            LinkSource::GeneLocation(location) => location.unified_links(),
            LinkSource::Comment { comment, origin } => comment.unified_links(origin),
            LinkSource::CrossReference { reference, origin } => {
                reference.unified_links(ctx, origin)
            }
        }
    }
}
