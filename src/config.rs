use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::BiolinksError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store_root: Option<String>,
    #[serde(default = "default_mappings")]
    pub mappings: Vec<String>,
    #[serde(default = "default_hosts_path")]
    pub hosts_path: String,
    #[serde(default = "default_ttl_days")]
    pub ttl_days: i64,
    #[serde(default = "default_uniprot_entry_base")]
    pub uniprot_entry_base: String,
    #[serde(default = "default_uniprot_upload_url")]
    pub uniprot_upload_url: String,
    #[serde(default = "default_orthology_list_url")]
    pub orthology_list_url: String,
    #[serde(default = "default_orthology_entry_base")]
    pub orthology_entry_base: String,
    #[serde(default = "default_linkdb_base")]
    pub linkdb_base: String,
    #[serde(default = "default_ontology_url")]
    pub ontology_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_root: None,
            mappings: default_mappings(),
            hosts_path: default_hosts_path(),
            ttl_days: default_ttl_days(),
            uniprot_entry_base: default_uniprot_entry_base(),
            uniprot_upload_url: default_uniprot_upload_url(),
            orthology_list_url: default_orthology_list_url(),
            orthology_entry_base: default_orthology_entry_base(),
            linkdb_base: default_linkdb_base(),
            ontology_url: default_ontology_url(),
        }
    }
}

impl Config {
    pub fn load(path: Option<&str>) -> Result<Self, BiolinksError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("biolinks.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| BiolinksError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| BiolinksError::ConfigParse(err.to_string()))?;

        Ok(config)
    }
}

fn default_mappings() -> Vec<String> {
    vec![
        "Ensembl".to_string(),
        "GeneID".to_string(),
        "KEGG".to_string(),
        "RefSeq".to_string(),
        "RefSeq_NT".to_string(),
    ]
}

fn default_hosts_path() -> String {
    "urls".to_string()
}

fn default_ttl_days() -> i64 {
    14
}

fn default_uniprot_entry_base() -> String {
    "https://www.uniprot.org/uniprot".to_string()
}

fn default_uniprot_upload_url() -> String {
    "https://www.uniprot.org/uploadlists/".to_string()
}

fn default_orthology_list_url() -> String {
    "https://rest.kegg.jp/list/orthology".to_string()
}

fn default_orthology_entry_base() -> String {
    "https://togows.org/entry/kegg-orthology/".to_string()
}

fn default_linkdb_base() -> String {
    "https://rest.genome.jp/link/".to_string()
}

fn default_ontology_url() -> String {
    "https://purl.obolibrary.org/obo/go.obo".to_string()
}
