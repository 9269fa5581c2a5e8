use std::collections::HashMap;
use std::fs;

use tracing::warn;

use crate::error::BiolinksError;

#[derive(Debug, Clone, Default)]
pub struct HostTable {
    templates: HashMap<String, String>,
}

impl HostTable {
    pub fn load(path: &str) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_lines(&content),
            Err(err) => {
                warn!("failed to read host table {path}: {err}; links degrade to text");
                Self::default()
            }
        }
    }

    pub fn from_lines(content: &str) -> Self {
        let mut templates = HashMap::new();
        for line in content.lines() {
            let Some((tag, template)) = line.split_once(' ') else {
                continue;
            };
            let template = template.trim();
            if tag.is_empty() || template.is_empty() {
                continue;
            }
            templates
                .entry(tag.to_string())
                .or_insert_with(|| template.to_string());
        }
        Self { templates }
    }

    pub fn template(&self, db: &str) -> Result<&str, BiolinksError> {
        self.templates
            .get(db)
            .map(String::as_str)
            .ok_or_else(|| BiolinksError::HostNotDefined(db.to_string()))
    }

    pub fn link(&self, db: &str, id: &str) -> Option<String> {
        self.template(db).ok().map(|template| fill_id(template, id))
    }
}

pub fn fill_id(template: &str, id: &str) -> String {
    template.replace(":id", id)
}

pub fn fill_gene_and_id(template: &str, gene: &str, id: &str) -> String {
    template.replace(":gene", gene).replace(":id", id)
}
