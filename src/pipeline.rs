use std::fs;
use std::io::Read;

use flate2::read::GzDecoder;

use crate::batch::HttpTextFetcher;
use crate::cache::Cache;
use crate::config::Config;
use crate::error::BiolinksError;
use crate::hosts::HostTable;
use crate::kegg;
use crate::linkdb::{LinkDbClient, LinkDbRecord};
use crate::links::{LinkBundle, LinkContext};
use crate::ontology::{self, OntologyHttpClient};
use crate::resolver::{self, IdResolver};
use crate::store::KeyValueStore;
use crate::uniprot::{ProteinRecord, UniprotClient};

pub struct App<U: UniprotClient, L: LinkDbClient> {
    store: Box<dyn KeyValueStore>,
    hosts: HostTable,
    config: Config,
    uniprot: U,
    linkdb: L,
}

impl<U: UniprotClient, L: LinkDbClient> App<U, L> {
    pub fn new(
        store: Box<dyn KeyValueStore>,
        hosts: HostTable,
        config: Config,
        uniprot: U,
        linkdb: L,
    ) -> Self {
        Self {
            store,
            hosts,
            config,
            uniprot,
            linkdb,
        }
    }

    pub fn query(&self, raw: &str) -> Vec<LinkBundle> {
        let queries: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        let resolver = IdResolver::new(self.store.as_ref(), &self.config.mappings);
        let ids = resolver.resolve_all(&queries);
        self.bundles(&ids)
    }

    pub fn resolve(&self, query: &str) -> Result<Vec<String>, BiolinksError> {
        let resolver = IdResolver::new(self.store.as_ref(), &self.config.mappings);
        resolver.resolve(query)
    }

    pub fn bundles(&self, ids: &[String]) -> Vec<LinkBundle> {
        let cache = Cache::new(self.store.as_ref(), self.config.ttl_days);
        let proteins: Vec<ProteinRecord> =
            cache.load_or_fetch(ids, |missed| self.uniprot.fetch(missed));

        let mut kegg_ids = Vec::new();
        for protein in &proteins {
            for reference in &protein.db_references {
                if reference.db == "KEGG" && !kegg_ids.contains(&reference.id) {
                    kegg_ids.push(reference.id.clone());
                }
            }
        }
        if !kegg_ids.is_empty() {
            cache.load_or_fetch::<LinkDbRecord, _>(&kegg_ids, |missed| self.linkdb.fetch(missed));
        }

        let ctx = LinkContext {
            hosts: &self.hosts,
            store: self.store.as_ref(),
        };

        let mut bundles: Vec<LinkBundle> = Vec::new();
        for protein in &proteins {
            bundles.push(protein.bundle(&ctx));
        }

        for id in ids {
            let covered = proteins.iter().any(|protein| {
                protein.id == *id || protein.accessions.iter().any(|accession| accession == id)
            });
            if !covered {
                bundles.push(LinkBundle::empty(id));
            }
        }

        bundles
    }

    pub fn ingest_ontology(&self) -> Result<usize, BiolinksError> {
        let client = OntologyHttpClient::new(&self.config.ontology_url)?;
        ontology::ingest(self.store.as_ref(), &client)
    }

    pub fn ingest_orthology(&self) -> Result<usize, BiolinksError> {
        let fetcher = HttpTextFetcher::new()?;
        kegg::ingest_orthology(
            self.store.as_ref(),
            &fetcher,
            &self.config.orthology_list_url,
            &self.config.orthology_entry_base,
        )
    }

    pub fn ingest_mappings(&self, path: &str) -> Result<usize, BiolinksError> {
        let content = read_maybe_gzip(path)?;
        resolver::ingest_mappings(self.store.as_ref(), &self.config.mappings, &content)
    }
}

fn read_maybe_gzip(path: &str) -> Result<String, BiolinksError> {
    let bytes =
        fs::read(path).map_err(|err| BiolinksError::Filesystem(format!("{path}: {err}")))?;
    if path.ends_with(".gz") {
        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut content = String::new();
        decoder
            .read_to_string(&mut content)
            .map_err(|err| BiolinksError::Filesystem(format!("{path}: {err}")))?;
        return Ok(content);
    }
    String::from_utf8(bytes).map_err(|err| BiolinksError::Filesystem(format!("{path}: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kegg::{Domain, PathwayLink};
    use crate::store::MemoryStore;
    use crate::uniprot::CrossReference;
    use chrono::DateTime;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::sync::Mutex;

    struct FixtureUniprot {
        calls: Mutex<usize>,
    }

    impl FixtureUniprot {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl UniprotClient for &FixtureUniprot {
        fn fetch(&self, ids: &[String]) -> Result<Vec<ProteinRecord>, BiolinksError> {
            *self.calls.lock().unwrap() += 1;
            Ok(ids
                .iter()
                .filter(|id| id.starts_with('P'))
                .map(|id| protein(id))
                .collect())
        }
    }

    struct FixtureLinkDb {
        calls: Mutex<usize>,
    }

    impl FixtureLinkDb {
        fn new() -> Self {
            Self {
                calls: Mutex::new(0),
            }
        }
    }

    impl LinkDbClient for &FixtureLinkDb {
        fn fetch(&self, ids: &[String]) -> Result<Vec<LinkDbRecord>, BiolinksError> {
            *self.calls.lock().unwrap() += 1;
            Ok(ids
                .iter()
                .map(|id| LinkDbRecord {
                    id: id.clone(),
                    links: vec![PathwayLink {
                        id: id.clone(),
                        domain: Domain::Gene,
                        description: String::new(),
                    }],
                    fetched_at: DateTime::UNIX_EPOCH,
                })
                .collect())
        }
    }

    fn protein(id: &str) -> ProteinRecord {
        ProteinRecord {
            id: id.to_string(),
            accessions: vec![id.to_string()],
            names: vec![format!("{id}_HUMAN")],
            protein: Default::default(),
            organism: Default::default(),
            gene_locations: Vec::new(),
            comments: Vec::new(),
            db_references: vec![CrossReference {
                db: "KEGG".to_string(),
                id: "hsa:3043".to_string(),
                properties: Vec::new(),
            }],
            fetched_at: DateTime::UNIX_EPOCH,
        }
    }

    fn app<'a>(
        store: MemoryStore,
        uniprot: &'a FixtureUniprot,
        linkdb: &'a FixtureLinkDb,
    ) -> App<&'a FixtureUniprot, &'a FixtureLinkDb> {
        App::new(
            Box::new(store),
            HostTable::from_lines("UniProtKB-AC https://up.example/:id\n"),
            Config::default(),
            uniprot,
            linkdb,
        )
    }

    #[test]
    fn query_resolves_mapping_and_builds_bundle() {
        let store = MemoryStore::new();
        resolver::ingest_mappings(
            &store,
            &Config::default().mappings,
            "P69905\tGeneID\t3043\n",
        )
        .unwrap();

        let uniprot = FixtureUniprot::new();
        let linkdb = FixtureLinkDb::new();
        let app = app(store, &uniprot, &linkdb);

        let bundles = app.query("3043");
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].id, "P69905");
        assert_eq!(bundles[0].links[0].db, "UniProtKB-AC");
        assert_eq!(
            bundles[0].links[0].link.as_deref(),
            Some("https://up.example/P69905")
        );
        assert!(bundles[0].links.iter().any(|link| link.db == "KEGG_GENE"));
    }

    #[test]
    fn unresolved_query_is_forwarded_and_left_empty() {
        let uniprot = FixtureUniprot::new();
        let linkdb = FixtureLinkDb::new();
        let app = app(MemoryStore::new(), &uniprot, &linkdb);

        let bundles = app.query("hsa:9999");
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].id, "hsa:9999");
        assert!(bundles[0].links.is_empty());
    }

    #[test]
    fn repeated_query_is_served_from_cache() {
        let uniprot = FixtureUniprot::new();
        let linkdb = FixtureLinkDb::new();
        let app = app(MemoryStore::new(), &uniprot, &linkdb);

        let first = app.query("P69905");
        assert_eq!(first.len(), 1);
        assert_eq!(uniprot.calls(), 1);

        let second = app.query("P69905");
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].id, "P69905");
        assert_eq!(uniprot.calls(), 1);
    }

    #[test]
    fn blank_query_parts_are_dropped() {
        let uniprot = FixtureUniprot::new();
        let linkdb = FixtureLinkDb::new();
        let app = app(MemoryStore::new(), &uniprot, &linkdb);

        let bundles = app.query(" P69905, ,");
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].id, "P69905");
    }

    #[test]
    fn mapping_files_may_be_gzipped() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("idmapping.dat");
        fs::write(&plain, "P69905\tGeneID\t3043\nP69905\tKEGG\thsa:3039\n").unwrap();

        let gz_path = dir.path().join("idmapping.dat.gz");
        let file = fs::File::create(&gz_path).unwrap();
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(b"P68871\tGeneID\t3043\n").unwrap();
        encoder.finish().unwrap();

        let uniprot = FixtureUniprot::new();
        let linkdb = FixtureLinkDb::new();
        let app = app(MemoryStore::new(), &uniprot, &linkdb);

        assert_eq!(app.ingest_mappings(plain.to_str().unwrap()).unwrap(), 2);
        assert_eq!(app.resolve("3043").unwrap(), vec!["P69905"]);
        assert_eq!(app.resolve("KEGG:hsa:3039").unwrap(), vec!["P69905"]);

        assert_eq!(app.ingest_mappings(gz_path.to_str().unwrap()).unwrap(), 1);
        assert_eq!(app.resolve("3043").unwrap(), vec!["P68871"]);
    }
}
