use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use biolinks::config::Config;
use biolinks::error::BiolinksError;
use biolinks::hosts::HostTable;
use biolinks::linkdb::{LinkDbClient, LinkDbHttpClient, LinkDbRecord};
use biolinks::pipeline::App;
use biolinks::render::{self, OutputFormat};
use biolinks::store::{FileStore, KeyValueStore};
use biolinks::uniprot::{ProteinRecord, UniprotClient, UniprotHttpClient};

#[derive(Parser)]
#[command(name = "biolinks")]
#[command(about = "Cross-reference link aggregator for biological identifiers")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    hosts: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Collect cross-reference links for one or more identifiers")]
    Query(QueryArgs),
    #[command(about = "Resolve an identifier to UniProt accessions")]
    Resolve(ResolveArgs),
    #[command(about = "Download and cache reference data")]
    Ingest(IngestArgs),
}

#[derive(Args)]
struct QueryArgs {
    #[arg(required = true)]
    ids: Vec<String>,

    #[arg(long, value_enum, default_value = "html")]
    format: OutputFormat,
}

#[derive(Args)]
struct ResolveArgs {
    id: String,
}

#[derive(Args)]
struct IngestArgs {
    #[command(subcommand)]
    command: IngestCommand,
}

#[derive(Subcommand)]
enum IngestCommand {
    #[command(about = "Download the Gene Ontology and cache its terms")]
    Ontology,
    #[command(about = "Download KEGG Orthology entries and cache them")]
    Orthology,
    #[command(about = "Load identifier mappings from an idmapping file")]
    Mappings(MappingsArgs),
}

#[derive(Args)]
struct MappingsArgs {
    file: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<BiolinksError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &BiolinksError) -> u8 {
    match error {
        BiolinksError::ConversionFailed(_)
        | BiolinksError::ConfigRead(_)
        | BiolinksError::ConfigParse(_) => 2,
        BiolinksError::Http(_)
        | BiolinksError::ClientRequest { .. }
        | BiolinksError::ServerRequest { .. }
        | BiolinksError::UnknownRequest { .. }
        | BiolinksError::UrlBudget { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).into_diagnostic()?;

    let store: Box<dyn KeyValueStore> = match &config.store_root {
        Some(root) => {
            Box::new(FileStore::open(Utf8PathBuf::from(root.as_str())).into_diagnostic()?)
        }
        None => Box::new(FileStore::open_default().into_diagnostic()?),
    };
    let hosts = HostTable::load(cli.hosts.as_deref().unwrap_or(config.hosts_path.as_str()));

    match cli.command {
        Commands::Query(args) => {
            let uniprot =
                UniprotHttpClient::new(&config.uniprot_entry_base, &config.uniprot_upload_url)
                    .into_diagnostic()?;
            let linkdb = LinkDbHttpClient::new(&config.linkdb_base).into_diagnostic()?;
            let app = App::new(store, hosts, config, uniprot, linkdb);
            let bundles = app.query(&args.ids.join(","));
            let rendered = render::render(&bundles, args.format).into_diagnostic()?;
            println!("{rendered}");
        }
        Commands::Resolve(args) => {
            let app = App::new(store, hosts, config, NopUniprot, NopLinkDb);
            let ids = app.resolve(&args.id).into_diagnostic()?;
            for id in ids {
                println!("{id}");
            }
        }
        Commands::Ingest(args) => {
            let app = App::new(store, hosts, config, NopUniprot, NopLinkDb);
            match args.command {
                IngestCommand::Ontology => {
                    let count = app.ingest_ontology().into_diagnostic()?;
                    println!("cached {count} ontology terms");
                }
                IngestCommand::Orthology => {
                    let count = app.ingest_orthology().into_diagnostic()?;
                    println!("cached {count} orthology entries");
                }
                IngestCommand::Mappings(args) => {
                    let count = app.ingest_mappings(&args.file).into_diagnostic()?;
                    println!("loaded {count} identifier mappings");
                }
            }
        }
    }

    Ok(())
}

struct NopUniprot;
struct NopLinkDb;

impl UniprotClient for NopUniprot {
    fn fetch(&self, _ids: &[String]) -> Result<Vec<ProteinRecord>, BiolinksError> {
        Err(BiolinksError::Http(
            "UniProt client not configured".to_string(),
        ))
    }
}

impl LinkDbClient for NopLinkDb {
    fn fetch(&self, _ids: &[String]) -> Result<Vec<LinkDbRecord>, BiolinksError> {
        Err(BiolinksError::Http(
            "LinkDB client not configured".to_string(),
        ))
    }
}
