pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod hosts;
pub mod kegg;
pub mod linkdb;
pub mod links;
pub mod ontology;
pub mod pipeline;
pub mod render;
pub mod resolver;
pub mod store;
pub mod uniprot;
