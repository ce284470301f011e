#[macro_use] extern crate serde_derive;
#[macro_use] extern crate lazy_static;

pub mod constants;
pub mod types;
pub mod error;
pub mod config;
pub mod homology;
pub mod union_find;
pub mod central_gene;
pub mod dataset_config;
pub mod gene_mapping;
pub mod table_load;
pub mod data_tables;
pub mod membership;
pub mod store;
pub mod report;
pub mod pipeline;
