use std::collections::{BTreeSet, HashMap};

use crate::table_load::LoadedTable;
use crate::types::{CentralGeneId, Species, TableName};

// Which tables each central gene appears in and under what names.
// Filled in after each table is committed.
#[derive(Debug, Default)]
pub struct DatasetMembership {
    tables: HashMap<CentralGeneId, BTreeSet<TableName>>,
    used_names: HashMap<(CentralGeneId, Species), BTreeSet<String>>,
}

impl DatasetMembership {
    pub fn new() -> DatasetMembership {
        DatasetMembership::default()
    }

    pub fn add_table(&mut self, loaded_table: &LoadedTable) {
        for gene_id in loaded_table.used_genes() {
            self.tables.entry(gene_id).or_default().insert(loaded_table.table_name.clone());
        }

        for (gene_id, species, name) in loaded_table.used_names() {
            self.used_names.entry((gene_id, species)).or_default().insert(name);
        }
    }

    pub fn num_datasets(&self, gene_id: CentralGeneId) -> usize {
        self.tables.get(&gene_id).map(|tables| tables.len()).unwrap_or(0)
    }

    pub fn dataset_names(&self, gene_id: CentralGeneId) -> Vec<&str> {
        self.tables.get(&gene_id)
            .map(|tables| tables.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn used_names(&self, gene_id: CentralGeneId, species: Species) -> Vec<&str> {
        self.used_names.get(&(gene_id, species))
            .map(|names| names.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    // genes used by at least one table
    pub fn gene_count(&self) -> usize {
        self.tables.len()
    }
}
