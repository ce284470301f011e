use std::collections::BTreeSet;

use indexmap::IndexSet;
use regex::Regex;
use tracing::debug;

use crate::central_gene::{CentralGeneRegistry, Resolution};
use crate::dataset_config::GeneMappingRule;
use crate::types::{CentralGeneId, ColumnName, Species, TableName};

lazy_static! {
    // clone and contig accessions used as gene names, eg. AC118555.1
    static ref CONTIG_RE: Regex =
        Regex::new(r"^(((C[RU]|F[OP]|AUXG|BX|A[CDFJLP])\d{6}\.\d{1,2})|([UZ]\d{5}\.\d))$").unwrap();
}

pub fn is_contig_name(value: &str) -> bool {
    CONTIG_RE.is_match(value)
}

// What to look up for a raw cell value, or None if the rule says to skip it.
pub fn normalise_value(rule: &GeneMappingRule, raw_value: &str) -> Option<String> {
    let value = raw_value.trim();

    if rule.ignore_empty && value.is_empty() {
        return None;
    }

    let value =
        if rule.to_upper {
            value.to_uppercase()
        } else {
            value.to_owned()
        };

    if rule.ignore_missing.contains(&value) {
        return None;
    }

    match rule.replace.get(&value) {
        Some(replacement) => Some(replacement.clone()),
        None => Some(value),
    }
}

// counts of what happened to the values of one gene column
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingStats {
    pub resolved: usize,
    pub ignored: usize,
    pub ambiguous: usize,
    pub unresolved: usize,
    // unresolved values that look like contig or clone names
    pub unresolved_contigs: usize,
    pub ambiguous_samples: IndexSet<String>,
    pub unresolved_samples: IndexSet<String>,
}

impl MappingStats {
    // unresolved values that look like real gene symbols
    pub fn unresolved_solid(&self) -> usize {
        self.unresolved - self.unresolved_contigs
    }
}

// the resolved rows of one gene column, becomes a link table
#[derive(Debug, Clone)]
pub struct ColumnMapping {
    pub column_name: ColumnName,
    pub link_table_name: TableName,
    pub species: Species,
    pub is_perturbed: bool,
    pub is_target: bool,
    // (row id, central gene id)
    pub links: Vec<(i64, CentralGeneId)>,
    // the names that resolved, per gene
    pub used_names: BTreeSet<(CentralGeneId, String)>,
    pub stats: MappingStats,
}

impl ColumnMapping {
    pub fn used_genes(&self) -> BTreeSet<CentralGeneId> {
        self.links.iter().map(|(_, gene_id)| *gene_id).collect()
    }

    // "column:link_table:is_perturbed:is_target" as stored in data_tables
    pub fn meta_entry(&self) -> String {
        format!("{}:{}:{}:{}", self.column_name, self.link_table_name,
                self.is_perturbed as u8, self.is_target as u8)
    }
}

pub struct GeneColumnMapper<'a> {
    registry: &'a CentralGeneRegistry,
    rule: &'a GeneMappingRule,
    table_name: &'a str,
    sample_size: usize,
    mapping: ColumnMapping,
}

impl<'a> GeneColumnMapper<'a> {
    pub fn new(registry: &'a CentralGeneRegistry, rule: &'a GeneMappingRule,
               table_name: &'a str, column_name: &str, link_table_name: TableName,
               sample_size: usize)
        -> GeneColumnMapper<'a>
    {
        GeneColumnMapper {
            registry,
            rule,
            table_name,
            sample_size,
            mapping: ColumnMapping {
                column_name: column_name.to_owned(),
                link_table_name,
                species: rule.species,
                is_perturbed: rule.is_perturbed,
                is_target: rule.is_target,
                links: vec![],
                used_names: BTreeSet::new(),
                stats: MappingStats::default(),
            },
        }
    }

    pub fn map_value(&mut self, row_id: i64, raw_value: &str) {
        let Some(value) = normalise_value(self.rule, raw_value)
        else {
            self.mapping.stats.ignored += 1;
            return;
        };

        let resolution = self.registry.resolve_gene(self.rule.species, self.rule.gene_type, &value);
        let stats = &mut self.mapping.stats;

        match resolution {
            Resolution::Resolved(gene_id) => {
                stats.resolved += 1;
                self.mapping.links.push((row_id, gene_id));
                self.mapping.used_names.insert((gene_id, value));
            },
            Resolution::Ambiguous(gene_ids) => {
                stats.ambiguous += 1;
                let gene_names =
                    gene_ids.iter()
                    .filter_map(|gene_id| self.registry.gene(*gene_id))
                    .map(|gene| gene.display_name());
                debug!("{}.{}: {} {} is ambiguous, matches {}",
                       self.table_name, self.rule.column_name, self.rule.species,
                       value, itertools::join(gene_names, ", "));
                if stats.ambiguous_samples.len() < self.sample_size {
                    stats.ambiguous_samples.insert(value);
                }
            },
            Resolution::Unresolved => {
                stats.unresolved += 1;
                if is_contig_name(&value) {
                    stats.unresolved_contigs += 1;
                } else {
                    debug!("{}.{}: {} gene {} not found", self.table_name,
                           self.rule.column_name, self.rule.species, value);
                }
                if stats.unresolved_samples.len() < self.sample_size {
                    stats.unresolved_samples.insert(value);
                }
            },
        }
    }

    pub fn finish(self) -> ColumnMapping {
        self.mapping
    }
}

#[cfg(test)]
fn test_rule() -> GeneMappingRule {
    serde_json::from_str(r#"{
        "column_name": "gene",
        "link_table_name": "gene",
        "species": "human",
        "to_upper": true,
        "ignore_empty": true,
        "ignore_missing": ["NONTARGET1"],
        "replace": {"TBCE.1": "TBCE"}
    }"#).unwrap()
}

#[test]
fn test_normalise_value() {
    let rule = test_rule();

    assert_eq!(normalise_value(&rule, ""), None);
    assert_eq!(normalise_value(&rule, "  "), None);
    assert_eq!(normalise_value(&rule, "NonTarget1"), None);
    assert_eq!(normalise_value(&rule, "tbce.1").as_deref(), Some("TBCE"));
    assert_eq!(normalise_value(&rule, "Satb1").as_deref(), Some("SATB1"));
}

#[test]
fn test_contig_names() {
    assert!(is_contig_name("AC118555.1"));
    assert!(is_contig_name("AL512330.12"));
    assert!(is_contig_name("U52111.1"));
    assert!(!is_contig_name("SATB1"));
    assert!(!is_contig_name("AC118555"));
}
