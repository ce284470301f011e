extern crate sspsygene;

use std::fs;

use sspsygene::dataset_config::{discover_datasets, validate_corpus, Dataset, DatasetConfig};
use sspsygene::error::{DatasetError, PipelineError};
use sspsygene::types::{GeneType, Species};

mod util;

use util::*;

const GENE_RULE: &str = r#"{"column_name": "gene", "link_table_name": "gene", "species": "mouse"}"#;

fn field_of(err: &DatasetError) -> &str {
    match err {
        DatasetError::ConfigValidation { field, .. } => field.as_str(),
        _ => panic!("unexpected error: {}", err),
    }
}

#[test]
fn test_read_dataset_config() {
    let fixture = Fixture::new();
    let tables = table_json("t1", "t1.tsv",
                            r#"{"column_name": "Gene Symbol", "link_table_name": "gene",
                                "species": "human", "to_upper": true, "is_perturbed": true,
                                "replace": {"TBCE.1": "TBCE"}, "ignore_missing": ["NonTarget1"]},
                               {"column_name": "ensembl", "link_table_name": "target",
                                "species": "mouse", "gene_type": "ensembl", "is_target": true}"#,
                            r#", "split_column_map": [{"source_col": "combo", "new_col1": "a",
                                                        "new_col2": "b", "sep": "_"}],
                                "index_fields": ["val"]"#);
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "gene\n")]);

    let dataset = Dataset::load(&fixture.dataset_dir("ds1")).unwrap();
    assert_eq!(dataset.name, "ds1");

    let config = &dataset.config;
    assert_eq!(config.publication.authors, vec!["Ada Author", "Bo Builder"]);
    assert_eq!(config.publication.year, 2024);
    assert_eq!(config.publication.pmid.as_deref(), Some("12345678"));
    assert_eq!(config.maintainers[0].name, "Cy Curator");

    let table_spec = &config.tables[0];
    assert_eq!(table_spec.short_label, "t1 short");
    assert_eq!(table_spec.separator_byte(), Some(b'\t'));
    assert_eq!(table_spec.index_fields, vec!["val"]);
    assert_eq!(table_spec.split_column_map[0].new_col2, "b");

    let perturbed_rule = &table_spec.gene_mappings[0];
    assert_eq!(perturbed_rule.species, Species::Human);
    assert_eq!(perturbed_rule.gene_type, GeneType::Symbol);
    assert!(perturbed_rule.to_upper);
    assert_eq!(perturbed_rule.replace.get("TBCE.1").map(String::as_str), Some("TBCE"));
    assert!(perturbed_rule.is_perturbed);
    assert_eq!(table_spec.link_table_physical_name(perturbed_rule), "t1__gene");

    let target_rule = &table_spec.gene_mappings[1];
    assert_eq!(target_rule.gene_type, GeneType::Ensembl);
    assert!(target_rule.is_target);
    assert!(!target_rule.ignore_empty);
}

#[test]
fn test_authors_as_string() {
    let config: DatasetConfig = serde_json::from_str(r#"{
        "publication": {"authors": "Ada Author", "year": 2023, "journal": "J", "pmid": "999"},
        "tables": []
    }"#).unwrap();

    assert_eq!(config.publication.authors, vec!["Ada Author"]);
    assert_eq!(config.publication.pmid.as_deref(), Some("999"));
    assert_eq!(config.publication.doi, None);
    assert!(config.maintainers.is_empty());
}

#[test]
fn test_missing_required_field() {
    let fixture = Fixture::new();
    let tables = table_json("t1", "t1.tsv", GENE_RULE, "").replace("\"shortLabel\"", "\"short\"");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "gene\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "shortLabel");
}

#[test]
fn test_missing_config_file() {
    let fixture = Fixture::new();
    fs::create_dir_all(fixture.dataset_dir("empty")).unwrap();

    let err = Dataset::load(&fixture.dataset_dir("empty")).unwrap_err();
    assert_eq!(field_of(&err), "config.json");
}

#[test]
fn test_reserved_table_name() {
    let fixture = Fixture::new();
    let tables = table_json("central_gene", "t1.tsv", GENE_RULE, "");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "gene\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "table");
}

#[test]
fn test_invalid_table_name() {
    let fixture = Fixture::new();
    let tables = table_json("t1; DROP TABLE x", "t1.tsv", GENE_RULE, "");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "gene\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "table");
}

#[test]
fn test_duplicate_table_in_dataset() {
    let fixture = Fixture::new();
    let tables = format!("{},{}", table_json("t1", "t1.tsv", GENE_RULE, ""),
                         table_json("T1", "t1.tsv", GENE_RULE, ""));
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "gene\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "table");
}

#[test]
fn test_missing_input_file() {
    let fixture = Fixture::new();
    let tables = table_json("t1", "missing.tsv", GENE_RULE, "");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "in_path");
}

#[test]
fn test_two_perturbed_rules() {
    let fixture = Fixture::new();
    let rules = r#"{"column_name": "a", "link_table_name": "a", "species": "mouse", "is_perturbed": true},
                   {"column_name": "b", "link_table_name": "b", "species": "mouse", "is_perturbed": true}"#;
    let tables = table_json("t1", "t1.tsv", rules, "");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "a\tb\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "is_perturbed");
}

#[test]
fn test_two_target_rules() {
    let fixture = Fixture::new();
    let rules = r#"{"column_name": "a", "link_table_name": "a", "species": "mouse", "is_target": true},
                   {"column_name": "b", "link_table_name": "b", "species": "human", "is_target": true}"#;
    let tables = table_json("t1", "t1.tsv", rules, "");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "a\tb\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "is_target");
}

#[test]
fn test_duplicate_link_table_name() {
    let fixture = Fixture::new();
    let rules = r#"{"column_name": "a", "link_table_name": "gene", "species": "mouse"},
                   {"column_name": "b", "link_table_name": "gene", "species": "human"}"#;
    let tables = table_json("t1", "t1.tsv", rules, "");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "a\tb\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "link_table_name");
}

#[test]
fn test_unsupported_separator() {
    let fixture = Fixture::new();
    let tables = table_json("t1", "t1.tsv", GENE_RULE, "").replace(r#""separator": "\t""#,
                                                                 r#""separator": "||""#);
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "gene\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert_eq!(field_of(&err), "separator");
}

#[test]
fn test_unknown_species() {
    let fixture = Fixture::new();
    let rules = r#"{"column_name": "gene", "link_table_name": "gene", "species": "zebrafish"}"#;
    let tables = table_json("t1", "t1.tsv", rules, "");
    fixture.add_dataset("ds1", &dataset_config_json(&tables), &[("t1.tsv", "gene\n")]);

    let err = Dataset::load(&fixture.dataset_dir("ds1")).unwrap_err();
    assert!(matches!(err, DatasetError::ConfigValidation { .. }));
}

#[test]
fn test_discover_datasets() {
    let fixture = Fixture::new();
    let datasets_path = fixture.config.datasets_path();

    for name in ["zeta", "alpha", "mid"] {
        fs::create_dir_all(datasets_path.join(name)).unwrap();
    }
    fs::write(datasets_path.join("README"), "not a dataset").unwrap();

    let dirs = discover_datasets(&datasets_path).unwrap();
    let names = dirs.iter()
        .map(|dir| dir.file_name().unwrap().to_string_lossy().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["alpha", "mid", "zeta"]);

    let result = discover_datasets(&datasets_path.join("no_such_dir"));
    assert!(matches!(result, Err(PipelineError::DatasetsRootUnreadable { .. })));
}

#[test]
fn test_duplicate_table_across_datasets() {
    let fixture = Fixture::new();

    let tables_a = table_json("shared", "a.tsv", GENE_RULE, "");
    fixture.add_dataset("a_dataset", &dataset_config_json(&tables_a), &[("a.tsv", "gene\n")]);
    let tables_b = format!("{},{}", table_json("only_b", "b.tsv", GENE_RULE, ""),
                           table_json("Shared", "b.tsv", GENE_RULE, ""));
    fixture.add_dataset("b_dataset", &dataset_config_json(&tables_b), &[("b.tsv", "gene\n")]);
    let tables_c = table_json("only_c", "c.tsv", GENE_RULE, "");
    fixture.add_dataset("c_dataset", &dataset_config_json(&tables_c), &[("c.tsv", "gene\n")]);

    let datasets = discover_datasets(&fixture.config.datasets_path()).unwrap()
        .iter()
        .map(|dir| Dataset::load(dir).unwrap())
        .collect::<Vec<_>>();

    let (accepted, rejected) = validate_corpus(datasets);

    let accepted_names = accepted.iter().map(|d| d.name.as_str()).collect::<Vec<_>>();
    assert_eq!(accepted_names, vec!["a_dataset", "c_dataset"]);

    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].0, "b_dataset");
    assert_eq!(field_of(&rejected[0].1), "table");
}
