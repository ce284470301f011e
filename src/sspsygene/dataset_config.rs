use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Deserialize as _;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use tracing::{debug, warn};

use crate::constants::{DATASET_CONFIG_FILE_NAME, LINK_TABLE_SEPARATOR, RESERVED_TABLE_NAMES};
use crate::error::{DatasetError, DatasetResult, PipelineError, PipelineResult};
use crate::types::{DatasetName, GeneType, Species, TableName};

lazy_static! {
    static ref SQL_IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref MISSING_FIELD_RE: Regex = Regex::new(r"(?:missing|unknown) field `([^`]+)`").unwrap();
}

// accept either "a string" or ["a", "list"]
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where D: Deserializer<'de>
{
    struct OneOrMany;

    impl<'de> Visitor<'de> for OneOrMany {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<Vec<String>, E> {
            Ok(vec![value.to_owned()])
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<String>, A::Error> {
            let mut values = vec![];
            while let Some(value) = seq.next_element::<String>()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_any(OneOrMany)
}

// PMIDs are sometimes written as numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where D: Deserializer<'de>
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    let value: Option<StringOrNumber> = Option::deserialize(deserializer)?;

    Ok(value.map(|v| match v {
        StringOrNumber::String(s) => s,
        StringOrNumber::Number(n) => n.to_string(),
    }))
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Publication {
    #[serde(deserialize_with = "one_or_many")]
    pub authors: Vec<String>,
    pub year: u32,
    pub journal: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub doi: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub pmid: Option<String>,
}

// who prepared the dataset, not used when loading
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct Maintainer {
    pub name: String,
    pub email: String,
    pub date: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct SplitColumnRule {
    pub source_col: String,
    pub new_col1: String,
    pub new_col2: String,
    pub sep: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct GeneMappingRule {
    pub column_name: String,
    // eg. "gene" or "perturbation_gene", the link table is <table>__<link_table_name>
    pub link_table_name: String,
    pub species: Species,
    #[serde(default)]
    pub gene_type: GeneType,
    #[serde(default)]
    pub to_upper: bool,
    // placeholder values like "NonTarget1" that aren't genes
    #[serde(default)]
    pub ignore_missing: Vec<String>,
    #[serde(default)]
    pub ignore_empty: bool,
    #[serde(default)]
    pub is_perturbed: bool,
    #[serde(default)]
    pub is_target: bool,
    // raw value -> corrected symbol, applied before lookup
    #[serde(default)]
    pub replace: HashMap<String, String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct TableSpec {
    pub table: TableName,
    #[serde(rename = "shortLabel")]
    pub short_label: String,
    #[serde(rename = "longLabel")]
    pub long_label: String,
    pub description: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub links: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub categories: Vec<String>,
    pub organism: String,
    pub in_path: PathBuf,
    pub separator: String,
    #[serde(default)]
    pub split_column_map: Vec<SplitColumnRule>,
    #[serde(default)]
    pub gene_mappings: Vec<GeneMappingRule>,
    // extra columns to index, gene columns are always indexed
    #[serde(default)]
    pub index_fields: Vec<String>,
}

impl TableSpec {
    pub fn separator_byte(&self) -> Option<u8> {
        match self.separator.as_str() {
            "\t" | "\\t" | "tab" => Some(b'\t'),
            "comma" => Some(b','),
            sep if sep.len() == 1 && sep.is_ascii() => sep.bytes().next(),
            _ => None,
        }
    }

    pub fn in_file(&self, dataset_dir: &Path) -> PathBuf {
        dataset_dir.join(&self.in_path)
    }

    pub fn link_table_physical_name(&self, rule: &GeneMappingRule) -> TableName {
        format!("{}{}{}", self.table, LINK_TABLE_SEPARATOR, rule.link_table_name)
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct DatasetConfig {
    pub publication: Publication,
    #[serde(default)]
    pub maintainers: Vec<Maintainer>,
    pub tables: Vec<TableSpec>,
}

impl DatasetConfig {
    // parse <dataset_dir>/config.json
    pub fn read(dataset_name: &str, dataset_dir: &Path) -> DatasetResult<DatasetConfig> {
        let config_path = dataset_dir.join(DATASET_CONFIG_FILE_NAME);

        let file = File::open(&config_path)
            .map_err(|err| DatasetError::config(dataset_name, DATASET_CONFIG_FILE_NAME,
                                                format!("can't read {}: {}",
                                                        config_path.display(), err)))?;
        let reader = BufReader::new(file);

        serde_json::from_reader(reader)
            .map_err(|err| {
                let message = err.to_string();
                let field =
                    MISSING_FIELD_RE.captures(&message)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_owned())
                    .unwrap_or_else(|| DATASET_CONFIG_FILE_NAME.to_owned());
                DatasetError::config(dataset_name, &field, message)
            })
    }
}

// one directory under the datasets root
#[derive(Clone, Debug)]
pub struct Dataset {
    pub name: DatasetName,
    pub dir: PathBuf,
    pub config: DatasetConfig,
}

fn validate_table(dataset: &Dataset, table_spec: &TableSpec) -> DatasetResult<()> {
    let name = &dataset.name;
    let table = &table_spec.table;

    if !SQL_IDENTIFIER_RE.is_match(table) {
        return Err(DatasetError::config(name, "table",
                                        format!("\"{}\" is not a valid table name", table)));
    }

    let lower_table = table.to_lowercase();
    if RESERVED_TABLE_NAMES.contains(&lower_table.as_str()) {
        return Err(DatasetError::config(name, "table",
                                        format!("\"{}\" is a reserved table name", table)));
    }

    for (field, value) in [("shortLabel", &table_spec.short_label),
                           ("longLabel", &table_spec.long_label),
                           ("organism", &table_spec.organism)] {
        if value.trim().is_empty() {
            return Err(DatasetError::config(name, field,
                                            format!("empty value in table {}", table)));
        }
    }

    if table_spec.separator_byte().is_none() {
        return Err(DatasetError::config(name, "separator",
                                        format!("table {}: unsupported separator \"{}\"",
                                                table, table_spec.separator)));
    }

    let in_file = table_spec.in_file(&dataset.dir);
    if !in_file.is_file() {
        return Err(DatasetError::config(name, "in_path",
                                        format!("table {}: {} doesn't exist",
                                                table, in_file.display())));
    }

    for split_rule in &table_spec.split_column_map {
        if split_rule.sep.is_empty() {
            return Err(DatasetError::config(name, "split_column_map.sep",
                                            format!("table {}: empty separator for column {}",
                                                    table, split_rule.source_col)));
        }
    }

    let perturbed_count = table_spec.gene_mappings.iter().filter(|r| r.is_perturbed).count();
    if perturbed_count > 1 {
        return Err(DatasetError::config(name, "is_perturbed",
                                        format!("table {} has {} perturbed gene mappings, \
                                                 at most one is allowed", table, perturbed_count)));
    }

    let target_count = table_spec.gene_mappings.iter().filter(|r| r.is_target).count();
    if target_count > 1 {
        return Err(DatasetError::config(name, "is_target",
                                        format!("table {} has {} target gene mappings, \
                                                 at most one is allowed", table, target_count)));
    }

    let mut seen_link_table_names = HashSet::new();

    for rule in &table_spec.gene_mappings {
        if rule.column_name.trim().is_empty() {
            return Err(DatasetError::config(name, "column_name",
                                            format!("table {}: empty gene column name", table)));
        }
        if !SQL_IDENTIFIER_RE.is_match(&rule.link_table_name) {
            return Err(DatasetError::config(name, "link_table_name",
                                            format!("table {}: \"{}\" is not a valid link table name",
                                                    table, rule.link_table_name)));
        }
        if !seen_link_table_names.insert(rule.link_table_name.to_lowercase()) {
            return Err(DatasetError::config(name, "link_table_name",
                                            format!("table {}: link table name \"{}\" used twice",
                                                    table, rule.link_table_name)));
        }
    }

    Ok(())
}

impl Dataset {
    pub fn load(dataset_dir: &Path) -> DatasetResult<Dataset> {
        let name =
            dataset_dir.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| dataset_dir.to_string_lossy().to_string());

        let config = DatasetConfig::read(&name, dataset_dir)?;

        let dataset = Dataset {
            name,
            dir: dataset_dir.to_path_buf(),
            config,
        };

        dataset.validate()?;

        Ok(dataset)
    }

    pub fn validate(&self) -> DatasetResult<()> {
        if self.config.tables.is_empty() {
            return Err(DatasetError::config(&self.name, "tables", "no tables configured"));
        }

        for maintainer in &self.config.maintainers {
            if chrono::NaiveDate::parse_from_str(&maintainer.date, "%Y-%m-%d").is_err() {
                warn!("{}: maintainer {} has a date that isn't YYYY-MM-DD: {}",
                      self.name, maintainer.name, maintainer.date);
            }
        }

        let mut seen_tables = HashSet::new();

        for table_spec in &self.config.tables {
            validate_table(self, table_spec)?;

            if !seen_tables.insert(table_spec.table.to_lowercase()) {
                return Err(DatasetError::config(&self.name, "table",
                                                format!("table name {} is used twice",
                                                        table_spec.table)));
            }
        }

        Ok(())
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.config.tables.iter().map(|t| t.table.as_str())
    }
}

// the directories under the datasets root, sorted by name
pub fn discover_datasets(datasets_root: &Path) -> PipelineResult<Vec<PathBuf>> {
    let entries = fs::read_dir(datasets_root)
        .map_err(|source| PipelineError::DatasetsRootUnreadable {
            path: datasets_root.to_path_buf(),
            source,
        })?;

    let mut dirs = vec![];

    for entry in entries {
        let entry = entry.map_err(|source| PipelineError::DatasetsRootUnreadable {
            path: datasets_root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            debug!("ignoring {} in datasets directory", path.display());
        }
    }

    dirs.sort();

    Ok(dirs)
}

// Reject datasets that declare a table name already declared by an earlier
// dataset.  The datasets are checked in the order given.
pub fn validate_corpus(datasets: Vec<Dataset>) -> (Vec<Dataset>, Vec<(DatasetName, DatasetError)>) {
    let mut table_owners: HashMap<String, DatasetName> = HashMap::new();
    let mut accepted = vec![];
    let mut rejected = vec![];

    'DATASET: for dataset in datasets {
        for table_name in dataset.table_names() {
            if let Some(owner) = table_owners.get(&table_name.to_lowercase()) {
                let err = DatasetError::config(&dataset.name, "table",
                                               format!("table name {} is already used by dataset {}",
                                                       table_name, owner));
                rejected.push((dataset.name.clone(), err));
                continue 'DATASET;
            }
        }

        for table_name in dataset.table_names() {
            table_owners.insert(table_name.to_lowercase(), dataset.name.clone());
        }

        accepted.push(dataset);
    }

    (accepted, rejected)
}
