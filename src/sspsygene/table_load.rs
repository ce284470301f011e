use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::io::Read;
use std::path::Path;

use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Transaction};
use tracing::{debug, info, warn};

use crate::central_gene::CentralGeneRegistry;
use crate::constants::{CENTRAL_GENE_ID_COLUMN, ROW_ID_COLUMN};
use crate::dataset_config::{Dataset, SplitColumnRule, TableSpec};
use crate::error::{DatasetError, DatasetQualityError, DatasetResult};
use crate::gene_mapping::{ColumnMapping, GeneColumnMapper};
use crate::homology::open_reader;
use crate::types::{CentralGeneId, ColumnName, Species, TableName};

lazy_static! {
    static ref NON_SQL_CHAR_RE: Regex = Regex::new(r"[^a-z0-9_]").unwrap();
    static ref UNDERSCORES_RE: Regex = Regex::new(r"_+").unwrap();
}

// "Log2 Fold-Change" -> "log2_fold_change"
pub fn sql_friendly_name(name: &str) -> ColumnName {
    let lower = name.trim().to_lowercase();
    let replaced = NON_SQL_CHAR_RE.replace_all(&lower, "_");
    UNDERSCORES_RE.replace_all(&replaced, "_").into_owned()
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Text => "TEXT",
        }
    }

    // INTEGER if every non-empty value is an integer, REAL if every
    // non-empty value is a number
    pub fn infer<'a>(values: impl Iterator<Item = &'a str>) -> ColumnType {
        let mut column_type = None;

        for value in values {
            if value.is_empty() {
                continue;
            }

            let value_type =
                if value.parse::<i64>().is_ok() {
                    ColumnType::Integer
                } else if value.parse::<f64>().map(|f| f.is_finite()).unwrap_or(false) {
                    ColumnType::Real
                } else {
                    return ColumnType::Text;
                };

            column_type =
                match (column_type, value_type) {
                    (None, t) => Some(t),
                    (Some(ColumnType::Integer), ColumnType::Integer) => Some(ColumnType::Integer),
                    _ => Some(ColumnType::Real),
                };
        }

        column_type.unwrap_or(ColumnType::Text)
    }

    fn sql_value(&self, value: &str) -> Value {
        if value.is_empty() && *self != ColumnType::Text {
            return Value::Null;
        }

        match self {
            ColumnType::Integer =>
                value.parse::<i64>().map(Value::Integer)
                    .unwrap_or_else(|_| Value::Text(value.to_owned())),
            ColumnType::Real =>
                value.parse::<f64>().map(Value::Real)
                    .unwrap_or_else(|_| Value::Text(value.to_owned())),
            ColumnType::Text => Value::Text(value.to_owned()),
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.sql_type())
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    // the header as written in the file, or the new_col name of a split rule
    pub header: String,
    pub name: ColumnName,
    pub column_type: ColumnType,
}

// A table that has been read, split and mapped, ready to write.
#[derive(Debug)]
pub struct PreparedTable {
    pub table_name: TableName,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub skipped_rows: usize,
    pub split_fallbacks: usize,
    // one entry per gene mapping rule, in rule order
    pub mappings: Vec<ColumnMapping>,
    pub index_columns: Vec<ColumnName>,
    pub quality_warning: Option<DatasetQualityError>,
}

fn find_column(columns: &[Column], name: &str) -> Option<usize> {
    columns.iter().position(|column| column.header == name)
        .or_else(|| {
            let friendly_name = sql_friendly_name(name);
            columns.iter().position(|column| column.name == friendly_name)
        })
}

fn missing_column(table_name: &str, columns: &[Column], name: &str) -> DatasetError {
    DatasetError::MissingColumn {
        table: table_name.to_owned(),
        column: name.to_owned(),
        available: itertools::join(columns.iter().map(|c| c.name.as_str()), ", "),
    }
}

fn check_column_names(table_name: &str, columns: &[Column]) -> DatasetResult<()> {
    let mut seen = HashSet::new();

    for column in columns {
        if column.name.is_empty() || column.name == "_" {
            return Err(DatasetError::InvalidColumns {
                table: table_name.to_owned(),
                message: format!("column \"{}\" has no usable name", column.header),
            });
        }
        if column.name == ROW_ID_COLUMN {
            return Err(DatasetError::InvalidColumns {
                table: table_name.to_owned(),
                message: format!("column \"{}\" uses the reserved name \"{}\"",
                                 column.header, ROW_ID_COLUMN),
            });
        }
        if !seen.insert(column.name.as_str()) {
            return Err(DatasetError::InvalidColumns {
                table: table_name.to_owned(),
                message: format!("more than one column is named \"{}\"", column.name),
            });
        }
    }

    Ok(())
}

// split at the first separator, a value without one goes in the first column
pub fn split_value<'a>(value: &'a str, sep: &str) -> (&'a str, &'a str, bool) {
    match value.split_once(sep) {
        Some((first, second)) => (first, second, true),
        None => (value, "", false),
    }
}

fn apply_split_rule(table_name: &str, split_rule: &SplitColumnRule,
                    columns: &mut Vec<Column>, rows: &mut [Vec<String>])
    -> DatasetResult<usize>
{
    let source_idx = find_column(columns, &split_rule.source_col)
        .ok_or_else(|| missing_column(table_name, columns, &split_rule.source_col))?;

    let mut fallbacks = 0;

    for row in rows.iter_mut() {
        let (first, second, was_split) = split_value(&row[source_idx], &split_rule.sep);
        let (first, second) = (first.to_owned(), second.to_owned());
        if !was_split {
            fallbacks += 1;
        }
        row.push(first);
        row.push(second);
    }

    for new_col in [&split_rule.new_col1, &split_rule.new_col2] {
        columns.push(Column {
            header: new_col.clone(),
            name: sql_friendly_name(new_col),
            column_type: ColumnType::Text,
        });
    }

    if fallbacks > 0 {
        debug!("{}: {} values of {} don't contain \"{}\"", table_name, fallbacks,
               split_rule.source_col, split_rule.sep);
    }

    Ok(fallbacks)
}

fn read_rows<R: Read>(table_spec: &TableSpec, in_file: &Path, reader: R)
    -> DatasetResult<(Vec<Column>, Vec<Vec<String>>, usize)>
{
    let input_error = |message: String| DatasetError::InputFile {
        path: in_file.to_path_buf(),
        message,
    };

    let separator = table_spec.separator_byte()
        .ok_or_else(|| input_error(format!("unsupported separator \"{}\"", table_spec.separator)))?;

    let mut csv_reader =
        csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(separator)
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()
        .map_err(|err| input_error(err.to_string()))?
        .clone();

    let columns: Vec<Column> =
        headers.iter()
        .map(|header| {
            let header = header.trim().to_owned();
            Column {
                name: sql_friendly_name(&header),
                header,
                column_type: ColumnType::Text,
            }
        })
        .collect();

    let mut rows = vec![];
    let mut skipped_rows = 0;

    for result in csv_reader.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                if err.is_io_error() {
                    return Err(input_error(err.to_string()));
                }
                debug!("{}: skipping unreadable row: {}", in_file.display(), err);
                skipped_rows += 1;
                continue;
            }
        };

        if record.len() != columns.len() {
            let line = record.position().map(|pos| pos.line()).unwrap_or(0);
            debug!("{}: skipping line {} with {} fields, expected {}", in_file.display(),
                   line, record.len(), columns.len());
            skipped_rows += 1;
            continue;
        }

        rows.push(record.iter().map(str::to_owned).collect());
    }

    Ok((columns, rows, skipped_rows))
}

fn quality_warning(table_name: &str, skipped: usize, kept: usize, max_fraction: f64)
    -> Option<DatasetQualityError>
{
    let total = skipped + kept;

    if total == 0 || skipped == 0 {
        return None;
    }

    let fraction = skipped as f64 / total as f64;

    if fraction > max_fraction {
        Some(DatasetQualityError {
            table: table_name.to_owned(),
            skipped,
            total,
            percent: fraction * 100.0,
            max_percent: max_fraction * 100.0,
        })
    } else {
        None
    }
}

// Read a dataset table and resolve its gene columns.  Nothing is written.
pub fn prepare_table(dataset: &Dataset, table_spec: &TableSpec, registry: &CentralGeneRegistry,
                     max_skipped_row_fraction: f64, sample_size: usize)
    -> DatasetResult<PreparedTable>
{
    let table_name = &table_spec.table;
    let in_file = table_spec.in_file(&dataset.dir);

    let reader = open_reader(&in_file)
        .map_err(|err| DatasetError::InputFile {
            path: in_file.clone(),
            message: err.to_string(),
        })?;

    let (mut columns, mut rows, skipped_rows) = read_rows(table_spec, &in_file, reader)?;

    let mut split_fallbacks = 0;
    for split_rule in &table_spec.split_column_map {
        split_fallbacks += apply_split_rule(table_name, split_rule, &mut columns, &mut rows)?;
    }

    check_column_names(table_name, &columns)?;

    for (idx, column) in columns.iter_mut().enumerate() {
        column.column_type = ColumnType::infer(rows.iter().map(|row| row[idx].as_str()));
    }

    let mut mappings = vec![];

    for rule in &table_spec.gene_mappings {
        let column_idx = find_column(&columns, &rule.column_name)
            .ok_or_else(|| missing_column(table_name, &columns, &rule.column_name))?;

        let mut mapper =
            GeneColumnMapper::new(registry, rule, table_name, &columns[column_idx].name,
                                  table_spec.link_table_physical_name(rule), sample_size);

        for (row_id, row) in rows.iter().enumerate() {
            mapper.map_value(row_id as i64, &row[column_idx]);
        }

        mappings.push(mapper.finish());
    }

    let mut index_columns: Vec<ColumnName> = vec![];

    for mapping in &mappings {
        if !index_columns.contains(&mapping.column_name) {
            index_columns.push(mapping.column_name.clone());
        }
    }

    for index_field in &table_spec.index_fields {
        let column_idx = find_column(&columns, index_field)
            .ok_or_else(|| missing_column(table_name, &columns, index_field))?;
        let column_name = &columns[column_idx].name;
        if !index_columns.contains(column_name) {
            index_columns.push(column_name.clone());
        }
    }

    let quality_warning =
        quality_warning(table_name, skipped_rows, rows.len(), max_skipped_row_fraction);

    if let Some(ref warning) = quality_warning {
        warn!("{}", warning);
    }

    Ok(PreparedTable {
        table_name: table_name.clone(),
        columns,
        rows,
        skipped_rows,
        split_fallbacks,
        mappings,
        index_columns,
        quality_warning,
    })
}

// what was written for one table
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub table_name: TableName,
    pub row_count: usize,
    pub skipped_rows: usize,
    pub split_fallbacks: usize,
    pub display_columns: Vec<ColumnName>,
    pub gene_columns: Vec<ColumnName>,
    pub gene_species: Vec<Species>,
    pub scalar_columns: Vec<ColumnName>,
    // only the mappings that resolved at least one row have a link table
    pub link_tables: Vec<ColumnMapping>,
    pub unlinked_mappings: Vec<ColumnMapping>,
    pub quality_warning: Option<DatasetQualityError>,
}

impl LoadedTable {
    // one entry per gene in any link table of this table
    pub fn used_genes(&self) -> BTreeSet<CentralGeneId> {
        self.link_tables.iter().flat_map(|mapping| mapping.used_genes()).collect()
    }

    pub fn used_names(&self) -> BTreeSet<(CentralGeneId, Species, String)> {
        self.link_tables.iter()
            .flat_map(|mapping| {
                mapping.used_names.iter()
                    .map(|(gene_id, name)| (*gene_id, mapping.species, name.clone()))
            })
            .collect()
    }

    pub fn all_mappings(&self) -> impl Iterator<Item = &ColumnMapping> {
        self.link_tables.iter().chain(self.unlinked_mappings.iter())
    }
}

// tables and indexes share one case-insensitive namespace
fn schema_name_exists(tx: &Transaction, name: &str) -> rusqlite::Result<bool> {
    let count: i64 =
        tx.query_row("SELECT count(*) FROM sqlite_master WHERE lower(name) = lower(?1)",
                     [name], |row| row.get(0))?;
    Ok(count > 0)
}

// "<table>_<column>_idx", with a numeric suffix if another table and
// column pair already produced that name, eg. rna.seq_gene and rna_seq.gene
fn index_name(tx: &Transaction, table_name: &str, column_name: &str) -> rusqlite::Result<String> {
    let base_name = format!("{}_{}_idx", table_name, column_name);
    let mut name = base_name.clone();
    let mut suffix = 1;

    while schema_name_exists(tx, &name)? {
        suffix += 1;
        name = format!("{}_{}", base_name, suffix);
    }

    Ok(name)
}

fn create_index(tx: &Transaction, table_name: &str, column_name: &str) -> rusqlite::Result<String> {
    let name = index_name(tx, table_name, column_name)?;
    tx.execute(&format!("CREATE INDEX {} ON {} ({})", quote_identifier(&name),
                        quote_identifier(table_name), quote_identifier(column_name)),
               ())?;
    Ok(name)
}

impl PreparedTable {
    // the base table and any link tables that will be created
    pub fn physical_table_names(&self) -> Vec<TableName> {
        let mut names = vec![self.table_name.clone()];
        names.extend(self.mappings.iter()
                     .filter(|mapping| !mapping.links.is_empty())
                     .map(|mapping| mapping.link_table_name.clone()));
        names
    }

    fn write_base_table(&self, tx: &Transaction) -> rusqlite::Result<()> {
        let column_defs =
            self.columns.iter()
            .map(|column| format!("{} {}", quote_identifier(&column.name), column.column_type))
            .collect::<Vec<_>>();

        tx.execute(&format!("CREATE TABLE {} ({} INTEGER PRIMARY KEY{}{})",
                            quote_identifier(&self.table_name), ROW_ID_COLUMN,
                            if column_defs.is_empty() { "" } else { ", " },
                            column_defs.join(", ")),
                   ())?;

        let column_names =
            std::iter::once(ROW_ID_COLUMN.to_owned())
            .chain(self.columns.iter().map(|column| quote_identifier(&column.name)))
            .collect::<Vec<_>>();
        let placeholders =
            (1..=column_names.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>();

        let mut stmt = tx.prepare(&format!("INSERT INTO {} ({}) VALUES ({})",
                                           quote_identifier(&self.table_name),
                                           column_names.join(", "), placeholders.join(", ")))?;

        for (row_id, row) in self.rows.iter().enumerate() {
            let values =
                std::iter::once(Value::Integer(row_id as i64))
                .chain(self.columns.iter().zip(row.iter())
                       .map(|(column, value)| column.column_type.sql_value(value)));
            stmt.execute(params_from_iter(values))?;
        }

        Ok(())
    }

    fn write_link_table(tx: &Transaction, mapping: &ColumnMapping) -> rusqlite::Result<()> {
        let link_table_name = &mapping.link_table_name;

        tx.execute(&format!("CREATE TABLE {} (
                               {} INTEGER NOT NULL,
                               {} INTEGER NOT NULL
                             )",
                            quote_identifier(link_table_name), ROW_ID_COLUMN,
                            CENTRAL_GENE_ID_COLUMN),
                   ())?;

        let mut stmt = tx.prepare(&format!("INSERT INTO {} ({}, {}) VALUES (?1, ?2)",
                                           quote_identifier(link_table_name), ROW_ID_COLUMN,
                                           CENTRAL_GENE_ID_COLUMN))?;

        for (row_id, gene_id) in &mapping.links {
            stmt.execute((row_id, gene_id))?;
        }

        create_index(tx, link_table_name, ROW_ID_COLUMN)?;
        create_index(tx, link_table_name, CENTRAL_GENE_ID_COLUMN)?;

        Ok(())
    }

    // create the base table, its link tables and indexes
    pub fn write(self, tx: &Transaction) -> DatasetResult<LoadedTable> {
        self.write_base_table(tx)?;

        for column_name in &self.index_columns {
            create_index(tx, &self.table_name, column_name)?;
        }

        let mut link_tables = vec![];
        let mut unlinked_mappings = vec![];

        let gene_columns =
            self.mappings.iter().map(|mapping| mapping.column_name.clone()).collect::<Vec<_>>();

        let mut gene_species = vec![];
        for mapping in &self.mappings {
            if !gene_species.contains(&mapping.species) {
                gene_species.push(mapping.species);
            }
        }

        for mapping in self.mappings {
            if mapping.links.is_empty() {
                info!("{}: no genes resolved in column {}, not creating {}",
                      self.table_name, mapping.column_name, mapping.link_table_name);
                unlinked_mappings.push(mapping);
            } else {
                PreparedTable::write_link_table(tx, &mapping)?;
                link_tables.push(mapping);
            }
        }

        let display_columns =
            self.columns.iter().map(|column| column.name.clone()).collect::<Vec<_>>();

        let scalar_columns =
            self.columns.iter()
            .filter(|column| column.column_type == ColumnType::Real &&
                    !gene_columns.contains(&column.name))
            .map(|column| column.name.clone())
            .collect::<Vec<_>>();

        info!("{}: loaded {} rows, {} link tables", self.table_name, self.rows.len(),
              link_tables.len());

        Ok(LoadedTable {
            table_name: self.table_name,
            row_count: self.rows.len(),
            skipped_rows: self.skipped_rows,
            split_fallbacks: self.split_fallbacks,
            display_columns,
            gene_columns,
            gene_species,
            scalar_columns,
            link_tables,
            unlinked_mappings,
            quality_warning: self.quality_warning,
        })
    }
}

#[test]
fn test_sql_friendly_name() {
    assert_eq!(sql_friendly_name("Log2 Fold-Change"), "log2_fold_change");
    assert_eq!(sql_friendly_name("p.value (adj)"), "p_value_adj_");
    assert_eq!(sql_friendly_name("Gene"), "gene");
}

#[test]
fn test_split_value() {
    assert_eq!(split_value("X_Y", "_"), ("X", "Y", true));
    assert_eq!(split_value("A_B_C", "_"), ("A", "B_C", true));
    assert_eq!(split_value("NOSEP", "_"), ("NOSEP", "", false));
}

#[test]
fn test_column_type_inference() {
    assert_eq!(ColumnType::infer(["1", "", "-3"].into_iter()), ColumnType::Integer);
    assert_eq!(ColumnType::infer(["1", "2.5", "1e-5"].into_iter()), ColumnType::Real);
    assert_eq!(ColumnType::infer(["1", "NA"].into_iter()), ColumnType::Text);
    assert_eq!(ColumnType::infer(["", ""].into_iter()), ColumnType::Text);
    assert_eq!(ColumnType::infer(["inf"].into_iter()), ColumnType::Text);
}

#[test]
fn test_quality_warning() {
    assert_eq!(quality_warning("t1", 0, 100, 0.05), None);
    assert_eq!(quality_warning("t1", 5, 95, 0.05), None);
    let warning = quality_warning("t1", 6, 94, 0.05).unwrap();
    assert_eq!(warning.skipped, 6);
    assert_eq!(warning.total, 100);
}
