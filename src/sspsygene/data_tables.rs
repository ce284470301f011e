// The data_tables registry: one row describing each loaded dataset table.

use rusqlite::{Connection, OptionalExtension, Transaction};

use crate::constants::DATA_TABLES_TABLE_NAME;
use crate::dataset_config::{Publication, TableSpec};
use crate::error::{PipelineError, PipelineResult};
use crate::table_load::LoadedTable;

// in column order
pub const DATA_TABLES_COLUMNS: [&str; 17] =
    ["table_name", "short_label", "long_label", "description", "display_columns",
     "gene_columns", "gene_species", "scalar_columns", "link_tables", "authors", "year",
     "journal", "doi", "pmid", "links", "categories", "organism"];

pub fn create_data_tables_table(conn: &Connection) -> rusqlite::Result<()> {
    let column_defs =
        DATA_TABLES_COLUMNS.iter()
        .map(|column| {
            if *column == "year" {
                format!("{} INTEGER", column)
            } else if *column == "table_name" {
                format!("{} TEXT NOT NULL", column)
            } else {
                format!("{} TEXT", column)
            }
        })
        .collect::<Vec<_>>();

    conn.execute(&format!("CREATE TABLE {} (
                             id INTEGER PRIMARY KEY AUTOINCREMENT,
                             {}
                           )",
                          DATA_TABLES_TABLE_NAME, column_defs.join(",\n")),
                 ())?;

    Ok(())
}

// run once after all tables are loaded
pub fn create_data_tables_indexes(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(&format!("CREATE INDEX data_tables_table_idx ON {} (table_name)",
                          DATA_TABLES_TABLE_NAME), ())?;
    conn.execute(&format!("CREATE INDEX data_tables_gene_species_idx ON {} (gene_species)",
                          DATA_TABLES_TABLE_NAME), ())?;
    Ok(())
}

fn table_is_registered(tx: &Transaction, table_name: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> =
        tx.query_row(&format!("SELECT id FROM {} WHERE lower(table_name) = lower(?1)",
                              DATA_TABLES_TABLE_NAME),
                     [table_name], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

// "col:table__link:1:0,col2:table__link2:0:1"
pub fn link_tables_encoding(loaded_table: &LoadedTable) -> String {
    itertools::join(loaded_table.link_tables.iter().map(|mapping| mapping.meta_entry()), ",")
}

pub fn insert_table_metadata(tx: &Transaction, table_spec: &TableSpec,
                             publication: &Publication, loaded_table: &LoadedTable)
    -> PipelineResult<()>
{
    if table_is_registered(tx, &loaded_table.table_name)? {
        return Err(PipelineError::MetadataDuplicate(loaded_table.table_name.clone()));
    }

    let gene_species =
        itertools::join(loaded_table.gene_species.iter().map(|species| species.as_str()), ",");

    let placeholders =
        (1..=DATA_TABLES_COLUMNS.len()).map(|i| format!("?{}", i)).collect::<Vec<_>>();

    tx.execute(&format!("INSERT INTO {} ({}) VALUES ({})", DATA_TABLES_TABLE_NAME,
                        DATA_TABLES_COLUMNS.join(", "), placeholders.join(", ")),
               rusqlite::params![
                   loaded_table.table_name,
                   table_spec.short_label,
                   table_spec.long_label,
                   table_spec.description,
                   loaded_table.display_columns.join(","),
                   loaded_table.gene_columns.join(","),
                   gene_species,
                   loaded_table.scalar_columns.join(","),
                   link_tables_encoding(loaded_table),
                   publication.authors.join(", "),
                   publication.year,
                   publication.journal,
                   publication.doi,
                   publication.pmid,
                   table_spec.links.join(","),
                   table_spec.categories.join(","),
                   table_spec.organism,
               ])?;

    Ok(())
}

#[cfg(test)]
fn test_loaded_table(table_name: &str) -> LoadedTable {
    use crate::gene_mapping::{ColumnMapping, MappingStats};
    use crate::types::Species;

    let mapping = ColumnMapping {
        column_name: "perturbed_gene".to_owned(),
        link_table_name: format!("{}__perturbed", table_name),
        species: Species::Mouse,
        is_perturbed: true,
        is_target: false,
        links: vec![(0, 7)],
        used_names: [(7, "Satb1".to_owned())].into_iter().collect(),
        stats: MappingStats::default(),
    };

    LoadedTable {
        table_name: table_name.to_owned(),
        row_count: 1,
        skipped_rows: 0,
        split_fallbacks: 0,
        display_columns: vec!["perturbed_gene".to_owned(), "log2fc".to_owned()],
        gene_columns: vec!["perturbed_gene".to_owned()],
        gene_species: vec![Species::Mouse],
        scalar_columns: vec!["log2fc".to_owned()],
        link_tables: vec![mapping],
        unlinked_mappings: vec![],
        quality_warning: None,
    }
}

#[test]
fn test_insert_table_metadata() {
    let table_spec: TableSpec = serde_json::from_str(r#"{
        "table": "screen",
        "shortLabel": "Screen",
        "longLabel": "A CRISPR screen",
        "description": "test",
        "links": ["https://example.org/a", "https://example.org/b"],
        "organism": "mouse",
        "in_path": "screen.tsv",
        "separator": "\t"
    }"#).unwrap();
    let publication: Publication = serde_json::from_str(r#"{
        "authors": ["A Author", "B Author"], "year": 2022, "journal": "J", "pmid": 42
    }"#).unwrap();

    let mut conn = Connection::open_in_memory().unwrap();
    create_data_tables_table(&conn).unwrap();

    let tx = conn.transaction().unwrap();
    let loaded_table = test_loaded_table("screen");
    insert_table_metadata(&tx, &table_spec, &publication, &loaded_table).unwrap();

    let result = insert_table_metadata(&tx, &table_spec, &publication,
                                       &test_loaded_table("SCREEN"));
    assert!(matches!(result, Err(PipelineError::MetadataDuplicate(_))));
    tx.commit().unwrap();

    let (link_tables, authors, year, doi, links): (String, String, i64, Option<String>, String) =
        conn.query_row("SELECT link_tables, authors, year, doi, links FROM data_tables
                        WHERE table_name = 'screen'", [],
                       |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?,
                                 row.get(4)?))).unwrap();

    assert_eq!(link_tables, "perturbed_gene:screen__perturbed:1:0");
    assert_eq!(authors, "A Author, B Author");
    assert_eq!(year, 2022);
    assert_eq!(doi, None);
    assert_eq!(links, "https://example.org/a,https://example.org/b");

    create_data_tables_indexes(&conn).unwrap();
}
