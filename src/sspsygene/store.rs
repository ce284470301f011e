use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use flexstr::SharedStr as FlexStr;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::central_gene::CentralGeneRegistry;
use crate::constants::{CENTRAL_GENE_TABLE_NAME, ROW_ID_COLUMN};
use crate::data_tables::{create_data_tables_indexes, create_data_tables_table};
use crate::error::{PipelineError, PipelineResult};
use crate::membership::DatasetMembership;
use crate::types::Species;

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut file_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    file_name.push(suffix);
    path.with_file_name(file_name)
}

pub fn staging_path(output_path: &Path) -> PathBuf {
    sibling_path(output_path, ".staging")
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn remove_with_companions(path: &Path) -> std::io::Result<()> {
    remove_if_exists(path)?;
    remove_if_exists(&sibling_path(path, "-wal"))?;
    remove_if_exists(&sibling_path(path, "-shm"))?;
    Ok(())
}

fn join_strs<'a>(values: impl IntoIterator<Item = &'a str>) -> String {
    itertools::join(values, ",")
}

pub fn write_central_gene_table(conn: &mut Connection, registry: &CentralGeneRegistry,
                                membership: &DatasetMembership)
    -> rusqlite::Result<()>
{
    let tx = conn.transaction()?;

    tx.execute(&format!("CREATE TABLE {} (
                           {} INTEGER PRIMARY KEY,
                           human_symbol TEXT,
                           mouse_symbols TEXT,
                           human_synonyms TEXT,
                           mouse_synonyms TEXT,
                           hgnc_ids TEXT,
                           mgi_ids TEXT,
                           human_entrez_ids TEXT,
                           mouse_entrez_ids TEXT,
                           human_ensembl_ids TEXT,
                           mouse_ensembl_ids TEXT,
                           num_datasets INTEGER NOT NULL,
                           dataset_names TEXT,
                           used_human_names TEXT,
                           used_mouse_names TEXT
                         )",
                        CENTRAL_GENE_TABLE_NAME, ROW_ID_COLUMN),
               ())?;

    {
        let mut stmt = tx.prepare(&format!("INSERT INTO {} VALUES
                                              (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                                               ?12, ?13, ?14, ?15)",
                                           CENTRAL_GENE_TABLE_NAME))?;

        for gene in registry.genes() {
            stmt.execute(rusqlite::params![
                gene.id,
                gene.human_symbol.as_ref().map(FlexStr::as_str),
                join_strs(gene.mouse_symbols.iter().map(FlexStr::as_str)),
                join_strs(gene.human_synonyms.iter().map(FlexStr::as_str)),
                join_strs(gene.mouse_synonyms.iter().map(FlexStr::as_str)),
                join_strs(gene.hgnc_ids.iter().map(FlexStr::as_str)),
                join_strs(gene.mgi_ids.iter().map(FlexStr::as_str)),
                join_strs(gene.human_entrez_ids.iter().map(FlexStr::as_str)),
                join_strs(gene.mouse_entrez_ids.iter().map(FlexStr::as_str)),
                join_strs(gene.human_ensembl_ids.iter().map(FlexStr::as_str)),
                join_strs(gene.mouse_ensembl_ids.iter().map(FlexStr::as_str)),
                membership.num_datasets(gene.id) as i64,
                join_strs(membership.dataset_names(gene.id)),
                join_strs(membership.used_names(gene.id, Species::Human)),
                join_strs(membership.used_names(gene.id, Species::Mouse)),
            ])?;
        }
    }

    tx.execute(&format!("CREATE INDEX central_gene_human_symbol_idx ON {} (human_symbol)",
                        CENTRAL_GENE_TABLE_NAME), ())?;
    tx.execute(&format!("CREATE INDEX central_gene_num_datasets_idx ON {} (num_datasets)",
                        CENTRAL_GENE_TABLE_NAME), ())?;

    tx.commit()?;

    info!("wrote {} central genes, {} used by at least one table",
          registry.len(), membership.gene_count());

    Ok(())
}

// The output database while it is being built.  It lives next to the
// output file and only replaces it in finish().  If the StagingStore is
// dropped without finish() the staging file is removed.
pub struct StagingStore {
    staging_path: PathBuf,
    output_path: PathBuf,
    conn: Option<Connection>,
}

impl StagingStore {
    pub fn create(output_path: &Path) -> PipelineResult<StagingStore> {
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let staging_path = staging_path(output_path);

        // left over from an earlier run that was killed
        remove_with_companions(&staging_path)?;

        let conn = Connection::open(&staging_path)?;

        let journal_mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if journal_mode.to_lowercase() != "wal" {
            warn!("{}: journal_mode is {}", staging_path.display(), journal_mode);
        }
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // 100 MB
        conn.pragma_update(None, "cache_size", -100000)?;
        conn.pragma_update(None, "temp_store", "MEMORY")?;

        create_data_tables_table(&conn)?;

        info!("building {}", staging_path.display());

        Ok(StagingStore {
            staging_path,
            output_path: output_path.to_path_buf(),
            conn: Some(conn),
        })
    }

    pub fn conn_mut(&mut self) -> PipelineResult<&mut Connection> {
        self.conn.as_mut()
            .ok_or_else(|| PipelineError::Io(std::io::Error::other("store is closed")))
    }

    // lower-cased names of all tables in the store
    pub fn table_names(&mut self) -> PipelineResult<HashSet<String>> {
        let conn = self.conn_mut()?;
        let mut stmt = conn.prepare("SELECT lower(name) FROM sqlite_master WHERE type = 'table'")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    // Index, optimise and close the staging database, then move it into place.
    pub fn finish(mut self) -> PipelineResult<PathBuf> {
        let conn = self.conn.take()
            .ok_or_else(|| PipelineError::Io(std::io::Error::other("store is closed")))?;

        create_data_tables_indexes(&conn)?;

        info!("optimizing {}", self.staging_path.display());
        conn.execute_batch("PRAGMA optimize")?;
        let _: String = conn.pragma_update_and_check(None, "journal_mode", "DELETE",
                                                     |row| row.get(0))?;

        conn.close().map_err(|(_, err)| err)?;

        remove_if_exists(&sibling_path(&self.output_path, "-wal"))?;
        remove_if_exists(&sibling_path(&self.output_path, "-shm"))?;

        fs::rename(&self.staging_path, &self.output_path)
            .map_err(|source| PipelineError::Swap {
                staging: self.staging_path.clone(),
                output: self.output_path.clone(),
                source,
            })?;

        info!("moved {} to {}", self.staging_path.display(), self.output_path.display());

        Ok(self.output_path.clone())
    }
}

impl Drop for StagingStore {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn);
            if let Err(err) = remove_with_companions(&self.staging_path) {
                warn!("failed to remove {}: {}", self.staging_path.display(), err);
            }
        } else if self.staging_path.exists() {
            // finish() failed after closing the connection
            if let Err(err) = remove_with_companions(&self.staging_path) {
                warn!("failed to remove {}: {}", self.staging_path.display(), err);
            }
        }
    }
}

#[test]
fn test_staging_path() {
    assert_eq!(staging_path(Path::new("/data/out/sspsygene.db")),
               PathBuf::from("/data/out/sspsygene.db.staging"));
    assert_eq!(sibling_path(Path::new("sspsygene.db"), "-wal"),
               PathBuf::from("sspsygene.db-wal"));
}

#[test]
fn test_write_central_gene_table() {
    use crate::homology::{HomologySources, TokenKind};

    let mut sources = HomologySources::new();
    sources.add(Species::Human, "GENEA", TokenKind::Symbol, "HGNC:1");
    sources.add(Species::Human, "ALIASA", TokenKind::Synonym, "HGNC:1");
    sources.add(Species::Mouse, "Genea", TokenKind::Symbol, "MGI:1");
    sources.add(Species::Mouse, "MGI:1", TokenKind::Identifier(crate::types::IdType::Mgi), "MGI:1");
    sources.link("MGI:1", "HGNC:1");

    let registry = CentralGeneRegistry::build(&sources);
    let membership = DatasetMembership::new();

    let mut conn = Connection::open_in_memory().unwrap();
    write_central_gene_table(&mut conn, &registry, &membership).unwrap();

    let (human_symbol, mouse_symbols, human_synonyms, mgi_ids, num_datasets):
        (String, String, String, String, i64) =
        conn.query_row("SELECT human_symbol, mouse_symbols, human_synonyms, mgi_ids, num_datasets
                        FROM central_gene WHERE id = 0", [],
                       |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?,
                                 row.get(4)?))).unwrap();

    assert_eq!(human_symbol, "GENEA");
    assert_eq!(mouse_symbols, "Genea");
    assert_eq!(human_synonyms, "ALIASA");
    assert_eq!(mgi_ids, "MGI:1");
    assert_eq!(num_datasets, 0);
}
