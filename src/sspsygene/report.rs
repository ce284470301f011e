use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::error::{DatasetError, DatasetQualityError};
use crate::gene_mapping::MappingStats;
use crate::table_load::LoadedTable;
use crate::types::{ColumnName, DatasetName, TableName};

#[derive(Debug, Clone)]
pub struct ColumnReport {
    pub column_name: ColumnName,
    // None if no value in the column resolved
    pub link_table_name: Option<TableName>,
    pub link_rows: usize,
    pub stats: MappingStats,
}

#[derive(Debug, Clone)]
pub struct TableReport {
    pub table_name: TableName,
    pub row_count: usize,
    pub skipped_rows: usize,
    pub split_fallbacks: usize,
    pub columns: Vec<ColumnReport>,
    pub quality_warning: Option<DatasetQualityError>,
}

impl From<&LoadedTable> for TableReport {
    fn from(loaded_table: &LoadedTable) -> TableReport {
        let columns =
            loaded_table.all_mappings()
            .map(|mapping| ColumnReport {
                column_name: mapping.column_name.clone(),
                link_table_name:
                    if mapping.links.is_empty() {
                        None
                    } else {
                        Some(mapping.link_table_name.clone())
                    },
                link_rows: mapping.links.len(),
                stats: mapping.stats.clone(),
            })
            .collect();

        TableReport {
            table_name: loaded_table.table_name.clone(),
            row_count: loaded_table.row_count,
            skipped_rows: loaded_table.skipped_rows,
            split_fallbacks: loaded_table.split_fallbacks,
            columns,
            quality_warning: loaded_table.quality_warning.clone(),
        }
    }
}

#[derive(Debug)]
pub enum DatasetOutcome {
    Loaded(Vec<TableReport>),
    Failed(DatasetError),
}

#[derive(Debug)]
pub struct DatasetReport {
    pub dataset_name: DatasetName,
    pub outcome: DatasetOutcome,
}

impl DatasetReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, DatasetOutcome::Loaded(_))
    }

    pub fn tables(&self) -> &[TableReport] {
        match self.outcome {
            DatasetOutcome::Loaded(ref tables) => tables.as_slice(),
            DatasetOutcome::Failed(_) => &[],
        }
    }

    pub fn error(&self) -> Option<&DatasetError> {
        match self.outcome {
            DatasetOutcome::Loaded(_) => None,
            DatasetOutcome::Failed(ref err) => Some(err),
        }
    }
}

// what a successful run did, printed by sspsygene-load-db
#[derive(Debug)]
pub struct RunReport {
    pub started: DateTime<Local>,
    pub finished: DateTime<Local>,
    pub output_path: PathBuf,
    pub central_gene_count: usize,
    pub ambiguous_token_count: usize,
    pub datasets: Vec<DatasetReport>,
}

impl RunReport {
    pub fn failed_datasets(&self) -> impl Iterator<Item = &DatasetReport> {
        self.datasets.iter().filter(|dataset| !dataset.is_loaded())
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableReport> {
        self.datasets.iter().flat_map(|dataset| dataset.tables())
    }

    pub fn table(&self, table_name: &str) -> Option<&TableReport> {
        self.tables().find(|table| table.table_name == table_name)
    }

    pub fn quality_warnings(&self) -> impl Iterator<Item = &DatasetQualityError> {
        self.tables().filter_map(|table| table.quality_warning.as_ref())
    }
}

fn write_samples(f: &mut fmt::Formatter, label: &str, count: usize,
                 samples: &indexmap::IndexSet<String>) -> fmt::Result {
    if count == 0 {
        return Ok(());
    }
    write!(f, "      {}: {}", label, count)?;
    if !samples.is_empty() {
        write!(f, " (eg. {})", itertools::join(samples, ", "))?;
    }
    writeln!(f)
}

impl fmt::Display for TableReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "  table {}: {} rows, {} skipped", self.table_name, self.row_count,
                 self.skipped_rows)?;
        if self.split_fallbacks > 0 {
            writeln!(f, "    values without split separator: {}", self.split_fallbacks)?;
        }
        for column in &self.columns {
            match column.link_table_name {
                Some(ref link_table_name) =>
                    writeln!(f, "    {} -> {}: {} link rows, {} ignored", column.column_name,
                             link_table_name, column.link_rows, column.stats.ignored)?,
                None =>
                    writeln!(f, "    {}: no genes resolved, no link table", column.column_name)?,
            }
            let stats = &column.stats;
            write_samples(f, "ambiguous", stats.ambiguous, &stats.ambiguous_samples)?;
            if stats.unresolved > 0 {
                writeln!(f, "      unresolved: {} ({} not contig names)",
                         stats.unresolved, stats.unresolved_solid())?;
                write_samples(f, "unresolved values", stats.unresolved_samples.len(),
                              &stats.unresolved_samples)?;
            }
        }
        if let Some(ref warning) = self.quality_warning {
            writeln!(f, "    WARNING: {}", warning)?;
        }
        Ok(())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "run started {}, finished {}", self.started.format("%Y-%m-%d %H:%M:%S"),
                 self.finished.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "{} central genes, {} ambiguous tokens not resolvable",
                 self.central_gene_count, self.ambiguous_token_count)?;

        for dataset in &self.datasets {
            match dataset.outcome {
                DatasetOutcome::Loaded(ref tables) => {
                    writeln!(f, "dataset {}: loaded {} tables", dataset.dataset_name, tables.len())?;
                    for table in tables {
                        write!(f, "{}", table)?;
                    }
                },
                DatasetOutcome::Failed(ref err) => {
                    writeln!(f, "dataset {}: FAILED: {}", dataset.dataset_name, err)?;
                },
            }
        }

        let failed_count = self.failed_datasets().count();
        let warning_count = self.quality_warnings().count();

        writeln!(f, "{} datasets loaded, {} failed, {} quality warnings",
                 self.datasets.len() - failed_count, failed_count, warning_count)?;
        writeln!(f, "wrote {}", self.output_path.display())
    }
}
