use std::collections::HashSet;

use chrono::Local;
use tracing::{info, warn};

use crate::central_gene::CentralGeneRegistry;
use crate::config::Config;
use crate::data_tables::insert_table_metadata;
use crate::dataset_config::{discover_datasets, validate_corpus, Dataset};
use crate::error::{DatasetError, PipelineError, PipelineResult};
use crate::homology::HomologySources;
use crate::membership::DatasetMembership;
use crate::report::{DatasetOutcome, DatasetReport, RunReport, TableReport};
use crate::store::{write_central_gene_table, StagingStore};
use crate::table_load::{prepare_table, LoadedTable, PreparedTable};

fn failed(dataset_name: &str, err: DatasetError) -> DatasetReport {
    warn!("not loading dataset {}: {}", dataset_name, err);
    DatasetReport {
        dataset_name: dataset_name.to_owned(),
        outcome: DatasetOutcome::Failed(err),
    }
}

// Load every table of a dataset in one transaction.  The outer Err is
// fatal for the run, a DatasetOutcome::Failed only skips this dataset.
fn load_dataset(store: &mut StagingStore, dataset: &Dataset, registry: &CentralGeneRegistry,
                config: &Config, membership: &mut DatasetMembership)
    -> PipelineResult<DatasetReport>
{
    info!("loading dataset {}", dataset.name);

    let mut prepared_tables: Vec<PreparedTable> = vec![];

    for table_spec in &dataset.config.tables {
        match prepare_table(dataset, table_spec, registry, config.max_skipped_row_fraction,
                            config.unresolved_sample_size) {
            Ok(prepared_table) => prepared_tables.push(prepared_table),
            Err(err) => return Ok(failed(&dataset.name, err)),
        }
    }

    let committed_table_names = store.table_names()?;
    let mut new_table_names = HashSet::new();

    for prepared_table in &prepared_tables {
        for table_name in prepared_table.physical_table_names() {
            let lower_name = table_name.to_lowercase();
            if committed_table_names.contains(&lower_name) {
                return Err(PipelineError::TableNameCollision {
                    table: table_name,
                    dataset: dataset.name.clone(),
                });
            }
            if !new_table_names.insert(lower_name) {
                let err = DatasetError::config(&dataset.name, "link_table_name",
                                               format!("table name {} is used twice", table_name));
                return Ok(failed(&dataset.name, err));
            }
        }
    }

    let conn = store.conn_mut()?;
    let tx = conn.transaction()?;

    let mut loaded_tables: Vec<LoadedTable> = vec![];

    for (table_spec, prepared_table) in dataset.config.tables.iter().zip(prepared_tables) {
        let loaded_table = match prepared_table.write(&tx) {
            Ok(loaded_table) => loaded_table,
            Err(err) => {
                tx.rollback()?;
                return Ok(failed(&dataset.name, err));
            }
        };

        insert_table_metadata(&tx, table_spec, &dataset.config.publication, &loaded_table)?;

        loaded_tables.push(loaded_table);
    }

    tx.commit()?;

    for loaded_table in &loaded_tables {
        membership.add_table(loaded_table);
    }

    let table_reports = loaded_tables.iter().map(TableReport::from).collect();

    Ok(DatasetReport {
        dataset_name: dataset.name.clone(),
        outcome: DatasetOutcome::Loaded(table_reports),
    })
}

// Build the central gene registry, load every dataset and swap the new
// store into place.  On Err the existing output is left untouched.
pub fn run(config: &Config) -> PipelineResult<RunReport> {
    let started = Local::now();

    let sources = HomologySources::read(&config.hgnc_path(), &config.mgi_path(),
                                        &config.alliance_homology_path())?;
    let registry = CentralGeneRegistry::build(&sources);
    drop(sources);

    let datasets_root = config.datasets_path();
    let mut dataset_reports = vec![];
    let mut datasets = vec![];

    for dataset_dir in discover_datasets(&datasets_root)? {
        match Dataset::load(&dataset_dir) {
            Ok(dataset) => datasets.push(dataset),
            Err(err) => {
                let dataset_name =
                    dataset_dir.file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                dataset_reports.push(failed(&dataset_name, err));
            }
        }
    }

    let (datasets, rejected) = validate_corpus(datasets);

    for (dataset_name, err) in rejected {
        dataset_reports.push(failed(&dataset_name, err));
    }

    info!("loading {} datasets from {}", datasets.len(), datasets_root.display());

    let mut store = StagingStore::create(&config.output_db_path())?;
    let mut membership = DatasetMembership::new();

    for dataset in &datasets {
        let dataset_report = load_dataset(&mut store, dataset, &registry, config, &mut membership)?;
        dataset_reports.push(dataset_report);
    }

    write_central_gene_table(store.conn_mut()?, &registry, &membership)?;

    let output_path = store.finish()?;

    dataset_reports.sort_by(|a, b| a.dataset_name.cmp(&b.dataset_name));

    Ok(RunReport {
        started,
        finished: Local::now(),
        output_path,
        central_gene_count: registry.len(),
        ambiguous_token_count: registry.ambiguous_token_count(),
        datasets: dataset_reports,
    })
}
