use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_JSON_ENV_VAR, DEFAULT_MAX_SKIPPED_ROW_FRACTION,
                       DEFAULT_UNRESOLVED_SAMPLE_SIZE};
use crate::error::{PipelineError, PipelineResult};

fn default_max_skipped_row_fraction() -> f64 {
    DEFAULT_MAX_SKIPPED_ROW_FRACTION
}

fn default_unresolved_sample_size() -> usize {
    DEFAULT_UNRESOLVED_SAMPLE_SIZE
}

// paths of the homology and synonym sources, relative to base_dir
#[derive(Deserialize, Clone, Debug)]
pub struct GeneMapFiles {
    // hgnc_complete_set.txt
    pub hgnc: PathBuf,
    // MGI_EntrezGene.rpt
    pub mgi: PathBuf,
    // HGNC_AllianceHomology.rpt
    pub alliance_homology: PathBuf,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub base_dir: PathBuf,
    pub datasets_dir: PathBuf,
    pub output_db: PathBuf,
    pub gene_map_files: GeneMapFiles,
    // warn about a table if more than this fraction of its rows are malformed
    #[serde(default = "default_max_skipped_row_fraction")]
    pub max_skipped_row_fraction: f64,
    // how many unresolved gene tokens to list per table in the run summary
    #[serde(default = "default_unresolved_sample_size")]
    pub unresolved_sample_size: usize,
}

impl Config {
    pub fn read(config_file_name: &Path) -> PipelineResult<Config> {
        let file = File::open(config_file_name)
            .map_err(|err| PipelineError::ConfigRead {
                path: config_file_name.to_path_buf(),
                message: err.to_string(),
            })?;
        let reader = BufReader::new(file);

        serde_json::from_reader(reader)
            .map_err(|err| PipelineError::ConfigRead {
                path: config_file_name.to_path_buf(),
                message: err.to_string(),
            })
    }

    // read the file named by $SSPSYGENE_CONFIG_JSON
    pub fn from_env() -> PipelineResult<Config> {
        match env::var(CONFIG_JSON_ENV_VAR) {
            Ok(file_name) => Config::read(Path::new(&file_name)),
            Err(_) => Err(PipelineError::ConfigRead {
                path: PathBuf::from(format!("${}", CONFIG_JSON_ENV_VAR)),
                message: "environment variable is not set".to_owned(),
            }),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn datasets_path(&self) -> PathBuf {
        self.resolve(&self.datasets_dir)
    }

    pub fn output_db_path(&self) -> PathBuf {
        self.resolve(&self.output_db)
    }

    pub fn hgnc_path(&self) -> PathBuf {
        self.resolve(&self.gene_map_files.hgnc)
    }

    pub fn mgi_path(&self) -> PathBuf {
        self.resolve(&self.gene_map_files.mgi)
    }

    pub fn alliance_homology_path(&self) -> PathBuf {
        self.resolve(&self.gene_map_files.alliance_homology)
    }
}

#[test]
fn test_config_defaults_and_paths() {
    let config: Config = serde_json::from_str(r#"{
        "base_dir": "/data/sspsygene",
        "datasets_dir": "datasets",
        "output_db": "/srv/db/sspsygene.db",
        "gene_map_files": {
            "hgnc": "homology/hgnc_complete_set.txt",
            "mgi": "homology/MGI_EntrezGene.rpt",
            "alliance_homology": "homology/HGNC_AllianceHomology.rpt"
        }
    }"#).unwrap();

    assert_eq!(config.max_skipped_row_fraction, DEFAULT_MAX_SKIPPED_ROW_FRACTION);
    assert_eq!(config.unresolved_sample_size, DEFAULT_UNRESOLVED_SAMPLE_SIZE);
    assert_eq!(config.datasets_path(), PathBuf::from("/data/sspsygene/datasets"));
    assert_eq!(config.output_db_path(), PathBuf::from("/srv/db/sspsygene.db"));
    assert_eq!(config.mgi_path(), PathBuf::from("/data/sspsygene/homology/MGI_EntrezGene.rpt"));
}
