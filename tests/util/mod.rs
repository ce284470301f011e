use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tempfile::TempDir;

use sspsygene::central_gene::CentralGeneRegistry;
use sspsygene::config::{Config, GeneMapFiles};
use sspsygene::homology::HomologySources;

pub const HGNC_HEADER: &str =
    "hgnc_id\tsymbol\tname\tlocus_group\talias_symbol\tprev_symbol\tentrez_id\tensembl_gene_id";

pub const ALLIANCE_HEADER: &str =
    "MGI Accession ID\tMarker Symbol\tHGNC ID\tHGNC Symbol\tEntrez Gene ID\tEnsembl Gene ID";

// central gene ids of the standard sources
#[allow(dead_code)]
pub const SATB1_ID: u32 = 42;
#[allow(dead_code)]
pub const TBCE_ID: u32 = 43;
#[allow(dead_code)]
pub const XLR3A_LOWER_ID: u32 = 44;
#[allow(dead_code)]
pub const XLR3A_UPPER_ID: u32 = 45;
#[allow(dead_code)]
pub const MOUSEY1_ID: u32 = 46;

// 42 filler genes so that SATB1 gets central gene id 42
pub fn hgnc_text() -> String {
    let mut lines = vec![HGNC_HEADER.to_owned()];

    for i in 1..=42 {
        let alias =
            match i {
                // FILLER3 is also a synonym of FILLER4
                4 => "FILLER3",
                5 | 6 => "DUPALIAS",
                _ => "",
            };
        lines.push(format!("HGNC:{}\tFILLER{}\tfiller gene {}\tprotein-coding gene\t{}\t\t{}\t",
                           i, i, i, alias, 100000 + i));
    }

    lines.push("HGNC:11009\tSATB1\tSATB homeobox 1\tprotein-coding gene\t\t\t6304\tENSG00000182568"
               .to_owned());
    lines.push("HGNC:11582\tTBCE\ttubulin folding cofactor E\tprotein-coding gene\t\"KCS|HRDS\"\t\t6905\tENSG00000284770"
               .to_owned());

    lines.join("\n") + "\n"
}

fn mgi_line(accession: &str, symbol: &str, status: &str, name: &str, marker_type: &str,
            entrez_id: &str, synonyms: &str) -> String {
    format!("{}\t{}\t{}\t{}\t1.0\t1\t{}\t\t{}\t{}\tprotein coding gene\t100\t200\t+\tprotein_coding",
            accession, symbol, status, name, marker_type, entrez_id, synonyms)
}

pub fn mgi_text() -> String {
    let lines = [
        mgi_line("MGI:105084", "Satb1", "O", "special AT-rich sequence binding protein 1",
                 "Gene", "20230", "Satb1a"),
        mgi_line("MGI:1913327", "Tbce", "O", "tubulin-specific chaperone E", "Gene", "71052", ""),
        mgi_line("MGI:90001", "Xlr3a", "O", "X-linked lymphocyte-regulated 3A", "Gene", "", ""),
        mgi_line("MGI:90002", "XLR3A", "O", "made up case collision", "Pseudogene", "", ""),
        mgi_line("MGI:90003", "Qtl1", "O", "a QTL", "QTL", "", ""),
        mgi_line("MGI:90004", "Mousey1", "O", "mouse only gene", "Gene", "90004", "Msy1"),
        mgi_line("MGI:90005", "Satb1old", "W", "withdrawn, = Satb1", "Gene", "", ""),
    ];

    lines.join("\n") + "\n"
}

pub fn alliance_text() -> String {
    let lines = [
        ALLIANCE_HEADER.to_owned(),
        "MGI:105084\tSatb1\tHGNC:11009\tSATB1\t20230\tENSMUSG00000023927".to_owned(),
        "MGI:1913327\tTbce\tHGNC:11582\tTBCE\t71052\tnull".to_owned(),
        "MGI:90004\tMousey1\tnull\tnull\t90004\tENSMUSG00000090004".to_owned(),
    ];

    lines.join("\n") + "\n"
}

#[allow(dead_code)]
pub fn standard_sources() -> HomologySources {
    let mut sources = HomologySources::new();
    sources.parse_hgnc(hgnc_text().as_bytes(), Path::new("hgnc_complete_set.txt")).unwrap();
    sources.parse_mgi_markers(mgi_text().as_bytes(), Path::new("MGI_EntrezGene.rpt")).unwrap();
    sources.parse_alliance_homology(alliance_text().as_bytes(),
                                    Path::new("HGNC_AllianceHomology.rpt")).unwrap();
    sources
}

#[allow(dead_code)]
pub fn standard_registry() -> CentralGeneRegistry {
    CentralGeneRegistry::build(&standard_sources())
}

// a base directory with the standard sources, an empty datasets directory
// and a config pointing at them
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

#[allow(dead_code)]
impl Fixture {
    pub fn new() -> Fixture {
        let dir = TempDir::new().unwrap();
        let base_dir = dir.path().to_path_buf();

        fs::create_dir_all(base_dir.join("homology")).unwrap();
        fs::create_dir_all(base_dir.join("datasets")).unwrap();

        fs::write(base_dir.join("homology/hgnc_complete_set.txt"), hgnc_text()).unwrap();
        fs::write(base_dir.join("homology/MGI_EntrezGene.rpt"), mgi_text()).unwrap();
        fs::write(base_dir.join("homology/HGNC_AllianceHomology.rpt"), alliance_text()).unwrap();

        let config = Config {
            base_dir,
            datasets_dir: PathBuf::from("datasets"),
            output_db: PathBuf::from("out/sspsygene.db"),
            gene_map_files: GeneMapFiles {
                hgnc: PathBuf::from("homology/hgnc_complete_set.txt"),
                mgi: PathBuf::from("homology/MGI_EntrezGene.rpt"),
                alliance_homology: PathBuf::from("homology/HGNC_AllianceHomology.rpt"),
            },
            max_skipped_row_fraction: 0.05,
            unresolved_sample_size: 10,
        };

        Fixture {
            dir,
            config,
        }
    }

    pub fn dataset_dir(&self, dataset_name: &str) -> PathBuf {
        self.config.datasets_path().join(dataset_name)
    }

    // write config.json and the data files of a dataset
    pub fn add_dataset(&self, dataset_name: &str, config_json: &str, files: &[(&str, &str)]) {
        let dataset_dir = self.dataset_dir(dataset_name);
        fs::create_dir_all(&dataset_dir).unwrap();
        fs::write(dataset_dir.join("config.json"), config_json).unwrap();
        for (file_name, contents) in files {
            fs::write(dataset_dir.join(file_name), contents).unwrap();
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.output_db_path()
    }

    pub fn open_output(&self) -> Connection {
        Connection::open(self.output_path()).unwrap()
    }
}

// a dataset config.json with the given "tables" entries
#[allow(dead_code)]
pub fn dataset_config_json(tables_json: &str) -> String {
    format!(r#"{{
  "publication": {{
    "authors": ["Ada Author", "Bo Builder"],
    "year": 2024,
    "journal": "Test Journal",
    "doi": "10.1000/test",
    "pmid": 12345678
  }},
  "maintainers": [
    {{"name": "Cy Curator", "email": "cy@example.org", "date": "2024-05-01"}}
  ],
  "tables": [{}]
}}"#, tables_json)
}

// one "tables" entry, gene_mappings_json is the contents of the list
#[allow(dead_code)]
pub fn table_json(table: &str, in_path: &str, gene_mappings_json: &str, extra_json: &str) -> String {
    format!(r#"{{
    "table": "{}",
    "shortLabel": "{} short",
    "longLabel": "{} long label",
    "description": "test table {}",
    "links": ["https://example.org/{}"],
    "categories": ["test"],
    "organism": "mouse",
    "in_path": "{}",
    "separator": "\t",
    "gene_mappings": [{}]{}
  }}"#, table, table, table, table, table, in_path, gene_mappings_json, extra_json)
}

#[allow(dead_code)]
pub fn query_strings(conn: &Connection, sql: &str) -> Vec<String> {
    let mut stmt = conn.prepare(sql).unwrap();
    stmt.query_map([], |row| row.get::<_, String>(0)).unwrap()
        .map(|r| r.unwrap())
        .collect()
}

#[allow(dead_code)]
pub fn query_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM \"{}\"", table), [], |row| row.get(0)).unwrap()
}
