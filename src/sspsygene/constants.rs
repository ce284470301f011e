pub const CONFIG_JSON_ENV_VAR: &str = "SSPSYGENE_CONFIG_JSON";

pub const DATASET_CONFIG_FILE_NAME: &str = "config.json";

pub const DATA_TABLES_TABLE_NAME: &str = "data_tables";
pub const CENTRAL_GENE_TABLE_NAME: &str = "central_gene";

// tables created by the pipeline itself, datasets can't use these names
pub const RESERVED_TABLE_NAMES: &[&str; 2] =
    &[DATA_TABLES_TABLE_NAME, CENTRAL_GENE_TABLE_NAME];

// the row identifier of every dataset table and the join key of its link tables
pub const ROW_ID_COLUMN: &str = "id";
pub const CENTRAL_GENE_ID_COLUMN: &str = "central_gene_id";

// <table>__<link_table_name>
pub const LINK_TABLE_SEPARATOR: &str = "__";

pub const DEFAULT_MAX_SKIPPED_ROW_FRACTION: f64 = 0.05;
pub const DEFAULT_UNRESOLVED_SAMPLE_SIZE: usize = 10;

// MGI_EntrezGene.rpt has no header line
pub const MGI_MARKER_COLUMNS: [&str; 15] =
    ["MGI Marker Accession ID", "Marker Symbol", "Status", "Marker Name",
     "cM Position", "Chromosome", "Type", "Secondary Accession IDs",
     "Entrez Gene ID", "Synonyms", "Feature Types", "Genome Coordinate Start",
     "Genome Coordinate End", "Strand", "BioTypes"];

pub const MGI_MARKER_TYPES: [&str; 9] =
    ["Complex/Cluster/Region", "BAC/YAC end", "Cytogenetic Marker", "QTL",
     "Transgene", "Pseudogene", "DNA Segment", "Gene", "Other Genome Feature"];

// only these marker types become central genes
pub const MGI_GENE_MARKER_TYPES: [&str; 2] = ["Gene", "Pseudogene"];
