use std::fmt;
use std::fmt::Display;
use std::str::FromStr;

use flexstr::SharedStr as FlexStr;

pub type CentralGeneId = u32;

pub type GeneSymbol = FlexStr;
pub type GeneToken = FlexStr;

// the key a source uses to cluster tokens, eg. "HGNC:5" or "MGI:87853"
pub type GroupKey = FlexStr;

pub type TableName = String;
pub type ColumnName = String;
pub type DatasetName = String;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Species {
    Human,
    Mouse,
}

impl Species {
    pub fn as_str(&self) -> &'static str {
        match self {
            Species::Human => "human",
            Species::Mouse => "mouse",
        }
    }
}

impl Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Species {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Species::Human),
            "mouse" => Ok(Species::Mouse),
            _ => Err(format!("unknown species: {}", s)),
        }
    }
}

// non-symbol identifier namespaces that a gene column can hold
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    Ensembl,
    Entrez,
    Hgnc,
    Mgi,
}

impl IdType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdType::Ensembl => "ensembl",
            IdType::Entrez => "entrez",
            IdType::Hgnc => "hgnc",
            IdType::Mgi => "mgi",
        }
    }

    // Ensembl IDs are often written with a version suffix: ENSMUSG00000023927.15
    pub fn normalise(&self, value: &str) -> String {
        let value = value.trim();
        match self {
            IdType::Ensembl => {
                let upper = value.to_uppercase();
                match upper.split_once('.') {
                    Some((id, version))
                        if !version.is_empty() && version.chars().all(|c| c.is_ascii_digit()) =>
                        id.to_owned(),
                    _ => upper,
                }
            },
            IdType::Hgnc | IdType::Mgi => value.to_uppercase(),
            IdType::Entrez => value.to_owned(),
        }
    }
}

impl Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// what a gene column contains, "symbol" unless the mapping rule says otherwise
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneType {
    #[default]
    Symbol,
    Ensembl,
    Entrez,
    Hgnc,
    Mgi,
}

impl GeneType {
    pub fn id_type(&self) -> Option<IdType> {
        match self {
            GeneType::Symbol => None,
            GeneType::Ensembl => Some(IdType::Ensembl),
            GeneType::Entrez => Some(IdType::Entrez),
            GeneType::Hgnc => Some(IdType::Hgnc),
            GeneType::Mgi => Some(IdType::Mgi),
        }
    }
}

#[test]
fn test_ensembl_version_removed() {
    assert_eq!(IdType::Ensembl.normalise("ENSMUSG00000023927.15"), "ENSMUSG00000023927");
    assert_eq!(IdType::Ensembl.normalise("ensg00000204446"), "ENSG00000204446");
    assert_eq!(IdType::Entrez.normalise(" 20230 "), "20230");
}
