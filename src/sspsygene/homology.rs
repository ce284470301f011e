use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use flate2::read::GzDecoder;
use tracing::{debug, info, warn};

use crate::constants::{MGI_GENE_MARKER_TYPES, MGI_MARKER_COLUMNS, MGI_MARKER_TYPES};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{GeneToken, GroupKey, IdType, Species};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // official nomenclature (HGNC approved symbol, current MGI marker symbol)
    Symbol,
    Synonym,
    Identifier(IdType),
}

// one (species, token) -> group key association from a source file
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TokenAssociation {
    pub species: Species,
    pub token: GeneToken,
    pub kind: TokenKind,
    pub group_key: GroupKey,
}

// the raw associations from all homology and synonym sources, in file order
#[derive(Debug, Default)]
pub struct HomologySources {
    pub associations: Vec<TokenAssociation>,
    // pairs of group keys that are the same gene, eg. an MGI marker and
    // its HGNC ortholog
    pub links: Vec<(GroupKey, GroupKey)>,
    seen_associations: HashSet<TokenAssociation>,
    seen_links: HashSet<(GroupKey, GroupKey)>,
}

fn clean_field(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}

fn is_null(field: &str) -> bool {
    field.is_empty() || field == "null"
}

fn split_pipes(field: &str) -> impl Iterator<Item = &str> {
    field.split('|').map(clean_field).filter(|s| !is_null(s))
}

fn malformed(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::MalformedSourceFile {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

// open a file, decompressing if the name ends in .gz
pub fn open_reader(path: &Path) -> std::io::Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let is_gzipped = path.extension().map(|ext| ext == "gz").unwrap_or(false);

    if is_gzipped {
        Ok(Box::new(GzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

pub fn open_source(path: &Path) -> PipelineResult<Box<dyn Read>> {
    if !path.exists() {
        return Err(PipelineError::MissingSourceFile(path.to_path_buf()));
    }

    Ok(open_reader(path)?)
}

fn column_indexes(path: &Path, headers: &StringRecord, required: &[&'static str])
    -> PipelineResult<HashMap<&'static str, usize>>
{
    let mut indexes = HashMap::new();

    for column_name in required {
        let idx = headers.iter()
            .position(|header| clean_field(header) == *column_name)
            .ok_or_else(|| malformed(path, format!("required column \"{}\" is missing", column_name)))?;
        indexes.insert(*column_name, idx);
    }

    Ok(indexes)
}

fn field<'a>(path: &Path, record: &'a StringRecord, idx: usize, column_name: &str)
    -> PipelineResult<&'a str>
{
    match record.get(idx) {
        Some(value) => Ok(clean_field(value)),
        None => {
            let line = record.position().map(|pos| pos.line()).unwrap_or(0);
            Err(malformed(path, format!("line {}: no value for column \"{}\"", line, column_name)))
        }
    }
}

fn tsv_reader<R: Read>(reader: R, has_headers: bool, quoting: bool) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .delimiter(b'\t')
        .quoting(quoting)
        .flexible(true)
        .comment(if has_headers { None } else { Some(b'#') })
        .from_reader(reader)
}

impl HomologySources {
    pub fn new() -> HomologySources {
        HomologySources::default()
    }

    // read and combine the HGNC, MGI and Alliance homology files
    pub fn read(hgnc_path: &Path, mgi_path: &Path, alliance_homology_path: &Path)
        -> PipelineResult<HomologySources>
    {
        // fail before parsing anything if a file is missing
        for path in [hgnc_path, mgi_path, alliance_homology_path] {
            if !path.exists() {
                return Err(PipelineError::MissingSourceFile(path.to_path_buf()));
            }
        }

        let mut sources = HomologySources::new();

        info!("parsing {}", hgnc_path.display());
        sources.parse_hgnc(open_source(hgnc_path)?, hgnc_path)?;
        info!("parsing {}", mgi_path.display());
        sources.parse_mgi_markers(open_source(mgi_path)?, mgi_path)?;
        info!("parsing {}", alliance_homology_path.display());
        sources.parse_alliance_homology(open_source(alliance_homology_path)?,
                                        alliance_homology_path)?;

        info!("read {} gene token associations and {} homology links",
              sources.associations.len(), sources.links.len());

        Ok(sources)
    }

    pub fn add(&mut self, species: Species, token: &str, kind: TokenKind, group_key: &str) {
        if is_null(token) || is_null(group_key) {
            return;
        }

        let association = TokenAssociation {
            species,
            token: token.into(),
            kind,
            group_key: group_key.into(),
        };

        if self.seen_associations.insert(association.clone()) {
            self.associations.push(association);
        }
    }

    pub fn link(&mut self, group_key_a: &str, group_key_b: &str) {
        if is_null(group_key_a) || is_null(group_key_b) || group_key_a == group_key_b {
            return;
        }

        let link: (GroupKey, GroupKey) = (group_key_a.into(), group_key_b.into());

        if self.seen_links.insert(link.clone()) {
            self.links.push(link);
        }
    }

    // hgnc_complete_set.txt: one row per approved human gene
    pub fn parse_hgnc<R: Read>(&mut self, reader: R, path: &Path) -> PipelineResult<()> {
        const HGNC_ID: &str = "hgnc_id";
        const SYMBOL: &str = "symbol";
        const ALIAS_SYMBOL: &str = "alias_symbol";
        const PREV_SYMBOL: &str = "prev_symbol";
        const ENTREZ_ID: &str = "entrez_id";
        const ENSEMBL_GENE_ID: &str = "ensembl_gene_id";

        let mut csv_reader = tsv_reader(reader, true, true);

        let headers = csv_reader.headers()
            .map_err(|err| malformed(path, err.to_string()))?
            .clone();
        let idx = column_indexes(path, &headers,
                                 &[HGNC_ID, SYMBOL, ALIAS_SYMBOL, PREV_SYMBOL,
                                   ENTREZ_ID, ENSEMBL_GENE_ID])?;

        let mut gene_count = 0;

        for result in csv_reader.records() {
            let record = result.map_err(|err| malformed(path, err.to_string()))?;

            let hgnc_id = field(path, &record, idx[HGNC_ID], HGNC_ID)?;
            let symbol = field(path, &record, idx[SYMBOL], SYMBOL)?;

            if is_null(hgnc_id) || is_null(symbol) {
                debug!("{}: skipping row without hgnc_id or symbol: {:?}", path.display(), record);
                continue;
            }

            gene_count += 1;

            self.add(Species::Human, symbol, TokenKind::Symbol, hgnc_id);
            self.add(Species::Human, hgnc_id, TokenKind::Identifier(IdType::Hgnc), hgnc_id);

            for synonym_column in [PREV_SYMBOL, ALIAS_SYMBOL] {
                let synonyms = field(path, &record, idx[synonym_column], synonym_column)?;
                for synonym in split_pipes(synonyms) {
                    self.add(Species::Human, synonym, TokenKind::Synonym, hgnc_id);
                }
            }

            let entrez_ids = field(path, &record, idx[ENTREZ_ID], ENTREZ_ID)?;
            for entrez_id in split_pipes(entrez_ids) {
                self.add(Species::Human, entrez_id,
                         TokenKind::Identifier(IdType::Entrez), hgnc_id);
            }

            let ensembl_ids = field(path, &record, idx[ENSEMBL_GENE_ID], ENSEMBL_GENE_ID)?;
            for ensembl_id in split_pipes(ensembl_ids) {
                self.add(Species::Human, ensembl_id,
                         TokenKind::Identifier(IdType::Ensembl), hgnc_id);
            }
        }

        info!("{}: {} human genes", path.display(), gene_count);

        Ok(())
    }

    // MGI_EntrezGene.rpt: every MGI marker, current ("O") and withdrawn ("W")
    pub fn parse_mgi_markers<R: Read>(&mut self, reader: R, path: &Path) -> PipelineResult<()> {
        const ACCESSION_IDX: usize = 0;
        const SYMBOL_IDX: usize = 1;
        const STATUS_IDX: usize = 2;
        const NAME_IDX: usize = 3;
        const TYPE_IDX: usize = 6;
        const ENTREZ_IDX: usize = 8;
        const SYNONYMS_IDX: usize = 9;

        let mut csv_reader = tsv_reader(reader, false, false);

        // current symbol -> MGI accession
        let mut current_symbols: HashMap<String, String> = HashMap::new();
        let mut all_synonyms: HashSet<String> = HashSet::new();
        // replacement symbol -> withdrawn symbols
        let mut withdrawn_map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut unknown_types: BTreeSet<String> = BTreeSet::new();

        for result in csv_reader.records() {
            let record = result.map_err(|err| malformed(path, err.to_string()))?;

            let column = |idx: usize| field(path, &record, idx, MGI_MARKER_COLUMNS[idx]);

            let symbol = column(SYMBOL_IDX)?;
            let status = column(STATUS_IDX)?;

            match status {
                "O" => (),
                "W" => {
                    // eg. "withdrawn, = Satb1"
                    let marker_name = column(NAME_IDX)?;
                    if marker_name.contains(" = ") {
                        if let Some((_, new_symbol)) = marker_name.split_once('=') {
                            withdrawn_map.entry(new_symbol.trim().to_owned())
                                .or_default()
                                .insert(symbol.to_owned());
                        }
                    }
                    continue;
                },
                _ => {
                    return Err(malformed(path, format!("unknown marker status \"{}\" for {}",
                                                       status, symbol)));
                },
            }

            let marker_type = column(TYPE_IDX)?;
            if !MGI_MARKER_TYPES.contains(&marker_type) {
                unknown_types.insert(marker_type.to_owned());
                continue;
            }
            if !MGI_GENE_MARKER_TYPES.contains(&marker_type) {
                continue;
            }

            let accession = column(ACCESSION_IDX)?;

            self.add(Species::Mouse, symbol, TokenKind::Symbol, accession);
            self.add(Species::Mouse, accession, TokenKind::Identifier(IdType::Mgi), accession);

            let entrez_id = column(ENTREZ_IDX)?;
            self.add(Species::Mouse, entrez_id, TokenKind::Identifier(IdType::Entrez), accession);

            for synonym in split_pipes(column(SYNONYMS_IDX)?) {
                all_synonyms.insert(synonym.to_owned());
                self.add(Species::Mouse, synonym, TokenKind::Synonym, accession);
            }

            current_symbols.insert(symbol.to_owned(), accession.to_owned());
        }

        if !unknown_types.is_empty() {
            warn!("{}: ignored markers with unknown types: {}", path.display(),
                  itertools::join(&unknown_types, ", "));
        }

        let mut withdrawn_count = 0;

        for (new_symbol, old_symbols) in &withdrawn_map {
            let Some(accession) = current_symbols.get(new_symbol)
            else {
                continue;
            };
            for old_symbol in old_symbols {
                if current_symbols.contains_key(old_symbol) || all_synonyms.contains(old_symbol) {
                    continue;
                }
                withdrawn_count += 1;
                self.add(Species::Mouse, old_symbol, TokenKind::Synonym, accession);
            }
        }

        info!("{}: {} mouse genes, {} withdrawn symbols used as synonyms",
              path.display(), current_symbols.len(), withdrawn_count);

        Ok(())
    }

    // HGNC_AllianceHomology.rpt: mouse markers with their human orthologs
    pub fn parse_alliance_homology<R: Read>(&mut self, reader: R, path: &Path)
        -> PipelineResult<()>
    {
        const MGI_ACCESSION_ID: &str = "MGI Accession ID";
        const HGNC_ID: &str = "HGNC ID";
        const ENSEMBL_GENE_ID: &str = "Ensembl Gene ID";

        let mut csv_reader = tsv_reader(reader, true, false);

        let headers = csv_reader.headers()
            .map_err(|err| malformed(path, err.to_string()))?
            .clone();
        let idx = column_indexes(path, &headers,
                                 &[MGI_ACCESSION_ID, HGNC_ID, ENSEMBL_GENE_ID])?;

        let links_before = self.links.len();

        for result in csv_reader.records() {
            let record = result.map_err(|err| malformed(path, err.to_string()))?;

            let mgi_id = field(path, &record, idx[MGI_ACCESSION_ID], MGI_ACCESSION_ID)?;
            if is_null(mgi_id) {
                continue;
            }

            let hgnc_ids = field(path, &record, idx[HGNC_ID], HGNC_ID)?;
            for hgnc_id in split_pipes(hgnc_ids) {
                self.link(mgi_id, hgnc_id);
            }

            let ensembl_ids = field(path, &record, idx[ENSEMBL_GENE_ID], ENSEMBL_GENE_ID)?;
            for ensembl_id in split_pipes(ensembl_ids) {
                self.add(Species::Mouse, ensembl_id,
                         TokenKind::Identifier(IdType::Ensembl), mgi_id);
            }
        }

        info!("{}: {} mouse-human homology links", path.display(),
              self.links.len() - links_before);

        Ok(())
    }
}
