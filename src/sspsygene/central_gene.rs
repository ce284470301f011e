use std::collections::{BTreeMap, BTreeSet, HashMap};

use flexstr::SharedStr as FlexStr;
use indexmap::IndexSet;
use tracing::{debug, info};

use crate::homology::{HomologySources, TokenKind};
use crate::types::{CentralGeneId, GeneSymbol, GeneToken, GeneType, IdType, Species};
use crate::union_find::UnionFind;

// The cross-species identity that every gene column is mapped to.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralGene {
    pub id: CentralGeneId,
    pub human_symbol: Option<GeneSymbol>,
    pub mouse_symbols: IndexSet<GeneSymbol>,
    pub human_synonyms: BTreeSet<GeneToken>,
    pub mouse_synonyms: BTreeSet<GeneToken>,
    pub hgnc_ids: BTreeSet<FlexStr>,
    pub mgi_ids: BTreeSet<FlexStr>,
    pub human_entrez_ids: BTreeSet<FlexStr>,
    pub mouse_entrez_ids: BTreeSet<FlexStr>,
    pub human_ensembl_ids: BTreeSet<FlexStr>,
    pub mouse_ensembl_ids: BTreeSet<FlexStr>,
}

impl CentralGene {
    fn new(id: CentralGeneId) -> CentralGene {
        CentralGene {
            id,
            human_symbol: None,
            mouse_symbols: IndexSet::new(),
            human_synonyms: BTreeSet::new(),
            mouse_synonyms: BTreeSet::new(),
            hgnc_ids: BTreeSet::new(),
            mgi_ids: BTreeSet::new(),
            human_entrez_ids: BTreeSet::new(),
            mouse_entrez_ids: BTreeSet::new(),
            human_ensembl_ids: BTreeSet::new(),
            mouse_ensembl_ids: BTreeSet::new(),
        }
    }

    fn identifiers_mut(&mut self, species: Species, id_type: IdType) -> &mut BTreeSet<FlexStr> {
        match (species, id_type) {
            (_, IdType::Hgnc) => &mut self.hgnc_ids,
            (_, IdType::Mgi) => &mut self.mgi_ids,
            (Species::Human, IdType::Entrez) => &mut self.human_entrez_ids,
            (Species::Mouse, IdType::Entrez) => &mut self.mouse_entrez_ids,
            (Species::Human, IdType::Ensembl) => &mut self.human_ensembl_ids,
            (Species::Mouse, IdType::Ensembl) => &mut self.mouse_ensembl_ids,
        }
    }

    // a name to use in log messages
    pub fn display_name(&self) -> String {
        if let Some(ref human_symbol) = self.human_symbol {
            human_symbol.to_string()
        } else if let Some(mouse_symbol) = self.mouse_symbols.first() {
            mouse_symbol.to_string()
        } else {
            format!("central_gene:{}", self.id)
        }
    }
}

// the result of looking up a token, callers must handle all three cases
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(CentralGeneId),
    // the token names more than one central gene with the same precedence
    Ambiguous(Vec<CentralGeneId>),
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IndexEntry {
    Unique(CentralGeneId),
    Ambiguous(Vec<CentralGeneId>),
}

impl IndexEntry {
    fn resolution(&self) -> Resolution {
        match self {
            IndexEntry::Unique(id) => Resolution::Resolved(*id),
            IndexEntry::Ambiguous(ids) => Resolution::Ambiguous(ids.clone()),
        }
    }
}

type Candidates = HashMap<String, BTreeSet<CentralGeneId>>;

fn add_candidate(candidates: &mut Candidates, key: String, id: CentralGeneId) {
    candidates.entry(key).or_default().insert(id);
}

fn fold(token: &str) -> String {
    token.trim().to_uppercase()
}

#[derive(Debug, Default)]
struct SpeciesIndex {
    exact_symbols: HashMap<String, IndexEntry>,
    symbols: HashMap<String, IndexEntry>,
    synonyms: HashMap<String, IndexEntry>,
    identifiers: HashMap<IdType, HashMap<String, IndexEntry>>,
}

#[derive(Debug, Default)]
struct SpeciesCandidates {
    exact_symbols: Candidates,
    symbols: Candidates,
    synonyms: Candidates,
    identifiers: HashMap<IdType, Candidates>,
}

// turn the candidate sets into index entries, returning the ambiguous keys
fn make_entries(candidates: Candidates) -> (HashMap<String, IndexEntry>, Vec<String>) {
    let mut entries = HashMap::new();
    let mut ambiguous = vec![];

    for (key, ids) in candidates {
        let first_id = ids.first().copied();
        let entry =
            match (ids.len(), first_id) {
                (1, Some(id)) => IndexEntry::Unique(id),
                _ => {
                    ambiguous.push(key.clone());
                    IndexEntry::Ambiguous(ids.into_iter().collect())
                }
            };
        entries.insert(key, entry);
    }

    (entries, ambiguous)
}

impl SpeciesCandidates {
    fn into_index(self, species: Species) -> (SpeciesIndex, usize) {
        let (exact_symbols, _) = make_entries(self.exact_symbols);
        let (symbols, ambiguous_symbols) = make_entries(self.symbols);
        let (synonyms, mut ambiguous_synonyms) = make_entries(self.synonyms);

        // a synonym that is also an official symbol resolves through the
        // symbol, so its ambiguity as a synonym doesn't matter
        ambiguous_synonyms.retain(|synonym| !symbols.contains_key(synonym));

        let mut identifiers = HashMap::new();
        let mut ambiguous_identifier_count = 0;
        for (id_type, id_candidates) in self.identifiers {
            let (entries, ambiguous) = make_entries(id_candidates);
            ambiguous_identifier_count += ambiguous.len();
            identifiers.insert(id_type, entries);
        }

        let ambiguous_count =
            ambiguous_symbols.len() + ambiguous_synonyms.len() + ambiguous_identifier_count;

        if ambiguous_count > 0 {
            info!("{}: {} ambiguous symbols, {} ambiguous synonyms and {} ambiguous identifiers \
                   won't be resolved",
                  species, ambiguous_symbols.len(), ambiguous_synonyms.len(),
                  ambiguous_identifier_count);
            let mut sorted_synonyms = ambiguous_synonyms.clone();
            sorted_synonyms.sort();
            debug!("{}: ambiguous symbols: {:?}", species, ambiguous_symbols);
            debug!("{}: ambiguous synonyms: {:?}", species, sorted_synonyms);
        }

        let index = SpeciesIndex {
            exact_symbols,
            symbols,
            synonyms,
            identifiers,
        };

        (index, ambiguous_count)
    }
}

// Built once from the homology sources, then only read.
#[derive(Debug)]
pub struct CentralGeneRegistry {
    genes: Vec<CentralGene>,
    indexes: HashMap<Species, SpeciesIndex>,
    ambiguous_token_count: usize,
}

impl CentralGeneRegistry {
    pub fn build(sources: &HomologySources) -> CentralGeneRegistry {
        let mut union_find = UnionFind::new();
        let mut key_indexes: HashMap<FlexStr, usize> = HashMap::new();
        let mut has_tokens: Vec<bool> = vec![];

        let mut intern = |union_find: &mut UnionFind, has_tokens: &mut Vec<bool>, key: &FlexStr| {
            *key_indexes.entry(key.clone())
                .or_insert_with(|| {
                    has_tokens.push(false);
                    union_find.make_set()
                })
        };

        let association_key_indexes =
            sources.associations.iter()
            .map(|association| {
                let idx = intern(&mut union_find, &mut has_tokens, &association.group_key);
                has_tokens[idx] = true;
                idx
            })
            .collect::<Vec<_>>();

        for (key_a, key_b) in &sources.links {
            let idx_a = intern(&mut union_find, &mut has_tokens, key_a);
            let idx_b = intern(&mut union_find, &mut has_tokens, key_b);
            union_find.union(idx_a, idx_b);
        }

        // group keys without any tokens (eg. homology entries for markers
        // that aren't genes) don't become central genes
        let mut gene_id_of_key: Vec<Option<CentralGeneId>> = vec![None; union_find.len()];
        let mut genes: Vec<CentralGene> = vec![];

        for members in union_find.sets() {
            if !members.iter().any(|idx| has_tokens[*idx]) {
                continue;
            }
            let id = genes.len() as CentralGeneId;
            for idx in members {
                gene_id_of_key[idx] = Some(id);
            }
            genes.push(CentralGene::new(id));
        }

        let mut human_symbols: Vec<IndexSet<GeneSymbol>> = vec![IndexSet::new(); genes.len()];
        let mut candidates: BTreeMap<Species, SpeciesCandidates> = BTreeMap::new();

        for (association, key_idx) in sources.associations.iter().zip(association_key_indexes) {
            let Some(id) = gene_id_of_key[key_idx]
            else {
                continue;
            };
            let gene = &mut genes[id as usize];
            let species_candidates = candidates.entry(association.species).or_default();
            let token = &association.token;

            match association.kind {
                TokenKind::Symbol => {
                    match association.species {
                        Species::Human => {
                            human_symbols[id as usize].insert(token.clone());
                        },
                        Species::Mouse => {
                            gene.mouse_symbols.insert(token.clone());
                        },
                    }
                    add_candidate(&mut species_candidates.exact_symbols, token.to_string(), id);
                    add_candidate(&mut species_candidates.symbols, fold(token), id);
                },
                TokenKind::Synonym => {
                    match association.species {
                        Species::Human => gene.human_synonyms.insert(token.clone()),
                        Species::Mouse => gene.mouse_synonyms.insert(token.clone()),
                    };
                    add_candidate(&mut species_candidates.synonyms, fold(token), id);
                },
                TokenKind::Identifier(id_type) => {
                    let normalised = id_type.normalise(token);
                    gene.identifiers_mut(association.species, id_type).insert(normalised.clone().into());
                    let id_candidates = species_candidates.identifiers.entry(id_type).or_default();
                    add_candidate(id_candidates, normalised, id);
                },
            }
        }

        for (gene, gene_human_symbols) in genes.iter_mut().zip(human_symbols) {
            if gene_human_symbols.len() == 1 {
                gene.human_symbol = gene_human_symbols.into_iter().next();
            } else {
                if gene_human_symbols.len() > 1 {
                    debug!("central gene {} has {} human symbols, using them as synonyms: {:?}",
                           gene.id, gene_human_symbols.len(), gene_human_symbols);
                }
                gene.human_synonyms.extend(gene_human_symbols);
            }

            if let Some(ref human_symbol) = gene.human_symbol {
                gene.human_synonyms.remove(human_symbol);
            }
            for mouse_symbol in &gene.mouse_symbols {
                gene.mouse_synonyms.remove(mouse_symbol);
            }
        }

        let mut indexes = HashMap::new();
        let mut ambiguous_token_count = 0;

        for (species, species_candidates) in candidates {
            let (index, ambiguous_count) = species_candidates.into_index(species);
            ambiguous_token_count += ambiguous_count;
            indexes.insert(species, index);
        }

        info!("built {} central genes", genes.len());

        CentralGeneRegistry {
            genes,
            indexes,
            ambiguous_token_count,
        }
    }

    // Case-insensitive lookup of a gene symbol or synonym.  An official
    // symbol takes precedence over a synonym, and an exact-case official
    // symbol match is tried before the case-insensitive one.
    pub fn resolve(&self, species: Species, token: &str) -> Resolution {
        let token = token.trim();

        if token.is_empty() {
            return Resolution::Unresolved;
        }

        let Some(index) = self.indexes.get(&species)
        else {
            return Resolution::Unresolved;
        };

        if let Some(entry) = index.exact_symbols.get(token) {
            return entry.resolution();
        }

        let folded = fold(token);

        if let Some(entry) = index.symbols.get(&folded) {
            return entry.resolution();
        }

        if let Some(entry) = index.synonyms.get(&folded) {
            return entry.resolution();
        }

        Resolution::Unresolved
    }

    // lookup by a non-symbol identifier, eg. an Ensembl gene ID
    pub fn resolve_identifier(&self, species: Species, id_type: IdType, value: &str) -> Resolution {
        let normalised = id_type.normalise(value);

        if normalised.is_empty() {
            return Resolution::Unresolved;
        }

        self.indexes.get(&species)
            .and_then(|index| index.identifiers.get(&id_type))
            .and_then(|entries| entries.get(&normalised))
            .map(IndexEntry::resolution)
            .unwrap_or(Resolution::Unresolved)
    }

    pub fn resolve_gene(&self, species: Species, gene_type: GeneType, value: &str) -> Resolution {
        match gene_type.id_type() {
            Some(id_type) => self.resolve_identifier(species, id_type, value),
            None => self.resolve(species, value),
        }
    }

    pub fn gene(&self, id: CentralGeneId) -> Option<&CentralGene> {
        self.genes.get(id as usize)
    }

    pub fn genes(&self) -> &[CentralGene] {
        &self.genes
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    pub fn ambiguous_token_count(&self) -> usize {
        self.ambiguous_token_count
    }
}
