//! GO annotation pipeline: raw source -> simple format -> internal format.
//!
//! Each stage is persisted under the cache directory and reused when it is
//! already present. Stage files depend only on the graph (and source), never
//! on measure parameters.
//!
//! - *Simple format*: `protein \t GO:term [\t aspect]` per line.
//! - *Internal format*: line `i` lists the numeric GO ids of node `i`,
//!   separated by spaces, without repeats.

use super::cache::write_best_effort;
use crate::error::{AlignError, Result};
use crate::graph::Graph;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the annotations of a network come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationSource {
    /// A per-network gene association (GAF) file.
    GeneAssociation(PathBuf),
    /// The shared NCBI `gene2go` table.
    Gene2Go(PathBuf),
}

/// Resolves annotation sources per network and materializes cached stages.
#[derive(Debug, Clone)]
pub struct AnnotationStore {
    cache_dir: PathBuf,
    network_sources: HashMap<String, PathBuf>,
    gene2go: Option<PathBuf>,
}

impl AnnotationStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            network_sources: HashMap::new(),
            gene2go: None,
        }
    }

    /// Registers a gene association file for one network.
    pub fn with_network_source(mut self, graph: &str, path: impl Into<PathBuf>) -> Self {
        self.network_sources.insert(graph.to_string(), path.into());
        self
    }

    /// Registers the shared `gene2go` table used for every network without
    /// its own gene association file.
    pub fn with_gene2go(mut self, path: impl Into<PathBuf>) -> Self {
        self.gene2go = Some(path.into());
        self
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// The source used for `graph`, preferring a network-specific file.
    pub fn source_for(&self, graph: &str) -> Result<AnnotationSource> {
        if let Some(path) = self.network_sources.get(graph) {
            if path.is_file() {
                return Ok(AnnotationSource::GeneAssociation(path.clone()));
            }
        }
        match &self.gene2go {
            Some(path) if path.is_file() => Ok(AnnotationSource::Gene2Go(path.clone())),
            _ => Err(AlignError::MissingAnnotationData {
                graph: graph.to_string(),
            }),
        }
    }

    pub fn has_data(&self, graph: &str) -> bool {
        self.source_for(graph).is_ok()
    }

    fn simple_path(&self, graph: &str, source: &AnnotationSource) -> PathBuf {
        match source {
            AnnotationSource::GeneAssociation(_) => {
                self.cache_dir.join(format!("{graph}_go_simple.txt"))
            }
            AnnotationSource::Gene2Go(_) => self.cache_dir.join("gene2go_simple.txt"),
        }
    }

    pub fn internal_path(&self, graph: &str) -> PathBuf {
        self.cache_dir.join(format!("{graph}_go_internal.txt"))
    }

    /// Simple-format text for `graph`, derived from its source on a miss.
    pub fn simple_format(&self, graph: &str) -> Result<String> {
        let source = self.source_for(graph)?;
        let path = self.simple_path(graph, &source);
        if path.is_file() {
            return fs::read_to_string(&path).map_err(|e| AlignError::io(&path, e));
        }

        info!(path = %path.display(), "computing GO simple format");
        let simple = match &source {
            AnnotationSource::GeneAssociation(raw) => {
                let text = fs::read_to_string(raw).map_err(|e| AlignError::io(raw, e))?;
                gaf_to_simple(&text, raw)?
            }
            AnnotationSource::Gene2Go(raw) => {
                let text = fs::read_to_string(raw).map_err(|e| AlignError::io(raw, e))?;
                gene2go_to_simple(&text, raw)?
            }
        };
        write_best_effort(&path, simple.as_bytes());
        Ok(simple)
    }

    /// Per-node GO term ids for `graph`, in internal format order.
    pub fn internal_terms(&self, graph: &Graph) -> Result<Vec<Vec<u32>>> {
        let path = self.internal_path(graph.name());
        if path.is_file() {
            let text = fs::read_to_string(&path).map_err(|e| AlignError::io(&path, e))?;
            return parse_internal(&text, graph.num_nodes(), &path);
        }

        let simple = self.simple_format(graph.name())?;
        info!(path = %path.display(), "computing GO internal format");
        let terms = simple_to_internal(&simple, graph, &path)?;
        write_best_effort(&path, render_internal(&terms).as_bytes());
        Ok(terms)
    }

    /// Per-node terms after dropping the most common ones.
    ///
    /// With `occurrences_fraction >= 1` every term is kept; otherwise only
    /// [`least_frequent_terms`] survive.
    pub fn load_terms(&self, graph: &Graph, occurrences_fraction: f64) -> Result<Vec<Vec<u32>>> {
        let mut terms = self.internal_terms(graph)?;
        if occurrences_fraction < 1.0 {
            let kept: HashSet<u32> =
                least_frequent_terms(&term_counts(&terms), occurrences_fraction)
                    .into_iter()
                    .collect();
            debug!(
                graph = graph.name(),
                kept = kept.len(),
                "filtered GO terms by occurrence"
            );
            for list in &mut terms {
                list.retain(|t| kept.contains(t));
            }
        }
        Ok(terms)
    }
}

/// Parses a numeric id out of `GO:0001234`.
fn parse_go_term(token: &str, path: &Path, line: usize) -> Result<u32> {
    token
        .strip_prefix("GO:")
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or_else(|| AlignError::malformed(path, line, format!("bad GO term `{token}`")))
}

/// Extracts protein, GO term and aspect from a gene association file.
///
/// The qualifier column is optional, so the term is the first `GO:` token
/// after the protein and the aspect is the first later `F`, `P` or `C`.
fn gaf_to_simple(text: &str, path: &Path) -> Result<String> {
    let mut out = String::new();
    for (lineno, line) in text.lines().enumerate() {
        if line.is_empty() || line.starts_with('!') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let malformed = |reason: &str| AlignError::malformed(path, lineno + 1, reason);

        let protein = tokens.get(2).ok_or_else(|| malformed("missing protein column"))?;
        let term_at = tokens
            .iter()
            .skip(3)
            .position(|t| t.starts_with("GO"))
            .map(|p| p + 3)
            .ok_or_else(|| malformed("missing GO term"))?;
        let term = tokens[term_at];
        parse_go_term(term, path, lineno + 1)?;
        let aspect = tokens
            .iter()
            .skip(term_at + 1)
            .find(|t| matches!(**t, "F" | "P" | "C"))
            .ok_or_else(|| malformed("missing aspect"))?;

        out.push_str(&format!("{protein}\t{term}\t{aspect}\n"));
    }
    Ok(out)
}

/// Extracts gene id and GO term from `gene2go` (header line skipped).
fn gene2go_to_simple(text: &str, path: &Path) -> Result<String> {
    let mut out = String::new();
    for (lineno, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (Some(_tax), Some(gene), Some(term)) = (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(AlignError::malformed(path, lineno + 1, "truncated record"));
        };
        parse_go_term(term, path, lineno + 1)?;
        out.push_str(&format!("{gene}\t{term}\n"));
    }
    Ok(out)
}

/// Groups simple-format records by node index. Proteins not in the graph are
/// ignored and repeated terms collapse to one.
fn simple_to_internal(simple: &str, graph: &Graph, path: &Path) -> Result<Vec<Vec<u32>>> {
    let mut terms: Vec<Vec<u32>> = vec![Vec::new(); graph.num_nodes()];
    for (lineno, line) in simple.lines().enumerate() {
        let mut fields = line.split_whitespace();
        let (Some(protein), Some(term)) = (fields.next(), fields.next()) else {
            continue;
        };
        let id = parse_go_term(term, path, lineno + 1)?;
        if let Some(node) = graph.node_index(protein) {
            if !terms[node].contains(&id) {
                terms[node].push(id);
            }
        }
    }
    Ok(terms)
}

fn render_internal(terms: &[Vec<u32>]) -> String {
    let mut out = String::new();
    for list in terms {
        for t in list {
            out.push_str(&t.to_string());
            out.push(' ');
        }
        out.push('\n');
    }
    out
}

fn parse_internal(text: &str, n: usize, path: &Path) -> Result<Vec<Vec<u32>>> {
    let mut terms: Vec<Vec<u32>> = vec![Vec::new(); n];
    for (lineno, line) in text.lines().enumerate() {
        if lineno >= n {
            if line.trim().is_empty() {
                continue;
            }
            return Err(AlignError::malformed(
                path,
                lineno + 1,
                format!("more rows than the {n} nodes of the graph"),
            ));
        }
        for token in line.split_whitespace() {
            let id = token.parse::<u32>().map_err(|_| {
                AlignError::malformed(path, lineno + 1, format!("bad term id `{token}`"))
            })?;
            terms[lineno].push(id);
        }
    }
    Ok(terms)
}

/// Number of nodes annotated with each term.
pub fn term_counts(terms: &[Vec<u32>]) -> HashMap<u32, usize> {
    let mut counts = HashMap::new();
    for list in terms {
        for &t in list {
            *counts.entry(t).or_insert(0) += 1;
        }
    }
    counts
}

/// The least common terms whose occurrences add up to at most
/// `floor(fraction * total)`.
///
/// Terms are taken in ascending order of count (ties by id) and the prefix
/// stops before the first term that would push the kept mass over the cap.
pub fn least_frequent_terms(counts: &HashMap<u32, usize>, fraction: f64) -> Vec<u32> {
    let mut by_count: Vec<(u32, usize)> = counts.iter().map(|(&t, &c)| (t, c)).collect();
    by_count.sort_unstable_by_key(|&(t, c)| (c, t));

    let total: usize = by_count.iter().map(|&(_, c)| c).sum();
    let cap = (fraction * total as f64).floor() as usize;

    let mut kept = Vec::new();
    let mut mass = 0usize;
    for (term, count) in by_count {
        if mass + count > cap {
            break;
        }
        mass += count;
        kept.push(term);
    }
    kept
}
