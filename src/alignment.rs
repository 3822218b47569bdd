//! Injective node mappings from G1 into G2.
//!
//! # File format
//!
//! An alignment is persisted as G2 node names, one per line, in G1 index
//! order: line `i` holds the image of G1 node `i`.

use crate::error::{AlignError, Result};
use crate::graph::GraphPair;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A total injective map from G1 nodes to G2 nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    image: Vec<usize>,
    occupied: Vec<bool>,
}

impl Alignment {
    /// Wraps an explicit image vector, checking range and injectivity.
    pub fn from_vec(image: Vec<usize>, n2: usize) -> Result<Self> {
        let mut occupied = vec![false; n2];
        for (i, &target) in image.iter().enumerate() {
            if target >= n2 {
                return Err(AlignError::Configuration(format!(
                    "node {i} mapped to {target}, but G2 has {n2} nodes"
                )));
            }
            if occupied[target] {
                return Err(AlignError::Configuration(format!(
                    "G2 node {target} is the image of more than one G1 node"
                )));
            }
            occupied[target] = true;
        }
        Ok(Self { image, occupied })
    }

    /// Maps G1 node `i` to G2 node `i`.
    pub fn identity(n1: usize, n2: usize) -> Self {
        assert!(n1 <= n2, "identity alignment needs n1 <= n2");
        let mut occupied = vec![false; n2];
        occupied[..n1].iter_mut().for_each(|o| *o = true);
        Self {
            image: (0..n1).collect(),
            occupied,
        }
    }

    /// Uniformly random injective alignment.
    pub fn random<R: Rng>(n1: usize, n2: usize, rng: &mut R) -> Self {
        assert!(n1 <= n2, "random alignment needs n1 <= n2");
        let mut targets: Vec<usize> = (0..n2).collect();
        targets.shuffle(rng);
        targets.truncate(n1);
        let mut occupied = vec![false; n2];
        for &t in &targets {
            occupied[t] = true;
        }
        Self {
            image: targets,
            occupied,
        }
    }

    /// Reads an alignment file, resolving names against G2.
    pub fn read(path: &Path, pair: &GraphPair) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| AlignError::io(path, e))?;
        let g2 = pair.g2();
        let mut image = Vec::with_capacity(pair.n1());
        for (lineno, line) in text.lines().enumerate() {
            let name = line.trim();
            if name.is_empty() {
                continue;
            }
            let target = g2.node_index(name).ok_or_else(|| {
                AlignError::malformed(path, lineno + 1, format!("unknown G2 node `{name}`"))
            })?;
            image.push(target);
        }
        if image.len() != pair.n1() {
            return Err(AlignError::malformed(
                path,
                image.len(),
                format!("expected {} entries, found {}", pair.n1(), image.len()),
            ));
        }
        Self::from_vec(image, pair.n2()).map_err(|e| AlignError::malformed(path, 0, e.to_string()))
    }

    /// Writes the alignment in the one-name-per-line format.
    pub fn write(&self, path: &Path, pair: &GraphPair) -> Result<()> {
        let file = fs::File::create(path).map_err(|e| AlignError::io(path, e))?;
        let mut out = BufWriter::new(file);
        for &target in &self.image {
            writeln!(out, "{}", pair.g2().node_name(target)).map_err(|e| AlignError::io(path, e))?;
        }
        out.flush().map_err(|e| AlignError::io(path, e))
    }

    pub fn len(&self) -> usize {
        self.image.len()
    }

    pub fn is_empty(&self) -> bool {
        self.image.is_empty()
    }

    /// Size of the target graph.
    pub fn n2(&self) -> usize {
        self.occupied.len()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.image
    }

    pub fn is_occupied(&self, target: usize) -> bool {
        self.occupied[target]
    }

    /// G2 nodes that are not the image of any G1 node, ascending.
    pub fn unassigned(&self) -> Vec<usize> {
        self.occupied
            .iter()
            .enumerate()
            .filter(|(_, &o)| !o)
            .map(|(t, _)| t)
            .collect()
    }

    /// Exchanges the images of two G1 nodes.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.image.swap(a, b);
    }

    /// Moves `node` onto the unassigned G2 node `target`, returning the
    /// G2 node it leaves.
    pub fn reassign(&mut self, node: usize, target: usize) -> usize {
        debug_assert!(!self.occupied[target], "reassign onto occupied target {target}");
        let old = self.image[node];
        self.occupied[old] = false;
        self.occupied[target] = true;
        self.image[node] = target;
        old
    }

    /// Checks the injectivity invariant from scratch.
    pub fn is_injective(&self) -> bool {
        let mut seen = vec![false; self.occupied.len()];
        for &t in &self.image {
            if t >= seen.len() || seen[t] || !self.occupied[t] {
                return false;
            }
            seen[t] = true;
        }
        seen == self.occupied
    }
}

impl std::ops::Index<usize> for Alignment {
    type Output = usize;

    fn index(&self, node: usize) -> &usize {
        &self.image[node]
    }
}

/// Nodes the search engine must not move.
///
/// A locked G1 node keeps its image for the whole run. A locked G2 node keeps
/// its pre-image if it has one, and otherwise is never used as a
/// reassignment target.
#[derive(Debug, Clone, Default)]
pub struct LockSet {
    locked_g1: Vec<bool>,
    locked_g2: Vec<bool>,
    pinned: Vec<(usize, usize)>,
}

impl LockSet {
    /// An empty lock set for the given graph sizes.
    pub fn none(n1: usize, n2: usize) -> Self {
        Self {
            locked_g1: vec![false; n1],
            locked_g2: vec![false; n2],
            pinned: Vec::new(),
        }
    }

    /// Reads a lock file.
    ///
    /// Each non-empty, non-`#` line is either `g1name g2name`, which pins
    /// that pair, or a single name resolved against G1 first and G2 second.
    /// Any name found in neither graph is a configuration error.
    pub fn read(path: &Path, pair: &GraphPair) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| AlignError::io(path, e))?;
        Self::parse(&text, pair)
    }

    pub fn parse(text: &str, pair: &GraphPair) -> Result<Self> {
        let (g1, g2) = (pair.g1(), pair.g2());
        let mut locks = Self::none(pair.n1(), pair.n2());

        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                [name] => {
                    if let Some(i) = g1.node_index(name) {
                        locks.locked_g1[i] = true;
                    } else if let Some(j) = g2.node_index(name) {
                        locks.locked_g2[j] = true;
                    } else {
                        return Err(AlignError::Configuration(format!(
                            "lock file line {}: unknown node `{name}`",
                            lineno + 1
                        )));
                    }
                }
                [a, b] => {
                    let i = g1.node_index(a).ok_or_else(|| {
                        AlignError::Configuration(format!(
                            "lock file line {}: `{a}` is not a node of {}",
                            lineno + 1,
                            g1.name()
                        ))
                    })?;
                    let j = g2.node_index(b).ok_or_else(|| {
                        AlignError::Configuration(format!(
                            "lock file line {}: `{b}` is not a node of {}",
                            lineno + 1,
                            g2.name()
                        ))
                    })?;
                    if locks.pinned.iter().any(|&(pi, pj)| pi == i || pj == j) {
                        return Err(AlignError::Configuration(format!(
                            "lock file line {}: `{a} {b}` conflicts with an earlier pin",
                            lineno + 1
                        )));
                    }
                    locks.locked_g1[i] = true;
                    locks.locked_g2[j] = true;
                    locks.pinned.push((i, j));
                }
                _ => {
                    return Err(AlignError::Configuration(format!(
                        "lock file line {}: expected one or two names, got `{line}`",
                        lineno + 1
                    )));
                }
            }
        }
        Ok(locks)
    }

    /// Pins every G1 node to the G2 node carrying the same name.
    pub fn same_names(pair: &GraphPair) -> Self {
        let mut locks = Self::none(pair.n1(), pair.n2());
        for (i, name) in pair.g1().node_names().iter().enumerate() {
            if let Some(j) = pair.g2().node_index(name) {
                locks.locked_g1[i] = true;
                locks.locked_g2[j] = true;
                locks.pinned.push((i, j));
            }
        }
        locks
    }

    pub fn is_empty(&self) -> bool {
        !self.locked_g1.iter().any(|&l| l) && !self.locked_g2.iter().any(|&l| l)
    }

    pub fn is_g1_locked(&self, node: usize) -> bool {
        self.locked_g1[node]
    }

    pub fn is_g2_locked(&self, node: usize) -> bool {
        self.locked_g2[node]
    }

    /// Explicit `(g1, g2)` pairs that must hold.
    pub fn pinned(&self) -> &[(usize, usize)] {
        &self.pinned
    }

    /// Forces every pinned pair into `alignment`, then freezes pre-images of
    /// locked G2 nodes.
    pub fn enforce(&mut self, alignment: &mut Alignment) {
        for &(i, j) in &self.pinned {
            let current = alignment[i];
            if current == j {
                continue;
            }
            match alignment.as_slice().iter().position(|&t| t == j) {
                Some(holder) => alignment.swap(i, holder),
                None => {
                    alignment.reassign(i, j);
                }
            }
        }
        for i in 0..alignment.len() {
            if self.locked_g2[alignment[i]] {
                self.locked_g1[i] = true;
            }
        }
    }

    /// G1 nodes that may take part in moves.
    pub fn movable_g1(&self) -> Vec<usize> {
        (0..self.locked_g1.len())
            .filter(|&i| !self.locked_g1[i])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;
    use crate::random::create_rng;

    fn pair() -> GraphPair {
        let g1 = Graph::from_named_edges("a", &[("p1", "p2"), ("p2", "p3")]).unwrap();
        let g2 =
            Graph::from_named_edges("b", &[("q1", "q2"), ("q2", "q3"), ("q3", "q4")]).unwrap();
        GraphPair::new(g1, g2).unwrap()
    }

    #[test]
    fn test_random_is_injective() {
        let mut rng = create_rng(3);
        for _ in 0..20 {
            let a = Alignment::random(5, 9, &mut rng);
            assert!(a.is_injective());
            assert_eq!(a.unassigned().len(), 4);
        }
    }

    #[test]
    fn test_from_vec_rejects_collision() {
        assert!(Alignment::from_vec(vec![0, 0], 3).is_err());
        assert!(Alignment::from_vec(vec![0, 3], 3).is_err());
    }

    #[test]
    fn test_swap_and_reassign() {
        let mut a = Alignment::identity(2, 3);
        a.swap(0, 1);
        assert_eq!(a.as_slice(), &[1, 0]);
        let old = a.reassign(0, 2);
        assert_eq!(old, 1);
        assert_eq!(a.as_slice(), &[2, 0]);
        assert_eq!(a.unassigned(), vec![1]);
        assert!(a.is_injective());
    }

    #[test]
    fn test_write_read_file() {
        let p = pair();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.align");
        let a = Alignment::from_vec(vec![3, 0, 2], 4).unwrap();
        a.write(&path, &p).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "q4\nq1\nq3\n");
        assert_eq!(Alignment::read(&path, &p).unwrap(), a);
    }

    #[test]
    fn test_read_unknown_name() {
        let p = pair();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.align");
        std::fs::write(&path, "q1\nzz\nq2\n").unwrap();
        let err = Alignment::read(&path, &p).unwrap_err();
        assert!(matches!(err, AlignError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn test_lock_parse() {
        let p = pair();
        let locks = LockSet::parse("# pinned\np1\nq4\n\np3 q1\n", &p).unwrap();
        assert!(locks.is_g1_locked(0));
        assert!(!locks.is_g1_locked(1));
        assert!(locks.is_g1_locked(2));
        assert!(locks.is_g2_locked(3));
        assert_eq!(locks.pinned(), &[(2, 0)]);
        assert_eq!(locks.movable_g1(), vec![1]);
    }

    #[test]
    fn test_lock_unknown_name_is_configuration_error() {
        let err = LockSet::parse("nope\n", &pair()).unwrap_err();
        assert!(matches!(err, AlignError::Configuration(_)));
        let err = LockSet::parse("p1 nope\n", &pair()).unwrap_err();
        assert!(matches!(err, AlignError::Configuration(_)));
    }

    #[test]
    fn test_same_names_pins_shared_nodes() {
        let g1 = Graph::from_named_edges("a", &[("x", "y"), ("y", "p1")]).unwrap();
        let g2 = Graph::from_named_edges("b", &[("q1", "y"), ("y", "x"), ("x", "q4")]).unwrap();
        let p = GraphPair::new(g1, g2).unwrap();
        let mut locks = LockSet::same_names(&p);
        let (x1, y1) = (p.g1().node_index("x").unwrap(), p.g1().node_index("y").unwrap());
        let (x2, y2) = (p.g2().node_index("x").unwrap(), p.g2().node_index("y").unwrap());
        assert_eq!(locks.pinned().len(), 2);
        assert!(locks.pinned().contains(&(x1, x2)));
        assert!(locks.pinned().contains(&(y1, y2)));
        assert_eq!(locks.movable_g1(), vec![p.g1().node_index("p1").unwrap()]);

        let mut a = Alignment::identity(3, 4);
        locks.enforce(&mut a);
        assert_eq!(a[x1], x2);
        assert_eq!(a[y1], y2);
        assert!(a.is_injective());
    }

    #[test]
    fn test_same_names_without_overlap_is_empty() {
        assert!(LockSet::same_names(&pair()).is_empty());
    }

    #[test]
    fn test_enforce_pins() {
        let p = pair();
        let mut locks = LockSet::parse("p1 q3\nq2\n", &p).unwrap();
        let mut a = Alignment::from_vec(vec![0, 1, 2], 4).unwrap();
        locks.enforce(&mut a);
        assert_eq!(a[0], 2);
        assert!(a.is_injective());
        // q2 is the image of p2, so p2 becomes frozen.
        assert!(locks.is_g1_locked(1));
    }
}
