//! Immutable taxon hierarchy
//!
//! Primary parent edges form a forest; secondary edges are attached on top as
//! advisory alternate classifications. Construction validates the primary
//! edges and fails on any missing parent or cycle.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use tracing::{debug, warn};

use super::models::{BasicTaxon, TaxonNode};
use super::TaxonomyError;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// Taxon forest plus secondary edges, indexed by id
#[derive(Debug, Clone, Default)]
pub struct TaxonTree {
    nodes: BTreeMap<i32, TaxonNode>,
    /// Reverse secondary edges: parent id -> ids listing it as secondary parent
    secondary_children: BTreeMap<i32, Vec<i32>>,
}

impl TaxonTree {
    /// Build a tree from a complete set of taxa
    ///
    /// Duplicate ids keep the later record. A primary parent that does not
    /// exist or any primary cycle (including a self-parent) is an error.
    /// Secondary parents that are unknown or self-referencing are dropped.
    pub fn build(taxa: impl IntoIterator<Item = BasicTaxon>) -> Result<Self, TaxonomyError> {
        let mut nodes: BTreeMap<i32, TaxonNode> = BTreeMap::new();
        for taxon in taxa {
            let id = taxon.id;
            if nodes.insert(id, TaxonNode::from(taxon)).is_some() {
                warn!(taxon_id = id, "Duplicate taxon id, keeping the later record");
            }
        }

        let mut children: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        for node in nodes.values() {
            if let Some(parent_id) = node.parent_id {
                if !nodes.contains_key(&parent_id) {
                    return Err(TaxonomyError::MissingParent {
                        id: node.id,
                        parent_id,
                    });
                }
                children.entry(parent_id).or_default().push(node.id);
            }
        }

        check_primary_cycles(&nodes)?;

        for (parent_id, mut kids) in children {
            kids.sort_unstable();
            if let Some(parent) = nodes.get_mut(&parent_id) {
                parent.children = kids;
            }
        }

        let known: BTreeSet<i32> = nodes.keys().copied().collect();
        let mut secondary_children: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        for node in nodes.values_mut() {
            let id = node.id;
            node.secondary_parent_ids.retain(|parent_id| {
                let keep = *parent_id != id && known.contains(parent_id);
                if !keep {
                    warn!(
                        taxon_id = id,
                        secondary_parent_id = *parent_id,
                        "Dropping invalid secondary parent reference"
                    );
                }
                keep
            });
            node.secondary_parent_ids.sort_unstable();
            node.secondary_parent_ids.dedup();
            for parent_id in &node.secondary_parent_ids {
                secondary_children.entry(*parent_id).or_default().push(id);
            }
        }

        debug!(taxa = nodes.len(), "Built taxon tree");

        Ok(Self {
            nodes,
            secondary_children,
        })
    }

    pub fn get(&self, id: i32) -> Option<&TaxonNode> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: i32) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in id order
    pub fn iter(&self) -> impl Iterator<Item = &TaxonNode> {
        self.nodes.values()
    }

    /// Nodes without a primary parent, in id order
    pub fn roots(&self) -> impl Iterator<Item = &TaxonNode> {
        self.nodes.values().filter(|n| n.is_root())
    }

    /// Primary ancestor chain, root first, excluding the node itself
    ///
    /// Empty for roots and unknown ids.
    pub fn ancestors(&self, id: i32) -> Vec<&TaxonNode> {
        let mut chain = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|n| n.parent_id);
        while let Some(parent_id) = current {
            match self.nodes.get(&parent_id) {
                Some(parent) => {
                    chain.push(parent);
                    current = parent.parent_id;
                }
                None => break,
            }
        }
        chain.reverse();
        chain
    }

    /// Ancestors followed by the node itself
    pub fn lineage(&self, id: i32) -> Vec<&TaxonNode> {
        let mut chain = self.ancestors(id);
        if let Some(node) = self.nodes.get(&id) {
            chain.push(node);
        }
        chain
    }

    /// Number of primary edges between the node and its root
    pub fn depth(&self, id: i32) -> Option<usize> {
        self.nodes.get(&id).map(|_| self.ancestors(id).len())
    }

    /// Every ancestor reachable over primary and secondary edges
    pub fn all_ancestor_ids(&self, id: i32) -> BTreeSet<i32> {
        let mut found = BTreeSet::new();
        let mut queue: VecDeque<i32> = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for parent_id in node.parent_id.iter().chain(&node.secondary_parent_ids) {
                if *parent_id != id && found.insert(*parent_id) {
                    queue.push_back(*parent_id);
                }
            }
        }

        found
    }

    /// Primary subtree below the node in preorder, excluding the node itself
    pub fn descendants(&self, id: i32) -> Vec<&TaxonNode> {
        let mut out = Vec::new();
        let mut stack: Vec<i32> = match self.nodes.get(&id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };

        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get(&current) {
                out.push(node);
                stack.extend(node.children.iter().rev().copied());
            }
        }

        out
    }

    /// The node and everything classified below it, sorted by id
    ///
    /// With `include_secondary`, taxa that list any collected node as a
    /// secondary parent (and their subtrees) are included too.
    pub fn underlying_taxon_ids(&self, id: i32, include_secondary: bool) -> Vec<i32> {
        if !self.nodes.contains_key(&id) {
            return Vec::new();
        }

        let mut found = BTreeSet::from([id]);
        let mut queue = VecDeque::from([id]);

        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            let secondary = if include_secondary {
                self.secondary_children.get(&current).map(Vec::as_slice)
            } else {
                None
            };
            for child in node.children.iter().chain(secondary.unwrap_or_default()) {
                if found.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }

        found.into_iter().collect()
    }
}

/// Walk every primary chain once, failing on the first cycle found
fn check_primary_cycles(nodes: &BTreeMap<i32, TaxonNode>) -> Result<(), TaxonomyError> {
    let mut marks: HashMap<i32, Mark> = HashMap::with_capacity(nodes.len());

    for &start in nodes.keys() {
        if marks.contains_key(&start) {
            continue;
        }

        let mut path = Vec::new();
        let mut current = Some(start);
        while let Some(id) = current {
            match marks.get(&id) {
                Some(Mark::Visited) => break,
                Some(Mark::Visiting) => {
                    let from = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(id);
                    return Err(TaxonomyError::Cycle { path: cycle });
                }
                None => {
                    marks.insert(id, Mark::Visiting);
                    path.push(id);
                    current = nodes.get(&id).and_then(|n| n.parent_id);
                }
            }
        }

        for id in path {
            marks.insert(id, Mark::Visited);
        }
    }

    Ok(())
}
