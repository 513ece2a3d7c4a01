// 🔀 Sankey value objects - what the chart layer consumes
//
// The renderer only needs nodes (with a column/stage) and weighted links.
// Conservation is not enforced here: a node may receive more than it sends.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Column of a node in the flow, left to right
pub type Stage = usize;

pub const STAGE_REVENUE: Stage = 0;
pub const STAGE_HUB: Stage = 1;
pub const STAGE_DEPARTMENT: Stage = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Aggregate of all revenue sources
    RevenueTotal,
    RevenueSource,
    /// The central "Government" node
    Hub,
    Department,
    Program,
    /// Synthetic bucket of folded children
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyNode {
    pub id: String,
    pub label: String,
    pub stage: Stage,
    pub value: f64,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SankeyLink {
    pub source: String,
    pub target: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SankeyData {
    pub nodes: Vec<SankeyNode>,
    pub links: Vec<SankeyLink>,
}

impl SankeyData {
    pub fn node(&self, id: &str) -> Option<&SankeyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    pub fn link(&self, source: &str, target: &str) -> Option<&SankeyLink> {
        self.links
            .iter()
            .find(|l| l.source == source && l.target == target)
    }

    /// Links leaving `id`, in insertion order
    pub fn links_from<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a SankeyLink> + 'a {
        self.links.iter().filter(move |l| l.source == id)
    }

    /// Links entering `id`, in insertion order
    pub fn links_to<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a SankeyLink> + 'a {
        self.links.iter().filter(move |l| l.target == id)
    }

    pub fn inflow(&self, id: &str) -> f64 {
        self.links_to(id).map(|l| l.value).sum()
    }

    pub fn outflow(&self, id: &str) -> f64 {
        self.links_from(id).map(|l| l.value).sum()
    }

    /// Links whose source or target is not a node of this graph
    pub fn dangling_links(&self) -> Vec<&SankeyLink> {
        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        self.links
            .iter()
            .filter(|l| !ids.contains(l.source.as_str()) || !ids.contains(l.target.as_str()))
            .collect()
    }

    /// Node ids that appear more than once
    pub fn duplicate_node_ids(&self) -> Vec<&str> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in &self.nodes {
            *counts.entry(node.id.as_str()).or_insert(0) += 1;
        }
        let mut dups: Vec<&str> = counts
            .into_iter()
            .filter(|(_, c)| *c > 1)
            .map(|(id, _)| id)
            .collect();
        dups.sort_unstable();
        dups
    }

    pub fn is_well_formed(&self) -> bool {
        self.dangling_links().is_empty()
            && self.duplicate_node_ids().is_empty()
            && self.links.iter().all(|l| l.value >= 0.0)
    }
}
