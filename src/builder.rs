// 🔀 Sankey Graph Builder - department tree + revenue → bounded flow graph
//
// Layout (stages left to right):
//   0: "Revenue" aggregate and one node per revenue source
//   1: "Government" hub
//   2: one node per department
//   3+: optional sub-program levels
//
// Complexity bound: any parent keeps at most K children above a minimum share
// of its total; the rest fold into one synthetic "Other" node worth exactly the
// sum of what it replaced. Conservation is never forced: links carry the
// published amounts even when revenue and spending disagree.

use crate::config::FlowConfig;
use crate::entities::{
    DepartmentIndex, DepartmentTree, NodeKind, SankeyData, SankeyLink, SankeyNode, Stage,
    BUCKET_SEPARATOR, STAGE_DEPARTMENT, STAGE_HUB, STAGE_REVENUE,
};
use std::cmp::Ordering;

pub const REVENUE_NODE_ID: &str = "revenue";
pub const HUB_NODE_ID: &str = "government";
pub const OTHER_LABEL: &str = "Other";

/// Node id of a revenue source
pub fn revenue_node_id(record_id: &str) -> String {
    format!("revenue:{}", record_id)
}

/// Node id of a department or program
pub fn spending_node_id(record_id: &str) -> String {
    format!("spending:{}", record_id)
}

/// Node id of the bucket holding the folded children of `parent_node_id`.
/// Record ids containing the separator are rejected when the tree is built,
/// so buckets cannot collide with a real department.
pub fn other_node_id(parent_node_id: &str) -> String {
    format!("{}{}other", parent_node_id, BUCKET_SEPARATOR)
}

// ============================================================================
// BUCKETING
// ============================================================================

/// Children of one parent split into drawn and folded sets
#[derive(Debug, Clone, PartialEq)]
pub struct Bucketed {
    /// Drawn children, largest first
    pub visible: Vec<DepartmentIndex>,
    /// Children replaced by the "Other" node, largest first
    pub folded: Vec<DepartmentIndex>,
    /// Exact sum of folded amounts
    pub folded_total: f64,
}

/// Apply the top-K / minimum-share rule to `children`.
///
/// Children with amount ≤ 0 carry no flow and are dropped. A lone folded child
/// stays visible, so at most K+1 children are drawn.
pub fn bucket_children(
    tree: &DepartmentTree,
    children: &[DepartmentIndex],
    parent_total: f64,
    max_visible: usize,
    min_share: f64,
) -> Bucketed {
    let mut candidates: Vec<DepartmentIndex> = children
        .iter()
        .copied()
        .filter(|&c| tree.node(c).amount > 0.0)
        .collect();

    // Stable sort: equal amounts keep their published order
    candidates.sort_by(|&a, &b| {
        tree.node(b)
            .amount
            .partial_cmp(&tree.node(a).amount)
            .unwrap_or(Ordering::Equal)
    });

    let threshold = if parent_total > 0.0 {
        min_share * parent_total
    } else {
        0.0
    };

    let (mut visible, mut folded): (Vec<_>, Vec<_>) = (Vec::new(), Vec::new());
    for (rank, index) in candidates.into_iter().enumerate() {
        if rank < max_visible && tree.node(index).amount >= threshold {
            visible.push(index);
        } else {
            folded.push(index);
        }
    }

    if folded.len() == 1 {
        visible.append(&mut folded);
        visible.sort_by(|&a, &b| {
            tree.node(b)
                .amount
                .partial_cmp(&tree.node(a).amount)
                .unwrap_or(Ordering::Equal)
        });
    }

    let folded_total = folded.iter().map(|&i| tree.node(i).amount).sum::<f64>();

    Bucketed {
        visible,
        folded,
        folded_total,
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct SankeyBuilder {
    config: FlowConfig,
}

impl SankeyBuilder {
    pub fn new(config: FlowConfig) -> Self {
        SankeyBuilder { config }
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    /// Build the flow graph from revenue sources and spending departments.
    ///
    /// Top-level entries of `revenue` are revenue sources; top-level entries of
    /// `spending` are departments.
    pub fn build(&self, revenue: &DepartmentTree, spending: &DepartmentTree) -> SankeyData {
        let mut graph = SankeyData::default();

        let revenue_total = positive_total(revenue, revenue.roots());
        let spending_total = positive_total(spending, spending.roots());

        graph.nodes.push(SankeyNode {
            id: REVENUE_NODE_ID.to_string(),
            label: "Revenue".to_string(),
            stage: STAGE_REVENUE,
            value: revenue_total,
            kind: NodeKind::RevenueTotal,
        });

        // Revenue sources → hub
        let sources = self.bucket(revenue, revenue.roots(), revenue_total);
        for &index in &sources.visible {
            let node = revenue.node(index);
            let id = revenue_node_id(&node.id);
            push_node(&mut graph, &id, &node.name, STAGE_REVENUE, node.amount, NodeKind::RevenueSource);
            push_link(&mut graph, &id, HUB_NODE_ID, node.amount);
        }
        if !sources.folded.is_empty() {
            let id = other_node_id(REVENUE_NODE_ID);
            push_node(&mut graph, &id, OTHER_LABEL, STAGE_REVENUE, sources.folded_total, NodeKind::Other);
            push_link(&mut graph, &id, HUB_NODE_ID, sources.folded_total);
        }

        push_node(&mut graph, HUB_NODE_ID, "Government", STAGE_HUB, spending_total, NodeKind::Hub);

        // Hub → departments (→ programs)
        let departments = self.bucket(spending, spending.roots(), spending_total);
        for &index in &departments.visible {
            let node = spending.node(index);
            let id = spending_node_id(&node.id);
            push_node(&mut graph, &id, &node.name, STAGE_DEPARTMENT, node.amount, NodeKind::Department);
            push_link(&mut graph, HUB_NODE_ID, &id, node.amount);

            self.add_programs(&mut graph, spending, index, &id, 1);
        }
        if !departments.folded.is_empty() {
            let id = other_node_id(HUB_NODE_ID);
            push_node(&mut graph, &id, OTHER_LABEL, STAGE_DEPARTMENT, departments.folded_total, NodeKind::Other);
            push_link(&mut graph, HUB_NODE_ID, &id, departments.folded_total);
        }

        tracing::debug!(
            "Built sankey: {} nodes, {} links (revenue {:.2}, spending {:.2}, {} sources folded, {} departments folded)",
            graph.nodes.len(),
            graph.links.len(),
            revenue_total,
            spending_total,
            sources.folded.len(),
            departments.folded.len()
        );

        graph
    }

    fn add_programs(
        &self,
        graph: &mut SankeyData,
        tree: &DepartmentTree,
        parent: DepartmentIndex,
        parent_id: &str,
        level: usize,
    ) {
        if level > self.config.program_depth || tree.children(parent).is_empty() {
            return;
        }

        let stage: Stage = STAGE_DEPARTMENT + level;
        let parent_amount = tree.node(parent).amount;
        let programs = self.bucket(tree, tree.children(parent), parent_amount);

        for &index in &programs.visible {
            let node = tree.node(index);
            let id = spending_node_id(&node.id);
            push_node(graph, &id, &node.name, stage, node.amount, NodeKind::Program);
            push_link(graph, parent_id, &id, node.amount);

            self.add_programs(graph, tree, index, &id, level + 1);
        }

        if !programs.folded.is_empty() {
            let id = other_node_id(parent_id);
            push_node(graph, &id, OTHER_LABEL, stage, programs.folded_total, NodeKind::Other);
            push_link(graph, parent_id, &id, programs.folded_total);
        }
    }

    fn bucket(&self, tree: &DepartmentTree, children: &[DepartmentIndex], parent_total: f64) -> Bucketed {
        bucket_children(
            tree,
            children,
            parent_total,
            self.config.max_visible_children,
            self.config.min_share,
        )
    }
}

impl Default for SankeyBuilder {
    fn default() -> Self {
        SankeyBuilder::new(FlowConfig::default())
    }
}

fn positive_total(tree: &DepartmentTree, indices: &[DepartmentIndex]) -> f64 {
    indices
        .iter()
        .map(|&i| tree.node(i).amount)
        .filter(|a| *a > 0.0)
        .sum()
}

fn push_node(graph: &mut SankeyData, id: &str, label: &str, stage: Stage, value: f64, kind: NodeKind) {
    graph.nodes.push(SankeyNode {
        id: id.to_string(),
        label: label.to_string(),
        stage,
        value,
        kind,
    });
}

fn push_link(graph: &mut SankeyData, source: &str, target: &str, value: f64) {
    graph.links.push(SankeyLink {
        source: source.to_string(),
        target: target.to_string(),
        value,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AmountPolicy, DepartmentRecord};

    fn tree(records: Vec<DepartmentRecord>) -> DepartmentTree {
        DepartmentTree::from_records(&records, AmountPolicy::signed(), "test").unwrap()
    }

    fn flat(amounts: &[(&str, f64)]) -> DepartmentTree {
        tree(amounts.iter().map(|(n, a)| DepartmentRecord::leaf(n, *a)).collect())
    }

    #[test]
    fn test_ontario_scenario() {
        let revenue = flat(&[("Taxes", 1900.0), ("Fees", 100.0)]);
        let spending = flat(&[("Health", 1000.0), ("Education", 800.0), ("Other", 200.0)]);

        let graph = SankeyBuilder::default().build(&revenue, &spending);

        let mut labels: Vec<&str> = graph.nodes.iter().map(|n| n.label.as_str()).collect();
        labels.sort_unstable();
        assert_eq!(
            labels,
            vec!["Education", "Fees", "Government", "Health", "Other", "Revenue", "Taxes"]
        );

        let link = |s: &str, t: &str| graph.link(s, t).map(|l| l.value);
        assert_eq!(link("revenue:taxes", "government"), Some(1900.0));
        assert_eq!(link("revenue:fees", "government"), Some(100.0));
        assert_eq!(link("government", "spending:health"), Some(1000.0));
        assert_eq!(link("government", "spending:education"), Some(800.0));
        assert_eq!(link("government", "spending:other"), Some(200.0));
        assert_eq!(graph.links.len(), 5);

        assert_eq!(graph.node("revenue").unwrap().value, 2000.0);
        assert_eq!(graph.node("government").unwrap().value, 2000.0);
        assert!(graph.is_well_formed());
    }

    #[test]
    fn test_top_k_folding() {
        let spending = flat(&[
            ("A", 500.0),
            ("B", 400.0),
            ("C", 300.0),
            ("D", 200.0),
            ("E", 100.0),
            ("F", 50.0),
        ]);
        let builder = SankeyBuilder::new(FlowConfig::default().with_max_visible_children(3));

        let graph = builder.build(&DepartmentTree::default(), &spending);

        let children: Vec<&str> = graph.links_from(HUB_NODE_ID).map(|l| l.target.as_str()).collect();
        assert_eq!(
            children,
            vec!["spending:a", "spending:b", "spending:c", "government#other"]
        );
        assert!(children.len() <= 3 + 1);

        let other = graph.node("government#other").unwrap();
        assert_eq!(other.label, "Other");
        assert_eq!(other.kind, NodeKind::Other);
        assert_eq!(other.value, 350.0);
        assert_eq!(graph.link(HUB_NODE_ID, "government#other").unwrap().value, 350.0);
    }

    #[test]
    fn test_min_share_folding() {
        // C and D are each below 1% of 10_000
        let spending = flat(&[("A", 6000.0), ("B", 3890.0), ("C", 60.0), ("D", 50.0)]);
        let graph = SankeyBuilder::default().build(&DepartmentTree::default(), &spending);

        assert!(graph.has_node("spending:a"));
        assert!(graph.has_node("spending:b"));
        assert!(!graph.has_node("spending:c"));
        assert!(!graph.has_node("spending:d"));
        assert_eq!(graph.node("government#other").unwrap().value, 110.0);
    }

    #[test]
    fn test_single_folded_child_stays_visible() {
        let spending = flat(&[("A", 500.0), ("B", 400.0), ("C", 1.0)]);
        let builder = SankeyBuilder::new(FlowConfig::default().with_max_visible_children(2));

        let graph = builder.build(&DepartmentTree::default(), &spending);

        assert!(graph.has_node("spending:c"));
        assert!(!graph.has_node("government#other"));
        assert_eq!(graph.links_from(HUB_NODE_ID).count(), 3);
    }

    #[test]
    fn test_revenue_sources_are_bucketed() {
        let revenue = flat(&[("Income Tax", 700.0), ("Sales Tax", 250.0), ("Fines", 5.0), ("Permits", 4.0)]);
        let graph = SankeyBuilder::default().build(&revenue, &DepartmentTree::default());

        let other = graph.node("revenue#other").unwrap();
        assert_eq!(other.value, 9.0);
        assert_eq!(graph.link("revenue#other", HUB_NODE_ID).unwrap().value, 9.0);
        assert_eq!(graph.node("revenue").unwrap().value, 959.0);
    }

    #[test]
    fn test_deficit_is_not_corrected() {
        let revenue = flat(&[("Taxes", 900.0)]);
        let spending = flat(&[("Health", 1000.0)]);

        let graph = SankeyBuilder::default().build(&revenue, &spending);

        assert_eq!(graph.inflow(HUB_NODE_ID), 900.0);
        assert_eq!(graph.outflow(HUB_NODE_ID), 1000.0);
    }

    #[test]
    fn test_non_positive_amounts_not_drawn() {
        let revenue = flat(&[("Taxes", 1000.0), ("Net investment loss", -50.0)]);
        let spending = flat(&[("Health", 1000.0), ("Closed program", 0.0)]);

        let graph = SankeyBuilder::default().build(&revenue, &spending);

        assert!(!graph.has_node("revenue:net-investment-loss"));
        assert!(!graph.has_node("spending:closed-program"));
        assert!(graph.links.iter().all(|l| l.value >= 0.0));
        assert_eq!(graph.node("revenue").unwrap().value, 1000.0);
    }

    #[test]
    fn test_program_levels() {
        let spending = tree(vec![
            DepartmentRecord::parent(
                "Health",
                None,
                vec![
                    DepartmentRecord::leaf("Hospitals", 600.0),
                    DepartmentRecord::parent(
                        "Public Health",
                        None,
                        vec![DepartmentRecord::leaf("Vaccines", 400.0)],
                    ),
                ],
            ),
            DepartmentRecord::leaf("Education", 800.0),
        ]);

        let summary = SankeyBuilder::default().build(&DepartmentTree::default(), &spending);
        assert!(!summary.has_node("spending:health/hospitals"));

        let one_level = SankeyBuilder::new(FlowConfig::default().with_program_depth(1))
            .build(&DepartmentTree::default(), &spending);
        let hospitals = one_level.node("spending:health/hospitals").unwrap();
        assert_eq!(hospitals.stage, STAGE_DEPARTMENT + 1);
        assert_eq!(hospitals.kind, NodeKind::Program);
        assert_eq!(
            one_level.link("spending:health", "spending:health/hospitals").unwrap().value,
            600.0
        );
        assert!(!one_level.has_node("spending:health/public-health/vaccines"));

        let two_levels = SankeyBuilder::new(FlowConfig::default().with_program_depth(2))
            .build(&DepartmentTree::default(), &spending);
        assert_eq!(
            two_levels.node("spending:health/public-health/vaccines").unwrap().stage,
            STAGE_DEPARTMENT + 2
        );
        assert!(two_levels.is_well_formed());
    }

    #[test]
    fn test_program_folding_links_from_department() {
        let programs: Vec<DepartmentRecord> = (1..=10)
            .map(|i| DepartmentRecord::leaf(&format!("Program {}", i), 100.0 * i as f64))
            .collect();
        let spending = tree(vec![DepartmentRecord::parent("Transit", None, programs)]);

        let builder = SankeyBuilder::new(
            FlowConfig::default()
                .with_program_depth(1)
                .with_max_visible_children(4),
        );
        let graph = builder.build(&DepartmentTree::default(), &spending);

        let bucket = other_node_id("spending:transit");
        // Programs 1..=6 folded: 100+200+...+600
        assert_eq!(graph.node(&bucket).unwrap().value, 2100.0);
        assert_eq!(graph.links_from("spending:transit").count(), 5);
        assert!(graph.dangling_links().is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        let graph = SankeyBuilder::default().build(&DepartmentTree::default(), &DepartmentTree::default());
        assert_eq!(graph.nodes.len(), 2);
        assert!(graph.links.is_empty());
    }

    #[test]
    fn test_bucket_ties_keep_published_order() {
        let spending = flat(&[("B", 100.0), ("A", 100.0), ("C", 100.0)]);
        let bucketed = bucket_children(&spending, spending.roots(), 300.0, 8, 0.01);
        let names: Vec<&str> = bucketed
            .visible
            .iter()
            .map(|&i| spending.node(i).name.as_str())
            .collect();
        assert_eq!(names, vec!["B", "A", "C"]);
        assert!(bucketed.folded.is_empty());
        assert_eq!(bucketed.folded_total, 0.0);
    }
}
