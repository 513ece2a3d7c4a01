// ⚖️ Flow Audit - does what flows in match what flows out?
//
// For every interior node: inflow ≈ outflow within a relative tolerance.
// Divergence is meaningful (a deficit or surplus year), so this reports it and
// never rejects or rewrites the graph.

use crate::builder::HUB_NODE_ID;
use crate::entities::SankeyData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// BALANCE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    /// Inflow and outflow agree within tolerance
    Balanced,
    /// More flows in than out
    Surplus,
    /// More flows out than in
    Deficit,
}

impl BalanceStatus {
    /// Classify `inflow` vs `outflow` with a tolerance relative to the larger side
    pub fn classify(inflow: f64, outflow: f64, tolerance: f64) -> Self {
        let difference = inflow - outflow;
        let scale = inflow.abs().max(outflow.abs());

        if difference.abs() <= tolerance * scale {
            BalanceStatus::Balanced
        } else if difference > 0.0 {
            BalanceStatus::Surplus
        } else {
            BalanceStatus::Deficit
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceStatus::Balanced => "balanced",
            BalanceStatus::Surplus => "surplus",
            BalanceStatus::Deficit => "deficit",
        }
    }
}

// ============================================================================
// AUDIT REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeBalance {
    pub node_id: String,
    pub label: String,
    pub inflow: f64,
    pub outflow: f64,
    /// inflow − outflow
    pub difference: f64,
    pub status: BalanceStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowAudit {
    /// Sum of hub inflow (revenue sources and their "Other")
    pub revenue_total: f64,
    /// Sum of hub outflow
    pub spending_total: f64,
    /// revenue_total − spending_total
    pub net: f64,
    pub status: BalanceStatus,
    /// Interior nodes, in graph order
    pub nodes: Vec<NodeBalance>,
    pub tolerance: f64,
    pub audited_at: DateTime<Utc>,
}

impl FlowAudit {
    pub fn is_balanced(&self) -> bool {
        self.status == BalanceStatus::Balanced
    }

    /// Interior nodes whose flows diverge
    pub fn divergent_nodes(&self) -> impl Iterator<Item = &NodeBalance> {
        self.nodes
            .iter()
            .filter(|n| n.status != BalanceStatus::Balanced)
    }

    pub fn summary(&self) -> String {
        format!(
            "Flow audit: revenue {:.2}, spending {:.2}, net {:.2} ({}), {} of {} interior nodes diverge",
            self.revenue_total,
            self.spending_total,
            self.net,
            self.status.as_str(),
            self.divergent_nodes().count(),
            self.nodes.len()
        )
    }
}

/// Audit every node that both receives and sends flow
pub fn audit_flows(graph: &SankeyData, tolerance: f64) -> FlowAudit {
    let nodes: Vec<NodeBalance> = graph
        .nodes
        .iter()
        .filter_map(|node| {
            let has_in = graph.links_to(&node.id).next().is_some();
            let has_out = graph.links_from(&node.id).next().is_some();
            if !(has_in && has_out) {
                return None;
            }

            let inflow = graph.inflow(&node.id);
            let outflow = graph.outflow(&node.id);
            Some(NodeBalance {
                node_id: node.id.clone(),
                label: node.label.clone(),
                inflow,
                outflow,
                difference: inflow - outflow,
                status: BalanceStatus::classify(inflow, outflow, tolerance),
            })
        })
        .collect();

    let revenue_total = graph.inflow(HUB_NODE_ID);
    let spending_total = graph.outflow(HUB_NODE_ID);

    let audit = FlowAudit {
        revenue_total,
        spending_total,
        net: revenue_total - spending_total,
        status: BalanceStatus::classify(revenue_total, spending_total, tolerance),
        nodes,
        tolerance,
        audited_at: Utc::now(),
    };

    tracing::debug!("{}", audit.summary());
    audit
}
