// 🌳 Department Entity - the budget tree as an arena
//
// Departments and programs form a forest: each top-level department is a root,
// programs hang below it. Nodes live in one Vec and refer to each other by
// index, so traversal never fights ownership and cycles cannot be built.
//
// Two persisted shapes feed the arena:
// - nested JSON records (summary.json)
// - flat CSV rows with a parent_id column (departments.csv)

use crate::error::{BudgetError, Result, ValidationIssue};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// PERSISTED SHAPES
// ============================================================================

/// Nested record as published in summary.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentRecord {
    /// Stable id; derived from the name path when absent
    #[serde(default)]
    pub id: Option<String>,

    pub name: String,

    /// Signed currency units; parents without an amount sum their children
    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default)]
    pub children: Vec<DepartmentRecord>,
}

impl DepartmentRecord {
    pub fn leaf(name: &str, amount: f64) -> Self {
        DepartmentRecord {
            id: None,
            name: name.to_string(),
            amount: Some(amount),
            children: Vec::new(),
        }
    }

    pub fn parent(name: &str, amount: Option<f64>, children: Vec<DepartmentRecord>) -> Self {
        DepartmentRecord {
            id: None,
            name: name.to_string(),
            amount,
            children,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

/// Flat row as published in departments.csv
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentRow {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
}

impl DepartmentRow {
    /// Parse departments.csv (header: id,parent_id,name,amount)
    pub fn parse_csv(text: &str) -> Result<Vec<DepartmentRow>> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let mut rows = Vec::new();
        for result in rdr.deserialize() {
            let mut row: DepartmentRow = result?;
            // An empty parent column means a top-level department
            if row.parent_id.as_deref().map_or(false, str::is_empty) {
                row.parent_id = None;
            }
            rows.push(row);
        }

        Ok(rows)
    }
}

/// "Health & Long-Term Care" → "health-long-term-care"
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;

    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    slug
}

// ============================================================================
// ARENA
// ============================================================================

pub type DepartmentIndex = usize;

/// Joins a parent node id to its "Other" bucket; never valid inside a record id
pub const BUCKET_SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentNode {
    pub id: String,
    pub name: String,
    pub amount: f64,
    pub parent: Option<DepartmentIndex>,
    pub children: Vec<DepartmentIndex>,
}

impl DepartmentNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// What counts as a valid amount for this tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountPolicy {
    pub allow_negative: bool,
}

impl AmountPolicy {
    pub fn non_negative() -> Self {
        AmountPolicy {
            allow_negative: false,
        }
    }

    pub fn signed() -> Self {
        AmountPolicy {
            allow_negative: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DepartmentTree {
    nodes: Vec<DepartmentNode>,
    roots: Vec<DepartmentIndex>,
}

impl DepartmentTree {
    /// Build from nested records, validating as we go.
    ///
    /// `context` names the dataset in the error (e.g. "ontario/2023 spending").
    pub fn from_records(
        records: &[DepartmentRecord],
        policy: AmountPolicy,
        context: &str,
    ) -> Result<Self> {
        let mut builder = NestedBuilder {
            tree: DepartmentTree::default(),
            seen: HashSet::new(),
            issues: Vec::new(),
            policy,
        };

        for record in records {
            if let Some(index) = builder.push(record, None) {
                builder.tree.roots.push(index);
            }
        }

        finish(builder.tree, builder.issues, context)
    }

    /// Build from flat rows, rejecting duplicate ids, unknown parents and cycles.
    ///
    /// Siblings keep the row order of the file.
    pub fn from_rows(rows: &[DepartmentRow], policy: AmountPolicy, context: &str) -> Result<Self> {
        let mut issues = Vec::new();
        let mut index_of: HashMap<&str, DepartmentIndex> = HashMap::new();

        for (i, row) in rows.iter().enumerate() {
            if index_of.insert(row.id.as_str(), i).is_some() {
                issues.push(ValidationIssue::new(&row.id, "id", "duplicate id"));
            }
        }

        let mut parents: Vec<Option<DepartmentIndex>> = Vec::with_capacity(rows.len());
        for row in rows {
            let parent = match row.parent_id.as_deref() {
                None => None,
                Some(pid) => match index_of.get(pid) {
                    Some(&p) => Some(p),
                    None => {
                        issues.push(ValidationIssue::new(
                            &row.id,
                            "parent_id",
                            format!("unknown parent '{}'", pid),
                        ));
                        None
                    }
                },
            };
            parents.push(parent);
        }

        if !issues.is_empty() {
            return Err(validation(context, issues));
        }

        for (i, row) in rows.iter().enumerate() {
            if on_cycle(i, &parents) {
                issues.push(ValidationIssue::new(
                    &row.id,
                    "parent_id",
                    "parent chain forms a cycle",
                ));
            }
        }

        if !issues.is_empty() {
            return Err(validation(context, issues));
        }

        let mut tree = DepartmentTree {
            nodes: rows
                .iter()
                .zip(&parents)
                .map(|(row, parent)| DepartmentNode {
                    id: row.id.clone(),
                    name: row.name.clone(),
                    amount: 0.0,
                    parent: *parent,
                    children: Vec::new(),
                })
                .collect(),
            roots: Vec::new(),
        };

        for (i, parent) in parents.iter().enumerate() {
            match parent {
                Some(p) => tree.nodes[*p].children.push(i),
                None => tree.roots.push(i),
            }
        }

        // Resolve amounts bottom-up: children always precede their parent here
        for i in tree.post_order() {
            let row = &rows[i];
            let amount = match row.amount {
                Some(a) => a,
                None if !tree.nodes[i].children.is_empty() => tree.nodes[i]
                    .children
                    .iter()
                    .map(|&c| tree.nodes[c].amount)
                    .sum::<f64>(),
                None => {
                    issues.push(ValidationIssue::new(&row.id, "amount", "leaf without an amount"));
                    0.0
                }
            };
            check_node(&row.id, &row.name, amount, policy, &mut issues);
            tree.nodes[i].amount = amount;
        }

        finish(tree, issues, context)
    }

    pub fn nodes(&self) -> &[DepartmentNode] {
        &self.nodes
    }

    pub fn node(&self, index: DepartmentIndex) -> &DepartmentNode {
        &self.nodes[index]
    }

    pub fn roots(&self) -> &[DepartmentIndex] {
        &self.roots
    }

    pub fn children(&self, index: DepartmentIndex) -> &[DepartmentIndex] {
        &self.nodes[index].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Sum of top-level amounts (the implicit grand total)
    pub fn total(&self) -> f64 {
        self.roots.iter().map(|&r| self.nodes[r].amount).sum()
    }

    pub fn find(&self, id: &str) -> Option<DepartmentIndex> {
        self.nodes.iter().position(|n| n.id == id)
    }

    /// Every node, children before parents
    fn post_order(&self) -> Vec<DepartmentIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<(DepartmentIndex, bool)> =
            self.roots.iter().rev().map(|&r| (r, false)).collect();

        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
                continue;
            }
            stack.push((index, true));
            for &child in self.nodes[index].children.iter().rev() {
                stack.push((child, false));
            }
        }

        order
    }
}

// ============================================================================
// CONSTRUCTION HELPERS
// ============================================================================

struct NestedBuilder {
    tree: DepartmentTree,
    seen: HashSet<String>,
    issues: Vec<ValidationIssue>,
    policy: AmountPolicy,
}

impl NestedBuilder {
    fn push(
        &mut self,
        record: &DepartmentRecord,
        parent: Option<DepartmentIndex>,
    ) -> Option<DepartmentIndex> {
        let id = match &record.id {
            Some(id) => id.clone(),
            None => {
                let own = slugify(&record.name);
                match parent {
                    Some(p) => format!("{}/{}", self.tree.nodes[p].id, own),
                    None => own,
                }
            }
        };

        if !self.seen.insert(id.clone()) {
            self.issues.push(ValidationIssue::new(&id, "id", "duplicate id"));
            return None;
        }

        let index = self.tree.nodes.len();
        self.tree.nodes.push(DepartmentNode {
            id: id.clone(),
            name: record.name.clone(),
            amount: 0.0,
            parent,
            children: Vec::new(),
        });

        for child in &record.children {
            if let Some(c) = self.push(child, Some(index)) {
                self.tree.nodes[index].children.push(c);
            }
        }

        let amount = match record.amount {
            Some(a) => a,
            None if !record.children.is_empty() => self.tree.nodes[index]
                .children
                .iter()
                .map(|&c| self.tree.nodes[c].amount)
                .sum::<f64>(),
            None => {
                self.issues
                    .push(ValidationIssue::new(&id, "amount", "leaf without an amount"));
                0.0
            }
        };

        check_node(&id, &record.name, amount, self.policy, &mut self.issues);
        self.tree.nodes[index].amount = amount;

        Some(index)
    }
}

fn check_node(
    id: &str,
    name: &str,
    amount: f64,
    policy: AmountPolicy,
    issues: &mut Vec<ValidationIssue>,
) {
    if id.is_empty() {
        issues.push(ValidationIssue::new(id, "id", format!("empty id for '{}'", name)));
    } else if id.contains(BUCKET_SEPARATOR) {
        // Reserved for synthetic "Other" buckets
        issues.push(ValidationIssue::new(
            id,
            "id",
            format!("'{}' is reserved in ids", BUCKET_SEPARATOR),
        ));
    }

    if name.trim().is_empty() {
        issues.push(ValidationIssue::new(id, "name", "empty name"));
    }

    if !amount.is_finite() {
        issues.push(ValidationIssue::new(id, "amount", format!("non-finite amount {}", amount)));
    } else if amount < 0.0 && !policy.allow_negative {
        issues.push(ValidationIssue::new(id, "amount", format!("negative amount {}", amount)));
    }
}

/// Whether following parent links from `start` ever returns to it
fn on_cycle(start: DepartmentIndex, parents: &[Option<DepartmentIndex>]) -> bool {
    let mut current = parents[start];
    let mut steps = 0;

    while let Some(p) = current {
        if p == start {
            return true;
        }
        steps += 1;
        // Longer than the node count means we are looping through someone else's cycle
        if steps > parents.len() {
            return false;
        }
        current = parents[p];
    }

    false
}

fn finish(tree: DepartmentTree, issues: Vec<ValidationIssue>, context: &str) -> Result<DepartmentTree> {
    if issues.is_empty() {
        Ok(tree)
    } else {
        Err(validation(context, issues))
    }
}

fn validation(context: &str, issues: Vec<ValidationIssue>) -> BudgetError {
    BudgetError::Validation {
        context: context.to_string(),
        issues,
    }
}

// ============================================================================
// EXPANDED PROJECTION
// ============================================================================

/// One row of the drill-down table: a read-only projection of a tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedDepartment {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    /// Root = 0
    pub depth: usize,
    pub amount: f64,
    /// amount / parent amount (grand total at depth 0); 0 when the denominator is 0
    pub share_of_parent: f64,
    pub has_children: bool,
}
