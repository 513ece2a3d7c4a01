// 📋 Department Expansion - tree → drill-down rows
//
// Depth-first pre-order: a parent is immediately followed by its children,
// before its next sibling. Amounts stay in source units; scaling happens at
// the presentation boundary (see `scale`).

use crate::entities::{DepartmentIndex, DepartmentTree, ExpandedDepartment};

/// amount / denominator, defined as 0 when the denominator is 0
pub fn share(amount: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        amount / denominator
    }
}

/// Flatten the whole tree. Top-level shares are relative to the grand total.
pub fn expand_departments(tree: &DepartmentTree) -> Vec<ExpandedDepartment> {
    let mut rows = Vec::with_capacity(tree.len());
    let total = tree.total();

    for &root in tree.roots() {
        visit(tree, root, total, &mut rows);
    }

    rows
}

/// Flatten one department and its programs; the department itself is depth 0
/// with a share of 1 (it is its own total).
pub fn expand_subtree(tree: &DepartmentTree, id: &str) -> Option<Vec<ExpandedDepartment>> {
    let index = tree.find(id)?;
    let mut rows = Vec::new();
    let own = tree.node(index).amount;
    visit(tree, index, own, &mut rows);
    Some(rows)
}

fn visit(
    tree: &DepartmentTree,
    root: DepartmentIndex,
    root_denominator: f64,
    rows: &mut Vec<ExpandedDepartment>,
) {
    // Explicit stack keeps deep trees off the call stack
    let mut stack: Vec<(DepartmentIndex, usize, f64)> = vec![(root, 0, root_denominator)];

    while let Some((index, depth, denominator)) = stack.pop() {
        let node = tree.node(index);

        rows.push(ExpandedDepartment {
            id: node.id.clone(),
            name: node.name.clone(),
            parent_id: node.parent.map(|p| tree.node(p).id.clone()),
            depth,
            amount: node.amount,
            share_of_parent: share(node.amount, denominator),
            has_children: !node.children.is_empty(),
        });

        for &child in node.children.iter().rev() {
            stack.push((child, depth + 1, node.amount));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{AmountPolicy, DepartmentRecord};

    fn tree() -> DepartmentTree {
        let records = vec![
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
            DepartmentRecord::leaf("Other", 200.0),
        ];
        DepartmentTree::from_records(&records, AmountPolicy::non_negative(), "test").unwrap()
    }

    #[test]
    fn test_pre_order_with_depths() {
        let rows = expand_departments(&tree());

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "health",
                "health/hospitals",
                "health/public-health",
                "health/public-health/vaccines",
                "education",
                "other",
            ]
        );

        let depths: Vec<usize> = rows.iter().map(|r| r.depth).collect();
        assert_eq!(depths, vec![0, 1, 1, 2, 0, 0]);

        assert_eq!(rows[1].parent_id.as_deref(), Some("health"));
        assert!(rows[0].has_children);
        assert!(!rows[1].has_children);
    }

    #[test]
    fn test_shares() {
        let rows = expand_departments(&tree());

        // Health 1000 of 2000 total
        assert!((rows[0].share_of_parent - 0.5).abs() < 1e-12);
        // Hospitals 600 of Health 1000
        assert!((rows[1].share_of_parent - 0.6).abs() < 1e-12);
        // Vaccines is all of Public Health
        assert!((rows[3].share_of_parent - 1.0).abs() < 1e-12);
        // Education 800 of 2000
        assert!((rows[4].share_of_parent - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_zero_parent_gives_zero_share() {
        let records = vec![DepartmentRecord::parent(
            "Reserve",
            Some(0.0),
            vec![DepartmentRecord::leaf("Contingency", 0.0)],
        )];
        let tree = DepartmentTree::from_records(&records, AmountPolicy::non_negative(), "test").unwrap();

        let rows = expand_departments(&tree);
        assert_eq!(rows[0].share_of_parent, 0.0);
        assert_eq!(rows[1].share_of_parent, 0.0);
    }

    #[test]
    fn test_depth_never_jumps_more_than_one() {
        let rows = expand_departments(&tree());
        assert_eq!(rows[0].depth, 0);
        for pair in rows.windows(2) {
            assert!(pair[1].depth <= pair[0].depth + 1);
        }
    }

    #[test]
    fn test_children_sum_to_parent() {
        let tree = tree();
        for node in tree.nodes().iter().filter(|n| !n.is_leaf()) {
            let sum: f64 = node.children.iter().map(|&c| tree.node(c).amount).sum();
            assert!((sum - node.amount).abs() <= 1e-6 * node.amount.abs());
        }
    }

    #[test]
    fn test_expand_subtree() {
        let rows = expand_subtree(&tree(), "health/public-health").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].depth, 0);
        assert_eq!(rows[0].share_of_parent, 1.0);
        assert_eq!(rows[1].depth, 1);

        assert!(expand_subtree(&tree(), "missing").is_none());
    }

    #[test]
    fn test_empty_tree() {
        assert!(expand_departments(&DepartmentTree::default()).is_empty());
    }
}
