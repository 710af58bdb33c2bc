//! Tree module
//!
//! Projects a flat snapshot into a parent/child forest. Nodes live in a dense
//! arena indexed by position; children are stored as arena indices, so every
//! node has exactly one owner (the root list or its parent's child list).

use serde::Serialize;
use std::collections::HashMap;

use super::process::ProcessRecord;

/// A node in the process forest
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub record: ProcessRecord,
    pub children: Vec<usize>,
}

/// Process forest backed by an arena of nodes
#[derive(Debug, Clone, Default)]
pub struct Forest {
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
}

/// One row of the pre-order flattening
#[derive(Debug, Clone, PartialEq)]
pub struct FlatEntry {
    pub record: ProcessRecord,
    pub depth: usize,
    /// Bit `n` is set when the ancestor at depth `n + 1` has siblings after it
    pub indent: u64,
    /// Last child of its parent (or last root)
    pub is_last: bool,
}

/// Build the forest for `records`.
///
/// A record becomes a child of the record whose pid equals its ppid. Records
/// without a resolvable parent, and self-parented records, become roots.
/// Children and roots keep input order.
pub fn build_forest(records: &[ProcessRecord]) -> Forest {
    let by_pid: HashMap<i32, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.pid, i))
        .collect();

    let mut nodes: Vec<TreeNode> = records
        .iter()
        .map(|r| TreeNode {
            record: r.clone(),
            children: Vec::new(),
        })
        .collect();
    let mut roots = Vec::new();

    for (i, record) in records.iter().enumerate() {
        let parent = if record.pid == record.ppid {
            None
        } else {
            by_pid.get(&record.ppid).copied().filter(|&p| p != i)
        };
        match parent {
            Some(p) => nodes[p].children.push(i),
            None => roots.push(i),
        }
    }

    Forest { nodes, roots }
}

impl Forest {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, index: usize) -> &TreeNode {
        &self.nodes[index]
    }

    /// Pre-order depth-first flattening; every node is emitted exactly once.
    ///
    /// Nodes that are unreachable from a root (a parent cycle longer than one
    /// link) are emitted as extra roots in input order.
    pub fn flatten(&self) -> Vec<FlatEntry> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; self.nodes.len()];

        let count = self.roots.len();
        for (i, &root) in self.roots.iter().enumerate() {
            self.walk(root, i + 1 == count, &mut visited, &mut out);
        }
        for index in 0..self.nodes.len() {
            if !visited[index] {
                self.walk(index, true, &mut visited, &mut out);
            }
        }

        out
    }

    fn walk(
        &self,
        root: usize,
        root_is_last: bool,
        visited: &mut [bool],
        out: &mut Vec<FlatEntry>,
    ) {
        // (node, depth, indent, is_last)
        let mut stack = vec![(root, 0usize, 0u64, root_is_last)];

        while let Some((index, depth, indent, is_last)) = stack.pop() {
            if visited[index] {
                continue;
            }
            visited[index] = true;

            let node = &self.nodes[index];
            out.push(FlatEntry {
                record: node.record.clone(),
                depth,
                indent,
                is_last,
            });

            let child_indent = if depth == 0 || is_last {
                indent
            } else {
                indent | (1u64 << (depth - 1).min(63))
            };
            let count = node.children.len();
            for (i, &child) in node.children.iter().enumerate().rev() {
                stack.push((child, depth + 1, child_indent, i + 1 == count));
            }
        }
    }
}

#[derive(Serialize)]
struct TreeJson<'a> {
    #[serde(flatten)]
    process: &'a ProcessRecord,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeJson<'a>>,
}

impl Serialize for Forest {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        fn nest(forest: &Forest, index: usize) -> TreeJson<'_> {
            let node = forest.node(index);
            TreeJson {
                process: &node.record,
                children: node.children.iter().map(|&c| nest(forest, c)).collect(),
            }
        }
        let roots: Vec<TreeJson<'_>> = self.roots.iter().map(|&r| nest(self, r)).collect();
        roots.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rec(pid: i32, ppid: i32) -> ProcessRecord {
        ProcessRecord::new(pid, ppid, &format!("p{}", pid))
    }

    fn shape(entries: &[FlatEntry]) -> Vec<(i32, usize)> {
        entries.iter().map(|e| (e.record.pid, e.depth)).collect()
    }

    #[test]
    fn test_tree_building() {
        let records = vec![rec(1, 0), rec(10, 1), rec(20, 10), rec(21, 10)];
        let forest = build_forest(&records);

        assert_eq!(forest.roots().len(), 1);
        let root = forest.node(forest.roots()[0]);
        assert_eq!(root.record.pid, 1);
        assert_eq!(root.children.len(), 1);

        let mid = forest.node(root.children[0]);
        assert_eq!(mid.record.pid, 10);
        let grandchildren: Vec<i32> = mid
            .children
            .iter()
            .map(|&c| forest.node(c).record.pid)
            .collect();
        assert_eq!(grandchildren, vec![20, 21]);

        assert_eq!(
            shape(&forest.flatten()),
            vec![(1, 0), (10, 1), (20, 2), (21, 2)]
        );
    }

    #[test]
    fn test_self_parent_is_root() {
        let records = vec![rec(0, 0), rec(1, 0), rec(5, 5)];
        let forest = build_forest(&records);

        let roots: Vec<i32> = forest
            .roots()
            .iter()
            .map(|&r| forest.node(r).record.pid)
            .collect();
        assert_eq!(roots, vec![0, 5]);
        assert!(forest.node(2).children.is_empty());
        assert_eq!(shape(&forest.flatten()), vec![(0, 0), (1, 1), (5, 0)]);
    }

    #[test]
    fn test_children_keep_input_order() {
        let records = vec![rec(9, 1), rec(1, 0), rec(3, 1), rec(2, 1)];
        let forest = build_forest(&records);
        assert_eq!(
            shape(&forest.flatten()),
            vec![(1, 0), (9, 1), (3, 1), (2, 1)]
        );
    }

    #[test]
    fn test_tree_without_parent_in_snapshot() {
        // Parents outside the snapshot make orphans roots
        let records = vec![rec(400, 1), rec(401, 400), rec(500, 77)];
        let forest = build_forest(&records);
        assert_eq!(forest.roots().len(), 2);
        assert_eq!(
            shape(&forest.flatten()),
            vec![(400, 0), (401, 1), (500, 0)]
        );
    }

    #[test]
    fn test_flatten_keeps_every_record_once() {
        let records = vec![
            rec(1, 0),
            rec(2, 1),
            rec(3, 2),
            rec(4, 3),
            rec(5, 1),
            rec(6, 6),
            rec(7, 99),
            rec(8, 7),
            // two-link cycle, unreachable from any root
            rec(30, 31),
            rec(31, 30),
        ];
        let forest = build_forest(&records);
        let flat = forest.flatten();
        assert_eq!(flat.len(), records.len());

        let mut seen: Vec<i32> = flat.iter().map(|e| e.record.pid).collect();
        seen.sort();
        let mut expected: Vec<i32> = records.iter().map(|r| r.pid).collect();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_empty_forest() {
        let forest = build_forest(&[]);
        assert!(forest.is_empty());
        assert!(forest.flatten().is_empty());
    }

    #[test]
    fn test_indent_and_last_flags() {
        // 1 -> 2, 5; 2 -> 3, 4
        let records = vec![rec(1, 0), rec(2, 1), rec(3, 2), rec(4, 2), rec(5, 1)];
        let flat = build_forest(&records).flatten();

        let flags: Vec<(i32, u64, bool)> =
            flat.iter().map(|e| (e.record.pid, e.indent, e.is_last)).collect();
        assert_eq!(
            flags,
            vec![
                (1, 0, true),
                (2, 0, false),
                (3, 1, false),
                (4, 1, true),
                (5, 0, true),
            ]
        );
    }

    /// Unique pids drawn from a small range so self-parents and cycles are common
    fn arb_snapshot() -> impl Strategy<Value = Vec<ProcessRecord>> {
        prop::collection::btree_map(0i32..24, 0i32..24, 0..16)
            .prop_map(|m| m.into_iter().map(|(pid, ppid)| rec(pid, ppid)).collect::<Vec<_>>())
            .prop_shuffle()
    }

    proptest! {
        #[test]
        fn test_flatten_covers_random_snapshots(records in arb_snapshot()) {
            let flat = build_forest(&records).flatten();
            prop_assert_eq!(flat.len(), records.len());

            let mut seen: Vec<i32> = flat.iter().map(|e| e.record.pid).collect();
            seen.sort();
            seen.dedup();
            prop_assert_eq!(seen.len(), records.len());

            // Pre-order: the closest earlier row one level up is the parent
            for (i, entry) in flat.iter().enumerate() {
                if entry.depth == 0 {
                    continue;
                }
                let parent = flat[..i].iter().rev().find(|e| e.depth + 1 == entry.depth);
                prop_assert_eq!(parent.map(|p| p.record.pid), Some(entry.record.ppid));
            }
        }
    }
}
