use ahash::AHashMap;
use tracing::debug;

use crate::{
    config::LoadOptions,
    errors::FamGraphError,
    model::{Person, PersonRecord},
    store::RecordStore,
};

/// A person plus arena indices of their direct children and parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub person: Person,
    pub children: Vec<usize>,
    pub parents: Vec<usize>,
}

impl GraphNode {
    pub fn id(&self) -> i64 {
        self.person.id
    }
}

/// The loaded family graph. Nodes live in an arena in source order and refer
/// to each other by index; `parents` is always the transpose of `children`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: Vec<GraphNode>,
    index: AHashMap<i64, usize>,
}

impl NodeSet {
    /// Two passes: allocate one node per id, then wire every child edge in
    /// both directions. Repeated rows for an id fold their children into the
    /// first occurrence.
    pub fn from_records(records: Vec<PersonRecord>) -> Result<Self, FamGraphError> {
        let mut nodes = Vec::with_capacity(records.len());
        let mut index: AHashMap<i64, usize> = AHashMap::with_capacity(records.len());
        let mut declared: Vec<Vec<i64>> = Vec::with_capacity(records.len());
        for record in records {
            if let Some(&existing) = index.get(&record.person.id) {
                debug!(id = record.person.id, "collapsing duplicate person row");
                let children = &mut declared[existing];
                for child_id in record.children {
                    if !children.contains(&child_id) {
                        children.push(child_id);
                    }
                }
                continue;
            }
            index.insert(record.person.id, nodes.len());
            declared.push(record.children);
            nodes.push(GraphNode {
                person: record.person,
                children: Vec::new(),
                parents: Vec::new(),
            });
        }

        for (parent_idx, children) in declared.into_iter().enumerate() {
            for child_id in children {
                let Some(&child_idx) = index.get(&child_id) else {
                    return Err(FamGraphError::DanglingReference {
                        parent_id: nodes[parent_idx].id(),
                        child_id,
                        missing_id: child_id,
                    });
                };
                nodes[parent_idx].children.push(child_idx);
                nodes[child_idx].parents.push(parent_idx);
            }
        }
        Ok(Self { nodes, index })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.iter().map(|node| node.children.len()).sum()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> Option<&GraphNode> {
        self.nodes.get(idx)
    }

    pub fn index_of(&self, id: i64) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn get(&self, id: i64) -> Option<&GraphNode> {
        self.index_of(id).map(|idx| &self.nodes[idx])
    }

    pub fn children_of(&self, id: i64) -> Option<impl Iterator<Item = &GraphNode> + '_> {
        let node = self.get(id)?;
        Some(node.children.iter().map(move |&idx| &self.nodes[idx]))
    }

    pub fn parents_of(&self, id: i64) -> Option<impl Iterator<Item = &GraphNode> + '_> {
        let node = self.get(id)?;
        Some(node.parents.iter().map(move |&idx| &self.nodes[idx]))
    }

    /// People with no recorded parents, in source order.
    pub fn roots(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.nodes.iter().filter(|node| node.parents.is_empty())
    }

    /// `(parent_id, child_id)` pairs in emission order: by parent in source
    /// order, then by child-list order.
    pub fn edges(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.nodes.iter().flat_map(move |node| {
            node.children
                .iter()
                .map(move |&child| (node.id(), self.nodes[child].id()))
        })
    }

    /// First directed cycle found, as the ids along it with the starting id
    /// repeated at the end.
    pub fn find_cycle(&self) -> Option<Vec<i64>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            OnPath,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if marks[start] != Mark::Unvisited {
                continue;
            }
            // (node, next child position)
            let mut stack = vec![(start, 0usize)];
            marks[start] = Mark::OnPath;
            while let Some(frame) = stack.last_mut() {
                let node = frame.0;
                if let Some(&child) = self.nodes[node].children.get(frame.1) {
                    frame.1 += 1;
                    match marks[child] {
                        Mark::Unvisited => {
                            marks[child] = Mark::OnPath;
                            stack.push((child, 0));
                        }
                        Mark::OnPath => {
                            let from = stack
                                .iter()
                                .position(|&(idx, _)| idx == child)
                                .unwrap_or(0);
                            let mut cycle: Vec<i64> = stack[from..]
                                .iter()
                                .map(|&(idx, _)| self.nodes[idx].id())
                                .collect();
                            cycle.push(self.nodes[child].id());
                            return Some(cycle);
                        }
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        None
    }

    pub fn ensure_acyclic(&self) -> Result<(), FamGraphError> {
        match self.find_cycle() {
            Some(cycle) => Err(FamGraphError::CycleDetected(cycle)),
            None => Ok(()),
        }
    }
}

/// Bulk-fetches the store and builds the graph.
pub fn load_from_store(
    store: &RecordStore,
    options: &LoadOptions,
) -> Result<NodeSet, FamGraphError> {
    let records = store.fetch_all_persons_with_children()?;
    let graph = NodeSet::from_records(records)?;
    if !options.allow_cycles {
        graph.ensure_acyclic()?;
    }
    debug!(
        nodes = graph.len(),
        edges = graph.edge_count(),
        "family graph loaded"
    );
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn record(id: i64, children: &[i64]) -> PersonRecord {
        let mut person = Person::new(
            format!("p{id}"),
            NaiveDate::from_ymd_opt(1900, 1, 1).expect("date"),
        );
        person.id = id;
        PersonRecord {
            person,
            children: children.to_vec(),
        }
    }

    #[test]
    fn cycle_is_reported_with_closing_id() {
        let graph = NodeSet::from_records(vec![
            record(1, &[2]),
            record(2, &[3]),
            record(3, &[1]),
        ])
        .expect("graph");
        assert_eq!(graph.find_cycle(), Some(vec![1, 2, 3, 1]));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let graph = NodeSet::from_records(vec![
            record(1, &[2, 3]),
            record(2, &[4]),
            record(3, &[4]),
            record(4, &[]),
        ])
        .expect("graph");
        assert!(graph.ensure_acyclic().is_ok());
        assert_eq!(graph.node(3).map(|n| n.parents.clone()), Some(vec![1, 2]));
    }
}
