//! Ordering of per-location fragments.
//!
//! Relative ordering builds a precedence graph over every fragment that takes
//! part in a constraint and sorts it with Kahn's algorithm. Ties are broken by
//! the fragment's stance towards `others` first and scan order second, which
//! keeps the result deterministic. Fragments no constraint mentions form the
//! `others` block and keep their scan order.

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};
use webscope_api::{Fragment, OrderingEntry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderingError {
    #[error("ordering cycle between fragments {}", .0.join(", "))]
    Cycle(Vec<String>),
    #[error("more than one fragment is named '{0}'")]
    DuplicateName(String),
    #[error("fragment {0} is ordered both before and after others")]
    OthersConflict(String),
    #[error("fragment {0} cannot be placed relative to others")]
    Unsatisfiable(String),
}

/// Stance of a fragment towards the `others` block. Lower sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Rank {
    BeforeOthers = 0,
    Neutral = 1,
    AfterOthers = 2,
}

/// Order `fragments` (given in scan order) and return their indices.
///
/// With an absolute ordering the result may omit fragments; otherwise every
/// fragment appears exactly once.
pub fn order_fragments(
    absolute: Option<&[OrderingEntry]>,
    fragments: &[Fragment],
) -> Result<Vec<usize>, OrderingError> {
    let names = index_names(fragments)?;
    match absolute {
        Some(entries) => Ok(absolute_order(entries, fragments, &names)),
        None => relative_order(fragments, &names),
    }
}

fn label(fragments: &[Fragment], idx: usize) -> String {
    let fragment = &fragments[idx];
    match (&fragment.name, &fragment.source_location) {
        (Some(name), _) => format!("'{name}'"),
        (None, Some(location)) => location.to_string(),
        (None, None) => format!("#{idx}"),
    }
}

fn index_names(fragments: &[Fragment]) -> Result<HashMap<&str, usize>, OrderingError> {
    let mut names = HashMap::new();
    for (idx, fragment) in fragments.iter().enumerate() {
        if let Some(name) = fragment.name.as_deref() {
            if names.insert(name, idx).is_some() {
                return Err(OrderingError::DuplicateName(name.to_string()));
            }
        }
    }
    Ok(names)
}

fn absolute_order(
    entries: &[OrderingEntry],
    fragments: &[Fragment],
    names: &HashMap<&str, usize>,
) -> Vec<usize> {
    let listed: HashSet<usize> = entries
        .iter()
        .filter_map(|entry| match entry {
            OrderingEntry::Named(name) => names.get(name.as_str()).copied(),
            OrderingEntry::Others => None,
        })
        .collect();

    let mut order = Vec::with_capacity(fragments.len());
    let mut others_placed = false;
    for entry in entries {
        match entry {
            OrderingEntry::Named(name) => match names.get(name.as_str()) {
                Some(&idx) if !order.contains(&idx) => order.push(idx),
                Some(_) => {}
                None => debug!("absolute ordering names unknown fragment '{}'", name),
            },
            OrderingEntry::Others if !others_placed => {
                others_placed = true;
                order.extend((0..fragments.len()).filter(|idx| !listed.contains(idx)));
            }
            OrderingEntry::Others => {}
        }
    }

    let excluded = fragments.len() - order.len();
    if excluded > 0 {
        debug!("absolute ordering excludes {} fragment(s)", excluded);
    }
    order
}

fn relative_order(
    fragments: &[Fragment],
    names: &HashMap<&str, usize>,
) -> Result<Vec<usize>, OrderingError> {
    let resolve = |entry: &OrderingEntry| match entry {
        OrderingEntry::Named(name) => {
            let target = names.get(name.as_str()).copied();
            if target.is_none() {
                warn!("ordering refers to unknown fragment '{}'", name);
            }
            target
        }
        OrderingEntry::Others => None,
    };

    let mut ranks = Vec::with_capacity(fragments.len());
    for (idx, fragment) in fragments.iter().enumerate() {
        let ordering = &fragment.ordering;
        let rank = match (ordering.before_others(), ordering.after_others()) {
            (true, true) => return Err(OrderingError::OthersConflict(label(fragments, idx))),
            (true, false) => Rank::BeforeOthers,
            (false, true) => Rank::AfterOthers,
            (false, false) => Rank::Neutral,
        };
        ranks.push(rank);
    }

    // (from, to): `from` must precede `to`.
    let mut constraints = Vec::new();
    for (idx, fragment) in fragments.iter().enumerate() {
        for target in fragment.ordering.before.iter().filter_map(resolve) {
            constraints.push((idx, target));
        }
        for target in fragment.ordering.after.iter().filter_map(resolve) {
            constraints.push((target, idx));
        }
    }

    let mut mentioned: Vec<bool> = fragments
        .iter()
        .map(|fragment| !fragment.ordering.is_empty())
        .collect();
    for &(from, to) in &constraints {
        mentioned[from] = true;
        mentioned[to] = true;
    }

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let mut nodes: HashMap<usize, NodeIndex> = HashMap::new();
    for idx in (0..fragments.len()).filter(|&idx| mentioned[idx]) {
        nodes.insert(idx, graph.add_node(idx));
    }
    for &(from, to) in &constraints {
        graph.update_edge(nodes[&from], nodes[&to], ());
    }

    let sorted = kahn(&graph, &ranks);
    if sorted.len() < graph.node_count() {
        return Err(OrderingError::Cycle(cycle_members(&graph, fragments)));
    }

    let others: Vec<usize> = (0..fragments.len()).filter(|&idx| !mentioned[idx]).collect();
    let position = sorted
        .iter()
        .position(|&idx| ranks[idx] == Rank::AfterOthers)
        .or_else(|| {
            sorted
                .iter()
                .rposition(|&idx| ranks[idx] == Rank::BeforeOthers)
                .map(|p| p + 1)
        })
        .unwrap_or(sorted.len());

    for (pos, &idx) in sorted.iter().enumerate() {
        let misplaced = match ranks[idx] {
            Rank::BeforeOthers => pos >= position,
            Rank::AfterOthers => pos < position,
            Rank::Neutral => false,
        };
        if misplaced {
            return Err(OrderingError::Unsatisfiable(label(fragments, idx)));
        }
    }

    let mut order = Vec::with_capacity(fragments.len());
    order.extend_from_slice(&sorted[..position]);
    order.extend(others);
    order.extend_from_slice(&sorted[position..]);
    Ok(order)
}

/// Kahn's algorithm with a `(rank, scan index)` priority among ready nodes.
/// Returns fewer nodes than the graph holds when a cycle blocks progress.
fn kahn(graph: &DiGraph<usize, ()>, ranks: &[Rank]) -> Vec<usize> {
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|n| (n, graph.neighbors_directed(n, Direction::Incoming).count()))
        .collect();

    let mut ready: BinaryHeap<Reverse<(Rank, usize, NodeIndex)>> = graph
        .node_indices()
        .filter(|n| in_degree[n] == 0)
        .map(|n| Reverse((ranks[graph[n]], graph[n], n)))
        .collect();

    let mut sorted = Vec::with_capacity(graph.node_count());
    while let Some(Reverse((_, idx, node))) = ready.pop() {
        sorted.push(idx);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            if let Some(degree) = in_degree.get_mut(&next) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse((ranks[graph[next]], graph[next], next)));
                }
            }
        }
    }
    sorted
}

fn cycle_members(graph: &DiGraph<usize, ()>, fragments: &[Fragment]) -> Vec<String> {
    let mut members: Vec<usize> = tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .map(|n| graph[n])
        .collect();
    members.sort_unstable();
    members.into_iter().map(|idx| label(fragments, idx)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use webscope_api::{FragmentKind, SourceLocation};

    fn fragment(name: &str) -> Fragment {
        let mut f = Fragment::for_location(SourceLocation::archive(format!("/lib/{name}.jar")));
        f.name = Some(name.to_string());
        f
    }

    fn named(name: &str) -> OrderingEntry {
        OrderingEntry::Named(name.to_string())
    }

    fn names(fragments: &[Fragment], order: &[usize]) -> Vec<String> {
        order
            .iter()
            .map(|&i| fragments[i].name.clone().unwrap_or_default())
            .collect()
    }

    #[test]
    fn test_unconstrained_keeps_scan_order() {
        let fragments = vec![fragment("A"), fragment("B"), fragment("C")];
        let order = order_fragments(None, &fragments).unwrap();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn test_before_constraint_with_unreferenced_others() {
        // C is never mentioned: it must land before A or after B.
        let mut a = fragment("A");
        a.ordering.before.push(named("B"));
        let fragments = vec![fragment("C"), fragment("B"), a];
        let order = order_fragments(None, &fragments).unwrap();
        assert_eq!(names(&fragments, &order), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_after_constraint() {
        let mut a = fragment("A");
        a.ordering.after.push(named("B"));
        let fragments = vec![a, fragment("B")];
        let order = order_fragments(None, &fragments).unwrap();
        assert_eq!(names(&fragments, &order), vec!["B", "A"]);
    }

    #[test]
    fn test_others_placement() {
        let mut first = fragment("First");
        first.ordering.before.push(OrderingEntry::Others);
        let mut last = fragment("Last");
        last.ordering.after.push(OrderingEntry::Others);
        let fragments = vec![last, fragment("X"), fragment("Y"), first];
        let order = order_fragments(None, &fragments).unwrap();
        assert_eq!(names(&fragments, &order), vec!["First", "X", "Y", "Last"]);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let mut a = fragment("A");
        a.ordering.before.push(named("B"));
        let mut b = fragment("B");
        b.ordering.before.push(named("A"));
        let fragments = vec![a, b, fragment("C")];
        let err = order_fragments(None, &fragments).unwrap_err();
        assert_eq!(
            err,
            OrderingError::Cycle(vec!["'A'".to_string(), "'B'".to_string()])
        );
    }

    #[test]
    fn test_duplicate_names_and_others_conflict() {
        let fragments = vec![fragment("A"), fragment("A")];
        assert_eq!(
            order_fragments(None, &fragments),
            Err(OrderingError::DuplicateName("A".into()))
        );

        let mut torn = fragment("T");
        torn.ordering.before.push(OrderingEntry::Others);
        torn.ordering.after.push(OrderingEntry::Others);
        assert!(matches!(
            order_fragments(None, &[torn]),
            Err(OrderingError::OthersConflict(_))
        ));
    }

    #[test]
    fn test_unsatisfiable_against_others() {
        // L wants to be after others but also before F, which wants to be
        // before others.
        let mut late = fragment("L");
        late.ordering.after.push(OrderingEntry::Others);
        late.ordering.before.push(named("F"));
        let mut first = fragment("F");
        first.ordering.before.push(OrderingEntry::Others);
        let fragments = vec![late, first, fragment("X")];
        assert!(matches!(
            order_fragments(None, &fragments),
            Err(OrderingError::Unsatisfiable(_))
        ));
    }

    #[test]
    fn test_absolute_ordering() {
        let fragments = vec![fragment("A"), fragment("B"), fragment("C"), fragment("D")];
        let absolute = vec![named("C"), OrderingEntry::Others, named("A"), named("Z")];
        let order = order_fragments(Some(&absolute), &fragments).unwrap();
        assert_eq!(names(&fragments, &order), vec!["C", "B", "D", "A"]);

        let absolute = vec![named("B")];
        let order = order_fragments(Some(&absolute), &fragments).unwrap();
        assert_eq!(order, vec![1]);
    }

    #[test]
    fn test_unnamed_fragments_are_others() {
        let unnamed = Fragment::for_location(SourceLocation::directory("/classes"));
        assert_eq!(unnamed.kind, FragmentKind::PerLocation);
        let mut a = fragment("A");
        a.ordering.after.push(OrderingEntry::Others);
        let fragments = vec![a, unnamed];
        let order = order_fragments(None, &fragments).unwrap();
        assert_eq!(order, vec![1, 0]);
    }
}
