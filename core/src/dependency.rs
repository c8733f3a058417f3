//! Dependency-graph algorithms: cycle detection, computed blocked/pending
//! status, and critical-path ordering (§4.5). These operate on an in-memory
//! view of the edge table; the store is responsible for persisting the
//! results inside a transaction.

use std::collections::{HashMap, HashSet};

use crate::{
    error::priority_rank,
    models::{Dependency, Task, TaskId, TaskStatus},
};

/// DFS over the current DAG plus proposed edges, O(V+E) (§4.5).
pub fn would_create_cycle(existing: &[Dependency], proposed: &[Dependency]) -> bool {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in existing.iter().chain(proposed.iter()) {
        adjacency.entry(edge.task_id.as_str()).or_default().push(edge.depends_on.as_str());
    }

    let mut visiting: HashSet<&str> = HashSet::new();
    let mut visited: HashSet<&str> = HashSet::new();

    fn dfs<'a>(
        node: &'a str,
        adjacency: &HashMap<&'a str, Vec<&'a str>>,
        visiting: &mut HashSet<&'a str>,
        visited: &mut HashSet<&'a str>,
    ) -> bool {
        if visiting.contains(node) {
            return true;
        }
        if visited.contains(node) {
            return false;
        }
        visiting.insert(node);
        if let Some(neighbors) = adjacency.get(node) {
            for next in neighbors {
                if dfs(next, adjacency, visiting, visited) {
                    return true;
                }
            }
        }
        visiting.remove(node);
        visited.insert(node);
        false
    }

    let nodes: HashSet<&str> = adjacency.keys().copied().collect();
    for node in nodes {
        if !visited.contains(node) && dfs(node, &adjacency, &mut visiting, &mut visited) {
            return true;
        }
    }
    false
}

/// Computed status from a task's outbound dependencies (§1, §4.5): blocked
/// iff at least one dependency target is not yet terminal.
pub fn compute_status(
    outbound: &[Dependency],
    dependency_statuses: impl Fn(&TaskId) -> Option<TaskStatus>,
) -> TaskStatus {
    let blocked = outbound.iter().any(|edge| {
        dependency_statuses(&edge.depends_on).map(|s| !s.is_terminal()).unwrap_or(true)
    });
    if blocked {
        TaskStatus::Blocked
    } else {
        TaskStatus::Pending
    }
}

/// Tasks that become unblocked as a result of completing `completed_id`
/// (§4.5 `on_complete`). Caller supplies each candidate dependent's full
/// outbound edge list and a lookup of current statuses; this function does
/// not mutate the store, only decides which dependents transition.
pub fn newly_unblocked<'a>(
    completed_id: &TaskId,
    dependents: impl Iterator<Item = &'a Task>,
    outbound_edges: impl Fn(&TaskId) -> Vec<Dependency>,
    status_of: impl Fn(&TaskId) -> Option<TaskStatus>,
) -> Vec<TaskId> {
    let mut result = Vec::new();
    for dependent in dependents {
        if dependent.status != TaskStatus::Blocked {
            continue;
        }
        let edges = outbound_edges(&dependent.id);
        let still_blocks_on_completed = edges.iter().any(|e| &e.depends_on == completed_id);
        if !still_blocks_on_completed {
            continue;
        }
        let all_terminal = edges
            .iter()
            .all(|e| status_of(&e.depends_on).map(|s| s.is_terminal()).unwrap_or(false));
        if all_terminal {
            result.push(dependent.id.clone());
        }
    }
    result
}

/// Longest path by `estimated_hours` (nulls as 0) through non-terminal
/// tasks (§4.5). Ties broken by priority desc, then deadline asc, then id.
pub fn critical_path(tasks: &[Task], edges: &[Dependency]) -> Vec<TaskId> {
    let active: HashMap<&str, &Task> = tasks
        .iter()
        .filter(|t| !t.status.is_terminal())
        .map(|t| (t.id.as_str(), t))
        .collect();

    let mut outbound: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        if active.contains_key(edge.task_id.as_str()) && active.contains_key(edge.depends_on.as_str()) {
            outbound.entry(edge.task_id.as_str()).or_default().push(edge.depends_on.as_str());
        }
    }

    let mut memo: HashMap<&str, (f64, Vec<&str>)> = HashMap::new();

    fn longest<'a>(
        node: &'a str,
        active: &HashMap<&'a str, &'a Task>,
        outbound: &HashMap<&'a str, Vec<&'a str>>,
        memo: &mut HashMap<&'a str, (f64, Vec<&'a str>)>,
    ) -> (f64, Vec<&'a str>) {
        if let Some(cached) = memo.get(node) {
            return cached.clone();
        }
        let hours = active.get(node).and_then(|t| t.estimated_hours).unwrap_or(0.0);
        let mut best: (f64, Vec<&str>) = (hours, vec![node]);
        if let Some(children) = outbound.get(node) {
            for child in children {
                let (child_hours, mut child_path) = longest(child, active, outbound, memo);
                let total = hours + child_hours;
                if total > best.0 {
                    let mut path = vec![node];
                    path.append(&mut child_path);
                    best = (total, path);
                }
            }
        }
        memo.insert(node, best.clone());
        best
    }

    let mut candidates: Vec<(f64, Vec<&str>)> = active
        .keys()
        .map(|node| longest(node, &active, &outbound, &mut memo))
        .collect();

    candidates.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| tie_break(&a.1, &b.1, &active))
    });

    candidates
        .into_iter()
        .next()
        .map(|(_, path)| path.into_iter().map(TaskId::from).collect())
        .unwrap_or_default()
}

fn tie_break(a: &[&str], b: &[&str], active: &HashMap<&str, &Task>) -> std::cmp::Ordering {
    let head = |ids: &[&str]| ids.first().and_then(|id| active.get(id).copied());
    match (head(a), head(b)) {
        (Some(ta), Some(tb)) => priority_rank(tb.priority)
            .cmp(&priority_rank(ta.priority))
            .then_with(|| {
                let da = ta.deadline.map(|d| d.timestamp()).unwrap_or(i64::MAX);
                let db = tb.deadline.map(|d| d.timestamp()).unwrap_or(i64::MAX);
                da.cmp(&db)
            })
            .then_with(|| ta.id.as_str().cmp(tb.id.as_str())),
        _ => std::cmp::Ordering::Equal,
    }
}
