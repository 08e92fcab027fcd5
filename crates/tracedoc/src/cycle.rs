//! Acyclicity checks over lazily described directed graphs.
//!
//! The graph is never materialized: callers pass a `neighbors` closure that
//! yields the outgoing nodes of a node on demand. The same detector runs
//! over the parent view and the child view of the traceability index.
//!
//! The walk is an iterative depth-first search with an explicit stack of
//! `Enter`/`Exit` frames, so deep relation chains cannot overflow the call
//! stack. Neighbors are pushed in reverse so they are visited in their
//! original order, as a recursive walk would.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use thiserror::Error;

/// A cycle was found.
///
/// `cycle` lists the nodes on the loop in discovery order without repeating
/// the closing node: for `A -> B -> C -> A` it is `[A, B, C]`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cycle detected while checking {uid}: {}", render_cycle(.cycle))]
pub struct CycleError {
    /// UID whose check found the cycle
    pub uid: String,

    /// UIDs forming the loop
    pub cycle: Vec<String>,
}

fn render_cycle(cycle: &[String]) -> String {
    let mut rendered = cycle.join(" -> ");
    if let Some(first) = cycle.first() {
        rendered.push_str(" -> ");
        rendered.push_str(first);
    }
    rendered
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Enter,
    Exit,
}

/// Reusable cycle detector.
///
/// Nodes proven acyclic are remembered in `checked` and skipped by later
/// calls on the same detector, so checking every node of a graph costs one
/// traversal overall.
#[derive(Debug, Clone)]
pub struct CycleDetector<N> {
    checked: HashSet<N>,
}

impl<N> Default for CycleDetector<N> {
    fn default() -> Self {
        Self {
            checked: HashSet::new(),
        }
    }
}

impl<N> CycleDetector<N>
where
    N: Clone + Eq + Hash + fmt::Display,
{
    /// Create a detector with no checked nodes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `node` has already been proven acyclic.
    #[must_use]
    pub fn is_checked(&self, node: &N) -> bool {
        self.checked.contains(node)
    }

    /// Verify that no cycle is reachable from `node`.
    ///
    /// # Errors
    ///
    /// Returns a [`CycleError`] naming `node` and the nodes of the first loop
    /// found.
    pub fn check_node<F, I>(&mut self, node: &N, neighbors: F) -> Result<(), CycleError>
    where
        F: FnMut(&N) -> I,
        I: IntoIterator<Item = N>,
    {
        if self.checked.contains(node) {
            return Ok(());
        }
        walk(
            node,
            vec![(node.clone(), Phase::Enter)],
            HashSet::new(),
            &mut self.checked,
            neighbors,
        )
    }

    /// Verify that adding `source -> target` would not close a loop.
    ///
    /// Uses a private `checked` set so the detector's own state is untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`CycleError`] whose cycle starts at `source`.
    pub fn check_candidate_edge<F, I>(
        source: &N,
        target: &N,
        neighbors: F,
    ) -> Result<(), CycleError>
    where
        F: FnMut(&N) -> I,
        I: IntoIterator<Item = N>,
    {
        if source == target {
            return Err(CycleError {
                uid: source.to_string(),
                cycle: vec![source.to_string()],
            });
        }

        // The source is opened first so reaching it again is a cycle
        let stack = vec![
            (source.clone(), Phase::Exit),
            (target.clone(), Phase::Enter),
        ];
        let on_path = HashSet::from([source.clone()]);
        let mut checked = HashSet::new();
        walk(source, stack, on_path, &mut checked, neighbors)
    }
}

fn walk<N, F, I>(
    root: &N,
    mut stack: Vec<(N, Phase)>,
    mut on_path: HashSet<N>,
    checked: &mut HashSet<N>,
    mut neighbors: F,
) -> Result<(), CycleError>
where
    N: Clone + Eq + Hash + fmt::Display,
    F: FnMut(&N) -> I,
    I: IntoIterator<Item = N>,
{
    while let Some((current, phase)) = stack.pop() {
        match phase {
            Phase::Exit => {
                on_path.remove(&current);
                checked.insert(current);
            }
            Phase::Enter => {
                if checked.contains(&current) {
                    continue;
                }
                on_path.insert(current.clone());
                stack.push((current.clone(), Phase::Exit));

                let next: Vec<N> = neighbors(&current)
                    .into_iter()
                    .filter(|n| !checked.contains(n))
                    .collect();
                if let Some(closing) = next.iter().find(|n| on_path.contains(*n)) {
                    return Err(CycleError {
                        uid: root.to_string(),
                        cycle: open_path_from(&stack, closing),
                    });
                }
                stack.extend(next.into_iter().rev().map(|n| (n, Phase::Enter)));
            }
        }
    }
    Ok(())
}

/// Nodes with an open `Exit` frame, starting where `closing` was opened.
fn open_path_from<N>(stack: &[(N, Phase)], closing: &N) -> Vec<String>
where
    N: Eq + fmt::Display,
{
    let start = stack
        .iter()
        .position(|(node, phase)| *phase == Phase::Exit && node == closing)
        .unwrap_or(0);
    stack[start..]
        .iter()
        .filter(|(_, phase)| *phase == Phase::Exit)
        .map(|(node, _)| node.to_string())
        .collect()
}
