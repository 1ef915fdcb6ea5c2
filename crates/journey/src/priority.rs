//! Priority maintenance for the branches leaving one node.
//!
//! Every function takes the node's branches as an explicit list and returns
//! the updated list (sorted by priority) together with the changes the
//! persistence layer needs to store.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{BranchingError, BranchingResult};
use crate::types::Branch;

/// One persisted priority change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<u64>,
    pub branch_id: String,
    pub priority: u32,
}

impl PriorityUpdate {
    pub fn of(branch: &Branch) -> Self {
        Self {
            connection_id: branch.connection_id,
            branch_id: branch.id.clone(),
            priority: branch.priority,
        }
    }
}

/// Result of a reorder: the full branch set plus the changed priorities.
#[derive(Debug, Clone, PartialEq)]
pub struct Reordered {
    pub branches: Vec<Branch>,
    pub delta: Vec<PriorityUpdate>,
}

impl Reordered {
    fn unchanged(branches: &[Branch]) -> Self {
        Self {
            branches: branches.to_vec(),
            delta: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.delta.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards priority 1.
    Up,
    Down,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// Swaps `branch_id` with the branch evaluated just before it.
pub fn move_up(branches: &[Branch], branch_id: &str) -> Reordered {
    shift(branches, branch_id, Direction::Up)
}

/// Swaps `branch_id` with the branch evaluated just after it.
pub fn move_down(branches: &[Branch], branch_id: &str) -> Reordered {
    shift(branches, branch_id, Direction::Down)
}

/// Swaps the priorities of `branch_id` and its neighbour in `direction`.
///
/// Unknown ids and moves past either end return the input unchanged with an
/// empty delta. Otherwise the delta holds exactly the two swapped branches,
/// the moved one first.
pub fn shift(branches: &[Branch], branch_id: &str, direction: Direction) -> Reordered {
    let mut sorted = sorted_by_priority(branches);
    let Some(pos) = sorted.iter().position(|b| b.id == branch_id) else {
        return Reordered::unchanged(branches);
    };
    let neighbour = match direction {
        Direction::Up => pos.checked_sub(1),
        Direction::Down => Some(pos + 1).filter(|&n| n < sorted.len()),
    };
    let Some(neighbour) = neighbour else {
        return Reordered::unchanged(branches);
    };

    let moved_priority = sorted[pos].priority;
    sorted[pos].priority = sorted[neighbour].priority;
    sorted[neighbour].priority = moved_priority;
    sorted.swap(pos, neighbour);

    let delta = vec![
        PriorityUpdate::of(&sorted[neighbour]),
        PriorityUpdate::of(&sorted[pos]),
    ];
    Reordered {
        branches: sorted,
        delta,
    }
}

/// Renumbers priorities to `1..=N`, ordering by current priority and then
/// by list position. Only branches whose priority changed are in the delta.
pub fn compact(branches: &[Branch]) -> Reordered {
    let mut sorted = sorted_by_priority(branches);
    let mut delta = Vec::new();
    for (rank, branch) in sorted.iter_mut().enumerate() {
        let priority = rank as u32 + 1;
        if branch.priority != priority {
            branch.priority = priority;
            delta.push(PriorityUpdate::of(branch));
        }
    }
    Reordered {
        branches: sorted,
        delta,
    }
}

/// Priority for a branch appended after `branches`. Fails when the highest
/// priority leaves no room above it.
pub fn next_priority(node_id: &str, branches: &[Branch]) -> BranchingResult<u32> {
    branches
        .iter()
        .map(|b| b.priority)
        .max()
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| invariant_error(node_id, branches))
}

/// Fails unless the priorities of `branches` are exactly `{1, ..., N}`.
pub fn check_dense(node_id: &str, branches: &[Branch]) -> BranchingResult<()> {
    let found: BTreeSet<u32> = branches.iter().map(|b| b.priority).collect();
    let dense = found.len() == branches.len()
        && found.iter().copied().eq(1..=branches.len() as u32);
    if dense {
        Ok(())
    } else {
        Err(invariant_error(node_id, branches))
    }
}

pub(crate) fn invariant_error(node_id: &str, branches: &[Branch]) -> BranchingError {
    let mut found: Vec<u32> = branches.iter().map(|b| b.priority).collect();
    found.sort_unstable();
    BranchingError::PriorityInvariant {
        node_id: node_id.to_string(),
        count: branches.len(),
        found,
    }
}

fn sorted_by_priority(branches: &[Branch]) -> Vec<Branch> {
    let mut sorted = branches.to_vec();
    sorted.sort_by_key(|b| b.priority);
    sorted
}
