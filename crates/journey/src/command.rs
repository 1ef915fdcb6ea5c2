//! Graph edits as commands. Applying a command yields the command that
//! reverts it, so edits can be undone for a short while after they settle.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crm_core::config::JourneyConfig;

use crate::condition::Condition;
use crate::error::BranchingResult;
use crate::graph::JourneyGraph;
use crate::priority::{Direction, PriorityUpdate};
use crate::types::{Branch, Combinator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum GraphCommand {
    SetConditions {
        branch_id: String,
        #[serde(default)]
        combinator: Combinator,
        conditions: Vec<Condition>,
    },
    Move {
        branch_id: String,
        direction: Direction,
    },
    Connect {
        source: String,
        target: String,
    },
    RemoveBranch {
        branch_id: String,
    },
    RestoreBranch {
        branch: Branch,
    },
}

/// Outcome of applying a command.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    /// Command that reverts this one.
    pub inverse: GraphCommand,
    pub delta: Vec<PriorityUpdate>,
}

impl GraphCommand {
    pub fn name(&self) -> &'static str {
        match self {
            GraphCommand::SetConditions { .. } => "set_conditions",
            GraphCommand::Move { .. } => "move",
            GraphCommand::Connect { .. } => "connect",
            GraphCommand::RemoveBranch { .. } => "remove_branch",
            GraphCommand::RestoreBranch { .. } => "restore_branch",
        }
    }

    /// Applies the command. `None` means nothing changed (a move past either
    /// end), so there is nothing to undo.
    pub fn apply(&self, graph: &mut JourneyGraph) -> BranchingResult<Option<Applied>> {
        let applied = match self {
            GraphCommand::SetConditions {
                branch_id,
                combinator,
                conditions,
            } => {
                let (combinator, conditions) =
                    graph.set_conditions(branch_id, *combinator, conditions.clone())?;
                Applied {
                    inverse: GraphCommand::SetConditions {
                        branch_id: branch_id.clone(),
                        combinator,
                        conditions,
                    },
                    delta: Vec::new(),
                }
            }
            GraphCommand::Move {
                branch_id,
                direction,
            } => {
                let delta = graph.move_branch(branch_id, *direction)?;
                if delta.is_empty() {
                    return Ok(None);
                }
                Applied {
                    inverse: GraphCommand::Move {
                        branch_id: branch_id.clone(),
                        direction: direction.opposite(),
                    },
                    delta,
                }
            }
            GraphCommand::Connect { source, target } => {
                let branch = graph.connect(source, target)?;
                Applied {
                    delta: vec![PriorityUpdate::of(&branch)],
                    inverse: GraphCommand::RemoveBranch {
                        branch_id: branch.id,
                    },
                }
            }
            GraphCommand::RemoveBranch { branch_id } => {
                let (branch, delta) = graph.remove_branch(branch_id)?;
                Applied {
                    inverse: GraphCommand::RestoreBranch { branch },
                    delta,
                }
            }
            GraphCommand::RestoreBranch { branch } => {
                let delta = graph.insert_branch(branch.clone())?;
                Applied {
                    inverse: GraphCommand::RemoveBranch {
                        branch_id: branch.id.clone(),
                    },
                    delta,
                }
            }
        };
        debug!(command = self.name(), changed = applied.delta.len(), "Applied graph command");
        Ok(Some(applied))
    }
}

#[derive(Debug, Clone, PartialEq)]
struct UndoEntry {
    inverse: GraphCommand,
    recorded_at: DateTime<Utc>,
}

/// Inverse commands that are still eligible for undo, newest last.
#[derive(Debug, Clone)]
pub struct UndoHistory {
    window: Duration,
    capacity: usize,
    entries: VecDeque<UndoEntry>,
}

impl UndoHistory {
    pub fn new(window: Duration, capacity: usize) -> Self {
        Self {
            window,
            capacity,
            entries: VecDeque::new(),
        }
    }

    pub fn from_config(config: &JourneyConfig) -> Self {
        let secs = i64::try_from(config.undo_window_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        Self::new(Duration::seconds(secs), config.undo_capacity)
    }

    /// Stores `inverse` as the most recent undo step.
    pub fn record(&mut self, inverse: GraphCommand, now: DateTime<Utc>) {
        if self.capacity == 0 {
            return;
        }
        self.prune(now);
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(UndoEntry {
            inverse,
            recorded_at: now,
        });
    }

    /// Drops entries recorded more than one window before `now`.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let Some(cutoff) = now.checked_sub_signed(self.window) else {
            return;
        };
        while self
            .entries
            .front()
            .is_some_and(|entry| entry.recorded_at < cutoff)
        {
            self.entries.pop_front();
        }
    }

    /// Applies the newest unexpired inverse command to `graph`.
    ///
    /// Returns `Ok(None)` when nothing is left to undo. If the inverse fails
    /// it stays in the history.
    pub fn undo(
        &mut self,
        graph: &mut JourneyGraph,
        now: DateTime<Utc>,
    ) -> BranchingResult<Option<Applied>> {
        self.prune(now);
        let Some(entry) = self.entries.pop_back() else {
            return Ok(None);
        };
        match entry.inverse.apply(graph) {
            Ok(applied) => Ok(applied),
            Err(err) => {
                self.entries.push_back(entry);
                Err(err)
            }
        }
    }

    pub fn peek(&self) -> Option<&GraphCommand> {
        self.entries.back().map(|entry| &entry.inverse)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
