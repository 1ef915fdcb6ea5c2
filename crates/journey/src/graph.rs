//! Journey topology: steps, the branches between them, and the rules for
//! connecting, removing and reordering branches.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::condition::Condition;
use crate::context::ContextProvider;
use crate::error::{BranchingError, BranchingResult};
use crate::evaluator::Evaluate;
use crate::priority::{self, Direction, PriorityUpdate};
use crate::selector::BranchSelector;
use crate::types::{Branch, Combinator, JourneyNode};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyGraph {
    #[serde(default)]
    pub nodes: Vec<JourneyNode>,
    #[serde(default, alias = "edges")]
    pub branches: Vec<Branch>,
}

/// Everything removed along with a node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRemoval {
    pub node: JourneyNode,
    pub branches: Vec<Branch>,
    pub delta: Vec<PriorityUpdate>,
}

impl JourneyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node, replacing any node with the same id.
    pub fn add_node(&mut self, node: JourneyNode) {
        match self.nodes.iter_mut().find(|n| n.id == node.id) {
            Some(existing) => *existing = node,
            None => self.nodes.push(node),
        }
    }

    pub fn node(&self, id: &str) -> Option<&JourneyNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn branch(&self, id: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.id == id)
    }

    /// Branches leaving `node_id`, in priority order.
    pub fn outgoing(&self, node_id: &str) -> Vec<&Branch> {
        let mut out: Vec<&Branch> = self
            .branches
            .iter()
            .filter(|b| b.source_node_id == node_id)
            .collect();
        out.sort_by_key(|b| b.priority);
        out
    }

    /// Distinct source node ids, in first-seen order.
    pub fn sources(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for branch in &self.branches {
            if !seen.contains(&branch.source_node_id.as_str()) {
                seen.push(&branch.source_node_id);
            }
        }
        seen
    }

    /// Connects two nodes with an unconditional branch appended after the
    /// source's existing branches.
    ///
    /// A trigger is always the source: connecting a step into a trigger
    /// reverses the direction.
    pub fn connect(&mut self, source: &str, target: &str) -> BranchingResult<Branch> {
        let source_node = self
            .node(source)
            .ok_or_else(|| BranchingError::NodeNotFound(source.to_string()))?;
        let target_node = self
            .node(target)
            .ok_or_else(|| BranchingError::NodeNotFound(target.to_string()))?;

        if source == target {
            return Err(BranchingError::SelfConnection(source.to_string()));
        }
        if source_node.kind.is_trigger() && target_node.kind.is_trigger() {
            return Err(BranchingError::TriggerToTrigger {
                from: source.to_string(),
                to: target.to_string(),
            });
        }
        if self.connected(source, target) {
            return Err(BranchingError::DuplicateConnection(
                source.to_string(),
                target.to_string(),
            ));
        }

        let (source, target, from_trigger) = if target_node.kind.is_trigger() {
            (target, source, true)
        } else {
            (source, target, source_node.kind.is_trigger())
        };

        let siblings: Vec<Branch> = self.outgoing(source).into_iter().cloned().collect();
        let next = priority::next_priority(source, &siblings)?;
        let mut branch = Branch::new(source, target, next);
        branch.rule_not_allowed = from_trigger;

        debug!(branch_id = %branch.id, priority = branch.priority, "Connected nodes");
        self.branches.push(branch.clone());
        Ok(branch)
    }

    /// Re-inserts a previously removed branch at its recorded priority,
    /// pushing later siblings down by one.
    pub fn insert_branch(&mut self, mut branch: Branch) -> BranchingResult<Vec<PriorityUpdate>> {
        for end in [&branch.source_node_id, &branch.target_node_id] {
            if self.node(end).is_none() {
                return Err(BranchingError::NodeNotFound(end.clone()));
            }
        }
        if self.branch(&branch.id).is_some()
            || self.connected(&branch.source_node_id, &branch.target_node_id)
        {
            return Err(BranchingError::DuplicateConnection(
                branch.source_node_id.clone(),
                branch.target_node_id.clone(),
            ));
        }

        let sibling_count = self.outgoing(&branch.source_node_id).len() as u32;
        branch.priority = branch.priority.clamp(1, sibling_count + 1);

        let siblings = self.outgoing(&branch.source_node_id);
        if siblings.iter().any(|b| b.priority == u32::MAX) {
            let siblings: Vec<Branch> = siblings.into_iter().cloned().collect();
            return Err(priority::invariant_error(&branch.source_node_id, &siblings));
        }

        let mut delta = Vec::new();
        for sibling in self
            .branches
            .iter_mut()
            .filter(|b| b.source_node_id == branch.source_node_id)
        {
            if sibling.priority >= branch.priority {
                sibling.priority += 1;
                delta.push(PriorityUpdate::of(sibling));
            }
        }
        delta.push(PriorityUpdate::of(&branch));
        self.branches.push(branch);
        Ok(delta)
    }

    /// Removes a branch and compacts its source's remaining priorities.
    pub fn remove_branch(
        &mut self,
        branch_id: &str,
    ) -> BranchingResult<(Branch, Vec<PriorityUpdate>)> {
        let index = self
            .branches
            .iter()
            .position(|b| b.id == branch_id)
            .ok_or_else(|| BranchingError::BranchNotFound(branch_id.to_string()))?;
        let removed = self.branches.remove(index);
        let delta = self.compact_source(&removed.source_node_id);
        Ok((removed, delta))
    }

    /// Removes a node with every branch touching it.
    pub fn remove_node(&mut self, node_id: &str) -> BranchingResult<NodeRemoval> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or_else(|| BranchingError::NodeNotFound(node_id.to_string()))?;
        let node = self.nodes.remove(index);

        let (removed, kept): (Vec<Branch>, Vec<Branch>) = std::mem::take(&mut self.branches)
            .into_iter()
            .partition(|b| b.source_node_id == node_id || b.target_node_id == node_id);
        self.branches = kept;

        let mut affected: Vec<&str> = removed
            .iter()
            .filter(|b| b.source_node_id != node_id)
            .map(|b| b.source_node_id.as_str())
            .collect();
        affected.sort_unstable();
        affected.dedup();
        let mut delta = Vec::new();
        for source in affected {
            delta.extend(self.compact_source(source));
        }

        Ok(NodeRemoval {
            node,
            branches: removed,
            delta,
        })
    }

    /// Replaces a branch's conditions and returns the previous ones.
    pub fn set_conditions(
        &mut self,
        branch_id: &str,
        combinator: Combinator,
        conditions: Vec<Condition>,
    ) -> BranchingResult<(Combinator, Vec<Condition>)> {
        let branch = self.branch_mut(branch_id)?;
        if branch.rule_not_allowed && !conditions.is_empty() {
            return Err(BranchingError::ConditionsNotAllowed(branch_id.to_string()));
        }
        let previous_combinator = std::mem::replace(&mut branch.condition_type, combinator);
        let previous = std::mem::replace(&mut branch.conditions, conditions);
        Ok((previous_combinator, previous))
    }

    /// Moves a branch one slot among its siblings. Empty delta at either end.
    pub fn move_branch(
        &mut self,
        branch_id: &str,
        direction: Direction,
    ) -> BranchingResult<Vec<PriorityUpdate>> {
        let source = self
            .branch(branch_id)
            .map(|b| b.source_node_id.clone())
            .ok_or_else(|| BranchingError::BranchNotFound(branch_id.to_string()))?;
        let siblings: Vec<Branch> = self.outgoing(&source).into_iter().cloned().collect();
        let reordered = priority::shift(&siblings, branch_id, direction);
        self.apply_delta(&reordered.delta);
        Ok(reordered.delta)
    }

    /// Renumbers every source's branches into a dense `1..N` sequence.
    pub fn normalize(&mut self) -> Vec<PriorityUpdate> {
        let sources: Vec<String> = self.sources().into_iter().map(str::to_string).collect();
        sources
            .iter()
            .flat_map(|source| self.compact_source(source))
            .collect()
    }

    /// Fails on the first source whose priorities are not dense.
    pub fn check_priorities(&self) -> BranchingResult<()> {
        for source in self.sources() {
            let siblings: Vec<Branch> = self.outgoing(source).into_iter().cloned().collect();
            priority::check_dense(source, &siblings)?;
        }
        Ok(())
    }

    /// Picks the branch a contact follows out of `node_id`.
    pub fn select_next<E: Evaluate>(
        &self,
        node_id: &str,
        selector: &BranchSelector<E>,
        context: &dyn ContextProvider,
    ) -> BranchingResult<Option<&Branch>> {
        if self.node(node_id).is_none() {
            return Err(BranchingError::NodeNotFound(node_id.to_string()));
        }
        selector.select(self.outgoing(node_id), context)
    }

    /// Records the backend id once a branch has been persisted.
    pub fn set_connection_id(
        &mut self,
        branch_id: &str,
        connection_id: u64,
    ) -> BranchingResult<()> {
        self.branch_mut(branch_id)?.connection_id = Some(connection_id);
        Ok(())
    }

    fn branch_mut(&mut self, branch_id: &str) -> BranchingResult<&mut Branch> {
        self.branches
            .iter_mut()
            .find(|b| b.id == branch_id)
            .ok_or_else(|| BranchingError::BranchNotFound(branch_id.to_string()))
    }

    fn connected(&self, a: &str, b: &str) -> bool {
        self.branches.iter().any(|branch| {
            (branch.source_node_id == a && branch.target_node_id == b)
                || (branch.source_node_id == b && branch.target_node_id == a)
        })
    }

    fn compact_source(&mut self, source: &str) -> Vec<PriorityUpdate> {
        // Stable sort inside `compact` keeps list order for equal priorities.
        let siblings: Vec<Branch> = self
            .branches
            .iter()
            .filter(|b| b.source_node_id == source)
            .cloned()
            .collect();
        let delta = priority::compact(&siblings).delta;
        self.apply_delta(&delta);
        delta
    }

    fn apply_delta(&mut self, delta: &[PriorityUpdate]) {
        for update in delta {
            if let Some(branch) = self.branches.iter_mut().find(|b| b.id == update.branch_id) {
                branch.priority = update.priority;
            }
        }
    }
}
