use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tracing::{info, warn};

use crm_core::config::JourneyConfig;
use crm_core::event_bus::{make_event, noop_sink, EventSink};
use crm_core::types::{AnalyticsEvent, EventType};

use crate::command::{GraphCommand, UndoHistory};
use crate::context::ContextProvider;
use crate::error::{BranchingError, BranchingResult};
use crate::evaluator::ConditionEvaluator;
use crate::graph::JourneyGraph;
use crate::priority::PriorityUpdate;
use crate::selector::BranchSelector;

/// Where a contact goes after leaving a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Follow {
        branch_id: String,
        target_node_id: String,
        priority: u32,
    },
    /// No branch admitted the contact; the caller picks a fallback.
    NoMatch,
}

/// Holds journey graphs, routes contacts through them and applies edits.
#[derive(Clone)]
pub struct JourneyRouter {
    graphs: Arc<DashMap<String, JourneyGraph>>,
    histories: Arc<DashMap<String, UndoHistory>>,
    selector: Arc<BranchSelector>,
    event_sink: Arc<dyn EventSink>,
    node_id: Option<String>,
    config: JourneyConfig,
}

impl std::fmt::Debug for JourneyRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JourneyRouter")
            .field("journeys", &self.graphs.len())
            .field("histories", &self.histories.len())
            .finish()
    }
}

impl JourneyRouter {
    pub fn new(config: JourneyConfig) -> Self {
        let evaluator = ConditionEvaluator::new()
            .with_journey_finished_action(config.journey_finished_action.clone());
        Self {
            graphs: Arc::new(DashMap::new()),
            histories: Arc::new(DashMap::new()),
            selector: Arc::new(BranchSelector::with_evaluator(evaluator)),
            event_sink: noop_sink(),
            node_id: None,
            config,
        }
    }

    /// Attach an event sink for emitting analytics events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Stamp emitted events with this node's id.
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    fn emit(&self, mut event: AnalyticsEvent) {
        if let Some(node_id) = &self.node_id {
            event.node_id = node_id.clone();
        }
        self.emit(event);
    }

    /// Stores a graph under `journey_id`, replacing any previous one.
    ///
    /// With strict priorities a graph whose priorities are not dense is
    /// rejected; otherwise it is renumbered and the changes returned.
    pub fn register(
        &self,
        journey_id: &str,
        mut graph: JourneyGraph,
    ) -> BranchingResult<Vec<PriorityUpdate>> {
        let delta = if self.config.strict_priorities {
            graph.check_priorities()?;
            Vec::new()
        } else {
            graph.normalize()
        };
        info!(
            journey_id = %journey_id,
            nodes = graph.nodes.len(),
            branches = graph.branches.len(),
            renumbered = delta.len(),
            "Registered journey graph"
        );
        self.graphs.insert(journey_id.to_string(), graph);
        self.histories.remove(journey_id);
        Ok(delta)
    }

    pub fn get_graph(&self, journey_id: &str) -> Option<JourneyGraph> {
        self.graphs.get(journey_id).map(|r| r.clone())
    }

    pub fn remove(&self, journey_id: &str) -> Option<JourneyGraph> {
        self.histories.remove(journey_id);
        self.graphs.remove(journey_id).map(|(_, graph)| graph)
    }

    pub fn journey_ids(&self) -> Vec<String> {
        self.graphs.iter().map(|r| r.key().clone()).collect()
    }

    /// Picks the branch `contact_id` follows out of `node_id`.
    pub fn route(
        &self,
        journey_id: &str,
        node_id: &str,
        contact_id: &str,
        context: &dyn ContextProvider,
    ) -> BranchingResult<RouteOutcome> {
        let graph = self
            .graphs
            .get(journey_id)
            .ok_or_else(|| BranchingError::JourneyNotFound(journey_id.to_string()))?;

        match graph.select_next(node_id, self.selector.as_ref(), context) {
            Ok(Some(branch)) => {
                info!(
                    journey_id = %journey_id,
                    node_id = %node_id,
                    contact_id = %contact_id,
                    branch_id = %branch.id,
                    priority = branch.priority,
                    "Branch selected"
                );
                self.emit(make_event(
                    EventType::BranchSelected,
                    journey_id,
                    Some(node_id.to_string()),
                    Some(branch.id.clone()),
                    Some(contact_id.to_string()),
                ));
                Ok(RouteOutcome::Follow {
                    branch_id: branch.id.clone(),
                    target_node_id: branch.target_node_id.clone(),
                    priority: branch.priority,
                })
            }
            Ok(None) => {
                info!(
                    journey_id = %journey_id,
                    node_id = %node_id,
                    contact_id = %contact_id,
                    "No branch matched"
                );
                self.emit(make_event(
                    EventType::BranchUnmatched,
                    journey_id,
                    Some(node_id.to_string()),
                    None,
                    Some(contact_id.to_string()),
                ));
                Ok(RouteOutcome::NoMatch)
            }
            Err(err) => {
                let branch_id = match &err {
                    BranchingError::Evaluation { branch_id, .. } => Some(branch_id.clone()),
                    _ => None,
                };
                warn!(
                    journey_id = %journey_id,
                    node_id = %node_id,
                    contact_id = %contact_id,
                    error = %err,
                    "Branch selection failed"
                );
                let mut event = make_event(
                    EventType::BranchEvaluationFailed,
                    journey_id,
                    Some(node_id.to_string()),
                    branch_id,
                    Some(contact_id.to_string()),
                );
                event.detail = Some(err.to_string());
                self.emit(event);
                Err(err)
            }
        }
    }

    /// Applies an edit to a stored graph and records its inverse for undo.
    pub fn apply(
        &self,
        journey_id: &str,
        command: &GraphCommand,
    ) -> BranchingResult<Vec<PriorityUpdate>> {
        self.apply_at(journey_id, command, Utc::now())
    }

    pub fn apply_at(
        &self,
        journey_id: &str,
        command: &GraphCommand,
        now: DateTime<Utc>,
    ) -> BranchingResult<Vec<PriorityUpdate>> {
        let applied = {
            let mut graph = self
                .graphs
                .get_mut(journey_id)
                .ok_or_else(|| BranchingError::JourneyNotFound(journey_id.to_string()))?;
            command.apply(&mut graph)?
        };
        let Some(applied) = applied else {
            return Ok(Vec::new());
        };

        self.histories
            .entry(journey_id.to_string())
            .or_insert_with(|| UndoHistory::from_config(&self.config))
            .record(applied.inverse, now);

        info!(
            journey_id = %journey_id,
            command = command.name(),
            changed = applied.delta.len(),
            "Applied journey edit"
        );
        self.emit(make_event(
            event_type_for(command),
            journey_id,
            None,
            branch_id_of(command),
            None,
        ));
        Ok(applied.delta)
    }

    /// Reverts the most recent edit still inside the undo window.
    ///
    /// `Ok(None)` when there is nothing to undo.
    pub fn undo(&self, journey_id: &str) -> BranchingResult<Option<Vec<PriorityUpdate>>> {
        self.undo_at(journey_id, Utc::now())
    }

    pub fn undo_at(
        &self,
        journey_id: &str,
        now: DateTime<Utc>,
    ) -> BranchingResult<Option<Vec<PriorityUpdate>>> {
        let mut graph = self
            .graphs
            .get_mut(journey_id)
            .ok_or_else(|| BranchingError::JourneyNotFound(journey_id.to_string()))?;
        let Some(mut history) = self.histories.get_mut(journey_id) else {
            return Ok(None);
        };
        let Some(undone) = history.undo(&mut graph, now)? else {
            return Ok(None);
        };
        drop(history);
        drop(graph);

        info!(
            journey_id = %journey_id,
            command = undone.inverse.name(),
            changed = undone.delta.len(),
            "Undid journey edit"
        );
        self.emit(make_event(
            EventType::CommandUndone,
            journey_id,
            None,
            branch_id_of(&undone.inverse),
            None,
        ));
        Ok(Some(undone.delta))
    }
}

fn event_type_for(command: &GraphCommand) -> EventType {
    match command {
        GraphCommand::SetConditions { .. } => EventType::ConditionsUpdated,
        GraphCommand::Move { .. } => EventType::BranchesReordered,
        GraphCommand::Connect { .. } | GraphCommand::RestoreBranch { .. } => {
            EventType::ConnectionCreated
        }
        GraphCommand::RemoveBranch { .. } => EventType::ConnectionRemoved,
    }
}

fn branch_id_of(command: &GraphCommand) -> Option<String> {
    match command {
        GraphCommand::SetConditions { branch_id, .. }
        | GraphCommand::Move { branch_id, .. }
        | GraphCommand::RemoveBranch { branch_id } => Some(branch_id.clone()),
        GraphCommand::RestoreBranch { branch } => Some(branch.id.clone()),
        GraphCommand::Connect { .. } => None,
    }
}
