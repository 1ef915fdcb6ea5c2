use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Analytics event emitted while contacts are routed through journeys and
/// while editors reshape a journey's branches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub journey_id: String,
    pub step_id: Option<String>,
    pub branch_id: Option<String>,
    pub contact_id: Option<String>,
    pub detail: Option<String>,
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    // Routing events
    BranchSelected,
    BranchUnmatched,
    BranchEvaluationFailed,
    // Editing events
    BranchesReordered,
    ConditionsUpdated,
    ConnectionCreated,
    ConnectionRemoved,
    CommandUndone,
}

impl EventType {
    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::BranchSelected => "branch_selected",
            EventType::BranchUnmatched => "branch_unmatched",
            EventType::BranchEvaluationFailed => "branch_evaluation_failed",
            EventType::BranchesReordered => "branches_reordered",
            EventType::ConditionsUpdated => "conditions_updated",
            EventType::ConnectionCreated => "connection_created",
            EventType::ConnectionRemoved => "connection_removed",
            EventType::CommandUndone => "command_undone",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_name_matches_serde() {
        for event_type in [
            EventType::BranchSelected,
            EventType::BranchEvaluationFailed,
            EventType::BranchesReordered,
            EventType::CommandUndone,
        ] {
            let json = serde_json::to_value(event_type).unwrap();
            assert_eq!(json, serde_json::Value::String(event_type.as_str().into()));
        }
    }
}
