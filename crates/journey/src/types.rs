use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Kind of journey step. Constrains which branches may touch the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Trigger,
    SchedulerTrigger,
    Wait,
    Channel,
}

impl NodeKind {
    pub fn is_trigger(self) -> bool {
        matches!(self, NodeKind::Trigger | NodeKind::SchedulerTrigger)
    }
}

/// A journey step, referenced by branches but not owned by them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl JourneyNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            label: None,
        }
    }
}

/// How a branch's conditions combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    /// Every condition must hold.
    #[default]
    All,
    /// At least one condition must hold.
    Any,
}

/// A directed, guarded edge between two journey steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    #[serde(alias = "sourceNodeId")]
    pub source_node_id: String,
    #[serde(alias = "targetNodeId")]
    pub target_node_id: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub condition_type: Combinator,
    /// Evaluation rank among the source's branches, 1 is evaluated first.
    pub priority: u32,
    /// Id of the persisted backend record, once the branch has been saved.
    #[serde(default, alias = "connectionId", skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<u64>,
    /// Set on branches leaving a trigger; such branches are unconditional.
    #[serde(default, alias = "ruleNotAllowed")]
    pub rule_not_allowed: bool,
}

impl Branch {
    /// An unconditional branch with the conventional `e-{source}-{target}` id.
    pub fn new(source: impl Into<String>, target: impl Into<String>, priority: u32) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Self::edge_id(&source, &target),
            source_node_id: source,
            target_node_id: target,
            conditions: Vec::new(),
            condition_type: Combinator::All,
            priority,
            connection_id: None,
            rule_not_allowed: false,
        }
    }

    pub fn edge_id(source: &str, target: &str) -> String {
        format!("e-{}-{}", source, target)
    }

    pub fn with_conditions(mut self, combinator: Combinator, conditions: Vec<Condition>) -> Self {
        self.condition_type = combinator;
        self.conditions = conditions;
        self
    }

    pub fn with_connection_id(mut self, connection_id: u64) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    /// True when the branch matches every contact.
    pub fn is_default_path(&self) -> bool {
        self.rule_not_allowed || self.conditions.is_empty()
    }

    /// Label shown on the edge in the journey editor.
    pub fn summary(&self) -> String {
        match self.conditions.as_slice() {
            [] => "No conditions (click to configure)".to_string(),
            [only] => only.display_label().to_string(),
            many => format!(
                "{} of {} conditions",
                match self.condition_type {
                    Combinator::All => "All",
                    Combinator::Any => "Any",
                },
                many.len()
            ),
        }
    }

    /// One-line description used in the branching priority list.
    pub fn describe(&self) -> String {
        match self.conditions.len() {
            0 => "No conditions (default path)".to_string(),
            n => format!(
                "{} condition{} ({})",
                n,
                if n == 1 { "" } else { "s" },
                match self.condition_type {
                    Combinator::All => "AND",
                    Combinator::Any => "OR",
                }
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::ConditionType;

    #[test]
    fn test_branch_defaults() {
        let branch = Branch::new("wait-1", "channel-2", 1);
        assert_eq!(branch.id, "e-wait-1-channel-2");
        assert_eq!(branch.condition_type, Combinator::All);
        assert!(branch.is_default_path());
        assert_eq!(branch.summary(), "No conditions (click to configure)");
        assert_eq!(branch.describe(), "No conditions (default path)");
    }

    #[test]
    fn test_summary_labels() {
        let one = Branch::new("a", "b", 1).with_conditions(
            Combinator::All,
            vec![Condition::new(ConditionType::FormAnswer)],
        );
        assert_eq!(one.summary(), "Form Answer");
        assert_eq!(one.describe(), "1 condition (AND)");

        let many = Branch::new("a", "c", 2).with_conditions(
            Combinator::Any,
            vec![
                Condition::new(ConditionType::Action),
                Condition::new(ConditionType::FormCompleted),
            ],
        );
        assert_eq!(many.summary(), "Any of 2 conditions");
        assert_eq!(many.describe(), "2 conditions (OR)");
    }

    #[test]
    fn test_deserialize_camel_case_edge() {
        let json = serde_json::json!({
            "id": "e-trigger-1-wait-2",
            "sourceNodeId": "trigger-1",
            "targetNodeId": "wait-2",
            "priority": 1,
            "connectionId": 88,
            "ruleNotAllowed": true
        });
        let branch: Branch = serde_json::from_value(json).unwrap();
        assert_eq!(branch.connection_id, Some(88));
        assert!(branch.rule_not_allowed);
        assert!(branch.conditions.is_empty());
        assert_eq!(branch.condition_type, Combinator::All);
    }

    #[test]
    fn test_node_kind_wire_names() {
        let node: JourneyNode =
            serde_json::from_value(serde_json::json!({"id": "n1", "type": "scheduler-trigger"}))
                .unwrap();
        assert!(node.kind.is_trigger());
        assert!(!NodeKind::Channel.is_trigger());
    }
}
