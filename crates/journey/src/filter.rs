//! Rendering conditions into the backend's query-string filter language,
//! e.g. `filters[surveys][form_id][$eq]=42`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::condition::{
    AdditionalData, Condition, ConditionRule, ConditionType, ConditionValue, Operator, Score,
};
use crate::error::ParseError;
use crate::types::{Branch, Combinator};

/// One `field[operator]=value` term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterClause {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl FilterClause {
    fn new(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    fn render(&self, and_index: Option<usize>) -> String {
        match and_index {
            Some(i) => format!(
                "filters[$and][{}]{}[{}]={}",
                i, self.field, self.operator, self.value
            ),
            None => format!("filters{}[{}]={}", self.field, self.operator, self.value),
        }
    }
}

/// The filter terms a condition stands for. Empty while no value is set.
pub fn clauses(condition: &Condition) -> Vec<FilterClause> {
    let Some(value) = condition.value().filter(|v| !v.is_blank()) else {
        return Vec::new();
    };
    let kind = condition.kind();
    let value = value.key().into_owned();

    match &condition.rule {
        ConditionRule::Action {
            operator,
            external_id: Some(sub),
            ..
        } => vec![
            FilterClause::new(kind.field_path(), *operator, value),
            FilterClause::new(sub.field.clone(), sub.operator, sub.value.clone()),
        ],
        ConditionRule::FormAnswer {
            operator,
            question: Some(question),
            ..
        } if !question.trim().is_empty() => vec![
            FilterClause::new(
                format!("{}[question]", kind.field_path()),
                Operator::Eq,
                question.clone(),
            ),
            FilterClause::new(format!("{}[answer]", kind.field_path()), *operator, value),
        ],
        ConditionRule::DonationTransaction {
            condition_field: Some(field),
            condition_operator,
            ..
        } => vec![FilterClause::new(
            format!("{}{}", kind.field_path(), field.path()),
            condition_operator.unwrap_or(field.default_operator()),
            value,
        )],
        rule => vec![FilterClause::new(kind.field_path(), rule.operator(), value)],
    }
}

/// Renders the ready-to-send filter string, or `None` when the condition has
/// no value yet. Multi-term conditions are joined as `$and` clauses.
pub fn render_filter(condition: &Condition) -> Option<String> {
    match clauses(condition).as_slice() {
        [] => None,
        [single] => Some(single.render(None)),
        many => Some(
            many.iter()
                .enumerate()
                .map(|(i, clause)| clause.render(Some(i)))
                .collect::<Vec<_>>()
                .join("&"),
        ),
    }
}

/// A condition in the shape the backend stores on a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_condition: Option<String>,
    pub condition_operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_value: Option<ConditionValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_data: Option<AdditionalData>,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub scores: Vec<Score>,
}

impl BackendRule {
    pub fn from_condition(condition: &Condition) -> Self {
        let additional_condition = match &condition.rule {
            ConditionRule::Action {
                external_id: Some(sub),
                ..
            } => Some(sub.to_string()),
            _ => None,
        };
        Self {
            // Only conditions already saved carry a numeric `condition-N` id.
            id: condition
                .id
                .strip_prefix("condition-")
                .and_then(|n| n.parse().ok()),
            condition: condition.kind().field_path().to_string(),
            ready_condition: render_filter(condition),
            condition_operator: condition.operator(),
            condition_value: condition.value().cloned(),
            additional_condition,
            additional_data: AdditionalData::from_rule(&condition.rule),
            label: condition.display_label().to_string(),
            scores: condition.scores.clone(),
        }
    }

    /// Rebuilds the editor condition from a stored rule. Saved rules get the
    /// `condition-N` id back; unsaved ones a fresh id.
    pub fn into_condition(self) -> Result<Condition, ParseError> {
        let kind: ConditionType = self.condition.parse()?;
        let mut rule = ConditionRule::empty(kind);
        *rule.operator_mut() = self.condition_operator;
        *rule.value_mut() = self.condition_value;
        if let (ConditionRule::Action { external_id, .. }, Some(sub)) =
            (&mut rule, self.additional_condition.as_deref())
        {
            *external_id = Some(sub.parse()?);
        }
        if let Some(data) = self.additional_data {
            data.fold_into(&mut rule);
        }

        Ok(Condition {
            id: self
                .id
                .map(|n| format!("condition-{}", n))
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            label: self.label,
            rule,
            show_scores: !self.scores.is_empty(),
            scores: self.scores,
        })
    }
}

/// Payload for updating the rules of one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionRules {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<u64>,
    pub branch_id: String,
    pub condition_type: Combinator,
    pub rules: Vec<BackendRule>,
}

pub fn render_branch_filters(branch: &Branch) -> ConnectionRules {
    ConnectionRules {
        connection_id: branch.connection_id,
        branch_id: branch.id.clone(),
        condition_type: branch.condition_type,
        rules: branch
            .conditions
            .iter()
            .map(BackendRule::from_condition)
            .collect(),
    }
}
