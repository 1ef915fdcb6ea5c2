//! Condition model: one predicate guarding a journey branch.
//!
//! A condition is stored as a tagged union: each condition type carries only
//! the fields it can use, so switching type rebuilds the rule from scratch
//! instead of clearing stale fields one by one.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{BranchingError, BranchingResult, ConditionError, ParseError};

/// Backend field path of an action's external id, used by sub-matches.
pub const EXTERNAL_ID_FIELD: &str = "[actions][external_id]";

/// Which family of contact data a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    #[serde(alias = "[surveys][form_id]")]
    FormCompleted,
    #[serde(alias = "[actions][action_type]")]
    Action,
    #[serde(alias = "[actions][external_id]")]
    JourneyFinished,
    #[serde(alias = "[surveys][survey_items]")]
    FormAnswer,
    #[serde(alias = "[donation_transactions]")]
    DonationTransaction,
}

impl ConditionType {
    pub const ALL: &'static [ConditionType] = &[
        Self::FormCompleted,
        Self::Action,
        Self::JourneyFinished,
        Self::FormAnswer,
        Self::DonationTransaction,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionType::FormCompleted => "form_completed",
            ConditionType::Action => "action",
            ConditionType::JourneyFinished => "journey_finished",
            ConditionType::FormAnswer => "form_answer",
            ConditionType::DonationTransaction => "donation_transaction",
        }
    }

    /// Default human-readable label shown on the branch.
    pub fn label(self) -> &'static str {
        match self {
            ConditionType::FormCompleted => "Form Completed",
            ConditionType::Action => "Actions",
            ConditionType::JourneyFinished => "Journey Finished",
            ConditionType::FormAnswer => "Form Answer",
            ConditionType::DonationTransaction => "Donation transaction",
        }
    }

    /// Field path the backend filters on for this type.
    pub fn field_path(self) -> &'static str {
        match self {
            ConditionType::FormCompleted => "[surveys][form_id]",
            ConditionType::Action => "[actions][action_type]",
            ConditionType::JourneyFinished => EXTERNAL_ID_FIELD,
            ConditionType::FormAnswer => "[surveys][survey_items]",
            ConditionType::DonationTransaction => "[donation_transactions]",
        }
    }

    pub fn default_operator(self) -> Operator {
        match self {
            ConditionType::Action | ConditionType::FormAnswer => Operator::Eqi,
            ConditionType::FormCompleted
            | ConditionType::JourneyFinished
            | ConditionType::DonationTransaction => Operator::Eq,
        }
    }

    /// Operators accepted in the condition's main `operator` slot.
    pub fn allowed_operators(self) -> &'static [Operator] {
        match self {
            ConditionType::Action | ConditionType::FormAnswer => &[Operator::Eqi, Operator::Nei],
            ConditionType::FormCompleted
            | ConditionType::JourneyFinished
            | ConditionType::DonationTransaction => &[Operator::Eq],
        }
    }

    pub fn supports(self, operator: Operator) -> bool {
        self.allowed_operators().contains(&operator)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = ParseError;

    /// Accepts both the snake_case name and the legacy backend field path.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s || kind.field_path() == s)
            .ok_or_else(|| ParseError::UnknownConditionType(s.to_string()))
    }
}

/// Comparison operator vocabulary shared with the backend filter language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "$eq")]
    Eq,
    #[serde(rename = "$ne")]
    Ne,
    #[serde(rename = "$eqi")]
    Eqi,
    #[serde(rename = "$nei")]
    Nei,
    #[serde(rename = "$lt")]
    Lt,
    #[serde(rename = "$lte")]
    Lte,
    #[serde(rename = "$gt")]
    Gt,
    #[serde(rename = "$gte")]
    Gte,
}

impl Operator {
    pub const ALL: &'static [Operator] = &[
        Self::Eq,
        Self::Ne,
        Self::Eqi,
        Self::Nei,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "$eq",
            Operator::Ne => "$ne",
            Operator::Eqi => "$eqi",
            Operator::Nei => "$nei",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
        }
    }

    pub fn is_negated(self) -> bool {
        matches!(self, Operator::Ne | Operator::Nei)
    }

    pub fn is_case_insensitive(self) -> bool {
        matches!(self, Operator::Eqi | Operator::Nei)
    }

    /// `$eq`, `$ne` and their case-insensitive forms.
    pub fn is_equality(self) -> bool {
        matches!(self, Operator::Eq | Operator::Ne | Operator::Eqi | Operator::Nei)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ParseError::UnknownOperator(s.to_string()))
    }
}

/// A `{label, value}` pair picked from a lookup list (a form, an action type).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledValue {
    pub label: String,
    pub value: String,
}

/// Payload a condition compares against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
    Labeled(LabeledValue),
}

impl ConditionValue {
    /// The comparable key: the `value` half of a labeled pair, the text, or
    /// the number without a trailing `.0`.
    ///
    /// Labeled pairs that were stored JSON-encoded inside a string are
    /// unwrapped as well.
    pub fn key(&self) -> Cow<'_, str> {
        match self {
            ConditionValue::Number(n) => Cow::Owned(format_number(*n)),
            ConditionValue::Labeled(pair) => Cow::Borrowed(&pair.value),
            ConditionValue::Text(text) => {
                if text.trim_start().starts_with('{') {
                    if let Ok(pair) = serde_json::from_str::<LabeledValue>(text) {
                        return Cow::Owned(pair.value);
                    }
                }
                Cow::Borrowed(text)
            }
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ConditionValue::Number(n) => Some(*n),
            _ => self.key().trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            ConditionValue::Number(_) => false,
            _ => self.key().trim().is_empty(),
        }
    }
}

impl From<&str> for ConditionValue {
    fn from(value: &str) -> Self {
        ConditionValue::Text(value.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(value: String) -> Self {
        ConditionValue::Text(value)
    }
}

impl From<f64> for ConditionValue {
    fn from(value: f64) -> Self {
        ConditionValue::Number(value)
    }
}

impl From<LabeledValue> for ConditionValue {
    fn from(value: LabeledValue) -> Self {
        ConditionValue::Labeled(value)
    }
}

pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Nested `field/operator/value` predicate attached to a condition, e.g.
/// `[actions][external_id]/$eqi/newsletter-7`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubMatch {
    pub field: String,
    pub operator: Operator,
    pub value: String,
}

impl SubMatch {
    pub fn external_id(operator: Operator, value: impl Into<String>) -> Self {
        Self {
            field: EXTERNAL_ID_FIELD.to_string(),
            operator,
            value: value.into(),
        }
    }

    pub fn targets_external_id(&self) -> bool {
        self.field == EXTERNAL_ID_FIELD
    }
}

impl FromStr for SubMatch {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, '/');
        let (Some(field), Some(operator), Some(value)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseError::MalformedSubMatch(s.to_string()));
        };
        if field.is_empty() {
            return Err(ParseError::MalformedSubMatch(s.to_string()));
        }
        // Editors that never picked an operator stored an empty slot.
        let operator = if operator.is_empty() {
            Operator::Eqi
        } else {
            operator.parse()?
        };
        Ok(Self {
            field: field.to_string(),
            operator,
            value: value.to_string(),
        })
    }
}

impl TryFrom<String> for SubMatch {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SubMatch> for String {
    fn from(value: SubMatch) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SubMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.field, self.operator, self.value)
    }
}

/// Donation attribute a donation condition compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DonationField {
    #[serde(rename = "[campaign_name]")]
    CampaignName,
    // The backend spells this path `ammount`.
    #[serde(rename = "[ammount]", alias = "[amount]")]
    Amount,
}

impl DonationField {
    /// Parses a backend path such as `[ammount]`. Other paths yield `None`.
    pub fn from_path(path: &str) -> Option<Self> {
        match path {
            "[campaign_name]" => Some(DonationField::CampaignName),
            "[ammount]" | "[amount]" => Some(DonationField::Amount),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            DonationField::CampaignName => "[campaign_name]",
            DonationField::Amount => "[ammount]",
        }
    }

    pub fn default_operator(self) -> Operator {
        match self {
            DonationField::CampaignName => Operator::Eqi,
            DonationField::Amount => Operator::Lte,
        }
    }

    pub fn allowed_operators(self) -> &'static [Operator] {
        match self {
            DonationField::CampaignName => &[Operator::Eqi],
            DonationField::Amount => &[Operator::Lte, Operator::Gte],
        }
    }
}

/// The type-specific part of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionRule {
    /// Contact completed the form whose id is `value`.
    #[serde(alias = "[surveys][form_id]")]
    FormCompleted {
        operator: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ConditionValue>,
    },
    /// Contact has (or has not) an action of type `value`, optionally
    /// narrowed by an external-id sub-match.
    #[serde(alias = "[actions][action_type]")]
    Action {
        operator: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ConditionValue>,
        #[serde(
            default,
            rename = "additional_condition",
            alias = "additionalCondition",
            skip_serializing_if = "Option::is_none"
        )]
        external_id: Option<SubMatch>,
    },
    /// Contact finished the journey whose id is `value`.
    #[serde(alias = "[actions][external_id]")]
    JourneyFinished {
        operator: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ConditionValue>,
    },
    /// Contact's answer to the question labeled `question` matches `value`.
    /// `question_id` is kept for the editor; matching goes by label.
    #[serde(alias = "[surveys][survey_items]")]
    FormAnswer {
        operator: Operator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        form: Option<LabeledValue>,
        #[serde(default, alias = "questionLabel", skip_serializing_if = "Option::is_none")]
        question: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        question_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ConditionValue>,
    },
    /// A donation's campaign name or amount matches `value`.
    #[serde(alias = "[donation_transactions]")]
    DonationTransaction {
        operator: Operator,
        #[serde(default, alias = "conditionField", skip_serializing_if = "Option::is_none")]
        condition_field: Option<DonationField>,
        #[serde(
            default,
            alias = "conditionOperator",
            skip_serializing_if = "Option::is_none"
        )]
        condition_operator: Option<Operator>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<ConditionValue>,
    },
}

impl ConditionRule {
    /// A fresh rule for `kind` with the default operator and nothing else set.
    pub fn empty(kind: ConditionType) -> Self {
        let operator = kind.default_operator();
        match kind {
            ConditionType::FormCompleted => ConditionRule::FormCompleted {
                operator,
                value: None,
            },
            ConditionType::Action => ConditionRule::Action {
                operator,
                value: None,
                external_id: None,
            },
            ConditionType::JourneyFinished => ConditionRule::JourneyFinished {
                operator,
                value: None,
            },
            ConditionType::FormAnswer => ConditionRule::FormAnswer {
                operator,
                form: None,
                question: None,
                question_id: None,
                value: None,
            },
            ConditionType::DonationTransaction => ConditionRule::DonationTransaction {
                operator,
                condition_field: None,
                condition_operator: None,
                value: None,
            },
        }
    }

    pub fn kind(&self) -> ConditionType {
        match self {
            ConditionRule::FormCompleted { .. } => ConditionType::FormCompleted,
            ConditionRule::Action { .. } => ConditionType::Action,
            ConditionRule::JourneyFinished { .. } => ConditionType::JourneyFinished,
            ConditionRule::FormAnswer { .. } => ConditionType::FormAnswer,
            ConditionRule::DonationTransaction { .. } => ConditionType::DonationTransaction,
        }
    }

    pub fn operator(&self) -> Operator {
        match self {
            ConditionRule::FormCompleted { operator, .. }
            | ConditionRule::Action { operator, .. }
            | ConditionRule::JourneyFinished { operator, .. }
            | ConditionRule::FormAnswer { operator, .. }
            | ConditionRule::DonationTransaction { operator, .. } => *operator,
        }
    }

    pub fn value(&self) -> Option<&ConditionValue> {
        match self {
            ConditionRule::FormCompleted { value, .. }
            | ConditionRule::Action { value, .. }
            | ConditionRule::JourneyFinished { value, .. }
            | ConditionRule::FormAnswer { value, .. }
            | ConditionRule::DonationTransaction { value, .. } => value.as_ref(),
        }
    }

    pub(crate) fn operator_mut(&mut self) -> &mut Operator {
        match self {
            ConditionRule::FormCompleted { operator, .. }
            | ConditionRule::Action { operator, .. }
            | ConditionRule::JourneyFinished { operator, .. }
            | ConditionRule::FormAnswer { operator, .. }
            | ConditionRule::DonationTransaction { operator, .. } => operator,
        }
    }

    pub(crate) fn value_mut(&mut self) -> &mut Option<ConditionValue> {
        match self {
            ConditionRule::FormCompleted { value, .. }
            | ConditionRule::Action { value, .. }
            | ConditionRule::JourneyFinished { value, .. }
            | ConditionRule::FormAnswer { value, .. }
            | ConditionRule::DonationTransaction { value, .. } => value,
        }
    }
}

/// Type-specific fields the editor keeps under `additional_data`.
///
/// Backend rules only carry this map, so it is the persisted home of the
/// donation field choice and the form-answer question.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalData {
    #[serde(
        default,
        rename = "conditionField",
        alias = "condition_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition_field: Option<String>,
    #[serde(
        default,
        rename = "conditionOperator",
        alias = "condition_operator",
        skip_serializing_if = "Option::is_none"
    )]
    pub condition_operator: Option<Operator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form: Option<LabeledValue>,
    #[serde(
        default,
        rename = "formAnswer",
        alias = "form_answer",
        skip_serializing_if = "Option::is_none"
    )]
    pub form_answer: Option<LabeledValue>,
}

impl AdditionalData {
    /// The extension data `rule` needs to be rebuilt from a backend rule.
    /// `None` for types that keep everything in the main fields.
    pub fn from_rule(rule: &ConditionRule) -> Option<Self> {
        match rule {
            ConditionRule::FormAnswer {
                form,
                question,
                question_id,
                ..
            } => {
                if form.is_none() && question.is_none() && question_id.is_none() {
                    return None;
                }
                let form_answer = (question.is_some() || question_id.is_some()).then(|| {
                    LabeledValue {
                        label: question.clone().unwrap_or_default(),
                        value: question_id.clone().unwrap_or_default(),
                    }
                });
                Some(Self {
                    condition_field: Some("[question]".to_string()),
                    condition_operator: Some(Operator::Eq),
                    form: form.clone(),
                    form_answer,
                })
            }
            ConditionRule::DonationTransaction {
                condition_field,
                condition_operator,
                ..
            } if condition_field.is_some() || condition_operator.is_some() => Some(Self {
                condition_field: condition_field.map(|field| field.path().to_string()),
                condition_operator: *condition_operator,
                form: None,
                form_answer: None,
            }),
            _ => None,
        }
    }

    /// Fills the rule fields that are still unset from this map.
    pub fn fold_into(self, rule: &mut ConditionRule) {
        match rule {
            ConditionRule::FormAnswer {
                form,
                question,
                question_id,
                ..
            } => {
                if form.is_none() {
                    *form = self.form;
                }
                if let Some(answer) = self.form_answer {
                    if question.is_none() {
                        *question = Some(answer.label).filter(|q| !q.is_empty());
                    }
                    if question_id.is_none() {
                        *question_id = Some(answer.value).filter(|id| !id.is_empty());
                    }
                }
            }
            ConditionRule::DonationTransaction {
                condition_field,
                condition_operator,
                ..
            } => {
                if condition_field.is_none() {
                    *condition_field = self
                        .condition_field
                        .as_deref()
                        .and_then(DonationField::from_path);
                }
                if condition_operator.is_none() {
                    *condition_operator = self.condition_operator;
                }
            }
            _ => {}
        }
    }
}

/// `additional_data` arrives either as an object or JSON-encoded in a string.
fn lenient_additional_data<'de, D>(deserializer: D) -> Result<Option<AdditionalData>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(text) if text.trim().is_empty() => Ok(None),
        serde_json::Value::String(text) => serde_json::from_str(&text).map_err(D::Error::custom),
        other => serde_json::from_value(other).map_err(D::Error::custom),
    }
}

/// Auxiliary scoring side effect applied when a condition is used.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Score {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub attribute: String,
    pub value: String,
}

/// A single predicate attached to a branch.
///
/// All operations are functional updates: they leave `self` untouched and
/// return the edited copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConditionWire")]
pub struct Condition {
    pub id: String,
    pub label: String,
    #[serde(flatten)]
    pub rule: ConditionRule,
    pub scores: Vec<Score>,
    pub show_scores: bool,
}

#[derive(Deserialize)]
struct ConditionWire {
    #[serde(default = "fresh_id")]
    id: String,
    #[serde(default)]
    label: String,
    #[serde(flatten)]
    rule: ConditionRule,
    #[serde(default)]
    scores: Vec<Score>,
    #[serde(default, alias = "showScores")]
    show_scores: bool,
    #[serde(default, deserialize_with = "lenient_additional_data")]
    additional_data: Option<AdditionalData>,
}

impl From<ConditionWire> for Condition {
    fn from(wire: ConditionWire) -> Self {
        let mut rule = wire.rule;
        if let Some(data) = wire.additional_data {
            data.fold_into(&mut rule);
        }
        Self {
            id: wire.id,
            label: wire.label,
            rule,
            scores: wire.scores,
            show_scores: wire.show_scores,
        }
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

impl Condition {
    /// Creates an empty condition of `kind` with a fresh id.
    pub fn new(kind: ConditionType) -> Self {
        Self {
            id: fresh_id(),
            label: kind.label().to_string(),
            rule: ConditionRule::empty(kind),
            scores: Vec::new(),
            show_scores: false,
        }
    }

    pub fn kind(&self) -> ConditionType {
        self.rule.kind()
    }

    pub fn operator(&self) -> Operator {
        self.rule.operator()
    }

    pub fn value(&self) -> Option<&ConditionValue> {
        self.rule.value()
    }

    /// Label to display, falling back to the type's default label.
    pub fn display_label(&self) -> &str {
        if self.label.is_empty() {
            self.kind().label()
        } else {
            &self.label
        }
    }

    /// Rebuilds the condition as `kind`, keeping only its id. Value, scores
    /// and every type-specific field start over.
    pub fn change_type(&self, kind: ConditionType) -> Self {
        Self {
            id: self.id.clone(),
            label: kind.label().to_string(),
            rule: ConditionRule::empty(kind),
            scores: Vec::new(),
            show_scores: false,
        }
    }

    pub fn with_operator(&self, operator: Operator) -> Self {
        let mut next = self.clone();
        *next.rule.operator_mut() = operator;
        next
    }

    pub fn with_value(&self, value: impl Into<ConditionValue>) -> Self {
        let mut next = self.clone();
        *next.rule.value_mut() = Some(value.into());
        next
    }

    pub fn with_rule(&self, rule: ConditionRule) -> Self {
        let mut next = self.clone();
        if rule.kind() != self.kind() {
            next.label = rule.kind().label().to_string();
        }
        next.rule = rule;
        next
    }

    /// Appends an empty score entry and shows the score list.
    pub fn add_score(&self) -> Self {
        let mut next = self.clone();
        next.scores.push(Score::default());
        next.show_scores = true;
        next
    }

    /// Removes the score at `index`; hides the list once it is empty.
    pub fn remove_score(&self, index: usize) -> BranchingResult<Self> {
        if index >= self.scores.len() {
            return Err(BranchingError::IndexOutOfRange {
                index,
                len: self.scores.len(),
            });
        }
        let mut next = self.clone();
        next.scores.remove(index);
        if next.scores.is_empty() {
            next.show_scores = false;
        }
        Ok(next)
    }

    /// Authoring-time check of operator choices and numeric values.
    ///
    /// Incomplete conditions (no value picked yet) pass; they only fail
    /// once evaluated.
    pub fn validate(&self) -> Result<(), ConditionError> {
        let kind = self.kind();
        let operator = self.operator();
        if !kind.supports(operator) {
            return Err(ConditionError::UnsupportedOperator {
                condition_id: self.id.clone(),
                kind,
                operator,
            });
        }

        match &self.rule {
            ConditionRule::Action {
                external_id: Some(sub),
                ..
            } if sub.targets_external_id() => {
                if sub.operator.is_equality() {
                    Ok(())
                } else {
                    Err(ConditionError::UnsupportedOperator {
                        condition_id: self.id.clone(),
                        kind,
                        operator: sub.operator,
                    })
                }
            }
            ConditionRule::DonationTransaction {
                condition_field: Some(field),
                condition_operator,
                value,
                ..
            } => {
                let field_operator = condition_operator.unwrap_or(field.default_operator());
                if !field.allowed_operators().contains(&field_operator) {
                    return Err(ConditionError::UnsupportedOperator {
                        condition_id: self.id.clone(),
                        kind,
                        operator: field_operator,
                    });
                }
                match (field, value) {
                    (DonationField::Amount, Some(value)) if value.as_number().is_none() => {
                        Err(ConditionError::InvalidNumericValue {
                            condition_id: self.id.clone(),
                            value: value.key().into_owned(),
                        })
                    }
                    _ => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}
