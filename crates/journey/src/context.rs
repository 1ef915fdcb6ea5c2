//! Per-contact evaluation context.
//!
//! Each accessor returns `None` when the contact record does not carry that
//! section at all, and a (possibly empty) slice when it does.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Read access to the contact data conditions are evaluated against.
pub trait ContextProvider {
    fn completed_forms(&self) -> Option<&[FormCompletion]>;
    fn actions(&self) -> Option<&[ActionRecord]>;
    fn survey_answers(&self) -> Option<&[SurveyAnswer]>;
    fn donations(&self) -> Option<&[DonationRecord]>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormCompletion {
    #[serde(deserialize_with = "string_or_number")]
    pub form_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub action_type: String,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyAnswer {
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub form_id: Option<String>,
    /// Question label as shown to the contact.
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationRecord {
    pub campaign_name: String,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Plain in-memory context, typically deserialized from the contact API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_forms: Option<Vec<FormCompletion>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<ActionRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub survey_answers: Option<Vec<SurveyAnswer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donations: Option<Vec<DonationRecord>>,
}

impl ContactContext {
    pub fn new(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: Some(contact_id.into()),
            ..Self::default()
        }
    }

    /// Context where every section is present but empty.
    pub fn empty_sections(contact_id: impl Into<String>) -> Self {
        Self {
            contact_id: Some(contact_id.into()),
            completed_forms: Some(Vec::new()),
            actions: Some(Vec::new()),
            survey_answers: Some(Vec::new()),
            donations: Some(Vec::new()),
        }
    }

    pub fn with_completed_form(mut self, form_id: impl Into<String>) -> Self {
        self.completed_forms
            .get_or_insert_with(Vec::new)
            .push(FormCompletion {
                form_id: form_id.into(),
                completed_at: None,
            });
        self
    }

    pub fn with_action(mut self, action_type: impl Into<String>, external_id: Option<&str>) -> Self {
        self.actions.get_or_insert_with(Vec::new).push(ActionRecord {
            action_type: action_type.into(),
            external_id: external_id.map(str::to_string),
            occurred_at: None,
        });
        self
    }

    pub fn with_answer(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.survey_answers
            .get_or_insert_with(Vec::new)
            .push(SurveyAnswer {
                form_id: None,
                question: question.into(),
                answer: answer.into(),
            });
        self
    }

    pub fn with_donation(mut self, campaign_name: impl Into<String>, amount: f64) -> Self {
        self.donations.get_or_insert_with(Vec::new).push(DonationRecord {
            campaign_name: campaign_name.into(),
            amount,
            occurred_at: None,
        });
        self
    }
}

impl ContextProvider for ContactContext {
    fn completed_forms(&self) -> Option<&[FormCompletion]> {
        self.completed_forms.as_deref()
    }

    fn actions(&self) -> Option<&[ActionRecord]> {
        self.actions.as_deref()
    }

    fn survey_answers(&self) -> Option<&[SurveyAnswer]> {
        self.survey_answers.as_deref()
    }

    fn donations(&self) -> Option<&[DonationRecord]> {
        self.donations.as_deref()
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(D::Error::custom(format!(
            "expected a string or number identifier, found {}",
            other
        ))),
    }
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(D::Error::custom(format!(
            "expected a string or number identifier, found {}",
            other
        ))),
    }
}
