use tracing::debug;

use crate::condition::{
    Condition, ConditionRule, ConditionValue, DonationField, Operator, SubMatch,
};
use crate::context::{ActionRecord, ContextProvider};
use crate::error::ConditionError;

/// Evaluates one condition against one contact context.
pub trait Evaluate {
    fn evaluate(
        &self,
        condition: &Condition,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError>;
}

impl<E: Evaluate + ?Sized> Evaluate for &E {
    fn evaluate(
        &self,
        condition: &Condition,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError> {
        (**self).evaluate(condition, context)
    }
}

/// Default evaluator implementing the per-type condition semantics.
#[derive(Debug, Clone)]
pub struct ConditionEvaluator {
    journey_finished_action: String,
}

impl ConditionEvaluator {
    /// Creates an evaluator that recognises `journey_finished` actions.
    pub fn new() -> Self {
        Self {
            journey_finished_action: "journey_finished".to_string(),
        }
    }

    /// Overrides the action type that marks a finished journey.
    pub fn with_journey_finished_action(mut self, action_type: impl Into<String>) -> Self {
        self.journey_finished_action = action_type.into();
        self
    }

    // ------------------------------------------------------------------
    // Per-type semantics
    // ------------------------------------------------------------------

    fn form_completed(
        &self,
        condition: &Condition,
        value: Option<&ConditionValue>,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError> {
        let form_id = required_value(condition, value)?;
        let forms = section(condition, context.completed_forms(), "completed_forms")?;
        Ok(forms.iter().any(|form| form.form_id == form_id.key()))
    }

    fn action(
        &self,
        condition: &Condition,
        operator: Operator,
        value: Option<&ConditionValue>,
        external_id: Option<&SubMatch>,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError> {
        let action_type = required_value(condition, value)?;
        let sub_match = match external_id {
            Some(sub) if sub.targets_external_id() => {
                if !sub.operator.is_equality() {
                    return Err(unsupported(condition, sub.operator));
                }
                Some(sub)
            }
            _ => None,
        };
        let actions = section(condition, context.actions(), "actions")?;

        let key = action_type.key();
        let found = actions.iter().any(|action| {
            action.action_type.eq_ignore_ascii_case(&key)
                && sub_match.map_or(true, |sub| external_id_matches(sub, action))
        });
        Ok(found != operator.is_negated())
    }

    fn journey_finished(
        &self,
        condition: &Condition,
        value: Option<&ConditionValue>,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError> {
        let journey_id = required_value(condition, value)?;
        let actions = section(condition, context.actions(), "actions")?;
        let key = journey_id.key();
        Ok(actions.iter().any(|action| {
            action
                .action_type
                .eq_ignore_ascii_case(&self.journey_finished_action)
                && action.external_id.as_deref() == Some(key.as_ref())
        }))
    }

    fn form_answer(
        &self,
        condition: &Condition,
        operator: Operator,
        question: Option<&str>,
        value: Option<&ConditionValue>,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError> {
        let question = question
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| incomplete(condition, "question"))?;
        let expected = required_value(condition, value)?;
        let answers = section(condition, context.survey_answers(), "survey_answers")?;

        // Questions are matched by label, not id.
        let expected = expected.key();
        let found = answers.iter().any(|answer| {
            answer.question.trim().eq_ignore_ascii_case(question.trim())
                && answer.answer.trim().eq_ignore_ascii_case(expected.trim())
        });
        Ok(found != operator.is_negated())
    }

    fn donation(
        &self,
        condition: &Condition,
        field: Option<DonationField>,
        field_operator: Option<Operator>,
        value: Option<&ConditionValue>,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError> {
        let field = field.ok_or_else(|| incomplete(condition, "condition_field"))?;
        let field_operator = field_operator.unwrap_or(field.default_operator());
        if !field.allowed_operators().contains(&field_operator) {
            return Err(unsupported(condition, field_operator));
        }
        let expected = required_value(condition, value)?;

        match field {
            DonationField::CampaignName => {
                let donations = section(condition, context.donations(), "donations")?;
                let key = expected.key();
                Ok(donations
                    .iter()
                    .any(|donation| donation.campaign_name.eq_ignore_ascii_case(&key)))
            }
            DonationField::Amount => {
                let threshold =
                    expected
                        .as_number()
                        .ok_or_else(|| ConditionError::InvalidNumericValue {
                            condition_id: condition.id.clone(),
                            value: expected.key().into_owned(),
                        })?;
                let donations = section(condition, context.donations(), "donations")?;
                Ok(donations.iter().any(|donation| match field_operator {
                    Operator::Lte => donation.amount <= threshold,
                    _ => donation.amount >= threshold,
                }))
            }
        }
    }
}

impl Evaluate for ConditionEvaluator {
    fn evaluate(
        &self,
        condition: &Condition,
        context: &dyn ContextProvider,
    ) -> Result<bool, ConditionError> {
        let kind = condition.kind();
        let operator = condition.operator();
        if !kind.supports(operator) {
            return Err(unsupported(condition, operator));
        }

        let matched = match &condition.rule {
            ConditionRule::FormCompleted { value, .. } => {
                self.form_completed(condition, value.as_ref(), context)?
            }
            ConditionRule::Action {
                value, external_id, ..
            } => self.action(
                condition,
                operator,
                value.as_ref(),
                external_id.as_ref(),
                context,
            )?,
            ConditionRule::JourneyFinished { value, .. } => {
                self.journey_finished(condition, value.as_ref(), context)?
            }
            ConditionRule::FormAnswer {
                question, value, ..
            } => self.form_answer(
                condition,
                operator,
                question.as_deref(),
                value.as_ref(),
                context,
            )?,
            ConditionRule::DonationTransaction {
                condition_field,
                condition_operator,
                value,
                ..
            } => self.donation(
                condition,
                *condition_field,
                *condition_operator,
                value.as_ref(),
                context,
            )?,
        };

        debug!(
            condition_id = %condition.id,
            kind = %kind,
            matched,
            "Evaluated condition"
        );
        Ok(matched)
    }
}

impl Default for ConditionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------------------------------------------------
// Internal helpers
// ------------------------------------------------------------------

fn unsupported(condition: &Condition, operator: Operator) -> ConditionError {
    ConditionError::UnsupportedOperator {
        condition_id: condition.id.clone(),
        kind: condition.kind(),
        operator,
    }
}

fn incomplete(condition: &Condition, field: &'static str) -> ConditionError {
    ConditionError::IncompleteCondition {
        condition_id: condition.id.clone(),
        field,
    }
}

fn required_value<'a>(
    condition: &Condition,
    value: Option<&'a ConditionValue>,
) -> Result<&'a ConditionValue, ConditionError> {
    value
        .filter(|v| !v.is_blank())
        .ok_or_else(|| incomplete(condition, "value"))
}

fn section<'a, T>(
    condition: &Condition,
    records: Option<&'a [T]>,
    field: &'static str,
) -> Result<&'a [T], ConditionError> {
    records.ok_or_else(|| ConditionError::MissingContextField {
        condition_id: condition.id.clone(),
        field,
    })
}

fn external_id_matches(sub: &SubMatch, action: &ActionRecord) -> bool {
    let equal = action.external_id.as_deref().map_or(false, |id| {
        if sub.operator.is_case_insensitive() {
            id.eq_ignore_ascii_case(&sub.value)
        } else {
            id == sub.value
        }
    });
    equal != sub.operator.is_negated()
}
