//! Branch selection: the first branch, in priority order, whose conditions
//! hold for a contact.

use tracing::{debug, warn};

use crate::condition::Condition;
use crate::context::ContextProvider;
use crate::error::{BranchingError, BranchingResult};
use crate::evaluator::{ConditionEvaluator, Evaluate};
use crate::types::{Branch, Combinator};

/// Picks the branch a contact follows out of a step.
#[derive(Debug, Clone, Default)]
pub struct BranchSelector<E = ConditionEvaluator> {
    evaluator: E,
}

impl BranchSelector<ConditionEvaluator> {
    pub fn new() -> Self {
        Self {
            evaluator: ConditionEvaluator::new(),
        }
    }
}

impl<E: Evaluate> BranchSelector<E> {
    pub fn with_evaluator(evaluator: E) -> Self {
        Self { evaluator }
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Returns the lowest-priority-number branch that matches, or `None` when
    /// nothing matches. Branches with equal priority keep slice order.
    ///
    /// An evaluation error aborts selection: later branches are not tried.
    pub fn select<'a, I>(
        &self,
        branches: I,
        context: &dyn ContextProvider,
    ) -> BranchingResult<Option<&'a Branch>>
    where
        I: IntoIterator<Item = &'a Branch>,
    {
        let mut ordered: Vec<&'a Branch> = branches.into_iter().collect();
        ordered.sort_by_key(|b| b.priority);

        for branch in ordered {
            if self.matches(branch, context)? {
                debug!(branch_id = %branch.id, priority = branch.priority, "Branch matched");
                return Ok(Some(branch));
            }
        }
        Ok(None)
    }

    /// Whether `branch` admits the contact.
    ///
    /// Branches without conditions, and branches leaving a trigger, always
    /// match. Otherwise conditions are checked in order and evaluation stops
    /// as soon as the combinator's outcome is known.
    pub fn matches(&self, branch: &Branch, context: &dyn ContextProvider) -> BranchingResult<bool> {
        if branch.is_default_path() {
            return Ok(true);
        }

        let check = |condition: &Condition| {
            self.evaluator.evaluate(condition, context).map_err(|source| {
                warn!(
                    branch_id = %branch.id,
                    condition_id = %source.condition_id(),
                    error = %source,
                    "Condition evaluation failed"
                );
                BranchingError::Evaluation {
                    branch_id: branch.id.clone(),
                    condition_id: source.condition_id().to_string(),
                    source,
                }
            })
        };

        match branch.condition_type {
            Combinator::All => {
                for condition in &branch.conditions {
                    if !check(condition)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Combinator::Any => {
                for condition in &branch.conditions {
                    if check(condition)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{ConditionType, Operator};
    use crate::context::ContactContext;
    use crate::error::ConditionError;

    fn form(id: &str) -> Condition {
        Condition::new(ConditionType::FormCompleted).with_value(id)
    }

    #[test]
    fn test_first_match_by_priority() {
        let selector = BranchSelector::new();
        let branches = vec![
            Branch::new("s", "fallback", 2),
            Branch::new("s", "completed", 1).with_conditions(Combinator::All, vec![form("42")]),
        ];

        let done = ContactContext::new("c").with_completed_form("42");
        let picked = selector.select(&branches, &done).unwrap().unwrap();
        assert_eq!(picked.target_node_id, "completed");

        let not_done = ContactContext::empty_sections("c");
        let picked = selector.select(&branches, &not_done).unwrap().unwrap();
        assert_eq!(picked.target_node_id, "fallback");
    }

    #[test]
    fn test_no_match_is_none() {
        let selector = BranchSelector::new();
        let branches =
            vec![Branch::new("s", "t", 1).with_conditions(Combinator::All, vec![form("42")])];
        let picked = selector
            .select(&branches, &ContactContext::empty_sections("c"))
            .unwrap();
        assert!(picked.is_none());
        let none: Vec<Branch> = Vec::new();
        assert!(selector.select(&none, &ContactContext::new("c")).unwrap().is_none());
    }

    #[test]
    fn test_all_and_any_combinators() {
        let selector = BranchSelector::new();
        let context = ContactContext::new("c").with_completed_form("1");
        let conditions = vec![form("1"), form("2")];

        let all = Branch::new("s", "t", 1).with_conditions(Combinator::All, conditions.clone());
        let any = Branch::new("s", "u", 1).with_conditions(Combinator::Any, conditions);
        assert!(!selector.matches(&all, &context).unwrap());
        assert!(selector.matches(&any, &context).unwrap());
    }

    #[test]
    fn test_trigger_branch_ignores_conditions() {
        let selector = BranchSelector::new();
        let mut branch =
            Branch::new("trigger", "t", 1).with_conditions(Combinator::All, vec![form("42")]);
        branch.rule_not_allowed = true;
        assert!(selector.matches(&branch, &ContactContext::new("c")).unwrap());
    }

    #[test]
    fn test_evaluation_error_names_branch_and_condition() {
        let selector = BranchSelector::new();
        let broken = form("42").with_operator(Operator::Nei);
        let branches = vec![
            Branch::new("s", "broken", 1).with_conditions(Combinator::All, vec![broken.clone()]),
            Branch::new("s", "fallback", 2),
        ];
        let err = selector
            .select(&branches, &ContactContext::empty_sections("c"))
            .unwrap_err();
        match err {
            BranchingError::Evaluation {
                branch_id,
                condition_id,
                source: ConditionError::UnsupportedOperator { .. },
            } => {
                assert_eq!(branch_id, "e-s-broken");
                assert_eq!(condition_id, broken.id);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_short_circuit_skips_broken_condition() {
        let selector = BranchSelector::new();
        let broken = form("42").with_operator(Operator::Nei);
        let context = ContactContext::new("c").with_completed_form("1");

        let any = Branch::new("s", "t", 1)
            .with_conditions(Combinator::Any, vec![form("1"), broken.clone()]);
        assert!(selector.matches(&any, &context).unwrap());

        let all =
            Branch::new("s", "t", 1).with_conditions(Combinator::All, vec![form("9"), broken]);
        assert!(!selector.matches(&all, &context).unwrap());
    }

    #[test]
    fn test_equal_priorities_keep_slice_order() {
        let selector = BranchSelector::new();
        let branches = vec![Branch::new("s", "first", 1), Branch::new("s", "second", 1)];
        let picked = selector.select(&branches, &ContactContext::new("c")).unwrap().unwrap();
        assert_eq!(picked.target_node_id, "first");
    }
}
