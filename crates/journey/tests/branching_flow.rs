//! End-to-end branching behaviour: selection, reordering and condition edits.

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::BTreeSet;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use crm_journey::context::ContextProvider;
    use crm_journey::priority::{self, check_dense};
    use crm_journey::{
        Branch, BranchSelector, BranchingError, Combinator, Condition, ConditionError,
        ConditionEvaluator, ConditionRule, ConditionType, ContactContext, DonationField,
        Evaluate, LabeledValue, Operator, Score, SubMatch,
    };

    /// Evaluator that reads the expected outcome from the condition value
    /// (`"true"`, `"false"` or `"error"`) and counts its calls.
    #[derive(Default)]
    struct CountingEvaluator {
        calls: Cell<usize>,
    }

    impl Evaluate for CountingEvaluator {
        fn evaluate(
            &self,
            condition: &Condition,
            _context: &dyn ContextProvider,
        ) -> Result<bool, ConditionError> {
            self.calls.set(self.calls.get() + 1);
            match condition.value().map(|v| v.key().into_owned()).as_deref() {
                Some("true") => Ok(true),
                Some("error") => Err(ConditionError::UnsupportedOperator {
                    condition_id: condition.id.clone(),
                    kind: condition.kind(),
                    operator: condition.operator(),
                }),
                _ => Ok(false),
            }
        }
    }

    fn scripted(outcome: &str) -> Condition {
        Condition::new(ConditionType::FormCompleted).with_value(outcome)
    }

    fn form_gate_branches() -> Vec<Branch> {
        vec![
            Branch::new("wait", "completed", 1).with_conditions(
                Combinator::All,
                vec![Condition::new(ConditionType::FormCompleted).with_value("42")],
            ),
            Branch::new("wait", "default", 2),
        ]
    }

    fn sample_branches(n: u32) -> Vec<Branch> {
        (1..=n)
            .map(|i| Branch::new("wait", format!("step-{}", i), i).with_connection_id(100 + i as u64))
            .collect()
    }

    fn priorities(branches: &[Branch]) -> BTreeSet<u32> {
        branches.iter().map(|b| b.priority).collect()
    }

    // ------------------------------------------------------------------
    // Selection scenarios
    // ------------------------------------------------------------------

    #[test]
    fn test_completed_form_takes_priority_one() {
        let selector = BranchSelector::new();
        let branches = form_gate_branches();
        let context = ContactContext::new("contact-1").with_completed_form("42");

        let picked = selector.select(&branches, &context).unwrap().unwrap();
        assert_eq!(picked.priority, 1);
        assert_eq!(picked.target_node_id, "completed");
    }

    #[test]
    fn test_other_form_falls_through_to_default() {
        let selector = BranchSelector::new();
        let branches = form_gate_branches();
        let context = ContactContext::new("contact-1").with_completed_form("99");

        let picked = selector.select(&branches, &context).unwrap().unwrap();
        assert_eq!(picked.priority, 2);
        assert!(picked.conditions.is_empty());
    }

    #[test]
    fn test_donation_amount_threshold() {
        let evaluator = ConditionEvaluator::new();
        let condition: Condition = serde_json::from_value(serde_json::json!({
            "id": "condition-4",
            "type": "donation_transaction",
            "operator": "$eq",
            "conditionField": "[ammount]",
            "conditionOperator": "$gte",
            "value": "100"
        }))
        .unwrap();

        let generous = ContactContext::new("c").with_donation("Spring", 150.0);
        let modest = ContactContext::new("c").with_donation("Spring", 50.0);
        assert!(evaluator.evaluate(&condition, &generous).unwrap());
        assert!(!evaluator.evaluate(&condition, &modest).unwrap());
    }

    #[test]
    fn test_any_branch_surfaces_first_failure() {
        let selector = BranchSelector::new();
        let broken = Condition::new(ConditionType::FormCompleted)
            .with_value("42")
            .with_operator(Operator::Nei);
        let passing = Condition::new(ConditionType::FormCompleted).with_value("42");
        let branches = vec![Branch::new("wait", "next", 1)
            .with_conditions(Combinator::Any, vec![broken.clone(), passing])];
        let context = ContactContext::new("c").with_completed_form("42");

        match selector.select(&branches, &context) {
            Err(BranchingError::Evaluation {
                branch_id,
                condition_id,
                source: ConditionError::UnsupportedOperator { .. },
            }) => {
                assert_eq!(branch_id, "e-wait-next");
                assert_eq!(condition_id, broken.id);
            }
            other => panic!("expected an evaluation error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_context_section_is_an_error_not_false() {
        let selector = BranchSelector::new();
        let branches = form_gate_branches();
        let err = selector
            .select(&branches, &ContactContext::new("c"))
            .unwrap_err();
        assert!(matches!(
            err,
            BranchingError::Evaluation {
                source: ConditionError::MissingContextField {
                    field: "completed_forms",
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn test_action_with_external_id_from_wire_shape() {
        let condition: Condition = serde_json::from_value(serde_json::json!({
            "id": "condition-7",
            "type": "[actions][action_type]",
            "operator": "$eqi",
            "value": {"label": "Purchase", "value": "purchase"},
            "additionalCondition": "[actions][external_id]/$eqi/SKU-1"
        }))
        .unwrap();
        assert!(matches!(
            &condition.rule,
            ConditionRule::Action { external_id: Some(sub), .. }
                if *sub == SubMatch::external_id(Operator::Eqi, "SKU-1")
        ));

        let evaluator = ConditionEvaluator::new();
        let bought = ContactContext::new("c").with_action("Purchase", Some("sku-1"));
        assert!(evaluator.evaluate(&condition, &bought).unwrap());
    }

    // ------------------------------------------------------------------
    // Selection properties
    // ------------------------------------------------------------------

    #[test]
    fn test_selection_is_deterministic() {
        let selector = BranchSelector::new();
        let branches = form_gate_branches();
        for context in [
            ContactContext::new("c").with_completed_form("42"),
            ContactContext::new("c").with_completed_form("7"),
        ] {
            let first = selector.select(&branches, &context).unwrap().cloned();
            let second = selector.select(&branches, &context).unwrap().cloned();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_empty_conditions_always_match() {
        let selector = BranchSelector::new();
        for combinator in [Combinator::All, Combinator::Any] {
            let branch = Branch::new("wait", "next", 1).with_conditions(combinator, Vec::new());
            assert!(selector.matches(&branch, &ContactContext::new("c")).unwrap());
            assert!(selector
                .matches(&branch, &ContactContext::empty_sections("c"))
                .unwrap());
        }
    }

    #[test]
    fn test_all_stops_at_first_false() {
        let selector = BranchSelector::with_evaluator(CountingEvaluator::default());
        let branch = Branch::new("wait", "next", 1).with_conditions(
            Combinator::All,
            vec![scripted("false"), scripted("error"), scripted("true")],
        );
        assert!(!selector.matches(&branch, &ContactContext::new("c")).unwrap());
        assert_eq!(selector.evaluator().calls.get(), 1);
    }

    #[test]
    fn test_any_stops_at_first_true() {
        let selector = BranchSelector::with_evaluator(CountingEvaluator::default());
        let branch = Branch::new("wait", "next", 1).with_conditions(
            Combinator::Any,
            vec![scripted("false"), scripted("true"), scripted("error")],
        );
        assert!(selector.matches(&branch, &ContactContext::new("c")).unwrap());
        assert_eq!(selector.evaluator().calls.get(), 2);
    }

    #[test]
    fn test_selection_stops_at_first_matching_branch() {
        let selector = BranchSelector::with_evaluator(CountingEvaluator::default());
        let branches = vec![
            Branch::new("wait", "c", 3).with_conditions(Combinator::All, vec![scripted("true")]),
            Branch::new("wait", "a", 1).with_conditions(Combinator::All, vec![scripted("false")]),
            Branch::new("wait", "b", 2).with_conditions(Combinator::All, vec![scripted("true")]),
        ];
        let picked = selector
            .select(&branches, &ContactContext::new("c"))
            .unwrap()
            .unwrap();
        assert_eq!(picked.target_node_id, "b");
        assert_eq!(selector.evaluator().calls.get(), 2);
    }

    // ------------------------------------------------------------------
    // Reordering
    // ------------------------------------------------------------------

    #[test]
    fn test_move_down_two_branches() {
        let branches = sample_branches(2);
        let result = priority::move_down(&branches, "e-wait-step-1");

        let by_target: Vec<(&str, u32)> = result
            .branches
            .iter()
            .map(|b| (b.target_node_id.as_str(), b.priority))
            .collect();
        assert_eq!(by_target, vec![("step-2", 1), ("step-1", 2)]);

        let delta: Vec<(Option<u64>, u32)> = result
            .delta
            .iter()
            .map(|u| (u.connection_id, u.priority))
            .collect();
        assert_eq!(delta, vec![(Some(101), 2), (Some(102), 1)]);
    }

    #[test]
    fn test_random_moves_keep_priorities_dense() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 1..=6u32 {
            let expected: BTreeSet<u32> = (1..=n).collect();
            let mut branches = sample_branches(n);
            for _ in 0..200 {
                let target = format!("e-wait-step-{}", rng.gen_range(1..=n));
                let result = if rng.gen_bool(0.5) {
                    priority::move_up(&branches, &target)
                } else {
                    priority::move_down(&branches, &target)
                };
                assert_eq!(priorities(&result.branches), expected);
                assert!(check_dense("wait", &result.branches).is_ok());
                branches = result.branches;
            }
        }
    }

    #[test]
    fn test_random_moves_change_zero_or_two_branches() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut branches = sample_branches(5);
        for _ in 0..300 {
            let target = format!("e-wait-step-{}", rng.gen_range(1..=5));
            let before = branches.clone();
            let result = if rng.gen_bool(0.5) {
                priority::move_up(&branches, &target)
            } else {
                priority::move_down(&branches, &target)
            };

            let changed = result
                .branches
                .iter()
                .filter(|after| {
                    before
                        .iter()
                        .any(|b| b.id == after.id && b.priority != after.priority)
                })
                .count();
            assert!(changed == 0 || changed == 2, "changed {} branches", changed);
            assert_eq!(changed, result.delta.len());
            branches = result.branches;
        }
    }

    // ------------------------------------------------------------------
    // Condition edits
    // ------------------------------------------------------------------

    #[test]
    fn test_change_type_from_action_to_form_answer() {
        let action = Condition::new(ConditionType::Action)
            .with_value("SomeAction")
            .add_score();
        let changed = action.change_type(ConditionType::FormAnswer);

        assert_eq!(changed.id, action.id);
        assert!(changed.value().is_none());
        assert_eq!(changed.label, ConditionType::FormAnswer.label());
        assert_eq!(changed.operator(), Operator::Eqi);
        assert!(changed.scores.is_empty());
    }

    /// A rule of `kind` with every type-specific field filled in.
    fn populated_rule(kind: ConditionType) -> ConditionRule {
        match kind {
            ConditionType::FormCompleted => ConditionRule::FormCompleted {
                operator: Operator::Eq,
                value: Some(LabeledValue {
                    label: "Signup".into(),
                    value: "42".into(),
                }
                .into()),
            },
            ConditionType::Action => ConditionRule::Action {
                operator: Operator::Nei,
                value: Some("purchase".into()),
                external_id: Some(SubMatch::external_id(Operator::Eqi, "SKU-1")),
            },
            ConditionType::JourneyFinished => ConditionRule::JourneyFinished {
                operator: Operator::Eq,
                value: Some("journey-7".into()),
            },
            ConditionType::FormAnswer => ConditionRule::FormAnswer {
                operator: Operator::Nei,
                form: Some(LabeledValue {
                    label: "Survey".into(),
                    value: "3".into(),
                }),
                question: Some("Favourite colour".into()),
                question_id: Some("5".into()),
                value: Some("blue".into()),
            },
            ConditionType::DonationTransaction => ConditionRule::DonationTransaction {
                operator: Operator::Eq,
                condition_field: Some(DonationField::Amount),
                condition_operator: Some(Operator::Gte),
                value: Some("100".into()),
            },
        }
    }

    #[test]
    fn test_change_type_always_clears_extension_fields() {
        let mut rng = StdRng::seed_from_u64(3);
        for round in 0..50 {
            let from = ConditionType::ALL[round % ConditionType::ALL.len()];
            let to = ConditionType::ALL[rng.gen_range(0..ConditionType::ALL.len())];

            let mut populated = Condition::new(from)
                .with_rule(populated_rule(from))
                .add_score();
            populated.scores[0] = Score {
                id: Some(1),
                attribute: "engagement".into(),
                value: "3".into(),
            };
            assert_eq!(populated.kind(), from);

            let changed = populated.change_type(to);
            assert_eq!(changed.id, populated.id);
            assert_eq!(changed.rule, ConditionRule::empty(to));
            assert_eq!(changed.label, to.label());
            assert!(changed.scores.is_empty());
            assert!(!changed.show_scores);
        }
    }

    #[test]
    fn test_change_type_between_every_pair() {
        for &from in ConditionType::ALL {
            for &to in ConditionType::ALL {
                let populated = Condition::new(from).with_rule(populated_rule(from));
                let changed = populated.change_type(to);
                assert_eq!(changed.rule, ConditionRule::empty(to), "{} -> {}", from, to);
                assert!(changed.value().is_none());
            }
        }
    }
}
