//! Journey branching: guarded, prioritised edges between journey steps and
//! the machinery to evaluate, select, reorder and edit them.

pub mod command;
pub mod condition;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod filter;
pub mod graph;
pub mod priority;
pub mod router;
pub mod selector;
pub mod types;

pub use command::{Applied, GraphCommand, UndoHistory};
pub use condition::{
    AdditionalData, Condition, ConditionRule, ConditionType, ConditionValue, DonationField, LabeledValue,
    Operator, Score, SubMatch,
};
pub use context::{ContactContext, ContextProvider};
pub use error::{BranchingError, BranchingResult, ConditionError, ParseError};
pub use evaluator::{ConditionEvaluator, Evaluate};
pub use filter::{render_branch_filters, render_filter, BackendRule};
pub use graph::JourneyGraph;
pub use priority::{move_down, move_up, Direction, PriorityUpdate, Reordered};
pub use router::{JourneyRouter, RouteOutcome};
pub use selector::BranchSelector;
pub use types::{Branch, Combinator, JourneyNode, NodeKind};
