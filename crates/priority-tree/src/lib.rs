//! Ordered, branching priority lists for real-time NPC decision making.
//!
//! A priority tree is an ordered list of [`PriorityNode`]s. Evaluation walks
//! the list top to bottom and returns the first behaviour whose guard chain
//! holds, descending into `truebranch`/`falsebranch` lists on the way.
//!
//! - **Single winner**: one evaluation selects at most one behaviour
//! - **Data, not code**: nodes are plain values shared read-only between entities
//! - **Context-driven**: conditions and configurations run against a caller
//!   supplied context that also receives reconsideration requests
//!
//! # Architecture
//!
//! - [`Condition`] / [`Configuration`]: traits implemented by rule vocabularies
//! - [`PriorityNode`] / [`PriorityTree`]: immutable tree data
//! - [`Evaluator`]: the walker, in [`EvalMode::Priority`] or [`EvalMode::Legacy`]
//! - [`EvalContext`]: what the walker needs from its host

pub mod builder;
pub mod evaluate;
pub mod legacy;
pub mod node;
pub mod rule;

pub use builder::{branch, configured, fallback, unless, when};
pub use evaluate::{EvalContext, Evaluator};
pub use legacy::EvalMode;
pub use node::{Guard, PriorityNode, PriorityTree};
pub use rule::{Condition, Configuration};
