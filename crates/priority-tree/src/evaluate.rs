//! The priority list walker.
//!
//! For each node in order:
//! 1. run `preconfiguration`
//! 2. test the guard (absent guard holds)
//! 3. when it holds, run `configuration`, then return `behaviour` (scheduling
//!    `reconsider` first) or descend into `truebranch`
//! 4. when it fails, descend into `falsebranch`
//!
//! A branch that yields nothing falls through to the next sibling. An
//! exhausted list yields `None`; reporting that is left to the caller, which
//! knows which entity and role were being evaluated.

use std::fmt::Debug;

use tracing::{debug, warn};

use crate::{Condition, Configuration, EvalMode, PriorityNode, PriorityTree};

/// What the walker needs from its host besides the rules themselves.
pub trait EvalContext {
    /// Requests the next evaluation `seconds` from now.
    fn reconsider_in(&mut self, seconds: f64);

    /// When true, every node visit is emitted at debug level.
    fn behaviour_logging(&self) -> bool {
        false
    }
}

/// Stateless walker over priority lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator {
    mode: EvalMode,
}

impl Evaluator {
    pub const fn new(mode: EvalMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> EvalMode {
        self.mode
    }

    /// Evaluates a whole tree.
    pub fn evaluate<C, Cd, Cf, B>(&self, tree: &PriorityTree<Cd, Cf, B>, ctx: &mut C) -> Option<B>
    where
        C: EvalContext,
        Cd: Condition<C>,
        Cf: Configuration<C>,
        B: Clone + Debug,
    {
        let chosen = self.walk(tree.nodes(), ctx, 0);
        if ctx.behaviour_logging() {
            debug!(
                target: "priority_tree::eval",
                tree = tree.label(),
                chosen = ?chosen,
                "evaluation finished"
            );
        }
        chosen
    }

    /// Evaluates a bare node list, e.g. a template fragment.
    pub fn evaluate_list<C, Cd, Cf, B>(
        &self,
        nodes: &[PriorityNode<Cd, Cf, B>],
        ctx: &mut C,
    ) -> Option<B>
    where
        C: EvalContext,
        Cd: Condition<C>,
        Cf: Configuration<C>,
        B: Clone + Debug,
    {
        self.walk(nodes, ctx, 0)
    }

    fn walk<C, Cd, Cf, B>(
        &self,
        nodes: &[PriorityNode<Cd, Cf, B>],
        ctx: &mut C,
        depth: usize,
    ) -> Option<B>
    where
        C: EvalContext,
        Cd: Condition<C>,
        Cf: Configuration<C>,
        B: Clone + Debug,
    {
        if nodes.is_empty() {
            warn!(target: "priority_tree::eval", depth, "empty priority list");
            return None;
        }
        let logging = ctx.behaviour_logging();

        for (index, node) in nodes.iter().enumerate() {
            let label = node.label.as_deref();
            if logging {
                debug!(
                    target: "priority_tree::eval",
                    depth,
                    index,
                    node = label.unwrap_or("<unlabelled>"),
                    "considering"
                );
            }

            if let Some(step) = &node.preconfiguration {
                step.configure(ctx);
            }

            let holds = self.mode.guard_holds(node.guard.as_ref(), ctx, label);
            if logging {
                debug!(target: "priority_tree::eval", depth, index, holds, "guard");
            }

            let branch = if holds {
                if let Some(step) = &node.configuration {
                    step.configure(ctx);
                }
                if let Some(behaviour) = &node.behaviour {
                    if let Some(seconds) = node.reconsider {
                        ctx.reconsider_in(seconds);
                    }
                    if logging {
                        debug!(
                            target: "priority_tree::eval",
                            depth,
                            index,
                            behaviour = ?behaviour,
                            reconsider = ?node.reconsider,
                            "selected"
                        );
                    }
                    return Some(behaviour.clone());
                }
                node.truebranch.as_deref()
            } else {
                node.falsebranch.as_deref()
            };

            if let Some(children) = branch {
                if let Some(behaviour) = self.walk(children, ctx, depth + 1) {
                    return Some(behaviour);
                }
                if logging {
                    debug!(target: "priority_tree::eval", depth, index, "branch exhausted");
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct TestContext {
        value: i32,
        checks: usize,
        trace: Vec<&'static str>,
        wakes: Vec<f64>,
    }

    impl EvalContext for TestContext {
        fn reconsider_in(&mut self, seconds: f64) {
            self.wakes.push(seconds);
        }
    }

    #[derive(Debug, Clone)]
    enum Cond {
        Always,
        Never,
        ValueAtLeast(i32),
    }

    impl Condition<TestContext> for Cond {
        fn check(&self, ctx: &mut TestContext) -> bool {
            ctx.checks += 1;
            match self {
                Cond::Always => true,
                Cond::Never => false,
                Cond::ValueAtLeast(n) => ctx.value >= *n,
            }
        }
    }

    #[derive(Debug, Clone)]
    enum Step {
        Set(i32),
        Trace(&'static str),
    }

    impl Configuration<TestContext> for Step {
        fn configure(&self, ctx: &mut TestContext) {
            match self {
                Step::Set(n) => ctx.value = *n,
                Step::Trace(s) => ctx.trace.push(s),
            }
        }
    }

    type Node = PriorityNode<Cond, Step, &'static str>;

    fn tree(nodes: Vec<Node>) -> PriorityTree<Cond, Step, &'static str> {
        PriorityTree::new("test", nodes)
    }

    #[test]
    fn false_condition_falls_through_to_fallback() {
        let tree = tree(vec![
            Node::new().when(Cond::Never).behaviour("b1"),
            Node::new().behaviour("b2"),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("b2"));
    }

    #[test]
    fn all_conditions_false_yields_none() {
        let tree = tree(vec![
            Node::new().when(Cond::Never).behaviour("b1"),
            Node::new().unless(Cond::Always).behaviour("b2"),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), None);
    }

    #[test]
    fn preconfiguration_runs_before_own_condition() {
        let tree = tree(vec![
            Node::new()
                .preconfigure(Step::Set(5))
                .when(Cond::ValueAtLeast(5))
                .behaviour("saw-five"),
            Node::new().behaviour("fallback"),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("saw-five"));
    }

    #[test]
    fn preconfiguration_runs_even_if_condition_fails() {
        let tree = tree(vec![
            Node::new()
                .preconfigure(Step::Set(3))
                .when(Cond::Never)
                .configure(Step::Trace("configured"))
                .behaviour("never"),
            Node::new().when(Cond::ValueAtLeast(3)).behaviour("three"),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("three"));
        assert!(ctx.trace.is_empty());
    }

    #[test]
    fn reconsider_applies_only_to_returned_behaviour() {
        let tree = tree(vec![
            Node::new().when(Cond::Never).behaviour("no").reconsider(1.0),
            Node::new()
                .when(Cond::Always)
                .truebranch(vec![Node::new().when(Cond::Never).behaviour("deep")])
                .reconsider(2.0),
            Node::new().behaviour("yes").reconsider(30.0),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("yes"));
        assert_eq!(ctx.wakes, vec![30.0]);
    }

    #[test]
    fn exhausted_truebranch_continues_with_siblings() {
        let tree = tree(vec![
            Node::new()
                .when(Cond::Always)
                .configure(Step::Trace("outer"))
                .truebranch(vec![Node::new().when(Cond::Never).behaviour("inner")]),
            Node::new().behaviour("next"),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("next"));
        assert_eq!(ctx.trace, vec!["outer"]);
    }

    #[test]
    fn falsebranch_is_taken_when_guard_fails() {
        let tree = tree(vec![
            Node::new()
                .when(Cond::Never)
                .behaviour("skipped")
                .falsebranch(vec![Node::new().behaviour("alternative")]),
            Node::new().behaviour("fallback"),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("alternative"));
    }

    #[test]
    fn behaviour_wins_over_truebranch() {
        let tree = tree(vec![
            Node::new()
                .behaviour("direct")
                .truebranch(vec![Node::new().behaviour("nested")]),
        ]);
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("direct"));
    }

    #[test]
    fn evaluation_stops_at_first_match() {
        let tree = tree(vec![
            Node::new().when(Cond::Always).behaviour("first"),
            Node::new().when(Cond::Always).behaviour("second"),
        ]);
        let mut ctx = TestContext::default();
        Evaluator::default().evaluate(&tree, &mut ctx);
        assert_eq!(ctx.checks, 1);
    }

    #[test]
    fn legacy_mode_ignores_unless_guard() {
        let tree = tree(vec![
            Node::new().unless(Cond::Always).behaviour("legacy"),
            Node::new().behaviour("fallback"),
        ]);
        let mut ctx = TestContext::default();
        let legacy = Evaluator::new(EvalMode::Legacy);
        assert_eq!(legacy.evaluate(&tree, &mut ctx), Some("legacy"));
        assert_eq!(Evaluator::default().evaluate(&tree, &mut ctx), Some("fallback"));
    }

    #[test]
    fn empty_list_yields_none() {
        let mut ctx = TestContext::default();
        assert_eq!(Evaluator::default().evaluate(&tree(vec![]), &mut ctx), None);
    }
}
