//! Priority tree data.
//!
//! Nodes are authored once per role and shared across every entity of that
//! role. Nothing in this module mutates a node after construction.

use std::fmt;
use std::sync::Arc;

/// Guard attached to a node. An absent guard always holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard<Cd> {
    /// Holds when the condition is true.
    When(Cd),
    /// Holds when the condition is false.
    Unless(Cd),
}

/// One entry in a priority list.
///
/// Every field is optional. A node with neither a behaviour nor branches is
/// legal and only useful for its configuration side effects.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityNode<Cd, Cf, B> {
    /// Diagnostic name, shown in behaviour logging.
    pub label: Option<String>,
    /// Always runs, even when the guard fails.
    pub preconfiguration: Option<Cf>,
    pub guard: Option<Guard<Cd>>,
    /// Runs only when the guard holds.
    pub configuration: Option<Cf>,
    /// Terminal match. Takes precedence over `truebranch`.
    pub behaviour: Option<B>,
    pub truebranch: Option<Vec<PriorityNode<Cd, Cf, B>>>,
    pub falsebranch: Option<Vec<PriorityNode<Cd, Cf, B>>>,
    /// Seconds until the next wake, applied only when `behaviour` is returned.
    pub reconsider: Option<f64>,
}

impl<Cd, Cf, B> Default for PriorityNode<Cd, Cf, B> {
    fn default() -> Self {
        Self {
            label: None,
            preconfiguration: None,
            guard: None,
            configuration: None,
            behaviour: None,
            truebranch: None,
            falsebranch: None,
            reconsider: None,
        }
    }
}

impl<Cd, Cf, B> PriorityNode<Cd, Cf, B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn preconfigure(mut self, step: Cf) -> Self {
        self.preconfiguration = Some(step);
        self
    }

    pub fn when(mut self, condition: Cd) -> Self {
        self.guard = Some(Guard::When(condition));
        self
    }

    pub fn unless(mut self, condition: Cd) -> Self {
        self.guard = Some(Guard::Unless(condition));
        self
    }

    pub fn configure(mut self, step: Cf) -> Self {
        self.configuration = Some(step);
        self
    }

    pub fn behaviour(mut self, behaviour: B) -> Self {
        self.behaviour = Some(behaviour);
        self
    }

    pub fn reconsider(mut self, seconds: f64) -> Self {
        self.reconsider = Some(seconds);
        self
    }

    pub fn truebranch(mut self, nodes: Vec<PriorityNode<Cd, Cf, B>>) -> Self {
        self.truebranch = Some(nodes);
        self
    }

    pub fn falsebranch(mut self, nodes: Vec<PriorityNode<Cd, Cf, B>>) -> Self {
        self.falsebranch = Some(nodes);
        self
    }

    /// True when the node matches without consulting any condition.
    pub fn is_unconditional_fallback(&self) -> bool {
        self.guard.is_none() && self.behaviour.is_some()
    }
}

/// An ordered priority list with a name, cheap to clone and share.
pub struct PriorityTree<Cd, Cf, B> {
    label: Arc<str>,
    nodes: Arc<[PriorityNode<Cd, Cf, B>]>,
}

impl<Cd, Cf, B> PriorityTree<Cd, Cf, B> {
    pub fn new(label: impl Into<Arc<str>>, nodes: Vec<PriorityNode<Cd, Cf, B>>) -> Self {
        Self {
            label: label.into(),
            nodes: nodes.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn nodes(&self) -> &[PriorityNode<Cd, Cf, B>] {
        &self.nodes
    }

    /// Returns true if the top level ends in a node that always matches.
    ///
    /// A tree without one can return nothing, which the engine reports as an
    /// authoring defect.
    pub fn has_fallback(&self) -> bool {
        self.nodes
            .last()
            .is_some_and(PriorityNode::is_unconditional_fallback)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl<Cd, Cf, B> Clone for PriorityTree<Cd, Cf, B> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            nodes: Arc::clone(&self.nodes),
        }
    }
}

impl<Cd, Cf, B> fmt::Debug for PriorityTree<Cd, Cf, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityTree")
            .field("label", &self.label)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}
