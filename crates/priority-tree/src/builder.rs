//! Builder utilities for terse priority lists.
//!
//! Instead of chaining `PriorityNode::new().when(c).behaviour(b)` for every
//! entry, rule authors can use shorter functions like `when(c, b)`.

use crate::PriorityNode;

/// An unconditional node. Every tree should end with one.
#[inline]
pub fn fallback<Cd, Cf, B>(behaviour: B) -> PriorityNode<Cd, Cf, B> {
    PriorityNode::new().behaviour(behaviour)
}

/// A node selecting `behaviour` when `condition` holds.
#[inline]
pub fn when<Cd, Cf, B>(condition: Cd, behaviour: B) -> PriorityNode<Cd, Cf, B> {
    PriorityNode::new().when(condition).behaviour(behaviour)
}

/// A node selecting `behaviour` when `condition` does not hold.
#[inline]
pub fn unless<Cd, Cf, B>(condition: Cd, behaviour: B) -> PriorityNode<Cd, Cf, B> {
    PriorityNode::new().unless(condition).behaviour(behaviour)
}

/// A node descending into `nodes` when `condition` holds.
#[inline]
pub fn branch<Cd, Cf, B>(
    condition: Cd,
    nodes: Vec<PriorityNode<Cd, Cf, B>>,
) -> PriorityNode<Cd, Cf, B> {
    PriorityNode::new().when(condition).truebranch(nodes)
}

/// An unconditional node that runs `configuration` then selects `behaviour`.
#[inline]
pub fn configured<Cd, Cf, B>(configuration: Cf, behaviour: B) -> PriorityNode<Cd, Cf, B> {
    PriorityNode::new()
        .configure(configuration)
        .behaviour(behaviour)
}
