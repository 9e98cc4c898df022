use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    pub fn new(idx: usize) -> Self { Self(idx as u32) }
}

/// Describes the semantic type of a dependency in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Edge {
    /// The consumer reads the parent's current value. Example: `Y = A + B`.
    Value,
    /// The parent's value enters this lag link on the next shift.
    /// Example: `Y` feeds `LAG(Y,1)`, which feeds `LAG(Y,2)`.
    Delay,
    /// The parent is the initial value loaded into a lag link at the start of a run.
    Seed,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Edge::Value => write!(f, "value"),
            Edge::Delay => write!(f, "delay"),
            Edge::Seed => write!(f, "seed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// An externally supplied scalar, inlined. `NaN` until assigned.
    Parameter(f64),
    /// A computed variable. Index into `Registry::equations`.
    Variable(u32),
    /// One link of a lag chain: the value of `base`, `depth` iterations ago.
    Lagged {
        base: NodeId,
        depth: u32,
        seed: NodeId,
        next: Option<NodeId>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMetadata {
    pub name: String,
    /// Source line of the defining equation, for variables.
    pub line: Option<usize>,
}

/// Name of the parameter that seeds link `depth` of `base`'s lag chain.
pub fn seed_name(base: &str, depth: u32) -> String {
    format!("{}_t_minus_{}", base, depth)
}

/// The depth `name` seeds for `base`, if it is one of `base`'s seed names.
pub fn seed_depth(name: &str, base: &str) -> Option<u32> {
    let depth = name.strip_prefix(base)?.strip_prefix("_t_minus_")?.parse().ok()?;
    (seed_name(base, depth) == name).then_some(depth)
}

/// Name under which a lag link is registered and recorded. Cannot collide with an identifier.
pub fn lag_name(base: &str, depth: u32) -> String {
    format!("LAG({},{})", base, depth)
}
