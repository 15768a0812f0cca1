//! Core types for spark-fiber.
//!
//! These types define the foundation that everything builds on.
//! They flow from the render request, through the reconciler, into the
//! commit, and define what a render target understands.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

// =============================================================================
// Identity
// =============================================================================

/// Identifier of a render root, chosen by the host.
///
/// Each root owns an independent tree and an independent pending-work stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootId(pub u64);

impl fmt::Display for RootId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "root#{}", self.0)
    }
}

/// Handle to a node slot in the [`NodeStore`](crate::engine::NodeStore).
///
/// The generation distinguishes successive occupants of a reused slot, so a
/// stale id never resolves to a node created later at the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Slot index in the arena.
    #[inline]
    pub const fn index(&self) -> usize {
        self.index as usize
    }

    /// Slot generation at the time this id was handed out.
    #[inline]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.index, self.generation)
    }
}

// =============================================================================
// Lanes
// =============================================================================

/// Priority class for pending render work.
///
/// Ordering follows priority: `Urgent > Transition > Idle`. There are exactly
/// three lanes; concurrent transitions collapse into the single Transition lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Lane {
    /// Background work that only runs when nothing else is pending.
    Idle = 0,
    /// Interruptible work (`startTransition`-style updates).
    Transition = 1,
    /// Direct user input: typing, clicks, focus.
    Urgent = 2,
}

impl Lane {
    /// All lanes, highest priority first.
    pub const ALL: [Lane; 3] = [Lane::Urgent, Lane::Transition, Lane::Idle];

    /// Numeric priority rank (higher runs first).
    #[inline]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Whether a render in this lane may be interrupted by strictly higher work.
    #[inline]
    pub const fn is_interruptible(self) -> bool {
        !matches!(self, Lane::Urgent)
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lane::Urgent => "urgent",
            Lane::Transition => "transition",
            Lane::Idle => "idle",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Element Types
// =============================================================================

/// Kind of renderable a node represents.
///
/// A closed set so that the reconciler's type check is a tag comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ElementType {
    /// Host container created for every render root. Never described by users.
    Root = 0,
    #[default]
    Box = 1,
    Text = 2,
    Input = 3,
    Select = 4,
    Progress = 5,
    Canvas = 6,
}

// =============================================================================
// Color
// =============================================================================

/// RGBA color with 8-bit channels (0-255).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    /// Create a new RGBA color.
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Create an opaque RGB color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
}

// =============================================================================
// Props
// =============================================================================

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Color(Rgba),
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        PropValue::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        PropValue::Int(value)
    }
}

impl From<i32> for PropValue {
    fn from(value: i32) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<u16> for PropValue {
    fn from(value: u16) -> Self {
        PropValue::Int(value as i64)
    }
}

impl From<f64> for PropValue {
    fn from(value: f64) -> Self {
        PropValue::Float(value)
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        PropValue::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        PropValue::Str(value)
    }
}

impl From<Rgba> for PropValue {
    fn from(value: Rgba) -> Self {
        PropValue::Color(value)
    }
}

/// Ordered attribute map.
///
/// Insertion order is preserved for targets that care; equality is per key
/// and ignores order, which is exactly the reconciler's shallow compare.
pub type Props = IndexMap<String, PropValue>;

// =============================================================================
// Keys
// =============================================================================

/// Identity of a node among its siblings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Key {
    /// Stable key supplied by the description.
    Explicit(String),
    /// Sibling position, used when no explicit key was given.
    Index(usize),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Explicit(key) => write!(f, "{key:?}"),
            Key::Index(index) => write!(f, "#{index}"),
        }
    }
}

// =============================================================================
// Tree Descriptions
// =============================================================================

/// Declarative description of one position in the desired tree.
///
/// Descriptions are plain values; they are built by the component layer
/// (see [`primitives`](crate::primitives)) and handed to `request_render`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeDescription {
    pub ty: ElementType,
    pub key: Option<String>,
    pub props: Props,
    pub children: Vec<NodeDescription>,
}

impl NodeDescription {
    /// Identity of this description when it sits at `position` among its siblings.
    pub fn identity(&self, position: usize) -> Key {
        match &self.key {
            Some(key) => Key::Explicit(key.clone()),
            None => Key::Index(position),
        }
    }

    /// Number of descriptions in this subtree, itself included.
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(NodeDescription::subtree_len)
            .sum::<usize>()
    }
}

/// A render payload: shared so that queued items are cheap to clone across threads.
pub type Payload = Arc<NodeDescription>;

// =============================================================================
// Node Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Per-node bookkeeping bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NodeFlags: u8 {
        const NONE = 0;
        /// Allocated by an in-flight render pass and not committed yet.
        const STAGED = 1 << 0;
        /// Root container whose root has queued or rendering work.
        const HAS_PENDING_WORK = 1 << 1;
        /// Touched by the current pass (props or position), waiting for commit.
        const NEEDS_COMMIT = 1 << 2;
        /// Host container of a render root.
        const ROOT = 1 << 3;
    }
}

// =============================================================================
// Mutations
// =============================================================================

/// One mutation of the rendered tree, produced by the reconciler and consumed
/// by the commit.
///
/// `before: None` means append as last child.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    Insert {
        node: NodeId,
        parent: NodeId,
        before: Option<NodeId>,
        ty: ElementType,
        key: Key,
        props: Props,
    },
    Move {
        node: NodeId,
        parent: NodeId,
        before: Option<NodeId>,
    },
    Update {
        node: NodeId,
        old_props: Props,
        new_props: Props,
    },
    Remove {
        node: NodeId,
    },
}

impl MutationOp {
    /// The node this op acts on.
    pub fn node(&self) -> NodeId {
        match self {
            MutationOp::Insert { node, .. }
            | MutationOp::Move { node, .. }
            | MutationOp::Update { node, .. }
            | MutationOp::Remove { node } => *node,
        }
    }

    /// Short op name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            MutationOp::Insert { .. } => "insert",
            MutationOp::Move { .. } => "move",
            MutationOp::Update { .. } => "update",
            MutationOp::Remove { .. } => "remove",
        }
    }

    pub fn is_insert(&self) -> bool {
        matches!(self, MutationOp::Insert { .. })
    }

    pub fn is_move(&self) -> bool {
        matches!(self, MutationOp::Move { .. })
    }

    pub fn is_update(&self) -> bool {
        matches!(self, MutationOp::Update { .. })
    }

    pub fn is_remove(&self) -> bool {
        matches!(self, MutationOp::Remove { .. })
    }
}

// =============================================================================
// Tests
// =============================================================================
