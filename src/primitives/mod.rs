//! Primitives - Tree description building blocks.
//!
//! The component layer describes the tree it wants with plain
//! [`NodeDescription`](crate::types::NodeDescription) values and hands them
//! to `request_render`. These helpers keep that terse:
//! - [`element`] - Any element type
//! - [`box_element`] - Container
//! - [`text`] - Text leaf with a `content` prop
//!
//! ```ignore
//! use spark_fiber::primitives::{box_element, text};
//!
//! let list = box_element().children(
//!     todos.iter().map(|todo| text(&todo.title).key(todo.id.to_string())),
//! );
//! ```
//!
//! Keys matter. Without `.key(..)` children are matched by position, and
//! inserting at the front of a list rewrites every item after it.

mod element;
mod text;

pub use element::{box_element, element};
pub use text::{input, text, CONTENT_PROP, VALUE_PROP};
