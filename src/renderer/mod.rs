//! Renderer - commit application and render targets.
//!
//! - [`commit`] - Applies a finished pass's ops to the store and the target
//! - [`RenderTarget`] - The platform renderer seam
//! - [`HeadlessTarget`] - In-memory host tree, validates op streams
//! - [`RecordingTarget`] - Records ops, simulates failures

pub mod commit;
mod headless;
mod recording;

pub use commit::{apply, RenderTarget};
pub use headless::{HeadlessTarget, HostNode};
pub use recording::RecordingTarget;
