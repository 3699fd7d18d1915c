//! Shared utility modules used across rankwise components.

pub mod resource;

pub use resource::{ResourceTracker, TrackedResource};
