//! cellmark - Cell annotation engine for pathology images
//!
//! Converts pointer input into image-space point and polygon annotations,
//! keeps the pan/zoom view, hit-tests for deletion and polygon closure and
//! rasterizes the canvas. Persistence, image storage and cell detection are
//! reached through the collaborator traits in [`backend`].

pub mod backend;
pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod model;
pub mod render;
pub mod script;
pub mod session;
pub mod store;
pub mod view;

pub use error::{EditorError, Result};
pub use session::{EditorSession, Notice, NoticeLevel};
