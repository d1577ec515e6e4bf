#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod curate;
pub mod fetch;
pub mod model;
pub mod registry;
pub mod render;
pub mod uri;
pub mod widget;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
pub use registry::register;
pub use widget::CommentsSection;
