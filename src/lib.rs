#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod app;
pub mod config;
pub mod data;
pub mod feed;
pub mod identity;
pub mod logging;
pub mod navigation;
pub mod playback;
pub mod reconcile;
pub mod ui;
pub mod video;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
