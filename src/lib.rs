//! ccnotify: Claude Code hook notifier.

pub mod app;
pub mod config;

pub use app::App;
