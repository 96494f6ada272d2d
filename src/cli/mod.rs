//! CLI module for Haggle

pub mod app;
pub mod commands;

pub use app::{fetch_price_history, load_history, HaggleApp};
pub use commands::{Cli, Commands, ServeArgs};
