//! Stockroom command-line client.
//!
//! Wires [`stockroom_session`] to the terminal: configuration loading, a
//! [`SessionUi`](stockroom_session::SessionUi) that prints to stderr, display
//! formatting, and the subcommands behind the `stockroom` binary.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod commands;
pub mod config;
pub mod display;
pub mod terminal_ui;

pub use commands::{App, Command, Outcome};
pub use config::ClientConfig;
pub use terminal_ui::TerminalUi;
