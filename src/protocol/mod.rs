//! Protocol layer for the line chat server
//!
//! This module provides:
//! - Parsing of input lines into commands per session mode
//! - The reply text written back to clients

pub mod command;
pub mod replies;

pub use command::{BrowserCommand, ClosedInput, OpenCommand, SlashCommand};
