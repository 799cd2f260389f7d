//! Hands-free voice navigation for the VoiceCart storefront.
//!
//! A continuously listening recognition driver feeds a two-phase command
//! interpreter ("listen now", then commands) whose results are carried out
//! through page action bindings with spoken confirmation.

pub mod actions;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod console;
pub mod controller;
pub mod error;
pub mod fuzzy;
pub mod interpreter;
pub mod permission;
pub mod recognition;
pub mod state;
pub mod tts;
pub mod ui;

pub use config::Config;
pub use controller::{ControlCommand, VoiceController};
pub use error::VoiceError;
pub use interpreter::{CommandInterpreter, CommandResult};
pub use recognition::RecognitionDriver;
pub use state::{RuntimeState, SharedState};
