//! Terminal rendering for the console session

use std::io::{Write, stdout};

use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use crossterm::terminal::{Clear, ClearType};
use crossterm::{cursor, queue};

use crate::interpreter::CommandRule;
use crate::state::RuntimeState;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

fn line(color: Color, prefix: &str, text: &str) {
    let mut out = stdout();
    queue!(
        out,
        cursor::MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        SetForegroundColor(color),
        Print(prefix),
        Print(text),
        ResetColor,
        Print("\n"),
    )
    .ok();
    out.flush().ok();
}

/// Interim transcript, overwritten by the next line
pub fn show_interim(text: &str, frame: usize) {
    let mut out = stdout();
    queue!(
        out,
        cursor::MoveToColumn(0),
        Clear(ClearType::CurrentLine),
        SetForegroundColor(Color::DarkGrey),
        Print(format!("{} {}", SPINNER[frame % SPINNER.len()], text)),
        ResetColor,
    )
    .ok();
    out.flush().ok();
}

pub fn speak(text: &str) {
    line(Color::Magenta, "♪ ", text);
}

pub fn page_effect(text: &str) {
    line(Color::Cyan, "  ▸ ", text);
}

pub fn hint(text: &str) {
    line(Color::DarkGrey, "", text);
}

pub fn error(text: &str) {
    line(Color::Red, "✗ ", text);
}

pub fn status(state: &RuntimeState) {
    let listening = if state.is_listening() { "listening" } else { "stopped" };
    line(
        Color::Yellow,
        "● ",
        &format!("{} | {}", listening, state.command_mode()),
    );
}

pub fn banner(activation: &[String]) {
    let wake = activation.first().map(String::as_str).unwrap_or("listen now");
    line(Color::Green, "", "VoiceCart voice console");
    hint(&format!(
        "Type what you would say. Say \"{wake}\" to enter command mode.\n\
         ~text sends an interim result, !end ends the engine, !error <code> reports an engine error.\n\
         :start :stop :toggle :status :quit control the session."
    ));
}

pub fn print_rules(activation: &[String], deactivation: &[String], rules: &[CommandRule]) {
    println!("activation       {}", quoted(activation));
    println!("deactivation     {}", quoted(deactivation));
    for rule in rules {
        println!("{rule}");
    }
}

fn quoted(phrases: &[String]) -> String {
    phrases
        .iter()
        .map(|p| format!("\"{p}\""))
        .collect::<Vec<_>>()
        .join(", ")
}
