//! Transcript rendering with crossterm styling.

use chrono::Local;
use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use palaver_session::{SessionId, SessionSummary};
use palaver_types::ChatMessage;

pub fn bold(text: &str) -> String {
    format!(
        "{}{}{}",
        SetAttribute(Attribute::Bold),
        text,
        SetAttribute(Attribute::Reset)
    )
}

pub fn dim(text: &str) -> String {
    format!(
        "{}{}{}",
        SetAttribute(Attribute::Dim),
        text,
        SetAttribute(Attribute::Reset)
    )
}

pub fn fg_color(text: &str, color: Color) -> String {
    format!(
        "{}{}{}",
        SetForegroundColor(color),
        text,
        SetForegroundColor(Color::Reset)
    )
}

/// Sender prefix: `you>` for the logged-in user, `server>` for inbound frames.
fn sender_prefix(message: &ChatMessage, me: Option<&str>) -> String {
    if message.is_inbound() {
        fg_color(&format!("{}>", message.user), Color::Yellow)
    } else if me == Some(message.user.as_str()) {
        fg_color("you>", Color::Green)
    } else {
        fg_color(&format!("{}>", message.user), Color::Cyan)
    }
}

/// One transcript line, e.g. `14:02 you> hello`.
pub fn message_line(message: &ChatMessage, me: Option<&str>) -> String {
    let time = message.time.with_timezone(&Local).format("%H:%M").to_string();
    format!(
        "{} {} {}",
        dim(&time),
        sender_prefix(message, me),
        message.message
    )
}

/// One row of the session list; the active session is marked with `*`.
pub fn summary_line(summary: &SessionSummary, active: Option<SessionId>) -> String {
    let marker = if active == Some(summary.id) { "*" } else { " " };
    let label = match &summary.label {
        Some(label) => label.clone(),
        None => dim("(empty)"),
    };
    format!(
        "{marker} {} {:>8}  {:>3} msgs  {label}",
        bold(&summary.id.to_string()),
        summary.age(),
        summary.message_count,
    )
}
