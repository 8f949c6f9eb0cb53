//! Terminal side of niv: dialogs, progress and the status line.

pub mod dialogs;
pub mod status;

pub use dialogs::*;
pub use status::*;

/// Severity of a message shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Info,
    Success,
    Warning,
    Error,
}

impl MessageType {
    pub fn color(self) -> crossterm::style::Color {
        use crossterm::style::Color;
        match self {
            MessageType::Info => Color::Cyan,
            MessageType::Success => Color::Green,
            MessageType::Warning => Color::Yellow,
            MessageType::Error => Color::Red,
        }
    }
}
