use std::path::Path;

use niv_fs::JobKind;
use niv_io::{Buffer, IoEvent, LifeState};

use crate::MessageType;

/// One-line summary of a buffer: name, flags, encoding, line ending and
/// caret position.
pub fn status_line(buffer: &Buffer) -> String {
    let mut flags = String::new();
    if buffer.is_dirty() {
        flags.push_str(" [+]");
    }
    if buffer.is_read_only() {
        flags.push_str(" [RO]");
    }
    match (buffer.life(), buffer.job()) {
        (LifeState::Reading, _) => flags.push_str(&format!(" [loading {}%]", percent(buffer))),
        (_, Some(JobKind::Save)) => flags.push_str(&format!(" [saving {}%]", percent(buffer))),
        _ => {}
    }
    if buffer.is_save_blocked() {
        flags.push_str(" [incomplete]");
    }

    let document = buffer.document();
    let caret = document.clamp(buffer.view().caret);
    let line = document.line_of(caret);
    let column = document.text()[document.line_start(line)..caret].chars().count();

    format!(
        "{}{flags}    {} {}    {}:{}",
        buffer.display_name(),
        buffer.encoding(),
        buffer.eol(),
        line + 1,
        column + 1
    )
}

fn percent(buffer: &Buffer) -> u8 {
    buffer.progress().map_or(0, |p| p.percent())
}

/// Status-bar text for an I/O event, if it deserves one.
pub fn event_message(event: &IoEvent) -> Option<(String, MessageType)> {
    let message = match event {
        IoEvent::Opened { path, encoding, .. } => {
            (format!("\"{}\" opened [{encoding}]", file_name(path)), MessageType::Info)
        }
        IoEvent::LoadFailed { message, .. } | IoEvent::SaveFailed { message, .. } => {
            (message.clone(), MessageType::Error)
        }
        IoEvent::LoadCancelled { path, .. } => {
            (format!("Loading \"{}\" cancelled", file_name(path)), MessageType::Warning)
        }
        IoEvent::Saved { path, bytes, .. } => {
            (format!("\"{}\" {bytes} bytes written", file_name(path)), MessageType::Success)
        }
        IoEvent::SavedElsewhere { saved, .. } => (
            format!("\"{}\" written; buffer was renamed and is still modified", file_name(saved)),
            MessageType::Warning,
        ),
        IoEvent::Reverted { .. } => ("Reverted to the file on disk".to_string(), MessageType::Info),
        IoEvent::ExternalDeleted { path, .. } => {
            (format!("\"{}\" was deleted", file_name(path)), MessageType::Warning)
        }
        IoEvent::Closed { .. } | IoEvent::AllSavesFinished => return None,
    };
    Some(message)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
