use std::io::{self, Write};

use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::style::{Print, Stylize};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;
use niv_fs::Progress;
use niv_io::{Choice, Dialogs};
use tracing::{debug, warn};

use crate::MessageType;

/// Dialogs drawn on a terminal.
///
/// Questions read a single key in raw mode. With an assumed answer set,
/// nothing is read and the answer is echoed instead, for scripts and
/// pipelines.
pub struct TerminalDialogs<W: Write = io::Stderr> {
    out: W,
    assume: Option<Choice>,
    progress_shown: bool,
    last_message: Option<(String, MessageType)>,
}

impl TerminalDialogs<io::Stderr> {
    pub fn new() -> Self {
        Self::with_writer(io::stderr())
    }
}

impl Default for TerminalDialogs<io::Stderr> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> TerminalDialogs<W> {
    pub fn with_writer(out: W) -> Self {
        Self { out, assume: None, progress_shown: false, last_message: None }
    }

    /// Answer every question with `choice` without reading the keyboard.
    pub fn assume(mut self, choice: Choice) -> Self {
        self.assume = Some(choice);
        self
    }

    /// Most recent message, for the status line.
    pub fn last_message(&self) -> Option<(&str, MessageType)> {
        self.last_message.as_ref().map(|(m, t)| (m.as_str(), *t))
    }

    pub fn clear_message(&mut self) {
        self.last_message = None;
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Print `message` on its own line in the colour of `kind`.
    pub fn show_message(&mut self, message: &str, kind: MessageType) -> io::Result<()> {
        self.clear_progress()?;
        queue!(self.out, Print(message.with(kind.color())), Print("\r\n"))?;
        self.out.flush()?;
        self.last_message = Some((message.to_string(), kind));
        Ok(())
    }

    /// Remove the progress line, if one is showing.
    pub fn clear_progress(&mut self) -> io::Result<()> {
        if self.progress_shown {
            queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
            self.out.flush()?;
            self.progress_shown = false;
        }
        Ok(())
    }

    fn ask(&mut self, message: &str) -> io::Result<Choice> {
        self.clear_progress()?;
        let prompt = format!("{message} [y]es/[n]o/[c]ancel ");
        queue!(self.out, Print(prompt.with(MessageType::Warning.color())))?;
        self.out.flush()?;

        terminal::enable_raw_mode()?;
        let answer = read_choice();
        terminal::disable_raw_mode()?;
        let answer = answer?;

        queue!(self.out, Print(choice_label(answer)), Print("\r\n"))?;
        self.out.flush()?;
        Ok(answer)
    }

    fn draw_progress(&mut self, label: &str, total: u64, current: u64) -> io::Result<()> {
        let percent = Progress { done: current, total }.percent();
        queue!(
            self.out,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(format!("{label} {percent:>3}%").with(MessageType::Info.color()))
        )?;
        self.out.flush()?;
        self.progress_shown = true;
        Ok(())
    }
}

impl<W: Write> Dialogs for TerminalDialogs<W> {
    fn confirm(&mut self, message: &str) -> Choice {
        if let Some(choice) = self.assume {
            debug!(?choice, message, "assumed answer");
            let line = format!("{message} {}", choice_label(choice));
            if let Err(err) = self.show_message(&line, MessageType::Info) {
                warn!(error = %err, "cannot write to terminal");
            }
            return choice;
        }
        self.ask(message).unwrap_or_else(|err| {
            warn!(error = %err, "cannot read answer, cancelling");
            Choice::Cancel
        })
    }

    fn notify(&mut self, message: &str) {
        if let Err(err) = self.show_message(message, MessageType::Warning) {
            warn!(error = %err, message, "cannot write to terminal");
        }
    }

    fn show_progress(&mut self, label: &str, total: u64, current: u64) {
        if let Err(err) = self.draw_progress(label, total, current) {
            debug!(error = %err, "cannot draw progress");
        }
    }
}

fn read_choice() -> io::Result<Choice> {
    loop {
        if let Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) = event::read()? {
            match code {
                KeyCode::Char('y' | 'Y') => return Ok(Choice::Yes),
                KeyCode::Char('n' | 'N') => return Ok(Choice::No),
                KeyCode::Char('c' | 'C') | KeyCode::Esc => return Ok(Choice::Cancel),
                _ => {}
            }
        }
    }
}

fn choice_label(choice: Choice) -> &'static str {
    match choice {
        Choice::Yes => "yes",
        Choice::No => "no",
        Choice::Cancel => "cancel",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(dialogs: &TerminalDialogs<Vec<u8>>) -> String {
        String::from_utf8_lossy(dialogs.writer()).to_string()
    }

    #[test]
    fn test_assumed_answer_is_echoed() {
        let mut dialogs = TerminalDialogs::with_writer(Vec::new()).assume(Choice::No);
        assert_eq!(dialogs.confirm("Reload a.txt?"), Choice::No);
        assert!(output(&dialogs).contains("Reload a.txt? no"));
    }

    #[test]
    fn test_notify_keeps_last_message() {
        let mut dialogs = TerminalDialogs::with_writer(Vec::new());
        dialogs.notify("disk full while writing a.txt");
        assert_eq!(
            dialogs.last_message(),
            Some(("disk full while writing a.txt", MessageType::Warning))
        );
        dialogs.clear_message();
        assert!(dialogs.last_message().is_none());
    }

    #[test]
    fn test_progress_line_replaced_by_message() {
        let mut dialogs = TerminalDialogs::with_writer(Vec::new());
        dialogs.show_progress("Loading big.txt", 200, 50);
        assert!(output(&dialogs).contains("Loading big.txt  25%"));
        assert!(dialogs.progress_shown);

        dialogs.show_message("done", MessageType::Success).unwrap();
        assert!(!dialogs.progress_shown);
    }
}
