//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;
use niv_fs::Encoding;
use niv_io::{Choice, OpenFlags};

/// Open files through the niv load/save engine and report what it did.
#[derive(Parser, Debug)]
#[command(name = "niv", version, about = "niv file load/save driver")]
pub struct CliArgs {
    /// Files to open
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Configuration file to use instead of the default search path
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Decode files as this encoding (8bit, utf-8, utf-8-bom, utf-16le, ...)
    #[arg(short, long, value_name = "LABEL")]
    pub encoding: Option<Encoding>,

    /// Put the caret on line N of the first file (forces an inline load)
    #[arg(long, value_name = "N")]
    pub line: Option<usize>,

    /// Load everything on the calling thread
    #[arg(long)]
    pub sync: bool,

    /// Open files read-only
    #[arg(short, long)]
    pub read_only: bool,

    /// Write the current buffer to FILE before exiting
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Encoding used for --output (defaults to the buffer's)
    #[arg(long, value_name = "LABEL", requires = "output")]
    pub output_encoding: Option<Encoding>,

    /// Answer every question with yes
    #[arg(short = 'y', long, conflicts_with = "assume_no")]
    pub assume_yes: bool,

    /// Answer every question with no
    #[arg(short = 'n', long)]
    pub assume_no: bool,
}

impl CliArgs {
    /// Answer to give without prompting, if any.
    pub fn assumed_choice(&self) -> Option<Choice> {
        if self.assume_yes {
            Some(Choice::Yes)
        } else if self.assume_no {
            Some(Choice::No)
        } else {
            None
        }
    }

    /// Flags for the file at position `position` on the command line.
    pub fn open_flags(&self, position: usize) -> OpenFlags {
        OpenFlags {
            force_sync: self.sync,
            read_only: self.read_only.then_some(true),
            encoding: self.encoding,
            go_to_line: self.line.filter(|_| position == 0),
            ..OpenFlags::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_command_line() {
        let args = CliArgs::try_parse_from([
            "niv", "a.txt", "b.txt", "--encoding", "utf-16le", "--line", "4", "-o", "out.txt",
            "--output-encoding", "utf-8-bom", "-y",
        ])
        .unwrap();
        assert_eq!(args.paths.len(), 2);
        assert_eq!(args.encoding, Some(Encoding::Utf16Le));
        assert_eq!(args.output_encoding, Some(Encoding::Utf8Bom));
        assert_eq!(args.assumed_choice(), Some(Choice::Yes));
        assert_eq!(args.open_flags(0).go_to_line, Some(4));
        assert_eq!(args.open_flags(1).go_to_line, None);
    }

    #[test]
    fn test_rejects_unknown_encoding_and_conflicts() {
        assert!(CliArgs::try_parse_from(["niv", "-e", "ebcdic", "a"]).is_err());
        assert!(CliArgs::try_parse_from(["niv", "-y", "-n", "a"]).is_err());
        assert!(CliArgs::try_parse_from(["niv", "--output-encoding", "utf-8", "a"]).is_err());
    }
}
