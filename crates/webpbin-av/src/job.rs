//! Pieces shared by the conversion builders: quality, inputs and outputs.

use std::ffi::OsString;
use std::fmt;
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::command::ToolCommand;

/// Argument meaning "standard input" or "standard output" to the WebP tools.
pub const STDIO_SENTINEL: &str = "-";

/// Compression factor between 0 and 100.
///
/// A small factor produces a smaller file with lower quality; 100 gives the
/// best quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: Quality = Quality(100);

    /// Build a quality, capping anything above 100.
    pub fn new(value: u32) -> Self {
        Quality(value.min(100) as u8)
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<u32> for Quality {
    fn from(value: u32) -> Self {
        Quality::new(value)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A file or byte-stream input.
pub enum Source<'a> {
    File(PathBuf),
    Stream(Box<dyn Read + Send + 'a>),
}

impl fmt::Debug for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => f.debug_tuple("File").field(path).finish(),
            Source::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl<'a> Source<'a> {
    /// The positional arguments that select this input.
    pub(crate) fn arguments(&self) -> Vec<OsString> {
        match self {
            Source::File(path) => vec![path.clone().into_os_string()],
            Source::Stream(_) => stdin_arguments(),
        }
    }

    /// Attach stdin when streaming. Arguments come from [`Source::arguments`].
    pub(crate) fn attach(self, cmd: &mut ToolCommand<'a>) {
        if let Source::Stream(reader) = self {
            cmd.stdin(reader);
        }
    }
}

/// `--` stops option parsing so the tools read `-` as stdin, not a flag.
pub(crate) fn stdin_arguments() -> Vec<OsString> {
    vec![OsString::from("--"), OsString::from(STDIO_SENTINEL)]
}

/// A file or byte-stream output.
pub enum Sink<'a> {
    File(PathBuf),
    Stream(&'a mut (dyn Write + Send)),
}

impl fmt::Debug for Sink<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sink::File(path) => f.debug_tuple("File").field(path).finish(),
            Sink::Stream(_) => f.write_str("Stream"),
        }
    }
}

impl<'a> Sink<'a> {
    /// The value passed after `-o`.
    pub(crate) fn target(&self) -> OsString {
        match self {
            Sink::File(path) => path.clone().into_os_string(),
            Sink::Stream(_) => OsString::from(STDIO_SENTINEL),
        }
    }

    /// Attach stdout when streaming. `-o <target>` comes from [`Sink::target`].
    pub(crate) fn attach(self, cmd: &mut ToolCommand<'a>) {
        if let Sink::Stream(writer) = self {
            cmd.stdout(writer);
        }
    }
}
