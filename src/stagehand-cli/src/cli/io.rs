use std::{
    fs,
    io::{self, BufRead, IsTerminal, Write},
    path::PathBuf,
    process,
};

use clap::CommandFactory;
use eyre::Context;
use thiserror::Error;

use crate::cli::{Cli, HYPHEN};

/// An input source for line-oriented commands.
#[derive(Clone, Debug)]
pub enum InputSource {
    /// The input will be read from stdin.
    Stdin,
    /// The input will be read from a file.
    File(PathBuf),
}

impl InputSource {
    pub fn parse(input: &str) -> Self {
        if input == HYPHEN {
            Self::Stdin
        } else {
            Self::File(input.into())
        }
    }
}

/// An output sink for line-oriented commands.
#[derive(Clone, Debug)]
pub enum OutputSource {
    /// The output will be written to stdout.
    Stdout,
    /// The output will be written to a file.
    File(PathBuf),
}

impl OutputSource {
    pub fn parse(output: PathBuf) -> Self {
        if output.as_os_str() == HYPHEN {
            Self::Stdout
        } else {
            Self::File(output)
        }
    }
}

/// Errors produced while pulling lines from a [`LineSource`].
#[derive(Debug, Error)]
pub enum LineError {
    /// All lines have been read.
    #[error("end of input")]
    EndOfInput,

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A source of raw lines, without their line terminators.
///
/// Lines are kept as bytes so that input which is not valid UTF-8
/// passes through unchanged.
pub struct LineSource {
    inner: Box<dyn BufRead + Send>,
    buf: Vec<u8>,
}

impl LineSource {
    pub fn new(inner: Box<dyn BufRead + Send>) -> Self {
        Self {
            inner,
            buf: Vec::new(),
        }
    }

    /// Opens the given input source for reading.
    ///
    /// This function will terminate the process and print the
    /// command's help if stdin is connected to a terminal.
    pub fn open(input: &InputSource) -> eyre::Result<Self> {
        let inner: Box<dyn BufRead + Send> = match input {
            InputSource::Stdin => {
                let stdin = io::stdin();
                if stdin.is_terminal() {
                    let _ = Cli::command().print_help();
                    process::exit(2);
                }

                Box::new(io::BufReader::new(stdin))
            }

            InputSource::File(path) => {
                let file = fs::File::open(path)
                    .with_context(|| format!("failed to open '{}'", path.display()))?;
                Box::new(io::BufReader::new(file))
            }
        };

        Ok(Self::new(inner))
    }

    /// Reads the next line.
    pub fn next_line(&mut self) -> Result<Vec<u8>, LineError> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
            return Err(LineError::EndOfInput);
        }

        let line = self.buf.strip_suffix(b"\n").unwrap_or(&self.buf);
        let line = line.strip_suffix(b"\r").unwrap_or(line);

        Ok(line.to_vec())
    }
}

/// A piece of work for a [`LineSink`].
#[derive(Debug)]
pub enum Chunk {
    /// A line to write, which will be terminated.
    Line(Vec<u8>),
    /// Flushes everything written so far.
    Flush,
}

/// A buffered sink for raw lines.
pub struct LineSink {
    inner: Box<dyn Write + Send>,
}

impl LineSink {
    pub fn new(inner: Box<dyn Write + Send>) -> Self {
        Self { inner }
    }

    /// Creates or truncates the given output for writing.
    pub fn create(output: &OutputSource) -> eyre::Result<Self> {
        let inner: Box<dyn Write + Send> = match output {
            OutputSource::Stdout => Box::new(io::BufWriter::new(io::stdout())),
            OutputSource::File(path) => {
                let file = fs::File::create(path)
                    .with_context(|| format!("failed to create '{}'", path.display()))?;
                Box::new(io::BufWriter::new(file))
            }
        };

        Ok(Self::new(inner))
    }

    /// Processes a single chunk.
    pub fn put(&mut self, chunk: Chunk) -> io::Result<()> {
        match chunk {
            Chunk::Line(line) => {
                self.inner.write_all(&line)?;
                self.inner.write_all(b"\n")
            }
            Chunk::Flush => self.inner.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_line_terminators() {
        let mut source = LineSource::new(Box::new(io::Cursor::new("id\tname\r\n1\tfoo\n2\tbar")));

        assert_eq!(source.next_line().unwrap(), b"id\tname");
        assert_eq!(source.next_line().unwrap(), b"1\tfoo");
        assert_eq!(source.next_line().unwrap(), b"2\tbar");
        assert!(matches!(source.next_line(), Err(LineError::EndOfInput)));
    }

    #[test]
    fn keeps_lines_that_are_not_utf8() {
        let mut source = LineSource::new(Box::new(io::Cursor::new(&b"a\n\xff\xfe\r\nb\n"[..])));

        assert_eq!(source.next_line().unwrap(), b"a");
        assert_eq!(source.next_line().unwrap(), b"\xff\xfe");
        assert_eq!(source.next_line().unwrap(), b"b");
        assert!(matches!(source.next_line(), Err(LineError::EndOfInput)));
    }

    #[test]
    fn parses_hyphen_as_std_streams() {
        assert!(matches!(InputSource::parse(HYPHEN), InputSource::Stdin));
        assert!(matches!(InputSource::parse("rows.tsv"), InputSource::File(..)));
        assert!(matches!(OutputSource::parse(HYPHEN.into()), OutputSource::Stdout));
    }
}
