use std::{convert::Infallible, path::PathBuf};

use clap::Args;
use eyre::Context;
use stagehand::{
    CoalescingExecutor, PrefetchingReader, ReadError, ReaderBuilder, Tuning, WriterBuilder,
};

use super::Command;
use crate::cli::{
    Chunk, HYPHEN, InputSource, LineError, LineSink, LineSource, OutputSource, TuningArgs,
};

// How many copied lines make up one progress report request.
const PROGRESS_STEP: usize = 1000;

/// Copies lines from an input to an output through background workers.
///
/// Lines are read ahead of time on one worker and written on another,
/// so slow sources and sinks overlap instead of adding up.
#[derive(Debug, Args)]
pub struct CopyLines {
    /// The input to read lines from.
    ///
    /// When the value is "-", then input will be read from stdin.
    input: String,

    /// The output to write lines to.
    ///
    /// Defaults to "-" for printing output to stdout.
    #[clap(short, default_value = HYPHEN)]
    output: PathBuf,

    /// Skips the given number of leading lines, e.g. a header row.
    #[clap(long, default_value_t = 0)]
    skip: usize,

    /// Stops after copying the given number of lines.
    ///
    /// No line past the limit is ever requested from the input, so
    /// copying from a pipe that stays open ends once the limit is met.
    #[clap(long)]
    limit: Option<usize>,

    #[clap(flatten)]
    tuning: TuningArgs,
}

type LineReader = PrefetchingReader<Vec<u8>, LineError>;

/// Reads the next line, mapping the end of input to [`None`].
fn next_line(reader: &mut LineReader) -> eyre::Result<Option<Vec<u8>>> {
    match reader.read() {
        Ok(line) => Ok(Some(line)),
        Err(ReadError::Source(LineError::EndOfInput)) => Ok(None),
        Err(e) => Err(e).context("failed to read input"),
    }
}

/// Copies up to `limit` lines after the first `skip` ones from `source`
/// to `sink` and returns the number of copied lines.
fn copy_lines(
    mut source: LineSource,
    mut sink: LineSink,
    skip: usize,
    limit: Option<usize>,
    tuning: Tuning,
) -> eyre::Result<usize> {
    let limit = limit.unwrap_or(usize::MAX);

    // The worker reads ahead, so it must be stopped from touching the
    // input past the last line we will ever ask for.
    let mut budget = skip.saturating_add(limit);
    let mut reader = ReaderBuilder::new()
        .tuning(tuning)
        .spawn(move || {
            if budget == 0 {
                return Err(LineError::EndOfInput);
            }
            budget -= 1;
            source.next_line()
        })
        .context("failed to start reader")?;
    let writer = WriterBuilder::new()
        .tuning(tuning)
        .spawn(move |chunk: Chunk| sink.put(chunk))
        .context("failed to start writer")?;
    let progress = CoalescingExecutor::new(|copied: usize| {
        log::debug!("Copied {copied} lines so far");
        Ok::<_, Infallible>(copied)
    });

    for _ in 0..skip {
        if next_line(&mut reader)?.is_none() {
            break;
        }
    }

    let mut copied = 0;
    while copied < limit {
        let Some(line) = next_line(&mut reader)? else {
            break;
        };

        writer.write(Chunk::Line(line));
        copied += 1;

        if copied % PROGRESS_STEP == 0 {
            progress.execute(copied);
        }
    }

    reader.dispose();

    writer.write(Chunk::Flush);
    writer.close().context("failed to write output")?;

    progress.wait_idle();
    log::debug!(
        "Last progress report at {}",
        progress.latest_result().unwrap_or(0)
    );

    Ok(copied)
}

impl Command for CopyLines {
    fn handle(self) -> eyre::Result<()> {
        let input = InputSource::parse(&self.input);
        let output = OutputSource::parse(self.output);

        let source = LineSource::open(&input)?;
        let sink = LineSink::create(&output)?;

        let copied = copy_lines(source, sink, self.skip, self.limit, self.tuning.tuning())?;
        log::info!("Copied {copied} line(s)");

        Ok(())
    }
}
