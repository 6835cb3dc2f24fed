use clap::{Parser, Subcommand};

use crate::cmd::*;

mod args;
pub use args::*;

pub mod io;
pub use io::*;

pub const HYPHEN: &str = "-";

/// The CLI interface for the Stagehand application.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub struct Cli {
    /// The selected command.
    #[clap(subcommand)]
    pub command: StagehandCommand,

    #[clap(flatten)]
    pub verbosity: Verbosity,
}

/// The top-level commands supported by Stagehand.
#[derive(Debug, Subcommand)]
pub enum StagehandCommand {
    Copy(copy::CopyLines),
}

impl Command for StagehandCommand {
    fn handle(self) -> eyre::Result<()> {
        match self {
            Self::Copy(copy) => copy.handle(),
        }
    }
}
