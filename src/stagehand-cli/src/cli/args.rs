use std::time::Duration;

use clap::{ArgAction, Args};
use stagehand::{
    Tuning,
    config::{
        DEFAULT_LOOK_AHEAD, DEFAULT_POLL_INTERVAL, STAGEHAND_LOOK_AHEAD, STAGEHAND_POLL_INTERVAL_MS,
    },
};

/// Configures the verbosity of the builtin logger.
#[derive(Clone, Copy, Debug, Args)]
pub struct Verbosity {
    /// Configures the log verbosity of Stagehand.
    ///
    /// `-v` is Debug, `-vv` is Trace.
    #[clap(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl Verbosity {
    /// Configures the global logger based on the settings.
    pub fn setup(self) -> eyre::Result<()> {
        let level = self.log_level();
        simple_logger::init_with_level(level)?;

        Ok(())
    }

    fn log_level(self) -> log::Level {
        match self.verbose {
            0 => log::Level::Info,
            1 => log::Level::Debug,
            _ => log::Level::Trace,
        }
    }
}

/// Tuning knobs for the background workers.
#[derive(Clone, Copy, Debug, Args)]
pub struct TuningArgs {
    /// How many lines may be read ahead of the writer.
    #[clap(long, env = STAGEHAND_LOOK_AHEAD, default_value_t = DEFAULT_LOOK_AHEAD)]
    pub look_ahead: usize,

    /// Upper bound in milliseconds for a single idle wait of a worker.
    ///
    /// 0 makes the workers rely on notifications only.
    #[clap(
        long,
        env = STAGEHAND_POLL_INTERVAL_MS,
        default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64
    )]
    pub poll_interval: u64,
}

impl TuningArgs {
    /// Converts the arguments into worker [`Tuning`].
    pub fn tuning(self) -> Tuning {
        Tuning {
            poll_interval: Duration::from_millis(self.poll_interval),
            look_ahead: self.look_ahead,
        }
    }
}
