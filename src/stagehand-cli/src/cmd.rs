pub mod copy;

/// A command the CLI can carry out.
pub trait Command {
    /// Handles the command, consuming its parsed arguments.
    fn handle(self) -> eyre::Result<()>;
}
