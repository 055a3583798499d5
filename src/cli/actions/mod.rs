pub mod server;

/// Work selected by the command line.
#[derive(Debug)]
pub enum Action {
    /// Serve the library API until a shutdown signal arrives.
    Server(server::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Server(args) => server::execute(args).await,
        }
    }
}
