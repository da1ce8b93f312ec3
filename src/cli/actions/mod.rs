pub mod keygen;
pub mod server;

// Keeps the match in its own module so this one stays small as actions grow.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Keygen(keygen::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
