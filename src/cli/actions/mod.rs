pub mod rotate;
pub mod server;

mod run;
mod signal;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    Rotate(rotate::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
