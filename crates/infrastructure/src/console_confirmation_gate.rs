use std::io::Write;

use async_trait::async_trait;

use rolemend_application::ConfirmationGate;
use rolemend_core::{AppError, AppResult};

/// Interactive yes/no prompt on the controlling terminal.
///
/// Asked exactly once per live run, before the first write.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleConfirmationGate;

#[async_trait]
impl ConfirmationGate for ConsoleConfirmationGate {
    async fn confirm(&self) -> AppResult<bool> {
        let answer = tokio::task::spawn_blocking(|| -> Result<String, std::io::Error> {
            let mut stdout = std::io::stdout();
            write!(
                stdout,
                "Live mode applies changes to both stores. Continue? [y/N] "
            )?;
            stdout.flush()?;

            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|error| AppError::Internal(format!("confirmation prompt task failed: {error}")))?
        .map_err(|error| AppError::Internal(format!("failed to read confirmation: {error}")))?;

        let answer = answer.trim().to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}
