// Signal handling for interrupting long-running stages

use crate::cancel::Cancellation;
use crate::error::{PaperRagError, Result};
use tokio::signal::unix::{signal, Signal as TokioSignal, SignalKind};
use tokio::task::JoinHandle;

/// Listens for SIGTERM and SIGINT
pub struct SignalHandler {
    sigterm: TokioSignal,
    sigint: TokioSignal,
}

impl SignalHandler {
    pub fn new() -> Result<Self> {
        let sigterm = signal(SignalKind::terminate()).map_err(|e| PaperRagError::Io {
            source: e,
            context: "Failed to setup SIGTERM handler".to_string(),
        })?;
        let sigint = signal(SignalKind::interrupt()).map_err(|e| PaperRagError::Io {
            source: e,
            context: "Failed to setup SIGINT handler".to_string(),
        })?;

        Ok(Self { sigterm, sigint })
    }

    /// Wait for a signal; returns its name
    pub async fn wait(&mut self) -> &'static str {
        tokio::select! {
            _ = self.sigterm.recv() => "terminate",
            _ = self.sigint.recv() => "interrupt",
        }
    }
}

/// Trip `cancel` on the first SIGTERM/SIGINT and exit on the second.
///
/// In-flight items finish or are discarded by their stage.
pub fn cancel_on_signal(cancel: Cancellation) -> Result<JoinHandle<()>> {
    let mut handler = SignalHandler::new()?;
    Ok(tokio::spawn(async move {
        let sig = handler.wait().await;
        tracing::warn!("Received {}, finishing in-flight work", sig);
        cancel.cancel();

        let sig = handler.wait().await;
        tracing::warn!("Received {} again, exiting", sig);
        std::process::exit(130);
    }))
}
