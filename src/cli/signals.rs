//! Shutdown signal handling for the recording runner

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

/// Which signal asked the recording to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    Interrupt,
    Terminate,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Latches the first SIGINT/SIGTERM received after `setup`
pub struct ShutdownSignal {
    sender: Arc<watch::Sender<Option<ShutdownReason>>>,
    receiver: watch::Receiver<Option<ShutdownReason>>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// The signal received so far, if any
    pub fn reason(&self) -> Option<ShutdownReason> {
        *self.receiver.borrow()
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.reason().is_some()
    }

    /// Record a shutdown request. Later requests keep the first reason.
    pub fn trigger(&self, reason: ShutdownReason) {
        latch(&self.sender, reason);
    }

    /// Wait until a shutdown is requested
    pub async fn wait(&mut self) -> ShutdownReason {
        loop {
            if let Some(reason) = *self.receiver.borrow_and_update() {
                return reason;
            }
            if self.receiver.changed().await.is_err() {
                // Sender is owned by self, so this only happens on teardown.
                return ShutdownReason::Interrupt;
            }
        }
    }

    /// Install SIGINT and SIGTERM handlers
    #[cfg(unix)]
    pub async fn setup(&self) -> Result<(), std::io::Error> {
        use tokio::signal::unix::{signal, SignalKind};

        for (kind, reason) in [
            (SignalKind::interrupt(), ShutdownReason::Interrupt),
            (SignalKind::terminate(), ShutdownReason::Terminate),
        ] {
            let mut stream = signal(kind)?;
            let sender = Arc::clone(&self.sender);
            tokio::spawn(async move {
                if stream.recv().await.is_some() {
                    debug!(signal = %reason, "Shutdown signal received");
                    latch(&sender, reason);
                }
            });
        }

        Ok(())
    }

    /// Install a Ctrl+C handler
    #[cfg(not(unix))]
    pub async fn setup(&self) -> Result<(), std::io::Error> {
        let sender = Arc::clone(&self.sender);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                debug!("Ctrl+C received");
                latch(&sender, ShutdownReason::Interrupt);
            }
        });
        Ok(())
    }
}

fn latch(sender: &watch::Sender<Option<ShutdownReason>>, reason: ShutdownReason) {
    sender.send_if_modified(|current| {
        if current.is_some() {
            return false;
        }
        *current = Some(reason);
        true
    });
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_signal_default_is_false() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
        assert_eq!(signal.reason(), None);
    }

    #[test]
    fn first_reason_wins() {
        let signal = ShutdownSignal::new();
        signal.trigger(ShutdownReason::Terminate);
        signal.trigger(ShutdownReason::Interrupt);
        assert_eq!(signal.reason(), Some(ShutdownReason::Terminate));
    }

    #[tokio::test]
    async fn wait_returns_after_trigger() {
        let mut signal = ShutdownSignal::new();
        signal.trigger(ShutdownReason::Interrupt);
        assert_eq!(signal.wait().await, ShutdownReason::Interrupt);
    }

    #[tokio::test]
    async fn setup_installs_handlers() {
        let signal = ShutdownSignal::new();
        signal.setup().await.unwrap();
        assert!(!signal.is_shutdown());
    }
}
