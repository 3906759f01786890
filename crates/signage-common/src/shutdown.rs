//! Process shutdown signals shared by both binaries.

use std::future::Future;
use std::io;

/// Which signal asked the process to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

/// Listen for SIGINT and SIGTERM. The returned future resolves on
/// whichever arrives first.
///
/// Listeners are installed before this returns, so a signal delivered
/// after the call is never lost.
#[cfg(unix)]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ShutdownSignal>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => ShutdownSignal::Interrupt,
            _ = terminate.recv() => ShutdownSignal::Terminate,
        }
    })
}

#[cfg(not(unix))]
pub fn shutdown_signal() -> io::Result<impl Future<Output = ShutdownSignal>> {
    Ok(async {
        let _ = tokio::signal::ctrl_c().await;
        ShutdownSignal::Interrupt
    })
}
