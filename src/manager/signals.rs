// src/manager/signals.rs

//! Bridge from OS signals to coordinator actions.
//!
//! - SIGHUP → `reload`
//! - SIGTERM, SIGINT, SIGQUIT → `quit` (the bridge ends afterwards)
//!
//! There is nobody to report results to, so they are only logged.

use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::errors::Result;
use crate::manager::action::{Command, ManagerHandle};

pub fn spawn_signal_bridge(handle: ManagerHandle) -> Result<JoinHandle<()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut quit = signal(SignalKind::quit())?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                _ = hangup.recv() => {
                    warn!("caught SIGHUP; reloading configuration");
                    report(Command::Reload, handle.submit(Command::Reload, Vec::new()).await);
                    continue;
                }
                _ = terminate.recv() => "SIGTERM",
                _ = interrupt.recv() => "SIGINT",
                _ = quit.recv() => "SIGQUIT",
            };

            warn!(signal = name, "caught signal; shutting down");
            report(Command::Quit, handle.submit(Command::Quit, Vec::new()).await);
            break;
        }
    }))
}

fn report(command: Command, result: crate::manager::ActionResult) {
    match result {
        Ok(text) => info!(%command, response = %text, "signal action done"),
        Err(e) => error!(%command, error = %e, "signal action failed"),
    }
}
