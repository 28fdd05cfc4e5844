//! Interrupt routing: Ctrl-C, SIGTERM, SIGHUP, SIGQUIT and the `--duration` timer.
//!
//! While a copy session runs, an interrupt clears its [`StopToken`] so the session
//! finishes its current chunk and shuts down cleanly. With no session registered the
//! process exits immediately.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use audio_session::stop::StopToken;
use crossbeam_channel::{Sender, after, bounded, select};

/// Exit status when interrupted outside a running session.
pub const EXIT_INTERRUPTED: i32 = 130;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptAction {
    /// A running session was asked to stop.
    StopSession,
    /// Nothing to stop; the process should exit.
    Exit,
}

/// Registry of the session (if any) that interrupts should stop.
#[derive(Debug, Default)]
pub struct Interrupts {
    active: Mutex<Option<StopToken>>,
}

impl Interrupts {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Route interrupts to `token` until the returned guard drops.
    pub fn activate(self: &Arc<Self>, token: StopToken) -> ActiveSession {
        *self.lock() = Some(token);
        ActiveSession {
            interrupts: self.clone(),
        }
    }

    /// Deliver one interrupt.
    pub fn interrupt(&self) -> InterruptAction {
        match self.lock().as_ref() {
            Some(token) => {
                if token.stop() {
                    tracing::info!("stopping playback or record");
                }
                InterruptAction::StopSession
            }
            None => InterruptAction::Exit,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StopToken>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Keeps a session registered with [`Interrupts`]; unregisters on drop.
pub struct ActiveSession {
    interrupts: Arc<Interrupts>,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        *self.interrupts.lock() = None;
    }
}

/// Install the Ctrl-C / termination handler, plus SIGQUIT on unix.
pub fn install_handlers(interrupts: &Arc<Interrupts>) -> Result<()> {
    let ctrl_c = interrupts.clone();
    ctrlc::set_handler(move || on_interrupt(&ctrl_c)).context("install signal handler")?;
    #[cfg(unix)]
    install_quit_handler(interrupts)?;
    Ok(())
}

/// `ctrlc` does not cover SIGQUIT; route it through the same path.
#[cfg(unix)]
fn install_quit_handler(interrupts: &Arc<Interrupts>) -> Result<()> {
    use signal_hook::consts::SIGQUIT;
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGQUIT]).context("install SIGQUIT handler")?;
    let interrupts = interrupts.clone();
    thread::spawn(move || {
        for _ in signals.forever() {
            on_interrupt(&interrupts);
        }
    });
    Ok(())
}

fn on_interrupt(interrupts: &Interrupts) {
    if interrupts.interrupt() == InterruptAction::Exit {
        std::process::exit(EXIT_INTERRUPTED);
    }
}

/// Disarms the auto-stop timer when dropped.
pub struct TimerGuard {
    disarm: Option<Sender<()>>,
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        if let Some(tx) = self.disarm.take() {
            let _ = tx.send(());
        }
    }
}

/// After `duration`, deliver an interrupt as if the user pressed Ctrl-C.
pub fn arm_timer(interrupts: &Arc<Interrupts>, duration: Duration) -> TimerGuard {
    let (disarm_tx, disarm_rx) = bounded::<()>(1);
    let interrupts = interrupts.clone();

    thread::spawn(move || {
        select! {
            recv(after(duration)) -> _ => {
                tracing::info!(seconds = duration.as_secs_f64(), "duration elapsed");
                on_interrupt(&interrupts);
            }
            recv(disarm_rx) -> _ => {}
        }
    });

    TimerGuard {
        disarm: Some(disarm_tx),
    }
}
