//! Process-wide interrupt handling.
//!
//! SIGINT/SIGTERM handlers are registered at most once per process, no matter
//! how many pipeline runs or agent invocations happen. While an agent is live
//! its invocation owns the single listener slot and the interrupt is routed
//! there, so the invocation can terminate and reap the child. With no live
//! agent there is nothing to clean up and the process exits immediately.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};
use std::thread;

use anyhow::{Context, Result, anyhow};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{debug, warn};

use crate::exit_codes;
use crate::io::console;

type Listener = Box<dyn Fn() + Send>;

static INSTALL: OnceLock<std::result::Result<(), String>> = OnceLock::new();
static REGISTRATIONS: AtomicUsize = AtomicUsize::new(0);
static LISTENER: ListenerSlot = ListenerSlot::new();

/// Register the interrupt handlers. Safe to call any number of times.
pub fn install() -> Result<()> {
    INSTALL
        .get_or_init(|| register().map_err(|err| format!("{err:#}")))
        .clone()
        .map_err(|err| anyhow!(err))
}

/// Number of times handlers were actually registered in this process.
pub fn registrations() -> usize {
    REGISTRATIONS.load(Ordering::SeqCst)
}

/// Route interrupts to `listener` until the guard is dropped.
pub fn on_interrupt(listener: impl Fn() + Send + 'static) -> InterruptGuard<'static> {
    LISTENER.set(Box::new(listener))
}

fn register() -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM]).context("register signal handlers")?;
    thread::Builder::new()
        .name("pipeline-signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                warn!(signal, "interrupt received");
                if !LISTENER.notify() {
                    console::error("Interrupted");
                    std::process::exit(exit_codes::INTERRUPTED);
                }
            }
        })
        .context("spawn signal thread")?;
    REGISTRATIONS.fetch_add(1, Ordering::SeqCst);
    debug!("interrupt handlers registered");
    Ok(())
}

/// Single-occupant listener slot.
pub struct ListenerSlot {
    next_id: AtomicU64,
    current: Mutex<Option<(u64, Listener)>>,
}

impl ListenerSlot {
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            current: Mutex::new(None),
        }
    }

    /// Replace the current listener.
    pub fn set(&self, listener: Listener) -> InterruptGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        *self.lock() = Some((id, listener));
        InterruptGuard { slot: self, id }
    }

    /// Call the current listener. Returns false when the slot is empty.
    pub fn notify(&self) -> bool {
        match self.lock().as_ref() {
            Some((_, listener)) => {
                listener();
                true
            }
            None => false,
        }
    }

    fn clear(&self, id: u64) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|(owner, _)| *owner == id) {
            *current = None;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<(u64, Listener)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ListenerSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Clears its listener from the slot on drop.
pub struct InterruptGuard<'a> {
    slot: &'a ListenerSlot,
    id: u64,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.slot.clear(self.id);
    }
}
