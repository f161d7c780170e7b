//! Operator keystroke forwarding for interactive runs.
//!
//! One reader thread owns the process stdin for the whole run. Each agent
//! invocation attaches its child's stdin while the child is live; input read
//! while nothing is attached is dropped, so a line typed between stages never
//! lands in an exited agent's pipe.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;

use anyhow::{Result, anyhow};
use tracing::{debug, trace};

type Target = Box<dyn Write + Send>;

static STARTED: OnceLock<std::result::Result<(), String>> = OnceLock::new();
static RELAY: StdinRelay = StdinRelay::new();

/// Forward process stdin into `target` until the guard is dropped.
pub fn forward_to(target: impl Write + Send + 'static) -> Result<RelayGuard<'static>> {
    STARTED
        .get_or_init(|| {
            thread::Builder::new()
                .name("pipeline-stdin".to_string())
                .spawn(|| RELAY.pump(io::stdin()))
                .map(|_| ())
                .map_err(|err| format!("spawn stdin thread: {err}"))
        })
        .clone()
        .map_err(|err| anyhow!(err))?;
    Ok(RELAY.attach(Box::new(target)))
}

/// Single-target byte relay.
pub struct StdinRelay {
    next_id: AtomicU64,
    closed: AtomicBool,
    current: Mutex<Option<(u64, Target)>>,
}

impl StdinRelay {
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
            current: Mutex::new(None),
        }
    }

    /// Replace the current target. After the source hit EOF the target is
    /// dropped immediately so the child sees EOF too.
    pub fn attach(&self, target: Target) -> RelayGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if !self.closed.load(Ordering::SeqCst) {
            *self.lock() = Some((id, target));
        }
        RelayGuard { relay: self, id }
    }

    /// Write `chunk` to the current target. Returns false when nothing is
    /// attached or the target stopped accepting input; a failed target is
    /// detached.
    pub fn forward(&self, chunk: &[u8]) -> bool {
        let mut current = self.lock();
        let Some((id, target)) = current.as_mut() else {
            trace!(bytes = chunk.len(), "no agent attached, dropping input");
            return false;
        };
        match target.write_all(chunk).and_then(|()| target.flush()) {
            Ok(()) => true,
            Err(err) => {
                debug!(target_id = *id, err = %err, "agent stdin closed, detaching");
                *current = None;
                false
            }
        }
    }

    /// Read `source` to EOF, forwarding every chunk.
    pub fn pump<R: Read>(&self, mut source: R) {
        let mut chunk = [0u8; 4096];
        loop {
            match source.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => {
                    self.forward(&chunk[..n]);
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(err = %err, "reading stdin failed");
                    break;
                }
            }
        }
        self.closed.store(true, Ordering::SeqCst);
        *self.lock() = None;
    }

    fn clear(&self, id: u64) {
        let mut current = self.lock();
        if current.as_ref().is_some_and(|(owner, _)| *owner == id) {
            *current = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<(u64, Target)>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for StdinRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// Detaches its target from the relay on drop.
pub struct RelayGuard<'a> {
    relay: &'a StdinRelay,
    id: u64,
}

impl Drop for RelayGuard<'_> {
    fn drop(&mut self) {
        self.relay.clear(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc::{self, Receiver};
    use std::time::{Duration, Instant};

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Shared {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().expect("lock")).into_owned()
        }
    }

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Reader fed chunk by chunk from a channel, like a terminal.
    struct Typed(Receiver<Vec<u8>>);

    impl Read for Typed {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.recv() {
                Ok(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Err(_) => Ok(0),
            }
        }
    }

    fn wait_for(sink: &Shared, expected: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while sink.text() != expected {
            assert!(Instant::now() < deadline, "got {:?}", sink.text());
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn consecutive_invocations_each_get_their_own_input() {
        let relay = Arc::new(StdinRelay::new());
        let (keys, typed) = mpsc::channel();
        let pump = {
            let relay = Arc::clone(&relay);
            thread::spawn(move || relay.pump(Typed(typed)))
        };

        let first = Shared::default();
        let guard = relay.attach(Box::new(first.clone()));
        keys.send(b"one\n".to_vec()).expect("send");
        wait_for(&first, "one\n");
        drop(guard);

        let second = Shared::default();
        let _guard = relay.attach(Box::new(second.clone()));
        keys.send(b"two\n".to_vec()).expect("send");
        wait_for(&second, "two\n");
        assert_eq!(first.text(), "one\n");

        drop(keys);
        pump.join().expect("pump");
        assert!(!relay.forward(b"late"));
    }

    #[test]
    fn input_between_invocations_is_dropped() {
        let relay = StdinRelay::new();
        assert!(!relay.forward(b"stray\n"));
        let sink = Shared::default();
        let _guard = relay.attach(Box::new(sink.clone()));
        assert!(relay.forward(b"kept\n"));
        assert_eq!(sink.text(), "kept\n");
    }

    #[test]
    fn closed_target_is_detached() {
        let relay = StdinRelay::new();
        let _guard = relay.attach(Box::new(Closed));
        assert!(!relay.forward(b"x"));
        assert!(relay.lock().is_none());
    }

    #[test]
    fn stale_guard_does_not_detach_newer_target() {
        let relay = StdinRelay::new();
        let first = relay.attach(Box::new(Shared::default()));
        let sink = Shared::default();
        let _second = relay.attach(Box::new(sink.clone()));
        drop(first);
        assert!(relay.forward(b"y"));
        assert_eq!(sink.text(), "y");
    }

    #[test]
    fn attach_after_eof_drops_target() {
        let relay = StdinRelay::new();
        relay.pump(io::empty());
        let _guard = relay.attach(Box::new(Shared::default()));
        assert!(!relay.forward(b"z"));
    }
}
