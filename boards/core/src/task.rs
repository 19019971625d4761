//! Cooperative periodic workers.
//!
//! A worker is a loop body ([`Periodic`]) plus a [`StopFlag`] checked once per
//! iteration. Stopping never interrupts a running iteration, so a caller must
//! be prepared to wait for one full pass of the body plus the idle wait.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request termination after the current iteration
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous stop request
    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_about_to_stop(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Work was done, run again immediately
    Busy,
    /// Nothing to do, sleep before the next iteration
    Idle,
}

/// Body of a periodic worker
pub trait Periodic: Send {
    fn execute(&mut self) -> Step;
}

impl<F: FnMut() -> Step + Send> Periodic for F {
    fn execute(&mut self) -> Step {
        self()
    }
}

/// Run `body` on the current thread until `flag` is set
pub fn run_periodic<P: Periodic + ?Sized>(body: &mut P, flag: &StopFlag, idle_wait: Duration) {
    while !flag.is_about_to_stop() {
        if body.execute() == Step::Idle {
            thread::sleep(idle_wait);
        }
    }
}

/// A periodic worker running on its own thread
pub struct Task<P: Periodic + 'static> {
    name: String,
    flag: StopFlag,
    handle: Option<JoinHandle<P>>,
}

impl<P: Periodic + 'static> Task<P> {
    /// Spawn a named thread driving `body`
    pub fn spawn(name: impl Into<String>, body: P, idle_wait: Duration) -> io::Result<Self> {
        Self::spawn_with_flag(name, body, StopFlag::new(), idle_wait)
    }

    /// Spawn using an existing flag, clearing any earlier stop request
    pub fn spawn_with_flag(
        name: impl Into<String>,
        mut body: P,
        flag: StopFlag,
        idle_wait: Duration,
    ) -> io::Result<Self> {
        let name = name.into();
        flag.resume();
        let thread_flag = flag.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            run_periodic(&mut body, &thread_flag, idle_wait);
            body
        })?;
        debug!(task = %name, "started");
        Ok(Self {
            name,
            flag,
            handle: Some(handle),
        })
    }

    pub fn flag(&self) -> &StopFlag {
        &self.flag
    }

    /// Flag the worker to end after its current iteration
    pub fn stop(&self) {
        self.flag.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the worker and wait for it, handing the body back.
    ///
    /// Returns `None` if the worker thread panicked.
    pub fn join(mut self) -> Option<P> {
        self.stop();
        let handle = self.handle.take()?;
        let body = handle.join().ok();
        debug!(task = %self.name, panicked = body.is_none(), "stopped");
        body
    }
}

impl<P: Periodic + 'static> Drop for Task<P> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.flag.stop();
            let _ = handle.join();
        }
    }
}
