//! Poll loop turning key packets into events for registered processors.

use std::sync::Arc;
use std::time::Duration;

use g19_core::{run_periodic, InEndpoint, Periodic, SharedTransport, Step, StopFlag};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::state::{InputEvent, KeyState};

/// Object to process key presses.
///
/// Called synchronously on the poll thread, so implementations must return
/// quickly and hand off any slow work to their own thread. A slow processor
/// stalls input handling for every other processor.
pub trait InputProcessor: Send + Sync {
    /// Process the event, returning true if it was consumed
    fn process_input(&self, event: &InputEvent) -> bool;
}

impl<F: Fn(&InputEvent) -> bool + Send + Sync> InputProcessor for F {
    fn process_input(&self, event: &InputEvent) -> bool {
        self(event)
    }
}

/// Ordered, append-only list of processors shared with application threads
#[derive(Clone, Default)]
pub struct Processors(Arc<Mutex<Vec<Arc<dyn InputProcessor>>>>);

impl Processors {
    pub fn add(&self, processor: Arc<dyn InputProcessor>) {
        self.0.lock().push(processor);
    }

    /// Copy of the current list
    pub fn snapshot(&self) -> Vec<Arc<dyn InputProcessor>> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offer an event in registration order until one consumes it
    pub fn dispatch(&self, event: &InputEvent) -> bool {
        self.snapshot().iter().any(|p| p.process_input(event))
    }
}

/// Timing of the poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Upper bound for each endpoint read
    pub read_timeout: Duration,
    /// Sleep after an iteration without data
    pub idle_sleep: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_millis(10),
            idle_sleep: Duration::from_millis(30),
        }
    }
}

/// Consumes all data sent by the special keys
pub struct Receiver {
    transport: Arc<SharedTransport>,
    processors: Processors,
    state: KeyState,
    config: PollConfig,
    flag: StopFlag,
}

impl Receiver {
    pub fn new(transport: Arc<SharedTransport>, config: PollConfig) -> Self {
        Self {
            transport,
            processors: Processors::default(),
            state: KeyState::new(),
            config,
            flag: StopFlag::new(),
        }
    }

    /// Share an existing processor list
    pub fn with_processors(mut self, processors: Processors) -> Self {
        self.processors = processors;
        self
    }

    pub fn processors(&self) -> &Processors {
        &self.processors
    }

    pub fn add_input_processor(&self, processor: Arc<dyn InputProcessor>) {
        self.processors.add(processor);
    }

    pub fn state(&self) -> &KeyState {
        &self.state
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Flag checked once per iteration by [`Receiver::run`]
    pub fn stop_flag(&self) -> &StopFlag {
        &self.flag
    }

    /// Stop [`Receiver::run`] after its current iteration
    pub fn stop(&self) {
        self.flag.stop();
    }

    /// Poll until stopped
    pub fn run(&mut self) {
        let flag = self.flag.clone();
        let idle = self.config.idle_sleep;
        run_periodic(self, &flag, idle);
    }

    /// Read every endpoint once and dispatch what it reported.
    ///
    /// Returns true if any endpoint yielded data.
    pub fn poll_once(&mut self) -> bool {
        let mut got_data = false;
        for endpoint in InEndpoint::ALL {
            let packet = match self.transport.read(
                endpoint,
                endpoint.read_len(),
                self.config.read_timeout,
            ) {
                Ok(packet) => packet,
                Err(e) => {
                    trace!(?endpoint, "read failed: {e}");
                    continue;
                },
            };
            if packet.is_empty() {
                continue;
            }
            got_data = true;
            self.handle_packet(endpoint, &packet);
        }
        got_data
    }

    fn handle_packet(&mut self, endpoint: InEndpoint, packet: &[u8]) {
        match self.state.process(endpoint, packet) {
            Ok(Some(event)) => {
                debug!(?endpoint, down = ?event.keys_down, up = ?event.keys_up, "key event");
                if !self.processors.dispatch(&event) {
                    trace!(?endpoint, "event not consumed");
                }
            },
            Ok(None) => trace!(?endpoint, "{packet:02x?} ignored"),
            Err(e) => warn!("dropping packet: {e}"),
        }
    }
}

impl Periodic for Receiver {
    fn execute(&mut self) -> Step {
        if self.poll_once() {
            Step::Busy
        } else {
            Step::Idle
        }
    }
}
