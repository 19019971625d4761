//! Built-in processor logging every key event

use g19::{InputEvent, InputProcessor};
use tracing::info;

/// Logs events and never consumes them, so it can sit anywhere in the chain
pub struct EventLogger;

impl InputProcessor for EventLogger {
    fn process_input(&self, event: &InputEvent) -> bool {
        if !event.keys_down.is_empty() {
            info!(endpoint = ?event.endpoint, keys = ?event.keys_down, "pressed");
        }
        if !event.keys_up.is_empty() {
            info!(endpoint = ?event.endpoint, keys = ?event.keys_up, "released");
        }
        false
    }
}
