//! High level libusb abstraction for the Logitech G19 keys and display.
//!
//! Every method is thread-safe: the poll thread and application threads share
//! one transport lock per USB call.

use std::sync::Arc;
use std::time::Duration;

use g19_core::{OutEndpoint, SharedTransport, Task, Transport};
use tracing::info;

pub mod abi;
pub mod frame;
pub mod keys;
pub mod receiver;
pub mod state;
pub mod types;
pub mod usb;

pub use frame::{encode_frame, encode_solid_color, rgb_to_565, Rgb};
pub use keys::{Key, KeySet};
pub use receiver::{InputProcessor, PollConfig, Processors, Receiver};
pub use state::{InputEvent, KeyState, Transition};
pub use types::{FrameSizeError, G19Error, MKeyLeds, PacketDecodeError, Result};

pub mod consts {
    pub const LOGITECH_VENDOR_ID: u16 = 0x046d;
    pub const G19_KEYBOARD_PRODUCT_ID: u16 = 0xc228;
    pub const G19_LCD_PRODUCT_ID: u16 = 0xc229;

    pub const LCD_DISPLAY_INTERFACE: u8 = 0;
    pub const LCD_CONTROL_INTERFACE: u8 = 1;
    pub const KEYBOARD_MULTIMEDIA_INTERFACE: u8 = 1;

    pub const EP_DISPLAY_MENU_KEYS: u8 = 0x81;
    pub const EP_MULTIMEDIA_KEYS: u8 = 0x82;
    pub const EP_G_AND_M_KEYS: u8 = 0x83;
    pub const EP_DISPLAY: u8 = 0x02;
}

/// Timeout for frame transfers and persistent settings
const BULK_TIMEOUT: Duration = Duration::from_millis(1000);
/// Timeout for quick control transfers
const CONTROL_TIMEOUT: Duration = Duration::from_millis(10);

/// Owner of a G19: runs the key receiver and hands out command handles
pub struct G19 {
    handle: G19Handle,
    processors: Processors,
    config: PollConfig,
    /// Held between restarts of event handling
    receiver: Option<Receiver>,
    task: Option<Task<Receiver>>,
}

impl G19 {
    /// Find and open both G19 devices
    pub fn open(reset_on_start: bool, config: PollConfig) -> Result<Self> {
        let transport = usb::UsbTransport::open(reset_on_start)?;
        info!("opened g19");
        Ok(Self::with_transport(transport, config))
    }

    /// Drive the device through any transport
    pub fn with_transport(transport: impl Transport + 'static, config: PollConfig) -> Self {
        let transport = Arc::new(SharedTransport::new(transport));
        let processors = Processors::default();
        let receiver = Receiver::new(transport.clone(), config).with_processors(processors.clone());
        Self {
            handle: G19Handle { transport },
            processors,
            config,
            receiver: Some(receiver),
            task: None,
        }
    }

    /// Command access that can be moved into processors and other threads
    pub fn handle(&self) -> G19Handle {
        self.handle.clone()
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Register a processor behind all previously registered ones
    pub fn add_input_processor(&self, processor: Arc<dyn InputProcessor>) {
        self.processors.add(processor);
    }

    /// Start event processing on a dedicated thread.
    ///
    /// Restarts the thread if it was already running.
    pub fn start_event_handling(&mut self) -> Result<()> {
        self.stop_event_handling();
        let receiver = match self.receiver.take() {
            Some(receiver) => receiver,
            // worker panicked, start from a clean key state
            None => Receiver::new(self.handle.transport.clone(), self.config)
                .with_processors(self.processors.clone()),
        };
        let flag = receiver.stop_flag().clone();
        self.task = Some(Task::spawn_with_flag(
            "g19-receiver",
            receiver,
            flag,
            self.config.idle_sleep,
        )?);
        Ok(())
    }

    /// Stop event processing, waiting for the current poll iteration
    pub fn stop_event_handling(&mut self) {
        if let Some(task) = self.task.take() {
            self.receiver = task.join();
        }
    }

    pub fn is_handling_events(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Currently held keys, if event handling is stopped
    pub fn held_keys(&self) -> Option<KeySet> {
        self.receiver.as_ref().map(|r| r.state().held())
    }
}

impl Drop for G19 {
    fn drop(&mut self) {
        self.stop_event_handling();
    }
}

/// Display and backlight commands.
///
/// Clones share one transport. Each command takes the transport lock for its
/// single transfer only, so processors may call these from the poll thread.
/// Failed transfers are returned as is and never retried.
#[derive(Clone, Debug)]
pub struct G19Handle {
    transport: Arc<SharedTransport>,
}

impl G19Handle {
    /// Send a pre-encoded frame of 320x240 little-endian 5-6-5 pixels
    pub fn send_frame(&self, pixel_data: &[u8]) -> Result<()> {
        let frame = frame::wrap_pixel_data(pixel_data)?;
        self.write_frame(&frame)
    }

    /// Encode and send a full screen of pixels
    pub fn draw(&self, pixels: &[Rgb]) -> Result<()> {
        let frame = encode_frame(pixels, frame::DISPLAY_WIDTH, frame::DISPLAY_HEIGHT)?;
        self.write_frame(&frame)
    }

    /// Fill the display with one color
    pub fn fill_display_with_color(&self, r: u8, g: u8, b: u8) -> Result<()> {
        self.write_frame(&encode_solid_color(r.into(), g.into(), b.into()))
    }

    /// Show the gradient test pattern
    pub fn set_display_colorful(&self) -> Result<()> {
        self.write_frame(&frame::gradient_frame())
    }

    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        self.transport.write(OutEndpoint::Display, frame, BULK_TIMEOUT)?;
        Ok(())
    }

    /// Set the backlight color
    pub fn set_bg_color(&self, r: u8, g: u8, b: u8) -> Result<()> {
        self.transport
            .write(abi::SET_BG_COLOR, &abi::color(r, g, b), CONTROL_TIMEOUT)?;
        Ok(())
    }

    /// Store the backlight color permanently, used by default after a reset
    pub fn save_default_bg_color(&self, r: u8, g: u8, b: u8) -> Result<()> {
        self.transport
            .write(abi::SAVE_BG_COLOR, &abi::color(r, g, b), BULK_TIMEOUT)?;
        Ok(())
    }

    /// Set the illuminated M-keys
    pub fn set_enabled_m_keys(&self, leds: MKeyLeds) -> Result<()> {
        self.transport
            .write(abi::SET_M_KEYS, &abi::m_keys(leds), CONTROL_TIMEOUT)?;
        Ok(())
    }

    /// Set the display brightness in 0..=100 (off..maximum)
    pub fn set_display_brightness(&self, level: u8) -> Result<()> {
        if level > abi::MAX_BRIGHTNESS {
            return Err(G19Error::InvalidBrightness(level));
        }
        self.transport
            .write(abi::SET_BRIGHTNESS, &abi::brightness(level), BULK_TIMEOUT)?;
        Ok(())
    }

    /// Initiate a bus reset of the lcd
    pub fn reset(&self) -> Result<()> {
        self.transport.reset()?;
        Ok(())
    }
}
