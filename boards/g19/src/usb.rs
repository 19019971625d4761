//! libusb backed transport.
//!
//! The G19 consists of two composite USB devices:
//! - 046d:c228, the keyboard
//!   - MI00: the keyboard itself, EP 0x81 (in, interrupt)
//!   - MI01: multimedia keys incl. scroll and winkey switch, EP 0x82 (in, interrupt)
//! - 046d:c229, the LCD
//!   - MI00: display keys on EP 0x81 (in, interrupt), display on EP 0x02 (out, bulk)
//!   - MI01: backlight via control transfers, G/M/light keys on EP 0x83 (in, interrupt)

use std::time::Duration;

use g19_core::{InEndpoint, OutEndpoint, Transport, TransportError};
use rusb::{DeviceHandle, GlobalContext};
use tracing::{debug, info};

use crate::consts;
use crate::types::{G19Error, Result};

/// Both claimed USB devices of a G19
pub struct UsbTransport {
    lcd: DeviceHandle<GlobalContext>,
    keyboard: DeviceHandle<GlobalContext>,
}

impl UsbTransport {
    /// Find both devices, detach kernel drivers and claim the driver interfaces
    pub fn open(reset_on_start: bool) -> Result<Self> {
        let mut lcd = open_device(consts::G19_LCD_PRODUCT_ID, "lcd")?;
        if reset_on_start {
            info!("resetting lcd device");
            lcd.reset()?;
            lcd = open_device(consts::G19_LCD_PRODUCT_ID, "lcd")?;
        }
        let mut keyboard = open_device(consts::G19_KEYBOARD_PRODUCT_ID, "keyboard")?;

        // Either may already be configured, which some platforms report as busy
        let _ = keyboard.set_active_configuration(1);
        let _ = lcd.set_active_configuration(1);

        claim(&mut lcd, consts::LCD_DISPLAY_INTERFACE)?;
        claim(&mut lcd, consts::LCD_CONTROL_INTERFACE)?;
        claim(&mut keyboard, consts::KEYBOARD_MULTIMEDIA_INTERFACE)?;

        Ok(Self { lcd, keyboard })
    }
}

fn open_device(product_id: u16, name: &'static str) -> Result<DeviceHandle<GlobalContext>> {
    rusb::open_device_with_vid_pid(consts::LOGITECH_VENDOR_ID, product_id)
        .ok_or(G19Error::DeviceNotFound(name))
}

fn claim(handle: &mut DeviceHandle<GlobalContext>, interface: u8) -> Result<()> {
    if handle.kernel_driver_active(interface).unwrap_or(false) {
        debug!(interface, "detaching kernel driver");
        // Not supported on every platform, claiming reports the real error
        let _ = handle.detach_kernel_driver(interface);
    }
    handle.claim_interface(interface)?;
    Ok(())
}

impl Transport for UsbTransport {
    fn read(
        &mut self,
        endpoint: InEndpoint,
        max_len: usize,
        timeout: Duration,
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let (handle, address) = match endpoint {
            InEndpoint::GAndMKeys => (&self.lcd, consts::EP_G_AND_M_KEYS),
            InEndpoint::DisplayMenuKeys => (&self.lcd, consts::EP_DISPLAY_MENU_KEYS),
            InEndpoint::MultimediaKeys => (&self.keyboard, consts::EP_MULTIMEDIA_KEYS),
        };
        let mut buf = vec![0u8; max_len];
        match handle.read_interrupt(address, &mut buf, timeout) {
            Ok(len) => {
                buf.truncate(len);
                Ok(buf)
            },
            Err(rusb::Error::Timeout) => Ok(Vec::new()),
            Err(rusb::Error::NoDevice) => Err(TransportError::Disconnected),
            Err(e) => Err(e.into()),
        }
    }

    fn write(
        &mut self,
        endpoint: OutEndpoint,
        payload: &[u8],
        timeout: Duration,
    ) -> std::result::Result<(), TransportError> {
        let written = match endpoint {
            OutEndpoint::Display => self.lcd.write_bulk(consts::EP_DISPLAY, payload, timeout),
            OutEndpoint::Control(req) => self.lcd.write_control(
                req.request_type,
                req.request,
                req.value,
                req.index,
                payload,
                timeout,
            ),
        }
        .map_err(|e| match e {
            rusb::Error::NoDevice => TransportError::Disconnected,
            e => e.into(),
        })?;

        if written != payload.len() {
            return Err(TransportError::ShortWrite {
                written,
                expected: payload.len(),
            });
        }
        Ok(())
    }

    /// Bus reset of the lcd device only. The keyboard keeps working as a
    /// regular HID keyboard and is left alone.
    fn reset(&mut self) -> std::result::Result<(), TransportError> {
        self.lcd.reset()?;
        Ok(())
    }
}

impl Drop for UsbTransport {
    fn drop(&mut self) {
        let _ = self.lcd.release_interface(consts::LCD_DISPLAY_INTERFACE);
        let _ = self.lcd.release_interface(consts::LCD_CONTROL_INTERFACE);
        let _ = self
            .keyboard
            .release_interface(consts::KEYBOARD_MULTIMEDIA_INTERFACE);
    }
}
