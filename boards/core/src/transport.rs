//! Transport seam between the driver and the USB stack.

use std::time::Duration;

use parking_lot::Mutex;

/// Errors that can occur while talking to the device
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// libusb reported a failure
    #[error("usb error: {0}")]
    Usb(#[from] rusb::Error),

    /// Bulk or control transfer did not move the whole payload
    #[error("short write: {written} of {expected} bytes")]
    ShortWrite { written: usize, expected: usize },

    /// The device went away
    #[error("device disconnected")]
    Disconnected,
}

/// Interrupt endpoints reporting key state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InEndpoint {
    /// G-keys, M1..3/MR and the light switch
    GAndMKeys,
    /// Multimedia keys, scroll wheel and the winkey switch
    MultimediaKeys,
    /// Keys around the display
    DisplayMenuKeys,
}

impl InEndpoint {
    /// Fixed polling order used by the dispatcher
    pub const ALL: [InEndpoint; 3] = [
        InEndpoint::GAndMKeys,
        InEndpoint::MultimediaKeys,
        InEndpoint::DisplayMenuKeys,
    ];

    /// Number of bytes requested per read
    pub const fn read_len(self) -> usize {
        match self {
            InEndpoint::GAndMKeys => 20,
            InEndpoint::MultimediaKeys | InEndpoint::DisplayMenuKeys => 2,
        }
    }
}

/// Setup packet fields for a control transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlRequest {
    pub request_type: u8,
    pub request: u8,
    pub value: u16,
    pub index: u16,
}

/// Outgoing endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutEndpoint {
    /// Bulk endpoint feeding the display
    Display,
    /// Control pipe of the backlight interface
    Control(ControlRequest),
}

/// Raw device access.
///
/// Implementations must not block past `timeout`. A read returning an empty
/// vector means no data was available.
pub trait Transport: Send {
    fn read(
        &mut self,
        endpoint: InEndpoint,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError>;

    fn write(
        &mut self,
        endpoint: OutEndpoint,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// Initiate a bus reset
    fn reset(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// A transport shared between the poll thread and application threads.
///
/// The device tolerates a single in-flight transfer, so every call holds the
/// one lock for the duration of that call only.
pub struct SharedTransport {
    inner: Mutex<Box<dyn Transport>>,
}

impl SharedTransport {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::new(transport)),
        }
    }

    pub fn read(
        &self,
        endpoint: InEndpoint,
        max_len: usize,
        timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        self.inner.lock().read(endpoint, max_len, timeout)
    }

    pub fn write(
        &self,
        endpoint: OutEndpoint,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.inner.lock().write(endpoint, payload, timeout)
    }

    pub fn reset(&self) -> Result<(), TransportError> {
        self.inner.lock().reset()
    }
}

impl std::fmt::Debug for SharedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTransport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        last: Vec<u8>,
    }

    impl Transport for Echo {
        fn read(&mut self, _: InEndpoint, max_len: usize, _: Duration) -> Result<Vec<u8>, TransportError> {
            Ok(self.last.iter().copied().take(max_len).collect())
        }

        fn write(&mut self, _: OutEndpoint, payload: &[u8], _: Duration) -> Result<(), TransportError> {
            self.last = payload.to_vec();
            Ok(())
        }
    }

    #[test]
    fn shared_transport_forwards_calls() {
        let shared = SharedTransport::new(Echo { last: vec![] });
        let timeout = Duration::from_millis(1);
        assert!(shared.read(InEndpoint::GAndMKeys, 4, timeout).unwrap().is_empty());

        shared.write(OutEndpoint::Display, &[1, 2, 3], timeout).unwrap();
        assert_eq!(shared.read(InEndpoint::MultimediaKeys, 2, timeout).unwrap(), vec![1, 2]);
        assert!(shared.reset().is_ok());
    }

    #[test]
    fn read_lengths() {
        assert_eq!(InEndpoint::GAndMKeys.read_len(), 20);
        assert_eq!(InEndpoint::MultimediaKeys.read_len(), 2);
        assert_eq!(InEndpoint::DisplayMenuKeys.read_len(), 2);
    }
}
