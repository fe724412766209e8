//! In-memory capture device

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use sensa_wire::Packet;
use tracing::warn;

use crate::NetDevice;

/// Device that records every frame it is asked to emit
pub struct CaptureDevice {
    name: String,
    frames: Arc<Mutex<Vec<Bytes>>>,
}

/// Cloneable read side of a [`CaptureDevice`]
#[derive(Clone, Default)]
pub struct CaptureHandle {
    frames: Arc<Mutex<Vec<Bytes>>>,
}

impl CaptureDevice {
    pub fn new(name: impl Into<String>) -> Self {
        CaptureDevice {
            name: name.into(),
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn handle(&self) -> CaptureHandle {
        CaptureHandle {
            frames: self.frames.clone(),
        }
    }
}

impl NetDevice for CaptureDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn transmit(&mut self, frame: &[u8]) {
        self.frames.lock().push(Bytes::copy_from_slice(frame));
    }
}

impl CaptureHandle {
    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn frames(&self) -> Vec<Bytes> {
        self.frames.lock().clone()
    }

    /// Parse every captured frame, skipping (and logging) malformed ones
    pub fn packets(&self) -> Vec<Packet> {
        self.frames
            .lock()
            .iter()
            .filter_map(|frame| match Packet::parse(frame) {
                Ok(packet) => Some(packet),
                Err(e) => {
                    warn!("Captured frame did not parse: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Forget everything captured so far, for every clone of the handle
    pub fn clear(&self) {
        self.frames.lock().clear();
    }
}
