//! Outbound devices and the broadcast transmitter

use sensa_wire::Packet;
use tracing::trace;

/// One outbound link of a node.
///
/// Transmission is fire-and-forget: no destination address, no
/// acknowledgement. Implementations log failures instead of returning them.
pub trait NetDevice: Send {
    /// Device name for logs
    fn name(&self) -> &str;

    /// Emit one serialized packet
    fn transmit(&mut self, frame: &[u8]);
}

/// Emits packets on every device bound to a node
#[derive(Default)]
pub struct Transmitter {
    devices: Vec<Box<dyn NetDevice>>,
    frames_out: u64,
}

impl Transmitter {
    pub fn new(devices: Vec<Box<dyn NetDevice>>) -> Self {
        Transmitter {
            devices,
            frames_out: 0,
        }
    }

    pub fn add_device(&mut self, device: Box<dyn NetDevice>) {
        self.devices.push(device);
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Frames emitted across all devices
    pub fn frames_out(&self) -> u64 {
        self.frames_out
    }

    /// Send one packet on one device
    pub fn send(packet: &Packet, device: &mut dyn NetDevice) {
        let frame = packet.serialize();
        device.transmit(&frame);
        trace!(device = device.name(), seq = packet.seq(), bytes = frame.len(), "Frame emitted");
    }

    /// Send one packet on every device. Returns the number of devices used.
    pub fn broadcast(&mut self, packet: &Packet) -> usize {
        for device in self.devices.iter_mut() {
            Self::send(packet, device.as_mut());
        }
        self.frames_out += self.devices.len() as u64;
        self.devices.len()
    }
}
