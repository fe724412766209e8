//! Fixed header for Sensa broadcast packets
//!
//! Fixed header is 18 bytes:
//! - Byte 0: Version
//! - Byte 1: Reserved (zero)
//! - Bytes 2-5: Cluster ID (LE)
//! - Bytes 6-9: Node ID (LE)
//! - Bytes 10-13: Sequence number (LE)
//! - Bytes 14-17: Payload byte size (LE)

use sensa_core::{ClusterId, NodeId, NodeIdentity, SensaError, SensaResult};

/// Fixed header size in bytes
pub const HEADER_SIZE: usize = 18;

/// Current wire protocol version
pub const WIRE_VERSION: u8 = 1;

/// Packet header, attached once per packet and immutable afterwards
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketHeader {
    /// Wire protocol version
    pub version: u8,
    /// Cluster of the sending node
    pub cluster_id: ClusterId,
    /// Sending node
    pub node_id: NodeId,
    /// Per-node sequence number, assigned at creation
    pub seq: u32,
    /// Size of the payload that follows, in bytes
    pub payload_size: u32,
}

impl PacketHeader {
    pub fn new(identity: NodeIdentity, seq: u32, payload_size: u32) -> Self {
        PacketHeader {
            version: WIRE_VERSION,
            cluster_id: identity.cluster,
            node_id: identity.node,
            seq,
            payload_size,
        }
    }

    #[inline]
    pub fn identity(&self) -> NodeIdentity {
        NodeIdentity::new(self.node_id, self.cluster_id)
    }

    /// Parse header from bytes
    pub fn parse(buf: &[u8]) -> SensaResult<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(SensaError::BufferTooShort {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let version = buf[0];
        if version != WIRE_VERSION {
            return Err(SensaError::InvalidWireFormat(format!(
                "Unsupported version {}",
                version
            )));
        }

        Ok(PacketHeader {
            version,
            cluster_id: ClusterId::from_bytes(read_4(buf, 2)),
            node_id: NodeId::from_bytes(read_4(buf, 6)),
            seq: u32::from_le_bytes(read_4(buf, 10)),
            payload_size: u32::from_le_bytes(read_4(buf, 14)),
        })
    }

    /// Serialize header into the front of `buf`
    pub fn serialize(&self, buf: &mut [u8]) -> SensaResult<()> {
        if buf.len() < HEADER_SIZE {
            return Err(SensaError::BufferTooShort {
                expected: HEADER_SIZE,
                actual: buf.len(),
            });
        }

        buf[..HEADER_SIZE].copy_from_slice(&self.to_bytes());
        Ok(())
    }

    /// Serialize header to a fixed-size array
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.write_fixed(&mut buf);
        buf
    }

    fn write_fixed(&self, buf: &mut [u8; HEADER_SIZE]) {
        buf[0] = self.version;
        buf[1] = 0;
        buf[2..6].copy_from_slice(&self.cluster_id.to_bytes());
        buf[6..10].copy_from_slice(&self.node_id.to_bytes());
        buf[10..14].copy_from_slice(&self.seq.to_le_bytes());
        buf[14..18].copy_from_slice(&self.payload_size.to_le_bytes());
    }
}

#[inline]
fn read_4(buf: &[u8], at: usize) -> [u8; 4] {
    [buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]
}
