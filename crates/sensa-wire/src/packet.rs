//! Broadcast packet: fixed header followed by one compressed block
//!
//! Packet = Header + Payload, where the payload is `m` consecutive
//! little-endian IEEE-754 f64 values with no padding.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use sensa_core::{NodeIdentity, SensaError, SensaResult};

use crate::{PacketHeader, HEADER_SIZE};

/// Size of one payload element in bytes
pub const SAMPLE_SIZE: usize = std::mem::size_of::<f64>();

/// Maximum packet size (largest UDP datagram payload)
pub const MAX_PACKET_SIZE: usize = 65_507;

/// Largest number of f64 values that fit a single packet
pub const MAX_SAMPLES_PER_PACKET: usize = (MAX_PACKET_SIZE - HEADER_SIZE) / SAMPLE_SIZE;

/// Total packet size for a block of `m` values
#[inline]
pub fn packet_size_for(m: usize) -> usize {
    HEADER_SIZE + m * SAMPLE_SIZE
}

/// Complete broadcast packet
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    header: PacketHeader,
    payload: Bytes,
}

impl Packet {
    /// Build a packet carrying `samples` as its raw payload
    pub fn from_samples(identity: NodeIdentity, seq: u32, samples: &[f64]) -> SensaResult<Self> {
        let size = packet_size_for(samples.len());
        if size > MAX_PACKET_SIZE {
            return Err(SensaError::PacketTooLarge {
                size,
                max: MAX_PACKET_SIZE,
            });
        }

        let mut payload = BytesMut::with_capacity(samples.len() * SAMPLE_SIZE);
        for value in samples {
            payload.put_f64_le(*value);
        }

        let header = PacketHeader::new(identity, seq, payload.len() as u32);
        Ok(Packet {
            header,
            payload: payload.freeze(),
        })
    }

    #[inline]
    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    #[inline]
    pub fn seq(&self) -> u32 {
        self.header.seq
    }

    #[inline]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Total size on the wire
    #[inline]
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Decode the payload back into f64 values
    pub fn samples(&self) -> Vec<f64> {
        let mut buf = self.payload.clone();
        let mut out = Vec::with_capacity(buf.remaining() / SAMPLE_SIZE);
        while buf.remaining() >= SAMPLE_SIZE {
            out.push(buf.get_f64_le());
        }
        out
    }

    /// Serialize to wire bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        buf.put_slice(&self.header.to_bytes());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Parse a packet from wire bytes
    pub fn parse(buf: &[u8]) -> SensaResult<Self> {
        if buf.len() > MAX_PACKET_SIZE {
            return Err(SensaError::PacketTooLarge {
                size: buf.len(),
                max: MAX_PACKET_SIZE,
            });
        }

        let header = PacketHeader::parse(buf)?;
        let declared = header.payload_size as usize;
        let body = &buf[HEADER_SIZE..];

        if declared != body.len() {
            return Err(SensaError::InvalidWireFormat(format!(
                "Payload size mismatch: header says {}, got {}",
                declared,
                body.len()
            )));
        }
        if declared % SAMPLE_SIZE != 0 {
            return Err(SensaError::InvalidWireFormat(format!(
                "Payload size {} is not a multiple of {}",
                declared, SAMPLE_SIZE
            )));
        }

        Ok(Packet {
            header,
            payload: Bytes::copy_from_slice(body),
        })
    }
}
