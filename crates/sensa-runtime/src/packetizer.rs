//! Packet framing and the per-node sequence counter

use sensa_core::{NodeIdentity, SensaError, SensaResult};
use sensa_wire::Packet;
use tracing::trace;

/// Frames compressed blocks into packets.
///
/// INVARIANT: sequence numbers start at 0 and increase by exactly one per
/// packet created, whatever later happens to the packet. The counter is
/// wider than the wire field so that `u32::MAX` itself is still usable.
#[derive(Debug, Default)]
pub struct Packetizer {
    next_seq: u64,
}

impl Packetizer {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next_seq: u64) -> Self {
        Packetizer { next_seq }
    }

    /// Sequence number the next packet will carry; past `u32::MAX` the
    /// space is used up
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Packets created so far
    pub fn created(&self) -> u64 {
        self.next_seq
    }

    /// Build exactly one packet for one compressed block
    pub fn create_packet(&mut self, block: &[f64], identity: NodeIdentity) -> SensaResult<Packet> {
        let seq = u32::try_from(self.next_seq).map_err(|_| SensaError::SequenceExhausted)?;
        let packet = Packet::from_samples(identity, seq, block)?;
        self.next_seq += 1;

        trace!(node = %identity, seq, bytes = packet.size(), "Packet created");
        Ok(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sensa_core::{ClusterId, NodeId};
    use sensa_wire::{MAX_SAMPLES_PER_PACKET, SAMPLE_SIZE};

    fn identity() -> NodeIdentity {
        NodeIdentity::new(NodeId::new(4), ClusterId::new(2))
    }

    #[test]
    fn test_packet_contents() {
        let mut packetizer = Packetizer::new();
        let block = [0.25, -8.0, 3.5];
        let packet = packetizer.create_packet(&block, identity()).unwrap();

        let header = packet.header();
        assert_eq!(header.node_id, NodeId::new(4));
        assert_eq!(header.cluster_id, ClusterId::new(2));
        assert_eq!(header.seq, 0);
        assert_eq!(header.payload_size as usize, block.len() * SAMPLE_SIZE);
        assert_eq!(packet.samples(), block.to_vec());
        assert_eq!(packetizer.next_seq(), 1);
    }

    #[test]
    fn test_failed_packet_does_not_consume_sequence() {
        let mut packetizer = Packetizer::new();
        let oversized = vec![0.0; MAX_SAMPLES_PER_PACKET + 1];
        assert!(packetizer.create_packet(&oversized, identity()).is_err());
        assert_eq!(packetizer.next_seq(), 0);
    }

    #[test]
    fn test_sequence_exhaustion() {
        let mut packetizer = Packetizer::starting_at(u64::from(u32::MAX));
        let last = packetizer.create_packet(&[1.0], identity()).unwrap();
        assert_eq!(last.seq(), u32::MAX);

        assert_eq!(
            packetizer.create_packet(&[1.0], identity()),
            Err(SensaError::SequenceExhausted)
        );
        assert_eq!(packetizer.next_seq(), u64::from(u32::MAX) + 1);
    }

    proptest! {
        #[test]
        fn sequence_is_gap_free(count in 1usize..200) {
            let mut packetizer = Packetizer::new();
            let seqs: Vec<u32> = (0..count)
                .map(|_| packetizer.create_packet(&[0.0, 1.0], identity()).unwrap().seq())
                .collect();
            let expected: Vec<u32> = (0..count as u32).collect();
            prop_assert_eq!(seqs, expected);
            prop_assert_eq!(packetizer.created(), count as u64);
        }
    }
}
