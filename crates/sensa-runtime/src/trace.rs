//! Observable trace events
//!
//! Side-channel hooks for external observers. Control flow never depends
//! on whether anyone is listening.

use std::sync::Arc;

use parking_lot::Mutex;
use sensa_core::{NodeIdentity, SensaError, SimTime};
use sensa_wire::PacketHeader;

/// Why a packet left the queue without being sent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Lost the transmission-probability draw
    ProbabilityGate,
    /// Was in flight when the agent stopped
    Stopped,
}

/// Why the measurement chain ended
#[derive(Clone, Debug, PartialEq)]
pub enum Exhaustion {
    NoCompressor,
    InsufficientSamples { remaining: usize, needed: usize },
    /// Every sequence number has been used
    SequenceExhausted,
    /// The cycle failed inside the source, compressor or framing
    Failed(SensaError),
}

impl From<SensaError> for Exhaustion {
    fn from(e: SensaError) -> Self {
        match e {
            SensaError::SequenceExhausted => Exhaustion::SequenceExhausted,
            other => Exhaustion::Failed(other),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TraceEvent {
    MeasurementTaken {
        at: SimTime,
        node: NodeIdentity,
        cycle: u64,
    },
    SourceExhausted {
        at: SimTime,
        node: NodeIdentity,
        reason: Exhaustion,
    },
    PacketSent {
        at: SimTime,
        header: PacketHeader,
    },
    PacketDropped {
        at: SimTime,
        header: PacketHeader,
        reason: DropReason,
    },
}

impl TraceEvent {
    pub fn at(&self) -> SimTime {
        match self {
            TraceEvent::MeasurementTaken { at, .. }
            | TraceEvent::SourceExhausted { at, .. }
            | TraceEvent::PacketSent { at, .. }
            | TraceEvent::PacketDropped { at, .. } => *at,
        }
    }
}

pub trait TraceObserver: Send {
    fn on_event(&mut self, event: &TraceEvent);
}

/// Fan-out to the observers bound to a node
#[derive(Default)]
pub struct Tracer {
    observers: Vec<Box<dyn TraceObserver>>,
}

impl Tracer {
    pub fn new(observers: Vec<Box<dyn TraceObserver>>) -> Self {
        Tracer { observers }
    }

    pub fn emit(&mut self, event: TraceEvent) {
        for observer in self.observers.iter_mut() {
            observer.on_event(&event);
        }
    }
}

/// Shared recorder of trace events. Clones see the same log.
#[derive(Clone, Debug, Default)]
pub struct TraceLog {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl TraceLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    /// Headers of sent packets, in send order
    pub fn sent(&self) -> Vec<(SimTime, PacketHeader)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::PacketSent { at, header } => Some((*at, *header)),
                _ => None,
            })
            .collect()
    }

    /// Headers of dropped packets, in drop order
    pub fn dropped(&self) -> Vec<(PacketHeader, DropReason)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::PacketDropped { header, reason, .. } => Some((*header, *reason)),
                _ => None,
            })
            .collect()
    }
}

impl TraceObserver for TraceLog {
    fn on_event(&mut self, event: &TraceEvent) {
        self.events.lock().push(event.clone());
    }
}
