//! Scenario harness
//!
//! Builds one or more fully wired agents, runs them on a shared simulation
//! clock and collects everything observable: trace events, captured
//! frames, counters and lifecycle errors.

use std::time::Duration;

use sensa_core::{ClusterId, NodeId, NodeIdentity, SensaError, SimTime};
use sensa_runtime::{
    AgentConfig, AgentStats, DropReason, FixedDraws, MemorySink, NodeBinding, SensorAgent,
    SimEvent, Simulation, SimulationStats, TraceEvent, TraceLog,
};
use sensa_signal::{GaussianProjection, VecSource};
use sensa_transport::{CaptureDevice, CaptureHandle};
use sensa_wire::{Packet, PacketHeader};
use tracing::debug;

/// Builder for a single simulation run
#[derive(Clone, Debug)]
pub struct ScenarioBuilder {
    config: AgentConfig,
    samples: Vec<f64>,
    nodes: u32,
    draws: Option<Vec<f64>>,
    with_compressor: bool,
    skip_setup: bool,
    stop_at: Option<SimTime>,
    max_events: u64,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        ScenarioBuilder {
            config: AgentConfig::default(),
            samples: Vec::new(),
            nodes: 1,
            draws: None,
            with_compressor: true,
            skip_setup: false,
            stop_at: None,
            max_events: 100_000,
        }
    }
}

impl ScenarioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn dimensions(mut self, n: usize, m: usize) -> Self {
        self.config = self.config.with_dimensions(n, m);
        self
    }

    pub fn intervals(mut self, measurement: Duration, packet: Duration) -> Self {
        self.config = self.config.with_intervals(measurement, packet);
        self
    }

    pub fn probability(mut self, p: f64) -> Self {
        self.config = self.config.with_transmission_probability(p);
        self
    }

    pub fn noise(mut self, variance: f64) -> Self {
        self.config = self.config.with_noise_variance(variance);
        self
    }

    /// Explicit sample stream
    pub fn samples(mut self, samples: Vec<f64>) -> Self {
        self.samples = samples;
        self
    }

    /// Ramp 0, 1, 2, ... of the given length
    pub fn ramp(mut self, len: usize) -> Self {
        self.samples = (0..len).map(|i| i as f64).collect();
        self
    }

    /// Number of identical nodes, each with its own copy of the stream
    pub fn nodes(mut self, nodes: u32) -> Self {
        self.nodes = nodes.max(1);
        self
    }

    /// Replay these draws in the transmission gate of every node
    pub fn draws(mut self, draws: Vec<f64>) -> Self {
        self.draws = Some(draws);
        self
    }

    /// Leave the agents without a compressor, so every cycle ends early
    pub fn without_compressor(mut self) -> Self {
        self.with_compressor = false;
        self
    }

    /// Start the agents without ever calling setup
    pub fn without_setup(mut self) -> Self {
        self.skip_setup = true;
        self
    }

    pub fn stop_at(mut self, at: SimTime) -> Self {
        self.stop_at = Some(at);
        self
    }

    /// Event budget for the run, 100k by default
    pub fn max_events(mut self, max_events: u64) -> Self {
        self.max_events = max_events;
        self
    }

    /// Build, run to completion and report
    pub fn run(self) -> ScenarioReport {
        let mut sim = Simulation::new();
        let mut observed = Vec::with_capacity(self.nodes as usize);

        for node in 0..self.nodes {
            let identity = NodeIdentity::new(NodeId::new(node + 1), ClusterId::new(0));
            let log = TraceLog::new();
            let capture = CaptureDevice::new(format!("cap{}", node));
            let frames = capture.handle();
            let compressed = MemorySink::new();

            let mut agent = match SensorAgent::new(self.config.clone()) {
                Ok(agent) => agent,
                Err(e) => return ScenarioReport::failed(e),
            };
            if self.with_compressor {
                if let Err(e) = agent.attach_compressor(Box::new(GaussianProjection::new())) {
                    return ScenarioReport::failed(e);
                }
            }
            if let Some(draws) = &self.draws {
                if let Err(e) = agent.set_draw_source(Box::new(FixedDraws::new(draws.clone()))) {
                    return ScenarioReport::failed(e);
                }
            }
            if !self.skip_setup {
                let binding = NodeBinding::new(identity)
                    .with_device(capture)
                    .with_compressed_sink(compressed.clone())
                    .with_observer(log.clone());
                if let Err(e) = agent.setup(binding, Box::new(VecSource::new(self.samples.clone()))) {
                    return ScenarioReport::failed(e);
                }
            }

            let index = sim.add_agent(agent);
            sim.start_at(index, SimTime::ZERO);
            if let Some(at) = self.stop_at {
                sim.stop_at(index, at);
            }
            observed.push(NodeObservation {
                identity,
                log,
                frames,
                compressed,
            });
        }

        let mut errors = Vec::new();
        let mut timeline = Vec::new();
        let mut max_in_flight = 0;
        let mut processed = 0;
        while processed < self.max_events {
            match sim.step() {
                Ok(Some(fired)) => timeline.push(fired),
                Ok(None) => break,
                Err(e) => errors.push(e),
            }
            processed += 1;
            max_in_flight = sim
                .agents()
                .iter()
                .map(SensorAgent::in_flight)
                .fold(max_in_flight, usize::max);
        }

        let stats = sim.stats();
        debug!(
            events = stats.events_processed,
            errors = errors.len(),
            end = %stats.end_time,
            "Scenario finished"
        );

        let nodes = observed
            .into_iter()
            .zip(sim.agents())
            .map(|(obs, agent)| NodeReport {
                identity: obs.identity,
                events: obs.log.events(),
                sent: obs.log.sent(),
                dropped: obs.log.dropped(),
                frames: obs.frames.packets(),
                compressed_blocks: obs.compressed.blocks().into_iter().map(|(_, b)| b).collect(),
                stats: agent.stats(),
                remaining_samples: agent.remaining_samples(),
                next_seq: agent.next_seq(),
            })
            .collect();

        ScenarioReport {
            nodes,
            errors,
            timeline,
            max_in_flight,
            sim: stats,
        }
    }
}

struct NodeObservation {
    identity: NodeIdentity,
    log: TraceLog,
    frames: CaptureHandle,
    compressed: MemorySink,
}

/// What one node did during a scenario
#[derive(Clone, Debug)]
pub struct NodeReport {
    pub identity: NodeIdentity,
    pub events: Vec<TraceEvent>,
    pub sent: Vec<(SimTime, PacketHeader)>,
    pub dropped: Vec<(PacketHeader, DropReason)>,
    /// Frames captured on the node's device, parsed back into packets
    pub frames: Vec<Packet>,
    pub compressed_blocks: Vec<Vec<f64>>,
    pub stats: AgentStats,
    pub remaining_samples: usize,
    pub next_seq: u64,
}

impl NodeReport {
    pub fn sent_seqs(&self) -> Vec<u32> {
        self.sent.iter().map(|(_, h)| h.seq).collect()
    }

    pub fn send_times(&self) -> Vec<SimTime> {
        self.sent.iter().map(|(at, _)| *at).collect()
    }

    pub fn dropped_seqs(&self) -> Vec<u32> {
        self.dropped.iter().map(|(h, _)| h.seq).collect()
    }
}

/// Outcome of a scenario run
#[derive(Clone, Debug)]
pub struct ScenarioReport {
    pub nodes: Vec<NodeReport>,
    /// Errors surfaced by the agents, in the order they happened
    pub errors: Vec<SensaError>,
    /// Every event that fired without error, in firing order
    pub timeline: Vec<(SimTime, SimEvent)>,
    /// Largest number of in-flight packets seen on any single node
    pub max_in_flight: usize,
    pub sim: SimulationStats,
}

impl ScenarioReport {
    fn failed(error: SensaError) -> Self {
        ScenarioReport {
            nodes: Vec::new(),
            errors: vec![error],
            timeline: Vec::new(),
            max_in_flight: 0,
            sim: SimulationStats::default(),
        }
    }

    /// First (or only) node
    pub fn node(&self) -> Option<&NodeReport> {
        self.nodes.first()
    }

    pub fn total_sent(&self) -> usize {
        self.nodes.iter().map(|n| n.sent.len()).sum()
    }

    pub fn total_frames(&self) -> usize {
        self.nodes.iter().map(|n| n.frames.len()).sum()
    }
}
