//! Sensing agent - lifecycle, state guards and timer dispatch

use std::time::Duration;

use sensa_core::{NodeIdentity, SensaError, SensaResult};
use sensa_signal::{Compressor, NoiseInjector, SampleSource};
use sensa_time::{EventPriority, Prioritized, TimerHandle, TimerQueue};
use sensa_transport::{NetDevice, Transmitter};
use tracing::{debug, error, info, trace, warn};

use crate::{
    AgentConfig, BroadcastScheduler, DiagnosticSink, DrawSource, Measurement, MeasurementBuffer,
    Exhaustion, MeasurementEngine, NullSink, Packetizer, SeededDraws, TraceEvent, TraceObserver,
    Tracer,
};

/// Timer chains of one agent. At most one of each is outstanding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AgentTimer {
    /// Next measurement cycle
    Measure,
    /// Re-armed scheduling attempt; `delay` is the send latency it will use
    ScheduleAttempt { delay: Duration },
    /// Emit the packet in flight
    Send,
}

impl Prioritized for AgentTimer {
    fn priority(&self) -> EventPriority {
        match self {
            AgentTimer::Measure => EventPriority::Acquisition,
            AgentTimer::ScheduleAttempt { .. } | AgentTimer::Send => EventPriority::Dispatch,
        }
    }
}

/// Lifecycle flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunState {
    /// false -> true exactly once
    pub is_setup: bool,
    /// Toggled by start/stop, may cycle
    pub is_running: bool,
}

/// Everything the node/topology layer hands to an agent at setup
pub struct NodeBinding {
    pub identity: NodeIdentity,
    pub devices: Vec<Box<dyn NetDevice>>,
    pub raw_sink: Box<dyn DiagnosticSink>,
    pub compressed_sink: Box<dyn DiagnosticSink>,
    pub observers: Vec<Box<dyn TraceObserver>>,
}

impl NodeBinding {
    pub fn new(identity: NodeIdentity) -> Self {
        NodeBinding {
            identity,
            devices: Vec::new(),
            raw_sink: Box::new(NullSink),
            compressed_sink: Box::new(NullSink),
            observers: Vec::new(),
        }
    }

    pub fn with_device(mut self, device: impl NetDevice + 'static) -> Self {
        self.devices.push(Box::new(device));
        self
    }

    pub fn with_raw_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.raw_sink = Box::new(sink);
        self
    }

    pub fn with_compressed_sink(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.compressed_sink = Box::new(sink);
        self
    }

    pub fn with_observer(mut self, observer: impl TraceObserver + 'static) -> Self {
        self.observers.push(Box::new(observer));
        self
    }
}

/// Snapshot of agent counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AgentStats {
    pub cycles: u64,
    pub packets_created: u64,
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub queue_len: usize,
    pub in_flight: usize,
    pub frames_out: u64,
}

/// Periodic measure -> compress -> packetize -> broadcast agent
pub struct SensorAgent {
    config: AgentConfig,
    state: RunState,
    identity: Option<NodeIdentity>,
    measurement: MeasurementEngine,
    packetizer: Packetizer,
    broadcast: BroadcastScheduler,
    transmitter: Transmitter,
    tracer: Tracer,
    measure_timer: Option<TimerHandle>,
}

impl SensorAgent {
    /// Create an agent; the configuration is validated here
    pub fn new(config: AgentConfig) -> SensaResult<Self> {
        config.validate()?;
        let noise = NoiseInjector::new(config.noise_variance, config.rng_seed.wrapping_add(1));
        let broadcast = BroadcastScheduler::new(
            config.transmission_probability,
            config.packet_interval,
            Box::new(SeededDraws::new(config.rng_seed)),
        )?;

        Ok(SensorAgent {
            measurement: MeasurementEngine::new(config.n, config.m, noise),
            packetizer: Packetizer::new(),
            broadcast,
            transmitter: Transmitter::default(),
            tracer: Tracer::default(),
            identity: None,
            state: RunState::default(),
            measure_timer: None,
            config,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn identity(&self) -> Option<NodeIdentity> {
        self.identity
    }

    pub fn measurement_buffer(&self) -> &MeasurementBuffer {
        self.measurement.buffer()
    }

    /// Samples not yet consumed from the bound source
    pub fn remaining_samples(&self) -> usize {
        self.measurement.remaining()
    }

    pub fn next_seq(&self) -> u64 {
        self.packetizer.next_seq()
    }

    pub fn queue_len(&self) -> usize {
        self.broadcast.queue_len()
    }

    /// 0 or 1
    pub fn in_flight(&self) -> usize {
        usize::from(self.broadcast.in_flight().is_some())
    }

    pub fn stats(&self) -> AgentStats {
        let broadcast = self.broadcast.stats();
        AgentStats {
            cycles: self.measurement.buffer().cycles(),
            packets_created: self.packetizer.created(),
            packets_sent: broadcast.sent,
            packets_dropped: broadcast.dropped,
            queue_len: self.broadcast.queue_len(),
            in_flight: self.in_flight(),
            frames_out: self.transmitter.frames_out(),
        }
    }

    fn ensure_unlocked(&self, what: &'static str) -> SensaResult<()> {
        if self.state.is_setup {
            error!(what, "Configuration change after setup");
            return Err(SensaError::ConfigLocked(what));
        }
        Ok(())
    }

    /// Attach the compressor. The agent takes exclusive ownership; pass a
    /// `box_clone()` to keep using a prototype elsewhere.
    pub fn attach_compressor(&mut self, compressor: Box<dyn Compressor>) -> SensaResult<()> {
        self.ensure_unlocked("compressor")?;
        self.measurement.attach_compressor(compressor);
        Ok(())
    }

    pub fn set_transmission_probability(&mut self, p: f64) -> SensaResult<()> {
        self.ensure_unlocked("transmission probability")?;
        self.broadcast.set_transmission_probability(p)?;
        self.config.transmission_probability = p;
        Ok(())
    }

    /// Replace the draw source of the transmission gate
    pub fn set_draw_source(&mut self, draws: Box<dyn DrawSource>) -> SensaResult<()> {
        self.ensure_unlocked("draw source")?;
        self.broadcast.set_draw_source(draws);
        Ok(())
    }

    /// Bind identity, devices, sinks and data source; configure the
    /// compressor. Must run exactly once, before `start`.
    pub fn setup(&mut self, binding: NodeBinding, source: Box<dyn SampleSource>) -> SensaResult<()> {
        if self.state.is_setup {
            error!("Setup called twice");
            return Err(SensaError::AlreadySetUp);
        }

        self.measurement.configure_compressor(self.config.compression())?;

        let NodeBinding {
            identity,
            devices,
            raw_sink,
            compressed_sink,
            observers,
        } = binding;

        self.measurement.bind(source, raw_sink, compressed_sink);
        self.transmitter = Transmitter::new(devices);
        self.tracer = Tracer::new(observers);
        self.identity = Some(identity);
        self.state.is_setup = true;

        info!(
            node = %identity,
            n = self.config.n,
            m = self.config.m,
            devices = self.transmitter.device_count(),
            compressor = self.measurement.has_compressor(),
            "Agent set up"
        );
        Ok(())
    }

    /// Begin the periodic cycle. The first measurement fires at the
    /// current instant.
    pub fn start(&mut self, timers: &mut dyn TimerQueue<AgentTimer>) -> SensaResult<()> {
        if !self.state.is_setup {
            error!("Start called before setup");
            return Err(SensaError::NotSetUp);
        }
        if self.state.is_running {
            error!("Start called while running");
            return Err(SensaError::AlreadyRunning);
        }

        self.state.is_running = true;
        self.measure_timer = Some(timers.schedule(Duration::ZERO, AgentTimer::Measure));
        self.broadcast.resume(timers, &mut self.tracer)?;
        info!(node = ?self.identity, at = %timers.now(), "Agent started");
        Ok(())
    }

    /// Cancel all timers and clear the running flag. Idempotent.
    pub fn stop(&mut self, timers: &mut dyn TimerQueue<AgentTimer>) {
        if let Some(handle) = self.measure_timer.take() {
            timers.cancel(handle);
        }
        self.broadcast.cancel(timers, &mut self.tracer);
        if self.state.is_running {
            info!(node = ?self.identity, at = %timers.now(), "Agent stopped");
        }
        self.state.is_running = false;
    }

    /// Rewind the sample source between runs
    pub fn reset_in(&mut self) -> SensaResult<()> {
        if self.state.is_running {
            error!("Source reset while running");
            return Err(SensaError::SourceBusy);
        }
        self.measurement.reset_source();
        debug!(node = ?self.identity, "Sample source rewound");
        Ok(())
    }

    /// Dispatch a fired timer. Callbacks that fire after `stop` are no-ops.
    pub fn handle_timer(
        &mut self,
        handle: TimerHandle,
        timer: AgentTimer,
        timers: &mut dyn TimerQueue<AgentTimer>,
    ) -> SensaResult<()> {
        if !self.state.is_running {
            trace!(?handle, ?timer, "Timer fired while stopped");
            return Ok(());
        }

        match timer {
            AgentTimer::Measure => self.on_measure(handle, timers),
            AgentTimer::ScheduleAttempt { delay } => {
                self.broadcast
                    .on_schedule_timer(handle, delay, timers, &mut self.tracer)
            }
            AgentTimer::Send => self.broadcast.on_send_timer(
                handle,
                timers,
                &mut self.transmitter,
                &mut self.tracer,
            ),
        }
    }

    fn on_measure(
        &mut self,
        handle: TimerHandle,
        timers: &mut dyn TimerQueue<AgentTimer>,
    ) -> SensaResult<()> {
        if self.measure_timer != Some(handle) {
            trace!(?handle, "Stale measurement timer ignored");
            return Ok(());
        }
        self.measure_timer = None;

        let Some(identity) = self.identity else {
            return Err(SensaError::NotSetUp);
        };
        let now = timers.now();

        // Only precondition breaches leave this callback as errors; anything
        // else ends the chain like running out of data
        let outcome = match self.measurement.measure(now) {
            Ok(Measurement::Ready(buffer)) => {
                self.tracer.emit(TraceEvent::MeasurementTaken {
                    at: now,
                    node: identity,
                    cycle: buffer.cycles(),
                });
                self.packetizer
                    .create_packet(buffer.values(), identity)
                    .map_err(Exhaustion::from)
            }
            Ok(Measurement::Exhausted(reason)) => Err(reason),
            Err(e) if e.is_precondition() => return Err(e),
            Err(e) => Err(Exhaustion::from(e)),
        };

        let packet = match outcome {
            Ok(packet) => packet,
            Err(reason) => {
                if let Exhaustion::Failed(e) = &reason {
                    warn!(node = %identity, error = %e, at = %now, "Measurement cycle failed");
                } else {
                    info!(node = %identity, ?reason, at = %now, "Measurement chain ended");
                }
                self.tracer.emit(TraceEvent::SourceExhausted {
                    at: now,
                    node: identity,
                    reason,
                });
                return Ok(());
            }
        };

        self.broadcast.enqueue(packet, timers, &mut self.tracer)?;
        self.measure_timer = Some(timers.schedule(self.config.measurement_interval, AgentTimer::Measure));
        Ok(())
    }
}
