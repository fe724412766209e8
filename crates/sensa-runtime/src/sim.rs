//! Discrete-event simulation driver
//!
//! Runs any number of agents on one shared [`EventScheduler`]. Each agent
//! sees its own view of the queue through [`NodeTimers`], so the agent code
//! never knows it shares the clock with others.

use std::time::Duration;

use sensa_core::{SensaResult, SimTime};
use sensa_time::{EventPriority, EventScheduler, Prioritized, TimerHandle, TimerQueue};
use tracing::{debug, warn};

use crate::{AgentTimer, SensorAgent};

/// Index of an agent inside a [`Simulation`]
pub type AgentIndex = usize;

/// Everything the simulation clock can fire
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    Start(AgentIndex),
    Stop(AgentIndex),
    Timer { node: AgentIndex, timer: AgentTimer },
}

impl SimEvent {
    pub fn node(&self) -> AgentIndex {
        match *self {
            SimEvent::Start(node) | SimEvent::Stop(node) | SimEvent::Timer { node, .. } => node,
        }
    }
}

/// Lifecycle changes settle before any timer due at the same instant
impl Prioritized for SimEvent {
    fn priority(&self) -> EventPriority {
        match self {
            SimEvent::Start(_) | SimEvent::Stop(_) => EventPriority::Lifecycle,
            SimEvent::Timer { timer, .. } => timer.priority(),
        }
    }
}

/// Per-agent adapter over the shared scheduler
pub struct NodeTimers<'a> {
    node: AgentIndex,
    scheduler: &'a mut EventScheduler<SimEvent>,
}

impl<'a> NodeTimers<'a> {
    pub fn new(node: AgentIndex, scheduler: &'a mut EventScheduler<SimEvent>) -> Self {
        NodeTimers { node, scheduler }
    }
}

impl TimerQueue<AgentTimer> for NodeTimers<'_> {
    fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    fn schedule(&mut self, delay: Duration, timer: AgentTimer) -> TimerHandle {
        self.scheduler.schedule(
            delay,
            SimEvent::Timer {
                node: self.node,
                timer,
            },
        )
    }

    fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    fn is_pending(&self, handle: TimerHandle) -> bool {
        self.scheduler.is_pending(handle)
    }
}

/// Run counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SimulationStats {
    pub events_processed: u64,
    pub end_time: SimTime,
    /// True when the run stopped on its event budget with work still queued
    pub budget_exhausted: bool,
}

/// Single-threaded simulation of a set of agents
#[derive(Default)]
pub struct Simulation {
    scheduler: EventScheduler<SimEvent>,
    agents: Vec<SensorAgent>,
    events_processed: u64,
}

impl Simulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent; setup is expected to have happened already
    pub fn add_agent(&mut self, agent: SensorAgent) -> AgentIndex {
        self.agents.push(agent);
        self.agents.len() - 1
    }

    pub fn agent(&self, index: AgentIndex) -> Option<&SensorAgent> {
        self.agents.get(index)
    }

    pub fn agent_mut(&mut self, index: AgentIndex) -> Option<&mut SensorAgent> {
        self.agents.get_mut(index)
    }

    pub fn agents(&self) -> &[SensorAgent] {
        &self.agents
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    /// Events still waiting on the clock
    pub fn pending(&self) -> usize {
        self.scheduler.len()
    }

    /// Schedule the agent's start at an absolute time
    pub fn start_at(&mut self, index: AgentIndex, at: SimTime) {
        self.scheduler.schedule_at(at, SimEvent::Start(index));
    }

    /// Schedule the agent's stop at an absolute time
    pub fn stop_at(&mut self, index: AgentIndex, at: SimTime) {
        self.scheduler.schedule_at(at, SimEvent::Stop(index));
    }

    /// Start an agent at the current instant, outside the event loop
    pub fn start_now(&mut self, index: AgentIndex) -> SensaResult<()> {
        match self.agents.get_mut(index) {
            Some(agent) => agent.start(&mut NodeTimers::new(index, &mut self.scheduler)),
            None => {
                warn!(index, "Start for unknown agent");
                Ok(())
            }
        }
    }

    /// Fire one event and return it with its firing time. Returns
    /// `Ok(None)` once the clock has nothing left.
    pub fn step(&mut self) -> SensaResult<Option<(SimTime, SimEvent)>> {
        let Some(fired) = self.scheduler.pop_next() else {
            return Ok(None);
        };
        self.events_processed += 1;

        let index = fired.event.node();
        let Some(agent) = self.agents.get_mut(index) else {
            warn!(index, event = ?fired.event, "Event for unknown agent");
            return Ok(Some((fired.at, fired.event)));
        };
        let mut timers = NodeTimers::new(index, &mut self.scheduler);

        match fired.event {
            SimEvent::Start(_) => agent.start(&mut timers)?,
            SimEvent::Stop(_) => agent.stop(&mut timers),
            SimEvent::Timer { timer, .. } => agent.handle_timer(fired.handle, timer, &mut timers)?,
        }
        Ok(Some((fired.at, fired.event)))
    }

    /// Fire every event scheduled at or before `until`, then park the
    /// clock at `until`
    pub fn run_until(&mut self, until: SimTime) -> SensaResult<()> {
        while self.scheduler.peek_time().is_some_and(|at| at <= until) {
            self.step()?;
        }
        self.scheduler.advance_to(until);
        Ok(())
    }

    /// Fire events until the clock is empty or `max_events` have fired
    pub fn run_to_completion(&mut self, max_events: u64) -> SensaResult<SimulationStats> {
        let mut fired = 0;
        while fired < max_events {
            if self.step()?.is_none() {
                break;
            }
            fired += 1;
        }

        let stats = self.stats();
        if stats.budget_exhausted {
            warn!(max_events, pending = self.scheduler.len(), "Event budget exhausted");
        } else {
            debug!(events = stats.events_processed, end = %stats.end_time, "Simulation drained");
        }
        Ok(stats)
    }

    pub fn stats(&self) -> SimulationStats {
        SimulationStats {
            events_processed: self.events_processed,
            end_time: self.scheduler.now(),
            budget_exhausted: !self.scheduler.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AgentConfig, NodeBinding, TraceLog};
    use sensa_core::{ClusterId, NodeId, NodeIdentity, SensaError};
    use sensa_signal::{GaussianProjection, VecSource};
    use sensa_transport::CaptureDevice;

    fn agent(node: u32, samples: usize, log: &TraceLog) -> SensorAgent {
        let config = AgentConfig::default().with_dimensions(4, 2);
        let mut agent = SensorAgent::new(config).unwrap();
        agent
            .attach_compressor(Box::new(GaussianProjection::new()))
            .unwrap();
        let binding = NodeBinding::new(NodeIdentity::new(NodeId::new(node), ClusterId::new(0)))
            .with_device(CaptureDevice::new("cap0"))
            .with_observer(log.clone());
        agent
            .setup(binding, Box::new(VecSource::from_fn(samples, |i| i as f64)))
            .unwrap();
        agent
    }

    #[test]
    fn test_two_agents_share_clock() {
        let log = TraceLog::new();
        let mut sim = Simulation::new();
        let a = sim.add_agent(agent(1, 8, &log));
        let b = sim.add_agent(agent(2, 12, &log));
        sim.start_at(a, SimTime::ZERO);
        sim.start_at(b, SimTime::from_millis(500));

        let stats = sim.run_to_completion(1_000).unwrap();
        assert!(!stats.budget_exhausted);
        assert_eq!(sim.agent(a).unwrap().stats().packets_sent, 2);
        assert_eq!(sim.agent(b).unwrap().stats().packets_sent, 3);

        let times: Vec<SimTime> = log.sent().iter().map(|(at, _)| *at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn test_stop_at_halts_agent() {
        let log = TraceLog::new();
        let mut sim = Simulation::new();
        let a = sim.add_agent(agent(1, 400, &log));
        sim.start_at(a, SimTime::ZERO);
        sim.stop_at(a, SimTime::from_millis(2_500));

        sim.run_to_completion(10_000).unwrap();
        // cycles at 0s, 1s and 2s
        assert_eq!(sim.agent(a).unwrap().stats().cycles, 3);
        assert!(!sim.agent(a).unwrap().state().is_running);
    }

    #[test]
    fn test_run_until_parks_clock() {
        let log = TraceLog::new();
        let mut sim = Simulation::new();
        let a = sim.add_agent(agent(1, 400, &log));
        sim.start_at(a, SimTime::ZERO);

        sim.run_until(SimTime::from_millis(1_500)).unwrap();
        assert_eq!(sim.now(), SimTime::from_millis(1_500));
        assert_eq!(log.sent().len(), 2);
        assert!(sim.pending() > 0);
    }

    #[test]
    fn test_budget_reported() {
        let log = TraceLog::new();
        let mut sim = Simulation::new();
        let a = sim.add_agent(agent(1, 4_000, &log));
        sim.start_at(a, SimTime::ZERO);
        let stats = sim.run_to_completion(5).unwrap();
        assert!(stats.budget_exhausted);
        assert_eq!(stats.events_processed, 5);
    }

    #[test]
    fn test_start_without_setup_surfaces_error() {
        let mut sim = Simulation::new();
        let a = sim.add_agent(SensorAgent::new(AgentConfig::default()).unwrap());
        sim.start_at(a, SimTime::ZERO);
        assert_eq!(sim.step(), Err(SensaError::NotSetUp));
        assert_eq!(sim.agent(a).unwrap().stats().packets_created, 0);
    }

    #[test]
    fn test_stop_beats_measurement_at_same_instant() {
        let log = TraceLog::new();
        let mut sim = Simulation::new();
        let a = sim.add_agent(agent(1, 400, &log));
        sim.start_at(a, SimTime::ZERO);
        // Lands on the second measurement tick
        sim.stop_at(a, SimTime::from_secs(1));

        sim.run_to_completion(1_000).unwrap();
        assert_eq!(sim.agent(a).unwrap().stats().cycles, 1);
    }

    #[test]
    fn test_step_returns_fired_event() {
        let log = TraceLog::new();
        let mut sim = Simulation::new();
        let a = sim.add_agent(agent(1, 8, &log));
        sim.start_at(a, SimTime::from_millis(20));

        assert_eq!(
            sim.step(),
            Ok(Some((SimTime::from_millis(20), SimEvent::Start(a))))
        );
        assert_eq!(
            sim.step(),
            Ok(Some((
                SimTime::from_millis(20),
                SimEvent::Timer {
                    node: a,
                    timer: AgentTimer::Measure
                }
            )))
        );
    }
}
