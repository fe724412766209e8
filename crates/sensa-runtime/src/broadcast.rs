//! Probabilistic, rate-limited broadcast scheduler
//!
//! States:
//! - Idle: nothing in flight and no attempt armed
//! - Pending: a send timer is armed for the packet in flight
//! - Sending: the send timer fired, the packet goes out on every device
//!
//! Each scheduling attempt pops the queue head and rolls one draw. A packet
//! that loses the draw is dropped for good; only the next packet gets a
//! fresh chance.

use std::collections::VecDeque;
use std::time::Duration;

use sensa_core::{SensaError, SensaResult, SimTime};
use sensa_time::{TimerHandle, TimerQueue};
use sensa_transport::Transmitter;
use sensa_wire::Packet;
use tracing::{debug, error, trace};

use crate::config::validate_probability;
use crate::{AgentTimer, DrawSource, DropReason, TraceEvent, Tracer};

/// Broadcast counters
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub enqueued: u64,
    pub attempts: u64,
    pub sent: u64,
    pub dropped: u64,
}

/// FIFO queue plus the single in-flight slot
pub struct BroadcastScheduler {
    queue: VecDeque<Packet>,
    in_flight: Option<Packet>,
    schedule_timer: Option<TimerHandle>,
    send_timer: Option<TimerHandle>,
    transmission_probability: f64,
    packet_interval: Duration,
    draws: Box<dyn DrawSource>,
    last_send: Option<SimTime>,
    stats: BroadcastStats,
}

impl BroadcastScheduler {
    pub fn new(
        transmission_probability: f64,
        packet_interval: Duration,
        draws: Box<dyn DrawSource>,
    ) -> SensaResult<Self> {
        validate_probability(transmission_probability)?;
        Ok(BroadcastScheduler {
            queue: VecDeque::new(),
            in_flight: None,
            schedule_timer: None,
            send_timer: None,
            transmission_probability,
            packet_interval,
            draws,
            last_send: None,
            stats: BroadcastStats::default(),
        })
    }

    pub fn set_transmission_probability(&mut self, p: f64) -> SensaResult<()> {
        validate_probability(p)?;
        self.transmission_probability = p;
        Ok(())
    }

    pub fn transmission_probability(&self) -> f64 {
        self.transmission_probability
    }

    pub fn set_draw_source(&mut self, draws: Box<dyn DrawSource>) {
        self.draws = draws;
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Packet currently between admission and send, if any
    pub fn in_flight(&self) -> Option<&Packet> {
        self.in_flight.as_ref()
    }

    /// No send armed and no attempt armed
    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none() && self.send_timer.is_none() && self.schedule_timer.is_none()
    }

    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }

    /// Append to the tail. A queue that was empty with nothing pending
    /// gets an immediate zero-delay attempt.
    pub fn enqueue(
        &mut self,
        packet: Packet,
        timers: &mut dyn TimerQueue<AgentTimer>,
        tracer: &mut Tracer,
    ) -> SensaResult<()> {
        let was_empty = self.queue.is_empty();
        trace!(seq = packet.seq(), queue_len = self.queue.len() + 1, "Packet queued");
        self.queue.push_back(packet);
        self.stats.enqueued += 1;

        if was_empty && self.is_idle() {
            self.schedule_attempt(Duration::ZERO, timers, tracer)?;
        }
        Ok(())
    }

    /// Kick a backlog left over from a previous run
    pub fn resume(
        &mut self,
        timers: &mut dyn TimerQueue<AgentTimer>,
        tracer: &mut Tracer,
    ) -> SensaResult<()> {
        if !self.queue.is_empty() && self.is_idle() {
            debug!(queue_len = self.queue.len(), "Resuming queued broadcasts");
            self.schedule_attempt(Duration::ZERO, timers, tracer)?;
        }
        Ok(())
    }

    /// Time left before the link may carry another frame
    fn holdoff(&self, now: SimTime) -> Duration {
        self.last_send
            .map_or(Duration::ZERO, |at| (at + self.packet_interval).saturating_since(now))
    }

    /// Pop the head and roll the transmission gate.
    ///
    /// Requires a non-empty queue and nothing in flight; anything else is
    /// an invariant breach.
    pub fn schedule_attempt(
        &mut self,
        delay: Duration,
        timers: &mut dyn TimerQueue<AgentTimer>,
        tracer: &mut Tracer,
    ) -> SensaResult<()> {
        if self.in_flight.is_some() || self.send_timer.is_some() {
            error!("Schedule attempt while a send is in flight");
            return Err(SensaError::InvariantViolation(
                "schedule attempt while a send is in flight",
            ));
        }
        let Some(packet) = self.queue.pop_front() else {
            error!("Schedule attempt with an empty queue");
            return Err(SensaError::InvariantViolation(
                "schedule attempt with an empty queue",
            ));
        };

        self.stats.attempts += 1;
        let draw = self.draws.next_draw();

        if draw < self.transmission_probability {
            // Sends stay at least one packet interval apart
            let delay = delay.max(self.holdoff(timers.now()));
            debug!(seq = packet.seq(), draw, ?delay, "Packet admitted");
            self.send_timer = Some(timers.schedule(delay, AgentTimer::Send));
            self.in_flight = Some(packet);
        } else {
            debug!(seq = packet.seq(), draw, "Packet dropped by transmission gate");
            self.stats.dropped += 1;
            tracer.emit(TraceEvent::PacketDropped {
                at: timers.now(),
                header: *packet.header(),
                reason: DropReason::ProbabilityGate,
            });
            if !self.queue.is_empty() {
                self.schedule_timer = Some(timers.schedule(
                    self.packet_interval,
                    AgentTimer::ScheduleAttempt {
                        delay: self.packet_interval,
                    },
                ));
            }
        }
        Ok(())
    }

    /// Re-armed attempt fired
    pub fn on_schedule_timer(
        &mut self,
        handle: TimerHandle,
        delay: Duration,
        timers: &mut dyn TimerQueue<AgentTimer>,
        tracer: &mut Tracer,
    ) -> SensaResult<()> {
        if self.schedule_timer != Some(handle) {
            trace!(?handle, "Stale schedule timer ignored");
            return Ok(());
        }
        self.schedule_timer = None;
        self.schedule_attempt(delay, timers, tracer)
    }

    /// Send timer fired: emit the in-flight packet on every device
    pub fn on_send_timer(
        &mut self,
        handle: TimerHandle,
        timers: &mut dyn TimerQueue<AgentTimer>,
        transmitter: &mut Transmitter,
        tracer: &mut Tracer,
    ) -> SensaResult<()> {
        if self.send_timer != Some(handle) {
            trace!(?handle, "Stale send timer ignored");
            return Ok(());
        }
        self.send_timer = None;
        let Some(packet) = self.in_flight.take() else {
            error!("Send timer fired with nothing in flight");
            return Err(SensaError::InvariantViolation(
                "send timer fired with nothing in flight",
            ));
        };

        let devices = transmitter.broadcast(&packet);
        self.stats.sent += 1;
        self.last_send = Some(timers.now());
        debug!(seq = packet.seq(), devices, at = %timers.now(), "Packet broadcast");
        tracer.emit(TraceEvent::PacketSent {
            at: timers.now(),
            header: *packet.header(),
        });

        if !self.queue.is_empty() {
            self.schedule_attempt(self.packet_interval, timers, tracer)?;
        }
        Ok(())
    }

    /// Cancel both timers. A packet in flight is discarded.
    pub fn cancel(&mut self, timers: &mut dyn TimerQueue<AgentTimer>, tracer: &mut Tracer) {
        if let Some(handle) = self.schedule_timer.take() {
            timers.cancel(handle);
        }
        if let Some(handle) = self.send_timer.take() {
            timers.cancel(handle);
        }
        if let Some(packet) = self.in_flight.take() {
            self.stats.dropped += 1;
            debug!(seq = packet.seq(), "In-flight packet discarded on stop");
            tracer.emit(TraceEvent::PacketDropped {
                at: timers.now(),
                header: *packet.header(),
                reason: DropReason::Stopped,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FixedDraws, SeededDraws, TraceLog};
    use sensa_core::{NodeIdentity, SimTime};
    use sensa_time::EventScheduler;
    use sensa_transport::CaptureDevice;

    struct Harness {
        sched: EventScheduler<AgentTimer>,
        broadcast: BroadcastScheduler,
        transmitter: Transmitter,
        tracer: Tracer,
        log: TraceLog,
        capture: sensa_transport::CaptureHandle,
    }

    impl Harness {
        fn new(p: f64, interval: Duration, draws: Box<dyn DrawSource>) -> Self {
            let device = CaptureDevice::new("cap0");
            let capture = device.handle();
            let log = TraceLog::new();
            Harness {
                sched: EventScheduler::new(),
                broadcast: BroadcastScheduler::new(p, interval, draws).unwrap(),
                transmitter: Transmitter::new(vec![Box::new(device)]),
                tracer: Tracer::new(vec![Box::new(log.clone())]),
                log,
                capture,
            }
        }

        fn enqueue(&mut self, seq: u32) {
            let packet = Packet::from_samples(NodeIdentity::default(), seq, &[seq as f64]).unwrap();
            self.broadcast
                .enqueue(packet, &mut self.sched, &mut self.tracer)
                .unwrap();
        }

        /// Fire timers until the queue drains, checking the in-flight bound
        fn run(&mut self) {
            while let Some(fired) = self.sched.pop_next() {
                match fired.event {
                    AgentTimer::ScheduleAttempt { delay } => self
                        .broadcast
                        .on_schedule_timer(fired.handle, delay, &mut self.sched, &mut self.tracer)
                        .unwrap(),
                    AgentTimer::Send => self
                        .broadcast
                        .on_send_timer(
                            fired.handle,
                            &mut self.sched,
                            &mut self.transmitter,
                            &mut self.tracer,
                        )
                        .unwrap(),
                    AgentTimer::Measure => unreachable!(),
                }
            }
        }

        fn sent_seqs(&self) -> Vec<u32> {
            self.log.sent().iter().map(|(_, h)| h.seq).collect()
        }
    }

    #[test]
    fn test_first_packet_admitted_immediately() {
        let mut h = Harness::new(1.0, Duration::from_millis(100), Box::new(SeededDraws::new(0)));
        h.enqueue(0);

        assert!(h.broadcast.in_flight().is_some());
        assert_eq!(h.broadcast.queue_len(), 0);
        assert_eq!(h.sched.peek_time(), Some(SimTime::ZERO));

        h.run();
        assert_eq!(h.sent_seqs(), vec![0]);
        assert_eq!(h.capture.frame_count(), 1);
        assert!(h.broadcast.is_idle());
    }

    #[test]
    fn test_fifo_with_spacing() {
        let interval = Duration::from_millis(100);
        let mut h = Harness::new(1.0, interval, Box::new(SeededDraws::new(0)));
        for seq in 0..5 {
            h.enqueue(seq);
        }
        h.run();

        assert_eq!(h.sent_seqs(), vec![0, 1, 2, 3, 4]);
        let times: Vec<SimTime> = h.log.sent().iter().map(|(t, _)| *t).collect();
        for pair in times.windows(2) {
            assert!(pair[1] - pair[0] >= interval);
        }
        assert_eq!(h.broadcast.stats().sent, 5);
    }

    #[test]
    fn test_refilled_queue_respects_spacing() {
        let interval = Duration::from_millis(100);
        let mut h = Harness::new(1.0, interval, Box::new(SeededDraws::new(0)));
        h.enqueue(0);
        h.run();

        // Queue refills 10ms after the last send
        h.sched.advance_to(SimTime::from_millis(10));
        h.enqueue(1);
        h.run();

        let times: Vec<SimTime> = h.log.sent().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![SimTime::ZERO, SimTime::from_millis(100)]);

        // A quiet link sends a fresh packet immediately
        h.sched.advance_to(SimTime::from_secs(5));
        h.enqueue(2);
        h.run();
        assert_eq!(h.log.sent()[2].0, SimTime::from_secs(5));
    }

    #[test]
    fn test_fixed_draw_sequence() {
        let mut h = Harness::new(
            0.5,
            Duration::ZERO,
            Box::new(FixedDraws::new(vec![0.9, 0.1, 0.4])),
        );
        for seq in 0..3 {
            h.enqueue(seq);
        }
        h.run();

        assert_eq!(h.sent_seqs(), vec![1, 2]);
        let dropped = h.log.dropped();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].0.seq, 0);
        assert_eq!(dropped[0].1, DropReason::ProbabilityGate);
        assert_eq!(h.broadcast.stats().attempts, 3);
    }

    #[test]
    fn test_zero_probability_drains_queue() {
        let mut h = Harness::new(0.0, Duration::from_millis(10), Box::new(SeededDraws::new(3)));
        for seq in 0..4 {
            h.enqueue(seq);
        }
        h.run();

        assert!(h.sent_seqs().is_empty());
        assert_eq!(h.broadcast.queue_len(), 0);
        assert_eq!(h.broadcast.stats().dropped, 4);
        assert_eq!(h.capture.frame_count(), 0);
    }

    #[test]
    fn test_drop_rearms_after_interval() {
        let interval = Duration::from_millis(50);
        let mut h = Harness::new(
            0.5,
            interval,
            Box::new(FixedDraws::new(vec![0.0, 0.9, 0.0])),
        );
        h.enqueue(0);
        h.enqueue(1);
        h.enqueue(2);

        // Packet 0 goes out at t=0 and packet 1 loses its draw right away
        let first = h.sched.pop_next().unwrap();
        h.broadcast
            .on_send_timer(first.handle, &mut h.sched, &mut h.transmitter, &mut h.tracer)
            .unwrap();
        assert_eq!(h.broadcast.queue_len(), 1);
        assert!(h.broadcast.in_flight().is_none());
        assert_eq!(h.sched.peek_time(), Some(SimTime::ZERO + interval));

        h.run();
        let sent = h.log.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1.seq, 2);
        assert_eq!(sent[1].0, SimTime::ZERO + interval * 2);
        assert_eq!(h.log.dropped()[0].0.seq, 1);
    }

    #[test]
    fn test_attempt_preconditions() {
        let mut h = Harness::new(1.0, Duration::ZERO, Box::new(SeededDraws::new(0)));
        let err = h
            .broadcast
            .schedule_attempt(Duration::ZERO, &mut h.sched, &mut h.tracer)
            .unwrap_err();
        assert!(err.is_precondition());

        h.enqueue(0);
        h.enqueue(1);
        // Packet 0 in flight, packet 1 queued
        let err = h
            .broadcast
            .schedule_attempt(Duration::ZERO, &mut h.sched, &mut h.tracer)
            .unwrap_err();
        assert!(matches!(err, SensaError::InvariantViolation(_)));
    }

    #[test]
    fn test_cancel_discards_in_flight() {
        let mut h = Harness::new(1.0, Duration::ZERO, Box::new(SeededDraws::new(0)));
        h.enqueue(0);
        h.enqueue(1);

        h.broadcast.cancel(&mut h.sched, &mut h.tracer);
        assert!(h.sched.is_empty());
        assert!(h.broadcast.is_idle());
        assert_eq!(h.broadcast.queue_len(), 1);
        assert_eq!(h.log.dropped()[0].1, DropReason::Stopped);

        // Backlog picks up again
        h.broadcast.resume(&mut h.sched, &mut h.tracer).unwrap();
        h.run();
        assert_eq!(h.sent_seqs(), vec![1]);
    }

    #[test]
    fn test_stale_timer_ignored() {
        let mut h = Harness::new(1.0, Duration::ZERO, Box::new(SeededDraws::new(0)));
        h.enqueue(0);
        let fired = h.sched.pop_next().unwrap();
        h.broadcast
            .on_send_timer(fired.handle, &mut h.sched, &mut h.transmitter, &mut h.tracer)
            .unwrap();
        // Same handle again is a no-op
        h.broadcast
            .on_send_timer(fired.handle, &mut h.sched, &mut h.transmitter, &mut h.tracer)
            .unwrap();
        assert_eq!(h.sent_seqs(), vec![0]);
    }
}
