//! End-to-end behavioural checks over scenario reports
//!
//! Each check inspects a finished [`NodeReport`] and answers one question
//! about the run. The tests at the bottom drive them over the canonical
//! scenarios and over arbitrary configurations.

use std::time::Duration;

use sensa_core::{SensaResult, SimTime};
use sensa_runtime::SimEvent;
use sensa_signal::{CompressionConfig, Compressor, GaussianProjection};
use sensa_time::Prioritized;

use crate::NodeReport;

/// Sequence numbers on the wire start at 0 and never skip, counting
/// dropped packets too
pub fn sequences_gap_free(node: &NodeReport) -> bool {
    let mut seqs: Vec<u32> = node
        .sent_seqs()
        .into_iter()
        .chain(node.dropped_seqs())
        .collect();
    seqs.sort_unstable();
    let pending = node.stats.queue_len + node.stats.in_flight;
    seqs.iter().enumerate().all(|(i, seq)| u64::from(*seq) == i as u64)
        && (seqs.len() + pending) as u64 == node.next_seq
}

/// Within one instant, lifecycle events come first, then measurements,
/// then scheduling attempts and sends
pub fn same_instant_in_priority_order(timeline: &[(SimTime, SimEvent)]) -> bool {
    timeline
        .windows(2)
        .all(|w| w[0].0 != w[1].0 || w[0].1.priority() <= w[1].1.priority())
}

/// Sends happen in strictly increasing sequence order
pub fn sends_in_fifo_order(node: &NodeReport) -> bool {
    node.sent_seqs().windows(2).all(|w| w[0] < w[1])
}

/// Consecutive sends are at least `interval` apart
pub fn sends_spaced(node: &NodeReport, interval: Duration) -> bool {
    node.send_times().windows(2).all(|w| w[1] - w[0] >= interval)
}

/// Frames on the device match the sent trace one to one
pub fn frames_match_trace(node: &NodeReport) -> bool {
    node.frames.len() == node.sent.len()
        && node
            .frames
            .iter()
            .zip(&node.sent)
            .all(|(frame, (_, header))| frame.header() == header)
}

/// Recompute y = Φx for each raw block with a fresh projection
pub fn project_blocks(config: CompressionConfig, raw: &[f64]) -> SensaResult<Vec<Vec<f64>>> {
    let mut projection = GaussianProjection::with_config(config)?;
    raw.chunks_exact(config.n)
        .map(|block| {
            let mut out = vec![0.0; config.m];
            projection.compress(block, &mut out)?;
            Ok(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ScenarioBuilder;
    use proptest::prelude::*;
    use sensa_core::SensaError;
    use sensa_runtime::{AgentConfig, AgentTimer, DropReason, TraceEvent};

    #[test]
    fn test_ten_samples_two_cycles() {
        let report = ScenarioBuilder::new()
            .dimensions(4, 2)
            .intervals(Duration::from_secs(1), Duration::ZERO)
            .ramp(10)
            .run();
        let node = report.node().unwrap();

        assert!(report.errors.is_empty());
        assert_eq!(node.stats.cycles, 2);
        assert_eq!(node.remaining_samples, 2);
        assert_eq!(node.sent_seqs(), vec![0, 1]);
        assert!(node.frames.iter().all(|p| p.samples().len() == 2));
        assert_eq!(
            node.send_times(),
            vec![SimTime::ZERO, SimTime::from_secs(1)]
        );
        assert!(frames_match_trace(node));
    }

    #[test]
    fn test_start_before_setup() {
        let report = ScenarioBuilder::new()
            .dimensions(4, 2)
            .ramp(10)
            .without_setup()
            .run();

        assert_eq!(report.errors, vec![SensaError::NotSetUp]);
        assert!(report.errors[0].is_precondition());
        assert_eq!(report.total_sent(), 0);
        assert_eq!(report.node().unwrap().stats.packets_created, 0);
    }

    #[test]
    fn test_fixed_draws_drop_first() {
        let report = ScenarioBuilder::new()
            .dimensions(4, 2)
            .probability(0.5)
            .draws(vec![0.9, 0.1, 0.4])
            .ramp(12)
            .run();
        let node = report.node().unwrap();

        assert_eq!(node.sent_seqs(), vec![1, 2]);
        assert_eq!(node.dropped_seqs(), vec![0]);
        assert_eq!(node.dropped[0].1, DropReason::ProbabilityGate);
        assert_eq!(node.frames.len(), 2);
    }

    #[test]
    fn test_zero_probability_sends_nothing() {
        let report = ScenarioBuilder::new()
            .dimensions(4, 2)
            .probability(0.0)
            .ramp(40)
            .run();
        let node = report.node().unwrap();

        assert_eq!(node.sent.len(), 0);
        assert_eq!(node.frames.len(), 0);
        assert_eq!(node.stats.queue_len, 0);
        assert_eq!(node.next_seq, 10u64);
        assert_eq!(node.dropped_seqs(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_backlog_sent_in_order_and_spaced() {
        // Measurements outpace the link, so a backlog builds up
        let interval = Duration::from_millis(250);
        let report = ScenarioBuilder::new()
            .dimensions(4, 2)
            .intervals(Duration::from_millis(100), interval)
            .ramp(80)
            .run();
        let node = report.node().unwrap();

        assert_eq!(node.sent.len(), 20);
        assert!(sends_in_fifo_order(node));
        assert!(sends_spaced(node, interval));
        assert_eq!(report.max_in_flight, 1);
        assert!(sequences_gap_free(node));
    }

    #[test]
    fn test_measurement_settles_before_same_instant_attempt() {
        // The packet interval is a multiple of the measurement interval, so
        // a re-armed attempt after a drop lands on a measurement tick
        let interval = Duration::from_millis(200);
        let report = ScenarioBuilder::new()
            .dimensions(1, 1)
            .intervals(Duration::from_millis(100), interval)
            .probability(0.5)
            .draws(vec![0.0, 0.0, 0.0, 0.9])
            .ramp(40)
            .run();
        let node = report.node().unwrap();

        assert!(report.errors.is_empty());
        assert!(same_instant_in_priority_order(&report.timeline));
        assert!(!node.dropped.is_empty());

        let measured_at: Vec<SimTime> = report
            .timeline
            .iter()
            .filter(|(_, e)| matches!(e, SimEvent::Timer { timer: AgentTimer::Measure, .. }))
            .map(|(at, _)| *at)
            .collect();
        for (i, (at, event)) in report.timeline.iter().enumerate() {
            if matches!(
                event,
                SimEvent::Timer {
                    timer: AgentTimer::ScheduleAttempt { .. },
                    ..
                }
            ) && measured_at.contains(at)
            {
                let measured_first = report.timeline[..i].iter().any(|(t, e)| {
                    t == at && matches!(e, SimEvent::Timer { timer: AgentTimer::Measure, .. })
                });
                assert!(measured_first, "attempt at {} ran before its measurement", at);
            }
        }

        assert!(sequences_gap_free(node));
        assert!(sends_in_fifo_order(node));
        assert!(sends_spaced(node, interval));
    }

    #[test]
    fn test_zero_noise_is_pure_projection() {
        let samples: Vec<f64> = (0..32).map(|i| (i as f64 * 0.37).cos()).collect();
        let config = AgentConfig::default().with_dimensions(8, 3);
        let report = ScenarioBuilder::new()
            .config(config.clone())
            .samples(samples.clone())
            .run();

        let expected = project_blocks(config.compression(), &samples).unwrap();
        let node = report.node().unwrap();
        assert_eq!(node.compressed_blocks, expected);
        let payloads: Vec<Vec<f64>> = node.frames.iter().map(|p| p.samples()).collect();
        assert_eq!(payloads, expected);
    }

    #[test]
    fn test_noise_changes_output() {
        let samples: Vec<f64> = (0..32).map(|i| i as f64).collect();
        let config = AgentConfig::default().with_dimensions(8, 3);
        let report = ScenarioBuilder::new()
            .config(config.clone())
            .noise(1.0)
            .samples(samples.clone())
            .run();

        let clean = project_blocks(config.compression(), &samples).unwrap();
        assert_ne!(report.node().unwrap().compressed_blocks, clean);
    }

    #[test]
    fn test_stop_mid_run() {
        let report = ScenarioBuilder::new()
            .dimensions(4, 2)
            .ramp(400)
            .stop_at(SimTime::from_millis(3_500))
            .run();
        let node = report.node().unwrap();

        assert_eq!(node.stats.cycles, 4);
        assert_eq!(node.remaining_samples, 400 - 16);
        assert!(!node
            .events
            .iter()
            .any(|e| matches!(e, TraceEvent::SourceExhausted { .. })));
    }

    #[test]
    fn test_nodes_are_independent() {
        let report = ScenarioBuilder::new()
            .dimensions(4, 2)
            .nodes(3)
            .ramp(12)
            .run();

        assert_eq!(report.nodes.len(), 3);
        for node in &report.nodes {
            assert_eq!(node.sent_seqs(), vec![0, 1, 2]);
            assert!(node.frames.iter().all(|p| p.header().node_id == node.identity.node));
        }
        assert_eq!(report.total_frames(), 9);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn invariants_hold_for_any_run(
            n in 1usize..16,
            m in 1usize..8,
            blocks in 0usize..24,
            p in 0.0f64..=1.0,
            measure_ms in 1u64..500,
            packet_ms in 0u64..800,
            seed in any::<u64>(),
        ) {
            let config = AgentConfig::default()
                .with_dimensions(n, m)
                .with_transmission_probability(p)
                .with_intervals(
                    Duration::from_millis(measure_ms),
                    Duration::from_millis(packet_ms),
                )
                .with_rng_seed(seed);
            let report = ScenarioBuilder::new()
                .config(config)
                .ramp(n * blocks)
                .run();
            let node = report.node().unwrap();

            prop_assert!(report.errors.is_empty());
            prop_assert!(report.max_in_flight <= 1);
            prop_assert_eq!(node.next_seq, blocks as u64);
            prop_assert_eq!(node.stats.queue_len, 0);
            prop_assert_eq!(node.sent.len() + node.dropped.len(), blocks);
            prop_assert!(sequences_gap_free(node));
            prop_assert!(sends_in_fifo_order(node));
            prop_assert!(sends_spaced(node, Duration::from_millis(packet_ms)));
            prop_assert!(frames_match_trace(node));
            prop_assert!(same_instant_in_priority_order(&report.timeline));
        }

        #[test]
        fn certain_delivery_sends_everything(blocks in 1usize..30, packet_ms in 0u64..3_000) {
            let report = ScenarioBuilder::new()
                .dimensions(2, 1)
                .intervals(Duration::from_secs(1), Duration::from_millis(packet_ms))
                .ramp(2 * blocks)
                .run();
            let node = report.node().unwrap();

            let expected: Vec<u32> = (0..blocks as u32).collect();
            prop_assert_eq!(node.sent_seqs(), expected);
            prop_assert!(node.dropped.is_empty());
        }
    }
}
