//! Sensa single-node simulator
//!
//! Runs one sensing agent over a synthetic sine stream until the stream is
//! exhausted, capturing every broadcast frame.
//!
//! ```bash
//! sensa-sim                      # defaults
//! sensa-sim agent.json 20000     # JSON config, 20000 samples
//! RUST_LOG=sensa_runtime=debug sensa-sim
//! ```

use std::error::Error;
use std::f64::consts::TAU;
use std::fs;
use std::process::ExitCode;
use std::time::Duration;

use sensa_core::{ClusterId, NodeId, NodeIdentity};
use sensa_runtime::{AgentConfig, NodeBinding, SensorAgent, Simulation, TraceLog};
use sensa_signal::{GaussianProjection, VecSource};
use sensa_transport::CaptureDevice;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_SAMPLES: usize = 4096;
const MAX_EVENTS: u64 = 1_000_000;

fn load_config(path: Option<&str>) -> Result<AgentConfig, Box<dyn Error>> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&text)?)
        }
        None => Ok(AgentConfig::default()),
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next();
    let samples = match args.next() {
        Some(raw) => raw.parse::<usize>()?,
        None => DEFAULT_SAMPLES,
    };

    let config = load_config(config_path.as_deref())?;
    info!(
        n = config.n,
        m = config.m,
        p = config.transmission_probability,
        variance = config.noise_variance,
        samples,
        "Starting simulation"
    );

    let identity = NodeIdentity::new(NodeId::new(1), ClusterId::new(0));
    let capture = CaptureDevice::new("cap0");
    let frames = capture.handle();
    let log = TraceLog::new();

    let mut agent = SensorAgent::new(config.clone())?;
    agent.attach_compressor(Box::new(GaussianProjection::new()))?;
    agent.setup(
        NodeBinding::new(identity)
            .with_device(capture)
            .with_observer(log.clone()),
        Box::new(VecSource::from_fn(samples, |i| (TAU * i as f64 / 64.0).sin())),
    )?;

    let mut sim = Simulation::new();
    let node = sim.add_agent(agent);
    sim.start_now(node)?;
    let stats = sim.run_to_completion(MAX_EVENTS)?;

    let elapsed = Duration::from_micros(stats.end_time.as_micros());
    let Some(agent) = sim.agent(node) else {
        return Err("agent vanished from simulation".into());
    };
    let agent_stats = agent.stats();

    println!("node            {}", identity);
    println!("simulated time  {}", humantime::format_duration(elapsed));
    println!("events          {}", stats.events_processed);
    println!("cycles          {}", agent_stats.cycles);
    println!("packets created {}", agent_stats.packets_created);
    println!("packets sent    {}", agent_stats.packets_sent);
    println!("packets dropped {}", agent_stats.packets_dropped);
    println!("frames captured {}", frames.frame_count());
    if let Some((at, header)) = log.sent().last() {
        println!("last send       seq {} at {}", header.seq, at);
    }
    if stats.budget_exhausted {
        println!("event budget of {} exhausted", MAX_EVENTS);
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,sensa_runtime=info")),
        )
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Simulation failed");
            ExitCode::FAILURE
        }
    }
}
