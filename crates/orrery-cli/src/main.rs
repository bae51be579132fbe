//! Command-line entry point for the Orrery simulation framework.
//!
//! Loads a JSON scenario (or falls back to a built-in demo flight), wires the
//! built-in models into the controller, and runs the fixed-step loop for the
//! requested number of simulation seconds.

use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use orrery_sim::prelude::*;

// ---------------------------------------------------------------------------
// Args
// ---------------------------------------------------------------------------

/// Deterministic discrete-event simulation runner.
#[derive(Debug, Parser)]
#[command(name = "orrery", version)]
struct Args {
    /// Scenario file (JSON). Runs a built-in demo flight when omitted.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Simulation seconds to run before terminating.
    #[arg(long, default_value_t = 120.0)]
    duration: f64,

    /// Log filter; `RUST_LOG` takes precedence when set.
    #[arg(long, default_value = "info")]
    log: String,
}

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.log.clone())),
        )
        .with_target(true)
        .init();

    info!("starting orrery");

    let mut controller = Controller::new();
    orrery_models::register_builtin_models(controller.registry_mut());

    match &args.scenario {
        Some(path) => {
            let scenario = ScenarioSpec::load(path)
                .with_context(|| format!("loading scenario {}", path.display()))?;
            let report = controller.initialize(scenario.timestep, &scenario.entities)?;
            info!(
                created = report.created,
                failed = report.failed,
                triggers = report.triggers,
                "scenario loaded"
            );
        }
        None => initialize_demo(&mut controller)?,
    }

    controller.run_for(args.duration)?;

    info!(
        sim_time = controller.sim_time(),
        ticks = controller.tick_count(),
        "run complete"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Demo flight
// ---------------------------------------------------------------------------

/// A hardwired demo run: one missile, a roster check at t=3, a pause at t=5,
/// a resume at t=8, and a self-destruct requested at t=10 for t=15.
fn initialize_demo(controller: &mut Controller) -> anyhow::Result<()> {
    let spec = EntitySpec {
        class_name: "missile".to_owned(),
        name: Some("missile-1".to_owned()),
        pose: None,
        triggers: Vec::new(),
    };
    controller.initialize(0.001, &[spec])?;

    let missile = controller
        .registry()
        .find_by_name("missile-1")
        .context("demo missile missing after initialize")?;

    let roster = Rc::clone(&missile);
    controller.schedule_event(
        3.0,
        Box::new(move || {
            let entity = roster.borrow();
            info!(entity_id = %entity.id(), name = %entity.name(), "roster check");
        }),
    );

    let controls = controller.control_handle();
    let pause = controls.clone();
    controller.schedule_event(
        5.0,
        Box::new(move || {
            info!("scheduled pause event triggered");
            pause.pause();
        }),
    );
    let resume = controls;
    controller.schedule_event(
        8.0,
        Box::new(move || {
            info!("scheduled resume event triggered");
            resume.resume();
        }),
    );

    let target = Rc::clone(&missile);
    controller.schedule_event(
        10.0,
        Box::new(move || {
            let id = target.borrow().id();
            let doomed = Rc::clone(&target);
            let request = EventRequest::new(
                id,
                15.0,
                "demo self destruct",
                Box::new(move || doomed.borrow_mut().shutdown()),
            );
            target.borrow_mut().request_event(request);
        }),
    );

    Ok(())
}
