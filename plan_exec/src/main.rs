//! Longitudinal planner scenario replay executable.
//!
//! # Architecture
//!
//! The executable replays a scenario script against a simulated world:
//!
//!     - Initialise the session, logging and the planner
//!     - Main loop, one iteration per 50 ms of simulated time:
//!         - Scenario command processing
//!         - Planner input acquisition from the world
//!         - Longitudinal planning
//!         - World propagation under the new plan
//!
//! Execution is not paced against the wall clock, the script runs as fast as
//! the planner allows.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, info, trace, warn};
use std::env;
use std::time::Instant;

// Internal
use comms_if::plan::PlanSource;
use plan_lib::{
    long_mpc::KinematicSolver,
    long_plan::{LongPlanner, Params},
    world::{World, SIM_STEP_S},
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    script_interpreter::{PendingCmds, ScriptInterpreter},
    session::Session,
};

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("plan_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Debug, &session).wrap_err("Failed to initialise logging")?;

    info!("Longitudinal Planner Replay Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD SCRIPT ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    if args.len() != 2 {
        return Err(eyre!(
            "Expected exactly one argument (the scenario script), found {}",
            args.len() - 1
        ));
    }

    info!("Loading script from \"{}\"", &args[1]);

    let mut si = ScriptInterpreter::new(&args[1]).wrap_err("Failed to load script")?;

    info!(
        "Loaded script lasts {:.02} s and contains {} commands\n",
        si.get_duration(),
        si.get_num_cmds()
    );

    // ---- INITIALISE MODULES ----

    info!("Initialising modules...");

    let mut planner = LongPlanner::new(
        Params::default(),
        KinematicSolver::new(),
        KinematicSolver::new(),
    )
    .wrap_err("Failed to create LongPlanner")?;

    planner
        .init("long_plan.toml", &session)
        .wrap_err("Failed to initialise LongPlanner")?;
    info!("LongPlanner init complete");

    let mut world = World::default();

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    info!("Begining main loop\n");

    let loop_start = Instant::now();
    let mut num_fcw = 0u64;
    let mut num_resets = [0u64; 2];
    let mut min_gap_m = f64::INFINITY;
    let mut source_time_s = [0.0f64; 3];

    loop {
        // ---- SCENARIO COMMAND PROCESSING ----

        match si.get_pending_cmds(world.sim_time_s) {
            PendingCmds::None => (),
            PendingCmds::Some(cmds) => {
                for cmd in cmds.iter() {
                    world.exec(cmd);
                }
            }
            PendingCmds::EndOfScript => {
                info!("End of scenario script reached, stopping");
                break;
            }
        }

        // ---- PLANNING ----

        let input = world.input_data();

        let (plan, report) = match planner.proc(&input) {
            Ok(o) => o,
            Err(e) => match e {},
        };

        if report.source_changed {
            info!(
                "t = {:.2} s: plan source is now {}",
                world.sim_time_s, plan.longitudinal_plan_source
            );
        }

        if plan.fcw {
            warn!("t = {:.2} s: forward collision warning", world.sim_time_s);
            num_fcw += 1;
        }

        for (i, r) in [&report.mpc1, &report.mpc2].iter().enumerate() {
            // The MPC warns about resets itself, at a limited rate
            if let Some(ref cause) = r.reset {
                debug!(
                    "t = {:.2} s: MPC{} reset ({:?})",
                    world.sim_time_s, r.mpc_id, cause
                );
                num_resets[i] += 1;
            }

            // Full trajectories are only produced in verbose mode
            if let Some(ref diag) = r.diagnostic {
                trace!(
                    "{}",
                    serde_json::to_string(diag).wrap_err("Failed to serialise MPC diagnostic")?
                );
            }
        }

        if world.is_1_hz_cycle {
            debug!(
                "t = {:.2} s: v_ego = {:.2} m/s, v_target = {:.2} m/s, a_target = {:.2} m/s^2, \
                TR = {:.2} s, source = {}",
                world.sim_time_s,
                world.ego.v_ego,
                plan.v_target,
                plan.a_target,
                report.mpc1.tr_s,
                plan.longitudinal_plan_source
            );
        }

        let idx = match plan.longitudinal_plan_source {
            PlanSource::Cruise => 0,
            PlanSource::Mpc1 => 1,
            PlanSource::Mpc2 => 2,
        };
        source_time_s[idx] += SIM_STEP_S;

        // ---- WORLD PROPAGATION ----

        world.step(&plan);

        if let Some(lead) = world.lead {
            min_gap_m = min_gap_m.min(lead.d_rel);
        }
    }

    // ---- SUMMARY ----

    info!(
        "Replayed {:.2} s of scenario in {:.3} s",
        world.sim_time_s,
        loop_start.elapsed().as_secs_f64()
    );
    info!("Final ego speed: {:.2} m/s", world.ego.v_ego);
    info!(
        "Time per source: cruise {:.2} s, mpc1 {:.2} s, mpc2 {:.2} s",
        source_time_s[0], source_time_s[1], source_time_s[2]
    );
    if min_gap_m.is_finite() {
        info!("Closest approach to the lead: {:.2} m", min_gap_m);
    }
    info!("Forward collision warnings: {}", num_fcw);

    if num_resets.iter().any(|n| *n > 0) {
        warn!(
            "MPC resets: mpc1 {}, mpc2 {}",
            num_resets[0], num_resets[1]
        );
    }

    if world.num_collisions > 0 {
        warn!("Collisions with the lead: {}", world.num_collisions);
    }

    Ok(())
}
