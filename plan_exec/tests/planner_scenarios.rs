//! Closed loop scenarios running the planner against the simulated world.

use comms_if::{
    plan::{Plan, PlanSource},
    scenario::ScenarioCmd,
};
use plan_lib::{
    long_mpc::{cost_for_tr, dynamic_follow, KinematicSolver, LeadGeometry, MpcParams},
    long_plan::{curvature_speed, LongPlanner, Params, StatusReport},
    world::{World, SIM_STEP_S},
};
use util::script_interpreter::{PendingCmds, ScriptInterpreter};

// ---------------------------------------------------------------------------
// HELPERS
// ---------------------------------------------------------------------------

fn planner() -> LongPlanner<KinematicSolver> {
    // Generous solve budget so slow test machines don't trigger overruns
    let params = Params {
        mpc: MpcParams {
            solver_budget_s: 1.0,
            ..Default::default()
        },
        ..Default::default()
    };

    LongPlanner::new(params, KinematicSolver::new(), KinematicSolver::new()).unwrap()
}

/// One planning cycle followed by one world step.
fn cycle(planner: &mut LongPlanner<KinematicSolver>, world: &mut World) -> (Plan, StatusReport) {
    let (plan, report) = planner.update(&world.input_data());
    world.step(&plan);
    (plan, report)
}

fn cycles_in(seconds: f64) -> usize {
    (seconds / SIM_STEP_S).round() as usize
}

/// World at `v_ego` with the given commands applied, after one disengaged
/// cycle which seeds the planner from the ego state.
fn seeded(planner: &mut LongPlanner<KinematicSolver>, v_ego: f64, cmds: &[ScenarioCmd]) -> World {
    let mut world = World::new(v_ego);
    for c in cmds {
        world.exec(c);
    }
    cycle(planner, &mut world);
    world
}

// ---------------------------------------------------------------------------
// SCENARIOS
// ---------------------------------------------------------------------------

#[test]
fn cruise_without_lead_settles_on_setpoint() {
    let mut p = planner();
    let mut w = seeded(&mut p, 20.0, &[ScenarioCmd::SetCruise { v_cruise_kph: 90.0 }]);
    w.exec(&ScenarioCmd::Engage);

    let mut v_max: f64 = 0.0;
    for _ in 0..cycles_in(40.0) {
        let (plan, report) = cycle(&mut p, &mut w);

        assert!(report.enabled);
        assert_eq!(plan.longitudinal_plan_source, PlanSource::Cruise);
        assert!(!plan.has_lead);
        assert!(!plan.fcw);
        assert!(plan.a_target.is_finite());

        v_max = v_max.max(w.ego.v_ego);
    }

    assert!(v_max < 25.3);
    assert!((w.ego.v_ego - 25.0).abs() < 0.3);
}

#[test]
fn closing_lead_takes_over_from_cruise() {
    let mut p = planner();
    let mut w = World::new(20.0);
    w.exec(&ScenarioCmd::SetCruise { v_cruise_kph: 90.0 });
    w.exec(&ScenarioCmd::SpawnLead {
        d_rel_m: 30.0,
        v_lead_ms: 18.0,
        a_lead_mss: 0.0,
    });

    // The lead is acquired on the first cycle, engaged or not
    let (_, report) = cycle(&mut p, &mut w);
    assert!(report.mpc1.new_lead);
    assert!(report.mpc1.has_lead);
    assert!(!report.mpc2.has_lead);

    // Closing at 2 m/s adds the relative speed correction to the base curve
    let base = dynamic_follow(20.0, None, false, 1.0);
    let lead = LeadGeometry {
        x_lead: 30.0,
        v_lead: 18.0,
        a_lead: 0.0,
    };
    assert!((report.mpc1.tr_s - 1.893).abs() < 1e-9);
    assert_eq!(report.mpc1.tr_s, dynamic_follow(20.0, Some(&lead), false, 1.0));
    assert!((report.mpc1.tr_s - base - 0.154).abs() < 1e-3);

    assert!(report.mpc1.cost > cost_for_tr(1.8));

    // Once engaged the MPC is slower than the cruise smoother
    w.exec(&ScenarioCmd::Engage);
    let (plan, report) = cycle(&mut p, &mut w);
    assert!(report.source_changed);
    assert_eq!(plan.longitudinal_plan_source, PlanSource::Mpc1);
    assert!(plan.has_lead);
    assert!(plan.v_target < 20.0);
    assert!(plan.v_cruise > plan.v_target);
}

#[test]
fn follows_slower_lead() {
    let mut p = planner();
    let mut w = seeded(
        &mut p,
        20.0,
        &[
            ScenarioCmd::SetCruise { v_cruise_kph: 90.0 },
            ScenarioCmd::SpawnLead {
                d_rel_m: 30.0,
                v_lead_ms: 18.0,
                a_lead_mss: 0.0,
            },
        ],
    );
    w.exec(&ScenarioCmd::Engage);

    let mut min_gap = f64::INFINITY;
    let mut last = None;
    for _ in 0..cycles_in(60.0) {
        let (plan, report) = cycle(&mut p, &mut w);

        assert!(!plan.fcw);
        assert!(report.mpc1.reset.is_none());

        if let Some(l) = w.lead {
            min_gap = min_gap.min(l.d_rel);
        }
        last = Some((plan, report));
    }

    let (plan, report) = last.unwrap();
    assert_eq!(w.num_collisions, 0);
    assert!(min_gap > 20.0);
    assert!((w.ego.v_ego - 18.0).abs() < 0.2);
    assert_eq!(plan.longitudinal_plan_source, PlanSource::Mpc1);

    // Settled behind the lead the time-gap is back on the speed curve
    assert!((report.mpc1.tr_s - dynamic_follow(w.ego.v_ego, None, false, 1.0)).abs() < 0.05);
}

#[test]
fn disengage_and_reengage_reseeds_from_ego() {
    let mut p = planner();
    let mut w = seeded(
        &mut p,
        20.0,
        &[
            ScenarioCmd::SetCruise { v_cruise_kph: 90.0 },
            ScenarioCmd::SpawnLead {
                d_rel_m: 30.0,
                v_lead_ms: 18.0,
                a_lead_mss: 0.0,
            },
        ],
    );
    w.exec(&ScenarioCmd::Engage);
    for _ in 0..cycles_in(5.0) {
        cycle(&mut p, &mut w);
    }
    assert_eq!(p.source(), PlanSource::Mpc1);

    // Coast for a while, the ego holds its speed
    w.exec(&ScenarioCmd::Disengage);
    for _ in 0..cycles_in(1.0) {
        let v_ego = w.ego.v_ego;
        let (plan, report) = cycle(&mut p, &mut w);

        assert!(!report.enabled);
        assert_eq!(plan.v_target, v_ego);
        assert_eq!(plan.longitudinal_plan_source, PlanSource::Mpc1);
    }

    // The ego was coasting so the seed carries no acceleration
    let v_ego = w.ego.v_ego;
    w.exec(&ScenarioCmd::Engage);
    let (plan, report) = cycle(&mut p, &mut w);
    assert!(report.enabled);
    assert_eq!(plan.v_start, v_ego);
    assert_eq!(plan.a_start, 0.0);
}

#[test]
fn slows_for_sharp_curve() {
    let mut p = planner();
    let v_curv = ((3.0 - 13.0 / 2500.0 * 15.0) * 15.0_f64).sqrt();

    let mut w = World::new(20.0);
    w.exec(&ScenarioCmd::SetCruise { v_cruise_kph: 90.0 });
    w.exec(&ScenarioCmd::SetCurvature {
        curvature: 1.0 / 15.0,
        dist_to_turn_m: 100.0,
    });

    let (plan, report) = cycle(&mut p, &mut w);
    assert!((plan.v_curvature - v_curv).abs() < 1e-9);
    assert!((curvature_speed(1.0 / 15.0) - v_curv).abs() < 1e-9);
    assert!(plan.decel_for_turn);
    assert!(plan.map_valid);
    assert!((report.targets.v_cruise_setpoint - v_curv).abs() < 1e-9);

    w.exec(&ScenarioCmd::Engage);
    let mut v_prev = w.ego.v_ego;
    for _ in 0..cycles_in(60.0) {
        let (plan, _) = cycle(&mut p, &mut w);
        assert_eq!(plan.longitudinal_plan_source, PlanSource::Cruise);
        assert!(w.ego.v_ego <= v_prev + 1e-6);
        v_prev = w.ego.v_ego;
    }

    assert!((w.ego.v_ego - v_curv).abs() < 0.1);
}

#[test]
fn slows_for_speed_limit_ahead() {
    let mut p = planner();
    let mut w = seeded(
        &mut p,
        25.0,
        &[
            ScenarioCmd::SetCruise { v_cruise_kph: 108.0 },
            ScenarioCmd::SetSpeedLimit { speed_limit_ms: 25.0 },
            ScenarioCmd::SetSpeedLimitAhead {
                speed_limit_ms: 15.0,
                distance_m: 200.0,
            },
        ],
    );
    w.exec(&ScenarioCmd::Engage);

    // Limits pinned to the constant deceleration meeting the limit in time
    let (plan, report) = cycle(&mut p, &mut w);
    let limits = report.accel_limits.unwrap();
    assert_eq!(limits.min, limits.max);
    assert!(limits.min < -1.0 && limits.min > -1.1);
    assert!(plan.decel_for_turn);

    let mut v_max: f64 = 0.0;
    for _ in 0..cycles_in(60.0) {
        cycle(&mut p, &mut w);
        v_max = v_max.max(w.ego.v_ego);
    }

    // The ahead limit has become the current one
    let map = w.map.unwrap();
    assert!(!map.speed_limit_ahead_valid);
    assert_eq!(map.speed_limit, 15.0);

    assert!(v_max <= 25.0);
    assert!((w.ego.v_ego - 15.0).abs() < 0.5);
}

#[test]
fn braking_driver_disengages() {
    let mut p = planner();
    let mut w = seeded(&mut p, 20.0, &[ScenarioCmd::SetCruise { v_cruise_kph: 90.0 }]);
    w.exec(&ScenarioCmd::Engage);
    let (_, report) = cycle(&mut p, &mut w);
    assert!(report.enabled);

    w.exec(&ScenarioCmd::Brake { pressed: true });
    let (plan, report) = cycle(&mut p, &mut w);
    assert!(!report.enabled);
    assert!(!plan.fcw);
    assert!(w.ego.v_ego < 20.0);
}

#[test]
fn follow_lead_script_replays_without_collision() {
    let mut si = ScriptInterpreter::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../scenarios/follow_lead.txt"
    ))
    .unwrap();
    assert_eq!(si.get_num_cmds(), 7);
    assert_eq!(si.get_duration(), 120.0);

    let mut p = planner();
    let mut w = World::default();
    let mut mpc1_cycles = 0;

    loop {
        match si.get_pending_cmds(w.sim_time_s) {
            PendingCmds::None => (),
            PendingCmds::Some(cmds) => {
                for c in cmds.iter() {
                    w.exec(c);
                }
            }
            PendingCmds::EndOfScript => break,
        }

        let (plan, _) = cycle(&mut p, &mut w);
        if plan.longitudinal_plan_source == PlanSource::Mpc1 {
            mpc1_cycles += 1;
        }
    }

    assert_eq!(w.num_collisions, 0);
    assert!(mpc1_cycles > 0);
    assert!(w.sim_time_s >= 120.0);
}

#[test]
fn shipped_params_are_valid() {
    let params: Params = util::params::load_from_path(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/../params/long_plan.toml"
    ))
    .unwrap();

    assert!(params.validate().is_ok());
    assert!(params.mpc.verbose);
    assert_eq!(params.mpc.following_distance_s, None);
}
