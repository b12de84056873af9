//! # Longitudinal Planner Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use comms_if::scenario::ScenarioCmd;
use plan_lib::{
    long_mpc::{KinematicSolver, LongMpc, MpcInput, MpcParams},
    long_plan::{speed_smoother, AccelLimits, JerkLimits, LongPlanner, Params},
    world::World,
};

fn planner_benchmark(c: &mut Criterion) {
    // ---- Build a following scenario ----

    let mut world = World::new(20.0);
    for cmd in &[
        ScenarioCmd::SetCruise { v_cruise_kph: 90.0 },
        ScenarioCmd::Engage,
        ScenarioCmd::SpawnLead {
            d_rel_m: 30.0,
            v_lead_ms: 18.0,
            a_lead_mss: 0.0,
        },
        ScenarioCmd::SetCurvature {
            curvature: 0.002,
            dist_to_turn_m: 200.0,
        },
    ] {
        world.exec(cmd);
    }
    let input = world.input_data();

    let mut planner = LongPlanner::new(
        Params::default(),
        KinematicSolver::new(),
        KinematicSolver::new(),
    )
    .unwrap();

    // Bench a full planning cycle
    c.bench_function("LongPlanner::update", |b| {
        b.iter(|| planner.update(black_box(&input)))
    });

    // Bench a single MPC instance
    let mut mpc = LongMpc::new(1, KinematicSolver::new(), MpcParams::default());
    mpc.set_cur_state(20.0, 0.0);
    let lead = input.radar.lead_one;

    c.bench_function("LongMpc::update", |b| {
        b.iter(|| {
            mpc.update(black_box(&MpcInput {
                cycle_time_s: 0.0,
                ego: &input.ego,
                lead: lead.as_ref(),
                phantom: None,
            }))
        })
    });

    // Bench the cruise smoother
    let accel = AccelLimits { min: -1.0, max: 1.2 };
    let jerk = JerkLimits { min: -1.0, max: 1.0 };

    c.bench_function("speed_smoother", |b| {
        b.iter(|| speed_smoother(black_box(20.0), 0.3, 25.0, &accel, &jerk, 0.2))
    });
}

criterion_group!(benches, planner_benchmark);
criterion_main!(benches);
