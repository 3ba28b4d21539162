//! End-to-end runs through the experiment/simulation/solution stack.

use std::sync::Arc;

use approx::assert_relative_eq;
use tev_sim::{
    CellParams, ControlMode, Experiment, Limit, LimitQuantity, Load, RcBranch, Simulation,
    TimeSpan,
};
use tev_solver::SolverStatus;

/// Flat-OCV resistive cell: easy to reason about in closed form.
fn resistive_cell() -> CellParams {
    CellParams::default()
}

fn constant_current_step(exp: &mut Experiment, amps: f64, t_max: f64) {
    exp.add_step(
        ControlMode::CurrentA,
        Load::Constant(amps),
        TimeSpan::Linspace { t_max, n: 11 },
        vec![],
    )
    .unwrap();
}

#[test]
fn discharge_and_charge_voltages_mirror_ohms_law() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();

    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 10.0, 10.0);
    constant_current_step(&mut exp, -10.0, 10.0);

    let cycle = sim.run(&exp).unwrap();
    assert!(cycle.success.iter().all(|&ok| ok));

    // positive current discharges: V = OCV - I*R0
    let voltage = &cycle.vars["voltage_V"];
    let n = voltage.len();
    assert_relative_eq!(voltage[n / 2 - 1], 3.7 - 10.0 * 0.05, max_relative = 1e-3);
    assert_relative_eq!(voltage[n - 1], 3.7 + 10.0 * 0.05, max_relative = 1e-3);

    let current = &cycle.vars["current_A"];
    assert_relative_eq!(current[1], 10.0, max_relative = 1e-6);
    assert_relative_eq!(current[n - 1], -10.0, max_relative = 1e-6);
}

#[test]
fn stitched_time_is_strictly_increasing_across_steps() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();

    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 5.0, 10.0);
    constant_current_step(&mut exp, 0.0, 10.0);
    constant_current_step(&mut exp, -5.0, 10.0);

    let cycle = sim.run(&exp).unwrap();

    assert!(cycle.t.windows(2).all(|w| w[1] > w[0]));
    // each boundary carries the default 1e-3 s shift
    assert_relative_eq!(cycle.t[10], 10.0);
    assert_relative_eq!(cycle.t[11], 10.001);
    assert_relative_eq!(*cycle.t.last().unwrap(), 30.002, max_relative = 1e-9);
}

#[test]
fn voltage_limit_stops_a_polynomial_ocv_discharge() {
    // 0-branch cell with a degree-7 polynomial OCV discharged at 0.2C
    // until the terminal hits 3.0 V.
    let params = CellParams {
        h_therm_w_per_m2_k: 0.0,
        ocv: Arc::new(|soc: f64| 2.6 + 1.5 * soc + 0.1 * soc.powi(7)),
        r0: Arc::new(|_, _| 0.01),
        ..CellParams::default()
    };

    let mut sim = Simulation::new(params).unwrap();
    let mut exp = Experiment::new();
    exp.add_step(
        ControlMode::CurrentA,
        Load::Constant(15.0),
        TimeSpan::Linspace {
            t_max: 14_400.0,
            n: 145,
        },
        vec![Limit::new(LimitQuantity::VoltageV, 3.0).unwrap()],
    )
    .unwrap();

    let soln = sim.run_step(&exp, 0).unwrap();

    assert!(soln.success);
    assert_eq!(soln.status, SolverStatus::EventDetected);
    let event = soln.event.as_ref().unwrap();
    assert_eq!(event.index, 0);
    assert!(event.t < 14_400.0);

    let voltage_at_stop = *soln.vars["voltage_V"].last().unwrap();
    assert_relative_eq!(voltage_at_stop, 3.0, epsilon = 1e-2);
    // the crossing lands near the closed-form soc for V = 3.0
    assert_relative_eq!(*soln.vars["soc"].last().unwrap(), 0.3666, epsilon = 5e-3);
}

#[test]
fn time_limits_watch_the_total_experiment_clock() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();

    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 0.0, 100.0);
    exp.add_step(
        ControlMode::CurrentA,
        Load::Constant(0.0),
        TimeSpan::Linspace {
            t_max: 100.0,
            n: 11,
        },
        vec![Limit::new(LimitQuantity::TimeS, 150.0).unwrap()],
    )
    .unwrap();

    let first = sim.run_step(&exp, 0).unwrap();
    assert!(first.success);

    // the limit is total time, so the second step stops 50 s in
    let second = sim.run_step(&exp, 1).unwrap();
    assert_eq!(second.status, SolverStatus::EventDetected);
    assert_relative_eq!(second.event.as_ref().unwrap().t, 50.0, epsilon = 1e-6);
}

#[test]
fn coulombic_efficiency_shows_up_as_charge_asymmetry() {
    let params = CellParams {
        soc0: 0.6,
        coulombic_eff: 0.8,
        ..CellParams::default()
    };
    let mut sim = Simulation::new(params).unwrap();

    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 7.5, 3600.0); // 0.1C discharge, one hour
    constant_current_step(&mut exp, -7.5, 3600.0); // mirrored charge

    let discharge = sim.run_step(&exp, 0).unwrap();
    let soc_mid = *discharge.vars["soc"].last().unwrap();
    assert_relative_eq!(soc_mid, 0.5, epsilon = 1e-3);

    let charge = sim.run_step(&exp, 1).unwrap();
    let soc_end = *charge.vars["soc"].last().unwrap();

    let restored = (soc_end - soc_mid) / (0.6 - soc_mid);
    assert_relative_eq!(restored, 0.8, epsilon = 0.05);
}

#[test]
fn isothermal_flag_pins_the_temperature() {
    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 50.0, 100.0);

    let mut pinned = Simulation::new(CellParams {
        isothermal: true,
        ..resistive_cell()
    })
    .unwrap();
    let cycle = pinned.run(&exp).unwrap();
    for &t_k in &cycle.vars["temperature_K"] {
        assert_relative_eq!(t_k, 300.0, max_relative = 1e-12);
    }

    // adiabatic cell under the same load heats up
    let mut heating = Simulation::new(CellParams {
        isothermal: false,
        h_therm_w_per_m2_k: 0.0,
        ..resistive_cell()
    })
    .unwrap();
    let cycle = heating.run(&exp).unwrap();
    let temps = &cycle.vars["temperature_K"];
    assert!(*temps.last().unwrap() > 300.0 + 1.0);
}

#[test]
fn runs_are_deterministic_after_reset() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();

    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 20.0, 60.0);
    constant_current_step(&mut exp, -20.0, 60.0);

    let first = sim.run(&exp).unwrap();
    let second = sim.run(&exp).unwrap();

    assert_eq!(first.t, second.t);
    assert_eq!(first.vars["soc"], second.vars["soc"]);
    assert_eq!(first.vars["voltage_V"], second.vars["voltage_V"]);
}

#[test]
fn cycles_slice_and_append() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();

    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 10.0, 10.0);
    constant_current_step(&mut exp, -10.0, 10.0);

    let mut cycle = sim.run(&exp).unwrap();
    assert_eq!(cycle.num_steps(), 2);

    let step = cycle.get_step(1).unwrap();
    assert_eq!(step.t[0], 0.0); // step-relative axis
    assert!(cycle.get_step(2).is_err());

    let sub = cycle.get_steps(0, 1).unwrap();
    assert_eq!(sub.num_steps(), 2);
    assert_eq!(sub.t[0], 0.0);

    // appending a copy of the cycle models a second identical cycle
    let len_before = cycle.t.len();
    let copy = cycle.clone();
    cycle.append(copy, 1e-3).unwrap();
    assert_eq!(cycle.t.len(), 2 * len_before);
    assert_eq!(cycle.num_steps(), 4);
    assert!(cycle.t.windows(2).all(|w| w[1] > w[0]));
}

#[test]
fn appending_a_different_circuit_is_rejected() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();
    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 10.0, 10.0);
    let mut cycle = sim.run(&exp).unwrap();

    let params = CellParams {
        num_rc_pairs: 1,
        branches: vec![RcBranch::new(|_, _| 0.01, |_, _| 1e3)],
        ..CellParams::default()
    };
    let mut other_sim = Simulation::new(params).unwrap();
    let other = other_sim.run(&exp).unwrap();

    assert!(cycle.append(other, 1e-3).is_err());
}

#[test]
fn remaining_capacity_tracks_soc() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();
    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 10.0, 10.0);

    let cycle = sim.run(&exp).unwrap();
    let capacity = cycle
        .vars
        .get("capacity_Ah")
        .expect("capacity_Ah series is published");
    let soc = &cycle.vars["soc"];
    let nominal = sim.params().capacity_ah;

    assert_eq!(capacity.len(), cycle.t.len());
    for (cap, s) in capacity.iter().zip(soc) {
        assert_relative_eq!(*cap, s * nominal, max_relative = 1e-12);
    }
}

#[test]
fn vars_serialize_to_json() {
    let mut sim = Simulation::new(resistive_cell()).unwrap();
    let mut exp = Experiment::new();
    constant_current_step(&mut exp, 10.0, 10.0);

    let cycle = sim.run(&exp).unwrap();
    let json = serde_json::to_value(&cycle.vars).unwrap();

    for key in ["time_s", "soc", "voltage_V", "current_A", "power_W"] {
        assert!(json.get(key).is_some(), "missing {key}");
    }
    assert_eq!(json["time_s"].as_array().unwrap().len(), cycle.t.len());
}
