//! Governing equations shared by the simulation and prediction layouts.
//!
//! The right-hand side `f(t, y)` of `M*yp = f(t, y)`:
//! - soc: `-ce*I / (3600*capacity)`, ce = 1 on discharge, coulombic
//!   efficiency on charge
//! - normalized temperature: `(Q_gen + Q_conv) / (m*Cp*T_ref)`, zeroed
//!   when isothermal
//! - hysteresis: `|ce*I*gamma/(3600*capacity)| * (-sign(I)*M_hyst(soc) - h)`
//! - RC overpotentials: `-eta_j/(Rj*Cj) + I/Cj`
//! - terminal voltage (simulation only, algebraic): controlled quantity
//!   minus its demanded value
//!
//! Positive current discharges the cell.

use nalgebra::DVector;

use crate::error::{ModelError, ModelResult};
use crate::layout::{Formulation, StateLayout};
use crate::load::{ControlMode, Load};
use crate::params::CellParams;

struct Unpacked {
    soc: f64,
    t_cell_k: f64,
    hyst: f64,
    ocv: f64,
    r0: f64,
    eta_sum: f64,
}

fn unpack(params: &CellParams, layout: StateLayout, sv: &DVector<f64>) -> ModelResult<Unpacked> {
    layout.check_size(sv.len())?;
    let soc = sv[StateLayout::SOC];
    let t_cell_k = sv[StateLayout::T_CELL] * params.t_ref_k;
    let eta_sum: f64 = (0..layout.num_rc_pairs()).map(|j| sv[layout.eta(j)]).sum();
    Ok(Unpacked {
        soc,
        t_cell_k,
        hyst: sv[StateLayout::HYST],
        ocv: (params.ocv)(soc),
        r0: (params.r0)(soc, t_cell_k),
        eta_sum,
    })
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Current [A] implied by a simulation state vector.
pub fn calculated_current(
    params: &CellParams,
    layout: StateLayout,
    sv: &DVector<f64>,
) -> ModelResult<f64> {
    let v_cell = layout.v_cell().ok_or_else(|| ModelError::Config {
        what: "current is only implied by a state vector with a voltage state".to_string(),
    })?;
    let u = unpack(params, layout, sv)?;
    Ok(-(sv[v_cell] - u.ocv - u.hyst + u.eta_sum) / u.r0)
}

/// Terminal voltage [V] for a prediction state vector at a known current.
pub fn calculated_voltage(
    params: &CellParams,
    layout: StateLayout,
    sv: &DVector<f64>,
    current: f64,
) -> ModelResult<f64> {
    let u = unpack(params, layout, sv)?;
    Ok(u.ocv + u.hyst - u.eta_sum - current * u.r0)
}

fn differential_rates(
    params: &CellParams,
    layout: StateLayout,
    sv: &DVector<f64>,
    u: &Unpacked,
    current: f64,
    voltage: f64,
    rhs: &mut DVector<f64>,
) {
    let q_inv = 1.0 / (3600.0 * params.capacity_ah);
    let ce = if current >= 0.0 {
        1.0
    } else {
        params.coulombic_eff
    };

    rhs[StateLayout::SOC] = -ce * current * q_inv;

    let q_gen = current * (u.ocv + u.hyst - voltage);
    let q_conv = params.h_therm_w_per_m2_k * params.a_therm_m2 * (params.t_inf_k - u.t_cell_k);
    rhs[StateLayout::T_CELL] = if params.isothermal {
        0.0
    } else {
        (q_gen + q_conv) / (params.mass_kg * params.cp_j_per_kg_k * params.t_ref_k)
    };

    let coeff = (ce * current * params.gamma * q_inv).abs();
    rhs[StateLayout::HYST] = coeff * (-sign(current) * (params.m_hyst)(u.soc) - u.hyst);

    for (j, branch) in params.active_branches().iter().enumerate() {
        let rj = (branch.resistance)(u.soc, u.t_cell_k);
        let cj = (branch.capacitance)(u.soc, u.t_cell_k);
        let idx = layout.eta(j);
        rhs[idx] = -sv[idx] / (rj * cj) + current / cj;
    }
}

/// Full right-hand side for the DAE (simulation) layout, including the
/// algebraic voltage row driven by the step's control mode and load.
pub fn rhs_dae(
    params: &CellParams,
    layout: StateLayout,
    t: f64,
    sv: &DVector<f64>,
    mode: ControlMode,
    load: &Load,
) -> ModelResult<DVector<f64>> {
    let v_idx = layout.v_cell().ok_or_else(|| ModelError::Config {
        what: "rhs_dae requires the simulation layout".to_string(),
    })?;
    let u = unpack(params, layout, sv)?;
    let voltage = sv[v_idx];
    let current = -(voltage - u.ocv - u.hyst + u.eta_sum) / u.r0;

    let mut rhs = DVector::zeros(layout.size());
    differential_rates(params, layout, sv, &u, current, voltage, &mut rhs);

    rhs[v_idx] = match mode {
        ControlMode::CurrentA => current - load.value(t),
        ControlMode::CurrentC => current - params.capacity_ah * load.value(t),
        ControlMode::VoltageV => voltage - load.value(t),
        ControlMode::PowerW => current * voltage - load.value(t),
    };

    Ok(rhs)
}

/// Right-hand side for the ODE (prediction) layout at a known current.
pub fn rhs_ode(
    params: &CellParams,
    layout: StateLayout,
    sv: &DVector<f64>,
    current: f64,
) -> ModelResult<DVector<f64>> {
    if layout.formulation() != Formulation::Prediction {
        return Err(ModelError::Config {
            what: "rhs_ode requires the prediction layout".to_string(),
        });
    }
    let u = unpack(params, layout, sv)?;
    let voltage = u.ocv + u.hyst - u.eta_sum - current * u.r0;

    let mut rhs = DVector::zeros(layout.size());
    differential_rates(params, layout, sv, &u, current, voltage, &mut rhs);
    Ok(rhs)
}

/// Instantaneous quantities implied by one simulation state row. These
/// feed both the limit/event system and the named output variables.
#[derive(Clone, Copy, Debug)]
pub struct StepQuantities {
    pub soc: f64,
    pub temperature_k: f64,
    pub hysteresis_v: f64,
    pub current_a: f64,
    pub current_c: f64,
    pub voltage_v: f64,
    pub power_w: f64,
    pub capacity_ah: f64,
    /// Instantaneous series-resistance overpotential, `I*R0` [V]
    pub eta0_v: f64,
}

pub fn quantities(
    params: &CellParams,
    layout: StateLayout,
    sv: &DVector<f64>,
) -> ModelResult<StepQuantities> {
    let v_idx = layout.v_cell().ok_or_else(|| ModelError::Config {
        what: "quantities require the simulation layout".to_string(),
    })?;
    let u = unpack(params, layout, sv)?;
    let voltage = sv[v_idx];
    let current = -(voltage - u.ocv - u.hyst + u.eta_sum) / u.r0;

    Ok(StepQuantities {
        soc: u.soc,
        temperature_k: u.t_cell_k,
        hysteresis_v: u.hyst,
        current_a: current,
        current_c: current / params.capacity_ah,
        voltage_v: voltage,
        power_w: current * voltage,
        capacity_ah: u.soc * params.capacity_ah,
        eta0_v: current * u.r0,
    })
}
