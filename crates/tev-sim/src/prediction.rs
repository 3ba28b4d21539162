//! Single-step state predictor.
//!
//! Interfaces with prediction-correction schemes that advance the model
//! one step at a time from an externally maintained state estimate. The
//! governing system here is the pure ODE: current is known, so no
//! algebraic voltage state is carried.

use nalgebra::DVector;

use tev_model::{
    CellParams, Formulation, Load, StateLayout, calculated_voltage, rhs_ode,
};
use tev_solver::{DaeSolver, DaeSystem, SolverError, SolverOptions, SolverResult};

use crate::error::{SimError, SimResult};

/// Named snapshot of the differential states.
///
/// `voltage_v` is derived, populated only on predictor output; states
/// constructed by the caller carry `None`.
#[derive(Clone, Debug)]
pub struct TransientState {
    /// State of charge [-]
    pub soc: f64,
    /// Cell temperature [K]
    pub t_cell_k: f64,
    /// Hysteresis voltage [V]
    pub hyst_v: f64,
    /// RC overpotentials [V], one per branch
    pub eta_j: Vec<f64>,
    voltage_v: Option<f64>,
}

impl TransientState {
    pub fn new(soc: f64, t_cell_k: f64, hyst_v: f64, eta_j: Vec<f64>) -> Self {
        Self {
            soc,
            t_cell_k,
            hyst_v,
            eta_j,
            voltage_v: None,
        }
    }

    pub fn num_rc_pairs(&self) -> usize {
        self.eta_j.len()
    }

    /// Terminal voltage [V] predicted alongside the state, if any.
    pub fn voltage_v(&self) -> Option<f64> {
        self.voltage_v
    }
}

/// One-step-at-a-time model wrapper.
pub struct Prediction {
    params: CellParams,
    layout: StateLayout,
}

impl Prediction {
    pub fn new(params: CellParams) -> SimResult<Self> {
        params.validate()?;
        let layout = StateLayout::new(Formulation::Prediction, params.num_rc_pairs);
        Ok(Self { params, layout })
    }

    pub fn params(&self) -> &CellParams {
        &self.params
    }

    /// Advance `delta_t` seconds from `state` under the demanded current
    /// and return the predicted state with its terminal voltage.
    pub fn take_step(
        &self,
        state: &TransientState,
        current: &Load,
        delta_t: f64,
    ) -> SimResult<TransientState> {
        if state.num_rc_pairs() != self.layout.num_rc_pairs() {
            return Err(SimError::Config {
                what: format!(
                    "state has {} RC overpotentials but the model declares {}",
                    state.num_rc_pairs(),
                    self.layout.num_rc_pairs()
                ),
            });
        }
        if !(delta_t > 0.0 && delta_t.is_finite()) {
            return Err(SimError::Config {
                what: format!("delta_t must be positive, got {delta_t}"),
            });
        }

        let sv0 = self.to_vector(state);
        let svdot0 = DVector::zeros(self.layout.size());

        let system = PredictionSystem {
            params: self.params.clone(),
            layout: self.layout,
            current: current.clone(),
        };
        let mut solver = DaeSolver::new(system, SolverOptions::default())?;

        let init = solver.init_step(0.0, &sv0, &svdot0)?;
        if !init.success {
            return Err(SimError::Solver(SolverError::ConvergenceFailed {
                what: init.message,
            }));
        }
        let outcome = solver.step(delta_t)?;
        if !outcome.success {
            return Err(SimError::Solver(SolverError::ConvergenceFailed {
                what: outcome.message,
            }));
        }

        let t_end = outcome.t[0];
        let sv = &outcome.y[0];
        let mut predicted = self.to_state(sv);
        predicted.voltage_v = Some(calculated_voltage(
            &self.params,
            self.layout,
            sv,
            current.value(t_end),
        )?);
        Ok(predicted)
    }

    fn to_vector(&self, state: &TransientState) -> DVector<f64> {
        let mut sv = DVector::zeros(self.layout.size());
        sv[StateLayout::SOC] = state.soc;
        sv[StateLayout::T_CELL] = state.t_cell_k / self.params.t_ref_k;
        sv[StateLayout::HYST] = state.hyst_v;
        for (j, &eta) in state.eta_j.iter().enumerate() {
            sv[self.layout.eta(j)] = eta;
        }
        sv
    }

    fn to_state(&self, sv: &DVector<f64>) -> TransientState {
        TransientState::new(
            sv[StateLayout::SOC],
            sv[StateLayout::T_CELL] * self.params.t_ref_k,
            sv[StateLayout::HYST],
            (0..self.layout.num_rc_pairs())
                .map(|j| sv[self.layout.eta(j)])
                .collect(),
        )
    }
}

/// The ODE formulation with a demanded current profile.
struct PredictionSystem {
    params: CellParams,
    layout: StateLayout,
    current: Load,
}

impl DaeSystem for PredictionSystem {
    fn residual(
        &self,
        t: f64,
        y: &DVector<f64>,
        yp: &DVector<f64>,
        res: &mut DVector<f64>,
    ) -> SolverResult<()> {
        let rhs = rhs_ode(&self.params, self.layout, y, self.current.value(t)).map_err(|e| {
            SolverError::Numeric {
                what: e.to_string(),
            }
        })?;
        for i in 0..y.len() {
            res[i] = yp[i] - rhs[i];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use tev_model::RcBranch;

    fn two_branch_cell() -> CellParams {
        CellParams {
            num_rc_pairs: 2,
            branches: vec![
                RcBranch::new(|_, _| 0.01, |_, _| 1e3),
                RcBranch::new(|_, _| 0.02, |_, _| 5e2),
            ],
            ..CellParams::default()
        }
    }

    #[test]
    fn named_state_and_vector_round_trip() {
        let model = Prediction::new(two_branch_cell()).unwrap();
        let state = TransientState::new(0.37, 305.5, -0.012, vec![0.003, -0.001]);

        let back = model.to_state(&model.to_vector(&state));

        // soc, hysteresis, and overpotentials pass through untouched
        assert_eq!(back.soc, state.soc);
        assert_eq!(back.hyst_v, state.hyst_v);
        assert_eq!(back.eta_j, state.eta_j);
        // temperature goes through a normalize/de-normalize pair
        assert_relative_eq!(back.t_cell_k, state.t_cell_k, max_relative = 1e-15);
    }

    proptest! {
        #[test]
        fn round_trip_holds_across_the_operating_range(
            soc in 0.0f64..1.0,
            t_cell_k in 250.0f64..330.0,
            hyst_v in -0.1f64..0.1,
            eta in prop::collection::vec(-0.5f64..0.5, 2),
        ) {
            let model = Prediction::new(two_branch_cell()).unwrap();
            let state = TransientState::new(soc, t_cell_k, hyst_v, eta);

            let back = model.to_state(&model.to_vector(&state));

            prop_assert_eq!(back.soc, state.soc);
            prop_assert_eq!(back.hyst_v, state.hyst_v);
            prop_assert_eq!(&back.eta_j, &state.eta_j);
            prop_assert!((back.t_cell_k - state.t_cell_k).abs() <= 1e-12 * state.t_cell_k);
        }
    }

    #[test]
    fn rest_preserves_the_state() {
        let model = Prediction::new(CellParams::default()).unwrap();
        let state = TransientState::new(0.5, 300.0, 0.0, vec![]);

        let next = model
            .take_step(&state, &Load::Constant(0.0), 10.0)
            .unwrap();

        assert_relative_eq!(next.soc, 0.5, max_relative = 1e-9);
        assert_relative_eq!(next.t_cell_k, 300.0, max_relative = 1e-9);
        // no current, no branches: the terminal rests at open circuit
        assert_relative_eq!(next.voltage_v().unwrap(), 3.7, max_relative = 1e-9);
        assert!(state.voltage_v().is_none());
    }

    #[test]
    fn discharge_current_drops_soc_and_voltage() {
        let model = Prediction::new(CellParams::default()).unwrap();
        let state = TransientState::new(1.0, 300.0, 0.0, vec![]);

        let next = model
            .take_step(&state, &Load::Constant(7.5), 3600.0)
            .unwrap();

        // 0.1C for an hour
        assert_relative_eq!(next.soc, 0.9, max_relative = 1e-3);
        assert_relative_eq!(
            next.voltage_v().unwrap(),
            3.7 - 7.5 * 0.05,
            max_relative = 1e-6
        );
    }

    #[test]
    fn branch_count_mismatch_is_rejected() {
        let params = CellParams {
            num_rc_pairs: 1,
            branches: vec![RcBranch::new(|_, _| 0.01, |_, _| 1e3)],
            ..CellParams::default()
        };
        let model = Prediction::new(params).unwrap();
        let state = TransientState::new(0.5, 300.0, 0.0, vec![]);
        assert!(model
            .take_step(&state, &Load::Constant(1.0), 1.0)
            .is_err());
    }

    #[test]
    fn non_positive_delta_t_is_rejected() {
        let model = Prediction::new(CellParams::default()).unwrap();
        let state = TransientState::new(0.5, 300.0, 0.0, vec![]);
        assert!(model.take_step(&state, &Load::Constant(1.0), 0.0).is_err());
        assert!(model.take_step(&state, &Load::Constant(1.0), -1.0).is_err());
    }
}
