//! State-vector layout for the two model formulations.
//!
//! Both formulations share the leading block
//! `[soc, T_cell/T_ref, hyst, eta_1..eta_N]`. The full simulation appends
//! the terminal voltage as an algebraic state; the single-step predictor
//! does not carry it.

use nalgebra::DVector;

use crate::error::{ModelError, ModelResult};
use crate::params::CellParams;

/// Which governing system the state vector belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Formulation {
    /// DAE with the terminal voltage as an algebraic state
    Simulation,
    /// ODE driven by a known current, no voltage state
    Prediction,
}

/// Index map and mass structure for one formulation/branch-count pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StateLayout {
    formulation: Formulation,
    num_rc_pairs: usize,
}

impl StateLayout {
    /// State of charge [-]
    pub const SOC: usize = 0;
    /// Cell temperature normalized by the reference temperature [-]
    pub const T_CELL: usize = 1;
    /// Hysteresis voltage [V]
    pub const HYST: usize = 2;

    pub fn new(formulation: Formulation, num_rc_pairs: usize) -> Self {
        Self {
            formulation,
            num_rc_pairs,
        }
    }

    pub fn formulation(&self) -> Formulation {
        self.formulation
    }

    pub fn num_rc_pairs(&self) -> usize {
        self.num_rc_pairs
    }

    /// Index of the j-th RC overpotential, j in 0..num_rc_pairs.
    pub fn eta(&self, j: usize) -> usize {
        debug_assert!(j < self.num_rc_pairs);
        3 + j
    }

    /// Index of the terminal-voltage state, when the formulation has one.
    pub fn v_cell(&self) -> Option<usize> {
        match self.formulation {
            Formulation::Simulation => Some(3 + self.num_rc_pairs),
            Formulation::Prediction => None,
        }
    }

    pub fn size(&self) -> usize {
        match self.formulation {
            Formulation::Simulation => self.num_rc_pairs + 4,
            Formulation::Prediction => self.num_rc_pairs + 3,
        }
    }

    /// Diagonal of the mass matrix; zero marks the algebraic row.
    pub fn mass_diagonal(&self) -> DVector<f64> {
        let mut diag = DVector::from_element(self.size(), 1.0);
        if let Some(idx) = self.v_cell() {
            diag[idx] = 0.0;
        }
        diag
    }

    /// Indices of algebraic (zero-mass) states.
    pub fn algebraic_idx(&self) -> Vec<usize> {
        self.v_cell().into_iter().collect()
    }

    /// State of a cell at rest: initial soc, ambient temperature, no
    /// hysteresis, relaxed branches, open-circuit terminal voltage.
    pub fn rested_state(&self, params: &CellParams) -> DVector<f64> {
        let mut sv = DVector::zeros(self.size());
        sv[Self::SOC] = params.soc0;
        sv[Self::T_CELL] = params.t_inf_k / params.t_ref_k;
        if let Some(idx) = self.v_cell() {
            sv[idx] = (params.ocv)(params.soc0);
        }
        sv
    }

    /// Reject state vectors whose length does not match this layout.
    pub fn check_size(&self, len: usize) -> ModelResult<()> {
        if len == self.size() {
            Ok(())
        } else {
            Err(ModelError::Dimension {
                what: "state vector",
                expected: self.size(),
                got: len,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn simulation_layout_indices() {
        let layout = StateLayout::new(Formulation::Simulation, 2);
        assert_eq!(layout.size(), 6);
        assert_eq!(layout.eta(0), 3);
        assert_eq!(layout.eta(1), 4);
        assert_eq!(layout.v_cell(), Some(5));
        assert_eq!(layout.algebraic_idx(), vec![5]);

        let diag = layout.mass_diagonal();
        assert_eq!(diag[5], 0.0);
        assert_eq!(diag.iter().sum::<f64>(), 5.0);
    }

    #[test]
    fn prediction_layout_has_no_voltage_state() {
        let layout = StateLayout::new(Formulation::Prediction, 2);
        assert_eq!(layout.size(), 5);
        assert_eq!(layout.v_cell(), None);
        assert!(layout.algebraic_idx().is_empty());
        assert!(layout.mass_diagonal().iter().all(|&m| m == 1.0));
    }

    #[test]
    fn rested_state_matches_parameters() {
        let params = CellParams::default();
        let layout = StateLayout::new(Formulation::Simulation, 0);
        let sv = layout.rested_state(&params);
        assert_eq!(sv[StateLayout::SOC], params.soc0);
        assert_eq!(sv[StateLayout::T_CELL], 1.0);
        assert_eq!(sv[StateLayout::HYST], 0.0);
        assert_eq!(sv[layout.v_cell().unwrap()], 3.7);
    }

    #[test]
    fn size_check_rejects_mismatches() {
        let layout = StateLayout::new(Formulation::Simulation, 1);
        assert!(layout.check_size(5).is_ok());
        assert!(layout.check_size(4).is_err());
    }

    proptest! {
        #[test]
        fn sizes_differ_by_the_voltage_state(n in 0usize..12) {
            let sim = StateLayout::new(Formulation::Simulation, n);
            let ode = StateLayout::new(Formulation::Prediction, n);
            prop_assert_eq!(sim.size(), n + 4);
            prop_assert_eq!(ode.size(), n + 3);
            prop_assert_eq!(sim.size(), ode.size() + 1);
            prop_assert_eq!(sim.v_cell().unwrap(), sim.size() - 1);
        }
    }
}
