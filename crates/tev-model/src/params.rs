//! Cell parameter set for the equivalent-circuit model.
//!
//! Property functions are stored as shared closures so a parameter set can
//! be deep-snapshotted into solution objects with a cheap clone. The
//! reference temperature used to normalize the stored thermal state is
//! captured at construction time and equals the ambient temperature.

use std::sync::Arc;

use tev_core::ensure_finite;
use tracing::warn;

use crate::error::{ModelError, ModelResult};

/// Property of state of charge alone, e.g. OCV [V].
pub type SocFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// Property of state of charge and cell temperature [K], e.g. R0 [Ohm].
pub type SocTempFn = Arc<dyn Fn(f64, f64) -> f64 + Send + Sync>;

/// One parallel resistor/capacitor branch of the circuit.
#[derive(Clone)]
pub struct RcBranch {
    /// Branch resistance [Ohm] as a function of (soc, T [K])
    pub resistance: SocTempFn,
    /// Branch capacitance [F] as a function of (soc, T [K])
    pub capacitance: SocTempFn,
}

impl RcBranch {
    pub fn new(
        resistance: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
        capacitance: impl Fn(f64, f64) -> f64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            resistance: Arc::new(resistance),
            capacitance: Arc::new(capacitance),
        }
    }
}

/// Full parameter set for one cell.
///
/// `branches` may hold more entries than `num_rc_pairs`; the extras are
/// ignored with a warning at validation time. Fewer entries than declared
/// is a configuration error.
#[derive(Clone)]
pub struct CellParams {
    /// Declared number of active RC branches
    pub num_rc_pairs: usize,
    /// Initial state of charge [-], in [0, 1]
    pub soc0: f64,
    /// Cell capacity [Ah]
    pub capacity_ah: f64,
    /// Coulombic efficiency [-], in (0, 1]; applied while charging
    pub coulombic_eff: f64,
    /// Hysteresis approach rate [-]; 0 disables hysteresis
    pub gamma: f64,
    /// Cell mass [kg]
    pub mass_kg: f64,
    /// Hold cell temperature at ambient when true
    pub isothermal: bool,
    /// Specific heat capacity [J/(kg K)]
    pub cp_j_per_kg_k: f64,
    /// Ambient temperature [K]
    pub t_inf_k: f64,
    /// Convective coefficient [W/(m2 K)]
    pub h_therm_w_per_m2_k: f64,
    /// Heat-exchange area [m2]
    pub a_therm_m2: f64,
    /// Open-circuit voltage [V] vs soc
    pub ocv: SocFn,
    /// Maximum hysteresis magnitude [V] vs soc
    pub m_hyst: SocFn,
    /// Series resistance [Ohm] vs (soc, T [K])
    pub r0: SocTempFn,
    /// RC branches, in index order
    pub branches: Vec<RcBranch>,
    /// Temperature normalizing the stored thermal state [K]; pinned to
    /// the ambient temperature at construction
    pub t_ref_k: f64,
}

impl std::fmt::Debug for CellParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellParams")
            .field("num_rc_pairs", &self.num_rc_pairs)
            .field("soc0", &self.soc0)
            .field("capacity_ah", &self.capacity_ah)
            .field("coulombic_eff", &self.coulombic_eff)
            .field("gamma", &self.gamma)
            .field("mass_kg", &self.mass_kg)
            .field("isothermal", &self.isothermal)
            .field("cp_j_per_kg_k", &self.cp_j_per_kg_k)
            .field("t_inf_k", &self.t_inf_k)
            .field("h_therm_w_per_m2_k", &self.h_therm_w_per_m2_k)
            .field("a_therm_m2", &self.a_therm_m2)
            .field("t_ref_k", &self.t_ref_k)
            .finish_non_exhaustive()
    }
}

impl CellParams {
    /// Build a parameter set; the normalization temperature is pinned to
    /// the ambient temperature supplied here.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_rc_pairs: usize,
        soc0: f64,
        capacity_ah: f64,
        coulombic_eff: f64,
        gamma: f64,
        mass_kg: f64,
        isothermal: bool,
        cp_j_per_kg_k: f64,
        t_inf_k: f64,
        h_therm_w_per_m2_k: f64,
        a_therm_m2: f64,
        ocv: SocFn,
        m_hyst: SocFn,
        r0: SocTempFn,
        branches: Vec<RcBranch>,
    ) -> Self {
        Self {
            num_rc_pairs,
            soc0,
            capacity_ah,
            coulombic_eff,
            gamma,
            mass_kg,
            isothermal,
            cp_j_per_kg_k,
            t_inf_k,
            h_therm_w_per_m2_k,
            a_therm_m2,
            ocv,
            m_hyst,
            r0,
            branches,
            t_ref_k: t_inf_k,
        }
    }

    /// Validate scalars and the branch list against the declared count.
    pub fn validate(&self) -> ModelResult<()> {
        let bad = |what: String| Err(ModelError::Config { what });

        if !(self.capacity_ah > 0.0 && self.capacity_ah.is_finite()) {
            return bad(format!("capacity_ah must be positive, got {}", self.capacity_ah));
        }
        if !(0.0..=1.0).contains(&self.soc0) {
            return bad(format!("soc0 must be in [0, 1], got {}", self.soc0));
        }
        if !(self.coulombic_eff > 0.0 && self.coulombic_eff <= 1.0) {
            return bad(format!(
                "coulombic_eff must be in (0, 1], got {}",
                self.coulombic_eff
            ));
        }
        if !(self.gamma >= 0.0 && self.gamma.is_finite()) {
            return bad(format!("gamma must be non-negative, got {}", self.gamma));
        }
        if !(self.t_inf_k > 0.0 && self.t_ref_k > 0.0) {
            return bad(format!(
                "temperatures must be positive, got t_inf_k = {}, t_ref_k = {}",
                self.t_inf_k, self.t_ref_k
            ));
        }
        if !self.isothermal {
            if !(self.mass_kg > 0.0 && self.cp_j_per_kg_k > 0.0) {
                return bad(format!(
                    "mass_kg and cp_j_per_kg_k must be positive, got {} and {}",
                    self.mass_kg, self.cp_j_per_kg_k
                ));
            }
            if self.h_therm_w_per_m2_k < 0.0 || self.a_therm_m2 < 0.0 {
                return bad(format!(
                    "h_therm_w_per_m2_k and a_therm_m2 must be non-negative, got {} and {}",
                    self.h_therm_w_per_m2_k, self.a_therm_m2
                ));
            }
        }

        if self.branches.len() < self.num_rc_pairs {
            return bad(format!(
                "{} RC pairs declared but only {} branches provided",
                self.num_rc_pairs,
                self.branches.len()
            ));
        }
        if self.branches.len() > self.num_rc_pairs {
            warn!(
                declared = self.num_rc_pairs,
                provided = self.branches.len(),
                "extra RC branches beyond the declared count are ignored"
            );
        }

        // probe the property closures at the initial operating point
        ensure_finite((self.ocv)(self.soc0), "ocv(soc0)")?;
        ensure_finite((self.m_hyst)(self.soc0), "m_hyst(soc0)")?;
        ensure_finite((self.r0)(self.soc0, self.t_inf_k), "r0(soc0, t_inf)")?;
        for branch in self.active_branches() {
            ensure_finite(
                (branch.resistance)(self.soc0, self.t_inf_k),
                "branch resistance(soc0, t_inf)",
            )?;
            ensure_finite(
                (branch.capacitance)(self.soc0, self.t_inf_k),
                "branch capacitance(soc0, t_inf)",
            )?;
        }

        Ok(())
    }

    /// Branches that participate in the state vector.
    pub fn active_branches(&self) -> &[RcBranch] {
        &self.branches[..self.num_rc_pairs]
    }
}

impl Default for CellParams {
    /// A featureless reference cell: flat 3.7 V OCV, constant 50 mOhm
    /// series resistance, no RC branches, no hysteresis, isothermal.
    fn default() -> Self {
        Self::new(
            0,
            1.0,
            75.0,
            1.0,
            0.0,
            1.9,
            true,
            745.0,
            300.0,
            12.0,
            1.0,
            Arc::new(|_soc| 3.7),
            Arc::new(|_soc| 0.0),
            Arc::new(|_soc, _t| 0.05),
            Vec::new(),
        )
    }
}
