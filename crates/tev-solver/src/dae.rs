//! Adaptive implicit integration of ODE/DAE systems.
//!
//! Systems are posed in residual form `res = M*yp - f(t, y)`, where a zero
//! row of the diagonal mass matrix marks an algebraic variable. The solver
//! advances with backward-Euler sub-steps between requested output times,
//! solving each implicit step by damped Newton iteration, and localizes
//! event (root) crossings by bisection on the interpolated solution.

use crate::error::{SolverError, SolverResult};
use crate::jacobian::finite_difference_jacobian;
use crate::newton::{NewtonConfig, newton_solve};
use nalgebra::DVector;
use tracing::debug;

/// System posed in residual form for implicit integration.
///
/// `residual` must fill `res` with `M*yp - f(t, y)`. Rows listed in
/// [`SolverOptions::algebraic_idx`] are treated as algebraic constraints
/// (zero mass) during initialization and error control.
pub trait DaeSystem {
    fn residual(
        &self,
        t: f64,
        y: &DVector<f64>,
        yp: &DVector<f64>,
        res: &mut DVector<f64>,
    ) -> SolverResult<()>;

    /// Number of event expressions tracked during integration.
    fn num_events(&self) -> usize {
        0
    }

    /// Fill `out` with event expressions; integration stops when any
    /// expression crosses zero.
    fn events(
        &self,
        _t: f64,
        _y: &DVector<f64>,
        _yp: &DVector<f64>,
        _out: &mut DVector<f64>,
    ) -> SolverResult<()> {
        Ok(())
    }
}

/// How to treat the supplied initial condition.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InitCond {
    /// Solve for consistent yp0 (and algebraic y0 entries) before stepping.
    #[default]
    Yp0,
    /// Trust the supplied y0/yp0 as-is.
    None,
}

/// Solver configuration spanning one integration call.
#[derive(Clone, Debug)]
pub struct SolverOptions {
    /// Relative tolerance for local error control
    pub rtol: f64,
    /// Absolute tolerance for local error control
    pub atol: f64,
    /// Indices of algebraic (zero-mass) state variables
    pub algebraic_idx: Vec<usize>,
    /// Initial-condition consistency mode
    pub initcond: InitCond,
    /// Maximum sub-step size; 0 means unrestricted
    pub max_dt: f64,
    /// Absolute cutoff time; integration never proceeds past it
    pub tstop: Option<f64>,
    /// Safety limit on internal sub-steps per integration call
    pub max_steps: usize,
    /// Newton iteration settings for the implicit solves
    pub newton: NewtonConfig,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-5,
            atol: 1e-6,
            algebraic_idx: Vec::new(),
            initcond: InitCond::default(),
            max_dt: 0.0,
            tstop: None,
            max_steps: 100_000,
            newton: NewtonConfig::default(),
        }
    }
}

/// Why an integration call returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolverStatus {
    /// Reached the end of the requested time span
    Success,
    /// An event expression crossed zero
    EventDetected,
    /// The tstop cutoff was reached before the end of the span
    MaxTimeReached,
    /// Newton iteration failed below the minimum step size
    ConvergenceFailed,
}

/// Record of the event crossing that stopped integration.
#[derive(Clone, Debug)]
pub struct EventRecord {
    /// Index of the event expression that fired (declaration order)
    pub index: usize,
    /// Crossing time
    pub t: f64,
    /// State at the crossing
    pub y: DVector<f64>,
    /// State derivative at the crossing
    pub yp: DVector<f64>,
}

/// Raw result of one integration call.
#[derive(Clone, Debug)]
pub struct SolverOutcome {
    pub success: bool,
    pub status: SolverStatus,
    pub message: String,
    /// Recorded times (output grid points plus any early-stop point)
    pub t: Vec<f64>,
    /// State at each recorded time
    pub y: Vec<DVector<f64>>,
    /// State derivative at each recorded time
    pub yp: Vec<DVector<f64>>,
    /// The crossing that stopped integration, if any
    pub event: Option<EventRecord>,
}

impl SolverOutcome {
    fn empty(status: SolverStatus, message: String) -> Self {
        Self {
            success: matches!(
                status,
                SolverStatus::Success | SolverStatus::EventDetected | SolverStatus::MaxTimeReached
            ),
            status,
            message,
            t: Vec::new(),
            y: Vec::new(),
            yp: Vec::new(),
            event: None,
        }
    }

    fn record(&mut self, t: f64, y: &DVector<f64>, yp: &DVector<f64>) {
        self.t.push(t);
        self.y.push(y.clone());
        self.yp.push(yp.clone());
    }
}

/// Internal stepping state carried between sub-steps.
struct Working {
    t: f64,
    y: DVector<f64>,
    yp: DVector<f64>,
    h: f64,
    g: Option<DVector<f64>>,
    steps_taken: usize,
}

enum Advance {
    Reached,
    Event(EventRecord),
    Failed(String),
}

/// Implicit ODE/DAE solver.
///
/// Construct once per integration call with the system and options, then
/// either `solve` over a full output grid or drive it one step at a time
/// with `init_step`/`step`.
pub struct DaeSolver<S: DaeSystem> {
    system: S,
    options: SolverOptions,
    current: Option<Working>,
}

impl<S: DaeSystem> DaeSolver<S> {
    pub fn new(system: S, options: SolverOptions) -> SolverResult<Self> {
        if !(options.rtol > 0.0) || !(options.atol > 0.0) {
            return Err(SolverError::InvalidArg {
                what: "rtol and atol must be positive",
            });
        }
        if options.max_dt < 0.0 {
            return Err(SolverError::InvalidArg {
                what: "max_dt must be non-negative",
            });
        }
        if options.max_steps == 0 {
            return Err(SolverError::InvalidArg {
                what: "max_steps must be positive",
            });
        }
        Ok(Self {
            system,
            options,
            current: None,
        })
    }

    /// Consume the solver, returning the wrapped system.
    pub fn into_system(self) -> S {
        self.system
    }

    /// Integrate over `tspan`, recording the solution at each grid point.
    ///
    /// Solver failures (non-convergence) are reported through the outcome's
    /// `success` flag and message, not as errors; `Err` is reserved for
    /// structural misuse (bad grid, mismatched sizes).
    pub fn solve(
        &mut self,
        tspan: &[f64],
        y0: &DVector<f64>,
        yp0: &DVector<f64>,
    ) -> SolverResult<SolverOutcome> {
        if tspan.len() < 2 {
            return Err(SolverError::InvalidArg {
                what: "tspan must hold at least two times",
            });
        }
        if tspan.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SolverError::InvalidArg {
                what: "tspan must be strictly increasing",
            });
        }
        if y0.len() != yp0.len() {
            return Err(SolverError::InvalidArg {
                what: "y0 and yp0 must have the same length",
            });
        }
        let is_alg = self.algebraic_mask(y0.len())?;

        let t0 = tspan[0];
        let mut y = y0.clone();
        let mut yp = yp0.clone();

        if self.options.initcond == InitCond::Yp0 {
            if let Err(e) = consistent_init(&self.system, &self.options, &is_alg, t0, &mut y, &mut yp)
            {
                let mut outcome = SolverOutcome::empty(
                    SolverStatus::ConvergenceFailed,
                    format!("Initial-condition solve failed: {e}"),
                );
                outcome.record(t0, &y, &yp);
                return Ok(outcome);
            }
        }

        let mut outcome =
            SolverOutcome::empty(SolverStatus::Success, String::from("Integration reached the end of the time span."));
        outcome.record(t0, &y, &yp);

        if let Some(ts) = self.options.tstop {
            if ts <= t0 {
                outcome.status = SolverStatus::MaxTimeReached;
                outcome.message =
                    String::from("Integration stopped at tstop before the end of the time span.");
                return Ok(outcome);
            }
        }

        let mut w = Working {
            t: t0,
            y,
            yp,
            h: f64::INFINITY,
            g: None,
            steps_taken: 0,
        };
        if self.system.num_events() > 0 {
            let mut g0 = DVector::zeros(self.system.num_events());
            self.system.events(w.t, &w.y, &w.yp, &mut g0)?;
            w.g = Some(g0);
        }

        for &t_grid in &tspan[1..] {
            let (t_out, stop_here) = match self.options.tstop {
                Some(ts) if t_grid >= ts => (ts, true),
                _ => (t_grid, false),
            };
            if t_out <= w.t {
                break;
            }

            match advance(&self.system, &self.options, &is_alg, &mut w, t_out)? {
                Advance::Reached => {
                    w.t = t_out;
                    outcome.record(w.t, &w.y, &w.yp);
                    if stop_here {
                        outcome.status = SolverStatus::MaxTimeReached;
                        outcome.message = String::from(
                            "Integration stopped at tstop before the end of the time span.",
                        );
                        return Ok(outcome);
                    }
                }
                Advance::Event(record) => {
                    outcome.record(record.t, &record.y, &record.yp);
                    outcome.status = SolverStatus::EventDetected;
                    outcome.message = format!(
                        "Event {} detected at t = {:.6e} s.",
                        record.index, record.t
                    );
                    outcome.event = Some(record);
                    return Ok(outcome);
                }
                Advance::Failed(message) => {
                    outcome.record(w.t, &w.y, &w.yp);
                    outcome.success = false;
                    outcome.status = SolverStatus::ConvergenceFailed;
                    outcome.message = message;
                    return Ok(outcome);
                }
            }
        }

        debug!(steps = w.steps_taken, "integration finished");
        Ok(outcome)
    }

    /// Solve for a consistent initial condition and prime the stepper.
    pub fn init_step(
        &mut self,
        t0: f64,
        y0: &DVector<f64>,
        yp0: &DVector<f64>,
    ) -> SolverResult<SolverOutcome> {
        if y0.len() != yp0.len() {
            return Err(SolverError::InvalidArg {
                what: "y0 and yp0 must have the same length",
            });
        }
        let is_alg = self.algebraic_mask(y0.len())?;

        let mut y = y0.clone();
        let mut yp = yp0.clone();
        if self.options.initcond == InitCond::Yp0 {
            if let Err(e) = consistent_init(&self.system, &self.options, &is_alg, t0, &mut y, &mut yp)
            {
                let mut outcome = SolverOutcome::empty(
                    SolverStatus::ConvergenceFailed,
                    format!("Initial-condition solve failed: {e}"),
                );
                outcome.record(t0, &y, &yp);
                return Ok(outcome);
            }
        }

        let mut outcome = SolverOutcome::empty(
            SolverStatus::Success,
            String::from("Consistent initial condition found."),
        );
        outcome.record(t0, &y, &yp);

        let mut w = Working {
            t: t0,
            y,
            yp,
            h: f64::INFINITY,
            g: None,
            steps_taken: 0,
        };
        if self.system.num_events() > 0 {
            let mut g0 = DVector::zeros(self.system.num_events());
            self.system.events(w.t, &w.y, &w.yp, &mut g0)?;
            w.g = Some(g0);
        }
        self.current = Some(w);

        Ok(outcome)
    }

    /// Advance to the requested time from the state primed by `init_step`.
    pub fn step(&mut self, t: f64) -> SolverResult<SolverOutcome> {
        let mut w = self.current.take().ok_or(SolverError::InvalidArg {
            what: "init_step must be called before step",
        })?;
        if t <= w.t {
            self.current = Some(w);
            return Err(SolverError::InvalidArg {
                what: "step target time must be greater than the current time",
            });
        }
        let is_alg = self.algebraic_mask(w.y.len())?;

        let mut outcome = SolverOutcome::empty(
            SolverStatus::Success,
            String::from("Integration reached the requested time."),
        );

        match advance(&self.system, &self.options, &is_alg, &mut w, t)? {
            Advance::Reached => {
                w.t = t;
                outcome.record(w.t, &w.y, &w.yp);
            }
            Advance::Event(record) => {
                outcome.record(record.t, &record.y, &record.yp);
                outcome.status = SolverStatus::EventDetected;
                outcome.message =
                    format!("Event {} detected at t = {:.6e} s.", record.index, record.t);
                outcome.event = Some(record);
            }
            Advance::Failed(message) => {
                outcome.record(w.t, &w.y, &w.yp);
                outcome.success = false;
                outcome.status = SolverStatus::ConvergenceFailed;
                outcome.message = message;
            }
        }

        self.current = Some(w);
        Ok(outcome)
    }

    fn algebraic_mask(&self, n: usize) -> SolverResult<Vec<bool>> {
        let mut is_alg = vec![false; n];
        for &idx in &self.options.algebraic_idx {
            if idx >= n {
                return Err(SolverError::InvalidArg {
                    what: "algebraic index out of bounds for the state vector",
                });
            }
            is_alg[idx] = true;
        }
        Ok(is_alg)
    }
}

/// Solve for consistent yp0 on differential rows and y0 on algebraic rows.
fn consistent_init<S: DaeSystem>(
    system: &S,
    options: &SolverOptions,
    is_alg: &[bool],
    t0: f64,
    y: &mut DVector<f64>,
    yp: &mut DVector<f64>,
) -> SolverResult<()> {
    let n = y.len();
    let diff_idx: Vec<usize> = (0..n).filter(|&i| !is_alg[i]).collect();
    let alg_idx: Vec<usize> = (0..n).filter(|&i| is_alg[i]).collect();
    let n_diff = diff_idx.len();

    let mut u0 = DVector::zeros(n);
    for (k, &i) in diff_idx.iter().enumerate() {
        u0[k] = yp[i];
    }
    for (k, &i) in alg_idx.iter().enumerate() {
        u0[n_diff + k] = y[i];
    }

    let y_base = y.clone();
    let eval = |u: &DVector<f64>| -> SolverResult<DVector<f64>> {
        let mut y_trial = y_base.clone();
        let mut yp_trial = DVector::zeros(n);
        for (k, &i) in diff_idx.iter().enumerate() {
            yp_trial[i] = u[k];
        }
        for (k, &i) in alg_idx.iter().enumerate() {
            y_trial[i] = u[n_diff + k];
        }
        let mut res = DVector::zeros(n);
        system.residual(t0, &y_trial, &yp_trial, &mut res)?;
        Ok(res)
    };
    let jac =
        |u: &DVector<f64>| finite_difference_jacobian(u, &eval, options.newton.fd_epsilon);

    let result = newton_solve(u0, &eval, jac, &options.newton)?;

    for (k, &i) in diff_idx.iter().enumerate() {
        yp[i] = result.x[k];
    }
    for (k, &i) in alg_idx.iter().enumerate() {
        y[i] = result.x[n_diff + k];
        yp[i] = 0.0;
    }
    Ok(())
}

/// Advance the working state to `t_target` with adaptive backward-Euler
/// sub-steps, watching for event crossings along the way.
fn advance<S: DaeSystem>(
    system: &S,
    options: &SolverOptions,
    is_alg: &[bool],
    w: &mut Working,
    t_target: f64,
) -> SolverResult<Advance> {
    let n = w.y.len();
    let h_floor = 1e-14_f64.max((t_target - w.t).abs() * 1e-12);

    while w.t < t_target {
        if w.steps_taken >= options.max_steps {
            return Ok(Advance::Failed(format!(
                "Maximum number of internal steps ({}) exceeded at t = {:.6e} s.",
                options.max_steps, w.t
            )));
        }

        let mut h = w.h.min(t_target - w.t);
        if options.max_dt > 0.0 {
            h = h.min(options.max_dt);
        }
        let t1 = w.t + h;
        // remaining gap below floating-point resolution
        if t1 <= w.t {
            break;
        }

        let y0 = w.y.clone();
        let eval = |y1: &DVector<f64>| -> SolverResult<DVector<f64>> {
            let yp1 = (y1 - &y0) / h;
            let mut res = DVector::zeros(n);
            system.residual(t1, y1, &yp1, &mut res)?;
            Ok(res)
        };
        let jac =
            |y1: &DVector<f64>| finite_difference_jacobian(y1, &eval, options.newton.fd_epsilon);

        let predict = &w.y + h * &w.yp;
        let solved = newton_solve(predict, &eval, jac, &options.newton);
        w.steps_taken += 1;

        let y1 = match solved {
            Ok(result) => result.x,
            Err(e) => {
                if h > 2.0 * h_floor {
                    w.h = 0.5 * h;
                    continue;
                }
                return Ok(Advance::Failed(format!(
                    "Newton iteration failed at t = {:.6e} s with minimum step size: {e}",
                    w.t
                )));
            }
        };
        let yp1 = (&y1 - &w.y) / h;

        // Local error estimate for backward Euler on differential rows.
        let mut err: f64 = 0.0;
        for i in 0..n {
            if is_alg[i] {
                continue;
            }
            let scale = options.atol + options.rtol * y1[i].abs();
            err = err.max(0.5 * h * (yp1[i] - w.yp[i]).abs() / scale);
        }

        if err > 1.0 && h > 2.0 * h_floor {
            w.h = h * (0.9 / err.sqrt()).clamp(0.2, 0.9);
            continue;
        }

        // Accepted; check events before committing the new state.
        if let Some(g0) = w.g.as_ref() {
            let ne = g0.len();
            let mut g1 = DVector::zeros(ne);
            system.events(t1, &y1, &yp1, &mut g1)?;

            let mut best: Option<(f64, usize)> = None;
            for i in 0..ne {
                let crossed = (g0[i] != 0.0 && g1[i] == 0.0) || g0[i] * g1[i] < 0.0;
                if !crossed {
                    continue;
                }
                let theta = locate_crossing(system, i, g0[i], w, t1, &y1, &yp1)?;
                let better = match best {
                    None => true,
                    // Earliest crossing wins; exact ties keep the lower index.
                    Some((theta_best, _)) => theta + 1e-12 < theta_best,
                };
                if better {
                    best = Some((theta, i));
                }
            }

            if let Some((theta, index)) = best {
                let t_event = w.t + theta * h;
                let y_event = &w.y + theta * (&y1 - &w.y);
                let yp_event = &w.yp + theta * (&yp1 - &w.yp);
                w.t = t_event;
                w.y = y_event.clone();
                w.yp = yp_event.clone();
                return Ok(Advance::Event(EventRecord {
                    index,
                    t: t_event,
                    y: y_event,
                    yp: yp_event,
                }));
            }
            w.g = Some(g1);
        }

        w.t = t1;
        w.y = y1;
        w.yp = yp1;

        let grow = if err > 0.0 {
            (0.9 / err.sqrt()).clamp(1.0, 5.0)
        } else {
            5.0
        };
        w.h = h * grow;
    }

    Ok(Advance::Reached)
}

/// Bisect for the crossing fraction of event `i` within the accepted step.
fn locate_crossing<S: DaeSystem>(
    system: &S,
    i: usize,
    g_start: f64,
    w: &Working,
    t1: f64,
    y1: &DVector<f64>,
    yp1: &DVector<f64>,
) -> SolverResult<f64> {
    let ne = system.num_events();
    let mut out = DVector::zeros(ne);

    let mut lo = 0.0_f64;
    let mut hi = 1.0_f64;
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        let t_mid = w.t + mid * (t1 - w.t);
        let y_mid = &w.y + mid * (y1 - &w.y);
        let yp_mid = &w.yp + mid * (yp1 - &w.yp);
        system.events(t_mid, &y_mid, &yp_mid, &mut out)?;
        if out[i] == 0.0 {
            return Ok(mid);
        }
        if out[i] * g_start > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    Ok(hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Decay;

    impl DaeSystem for Decay {
        fn residual(
            &self,
            _t: f64,
            y: &DVector<f64>,
            yp: &DVector<f64>,
            res: &mut DVector<f64>,
        ) -> SolverResult<()> {
            res[0] = yp[0] + y[0];
            Ok(())
        }
    }

    struct DecayWithConstraint;

    impl DaeSystem for DecayWithConstraint {
        fn residual(
            &self,
            _t: f64,
            y: &DVector<f64>,
            yp: &DVector<f64>,
            res: &mut DVector<f64>,
        ) -> SolverResult<()> {
            res[0] = yp[0] + y[0];
            res[1] = y[1] - 2.0 * y[0];
            Ok(())
        }
    }

    struct RampDown;

    impl DaeSystem for RampDown {
        fn residual(
            &self,
            _t: f64,
            _y: &DVector<f64>,
            yp: &DVector<f64>,
            res: &mut DVector<f64>,
        ) -> SolverResult<()> {
            res[0] = yp[0] + 1.0;
            Ok(())
        }

        fn num_events(&self) -> usize {
            1
        }

        fn events(
            &self,
            _t: f64,
            y: &DVector<f64>,
            _yp: &DVector<f64>,
            out: &mut DVector<f64>,
        ) -> SolverResult<()> {
            out[0] = y[0] - 0.25;
            Ok(())
        }
    }

    fn grid(t_max: f64, n: usize) -> Vec<f64> {
        tev_core::linspace(t_max, n)
    }

    #[test]
    fn ode_exponential_decay() {
        let mut solver = DaeSolver::new(Decay, SolverOptions::default()).unwrap();
        let y0 = DVector::from_element(1, 1.0);
        let yp0 = DVector::zeros(1);

        let outcome = solver.solve(&grid(1.0, 11), &y0, &yp0).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.status, SolverStatus::Success);
        assert_eq!(outcome.t.len(), 11);
        assert_relative_eq!(
            outcome.y.last().unwrap()[0],
            (-1.0_f64).exp(),
            max_relative = 2e-2
        );
        // consistent initialization recovers yp0 = -y0
        assert_relative_eq!(outcome.yp[0][0], -1.0, max_relative = 1e-6);
    }

    #[test]
    fn dae_constraint_tracks_differential_state() {
        let options = SolverOptions {
            algebraic_idx: vec![1],
            ..SolverOptions::default()
        };
        let mut solver = DaeSolver::new(DecayWithConstraint, options).unwrap();

        // Algebraic entry deliberately inconsistent; init must repair it.
        let y0 = DVector::from_vec(vec![1.0, 0.0]);
        let yp0 = DVector::zeros(2);

        let outcome = solver.solve(&grid(1.0, 11), &y0, &yp0).unwrap();

        assert!(outcome.success);
        assert_relative_eq!(outcome.y[0][1], 2.0, max_relative = 1e-6);
        let y_end = outcome.y.last().unwrap();
        assert_relative_eq!(y_end[1], 2.0 * y_end[0], max_relative = 1e-5);
        assert_relative_eq!(y_end[0], (-1.0_f64).exp(), max_relative = 2e-2);
    }

    #[test]
    fn event_truncates_integration() {
        let mut solver = DaeSolver::new(RampDown, SolverOptions::default()).unwrap();
        let y0 = DVector::from_element(1, 1.0);
        let yp0 = DVector::zeros(1);

        let outcome = solver.solve(&grid(2.0, 21), &y0, &yp0).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.status, SolverStatus::EventDetected);
        let event = outcome.event.as_ref().unwrap();
        assert_eq!(event.index, 0);
        assert_relative_eq!(event.t, 0.75, max_relative = 1e-3);
        assert_relative_eq!(outcome.t.last().copied().unwrap(), event.t);
        assert_relative_eq!(event.y[0], 0.25, epsilon = 1e-3);
    }

    #[test]
    fn tstop_truncates_integration() {
        let options = SolverOptions {
            tstop: Some(0.5),
            ..SolverOptions::default()
        };
        let mut solver = DaeSolver::new(Decay, options).unwrap();
        let y0 = DVector::from_element(1, 1.0);
        let yp0 = DVector::zeros(1);

        let outcome = solver.solve(&grid(2.0, 21), &y0, &yp0).unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.status, SolverStatus::MaxTimeReached);
        assert_relative_eq!(outcome.t.last().copied().unwrap(), 0.5);
    }

    #[test]
    fn single_step_advance() {
        let mut solver = DaeSolver::new(Decay, SolverOptions::default()).unwrap();
        let y0 = DVector::from_element(1, 1.0);
        let yp0 = DVector::zeros(1);

        let init = solver.init_step(0.0, &y0, &yp0).unwrap();
        assert!(init.success);
        assert_relative_eq!(init.yp[0][0], -1.0, max_relative = 1e-6);

        let outcome = solver.step(0.5).unwrap();
        assert!(outcome.success);
        assert_relative_eq!(outcome.t[0], 0.5);
        assert_relative_eq!(outcome.y[0][0], (-0.5_f64).exp(), max_relative = 1e-2);
    }

    #[test]
    fn step_before_init_is_an_error() {
        let mut solver = DaeSolver::new(Decay, SolverOptions::default()).unwrap();
        assert!(solver.step(1.0).is_err());
    }

    #[test]
    fn bad_grid_is_rejected() {
        let mut solver = DaeSolver::new(Decay, SolverOptions::default()).unwrap();
        let y0 = DVector::from_element(1, 1.0);
        let yp0 = DVector::zeros(1);
        assert!(solver.solve(&[0.0], &y0, &yp0).is_err());
        assert!(solver.solve(&[0.0, 1.0, 0.5], &y0, &yp0).is_err());
    }
}
