//! Sequential Kalman estimator (spec.md §4.4). Joseph-form measurement
//! update, state mean/covariance as `nalgebra::{DVector, DMatrix}`,
//! grounded on the teacher's own `estimate.rs` pattern
//! (`(G^T G)^-1` via `try_inverse`, never raw matrix inversion elsewhere)
//! generalized to dynamic size and multi-epoch recursion. Ordering of
//! `preIndex`/`nowIndex` is grounded on
//! `original_source/src/ProceFrame/Variable.hpp`'s `m_now_index`/`m_pre_index`
//! fields, carried here as `Option<usize>`.
use nalgebra::{DMatrix, DVector};

use crate::equation::Equation;
use crate::error::FilterError;
use crate::stochastic::StochasticModel;
use crate::variable::Variable;

/// Ordered filter state: the Variable vector `X`, mean `x_hat`, and
/// covariance `P` (spec.md §3 "Filter state").
#[derive(Debug, Clone)]
pub struct FilterState {
    pub variables: Vec<Variable>,
    pub models: Vec<StochasticModel>,
    pub x_hat: DVector<f64>,
    pub p: DMatrix<f64>,
}

impl FilterState {
    pub fn empty() -> Self {
        Self {
            variables: Vec::new(),
            models: Vec::new(),
            x_hat: DVector::zeros(0),
            p: DMatrix::zeros(0, 0),
        }
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Postfit diagnostics exposed to downstream consumers (spec.md §4.4
/// "Outputs exposed to downstream").
#[derive(Debug, Clone)]
pub struct MeasurementUpdateReport {
    pub postfit_residuals: DVector<f64>,
}

/// Builds the next epoch's `X` from the union of Variables named in
/// `equations`, matching each against `previous` by `(typeOrder, type,
/// source, satellite, arc)` equality so `preIndex -> nowIndex` is a
/// permutation computable by set intersection (spec.md §4.4).
///
/// New Variables seed `x_hat = 0` and `P[v,v] = initial_variance`
/// (position/clock callers may overwrite the seed afterwards from an SPP
/// bootstrap, spec.md §4.4 "may seed from SPP"). Retained Variables carry
/// forward the previous `x_hat`/`P` row/column scaled by `phi()`, plus
/// process noise `q() * dt`. A retained ambiguity Variable whose
/// `should_reinitialize(cs_flag)` is true is instead treated as new.
pub fn time_update(
    previous: &FilterState,
    mut next_variables: Vec<Variable>,
    dt_seconds: f64,
    cs_flags: impl Fn(&Variable) -> bool,
) -> FilterState {
    next_variables.sort();

    let n = next_variables.len();
    let mut x_hat = DVector::zeros(n);
    let mut p = DMatrix::zeros(n, n);
    let mut models = Vec::with_capacity(n);

    for now_index in 0..n {
        let model = {
            let v = &next_variables[now_index];
            previous
                .variables
                .get(v.model_index)
                .map(|_| previous.models[v.model_index])
                .unwrap_or(StochasticModel::Constant)
        };

        let retained = previous
            .variables
            .iter()
            .position(|prev| variables_match(prev, &next_variables[now_index]));

        let cs_flag = cs_flags(&next_variables[now_index]);
        let reinit = model.should_reinitialize(cs_flag);

        match retained {
            Some(prev_idx) if !reinit => {
                let prev_x = previous.x_hat[prev_idx];
                x_hat[now_index] = model.phi() * prev_x;
                p[(now_index, now_index)] =
                    previous.p[(prev_idx, prev_idx)] + model.q(dt_seconds);
                for other_now in 0..n {
                    if other_now == now_index {
                        continue;
                    }
                    if let Some(other_prev) = previous
                        .variables
                        .iter()
                        .position(|p| variables_match(p, &next_variables[other_now]))
                    {
                        p[(now_index, other_now)] = previous.p[(prev_idx, other_prev)];
                    }
                }
                next_variables[now_index].pre_index = Some(prev_idx);
            }
            _ => {
                let v = &next_variables[now_index];
                x_hat[now_index] = 0.0;
                p[(now_index, now_index)] = model.reset_variance().max(v.initial_variance);
                next_variables[now_index].pre_index = None;
            }
        }
        next_variables[now_index].now_index = Some(now_index);
        models.push(model);
    }

    FilterState {
        variables: next_variables,
        models,
        x_hat,
        p,
    }
}

fn variables_match(a: &Variable, b: &Variable) -> bool {
    a.type_order == b.type_order
        && a.type_id == b.type_id
        && a.source == b.source
        && a.satellite == b.satellite
        && (a.arc - b.arc).abs() < f64::EPSILON
}

/// Sequential scalar Joseph-form measurement update (spec.md §4.4),
/// processing `equations` one row at a time so each update only needs a
/// 1x1 innovation inversion rather than an `m x m` one.
pub fn measurement_update(
    state: &mut FilterState,
    equations: &[Equation],
) -> Result<MeasurementUpdateReport, FilterError> {
    if equations.is_empty() {
        return Err(FilterError::EmptyEquationSet(equations_epoch_or_default(equations)));
    }

    let n = state.len();
    let mut postfit = DVector::zeros(equations.len());
    let identity = DMatrix::<f64>::identity(n, n);

    for (row, eq) in equations.iter().enumerate() {
        let mut h = DVector::zeros(n);
        for (variable, coefficient) in eq.body.iter() {
            // `variable.now_index` is set on `time_update`'s own cloned
            // Vec, not on the Variables still held inside `equations`, so
            // the index has to be recovered by identity match against
            // `state.variables` rather than trusted off the Variable itself.
            let idx = state
                .variables
                .iter()
                .position(|sv| variables_match(sv, variable))
                .expect("variable must be present in X after time update");
            let value = match coefficient {
                crate::equation::Coefficient::Forced(v) => *v,
                crate::equation::Coefficient::FromType(_) => {
                    unreachable!("equation builder must resolve FromType coefficients to Forced before assembly")
                }
            };
            h[idx] += value;
        }

        let r = eq.header.weight;
        let y = eq.header.residual;
        let hx = h.dot(&state.x_hat);
        let innovation = y - hx;

        let p_ht = &state.p * &h;
        let s = h.dot(&p_ht) + r;
        if s.abs() < f64::EPSILON {
            return Err(FilterError::NumericalFailure(eq.header.epoch));
        }
        let k = &p_ht / s;

        state.x_hat += &k * innovation;

        let kh = &k * h.transpose();
        let i_kh = &identity - &kh;
        state.p = &i_kh * &state.p * i_kh.transpose() + &k * r * k.transpose();
        // enforce symmetry (spec.md §4.4 "Symmetrize P+")
        state.p = (&state.p + state.p.transpose()) * 0.5;

        postfit[row] = y - h.dot(&state.x_hat);
    }

    Ok(MeasurementUpdateReport {
        postfit_residuals: postfit,
    })
}

fn equations_epoch_or_default(equations: &[Equation]) -> hifitime::Epoch {
    equations
        .first()
        .map(|e| e.header.epoch)
        .unwrap_or_else(hifitime::Epoch::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::equation::{Coefficient, EquationHeader};
    use crate::identifiers::{SatId, TypeId};
    use crate::variable::{SatScope, SourceScope};
    use gnss::prelude::Constellation;

    fn clock_variable() -> Variable {
        Variable::new(TypeId::Cdt('G'), SourceScope::All, SatScope::All, 0.0, 0, 1.0e8)
    }

    #[test]
    fn new_variable_seeds_from_initial_variance() {
        let previous = FilterState::empty();
        let next = time_update(&previous, vec![clock_variable()], 1.0, |_| false);
        assert_eq!(next.x_hat[0], 0.0);
        assert!(next.p[(0, 0)] > 0.0);
    }

    #[test]
    fn retained_variable_carries_forward_with_process_noise() {
        let mut previous = FilterState::empty();
        let v = clock_variable();
        previous.variables = vec![v.clone()];
        previous.models = vec![StochasticModel::RandomWalk { sigma: 1.0 }];
        previous.x_hat = DVector::from_vec(vec![3.0]);
        previous.p = DMatrix::from_element(1, 1, 5.0);

        let mut next_v = v.clone();
        next_v.model_index = 0;
        let next = time_update(&previous, vec![next_v], 4.0, |_| false);

        assert_eq!(next.x_hat[0], 3.0);
        assert!(next.p[(0, 0)] > 5.0); // process noise added
    }

    #[test]
    fn measurement_update_rejects_empty_equation_set() {
        let mut state = time_update(&FilterState::empty(), vec![clock_variable()], 1.0, |_| false);
        let err = measurement_update(&mut state, &[]).unwrap_err();
        assert!(matches!(err, FilterError::EmptyEquationSet(_)));
    }

    #[test]
    fn measurement_update_keeps_covariance_symmetric() {
        let mut state = time_update(&FilterState::empty(), vec![clock_variable()], 1.0, |_| false);
        state.p[(0, 0)] = 1.0e8;

        let mut eq = Equation::new(EquationHeader {
            independent_term: TypeId::Prefit(Box::new(TypeId::Rho)),
            residual: 1.5,
            epoch: hifitime::Epoch::from_gpst_seconds(0.0),
            satellite: SatId::new(Constellation::GPS, 1),
            system: 'G',
            weight: 0.09,
            order_index: 0,
        });
        eq.add_unknown(state.variables[0].clone(), Coefficient::Forced(1.0));

        let report = measurement_update(&mut state, &[eq]).unwrap();
        assert_eq!(report.postfit_residuals.len(), 1);
        let asymmetry = (&state.p - state.p.transpose()).abs().max();
        assert!(asymmetry < 1e-6);
    }

    #[test]
    fn measurement_update_moves_position_state_from_a_freshly_assembled_equation() {
        // Exercises the real assembly path: build the Equation's Variables
        // from scratch (never touched by a prior time_update), run
        // time_update to seed the filter, then feed the *original*
        // equation Variables into measurement_update.
        let dn = Variable::new(TypeId::Dn, SourceScope::All, SatScope::All, 0.0, 0, 1.0e6);
        let de = Variable::new(TypeId::De, SourceScope::All, SatScope::All, 0.0, 0, 1.0e6);
        let du = Variable::new(TypeId::Du, SourceScope::All, SatScope::All, 0.0, 0, 1.0e6);

        let mut eq = Equation::new(EquationHeader {
            independent_term: TypeId::Prefit(Box::new(TypeId::Rho)),
            residual: 5.0,
            epoch: hifitime::Epoch::from_gpst_seconds(0.0),
            satellite: SatId::new(Constellation::GPS, 1),
            system: 'G',
            weight: 0.09,
            order_index: 0,
        });
        eq.add_unknown(dn.clone(), Coefficient::Forced(0.2));
        eq.add_unknown(de.clone(), Coefficient::Forced(0.3));
        eq.add_unknown(du.clone(), Coefficient::Forced(0.9));

        let next_variables: Vec<Variable> = eq.body.variables().cloned().collect();
        let mut state = time_update(&FilterState::empty(), next_variables, 1.0, |_| false);

        assert!(state.variables.iter().all(|v| v.now_index.is_some()));

        measurement_update(&mut state, &[eq]).unwrap();

        assert_ne!(state.x_hat[0], 0.0);
        assert_ne!(state.x_hat[1], 0.0);
        assert_ne!(state.x_hat[2], 0.0);
    }
}
