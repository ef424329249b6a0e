//! Gaussian-process surrogate (component C): one independent regressor per
//! output dimension, inputs rescaled to the unit cube, hyperparameters fit
//! by minimizing the negative log marginal likelihood with SCE-UA. Modeled
//! on `dmosopt.gp.GPR_Matern`/`GPR_RBF`.

pub mod kernel;

use derive_builder::Builder;
use faer::{Side, linalg::solvers::Llt};
use faer_ext::{IntoFaer, IntoNdarray};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{RngCore, SeedableRng};
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::error::SurrogateFitError;
use crate::random::{RandomGenerator, StdRandomGenerator};
use crate::sce_ua::{SceUaConfig, sceua};
use crate::space::ParameterSpace;
use crate::surrogate::kernel::{Kernel, LengthScale};

/// Which covariance family backs the surrogate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelKind {
    Matern52,
    Rbf,
}

#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct SurrogateOptions {
    #[builder(default = "KernelKind::Matern52")]
    pub kernel: KernelKind,
    /// One length scale per input dimension instead of one shared scalar.
    #[builder(default = "false")]
    pub anisotropic: bool,
    #[builder(default = "SceUaConfig::default()")]
    pub sce_ua: SceUaConfig,
}

impl Default for SurrogateOptions {
    fn default() -> Self {
        Self {
            kernel: KernelKind::Matern52,
            anisotropic: false,
            sce_ua: SceUaConfig::default(),
        }
    }
}

const CONSTANT_BOUNDS: (f64, f64) = (1e-2, 1e2);
const LENGTH_SCALE_BOUNDS: (f64, f64) = (1e-2, 1e2);
const NOISE_BOUNDS: (f64, f64) = (1e-8, 1e-4);
const MIN_TRAINING_POINTS: usize = 3;

#[derive(Debug, Clone)]
struct Hyperparameters {
    constant: f64,
    length_scale: Array1<f64>,
    noise: f64,
}

/// A single independent-output GP regressor, fit on unit-cube-rescaled
/// inputs and zero-mean/unit-variance-normalized outputs.
#[derive(Debug, Clone)]
pub struct GaussianProcess {
    kernel_kind: KernelKind,
    hyper: Hyperparameters,
    x_train: Array2<f64>,
    alpha: Array1<f64>,
    y_mean: f64,
    y_std: f64,
}

impl GaussianProcess {
    fn kernel(&self) -> Kernel {
        let length_scale = if self.hyper.length_scale.len() == 1 {
            LengthScale::Isotropic(self.hyper.length_scale[0])
        } else {
            LengthScale::Anisotropic(self.hyper.length_scale.clone())
        };
        match self.kernel_kind {
            KernelKind::Matern52 => Kernel::Matern52 { length_scale },
            KernelKind::Rbf => Kernel::Rbf { length_scale },
        }
    }

    /// Fits a GP to `x` (rows rescaled to the unit cube by the caller) and
    /// `y` (one scalar output per row).
    fn fit(
        x_unit: &Array2<f64>,
        y: ArrayView1<f64>,
        kernel_kind: KernelKind,
        anisotropic: bool,
        sce_ua: &SceUaConfig,
        rng: &mut impl RandomGenerator,
    ) -> Result<Self, SurrogateFitError> {
        let n = x_unit.nrows();
        let d = x_unit.ncols();
        if n < MIN_TRAINING_POINTS {
            return Err(SurrogateFitError::InsufficientData {
                min: MIN_TRAINING_POINTS,
                actual: n,
            });
        }

        let y_mean = y.mean().unwrap_or(0.0);
        let y_std = y.std(0.0).max(1e-12);
        let y_norm: Array1<f64> = y.mapv(|v| (v - y_mean) / y_std);

        let n_scale_params = if anisotropic { d } else { 1 };
        let n_theta = 2 + n_scale_params;
        let mut lb = Array1::<f64>::zeros(n_theta);
        let mut ub = Array1::<f64>::zeros(n_theta);
        lb[0] = CONSTANT_BOUNDS.0;
        ub[0] = CONSTANT_BOUNDS.1;
        for j in 0..n_scale_params {
            lb[1 + j] = LENGTH_SCALE_BOUNDS.0;
            ub[1 + j] = LENGTH_SCALE_BOUNDS.1;
        }
        lb[n_theta - 1] = NOISE_BOUNDS.0;
        ub[n_theta - 1] = NOISE_BOUNDS.1;

        let objective = |theta: &Array1<f64>| -> f64 {
            let hyper = theta_to_hyper(theta, anisotropic, d);
            negative_log_marginal_likelihood(x_unit, &y_norm, kernel_kind, &hyper)
                .unwrap_or(f64::INFINITY)
        };

        let result = sceua(objective, &lb, &ub, sce_ua, rng);
        let hyper = theta_to_hyper(&result.best_x, anisotropic, d);

        let kernel = kernel_for(kernel_kind, &hyper);
        let mut k = kernel.covariance(x_unit, x_unit);
        k.mapv_inplace(|v| v * hyper.constant);
        for i in 0..n {
            k[[i, i]] += hyper.noise;
        }
        let alpha = cholesky_solve(&k, &y_norm)?;

        Ok(Self {
            kernel_kind,
            hyper,
            x_train: x_unit.clone(),
            alpha,
            y_mean,
            y_std,
        })
    }

    /// Posterior mean at `x_unit` (already rescaled to the unit cube).
    fn predict(&self, x_unit: &Array2<f64>) -> Array1<f64> {
        let kernel = self.kernel();
        let mut k_star = kernel.covariance(x_unit, &self.x_train);
        k_star.mapv_inplace(|v| v * self.hyper.constant);
        let mean_norm = k_star.dot(&self.alpha);
        mean_norm.mapv(|v| v * self.y_std + self.y_mean)
    }
}

fn theta_to_hyper(theta: &Array1<f64>, anisotropic: bool, d: usize) -> Hyperparameters {
    let constant = theta[0];
    let n_scale_params = if anisotropic { d } else { 1 };
    let length_scale = theta.slice(ndarray::s![1..1 + n_scale_params]).to_owned();
    let noise = theta[theta.len() - 1];
    Hyperparameters {
        constant,
        length_scale,
        noise,
    }
}

fn kernel_for(kind: KernelKind, hyper: &Hyperparameters) -> Kernel {
    let length_scale = if hyper.length_scale.len() == 1 {
        LengthScale::Isotropic(hyper.length_scale[0])
    } else {
        LengthScale::Anisotropic(hyper.length_scale.clone())
    };
    match kind {
        KernelKind::Matern52 => Kernel::Matern52 { length_scale },
        KernelKind::Rbf => Kernel::Rbf { length_scale },
    }
}

/// `-0.5 y^T K^-1 y - 0.5 log|K| - n/2 log(2*pi)`, negated so SCE-UA (a
/// minimizer) maximizes the marginal likelihood.
fn negative_log_marginal_likelihood(
    x: &Array2<f64>,
    y: &Array1<f64>,
    kind: KernelKind,
    hyper: &Hyperparameters,
) -> Result<f64, SurrogateFitError> {
    let n = x.nrows();
    let kernel = kernel_for(kind, hyper);
    let mut k = kernel.covariance(x, x);
    k.mapv_inplace(|v| v * hyper.constant);
    for i in 0..n {
        k[[i, i]] += hyper.noise;
    }

    let faer_k = k.view().into_faer();
    let llt = Llt::new(faer_k, Side::Lower).map_err(|_| SurrogateFitError::CholeskyFailed)?;
    let l = llt.L().as_ref().into_ndarray().to_owned();

    let log_det: f64 = 2.0 * (0..n).map(|i| l[[i, i]].max(1e-300).ln()).sum::<f64>();

    let alpha = cholesky_solve(&k, y)?;
    let data_fit = y.dot(&alpha);

    Ok(0.5 * data_fit + 0.5 * log_det + 0.5 * n as f64 * (2.0 * std::f64::consts::PI).ln())
}

/// Solves `k @ alpha = y` via a Cholesky factorization of the (symmetric
/// positive-definite) covariance matrix `k`.
fn cholesky_solve(k: &Array2<f64>, y: &Array1<f64>) -> Result<Array1<f64>, SurrogateFitError> {
    let n = y.len();
    let faer_k = k.view().into_faer();
    let llt = Llt::new(faer_k, Side::Lower).map_err(|_| SurrogateFitError::CholeskyFailed)?;

    let y_col = Array2::from_shape_vec((n, 1), y.to_vec()).expect("y column shape");
    let faer_y = y_col.view().into_faer();
    let solved = llt.solve(faer_y);
    let solved_nd = solved.as_ref().into_ndarray();
    Ok(solved_nd.column(0).to_owned())
}

/// Independent per-output-dimension GP ensemble: `fit` trains one
/// [`GaussianProcess`] per column of `y`, `predict` stacks their posterior
/// means back into an `(n x n_outputs)` matrix.
#[derive(Debug, Clone)]
pub struct Surrogate {
    models: Vec<GaussianProcess>,
    lower: Array1<f64>,
    range: Array1<f64>,
}

impl Surrogate {
    pub fn fit(
        space: &ParameterSpace,
        x: ArrayView2<f64>,
        y: ArrayView2<f64>,
        options: &SurrogateOptions,
        rng: &mut impl RandomGenerator,
    ) -> Result<Self, SurrogateFitError> {
        if x.nrows() != y.nrows() {
            return Err(SurrogateFitError::Shape(
                crate::error::ShapeError::RowMismatch {
                    expected: x.nrows(),
                    actual: y.nrows(),
                },
            ));
        }
        let lower = space.lower_bounds();
        let range = &space.upper_bounds() - &lower;
        let x_unit = rescale_to_unit_cube(x, &lower, &range);

        let n_outputs = y.ncols();
        // Each output's GP is fit independently, so the per-objective loop
        // runs in parallel; a distinct child RNG is drawn up front for each
        // column since `rng` itself can't be shared across threads.
        let child_seeds: Vec<u64> = (0..n_outputs).map(|_| rng.rng().next_u64()).collect();
        let models: Vec<GaussianProcess> = child_seeds
            .into_par_iter()
            .enumerate()
            .map(|(j, seed)| {
                let mut child_rng = StdRandomGenerator::new(StdRng::seed_from_u64(seed));
                GaussianProcess::fit(
                    &x_unit,
                    y.column(j),
                    options.kernel,
                    options.anisotropic,
                    &options.sce_ua,
                    &mut child_rng,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            models,
            lower,
            range,
        })
    }

    /// Posterior mean predictions, one column per output dimension.
    pub fn predict(&self, x: ArrayView2<f64>) -> Array2<f64> {
        let x_unit = rescale_to_unit_cube(x, &self.lower, &self.range);
        let n = x.nrows();
        let mut out = Array2::<f64>::zeros((n, self.models.len()));
        for (j, gp) in self.models.iter().enumerate() {
            let column = gp.predict(&x_unit);
            out.column_mut(j).assign(&column);
        }
        out
    }
}

fn rescale_to_unit_cube(x: ArrayView2<f64>, lower: &Array1<f64>, range: &Array1<f64>) -> Array2<f64> {
    let mut out = x.to_owned();
    for mut row in out.rows_mut() {
        for ((v, &lo), &r) in row.iter_mut().zip(lower.iter()).zip(range.iter()) {
            *v = (*v - lo) / r.max(1e-12);
        }
    }
    out
}
