//! Shuffled Complex Evolution (SCE-UA), a derivative-free global minimizer
//! used to fit the Gaussian-process surrogate's hyperparameters (component
//! B). Complexes partition the population by strided index, each complex
//! runs several competitive-complex-evolution (CCE) steps via simplex
//! reflection/contraction/random-restart, then the population is reshuffled.

use derive_builder::Builder;
use ndarray::{Array1, Array2, Axis};

use crate::random::RandomGenerator;

/// Mirrors `dmosopt.gp.sceua_optimizer`'s caller defaults (`maxn=3000,
/// kstop=10, pcento=0.1, peps=0.001`, `ngs=2`).
#[derive(Debug, Clone, Builder)]
#[builder(pattern = "owned")]
pub struct SceUaConfig {
    /// Number of complexes.
    #[builder(default = "2")]
    pub n_complexes: usize,
    /// Maximum number of function evaluations.
    #[builder(default = "3000")]
    pub max_evals: usize,
    /// Number of evolution loops examined for convergence.
    #[builder(default = "10")]
    pub kstop: usize,
    /// Percentage change threshold over the last `kstop` loops.
    #[builder(default = "0.1")]
    pub pcento: f64,
    /// Relative parameter-space size threshold.
    #[builder(default = "0.001")]
    pub peps: f64,
}

impl Default for SceUaConfig {
    fn default() -> Self {
        Self {
            n_complexes: 2,
            max_evals: 3000,
            kstop: 10,
            pcento: 0.1,
            peps: 0.001,
        }
    }
}

/// Result of an SCE-UA run.
#[derive(Debug, Clone)]
pub struct SceUaResult {
    pub best_x: Array1<f64>,
    pub best_f: f64,
    pub n_evals: usize,
    pub n_loops: usize,
}

/// Minimizes `func` over the box `[lb, ub]` using SCE-UA.
pub fn sceua(
    mut func: impl FnMut(&Array1<f64>) -> f64,
    lb: &Array1<f64>,
    ub: &Array1<f64>,
    config: &SceUaConfig,
    rng: &mut impl RandomGenerator,
) -> SceUaResult {
    let nopt = lb.len();
    assert_eq!(nopt, ub.len());
    let ngs = config.n_complexes.max(1);
    let npg = 2 * nopt + 1;
    let nps = nopt + 1;
    let nspl = npg;
    let npt = npg * ngs;
    let bd: Array1<f64> = ub - lb;

    let mut x = Array2::<f64>::zeros((npt, nopt));
    for mut row in x.rows_mut() {
        for j in 0..nopt {
            row[j] = lb[j] + rng.gen_range_f64(0.0, 1.0) * bd[j];
        }
    }
    let mut xf: Vec<f64> = x.rows().into_iter().map(|r| func(&r.to_owned())).collect();
    let mut n_evals = npt;

    sort_population(&mut x, &mut xf);

    let mut gnrng = normalized_geometric_range(&x, &bd);
    let mut n_loops = 0usize;
    let mut criter: Vec<f64> = Vec::new();
    let mut criter_change = 1e5_f64;

    while n_evals < config.max_evals && gnrng > config.peps && criter_change > config.pcento {
        n_loops += 1;

        for igs in 0..ngs {
            let k2: Vec<usize> = (0..npg).map(|k1| k1 * ngs + igs).collect();
            let mut cx = Array2::<f64>::zeros((npg, nopt));
            let mut cf = vec![0.0f64; npg];
            for (k1, &k) in k2.iter().enumerate() {
                cx.row_mut(k1).assign(&x.row(k));
                cf[k1] = xf[k];
            }

            for _ in 0..nspl {
                let lcs = select_simplex(nps, npg, rng);
                let mut s = Array2::<f64>::zeros((nps, nopt));
                let mut sf: Vec<f64> = vec![0.0; nps];
                for (row, &idx) in lcs.iter().enumerate() {
                    s.row_mut(row).assign(&cx.row(idx));
                    sf[row] = cf[idx];
                }

                let (snew, fnew, evals) = cceua(&mut func, &s, &sf, lb, ub, rng);
                n_evals += evals;

                let last = nps - 1;
                s.row_mut(last).assign(&snew);
                sf[last] = fnew;

                for (row, &idx) in lcs.iter().enumerate() {
                    cx.row_mut(idx).assign(&s.row(row));
                    cf[idx] = sf[row];
                }
                sort_population(&mut cx, &mut cf);
            }

            for (k1, &k) in k2.iter().enumerate() {
                x.row_mut(k).assign(&cx.row(k1));
                xf[k] = cf[k1];
            }
        }

        sort_population(&mut x, &mut xf);
        gnrng = normalized_geometric_range(&x, &bd);

        criter.push(xf[0]);
        if n_loops >= config.kstop {
            let recent = &criter[n_loops - config.kstop..n_loops];
            let mean_abs = recent.iter().map(|v| v.abs()).sum::<f64>() / config.kstop as f64;
            criter_change = (criter[n_loops - 1] - criter[n_loops - config.kstop]).abs() * 100.0
                / mean_abs.max(f64::EPSILON);
        }
    }

    SceUaResult {
        best_x: x.row(0).to_owned(),
        best_f: xf[0],
        n_evals,
        n_loops,
    }
}

fn sort_population(x: &mut Array2<f64>, xf: &mut [f64]) {
    let n = xf.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| xf[a].partial_cmp(&xf[b]).unwrap());
    let sorted_x = x.select(Axis(0), &order);
    x.assign(&sorted_x);
    let sorted_f: Vec<f64> = order.iter().map(|&i| xf[i]).collect();
    xf.copy_from_slice(&sorted_f);
}

fn normalized_geometric_range(x: &Array2<f64>, bd: &Array1<f64>) -> f64 {
    let nopt = x.ncols();
    let mut sum_log = 0.0;
    for j in 0..nopt {
        let col = x.column(j);
        let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        sum_log += ((max - min) / bd[j]).ln();
    }
    (sum_log / nopt as f64).exp()
}

/// Samples `nps` distinct simplex member indices out of `0..npg`, biased
/// towards lower (better-ranked) indices via a triangular distribution.
fn select_simplex(nps: usize, npg: usize, rng: &mut impl RandomGenerator) -> Vec<usize> {
    let mut chosen: Vec<usize> = vec![0];
    let npg_f = npg as f64;
    while chosen.len() < nps {
        let u = rng.gen_range_f64(0.0, 1.0);
        let pos = ((npg_f + 0.5) - ((npg_f + 0.5).powi(2) - npg_f * (npg_f + 1.0) * u).sqrt())
            .floor();
        let idx = (pos as i64).clamp(0, npg as i64 - 1) as usize;
        if !chosen.contains(&idx) {
            chosen.push(idx);
        }
    }
    chosen
}

/// Competitive complex evolution: reflection, contraction, then random
/// restart, each tried in turn until one improves on the worst point.
fn cceua(
    func: &mut impl FnMut(&Array1<f64>) -> f64,
    s: &Array2<f64>,
    sf: &[f64],
    bl: &Array1<f64>,
    bu: &Array1<f64>,
    rng: &mut impl RandomGenerator,
) -> (Array1<f64>, f64, usize) {
    let n = s.nrows();
    let alpha = 1.0;
    let beta = 0.5;

    let worst = s.row(n - 1).to_owned();
    let f_worst = sf[n - 1];

    let centroid = s.slice(ndarray::s![0..n - 1, ..]).mean_axis(Axis(0)).unwrap();

    let mut candidate = &centroid + alpha * (&centroid - &worst);
    if out_of_bounds(&candidate, bl, bu) {
        candidate = random_point(bl, bu, rng);
    }
    let mut f_candidate = func(&candidate);
    let mut evals = 1;

    if f_candidate > f_worst {
        candidate = &worst + beta * (&centroid - &worst);
        f_candidate = func(&candidate);
        evals += 1;

        if f_candidate > f_worst {
            candidate = random_point(bl, bu, rng);
            f_candidate = func(&candidate);
            evals += 1;
        }
    }

    (candidate, f_candidate, evals)
}

fn out_of_bounds(point: &Array1<f64>, bl: &Array1<f64>, bu: &Array1<f64>) -> bool {
    point
        .iter()
        .zip(bl.iter())
        .zip(bu.iter())
        .any(|((&p, &lo), &hi)| p < lo || p > hi)
}

fn random_point(bl: &Array1<f64>, bu: &Array1<f64>, rng: &mut impl RandomGenerator) -> Array1<f64> {
    Array1::from_iter(
        bl.iter()
            .zip(bu.iter())
            .map(|(&lo, &hi)| lo + rng.gen_range_f64(0.0, 1.0) * (hi - lo)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::StdRandomGenerator;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_sceua_minimizes_sphere() {
        let lb = Array1::from(vec![-5.0, -5.0]);
        let ub = Array1::from(vec![5.0, 5.0]);
        let config = SceUaConfig {
            n_complexes: 2,
            max_evals: 2000,
            kstop: 5,
            pcento: 0.5,
            peps: 0.01,
        };
        let mut rng = StdRandomGenerator::new(StdRng::seed_from_u64(42));
        let result = sceua(
            |x: &Array1<f64>| x.iter().map(|v| v * v).sum(),
            &lb,
            &ub,
            &config,
            &mut rng,
        );
        assert!(result.best_f < 2.0, "best_f was {}", result.best_f);
        assert!(result.n_evals > 0);
    }

    #[test]
    fn test_select_simplex_returns_distinct_indices() {
        let mut rng = StdRandomGenerator::new(StdRng::seed_from_u64(1));
        let lcs = select_simplex(4, 9, &mut rng);
        assert_eq!(lcs.len(), 4);
        let mut sorted = lcs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
        assert!(lcs.iter().all(|&i| i < 9));
    }
}
