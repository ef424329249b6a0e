//! Covariance kernels for the Gaussian-process surrogate: Matern(nu=5/2)
//! and squared-exponential (RBF), both with a scalar signal variance and
//! either an isotropic or per-dimension length scale.

use ndarray::{Array1, Array2};

use crate::helpers::linalg::cross_euclidean_distances_as_array;

/// Length scale, either one value shared by every input dimension
/// (isotropic) or one per dimension (anisotropic).
#[derive(Debug, Clone)]
pub enum LengthScale {
    Isotropic(f64),
    Anisotropic(Array1<f64>),
}

impl LengthScale {
    pub fn as_vec(&self, d: usize) -> Array1<f64> {
        match self {
            LengthScale::Isotropic(l) => Array1::from_elem(d, *l),
            LengthScale::Anisotropic(v) => v.clone(),
        }
    }
}

fn scaled_squared_distances(a: &Array2<f64>, b: &Array2<f64>, length_scale: &Array1<f64>) -> Array2<f64> {
    let scale = |m: &Array2<f64>| {
        let mut out = m.clone();
        for mut row in out.rows_mut() {
            for (v, &l) in row.iter_mut().zip(length_scale.iter()) {
                *v /= l;
            }
        }
        out
    };
    cross_euclidean_distances_as_array(&scale(a), &scale(b))
}

#[derive(Debug, Clone)]
pub enum Kernel {
    /// Matern covariance with smoothness `nu = 5/2`.
    Matern52 { length_scale: LengthScale },
    /// Squared-exponential (radial basis function) covariance.
    Rbf { length_scale: LengthScale },
}

impl Kernel {
    /// Covariance matrix (signal variance 1) between rows of `a` and `b`.
    pub fn covariance(&self, a: &Array2<f64>, b: &Array2<f64>) -> Array2<f64> {
        let d = a.ncols();
        match self {
            Kernel::Matern52 { length_scale } => {
                let r2 = scaled_squared_distances(a, b, &length_scale.as_vec(d));
                r2.mapv(|r2| {
                    let r = r2.max(0.0).sqrt();
                    let sqrt5_r = 5.0_f64.sqrt() * r;
                    (1.0 + sqrt5_r + 5.0 / 3.0 * r2) * (-sqrt5_r).exp()
                })
            }
            Kernel::Rbf { length_scale } => {
                let r2 = scaled_squared_distances(a, b, &length_scale.as_vec(d));
                r2.mapv(|r2| (-0.5 * r2).exp())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_matern52_diagonal_is_one() {
        let kernel = Kernel::Matern52 {
            length_scale: LengthScale::Isotropic(0.5),
        };
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let k = kernel.covariance(&x, &x);
        assert!((k[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((k[[1, 1]] - 1.0).abs() < 1e-12);
        assert!(k[[0, 1]] < 1.0);
        assert_eq!(k[[0, 1]], k[[1, 0]]);
    }

    #[test]
    fn test_rbf_decays_with_distance() {
        let kernel = Kernel::Rbf {
            length_scale: LengthScale::Isotropic(1.0),
        };
        let x = array![[0.0, 0.0]];
        let near = array![[0.1, 0.0]];
        let far = array![[5.0, 0.0]];
        let k_near = kernel.covariance(&x, &near)[[0, 0]];
        let k_far = kernel.covariance(&x, &far)[[0, 0]];
        assert!(k_near > k_far);
    }

    #[test]
    fn test_anisotropic_length_scale_applies_per_dimension() {
        let kernel = Kernel::Rbf {
            length_scale: LengthScale::Anisotropic(array![1.0, 100.0]),
        };
        let x = array![[0.0, 0.0]];
        let moved_in_stretched_dim = array![[0.0, 10.0]];
        let moved_in_tight_dim = array![[10.0, 0.0]];
        let k_stretched = kernel.covariance(&x, &moved_in_stretched_dim)[[0, 0]];
        let k_tight = kernel.covariance(&x, &moved_in_tight_dim)[[0, 0]];
        assert!(k_stretched > k_tight);
    }
}
