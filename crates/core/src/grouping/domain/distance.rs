use ndarray::Array2;

/// Pairwise distance metric between embedding vectors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistanceMetric {
    Euclidean,
    Cosine,
}

impl DistanceMetric {
    /// Distance between two vectors of equal length.
    ///
    /// Cosine distance is `1 - cos(a, b)`; a zero vector is treated as
    /// maximally dissimilar (distance `1.0`) so degenerate embeddings
    /// never produce NaN.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| {
                    let d = *x as f64 - *y as f64;
                    d * d
                })
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Cosine => {
                let dot: f64 = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| (*x as f64) * (*y as f64))
                    .sum();
                let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
                let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

/// Square, symmetric, zero-diagonal matrix of pairwise distances.
pub fn pairwise_distances(features: &[Vec<f32>], metric: DistanceMetric) -> Array2<f64> {
    let n = features.len();
    let mut matrix = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let d = metric.distance(&features[i], &features[j]);
            matrix[[i, j]] = d;
            matrix[[j, i]] = d;
        }
    }
    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_euclidean_distance() {
        let d = DistanceMetric::Euclidean.distance(&[0.0, 0.0], &[3.0, 4.0]);
        assert_relative_eq!(d, 5.0);
    }

    #[test]
    fn test_euclidean_identical_is_zero() {
        let v = vec![1.0, 2.0, 3.0];
        assert_relative_eq!(DistanceMetric::Euclidean.distance(&v, &v), 0.0);
    }

    #[test]
    fn test_cosine_identical_is_zero() {
        let v = vec![0.6, 0.8];
        assert_relative_eq!(DistanceMetric::Cosine.distance(&v, &v), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cosine_orthogonal_is_one() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[0.0, 1.0]);
        assert_relative_eq!(d, 1.0);
    }

    #[test]
    fn test_cosine_opposite_is_two() {
        let d = DistanceMetric::Cosine.distance(&[1.0, 0.0], &[-1.0, 0.0]);
        assert_relative_eq!(d, 2.0);
    }

    #[test]
    fn test_cosine_zero_vector_is_max_dissimilar() {
        let d = DistanceMetric::Cosine.distance(&[0.0, 0.0], &[1.0, 0.0]);
        assert_relative_eq!(d, 1.0);
    }

    #[test]
    fn test_cosine_scale_invariant() {
        let a = vec![1.0, 2.0];
        let b = vec![10.0, 20.0];
        assert_relative_eq!(DistanceMetric::Cosine.distance(&a, &b), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pairwise_matrix_properties() {
        let features = vec![vec![0.0, 0.0], vec![3.0, 4.0], vec![6.0, 8.0]];
        let m = pairwise_distances(&features, DistanceMetric::Euclidean);

        assert_eq!(m.shape(), &[3, 3]);
        for i in 0..3 {
            assert_relative_eq!(m[[i, i]], 0.0);
            for j in 0..3 {
                assert_relative_eq!(m[[i, j]], m[[j, i]]);
            }
        }
        assert_relative_eq!(m[[0, 1]], 5.0);
        assert_relative_eq!(m[[0, 2]], 10.0);
        assert_relative_eq!(m[[1, 2]], 5.0);
    }

    #[test]
    fn test_pairwise_empty() {
        let m = pairwise_distances(&[], DistanceMetric::Cosine);
        assert_eq!(m.shape(), &[0, 0]);
    }
}
