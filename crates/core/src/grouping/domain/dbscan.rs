use std::collections::VecDeque;

use ndarray::Array2;

use crate::grouping::domain::clusterer::{ensure_square, Clusterer, ClusteringError};

const UNCLASSIFIED: i32 = -2;
const NOISE: i32 = -1;

/// DBSCAN over a precomputed distance matrix.
///
/// A point is core when at least `min_samples` points (itself included)
/// lie within `eps`, inclusive. Clusters are grown by breadth-first
/// expansion from core points in ascending index order, so the id
/// assignment is deterministic.
pub struct DbscanClusterer {
    eps: f64,
    min_samples: usize,
}

impl DbscanClusterer {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    fn neighbors(&self, distances: &Array2<f64>, i: usize) -> Vec<usize> {
        let n = distances.nrows();
        // Embeddings are f32, so distances carry only f32 precision;
        // comparing in f64 would push a pair at exactly eps (for eps
        // values like 0.3 with no exact binary form) just past the
        // bound. Compare at the features' precision instead.
        let eps = self.eps as f32;
        (0..n)
            .filter(|&j| distances[[i, j]] as f32 <= eps)
            .collect()
    }
}

impl Clusterer for DbscanClusterer {
    fn cluster(&self, distances: &Array2<f64>) -> Result<Vec<i32>, ClusteringError> {
        let n = ensure_square(distances)?;
        let mut labels = vec![UNCLASSIFIED; n];
        let mut cluster_id = 0;

        for i in 0..n {
            if labels[i] != UNCLASSIFIED {
                continue;
            }
            let seeds = self.neighbors(distances, i);
            if seeds.len() < self.min_samples {
                labels[i] = NOISE;
                continue;
            }

            labels[i] = cluster_id;
            let mut queue: VecDeque<usize> = seeds.into_iter().collect();
            while let Some(j) = queue.pop_front() {
                if labels[j] == NOISE {
                    // Border point previously dismissed; claim it.
                    labels[j] = cluster_id;
                }
                if labels[j] != UNCLASSIFIED {
                    continue;
                }
                labels[j] = cluster_id;
                let reach = self.neighbors(distances, j);
                if reach.len() >= self.min_samples {
                    queue.extend(reach);
                }
            }
            cluster_id += 1;
        }

        Ok(labels)
    }
}
