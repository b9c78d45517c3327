use ndarray::Array2;
use thiserror::Error;

use crate::shared::constants::NOISE_LABEL;

#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("distance matrix is not square: {rows}x{cols}")]
    NotSquare { rows: usize, cols: usize },
}

/// Domain interface for density-based clustering over a precomputed
/// distance matrix.
///
/// Returns one cluster id per row: `-1` for noise, otherwise a small
/// non-negative integer with no externally meaningful order. Output is
/// deterministic for identical input.
pub trait Clusterer: Send + Sync {
    fn cluster(&self, distances: &Array2<f64>) -> Result<Vec<i32>, ClusteringError>;
}

/// Map a numeric cluster id to its stable per-request label string.
pub fn cluster_label(id: i32) -> String {
    if id < 0 {
        NOISE_LABEL.to_string()
    } else {
        format!("cluster_{id}")
    }
}

pub(crate) fn ensure_square(distances: &Array2<f64>) -> Result<usize, ClusteringError> {
    let (rows, cols) = distances.dim();
    if rows != cols {
        return Err(ClusteringError::NotSquare { rows, cols });
    }
    Ok(rows)
}
