//! Exact k-nearest-neighbour graph shared by UMAP and t-SNE

use crate::utils::SimdOps;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A neighbor entry for the heap (max-heap by distance for eviction)
#[derive(Clone, Copy)]
struct Neighbor {
    index: usize,
    distance: f64,
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .partial_cmp(&other.distance)
            .unwrap_or(Ordering::Equal)
            .then(self.index.cmp(&other.index))
    }
}

/// Neighbour lists sorted by ascending Euclidean distance, self excluded
#[derive(Debug, Clone)]
pub struct KnnGraph {
    pub indices: Vec<Vec<usize>>,
    pub distances: Vec<Vec<f64>>,
}

impl KnnGraph {
    /// Brute-force k-NN, parallel over query points.
    ///
    /// `k` is capped at `n - 1`.
    pub fn build(data: &[Vec<f64>], k: usize) -> Self {
        let n = data.len();
        let k = k.min(n.saturating_sub(1));

        let (indices, distances) = (0..n)
            .into_par_iter()
            .map(|i| {
                let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);

                for j in 0..n {
                    if i == j {
                        continue;
                    }
                    let distance = SimdOps::euclidean_distance(&data[i], &data[j]);
                    let candidate = Neighbor { index: j, distance };

                    if heap.len() < k {
                        heap.push(candidate);
                    } else if let Some(top) = heap.peek() {
                        if candidate < *top {
                            heap.pop();
                            heap.push(candidate);
                        }
                    }
                }

                let neighbors = heap.into_sorted_vec();
                (
                    neighbors.iter().map(|nb| nb.index).collect::<Vec<_>>(),
                    neighbors.iter().map(|nb| nb.distance).collect::<Vec<_>>(),
                )
            })
            .unzip();

        Self { indices, distances }
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Neighbours per point
    pub fn k(&self) -> usize {
        self.indices.first().map(Vec::len).unwrap_or(0)
    }
}

/// Index of the point in `candidates` closest to `query`
pub fn nearest_among(data: &[Vec<f64>], query: &[f64], candidates: &[usize]) -> Option<usize> {
    candidates
        .iter()
        .map(|&c| (c, SimdOps::squared_euclidean_distance(query, &data[c])))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(c, _)| c)
}
