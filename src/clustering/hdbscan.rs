//! HDBSCAN clustering
//!
//! Steps:
//! 1. Compute core distances (distance to the `min_samples`-th nearest
//!    point, the point itself included)
//! 2. Mutual reachability: MR(a,b) = max(core(a), core(b), dist(a,b))
//! 3. Minimum spanning tree of the mutual reachability graph (Prim)
//! 4. Single-linkage hierarchy from the sorted MST edges (union-find)
//! 5. Condensed tree with `min_cluster_size`
//! 6. Excess-of-mass cluster selection; the root is never selected

use crate::error::{ExomapError, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

/// Parameters for HDBSCAN clustering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HdbscanParams {
    /// Minimum number of points to form a cluster
    pub min_cluster_size: usize,
    /// Neighbourhood size for core distances; defaults to `min_cluster_size`
    pub min_samples: Option<usize>,
}

impl HdbscanParams {
    pub fn new(min_cluster_size: usize) -> Self {
        Self {
            min_cluster_size,
            min_samples: None,
        }
    }

    pub fn with_min_samples(mut self, samples: usize) -> Self {
        self.min_samples = Some(samples);
        self
    }

    fn effective_min_samples(&self) -> usize {
        self.min_samples.unwrap_or(self.min_cluster_size).max(1)
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_cluster_size < 2 {
            return Err(ExomapError::invalid_parameter(
                "min_cluster_size",
                self.min_cluster_size,
                "must be >= 2",
            ));
        }
        if self.min_samples == Some(0) {
            return Err(ExomapError::invalid_parameter("min_samples", 0, "must be >= 1"));
        }
        Ok(())
    }
}

/// Labels and per-cluster stability from a fit
#[derive(Debug, Clone)]
pub struct HdbscanResult {
    /// Cluster per point, -1 for noise
    pub labels: Vec<i32>,
    /// Stability of each selected cluster, indexed by label
    pub stabilities: Vec<f64>,
}

impl HdbscanResult {
    pub fn n_clusters(&self) -> usize {
        self.stabilities.len()
    }

    pub fn n_noise(&self) -> usize {
        self.labels.iter().filter(|&&l| l < 0).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Child {
    Point(usize),
    Cluster(usize),
}

/// One row of the condensed tree
#[derive(Debug, Clone, Copy)]
struct CondensedEdge {
    parent: usize,
    child: Child,
    lambda: f64,
    size: usize,
}

/// Merge in the single-linkage hierarchy
#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// HDBSCAN clusterer
pub struct Hdbscan {
    params: HdbscanParams,
}

impl Hdbscan {
    pub fn new(params: HdbscanParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HdbscanParams {
        &self.params
    }

    pub fn fit(&self, x: &Array2<f64>) -> Result<HdbscanResult> {
        self.params.validate()?;
        let n = x.nrows();
        let mcs = self.params.min_cluster_size;

        if n < mcs {
            return Err(ExomapError::InsufficientData {
                required: mcs,
                actual: n,
            });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ExomapError::ClusteringError(
                "coordinates contain non-finite values".to_string(),
            ));
        }

        let core = core_distances(x, self.params.effective_min_samples());
        let mst = minimum_spanning_tree(x, &core);
        let hierarchy = single_linkage(&mst, n);
        let condensed = condense(&hierarchy, n, mcs);
        let (labels, stabilities) = select_and_label(&condensed, n);

        debug!(
            points = n,
            min_cluster_size = mcs,
            condensed_rows = condensed.len(),
            clusters = stabilities.len(),
            "HDBSCAN fit complete"
        );

        Ok(HdbscanResult { labels, stabilities })
    }
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Distance to the k-th nearest point, counting the point itself
fn core_distances(x: &Array2<f64>, min_samples: usize) -> Vec<f64> {
    let n = x.nrows();
    let kth = min_samples.min(n) - 1;

    (0..n)
        .into_par_iter()
        .map(|i| {
            let row = x.row(i);
            let mut dists: Vec<f64> = (0..n).map(|j| distance(row, x.row(j))).collect();
            let (_, kth_value, _) = dists.select_nth_unstable_by(kth, |a, b| a.total_cmp(b));
            *kth_value
        })
        .collect()
}

/// Prim's algorithm over the implicit mutual reachability graph.
///
/// Returns edges sorted by weight: (node_a, node_b, weight)
fn minimum_spanning_tree(x: &Array2<f64>, core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = x.nrows();
    let mut edges = Vec::with_capacity(n.saturating_sub(1));
    if n < 2 {
        return edges;
    }

    let mut in_tree = vec![false; n];
    let mut min_dist = vec![f64::INFINITY; n];
    let mut min_edge = vec![0usize; n];
    let mut current = 0;
    in_tree[0] = true;

    for _ in 1..n {
        let row = x.row(current);
        let core_current = core[current];
        let mut next = usize::MAX;
        let mut next_dist = f64::INFINITY;

        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let mr = distance(row, x.row(j)).max(core_current).max(core[j]);
            if mr < min_dist[j] {
                min_dist[j] = mr;
                min_edge[j] = current;
            }
            if min_dist[j] < next_dist {
                next_dist = min_dist[j];
                next = j;
            }
        }

        if next == usize::MAX {
            break;
        }
        in_tree[next] = true;
        edges.push((min_edge[next], next, next_dist));
        current = next;
    }

    edges.sort_by(|a, b| a.2.total_cmp(&b.2));
    edges
}

fn find(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }
    let mut node = i;
    while parent[node] != root {
        let next = parent[node];
        parent[node] = root;
        node = next;
    }
    root
}

/// Merges in ascending distance order; merge `m` creates node `n + m`
fn single_linkage(mst: &[(usize, usize, f64)], n: usize) -> Vec<Merge> {
    let total = 2 * n - 1;
    let mut parent: Vec<usize> = (0..total).collect();
    let mut size = vec![1usize; total];
    let mut merges = Vec::with_capacity(mst.len());

    for (m, &(a, b, distance)) in mst.iter().enumerate() {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        let node = n + m;
        parent[ra] = node;
        parent[rb] = node;
        size[node] = size[ra] + size[rb];
        merges.push(Merge {
            left: ra,
            right: rb,
            distance,
            size: size[node],
        });
    }
    merges
}

/// Points under a hierarchy node
fn leaves(merges: &[Merge], n: usize, node: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![node];
    while let Some(v) = stack.pop() {
        if v < n {
            out.push(v);
        } else {
            let m = &merges[v - n];
            stack.push(m.left);
            stack.push(m.right);
        }
    }
    out
}

fn node_size(merges: &[Merge], n: usize, node: usize) -> usize {
    if node < n {
        1
    } else {
        merges[node - n].size
    }
}

/// Walk the hierarchy breadth-first; splits where both sides reach
/// `min_cluster_size` open new clusters, everything else sheds points.
/// Cluster ids follow the walk, left child before right.
fn condense(merges: &[Merge], n: usize, min_cluster_size: usize) -> Vec<CondensedEdge> {
    let mut rows = Vec::new();
    if merges.is_empty() {
        return rows;
    }

    let root = n + merges.len() - 1;
    let mut next_cluster = 1;
    // (hierarchy node, cluster it belongs to); the root is cluster 0
    let mut queue = VecDeque::from([(root, 0usize)]);

    while let Some((node, cluster)) = queue.pop_front() {
        if node < n {
            continue;
        }
        let merge = merges[node - n];
        let lambda = 1.0 / merge.distance.max(1e-12);
        let left_size = node_size(merges, n, merge.left);
        let right_size = node_size(merges, n, merge.right);
        let left_big = left_size >= min_cluster_size;
        let right_big = right_size >= min_cluster_size;

        let shed = |side: usize, rows: &mut Vec<CondensedEdge>| {
            for p in leaves(merges, n, side) {
                rows.push(CondensedEdge {
                    parent: cluster,
                    child: Child::Point(p),
                    lambda,
                    size: 1,
                });
            }
        };

        match (left_big, right_big) {
            (true, true) => {
                for (side, side_size) in [(merge.left, left_size), (merge.right, right_size)] {
                    let id = next_cluster;
                    next_cluster += 1;
                    rows.push(CondensedEdge {
                        parent: cluster,
                        child: Child::Cluster(id),
                        lambda,
                        size: side_size,
                    });
                    queue.push_back((side, id));
                }
            }
            (false, false) => {
                shed(merge.left, &mut rows);
                shed(merge.right, &mut rows);
            }
            (true, false) => {
                shed(merge.right, &mut rows);
                queue.push_back((merge.left, cluster));
            }
            (false, true) => {
                shed(merge.left, &mut rows);
                queue.push_back((merge.right, cluster));
            }
        }
    }
    rows
}

/// Excess-of-mass selection, then label each point with its nearest
/// selected ancestor. Returns (labels, stability per label).
fn select_and_label(rows: &[CondensedEdge], n: usize) -> (Vec<i32>, Vec<f64>) {
    let n_clusters = rows
        .iter()
        .filter_map(|r| match r.child {
            Child::Cluster(c) => Some(c + 1),
            Child::Point(_) => None,
        })
        .max()
        .unwrap_or(1);

    let mut birth = vec![0.0f64; n_clusters];
    let mut parent_of = vec![usize::MAX; n_clusters];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n_clusters];
    for r in rows {
        if let Child::Cluster(c) = r.child {
            birth[c] = r.lambda;
            parent_of[c] = r.parent;
            children[r.parent].push(c);
        }
    }

    let mut stability = vec![0.0f64; n_clusters];
    for r in rows {
        stability[r.parent] += (r.lambda - birth[r.parent]) * r.size as f64;
    }

    // Children always have larger ids than their parent
    let mut selected = vec![false; n_clusters];
    let mut subtree = stability.clone();
    for c in (1..n_clusters).rev() {
        let child_total: f64 = children[c].iter().map(|&k| subtree[k]).sum();
        if children[c].is_empty() || stability[c] >= child_total {
            selected[c] = true;
            let mut stack = children[c].clone();
            while let Some(d) = stack.pop() {
                selected[d] = false;
                stack.extend_from_slice(&children[d]);
            }
            subtree[c] = stability[c];
        } else {
            subtree[c] = child_total;
        }
    }

    let mut label_of = vec![-1i32; n_clusters];
    let mut stabilities = Vec::new();
    for c in 0..n_clusters {
        if selected[c] {
            label_of[c] = stabilities.len() as i32;
            stabilities.push(stability[c]);
        }
    }

    let mut labels = vec![-1i32; n];
    for r in rows {
        if let Child::Point(p) = r.child {
            let mut c = r.parent;
            while c != 0 && !selected[c] {
                c = parent_of[c];
            }
            labels[p] = if c == 0 { -1 } else { label_of[c] };
        }
    }
    (labels, stabilities)
}
