use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use ndarray::Array2;

use crate::grouping::domain::clusterer::{ensure_square, Clusterer, ClusteringError};

/// Splits at distance zero (duplicate embeddings) would give an infinite
/// density level; clamping keeps the stability arithmetic finite.
const MIN_SPLIT_DISTANCE: f64 = 1e-12;

/// Density-hierarchy clusterer with excess-of-mass cluster selection.
///
/// The HDBSCAN construction over a precomputed distance matrix: core
/// distances → mutual reachability → minimum spanning tree →
/// single-linkage dendrogram → condensed tree at `min_cluster_size` →
/// stability-based selection. The root cluster is never selected, so
/// inputs with no internal density structure (e.g. one tight pair plus
/// an outlier) come back entirely as noise.
pub struct HierarchyClusterer {
    min_cluster_size: usize,
    min_samples: usize,
}

impl HierarchyClusterer {
    pub fn new(min_cluster_size: usize, min_samples: usize) -> Self {
        Self {
            min_cluster_size: min_cluster_size.max(2),
            min_samples: min_samples.max(1),
        }
    }
}

impl Clusterer for HierarchyClusterer {
    fn cluster(&self, distances: &Array2<f64>) -> Result<Vec<i32>, ClusteringError> {
        let n = ensure_square(distances)?;
        if n == 0 {
            return Ok(Vec::new());
        }
        if n < self.min_cluster_size {
            return Ok(vec![-1; n]);
        }

        let core = core_distances(distances, self.min_samples);
        let mst = prim_mst(distances, &core);
        let dendrogram = single_linkage(&mst, n);
        let condensed = condense_tree(&dendrogram, n, self.min_cluster_size);
        let selected = select_excess_of_mass(&condensed, n);
        Ok(assign_labels(&condensed, &selected, n))
    }
}

/// Distance from each point to its `min_samples`-th nearest neighbor,
/// counting the point itself as the first.
fn core_distances(distances: &Array2<f64>, min_samples: usize) -> Vec<f64> {
    let n = distances.nrows();
    (0..n)
        .map(|i| {
            if min_samples <= 1 {
                return 0.0;
            }
            let mut others: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| distances[[i, j]])
                .collect();
            others.sort_by(|a, b| a.total_cmp(b));
            let k = (min_samples - 2).min(others.len().saturating_sub(1));
            others.get(k).copied().unwrap_or(0.0)
        })
        .collect()
}

/// Prim's MST over the complete mutual-reachability graph,
/// `mreach(a, b) = max(core_a, core_b, d(a, b))`. O(n²), which is fine
/// for per-image detection counts. Ties resolve to the lowest index so
/// the tree is deterministic.
fn prim_mst(distances: &Array2<f64>, core: &[f64]) -> Vec<(usize, usize, f64)> {
    let n = distances.nrows();
    let mreach = |a: usize, b: usize| distances[[a, b]].max(core[a]).max(core[b]);

    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut src = vec![0usize; n];
    in_tree[0] = true;
    for j in 1..n {
        best[j] = mreach(0, j);
    }

    let mut edges = Vec::with_capacity(n.saturating_sub(1));
    for _ in 1..n {
        let mut next = None;
        for j in 0..n {
            if !in_tree[j] && next.map_or(true, |k: usize| best[j] < best[k]) {
                next = Some(j);
            }
        }
        let Some(j) = next else { break };
        edges.push((src[j], j, best[j]));
        in_tree[j] = true;
        for k in 0..n {
            if !in_tree[k] {
                let w = mreach(j, k);
                if w < best[k] {
                    best[k] = w;
                    src[k] = j;
                }
            }
        }
    }
    edges
}

/// One merge in the single-linkage dendrogram. Node ids: leaves are
/// `0..n`, internal nodes are `n + k` for the k-th merge.
struct DendroNode {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

fn node_size(nodes: &[DendroNode], n: usize, id: usize) -> usize {
    if id < n {
        1
    } else {
        nodes[id - n].size
    }
}

/// Find root with path halving.
fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

/// Merge MST edges in ascending weight order into a dendrogram.
fn single_linkage(mst: &[(usize, usize, f64)], n: usize) -> Vec<DendroNode> {
    let mut edges = mst.to_vec();
    edges.sort_by(|a, b| a.2.total_cmp(&b.2).then(a.0.cmp(&b.0)).then(a.1.cmp(&b.1)));

    let mut parent: Vec<usize> = (0..n).collect();
    let mut comp_node: Vec<usize> = (0..n).collect();
    let mut nodes: Vec<DendroNode> = Vec::with_capacity(n.saturating_sub(1));

    for (a, b, w) in edges {
        let ra = find(&mut parent, a);
        let rb = find(&mut parent, b);
        if ra == rb {
            continue;
        }
        let left = comp_node[ra];
        let right = comp_node[rb];
        let size = node_size(&nodes, n, left) + node_size(&nodes, n, right);
        nodes.push(DendroNode {
            left,
            right,
            distance: w,
            size,
        });
        parent[ra] = rb;
        comp_node[rb] = n + nodes.len() - 1;
    }
    nodes
}

/// One row of the condensed tree: `child` (a point id `< n` or a cluster
/// id `>= n`) detaches from cluster `parent` at density level `lambda`.
struct CondensedEdge {
    parent: usize,
    child: usize,
    lambda: f64,
    size: usize,
}

fn lambda_of(distance: f64) -> f64 {
    1.0 / distance.max(MIN_SPLIT_DISTANCE)
}

fn leaves_under(nodes: &[DendroNode], n: usize, id: usize, out: &mut Vec<usize>) {
    if id < n {
        out.push(id);
        return;
    }
    let node = &nodes[id - n];
    leaves_under(nodes, n, node.left, out);
    leaves_under(nodes, n, node.right, out);
}

/// Walk the dendrogram top-down, keeping only splits where both sides
/// reach `min_cluster_size`. Smaller sides fall out as points at the
/// split's lambda; a single surviving side keeps its parent's cluster
/// identity. Cluster ids start at `n` (the root).
fn condense_tree(nodes: &[DendroNode], n: usize, min_cluster_size: usize) -> Vec<CondensedEdge> {
    let mut edges = Vec::new();
    if nodes.is_empty() {
        return edges;
    }

    let root = n + nodes.len() - 1;
    let mut relabel: HashMap<usize, usize> = HashMap::new();
    relabel.insert(root, n);
    let mut next_cluster = n + 1;

    let mut queue = VecDeque::from([root]);
    while let Some(node_id) = queue.pop_front() {
        let cluster = relabel[&node_id];
        let node = &nodes[node_id - n];
        let lambda = lambda_of(node.distance);
        let left_size = node_size(nodes, n, node.left);
        let right_size = node_size(nodes, n, node.right);

        match (left_size >= min_cluster_size, right_size >= min_cluster_size) {
            (true, true) => {
                for (child, size) in [(node.left, left_size), (node.right, right_size)] {
                    let id = next_cluster;
                    next_cluster += 1;
                    relabel.insert(child, id);
                    edges.push(CondensedEdge {
                        parent: cluster,
                        child: id,
                        lambda,
                        size,
                    });
                    // size >= min_cluster_size >= 2, so the child is internal
                    queue.push_back(child);
                }
            }
            (false, false) => {
                let mut points = Vec::new();
                leaves_under(nodes, n, node.left, &mut points);
                leaves_under(nodes, n, node.right, &mut points);
                for p in points {
                    edges.push(CondensedEdge {
                        parent: cluster,
                        child: p,
                        lambda,
                        size: 1,
                    });
                }
            }
            (left_big, _) => {
                let (big, small) = if left_big {
                    (node.left, node.right)
                } else {
                    (node.right, node.left)
                };
                relabel.insert(big, cluster);
                queue.push_back(big);
                let mut points = Vec::new();
                leaves_under(nodes, n, small, &mut points);
                for p in points {
                    edges.push(CondensedEdge {
                        parent: cluster,
                        child: p,
                        lambda,
                        size: 1,
                    });
                }
            }
        }
    }
    edges
}

/// Stability-based excess-of-mass selection over the condensed tree.
///
/// Bottom-up: a cluster survives if its own stability beats the summed
/// stability of its child clusters; a surviving cluster deselects every
/// descendant. The root (cluster id `n`) is always excluded.
fn select_excess_of_mass(edges: &[CondensedEdge], n: usize) -> BTreeSet<usize> {
    let mut birth: HashMap<usize, f64> = HashMap::new();
    birth.insert(n, 0.0);
    let mut children: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for e in edges {
        if e.child >= n {
            birth.insert(e.child, e.lambda);
            children.entry(e.parent).or_default().push(e.child);
        }
    }

    let mut stability: HashMap<usize, f64> = HashMap::new();
    for e in edges {
        let b = birth.get(&e.parent).copied().unwrap_or(0.0);
        *stability.entry(e.parent).or_insert(0.0) += (e.lambda - b) * e.size as f64;
    }

    let mut is_cluster: BTreeMap<usize, bool> =
        stability.keys().map(|&c| (c, c != n)).collect();

    // Children always carry larger ids than their parent, so descending
    // id order is a bottom-up traversal.
    let mut ids: Vec<usize> = stability.keys().copied().filter(|&c| c != n).collect();
    ids.sort_unstable_by(|a, b| b.cmp(a));

    for c in ids {
        let child_sum: f64 = children
            .get(&c)
            .map(|cs| {
                cs.iter()
                    .map(|x| stability.get(x).copied().unwrap_or(0.0))
                    .sum()
            })
            .unwrap_or(0.0);
        let own = stability.get(&c).copied().unwrap_or(0.0);
        if child_sum > own {
            is_cluster.insert(c, false);
            stability.insert(c, child_sum);
        } else {
            let mut stack: Vec<usize> = children.get(&c).cloned().unwrap_or_default();
            while let Some(d) = stack.pop() {
                is_cluster.insert(d, false);
                if let Some(cs) = children.get(&d) {
                    stack.extend(cs.iter().copied());
                }
            }
        }
    }

    is_cluster
        .into_iter()
        .filter_map(|(c, keep)| keep.then_some(c))
        .collect()
}

/// Label each point by the unique selected cluster on its path to the
/// root, or `-1` when none of its ancestors was selected. Final ids are
/// assigned in ascending cluster-id order, so output is deterministic.
fn assign_labels(edges: &[CondensedEdge], selected: &BTreeSet<usize>, n: usize) -> Vec<i32> {
    let label_of: HashMap<usize, i32> = selected
        .iter()
        .enumerate()
        .map(|(k, &c)| (c, k as i32))
        .collect();

    let mut cluster_parent: HashMap<usize, usize> = HashMap::new();
    let mut point_parent: HashMap<usize, usize> = HashMap::new();
    for e in edges {
        if e.child >= n {
            cluster_parent.insert(e.child, e.parent);
        } else {
            point_parent.insert(e.child, e.parent);
        }
    }

    (0..n)
        .map(|p| {
            let mut c = match point_parent.get(&p) {
                Some(&c) => c,
                None => return -1,
            };
            loop {
                if let Some(&l) = label_of.get(&c) {
                    return l;
                }
                match cluster_parent.get(&c) {
                    Some(&up) => c = up,
                    None => return -1,
                }
            }
        })
        .collect()
}
