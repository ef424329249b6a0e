//! Fast non-dominated sorting and crowding distance — the two core NSGA-II
//! metrics used both by the inner evolutionary kernel (component D) and by
//! the epoch driver's resample selection (component G).

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::genetic::Population;

/// Returns `true` when `p` dominates `q` under minimization: `p` is no worse
/// than `q` in every objective and strictly better in at least one. Equal
/// vectors do not dominate each other (the strict definition; see DESIGN.md
/// for why this crate does not follow the original system's weaker
/// `sum(p > q) == 0` test).
pub fn dominates(p: ArrayView1<f64>, q: ArrayView1<f64>) -> bool {
    let mut strictly_better = false;
    for (&pi, &qi) in p.iter().zip(q.iter()) {
        if pi > qi {
            return false;
        }
        if pi < qi {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Partitions `n` individuals (rows of `fitness`) into successive
/// non-domination fronts. Returns one `Vec<usize>` of row indices per front,
/// front 0 first.
pub fn fast_non_dominated_sort(fitness: ArrayView2<f64>) -> Vec<Vec<usize>> {
    let n = fitness.nrows();
    if n == 0 {
        return Vec::new();
    }

    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];

    for p in 0..n {
        for q in 0..n {
            if p == q {
                continue;
            }
            if dominates(fitness.row(p), fitness.row(q)) {
                dominated_by[p].push(q);
            } else if dominates(fitness.row(q), fitness.row(p)) {
                domination_count[p] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&p| domination_count[p] == 0).collect();

    while !current.is_empty() {
        let mut next = Vec::new();
        for &p in &current {
            for &q in &dominated_by[p] {
                domination_count[q] -= 1;
                if domination_count[q] == 0 {
                    next.push(q);
                }
            }
        }
        fronts.push(current);
        current = next;
    }

    fronts
}

/// Crowding distance over a single front's objective rows. Boundary points
/// get `f64::INFINITY`. When the front has fewer than two members, or any
/// objective's range across the front is zero, every member gets `1.0`
/// (matching the degenerate case the original system falls back to, rather
/// than `+infinity`).
pub fn crowding_distance(front_fitness: ArrayView2<f64>) -> Array1<f64> {
    let n = front_fitness.nrows();
    if n == 0 {
        return Array1::zeros(0);
    }
    if n == 1 {
        return Array1::from_elem(1, 1.0);
    }
    let m = front_fitness.ncols();

    let mut ranges = vec![0.0f64; m];
    for j in 0..m {
        let col = front_fitness.column(j);
        let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        ranges[j] = max - min;
    }
    if ranges.iter().any(|&r| r == 0.0) {
        return Array1::from_elem(n, 1.0);
    }

    let mut distance = vec![0.0f64; n];
    for j in 0..m {
        let col = front_fitness.column(j);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| col[a].partial_cmp(&col[b]).unwrap());

        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;

        for k in 1..n - 1 {
            let prev = col[order[k - 1]];
            let next = col[order[k + 1]];
            distance[order[k]] += (next - prev) / ranges[j];
        }
    }

    Array1::from_vec(distance)
}

/// Splits a population into per-rank fronts and sets `rank` on the returned
/// population rows. Front 0 is the current Pareto front of the whole set.
pub fn build_fronts(population: &Population) -> Vec<Population> {
    let index_fronts = fast_non_dominated_sort(population.fitness.view());
    let mut rank = vec![0usize; population.len()];
    for (r, front) in index_fronts.iter().enumerate() {
        for &idx in front {
            rank[idx] = r;
        }
    }

    index_fronts
        .into_iter()
        .map(|indices| {
            let mut front_pop = population.selected(&indices);
            let front_ranks: Vec<usize> = indices.iter().map(|&i| rank[i]).collect();
            front_pop.set_rank(Array1::from_vec(front_ranks));
            front_pop
        })
        .collect()
}
