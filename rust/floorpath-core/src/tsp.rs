//! Traveling-salesman solving for destination ordering.
//!
//! The tour always starts at index 0 and ends at index `n - 1`; only
//! the middle indices are free to reorder. Solver strategy scales with
//! `n` so a storeful of destinations never blows up factorial search:
//! exact search below `tsp_exact_threshold`, beam search of shrinking
//! width through `tsp_wide_beam_threshold` and `tsp_narrow_beam_threshold`,
//! and plain greedy nearest-neighbor beyond that.

use tracing::debug;

use crate::config::RouteConfig;

/// Picks a tour of `0..matrix.len()` starting at `0` and ending at
/// `matrix.len() - 1`, minimizing the sum of `matrix[tour[i]][tour[i+1]]`.
pub fn solve(matrix: &[Vec<f64>], config: &RouteConfig) -> Vec<usize> {
    let n = matrix.len();
    match n {
        0 => Vec::new(),
        1 => vec![0],
        2 => vec![0, 1],
        _ if n <= config.tsp_exact_threshold => {
            debug!(n, strategy = "factorial", "tsp solver dispatch");
            factorial_solve(matrix)
        }
        _ if n <= config.tsp_wide_beam_threshold => {
            debug!(n, strategy = "beam", beam_width = config.tsp_wide_beam_width, "tsp solver dispatch");
            beam_solve(matrix, config.tsp_wide_beam_width)
        }
        _ if n <= config.tsp_narrow_beam_threshold => {
            debug!(n, strategy = "beam", beam_width = config.tsp_narrow_beam_width, "tsp solver dispatch");
            beam_solve(matrix, config.tsp_narrow_beam_width)
        }
        _ => {
            debug!(n, strategy = "greedy", "tsp solver dispatch");
            greedy_solve(matrix)
        }
    }
}

fn factorial_solve(matrix: &[Vec<f64>]) -> Vec<usize> {
    let n = matrix.len();
    let end = n - 1;
    let middle: Vec<usize> = (1..end).collect();
    let mut visited = vec![false; middle.len()];
    let mut current = vec![0usize];
    let mut best_dist = f64::INFINITY;
    let mut best_path: Option<Vec<usize>> = None;

    recurse(matrix, &middle, &mut visited, &mut current, 0.0, end, &mut best_dist, &mut best_path);

    best_path.unwrap_or_else(|| vec![0, end])
}

#[allow(clippy::too_many_arguments)]
fn recurse(
    matrix: &[Vec<f64>],
    middle: &[usize],
    visited: &mut [bool],
    current: &mut Vec<usize>,
    dist_so_far: f64,
    end: usize,
    best_dist: &mut f64,
    best_path: &mut Option<Vec<usize>>,
) {
    if dist_so_far >= *best_dist {
        return;
    }
    if current.len() == middle.len() + 1 {
        let total = dist_so_far + matrix[*current.last().unwrap()][end];
        if total < *best_dist {
            *best_dist = total;
            let mut full = current.clone();
            full.push(end);
            *best_path = Some(full);
        }
        return;
    }
    for (idx, &node) in middle.iter().enumerate() {
        if visited[idx] {
            continue;
        }
        visited[idx] = true;
        let last = *current.last().unwrap();
        current.push(node);
        recurse(matrix, middle, visited, current, dist_so_far + matrix[last][node], end, best_dist, best_path);
        current.pop();
        visited[idx] = false;
    }
}

#[derive(Clone)]
struct Partial {
    path: Vec<usize>,
    visited: Vec<bool>,
    dist: f64,
}

fn beam_solve(matrix: &[Vec<f64>], beam_width: usize) -> Vec<usize> {
    let n = matrix.len();
    let end = n - 1;
    let middle: Vec<usize> = (1..end).collect();

    let mut beam = vec![Partial { path: vec![0], visited: vec![false; middle.len()], dist: 0.0 }];

    for _ in 0..middle.len() {
        let mut candidates = Vec::new();
        for p in &beam {
            let last = *p.path.last().unwrap();
            for (idx, &node) in middle.iter().enumerate() {
                if p.visited[idx] {
                    continue;
                }
                let mut visited = p.visited.clone();
                visited[idx] = true;
                let mut path = p.path.clone();
                path.push(node);
                candidates.push(Partial { path, visited, dist: p.dist + matrix[last][node] });
            }
        }
        candidates.sort_by(|a, b| a.dist.partial_cmp(&b.dist).unwrap());
        candidates.truncate(beam_width);
        beam = candidates;
    }

    beam.into_iter()
        .map(|p| {
            let total = p.dist + matrix[*p.path.last().unwrap()][end];
            let mut path = p.path;
            path.push(end);
            (path, total)
        })
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
        .map(|(path, _)| path)
        .unwrap_or_else(|| vec![0, end])
}

fn greedy_solve(matrix: &[Vec<f64>]) -> Vec<usize> {
    let n = matrix.len();
    let end = n - 1;
    let mut visited = vec![false; n];
    visited[0] = true;
    visited[end] = true;

    let mut path = vec![0];
    let mut current = 0;
    for _ in 0..n.saturating_sub(2) {
        let mut best = None;
        let mut best_dist = f64::INFINITY;
        for candidate in 1..end {
            if visited[candidate] {
                continue;
            }
            if matrix[current][candidate] < best_dist {
                best_dist = matrix[current][candidate];
                best = Some(candidate);
            }
        }
        let next = best.expect("unvisited destination must exist while candidates remain");
        visited[next] = true;
        path.push(next);
        current = next;
    }
    path.push(end);
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Distances between `n` colinear points spaced 10 apart, so the
    /// unique optimal tour visiting all of them between fixed endpoints
    /// 0 and n-1 is simply the identity order.
    fn colinear_matrix(n: usize) -> Vec<Vec<f64>> {
        (0..n).map(|i| (0..n).map(|j| (i as f64 - j as f64).abs() * 10.0).collect()).collect()
    }

    fn tour_length(matrix: &[Vec<f64>], tour: &[usize]) -> f64 {
        tour.windows(2).map(|w| matrix[w[0]][w[1]]).sum()
    }

    #[test]
    fn trivial_sizes_return_identity() {
        let cfg = RouteConfig::default();
        assert_eq!(solve(&[], &cfg), Vec::<usize>::new());
        assert_eq!(solve(&[vec![0.0]], &cfg), vec![0]);
        assert_eq!(solve(&colinear_matrix(2), &cfg), vec![0, 1]);
    }

    #[test]
    fn factorial_solver_finds_the_colinear_optimum() {
        let matrix = colinear_matrix(6);
        let cfg = RouteConfig::default();
        let tour = solve(&matrix, &cfg);
        assert_eq!(tour, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(tour_length(&matrix, &tour), 50.0);
    }

    #[test]
    fn beam_solver_is_selected_and_finds_the_colinear_optimum() {
        let mut cfg = RouteConfig::default();
        cfg.tsp_exact_threshold = 5;
        let matrix = colinear_matrix(12);
        let tour = beam_solve(&matrix, cfg.tsp_wide_beam_width);
        assert_eq!(tour_length(&matrix, &tour), tour_length(&matrix, &(0..12).collect::<Vec<_>>()));
    }

    #[test]
    fn greedy_solver_is_selected_for_large_instances() {
        let cfg = RouteConfig::default();
        let matrix = colinear_matrix(55);
        let tour = solve(&matrix, &cfg);
        assert_eq!(tour.first(), Some(&0));
        assert_eq!(tour.last(), Some(&54));
        assert_eq!(tour.len(), 55);
    }

    #[test]
    fn strategy_dispatch_respects_configured_thresholds() {
        let mut cfg = RouteConfig::default();
        cfg.tsp_exact_threshold = 3;
        cfg.tsp_wide_beam_threshold = 4;
        cfg.tsp_narrow_beam_threshold = 5;
        let matrix = colinear_matrix(5);
        let tour = solve(&matrix, &cfg);
        assert_eq!(tour.len(), 5);
        assert_eq!(tour.first(), Some(&0));
        assert_eq!(tour.last(), Some(&4));
    }

    #[test]
    fn every_middle_index_appears_exactly_once() {
        let matrix = colinear_matrix(9);
        let cfg = RouteConfig::default();
        let tour = solve(&matrix, &cfg);
        let mut sorted = tour.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..9).collect::<Vec<_>>());
    }
}
