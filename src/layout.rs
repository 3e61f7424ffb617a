//! Spring layout for the co-authorship graph.
//!
//! Fruchterman & Reingold (1991): every pair of nodes repels with k²/d,
//! every edge attracts with d²/k, and a linearly cooling temperature caps
//! each step. The result is centred on the origin and scaled into [-1, 1].

use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Upper bound on force iterations
    pub iterations: usize,
    /// Seed for the random starting positions; `None` draws from entropy
    pub seed: Option<u64>,
    /// Stop once the mean displacement per node falls below this
    pub threshold: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            iterations: 50,
            seed: None,
            threshold: 1e-4,
        }
    }
}

const MIN_DISTANCE: f64 = 0.01;

/// Positions indexed by `NodeIndex::index()`.
pub fn spring_layout<N, E>(graph: &UnGraph<N, E>, config: &LayoutConfig) -> Vec<Position> {
    let n = graph.node_count();
    if n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return vec![Position::default()];
    }

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut pos: Vec<Position> = (0..n)
        .map(|_| Position::new(rng.gen::<f64>(), rng.gen::<f64>()))
        .collect();

    let k = (1.0 / n as f64).sqrt();
    let mut temperature = extent(&pos) * 0.1;
    let cooling = temperature / (config.iterations as f64 + 1.0);

    for _ in 0..config.iterations {
        let mut disp = vec![(0.0_f64, 0.0_f64); n];

        // Repulsion between all pairs
        for i in 0..n {
            for j in (i + 1)..n {
                let dx = pos[i].x - pos[j].x;
                let dy = pos[i].y - pos[j].y;
                let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
                let force = k * k / (dist * dist);
                disp[i].0 += dx * force;
                disp[i].1 += dy * force;
                disp[j].0 -= dx * force;
                disp[j].1 -= dy * force;
            }
        }

        // Attraction along edges
        for edge in graph.edge_references() {
            let (i, j) = (edge.source().index(), edge.target().index());
            if i == j {
                continue;
            }
            let dx = pos[i].x - pos[j].x;
            let dy = pos[i].y - pos[j].y;
            let dist = (dx * dx + dy * dy).sqrt().max(MIN_DISTANCE);
            let force = dist / k;
            disp[i].0 -= dx * force;
            disp[i].1 -= dy * force;
            disp[j].0 += dx * force;
            disp[j].1 += dy * force;
        }

        let mut moved = 0.0_f64;
        for (p, (fx, fy)) in pos.iter_mut().zip(disp) {
            let mut length = (fx * fx + fy * fy).sqrt();
            if length < MIN_DISTANCE {
                length = 0.1;
            }
            let sx = fx * temperature / length;
            let sy = fy * temperature / length;
            p.x += sx;
            p.y += sy;
            moved += sx * sx + sy * sy;
        }

        temperature -= cooling;
        if moved.sqrt() / (n as f64) < config.threshold {
            break;
        }
    }

    rescale(&mut pos);
    pos
}

fn extent(pos: &[Position]) -> f64 {
    let span = |coord: fn(&Position) -> f64| {
        let lo = pos.iter().map(coord).fold(f64::INFINITY, f64::min);
        let hi = pos.iter().map(coord).fold(f64::NEG_INFINITY, f64::max);
        hi - lo
    };
    span(|p| p.x).max(span(|p| p.y))
}

/// Centre on the origin and scale so the furthest coordinate is ±1.
fn rescale(pos: &mut [Position]) {
    let n = pos.len() as f64;
    let mean_x = pos.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = pos.iter().map(|p| p.y).sum::<f64>() / n;

    let mut limit: f64 = 0.0;
    for p in pos.iter_mut() {
        p.x -= mean_x;
        p.y -= mean_y;
        limit = limit.max(p.x.abs()).max(p.y.abs());
    }

    if limit > 0.0 {
        for p in pos.iter_mut() {
            p.x /= limit;
            p.y /= limit;
        }
    }
}
