//! Incremental force-directed layout.
//!
//! Every pair of nodes repels with `repulsion / d²`, every edge acts as a spring towards
//! the ideal length, and velocities are damped and clamped each step. Nodes already placed
//! keep their state when the edge set grows; new nodes are dropped in at random around
//! the viewport center.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use std::sync::Arc;

use super::graph::{package_of, DependencyEdge};
use crate::config::LayoutConfig;

const DEFAULT_PACKAGE: &str = "default";
const MIN_VIEWPORT: f64 = 100.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn distance(self, other: Vec2) -> f64 {
        (self - other).length()
    }

    /// Same direction, length at most `max`.
    pub fn clamp_length(self, max: f64) -> Vec2 {
        let length = self.length();
        if length > max && length > 0.0 {
            self * (max / length)
        } else {
            self
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl SubAssign for Vec2 {
    fn sub_assign(&mut self, rhs: Vec2) {
        self.x -= rhs.x;
        self.y -= rhs.y;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl PackageColor {
    /// Pastel color for a package; stable for a given `seed` and package name.
    pub fn for_package(package: &str, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed ^ stable_hash(package));
        Self {
            r: rng.gen_range(150..230),
            g: rng.gen_range(150..230),
            b: rng.gen_range(150..230),
        }
    }
}

/// FNV-1a; `DefaultHasher` output is not guaranteed across releases.
fn stable_hash(text: &str) -> u64 {
    text.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPhase {
    Idle,
    Running,
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(MIN_VIEWPORT),
            height: height.max(MIN_VIEWPORT),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }
}

/// What the renderer needs for one frame.
#[derive(Debug, Clone)]
pub struct LayoutFrame {
    pub positions: Arc<HashMap<String, Vec2>>,
    pub colors: Arc<HashMap<String, PackageColor>>,
    pub phase: LayoutPhase,
    pub iteration: usize,
    /// Size of the edge set the frame was computed from.
    pub edges: usize,
}

impl LayoutFrame {
    pub fn settled(&self) -> bool {
        self.phase == LayoutPhase::Settled
    }
}

impl Default for LayoutFrame {
    fn default() -> Self {
        Self {
            positions: Arc::default(),
            colors: Arc::default(),
            phase: LayoutPhase::Idle,
            iteration: 0,
            edges: 0,
        }
    }
}

pub struct LayoutEngine {
    config: LayoutConfig,
    viewport: Viewport,
    rng: StdRng,
    names: Vec<String>,
    index: HashMap<String, usize>,
    positions: Vec<Vec2>,
    velocities: Vec<Vec2>,
    springs: Vec<(usize, usize)>,
    colors: Arc<HashMap<String, PackageColor>>,
    package_colors: HashMap<String, PackageColor>,
    edge_count: usize,
    phase: LayoutPhase,
    iteration: usize,
    last_movement: f64,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            viewport: Viewport::new(config.viewport_width, config.viewport_height),
            config,
            rng,
            names: Vec::new(),
            index: HashMap::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
            springs: Vec::new(),
            colors: Arc::default(),
            package_colors: HashMap::new(),
            edge_count: 0,
            phase: LayoutPhase::Idle,
            iteration: 0,
            last_movement: 0.0,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn phase(&self) -> LayoutPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.phase == LayoutPhase::Running
    }

    pub fn is_settled(&self) -> bool {
        self.phase == LayoutPhase::Settled
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn node_count(&self) -> usize {
        self.names.len()
    }

    /// Total displacement of the last step.
    pub fn last_movement(&self) -> f64 {
        self.last_movement
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = Viewport::new(width, height);
    }

    pub fn position(&self, class: &str) -> Option<Vec2> {
        self.index.get(class).map(|&i| self.positions[i])
    }

    pub fn velocity(&self, class: &str) -> Option<Vec2> {
        self.index.get(class).map(|&i| self.velocities[i])
    }

    pub fn color(&self, class: &str) -> Option<PackageColor> {
        self.colors.get(class).copied()
    }

    pub fn positions(&self) -> HashMap<String, Vec2> {
        self.names
            .iter()
            .cloned()
            .zip(self.positions.iter().copied())
            .collect()
    }

    pub fn frame(&self) -> LayoutFrame {
        LayoutFrame {
            positions: Arc::new(self.positions()),
            colors: Arc::clone(&self.colors),
            phase: self.phase,
            iteration: self.iteration,
            edges: self.edge_count,
        }
    }

    /// Replaces the edge set and restarts the simulation.
    ///
    /// Classes still present keep position and velocity, new classes are seeded at
    /// random, and classes no longer present are dropped.
    pub fn update_edges<'a, I>(&mut self, edges: I)
    where
        I: IntoIterator<Item = &'a DependencyEdge>,
        I::IntoIter: Clone,
    {
        let edges = edges.into_iter();
        let mut edge_count = 0;
        let mut classes: BTreeSet<&str> = BTreeSet::new();
        for edge in edges.clone() {
            edge_count += 1;
            classes.insert(edge.source.as_str());
            classes.insert(edge.target.as_str());
        }

        let mut names = Vec::with_capacity(classes.len());
        let mut index = HashMap::with_capacity(classes.len());
        let mut positions = Vec::with_capacity(classes.len());
        let mut velocities = Vec::with_capacity(classes.len());

        for class in classes {
            let known = self.index.get(class).copied();
            let (position, velocity) = match known {
                Some(old) => (self.positions[old], self.velocities[old]),
                None => (self.seed_position(), Vec2::ZERO),
            };
            index.insert(class.to_string(), names.len());
            names.push(class.to_string());
            positions.push(position);
            velocities.push(velocity);
        }

        self.springs = edges
            .filter_map(|edge| Some((*index.get(&edge.source)?, *index.get(&edge.target)?)))
            .filter(|(source, target)| source != target)
            .collect();
        self.names = names;
        self.index = index;
        self.positions = positions;
        self.velocities = velocities;
        self.edge_count = edge_count;
        self.assign_colors();

        self.iteration = 0;
        self.phase = if self.names.is_empty() {
            LayoutPhase::Idle
        } else {
            LayoutPhase::Running
        };
    }

    /// Forgets every node and returns to `Idle`.
    pub fn reset(&mut self) {
        self.update_edges(std::iter::empty());
        self.package_colors.clear();
    }

    /// Halts stepping without touching positions.
    pub fn stop(&mut self) {
        if self.phase == LayoutPhase::Running {
            self.phase = LayoutPhase::Settled;
        }
    }

    /// Advances one step while running. Returns whether anything moved.
    pub fn tick(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        self.step();
        true
    }

    /// Runs one integration step regardless of phase and returns the total movement.
    pub fn step(&mut self) -> f64 {
        let forces = self.forces();
        let center = self.viewport.center();
        let half_extent = Vec2::new(
            self.viewport.width * self.config.bounds_factor,
            self.viewport.height * self.config.bounds_factor,
        );
        let min = center - half_extent;
        let max = center + half_extent;

        let mut movement = 0.0;
        for (i, force) in forces.into_iter().enumerate() {
            let velocity = ((self.velocities[i] + force) * self.config.damping)
                .clamp_length(self.config.max_velocity);
            let mut position = self.positions[i] + velocity;
            movement += velocity.length();

            // f64::clamp panics on an inverted range
            let clamped = Vec2::new(
                position.x.max(min.x).min(max.x),
                position.y.max(min.y).min(max.y),
            );
            if clamped != position {
                position = clamped;
                self.velocities[i] = Vec2::ZERO;
            } else {
                self.velocities[i] = velocity;
            }
            self.positions[i] = position;
        }

        self.iteration += 1;
        self.last_movement = movement;
        if self.phase == LayoutPhase::Running
            && (movement < self.config.settle_threshold
                || self.iteration >= self.config.max_iterations)
        {
            self.phase = LayoutPhase::Settled;
        }
        movement
    }

    /// Runs until settled or the iteration budget is spent; returns the steps taken.
    pub fn run_to_settle(&mut self) -> usize {
        let start = self.iteration;
        while self.tick() {}
        self.iteration - start
    }

    fn forces(&self) -> Vec<Vec2> {
        let n = self.positions.len();
        let mut forces = vec![Vec2::ZERO; n];
        let floor = self.config.min_distance;

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = self.positions[i] - self.positions[j];
                let raw = delta.length();
                let direction = if raw > 0.0 {
                    delta * (1.0 / raw)
                } else {
                    coincident_direction(i, j)
                };
                let distance = raw.max(floor);
                let push = direction * (self.config.repulsion / (distance * distance));
                forces[i] += push;
                forces[j] -= push;
            }
        }

        let ideal = self.config.ideal_length();
        for &(source, target) in &self.springs {
            let delta = self.positions[source] - self.positions[target];
            let distance = delta.length().max(floor);
            let direction = delta * (1.0 / distance);
            let pull = direction * (self.config.spring * (distance - ideal));
            forces[source] -= pull;
            forces[target] += pull;
        }

        forces
    }

    fn seed_position(&mut self) -> Vec2 {
        let center = self.viewport.center();
        let spread = self.config.spread_factor;
        Vec2::new(
            center.x + (self.rng.gen::<f64>() - 0.5) * self.viewport.width * spread,
            center.y + (self.rng.gen::<f64>() - 0.5) * self.viewport.height * spread,
        )
    }

    fn assign_colors(&mut self) {
        let seed = self.config.color_seed;
        let mut colors = HashMap::with_capacity(self.names.len());
        for name in &self.names {
            let package = package_of(name).unwrap_or(DEFAULT_PACKAGE);
            let color = *self
                .package_colors
                .entry(package.to_string())
                .or_insert_with(|| PackageColor::for_package(package, seed));
            colors.insert(name.clone(), color);
        }
        self.colors = Arc::new(colors);
    }
}

/// Fixed separation direction for nodes sitting on the same spot.
fn coincident_direction(i: usize, j: usize) -> Vec2 {
    let angle = ((i * 31 + j * 17) % 360) as f64 * std::f64::consts::PI / 180.0;
    Vec2::new(angle.cos(), angle.sin())
}
