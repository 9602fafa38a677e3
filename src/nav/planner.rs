//! Stateless A* over a [`NavigationGrid`].
//!
//! Costs are fixed-point (10 straight, 14 diagonal) with an octile
//! heuristic. Per-search bookkeeping lives in a flat arena indexed by cell
//! index, so parent links are plain integers. Hitting the expansion or
//! retrace cap is reported as an ordinary "no path".

use std::collections::{HashSet, VecDeque};

use bracket_geometry::prelude::Point;
use log::{debug, warn};

use crate::{config::SearchLimits, geom::WorldPoint};

use super::{DIAGONAL_COST, NavigationGrid, STRAIGHT_COST};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NoPathReason {
    GridUnavailable,
    Unreachable,
    ExpansionLimit,
    RetraceLimit,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    /// Cells after the start, ending at the goal.
    pub cells: Vec<Point>,
    pub waypoints: Vec<WorldPoint>,
}

impl Path {
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PathResult {
    Found(Path),
    NoPath(NoPathReason),
}

impl PathResult {
    pub fn is_found(&self) -> bool {
        matches!(self, PathResult::Found(_))
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            PathResult::Found(path) => Some(path),
            PathResult::NoPath(_) => None,
        }
    }

    pub fn into_waypoints(self) -> Option<Vec<WorldPoint>> {
        match self {
            PathResult::Found(path) => Some(path.waypoints),
            PathResult::NoPath(_) => None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
struct SearchNode {
    g: i32,
    h: i32,
    parent: Option<usize>,
}

impl SearchNode {
    const UNSEEN: SearchNode = SearchNode {
        g: i32::MAX,
        h: 0,
        parent: None,
    };

    fn f(&self) -> i32 {
        self.g.saturating_add(self.h)
    }
}

pub fn octile_distance(a: Point, b: Point) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    DIAGONAL_COST * dx.min(dy) + STRAIGHT_COST * (dx - dy).abs()
}

#[derive(Clone, Debug, Default)]
pub struct PathPlanner {
    limits: SearchLimits,
}

impl PathPlanner {
    pub fn new(limits: SearchLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &SearchLimits {
        &self.limits
    }

    pub fn find_path(&self, grid: &NavigationGrid, start: WorldPoint, goal: WorldPoint) -> PathResult {
        let (Some(start_cell), Some(goal_cell)) =
            (grid.cell_from_world(start), grid.cell_from_world(goal))
        else {
            return PathResult::NoPath(NoPathReason::GridUnavailable);
        };
        self.find_cell_path(grid, start_cell, goal_cell)
    }

    pub fn find_cell_path(&self, grid: &NavigationGrid, start: Point, goal: Point) -> PathResult {
        let (Some(start_idx), Some(_)) = (grid.index_of(start), grid.index_of(goal)) else {
            return PathResult::NoPath(NoPathReason::GridUnavailable);
        };

        let goal = if grid.is_walkable(goal) {
            goal
        } else {
            self.nearest_walkable(grid, goal).unwrap_or_else(|| {
                warn!(
                    "no walkable cell within {} steps of goal ({}, {})",
                    self.limits.goal_fallback_expansions, goal.x, goal.y
                );
                goal
            })
        };
        let Some(goal_idx) = grid.index_of(goal) else {
            return PathResult::NoPath(NoPathReason::GridUnavailable);
        };

        let cell_count = grid.cells().len();
        let mut nodes = vec![SearchNode::UNSEEN; cell_count];
        let mut in_open = vec![false; cell_count];
        let mut open: Vec<usize> = Vec::new();
        let mut closed: HashSet<usize> = HashSet::new();

        nodes[start_idx] = SearchNode {
            g: 0,
            h: octile_distance(start, goal),
            parent: None,
        };
        open.push(start_idx);
        in_open[start_idx] = true;

        let mut expansions = 0;
        while !open.is_empty() {
            let mut best = 0;
            for slot in 1..open.len() {
                let candidate = &nodes[open[slot]];
                let current = &nodes[open[best]];
                if candidate.f() < current.f()
                    || (candidate.f() == current.f() && candidate.h < current.h)
                {
                    best = slot;
                }
            }
            let current = open.swap_remove(best);
            in_open[current] = false;

            if current == goal_idx {
                return self.retrace(grid, &nodes, start_idx, goal_idx);
            }

            expansions += 1;
            if expansions > self.limits.max_expansions {
                debug!(
                    "search from ({}, {}) aborted after {} expansions",
                    start.x, start.y, self.limits.max_expansions
                );
                return PathResult::NoPath(NoPathReason::ExpansionLimit);
            }
            closed.insert(current);

            let coord = grid.cells()[current].coord;
            for (next, step) in grid.neighbors(coord) {
                let Some(next_idx) = grid.index_of(next) else {
                    continue;
                };
                if closed.contains(&next_idx) {
                    continue;
                }
                let tentative = nodes[current].g + step;
                if tentative < nodes[next_idx].g {
                    nodes[next_idx] = SearchNode {
                        g: tentative,
                        h: octile_distance(next, goal),
                        parent: Some(current),
                    };
                    if !in_open[next_idx] {
                        in_open[next_idx] = true;
                        open.push(next_idx);
                    }
                }
            }
        }

        PathResult::NoPath(NoPathReason::Unreachable)
    }

    fn retrace(
        &self,
        grid: &NavigationGrid,
        nodes: &[SearchNode],
        start_idx: usize,
        goal_idx: usize,
    ) -> PathResult {
        let cells = grid.cells();
        let mut trail = Vec::new();
        let mut cursor = goal_idx;
        while cursor != start_idx {
            if trail.len() >= self.limits.max_retrace {
                debug!("retrace exceeded {} steps", self.limits.max_retrace);
                return PathResult::NoPath(NoPathReason::RetraceLimit);
            }
            trail.push(cursor);
            match nodes[cursor].parent {
                Some(parent) => cursor = parent,
                None => return PathResult::NoPath(NoPathReason::Unreachable),
            }
        }
        trail.reverse();

        PathResult::Found(Path {
            cells: trail.iter().map(|&idx| cells[idx].coord).collect(),
            waypoints: trail.iter().map(|&idx| cells[idx].world).collect(),
        })
    }

    /// Breadth-first ring search outward from an unwalkable cell.
    pub fn nearest_walkable(&self, grid: &NavigationGrid, from: Point) -> Option<Point> {
        let mut queue = VecDeque::from([from]);
        let mut seen = HashSet::from([from]);
        let mut expansions = 0;
        while let Some(cell) = queue.pop_front() {
            if grid.is_walkable(cell) {
                return Some(cell);
            }
            expansions += 1;
            if expansions > self.limits.goal_fallback_expansions {
                return None;
            }
            for (dx, dy) in super::STEPS {
                let next = Point::new(cell.x + dx, cell.y + dy);
                if grid.in_grid(next) && seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        None
    }
}
