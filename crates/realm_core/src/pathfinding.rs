//! Grid-based pathfinding using a bounded A* search.
//!
//! Movement is 4-directional with unit cost. The search expands at most a
//! fixed number of nodes; when the budget runs out it heads for the
//! explored node closest to the goal. Ties are broken on coordinates, so
//! the chosen step is identical on every run.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

use crate::action::Direction;
use crate::math::Position;

/// Walkability lookup for a square grid, row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavGrid {
    size: i32,
    cells: Vec<bool>,
}

impl NavGrid {
    /// A grid with every cell blocked.
    #[must_use]
    pub fn new(size: i32) -> Self {
        let size = size.max(0);
        Self {
            size,
            cells: vec![false; (size as usize) * (size as usize)],
        }
    }

    /// Side length.
    #[must_use]
    pub const fn size(&self) -> i32 {
        self.size
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub const fn in_bounds(&self, pos: Position) -> bool {
        pos.row >= 0 && pos.col >= 0 && pos.row < self.size && pos.col < self.size
    }

    #[inline]
    fn index(&self, pos: Position) -> usize {
        (pos.row as usize) * (self.size as usize) + (pos.col as usize)
    }

    /// Whether an agent may stand at `pos`. Out of bounds is not walkable.
    #[must_use]
    pub fn is_walkable(&self, pos: Position) -> bool {
        self.in_bounds(pos) && self.cells[self.index(pos)]
    }

    /// Set walkability. Returns `false` if out of bounds.
    pub fn set_walkable(&mut self, pos: Position, walkable: bool) -> bool {
        if self.in_bounds(pos) {
            let index = self.index(pos);
            self.cells[index] = walkable;
            true
        } else {
            false
        }
    }
}

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
struct AStarNode {
    pos: Position,
    f_score: i32,
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on f_score, then lower coordinates first.
        match other.f_score.cmp(&self.f_score) {
            Ordering::Equal => other.pos.cmp(&self.pos),
            ord => ord,
        }
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// First step from `start` toward `goal`.
///
/// The goal itself need not be walkable (agents path toward water or an
/// occupied tile); every intermediate tile must be. Returns `None` when
/// already at the goal or when no walkable neighbor makes progress.
#[must_use]
pub fn next_step(grid: &NavGrid, start: Position, goal: Position, budget: u32) -> Option<Direction> {
    if start == goal {
        return None;
    }

    let mut open_set: BinaryHeap<AStarNode> = BinaryHeap::new();
    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut g_score: HashMap<Position, i32> = HashMap::new();

    g_score.insert(start, 0);
    open_set.push(AStarNode {
        pos: start,
        f_score: start.manhattan(goal),
    });

    let mut best = start;
    let mut best_h = start.manhattan(goal);
    let mut expansions = 0u32;

    while let Some(current) = open_set.pop() {
        if current.pos == goal {
            best = goal;
            break;
        }
        if expansions >= budget {
            break;
        }
        expansions += 1;

        let current_g = g_score.get(&current.pos).copied().unwrap_or(i32::MAX);
        for direction in Direction::ALL {
            let next = current.pos.offset(direction.delta());
            if next != goal && !grid.is_walkable(next) {
                continue;
            }

            let tentative_g = current_g + 1;
            let neighbor_g = g_score.get(&next).copied().unwrap_or(i32::MAX);
            if tentative_g < neighbor_g {
                came_from.insert(next, current.pos);
                g_score.insert(next, tentative_g);

                let h = next.manhattan(goal);
                if h < best_h || (h == best_h && next < best) {
                    best = next;
                    best_h = h;
                }
                open_set.push(AStarNode {
                    pos: next,
                    f_score: tentative_g + h,
                });
            }
        }
    }

    first_step(&came_from, start, best)
}

/// Walk the came-from chain back to the node adjacent to `start`.
fn first_step(
    came_from: &HashMap<Position, Position>,
    start: Position,
    end: Position,
) -> Option<Direction> {
    let mut current = end;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            return Direction::between(start, current);
        }
        current = prev;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(size: i32) -> NavGrid {
        let mut grid = NavGrid::new(size);
        for row in 0..size {
            for col in 0..size {
                grid.set_walkable(Position::new(row, col), true);
            }
        }
        grid
    }

    #[test]
    fn test_straight_line() {
        let grid = open_grid(10);
        let step = next_step(&grid, Position::new(5, 2), Position::new(5, 8), 64);
        assert_eq!(step, Some(Direction::East));
        let step = next_step(&grid, Position::new(5, 5), Position::new(1, 5), 64);
        assert_eq!(step, Some(Direction::North));
    }

    #[test]
    fn test_at_goal() {
        let grid = open_grid(4);
        assert_eq!(next_step(&grid, Position::new(1, 1), Position::new(1, 1), 64), None);
    }

    #[test]
    fn test_routes_around_wall() {
        let mut grid = open_grid(10);
        // Wall at col 5 from row 0 to row 8, gap at row 9.
        for row in 0..9 {
            grid.set_walkable(Position::new(row, 5), false);
        }
        let mut pos = Position::new(0, 3);
        let goal = Position::new(0, 7);
        for _ in 0..40 {
            let Some(step) = next_step(&grid, pos, goal, 256) else {
                break;
            };
            pos = pos.offset(step.delta());
            assert!(grid.is_walkable(pos));
        }
        assert_eq!(pos, goal);
    }

    #[test]
    fn test_boxed_in_has_no_step() {
        let mut grid = open_grid(5);
        for direction in Direction::ALL {
            grid.set_walkable(Position::new(2, 2).offset(direction.delta()), false);
        }
        assert_eq!(next_step(&grid, Position::new(2, 2), Position::new(0, 0), 64), None);
    }

    #[test]
    fn test_budget_exhaustion_still_makes_progress() {
        let grid = open_grid(64);
        let start = Position::new(0, 0);
        let goal = Position::new(60, 60);
        let step = next_step(&grid, start, goal, 4).expect("partial path");
        assert!(start.offset(step.delta()).manhattan(goal) < start.manhattan(goal));
    }

    #[test]
    fn test_pathfinding_determinism() {
        let grid = open_grid(32);
        let first = next_step(&grid, Position::new(3, 3), Position::new(20, 25), 64);
        for _ in 0..10 {
            assert_eq!(next_step(&grid, Position::new(3, 3), Position::new(20, 25), 64), first);
        }
    }
}
