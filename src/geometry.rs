use crate::boundary::{StreamRule, classify};
use crate::lattice::{D2Q9, Grid};

/// Per-cell geometry encoding: two 8-bit masks where bit k controls moving
/// direction k + 1. The bit pair selects the streaming rule for that
/// direction (see [`classify`]); a cell with both masks zero is inactive
/// and skipped by every phase.
#[derive(Debug, Clone)]
pub struct GeometryMask {
    grid: Grid,
    pub mask1: Vec<u8>,
    pub mask2: Vec<u8>,
}

impl GeometryMask {
    /// All cells inactive.
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            mask1: vec![0; grid.cells()],
            mask2: vec![0; grid.cells()],
        }
    }

    /// Closed domain: interior couplings stream, directions leaving the
    /// grid are flagged category A. Pairs with a wall operator (bounce-back,
    /// specular) for a box, or with `Periodic` for a fully periodic domain.
    pub fn walled_box(grid: Grid) -> Self {
        Self::with_edge_rule(grid, StreamRule::BoundaryA)
    }

    /// Interior couplings stream; directions leaving the grid get
    /// `edge_rule`.
    pub fn with_edge_rule(grid: Grid, edge_rule: StreamRule) -> Self {
        let mut masks = Self::new(grid);
        for cell in 0..grid.cells() {
            for dir in 1..D2Q9::Q {
                let rule = if neighbor_in_grid(&grid, cell, dir) {
                    StreamRule::StreamIn
                } else {
                    edge_rule
                };
                masks.set_rule(cell, dir, rule);
            }
        }
        masks
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Set the streaming rule for one (cell, direction).
    pub fn set_rule(&mut self, cell: usize, dir: usize, rule: StreamRule) {
        let bit = 1u8 << (dir - 1);
        let (m1, m2) = match rule {
            StreamRule::PassThrough => (false, false),
            StreamRule::StreamIn => (true, false),
            StreamRule::BoundaryA => (false, true),
            StreamRule::BoundaryB => (true, true),
        };
        if m1 {
            self.mask1[cell] |= bit;
        } else {
            self.mask1[cell] &= !bit;
        }
        if m2 {
            self.mask2[cell] |= bit;
        } else {
            self.mask2[cell] &= !bit;
        }
    }

    pub fn rule(&self, cell: usize, dir: usize) -> StreamRule {
        classify(self.mask1[cell], self.mask2[cell], dir)
    }

    /// Remove a cell from the simulation entirely.
    pub fn deactivate(&mut self, cell: usize) {
        self.mask1[cell] = 0;
        self.mask2[cell] = 0;
    }

    #[inline]
    pub fn is_active(&self, cell: usize) -> bool {
        self.mask1[cell] != 0 || self.mask2[cell] != 0
    }

    pub fn active_cells(&self) -> usize {
        (0..self.grid.cells()).filter(|&c| self.is_active(c)).count()
    }
}

/// True 2D adjacency test used when building masks; distinct from the flat
/// neighbor arithmetic, which cannot see row edges.
fn neighbor_in_grid(grid: &Grid, cell: usize, dir: usize) -> bool {
    let x = (cell % grid.lx) as i64 + D2Q9::EX[dir - 1] as i64;
    let y = (cell / grid.lx) as i64 + D2Q9::EY[dir - 1] as i64;
    x >= 0 && x < grid.lx as i64 && y >= 0 && y < grid.ly as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walled_box_flags_edges_and_streams_interior() {
        let grid = Grid::new(4, 4);
        let masks = GeometryMask::walled_box(grid);

        // center cell streams in every direction
        let center = 5; // (1, 1)
        for dir in 1..D2Q9::Q {
            assert_eq!(masks.rule(center, dir), StreamRule::StreamIn);
        }

        // bottom-left corner: S, W and the three outward diagonals hit the edge
        let corner = 0;
        for dir in [3, 4, 6, 7, 8] {
            assert_eq!(masks.rule(corner, dir), StreamRule::BoundaryA);
        }
        for dir in [1, 2, 5] {
            assert_eq!(masks.rule(corner, dir), StreamRule::StreamIn);
        }

        // east-edge cell must not silently stream east even though the flat
        // index would wrap to the next row
        let east_edge = 7; // (3, 1)
        assert_eq!(masks.rule(east_edge, 1), StreamRule::BoundaryA);
        assert!(grid.neighbor(east_edge, 1).is_some());
    }

    #[test]
    fn set_rule_round_trips_every_variant() {
        let grid = Grid::new(2, 2);
        let mut masks = GeometryMask::new(grid);
        for rule in [
            StreamRule::StreamIn,
            StreamRule::BoundaryA,
            StreamRule::BoundaryB,
            StreamRule::PassThrough,
        ] {
            masks.set_rule(0, 5, rule);
            assert_eq!(masks.rule(0, 5), rule);
        }
    }

    #[test]
    fn inactive_cells_are_reported() {
        let grid = Grid::new(3, 3);
        let mut masks = GeometryMask::walled_box(grid);
        assert_eq!(masks.active_cells(), 9);
        masks.deactivate(4);
        assert!(!masks.is_active(4));
        assert_eq!(masks.active_cells(), 8);
    }
}
