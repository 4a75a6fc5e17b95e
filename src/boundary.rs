use anyhow::{Result, bail};

use crate::Float;
use crate::config::BoundaryKind;
use crate::lattice::{D2Q9, Grid, global_idx};

/// Per-(cell, direction) streaming decision decoded from the two geometry
/// mask bits. Direction 0 (rest) is never classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamRule {
    /// Keep this cell's own previous value in this direction
    PassThrough,
    /// Pull the upstream neighbor's previous value plus the forcing term
    StreamIn,
    /// Apply the category-A boundary operator
    BoundaryA,
    /// Apply the category-B boundary operator
    BoundaryB,
}

/// Decode the mask bits of `dir` (1..=8): bit `dir - 1` of each mask.
#[inline]
pub fn classify(mask1: u8, mask2: u8, dir: usize) -> StreamRule {
    let bit = dir - 1;
    match ((mask1 >> bit) & 1, (mask2 >> bit) & 1) {
        (0, 0) => StreamRule::PassThrough,
        (1, 0) => StreamRule::StreamIn,
        (0, 1) => StreamRule::BoundaryA,
        _ => StreamRule::BoundaryB,
    }
}

/// Everything a boundary operator may read: previous-step global state and
/// the cell's own geometry. Operators never write anything; the caller
/// stores the returned value into the local buffer.
pub struct BoundaryContext<'a> {
    pub f_prev: &'a [Float],
    pub grid: &'a Grid,
    pub cell: usize,
    pub dir: usize,
    pub mask1: u8,
    pub mask2: u8,
}

/// Scenario-specific boundary operator.
pub type BoundaryHook = fn(&BoundaryContext<'_>) -> Float;

/// Resolved boundary operator for one mask category.
#[derive(Clone, Copy)]
pub enum BoundaryOp {
    Open,
    Periodic,
    BounceBack,
    Specular,
    Custom(BoundaryHook),
}

impl BoundaryOp {
    /// Turn a config selector into an operator. `Custom` requires a
    /// registered hook.
    pub fn resolve(kind: BoundaryKind, hook: Option<BoundaryHook>) -> Result<Self> {
        Ok(match kind {
            BoundaryKind::Open => Self::Open,
            BoundaryKind::Periodic => Self::Periodic,
            BoundaryKind::BounceBack => Self::BounceBack,
            BoundaryKind::Specular => Self::Specular,
            BoundaryKind::Custom => match hook {
                Some(hook) => Self::Custom(hook),
                None => bail!("custom boundary operator selected but no hook registered"),
            },
        })
    }

    /// Evaluate the operator for one (cell, direction). Reads only
    /// previous-step state, so evaluations are independent across cells.
    pub fn apply(&self, ctx: &BoundaryContext<'_>) -> Float {
        let cells = ctx.grid.cells();
        match self {
            Self::Open => ctx.f_prev[global_idx(ctx.cell, ctx.dir, cells)],
            Self::Periodic => {
                let nb = ctx.grid.periodic_neighbor(ctx.cell, ctx.dir);
                ctx.f_prev[global_idx(nb, ctx.dir, cells)]
            }
            Self::BounceBack => {
                ctx.f_prev[global_idx(ctx.cell, D2Q9::OPPOSITE[ctx.dir], cells)]
            }
            Self::Specular => {
                let mirrored = specular_direction(ctx.dir, ctx.mask1 | ctx.mask2);
                ctx.f_prev[global_idx(ctx.cell, mirrored, cells)]
            }
            Self::Custom(hook) => hook(ctx),
        }
    }
}

/// The two independently configured operators, resolved once at solver
/// construction.
#[derive(Clone, Copy)]
pub struct BoundarySet {
    pub category_a: BoundaryOp,
    pub category_b: BoundaryOp,
}

const CARDINAL_Y_BITS: u8 = (1 << 1) | (1 << 3); // N, S
const CARDINAL_X_BITS: u8 = (1 << 0) | (1 << 2); // E, W

/// Mirror `dir` according to which cardinal directions the cell's set mask
/// bits block: a blocked N/S cardinal means a horizontal wall (flip the y
/// component), a blocked E/W cardinal means a vertical wall (flip x), and a
/// corner blocking both reverses the direction outright.
fn specular_direction(dir: usize, set_bits: u8) -> usize {
    let wall_y = set_bits & CARDINAL_Y_BITS != 0;
    let wall_x = set_bits & CARDINAL_X_BITS != 0;
    match (wall_y, wall_x) {
        (true, false) => D2Q9::MIRROR_X[dir],
        (false, true) => D2Q9::MIRROR_Y[dir],
        _ => D2Q9::OPPOSITE[dir],
    }
}
