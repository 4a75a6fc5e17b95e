use log::warn;

use crate::Float;

/// D2Q9 lattice model constants
pub struct D2Q9;

impl D2Q9 {
    /// Number of discrete velocities (1 rest + 8 moving)
    pub const Q: usize = 9;

    /// X offsets for the moving directions 1..=8 (E, N, W, S, NE, NW, SW, SE)
    pub const EX: [i32; 8] = [1, 0, -1, 0, 1, -1, -1, 1];

    /// Y offsets for the moving directions 1..=8
    pub const EY: [i32; 8] = [0, 1, 0, -1, 1, 1, -1, -1];

    /// Opposite directions for bounce-back boundary conditions
    pub const OPPOSITE: [usize; 9] = [0, 3, 4, 1, 2, 7, 8, 5, 6];

    /// Directions mirrored across the x axis (y component flipped),
    /// for specular reflection off a horizontal wall
    pub const MIRROR_X: [usize; 9] = [0, 1, 4, 3, 2, 8, 7, 6, 5];

    /// Directions mirrored across the y axis (x component flipped),
    /// for specular reflection off a vertical wall
    pub const MIRROR_Y: [usize; 9] = [0, 3, 2, 1, 4, 6, 5, 8, 7];
}

/// Index into a direction-major global distribution buffer
/// (all cells for direction 0, then all cells for direction 1, ...).
#[inline]
pub fn global_idx(cell: usize, dir: usize, cells: usize) -> usize {
    cell + dir * cells
}

/// Index into a cell-major local distribution buffer
/// (the 9 populations of a cell stored contiguously).
#[inline]
pub fn local_idx(cell: usize, dir: usize) -> usize {
    cell * D2Q9::Q + dir
}

/// Grid dimensions plus the flat-index neighbor arithmetic shared by
/// streaming, forcing and the periodic boundary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grid {
    pub lx: usize,
    pub ly: usize,
}

impl Grid {
    pub fn new(lx: usize, ly: usize) -> Self {
        Self { lx, ly }
    }

    /// Total cell count
    #[inline]
    pub fn cells(&self) -> usize {
        self.lx * self.ly
    }

    /// Flat-index neighbor of `cell` along moving direction `dir` (1..=8).
    /// Returns `None` when the flat index falls outside the buffer; callers
    /// must substitute a neutral value, never wrap.
    #[inline]
    pub fn neighbor(&self, cell: usize, dir: usize) -> Option<usize> {
        let idx = cell as i64
            + D2Q9::EX[dir - 1] as i64
            + D2Q9::EY[dir - 1] as i64 * self.lx as i64;
        if idx >= 0 && (idx as usize) < self.cells() {
            Some(idx as usize)
        } else {
            None
        }
    }

    /// Neighbor along `dir` (1..=8) with true modular wrap in both axes,
    /// used only by the periodic boundary operator.
    #[inline]
    pub fn periodic_neighbor(&self, cell: usize, dir: usize) -> usize {
        let x = (cell % self.lx) as i64 + D2Q9::EX[dir - 1] as i64;
        let y = (cell / self.lx) as i64 + D2Q9::EY[dir - 1] as i64;
        let x = x.rem_euclid(self.lx as i64) as usize;
        let y = y.rem_euclid(self.ly as i64) as usize;
        x + y * self.lx
    }
}

/// Scalar below this is treated as a dry/degenerate cell when deriving
/// velocity.
pub const MIN_SCALAR: Float = 1e-12;

/// Calculate the macroscopic moments of one cell's 9 local populations.
///
/// Returns (scalar, ux, uy). The scalar is the zeroth moment (height,
/// temperature, ... depending on the physics model); the velocity is the
/// first moment scaled by the lattice speed `e`.
///
/// Degeneracy policy: when the scalar is at or below [`MIN_SCALAR`] the
/// velocity is clamped to zero instead of dividing, and a warning is logged
/// with the offending cell index.
pub fn moments(f: &[Float], e: Float, cell: usize) -> (Float, Float, Float) {
    debug_assert_eq!(f.len(), D2Q9::Q);

    let scalar = f[0] + (f[1] + f[2] + f[3] + f[4]) + (f[5] + f[6] + f[7] + f[8]);

    if scalar <= MIN_SCALAR {
        warn!("degenerate scalar {scalar:e} at cell {cell}, clamping velocity to zero");
        return (scalar, 0.0, 0.0);
    }

    let ux = e * ((f[1] - f[3]) + (f[5] - f[6] - f[7] + f[8])) / scalar;
    let uy = e * ((f[2] - f[4]) + (f[5] + f[6] - f[7] - f[8])) / scalar;

    (scalar, ux, uy)
}
