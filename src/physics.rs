use anyhow::{Result, bail};

use crate::Float;
use crate::config::{PhysicsConfig, PhysicsModel};
use crate::lattice::{D2Q9, Grid};

/// Equilibrium strategy: (scalar, ux, uy) -> 9 populations.
pub type EquilibriumFn = fn(&PhysicsConfig, Float, Float, Float, &mut [Float; 9]);

/// Forcing strategy: fill one cell's 8 per-direction body-force terms from
/// the persisted scalar field and the bed elevation. Consumed only by the
/// stream-in rule.
pub type ForcingFn = fn(&PhysicsConfig, &Grid, usize, &[Float], &[Float], &mut [Float]);

/// The physics-model strategy table, resolved once at solver construction
/// so the phase code stays model-agnostic.
#[derive(Clone, Copy)]
pub struct PhysicsOps {
    pub equilibrium: EquilibriumFn,
    pub forcing: ForcingFn,
}

impl PhysicsOps {
    pub fn resolve(
        model: PhysicsModel,
        equilibrium_hook: Option<EquilibriumFn>,
        forcing_hook: Option<ForcingFn>,
    ) -> Result<Self> {
        Ok(match model {
            PhysicsModel::ShallowWater => Self {
                equilibrium: shallow_water_equilibrium,
                forcing: shallow_water_forcing,
            },
            PhysicsModel::Heat => Self {
                equilibrium: heat_equilibrium,
                forcing: zero_forcing,
            },
            PhysicsModel::Custom => {
                let Some(equilibrium) = equilibrium_hook else {
                    bail!("custom physics model selected but no equilibrium hook registered");
                };
                Self {
                    equilibrium,
                    forcing: forcing_hook.unwrap_or(zero_forcing),
                }
            }
        })
    }
}

/// Shallow-water equilibrium distribution.
///
/// The gravity term 1.5*g*h and the velocity term 1.5*(ux^2 + uy^2) are
/// folded into one quadratic-in-velocity template per direction; diagonal
/// directions use the template at 1/4 scale. At zero velocity the nine
/// weights sum exactly to h.
pub fn shallow_water_equilibrium(
    physics: &PhysicsConfig,
    h: Float,
    ux: Float,
    uy: Float,
    feq: &mut [Float; 9],
) {
    let e = physics.lattice_speed;
    let factor = 1.0 / (9.0 * e * e);
    let gh = 1.5 * physics.gravity * h;
    let usq = 1.5 * (ux * ux + uy * uy);
    let ux3 = 3.0 * e * ux;
    let uy3 = 3.0 * e * uy;
    let uxuy5 = ux3 + uy3;
    let uxuy6 = uy3 - ux3;

    feq[0] = h * (1.0 - factor * (5.0 * gh + 4.0 * usq));
    feq[1] = h * factor * (gh + ux3 + 4.5 * ux3 * ux3 * factor - usq);
    feq[2] = h * factor * (gh + uy3 + 4.5 * uy3 * uy3 * factor - usq);
    feq[3] = h * factor * (gh - ux3 + 4.5 * ux3 * ux3 * factor - usq);
    feq[4] = h * factor * (gh - uy3 + 4.5 * uy3 * uy3 * factor - usq);
    feq[5] = h * factor * 0.25 * (gh + uxuy5 + 4.5 * uxuy5 * uxuy5 * factor - usq);
    feq[6] = h * factor * 0.25 * (gh + uxuy6 + 4.5 * uxuy6 * uxuy6 * factor - usq);
    feq[7] = h * factor * 0.25 * (gh - uxuy5 + 4.5 * uxuy5 * uxuy5 * factor - usq);
    feq[8] = h * factor * 0.25 * (gh - uxuy6 + 4.5 * uxuy6 * uxuy6 * factor - usq);
}

/// Heat/diffusion equilibrium: a pure rescaling of the scalar field by the
/// standard D2Q9 weights, with no velocity coupling.
pub fn heat_equilibrium(
    _physics: &PhysicsConfig,
    t: Float,
    _ux: Float,
    _uy: Float,
    feq: &mut [Float; 9],
) {
    let cardinal = t / 9.0;
    feq[0] = 4.0 * cardinal;
    feq[1] = cardinal;
    feq[2] = cardinal;
    feq[3] = cardinal;
    feq[4] = cardinal;
    feq[5] = 0.25 * cardinal;
    feq[6] = 0.25 * cardinal;
    feq[7] = 0.25 * cardinal;
    feq[8] = 0.25 * cardinal;
}

/// Gravity-driven shallow-water forcing: for direction j with in-range
/// neighbor n, force = k_j * g * (h[i] + h[n]) * (b[n] - b[i]), with
/// k_j = 1/(6e^2) for cardinal and 0.25/(6e^2) for diagonal directions.
/// Out-of-range neighbors contribute zero.
pub fn shallow_water_forcing(
    physics: &PhysicsConfig,
    grid: &Grid,
    cell: usize,
    scalar: &[Float],
    bed: &[Float],
    forcing: &mut [Float],
) {
    let e = physics.lattice_speed;
    let factor = 1.0 / (6.0 * e * e);
    let h = scalar[cell];
    let b = bed[cell];
    for dir in 1..D2Q9::Q {
        let k = if dir <= 4 { factor } else { 0.25 * factor };
        forcing[dir - 1] = match grid.neighbor(cell, dir) {
            Some(nb) => k * physics.gravity * (h + scalar[nb]) * (bed[nb] - b),
            None => 0.0,
        };
    }
}

pub fn zero_forcing(
    _physics: &PhysicsConfig,
    _grid: &Grid,
    _cell: usize,
    _scalar: &[Float],
    _bed: &[Float],
    forcing: &mut [Float],
) {
    forcing.fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn swe_config() -> PhysicsConfig {
        PhysicsConfig {
            model: PhysicsModel::ShallowWater,
            lattice_speed: 1.5,
            tau: 1.0,
            gravity: 9.8,
        }
    }

    #[test]
    fn quiescent_shallow_water_weights_sum_to_the_scalar() {
        let physics = swe_config();
        let mut feq = [0.0; 9];
        for &h in &[0.5, 1.0, 2.75] {
            shallow_water_equilibrium(&physics, h, 0.0, 0.0, &mut feq);
            let sum: Float = feq.iter().sum();
            assert_relative_eq!(sum, h, max_relative = 1e-14);
        }
    }

    #[test]
    fn shallow_water_moments_round_trip() {
        let physics = swe_config();
        let e = physics.lattice_speed;
        let (h, ux, uy) = (1.3, 0.02, -0.015);
        let mut feq = [0.0; 9];
        shallow_water_equilibrium(&physics, h, ux, uy, &mut feq);
        let (h2, ux2, uy2) = crate::lattice::moments(&feq, e, 0);
        assert_relative_eq!(h2, h, max_relative = 1e-12);
        assert_abs_diff_eq!(ux2, ux, epsilon = 1e-12);
        assert_abs_diff_eq!(uy2, uy, epsilon = 1e-12);
    }

    #[test]
    fn diagonal_weights_use_quarter_scale() {
        let physics = swe_config();
        let mut feq = [0.0; 9];
        shallow_water_equilibrium(&physics, 2.0, 0.0, 0.0, &mut feq);
        // at zero velocity every moving template reduces to the gravity term
        assert_relative_eq!(feq[5], 0.25 * feq[1], max_relative = 1e-14);
        assert_relative_eq!(feq[8], 0.25 * feq[4], max_relative = 1e-14);
    }

    #[test]
    fn heat_equilibrium_ignores_velocity() {
        let physics = PhysicsConfig {
            model: PhysicsModel::Heat,
            ..swe_config()
        };
        let t = 3.6;
        let mut still = [0.0; 9];
        let mut moving = [0.0; 9];
        heat_equilibrium(&physics, t, 0.0, 0.0, &mut still);
        heat_equilibrium(&physics, t, 0.8, -0.3, &mut moving);
        assert_eq!(still, moving);

        assert_relative_eq!(still[0], 4.0 / 9.0 * t, max_relative = 1e-14);
        for dir in 1..5 {
            assert_relative_eq!(still[dir], t / 9.0, max_relative = 1e-14);
        }
        for dir in 5..9 {
            assert_relative_eq!(still[dir], t / 36.0, max_relative = 1e-14);
        }
    }

    #[test]
    fn shallow_water_forcing_follows_the_bed_slope() {
        let physics = swe_config();
        let grid = Grid::new(3, 1);
        let scalar = vec![1.0, 2.0, 1.5];
        let bed = vec![0.0, 0.1, 0.3];
        let mut forcing = [0.0; 8];
        shallow_water_forcing(&physics, &grid, 1, &scalar, &bed, &mut forcing);

        let e = physics.lattice_speed;
        let factor = 1.0 / (6.0 * e * e);
        // east neighbor is cell 2
        assert_relative_eq!(forcing[0], factor * 9.8 * (2.0 + 1.5) * (0.3 - 0.1));
        // west neighbor is cell 0
        assert_relative_eq!(forcing[2], factor * 9.8 * (2.0 + 1.0) * (0.0 - 0.1));
        // north is out of range on a 3x1 grid
        assert_eq!(forcing[1], 0.0);
    }

    #[test]
    fn custom_model_requires_an_equilibrium_hook() {
        assert!(PhysicsOps::resolve(PhysicsModel::Custom, None, None).is_err());

        fn advective(_: &PhysicsConfig, s: Float, _: Float, _: Float, feq: &mut [Float; 9]) {
            feq.fill(s / 9.0);
        }
        let ops = PhysicsOps::resolve(PhysicsModel::Custom, Some(advective), None).unwrap();
        let mut feq = [0.0; 9];
        (ops.equilibrium)(&swe_config(), 9.0, 0.0, 0.0, &mut feq);
        assert_eq!(feq[4], 1.0);
    }
}
