use anyhow::{Result, ensure};
use log::info;
use rayon::prelude::*;

use crate::Float;
use crate::boundary::{BoundaryContext, BoundaryHook, BoundaryOp, BoundarySet, StreamRule, classify};
use crate::config::Config;
use crate::geometry::GeometryMask;
use crate::lattice::{self, D2Q9, Grid, global_idx, local_idx};
use crate::physics::{EquilibriumFn, ForcingFn, PhysicsOps};

/// The flat backing arrays of one simulation, allocated once up front.
///
/// The two global distribution buffers are direction-major and strictly
/// alternate roles each timestep; the local buffer is cell-major and only
/// valid within a timestep. The scalar field persists across timesteps so
/// the next step's forcing can read it.
pub struct SimulationBuffers {
    /// Current-step global distribution, direction-major (9 * cells)
    pub f_curr: Vec<Float>,
    /// Next-step global distribution, direction-major (9 * cells)
    pub f_next: Vec<Float>,
    /// Per-timestep local distribution, cell-major (9 * cells)
    pub local_f: Vec<Float>,
    /// Per-cell (scalar, ux, uy) (3 * cells)
    pub macroscopic: Vec<Float>,
    /// Per-cell per-direction forcing terms (8 * cells)
    pub forcing: Vec<Float>,
    /// Persisted scalar field (cells)
    pub scalar: Vec<Float>,
    /// Static bed elevation (cells)
    pub bed: Vec<Float>,
}

impl SimulationBuffers {
    pub fn new(grid: &Grid) -> Self {
        let cells = grid.cells();
        Self {
            f_curr: vec![0.0; D2Q9::Q * cells],
            f_next: vec![0.0; D2Q9::Q * cells],
            local_f: vec![0.0; D2Q9::Q * cells],
            macroscopic: vec![0.0; 3 * cells],
            forcing: vec![0.0; (D2Q9::Q - 1) * cells],
            scalar: vec![0.0; cells],
            bed: vec![0.0; cells],
        }
    }

    /// Swap the roles of the two global buffers. Called once per timestep,
    /// after the collision phase.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.f_curr, &mut self.f_next);
    }
}

/// Phase 1: streaming, forcing and boundary resolution.
///
/// Gathers every active cell's 9 local populations from the previous-step
/// global buffer according to the per-direction mask classification. Each
/// work unit reads only previous-step state and writes only its own local
/// and forcing slots; the parallel join is the phase barrier.
pub fn stream_and_force(
    config: &Config,
    grid: &Grid,
    physics: &PhysicsOps,
    boundaries: &BoundarySet,
    masks: &GeometryMask,
    buffers: &mut SimulationBuffers,
) {
    let cells = grid.cells();
    let SimulationBuffers {
        f_curr,
        local_f,
        forcing,
        scalar,
        bed,
        ..
    } = buffers;
    let f_prev: &[Float] = f_curr;
    let scalar: &[Float] = scalar;
    let bed: &[Float] = bed;

    local_f
        .par_chunks_mut(D2Q9::Q)
        .zip(forcing.par_chunks_mut(D2Q9::Q - 1))
        .enumerate()
        .for_each(|(cell, (local, force))| {
            let mask1 = masks.mask1[cell];
            let mask2 = masks.mask2[cell];
            if mask1 == 0 && mask2 == 0 {
                return;
            }

            (physics.forcing)(&config.physics, grid, cell, scalar, bed, force);

            // the rest population always carries its previous value
            local[0] = f_prev[global_idx(cell, 0, cells)];

            for dir in 1..D2Q9::Q {
                local[dir] = match classify(mask1, mask2, dir) {
                    StreamRule::PassThrough => f_prev[global_idx(cell, dir, cells)],
                    StreamRule::StreamIn => match grid.neighbor(cell, dir) {
                        Some(nb) => f_prev[global_idx(nb, dir, cells)] + force[dir - 1],
                        // no neighbor: neutral fallback, own value and no forcing
                        None => f_prev[global_idx(cell, dir, cells)],
                    },
                    StreamRule::BoundaryA => boundaries.category_a.apply(&BoundaryContext {
                        f_prev,
                        grid,
                        cell,
                        dir,
                        mask1,
                        mask2,
                    }),
                    StreamRule::BoundaryB => boundaries.category_b.apply(&BoundaryContext {
                        f_prev,
                        grid,
                        cell,
                        dir,
                        mask1,
                        mask2,
                    }),
                };
            }
        });
}

/// Phase 2: macroscopic moment extraction.
///
/// Requires every cell's phase-1 output, hence the barrier between phases.
/// Writes the (scalar, ux, uy) field and persists the scalar standalone for
/// the next timestep's forcing.
pub fn compute_moments(config: &Config, masks: &GeometryMask, buffers: &mut SimulationBuffers) {
    let e = config.physics.lattice_speed;
    let SimulationBuffers {
        local_f,
        macroscopic,
        scalar,
        ..
    } = buffers;
    let local_f: &[Float] = local_f;

    macroscopic
        .par_chunks_mut(3)
        .zip(scalar.par_iter_mut())
        .enumerate()
        .for_each(|(cell, (mac, h))| {
            if !masks.is_active(cell) {
                return;
            }
            let f = &local_f[local_idx(cell, 0)..local_idx(cell, 0) + D2Q9::Q];
            let (s, ux, uy) = lattice::moments(f, e, cell);
            mac[0] = s;
            mac[1] = ux;
            mac[2] = uy;
            *h = s;
        });
}

/// Phase 3: equilibrium and BGK collision.
///
/// First relaxes each active cell's local populations toward the model
/// equilibrium in place (disjoint cell-major chunks), then transposes the
/// relaxed values into the direction-major next-step buffer one direction
/// plane at a time. Inactive cells' next-buffer slots are never touched.
pub fn collide(
    config: &Config,
    physics: &PhysicsOps,
    masks: &GeometryMask,
    buffers: &mut SimulationBuffers,
) {
    let tau = config.physics.tau;
    let cells = masks.grid().cells();

    {
        let SimulationBuffers {
            local_f,
            macroscopic,
            ..
        } = &mut *buffers;
        let macroscopic: &[Float] = macroscopic;

        local_f
            .par_chunks_mut(D2Q9::Q)
            .enumerate()
            .for_each(|(cell, local)| {
                if !masks.is_active(cell) {
                    return;
                }
                let mut feq = [0.0; D2Q9::Q];
                (physics.equilibrium)(
                    &config.physics,
                    macroscopic[3 * cell],
                    macroscopic[3 * cell + 1],
                    macroscopic[3 * cell + 2],
                    &mut feq,
                );
                for dir in 0..D2Q9::Q {
                    local[dir] -= (local[dir] - feq[dir]) / tau;
                }
            });
    }

    let SimulationBuffers { local_f, f_next, .. } = buffers;
    let local_f: &[Float] = local_f;

    f_next
        .par_chunks_mut(cells)
        .enumerate()
        .for_each(|(dir, plane)| {
            for cell in 0..cells {
                if masks.is_active(cell) {
                    plane[cell] = local_f[local_idx(cell, dir)];
                }
            }
        });
}

/// Hooks for the user-defined physics model and boundary operators,
/// registered at solver construction.
#[derive(Default, Clone, Copy)]
pub struct Hooks {
    pub equilibrium: Option<EquilibriumFn>,
    pub forcing: Option<ForcingFn>,
    pub boundary_a: Option<BoundaryHook>,
    pub boundary_b: Option<BoundaryHook>,
}

/// Owns the config, the resolved strategy tables, the geometry and the
/// buffer set, and sequences the three barrier-separated phases.
pub struct LbmSolver {
    config: Config,
    grid: Grid,
    physics: PhysicsOps,
    boundaries: BoundarySet,
    masks: GeometryMask,
    buffers: SimulationBuffers,
    steps_done: usize,
}

impl LbmSolver {
    pub fn new(config: Config, masks: GeometryMask) -> Result<Self> {
        Self::with_hooks(config, masks, Hooks::default())
    }

    /// Build a solver, validating the configuration and resolving the
    /// physics and boundary strategies once. Fatal on any unsupported or
    /// non-positive parameter.
    pub fn with_hooks(config: Config, masks: GeometryMask, hooks: Hooks) -> Result<Self> {
        config.validate()?;
        let grid = Grid::new(config.domain.lx, config.domain.ly);
        ensure!(
            masks.grid() == grid,
            "geometry mask grid {:?} does not match config domain {}x{}",
            masks.grid(),
            grid.lx,
            grid.ly
        );

        let physics = PhysicsOps::resolve(config.physics.model, hooks.equilibrium, hooks.forcing)?;
        let boundaries = BoundarySet {
            category_a: BoundaryOp::resolve(config.boundary.category_a, hooks.boundary_a)?,
            category_b: BoundaryOp::resolve(
                config.effective_category_b(),
                hooks.boundary_b.or(hooks.boundary_a),
            )?,
        };
        let buffers = SimulationBuffers::new(&grid);

        Ok(Self {
            config,
            grid,
            physics,
            boundaries,
            masks,
            buffers,
            steps_done: 0,
        })
    }

    /// Set every cell to the model equilibrium of the macroscopic state
    /// returned by `state(cell) -> (scalar, ux, uy)`. Fills both global
    /// buffers so inactive cells keep a consistent value across swaps.
    pub fn initialize_equilibrium(&mut self, state: impl Fn(usize) -> (Float, Float, Float)) {
        let cells = self.grid.cells();
        let mut feq = [0.0; D2Q9::Q];
        for cell in 0..cells {
            let (s, ux, uy) = state(cell);
            self.buffers.macroscopic[3 * cell] = s;
            self.buffers.macroscopic[3 * cell + 1] = ux;
            self.buffers.macroscopic[3 * cell + 2] = uy;
            self.buffers.scalar[cell] = s;
            (self.physics.equilibrium)(&self.config.physics, s, ux, uy, &mut feq);
            for dir in 0..D2Q9::Q {
                self.buffers.f_curr[global_idx(cell, dir, cells)] = feq[dir];
                self.buffers.f_next[global_idx(cell, dir, cells)] = feq[dir];
            }
        }
    }

    /// Advance one timestep: the three phases in order, then the buffer
    /// swap. Each phase function joins its parallel pass before returning,
    /// which is the required full-grid barrier.
    pub fn step(&mut self) {
        stream_and_force(
            &self.config,
            &self.grid,
            &self.physics,
            &self.boundaries,
            &self.masks,
            &mut self.buffers,
        );
        compute_moments(&self.config, &self.masks, &mut self.buffers);
        collide(&self.config, &self.physics, &self.masks, &mut self.buffers);
        self.buffers.swap();
        self.steps_done += 1;
    }

    /// Run the configured number of timesteps with periodic progress logs.
    pub fn run(&mut self) {
        let steps = self.config.simulation.steps;
        info!(
            "running {} timesteps on a {}x{} grid ({} active cells)",
            steps,
            self.grid.lx,
            self.grid.ly,
            self.masks.active_cells()
        );
        for _ in 0..steps {
            self.step();
            if self.steps_done % self.config.simulation.report_frequency == 0 {
                info!(
                    "step {}: total scalar {:.6}",
                    self.steps_done,
                    self.total_scalar()
                );
            }
        }
        info!("completed {} timesteps", self.steps_done);
    }

    /// Sum of the persisted scalar field over active cells (mass or heat
    /// content, depending on the model).
    pub fn total_scalar(&self) -> Float {
        (0..self.grid.cells())
            .filter(|&c| self.masks.is_active(c))
            .map(|c| self.buffers.scalar[c])
            .sum()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn masks(&self) -> &GeometryMask {
        &self.masks
    }

    pub fn buffers(&self) -> &SimulationBuffers {
        &self.buffers
    }

    pub fn buffers_mut(&mut self) -> &mut SimulationBuffers {
        &mut self.buffers
    }

    pub fn steps_done(&self) -> usize {
        self.steps_done
    }
}
