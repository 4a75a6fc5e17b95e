pub mod boundary;
pub mod config;
pub mod geometry;
pub mod lattice;
pub mod physics;
pub mod solver;

pub use boundary::{BoundaryOp, BoundarySet, StreamRule};
pub use config::Config;
pub use geometry::GeometryMask;
pub use lattice::{D2Q9, Grid};
pub use physics::PhysicsOps;
pub use solver::{LbmSolver, SimulationBuffers};

pub type Float = f64;
