pub mod simulation;

pub use simulation::{ServerSim, Snapshot};
