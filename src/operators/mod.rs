//! Evolutionary operators backing the embedded NSGA-II kernel (component D):
//! simulated binary crossover, polynomial mutation, and geometric-tournament
//! selection. Each is a plain struct with a direct method rather than a
//! trait-object pipeline, since the inner optimizer is the only caller and
//! needs the feasibility-aware, pool-of-candidates variants described in
//! spec.md §4.D/§4.E rather than a generic operate-over-a-population API.

pub mod crossover;
pub mod mutation;
pub mod selection;

pub use crossover::SBXCrossover;
pub use mutation::PolynomialMutation;
pub use selection::GeometricTournamentSelection;
