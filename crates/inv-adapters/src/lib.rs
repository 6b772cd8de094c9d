//! inv-adapters: dominio de ejemplo para el motor de investigaciones.
//!
//! Implementa una campaña de screening de materiales: un oráculo sintético
//! determinista como capability, un planner que alterna mediciones de
//! estabilidad y bandgap sobre candidatos generados por seed, un estado de
//! creencias acumulado de las mediciones y una policy de corte por
//! restricciones. Todo se liga al motor por los traits de `inv-core`; el core
//! no conoce nada de materiales.

pub mod beliefs;
pub mod oracle;
pub mod planner;
pub mod policy;

pub use beliefs::{BeliefState, Constraints};
pub use oracle::SyntheticOracle;
pub use planner::MaterialsPlanner;
pub use policy::ConstraintPolicy;
