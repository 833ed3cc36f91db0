pub mod analysis;
pub mod behavior;
pub mod groups;
pub mod table;

pub use analysis::ResponseAnalysis;
pub use groups::{EarningsGroups, ElasticityAssumptions};
