pub mod calculator;
pub mod policy;
pub mod records;

pub use calculator::{Calculator, MtrVariable};
pub use policy::{Policy, Reform};
pub use records::{FilingUnit, GrowthFactors, Records};
