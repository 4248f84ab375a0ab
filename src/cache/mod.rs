pub mod balance;
pub mod constraint;

pub use balance::BalanceCache;
pub use constraint::{Constraint, ConstraintCache};
