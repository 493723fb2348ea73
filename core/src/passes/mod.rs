//! # Passes
//!
//! Whole-operation and whole-document rewrites run after lowering: the
//! equivalence collapse of interface arms, the default-error reduction, and
//! the equality planner.

mod fix;
mod planner;
mod reduce;

pub use fix::{fix_equal_requests, fix_equal_responses};
pub use planner::{plan_equality, EqualityPlan};
pub use reduce::{reduce_default, ERR_RESP};
