//! Query planning: plan skeletons, validation and argument binding.
//!
//! A `QueryPlan` is produced by the method descriptor parser, the query
//! text parser, or built directly. `PreparedPlan::prepare` validates it
//! once against the metamodel; the prepared plan is then bound to runtime
//! `Arguments` on every call, producing storage `Statement`s.

mod bind;
mod plan;
mod prepare;

pub use bind::{Argument, Arguments};
pub use plan::{Action, JoinSpec, LockMode, QueryPlan};
pub use prepare::{ParamSignature, PreparedPlan};
