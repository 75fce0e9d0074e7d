//! Declaration-graph requests and declaration checking for tarn.
//!
//! Every question about a declaration (its superclass, its interface type,
//! what it overrides, its USR) is a [`TypeCheckRequest`] evaluated through
//! one shared [`tarn_eval::Evaluator`], so answers are computed once and
//! cyclic questions are diagnosed instead of recursing forever. Checking
//! passes ([`check_module`]) are ordinary walks over the module that ask
//! those questions and diagnose what they find.
//!
//! Results that belong to a single declaration are kept in side tables
//! ([`DeclCaches`], [`DeclStates`]) keyed by [`DeclId`](tarn_ast::DeclId);
//! the AST itself is never mutated.

mod check;
mod circularity;
mod context;
mod inheritance;
mod interface;
pub mod lookup;
mod overrides;
mod property_wrappers;
mod raw_values;
mod redecl;
pub mod request;
pub mod resolve;
mod state;
mod usr;

#[cfg(test)]
mod prop_tests;
#[cfg(test)]
mod sema_tests;

pub use check::{CheckOptions, check_module, check_module_with};
pub use context::{SemaContext, TypeChecker};
pub use inheritance::{InheritanceSummary, InheritedEntry, InheritedProtocol};
pub use property_wrappers::{PropertyWrapperBackingPropertyInfo, PropertyWrapperTypeInfo};
pub use request::{Ev, TypeCheckOutput, TypeCheckRequest};
pub use state::{CircularityState, DeclCaches, DeclStates, InheritanceWalk, ValidationState};
