//! Per-declaration side tables.
//!
//! Declarations are immutable once a module is built. Everything the
//! checker learns about them lives here, keyed by `DeclId`.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tarn_ast::DeclId;
use tarn_types::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationState {
    #[default]
    Unvalidated,
    Validating,
    Validated,
    Invalid,
}

/// Tri-state guard for inheritance-graph walks. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum CircularityState {
    #[default]
    Unchecked,
    Checking,
    Checked,
}

/// Which inheritance graph a circularity walk follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InheritanceWalk {
    /// class -> superclass
    Class,
    /// protocol -> refined protocols
    Protocol,
    /// enum -> raw type enum
    Enum,
}

#[derive(Debug, Clone, Default)]
pub struct DeclStates {
    validation: FxHashMap<DeclId, ValidationState>,
    invalid: FxHashSet<DeclId>,
    circularity: FxHashMap<(DeclId, InheritanceWalk), CircularityState>,
}

impl DeclStates {
    pub fn validation(&self, decl: DeclId) -> ValidationState {
        if self.invalid.contains(&decl) {
            return ValidationState::Invalid;
        }
        self.validation.get(&decl).copied().unwrap_or_default()
    }

    pub fn set_validation(&mut self, decl: DeclId, state: ValidationState) {
        if state == ValidationState::Invalid {
            self.invalid.insert(decl);
        }
        self.validation.insert(decl, state);
    }

    /// Mark a declaration invalid. Sticky: later validation never clears it.
    pub fn mark_invalid(&mut self, decl: DeclId) {
        self.invalid.insert(decl);
    }

    pub fn is_invalid(&self, decl: DeclId) -> bool {
        self.invalid.contains(&decl)
    }

    pub fn circularity(&self, decl: DeclId, walk: InheritanceWalk) -> CircularityState {
        self.circularity
            .get(&(decl, walk))
            .copied()
            .unwrap_or_default()
    }

    pub fn advance_circularity(&mut self, decl: DeclId, walk: InheritanceWalk, next: CircularityState) {
        let slot = self.circularity.entry((decl, walk)).or_default();
        debug_assert!(next > *slot, "circularity state moves forward only");
        *slot = next;
    }
}

/// Storage for separately cached request results.
#[derive(Debug, Clone, Default)]
pub struct DeclCaches {
    pub inherited_types: FxHashMap<(DeclId, usize), Type>,
    pub superclass_decls: FxHashMap<DeclId, Option<DeclId>>,
    pub superclass_types: FxHashMap<DeclId, Option<Type>>,
    pub raw_types: FxHashMap<DeclId, Option<Type>>,
    pub overridden: FxHashMap<DeclId, SmallVec<[DeclId; 1]>>,
    pub is_final: FxHashMap<DeclId, bool>,
    /// Types of unannotated variables, recorded once their initializer has
    /// been type checked.
    pub inferred_var_types: FxHashMap<DeclId, Type>,
}
