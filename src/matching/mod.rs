//! Structural correspondence between proxy and target elements.
//!
//! Matching decides, for every tagged proxy element, which target element it replaces. It
//! never mutates anything and never calls into the weaver; the orchestration in
//! [`crate::Tampering`] hands the resulting [`Pair`]s over.
//!
//! # Key Components
//!
//! - [`TypeMatching`] - Resolves a `ProxyOf`-tagged type by the full name its tag carries
//! - [`MethodMatching`] - Finds the unique target method with an equal [`MethodSignature`]
//! - [`AssemblyBrowser`] / [`TypeBrowser`] - Enumerate tagged proxy elements and pair them
//! - [`browse`] - One complete matching pass over a merged module
//! - [`find_target_module`] - The single module a proxy module stands in for
//!
//! # Failure Modes
//!
//! A declared correspondence with no counterpart is [`crate::Error::MatchNotFound`]. More
//! than one counterpart, or a target claimed by two proxies in the same pass, is
//! [`crate::Error::AmbiguousMatch`]. Neither is ever resolved by picking a candidate.

mod browser;
mod methods;
mod signature;
mod types;

pub use browser::{browse, find_target_module, AssemblyBrowser, TypeBrowser, TypeMatch};
pub use methods::MethodMatching;
pub use signature::MethodSignature;
pub use types::TypeMatching;

use std::{fmt, marker::PhantomData};

use crate::{metadata::token::Token, Result};

/// Finds the counterpart of a proxy element inside a target container.
pub trait Matching<E, C> {
    /// Returns the target element `proxy` stands in for.
    ///
    /// # Errors
    ///
    /// [`crate::Error::MatchNotFound`] if there is none, [`crate::Error::AmbiguousMatch`] if
    /// there are several.
    fn find_match<'a>(&self, proxy: &E, container: &'a C) -> Result<&'a E>;
}

/// A directed association from a proxy element to the target element it replaces.
///
/// Both sides are held as tokens of the module the pass runs over, so a pair stays valid
/// while method bodies of that module are rewritten. Pairs live for a single pass.
pub struct Pair<T> {
    /// The proxy element
    pub proxy: Token,
    /// The target element
    pub target: Token,
    element: PhantomData<fn() -> T>,
}

impl<T> Pair<T> {
    /// Pairs `proxy` with `target`
    #[must_use]
    pub fn new(proxy: Token, target: Token) -> Self {
        Pair {
            proxy,
            target,
            element: PhantomData,
        }
    }
}

impl<T> Clone for Pair<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Pair<T> {}

impl<T> PartialEq for Pair<T> {
    fn eq(&self, other: &Self) -> bool {
        self.proxy == other.proxy && self.target == other.target
    }
}

impl<T> Eq for Pair<T> {}

impl<T> fmt::Debug for Pair<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pair({} -> {})", self.proxy, self.target)
    }
}
