// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # cilweave
//!
//! Substitutes routines of a .NET module that cannot be mocked (static methods, sealed
//! types, non-virtual members) with routines of a separately authored proxy module.
//!
//! A proxy module declares, through custom attributes, which of its static types stand in
//! for which target types and which of their methods stand in for which target methods.
//! `cilweave` merges the proxy module into the target module, validates the proxy, matches
//! every proxy to exactly one target by name, arity and parameter types, and grafts each
//! proxy body onto its target, optionally calling user-supplied hooks on entry and exit.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::{path::Path, sync::Arc};
//! use cilweave::prelude::*;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.insert(
//!     ModuleBuilder::new("Library")
//!         .add_type(TypeBuilder::new("Demo.Clock").public().method(
//!             MethodBuilder::new_static("Now").public().returns(TypeRef::int64()).implementation(
//!                 |asm| { asm.ldc_i8(1_700_000_000)?.ret()?; Ok(()) },
//!             ),
//!         ))
//!         .build()?,
//! );
//! store.insert(
//!     ModuleBuilder::new("Proxies")
//!         .add_type(
//!             TypeBuilder::new("Demo.ClockProxy")
//!                 .public()
//!                 .static_class()
//!                 .proxy_of(TypeRef::class("Demo.Clock").with_scope(TypeScope::External("Library".into())))
//!                 .method(
//!                     MethodBuilder::new_static("Now")
//!                         .public()
//!                         .returns(TypeRef::int64())
//!                         .proxy_method(TargetMethodType::Static, None)
//!                         .implementation(|asm| { asm.ldc_i8(42)?.ret()?; Ok(()) }),
//!                 ),
//!         )
//!         .build()?,
//! );
//!
//! let woven = Tampering::in_memory(store).tamper(&ModulePair::new("Proxies.dll", "Library.dll"))?;
//!
//! let now = woven.find_type("Demo.Clock")?.methods[0].reference();
//! assert_eq!(Interpreter::new(&woven)?.invoke(&now, Vec::new())?, EmValue::I64(42));
//! # Ok::<(), cilweave::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`metadata`] - The in-memory object model: modules, types, methods, tags, tokens
//! - [`assembly`] - CIL instructions and a fluent assembler
//! - [`file`] - Reading, writing and merging modules
//! - [`validation`] - Checks that catch proxy authoring mistakes
//! - [`matching`] - Pairs proxy types and methods with their targets
//! - [`weaving`] - Grafts proxy bodies onto targets and installs hooks
//! - [`tampering`] - Runs the whole pipeline for (proxy, target) pairs
//! - [`emulation`] - Executes method bodies to observe a substitution
//!
//! ## Error Handling
//!
//! Every failure is fatal for the pair being processed and is reported as an [`Error`]:
//!
//! ```rust
//! use cilweave::Error;
//!
//! fn describe(error: &Error) -> String {
//!     match error {
//!         Error::MatchNotFound { element, container } => format!("{element} has no match in {container}"),
//!         Error::AmbiguousMatch { element, candidates, .. } => format!("{element}: {}", candidates.join(", ")),
//!         Error::ProxyMistake(message) => message.clone(),
//!         other => other.to_string(),
//!     }
//! }
//! ```

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use cilweave::prelude::*;
///
/// let options = TamperingOptions::new().with_validation(ValidationConfig::strict());
/// assert_eq!(options.public_key_model, PublicKeyModel::Target);
/// ```
pub mod prelude;

pub mod assembly;
pub mod emulation;
pub mod file;
pub mod matching;
pub mod metadata;
pub mod tampering;
pub mod validation;
pub mod weaving;

/// `cilweave` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `cilweave` Error type
///
/// The error type of every fallible operation in this crate.
pub use error::Error;

pub use tampering::{ModulePair, PublicKeyModel, Tampering, TamperingOptions};
