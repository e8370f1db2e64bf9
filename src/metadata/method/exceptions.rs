//! Exception handler representation for method bodies.
//!
//! Handler ranges are expressed as half-open instruction-index ranges, matching the
//! representation of branch targets in [`crate::assembly::Operand::Target`], so that they
//! follow the instructions when a body is spliced.

use bitflags::bitflags;

use crate::metadata::typesystem::TypeRef;

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause.
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause.
        const FILTER = 0x0001;
        /// A finally clause.
        const FINALLY = 0x0002;
        /// A fault clause (finally that executes only on exception).
        const FAULT = 0x0004;
    }
}

/// Exception handler defining try/catch/finally blocks within a method.
///
/// # Layout
///
/// ```text
/// try {
///     // try_start .. try_end
/// }
/// catch (handler) {
///     // handler_start .. handler_end
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Kind of clause (catch, filter, finally, fault)
    pub flags: ExceptionHandlerFlags,
    /// Index of the first protected instruction
    pub try_start: usize,
    /// Index one past the last protected instruction
    pub try_end: usize,
    /// Index of the first handler instruction
    pub handler_start: usize,
    /// Index one past the last handler instruction
    pub handler_end: usize,
    /// If flags == EXCEPTION, then this type will handle the exception
    pub handler: Option<TypeRef>,
    /// Index of the first filter instruction, if flags == FILTER
    pub filter_start: Option<usize>,
}

impl ExceptionHandler {
    /// A `catch (handler)` clause
    #[must_use]
    pub fn catch(handler: TypeRef, try_range: (usize, usize), handler_range: (usize, usize)) -> Self {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_start: try_range.0,
            try_end: try_range.1,
            handler_start: handler_range.0,
            handler_end: handler_range.1,
            handler: Some(handler),
            filter_start: None,
        }
    }

    /// A `finally` clause
    #[must_use]
    pub fn finally(try_range: (usize, usize), handler_range: (usize, usize)) -> Self {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_start: try_range.0,
            try_end: try_range.1,
            handler_start: handler_range.0,
            handler_end: handler_range.1,
            handler: None,
            filter_start: None,
        }
    }

    /// A `fault` clause
    #[must_use]
    pub fn fault(try_range: (usize, usize), handler_range: (usize, usize)) -> Self {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FAULT,
            ..Self::finally(try_range, handler_range)
        }
    }

    /// A filter clause whose filter block starts at `filter_start`
    #[must_use]
    pub fn filter(
        filter_start: usize,
        try_range: (usize, usize),
        handler_range: (usize, usize),
    ) -> Self {
        ExceptionHandler {
            flags: ExceptionHandlerFlags::FILTER,
            filter_start: Some(filter_start),
            ..Self::finally(try_range, handler_range)
        }
    }

    /// Rewrites every instruction index of this clause through `map`
    pub fn relocate<F: Fn(usize) -> usize>(&mut self, map: &F) {
        self.try_start = map(self.try_start);
        self.try_end = map(self.try_end);
        self.handler_start = map(self.handler_start);
        self.handler_end = map(self.handler_end);
        if let Some(filter) = self.filter_start.as_mut() {
            *filter = map(*filter);
        }
    }

    /// Returns true if every range is ordered and within a body of `len` instructions
    #[must_use]
    pub fn is_within(&self, len: usize) -> bool {
        self.try_start < self.try_end
            && self.try_end <= len
            && self.handler_start < self.handler_end
            && self.handler_end <= len
            && self.filter_start.map_or(true, |filter| filter < len)
    }
}
