// Copyright (c) the SSDV Rust Authors. All rights reserved.
//
// Use of this source code is governed by a BSD-style
// license that can be found in the LICENSE file.

//! Logging macros. With the `tracing` feature they are the `tracing` crate's; without it they
//! type check their arguments and expand to nothing.
//!
//! Import them by name. A glob import of `warn` is ambiguous with the built-in lint attribute.

#[cfg(feature = "tracing")]
pub use tracing::{debug, trace, warn};

#[cfg(not(feature = "tracing"))]
macro_rules! disabled_log {
    ($($arg:tt)*) => {{
        let _ = format_args!($($arg)*);
    }};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use {disabled_log as debug, disabled_log as trace, disabled_log as warn};
