//! Command-line driver for the munch lexer

#![deny(
    clippy::disallowed_methods,
    clippy::suspicious,
    clippy::style,
    clippy::clone_on_ref_ptr,
    missing_debug_implementations,
    missing_copy_implementations
)]
#![warn(clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

mod entry;
mod rules;

mod prelude {
    #![expect(unused_imports, reason = "Some exports may not yet be used")]

    pub use std::{
        borrow::Cow,
        fmt,
        io::{self, Write as _},
        path::PathBuf,
    };

    pub use anyhow::{Context as _, Error, anyhow, bail};
    pub use tracing::{debug, error, error_span, info, trace, warn};
    pub use tracing_subscriber::prelude::*;

    pub type Result<T = (), E = Error> = std::result::Result<T, E>;
}

fn main() { entry::main(); }
