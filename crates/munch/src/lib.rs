//! Toolkit for building maximal-munch lexers from per-token automata

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
#![allow(missing_docs)] // TODO: document the dfa submodules

pub mod dfa;
pub mod dot;
pub mod lexer;
pub mod ordered_set;
pub mod scanner;
pub mod table;

#[cfg(any(test, feature = "proptest"))]
pub mod prop;

pub use dfa::{ConstructionError, Dfa, State, Symbol, Tag, Transition, TransitionTable};
pub use lexer::{BuildError, Rule, build};
pub use scanner::{Lexeme, Position, ScanError, Scanner, ScannerConfig, Source, SourceQueue};
pub use table::{CompileError, CompiledTable, Label};
