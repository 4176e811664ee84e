//! A REPL and script runner for Tacl interpreters.
//!
//! [`repl`] runs an interactive prompt with `rustyline` line editing;
//! [`script`] executes a script file with command-line arguments.  Both work
//! on any configured [`tacl::Interp`], so an application can register its
//! own commands before handing the interpreter over.

mod shell;

pub use shell::*;
