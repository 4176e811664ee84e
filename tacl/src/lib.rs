//! Tacl: an embeddable command language.
//!
//! Tacl is a small Tcl-flavored scripting language meant to be embedded in
//! Rust applications: the host creates an [`Interp`], registers commands
//! written in Rust, and evaluates scripts.  Everything is a string; the
//! interpreter parses values as integers, floats, booleans, or lists on
//! demand.
//!
//! ```
//! use tacl::Interp;
//!
//! let mut interp = Interp::new();
//! let value = interp.eval("expr {2 + 2}").unwrap();
//! assert_eq!(value.as_str(), "4");
//! ```
//!
//! Native commands are functions of type [`CommandFunc`]; commands that
//! carry host data implement [`ObjectCommand`] instead, and are told when
//! their registry binding goes away.
//!
//! ```
//! use tacl::{check_args, tacl_ok, Interp, TaclResult, Value};
//!
//! fn cmd_square(interp: &mut Interp, argv: &[Value]) -> TaclResult {
//!     check_args(1, argv, 2, 2, "number")?;
//!     let num = argv[1].as_int()?;
//!     tacl_ok!(num * num)
//! }
//!
//! let mut interp = Interp::new();
//! interp.add_command("square", cmd_square);
//! assert_eq!(interp.eval("square 7").unwrap().as_str(), "49");
//! ```

mod commands;
pub mod expr;
mod interp;
pub mod list;
mod parser;
mod scope;
pub mod types;
mod value;

pub use crate::interp::Interp;
pub use crate::types::*;
pub use crate::value::Value;

/// Returns an `Ok` [`TaclResult`]: empty with no arguments, from any value
/// conversion with one, or from a format string and arguments.
#[macro_export]
macro_rules! tacl_ok {
    () => (
        Ok($crate::Value::empty())
    );
    ($arg:expr) => (
        Ok($crate::Value::from($arg))
    );
    ($($arg:tt)*) => (
        Ok($crate::Value::from(format!($($arg)*)))
    );
}

/// Returns an error [`TaclResult`] from a message value, or from a format
/// string and arguments.
#[macro_export]
macro_rules! tacl_err {
    ($arg:expr) => (
        Err($crate::Exception::tacl_err($crate::Value::from($arg)))
    );
    ($($arg:tt)*) => (
        Err($crate::Exception::tacl_err($crate::Value::from(format!($($arg)*))))
    );
}

/// Checks a command's argument count against its signature.
///
/// `namec` is the number of leading words that name the command (2 for a
/// subcommand of an ensemble), `min` and `max` bound the total word count
/// (`max` of 0 means unlimited), and `argsig` is the signature shown in the
/// error message:
///
/// ```
/// # use tacl::{check_args, Value};
/// let argv = [Value::from("set")];
/// let err = check_args(1, &argv, 2, 3, "varName ?newValue?").unwrap_err();
/// assert_eq!(
///     err.value().as_str(),
///     "wrong # args: should be \"set varName ?newValue?\""
/// );
/// ```
pub fn check_args(
    namec: usize,
    argv: &[Value],
    min: usize,
    max: usize,
    argsig: &str,
) -> Result<(), Exception> {
    assert!(namec >= 1, "namec must include the command name");
    assert!(argv.len() >= namec, "argv too short for namec");

    if argv.len() >= min && (max == 0 || argv.len() <= max) {
        return Ok(());
    }

    let mut name = String::new();
    for word in &argv[..namec] {
        if !name.is_empty() {
            name.push(' ');
        }
        name.push_str(word.as_str());
    }

    if argsig.is_empty() {
        tacl_err!("wrong # args: should be \"{}\"", name)
    } else {
        tacl_err!("wrong # args: should be \"{} {}\"", name, argsig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_args_ok() {
        let argv = [Value::from("dummy"), Value::from("a")];
        assert!(check_args(1, &argv, 1, 2, "?arg?").is_ok());
        assert!(check_args(1, &argv, 2, 0, "arg ?arg ...?").is_ok());
    }

    #[test]
    fn test_check_args_messages() {
        let argv = [Value::from("dummy")];
        let err = check_args(1, &argv, 2, 2, "arg").unwrap_err();
        assert_eq!(
            err.value().as_str(),
            "wrong # args: should be \"dummy arg\""
        );

        let argv = [Value::from("thing"), Value::from("do"), Value::from("x")];
        let err = check_args(2, &argv, 2, 2, "").unwrap_err();
        assert_eq!(err.value().as_str(), "wrong # args: should be \"thing do\"");
    }

    #[test]
    fn test_macros() {
        let result: TaclResult = tacl_ok!();
        assert_eq!(result.unwrap().as_str(), "");

        let result: TaclResult = tacl_ok!(5);
        assert_eq!(result.unwrap().as_str(), "5");

        let result: TaclResult = tacl_ok!("{} and {}", 1, 2);
        assert_eq!(result.unwrap().as_str(), "1 and 2");

        let result: TaclResult = tacl_err!("bad {}", "thing");
        assert_eq!(result.unwrap_err().value().as_str(), "bad thing");
    }
}
