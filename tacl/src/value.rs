//! The Value type.
//!
//! A `Value` is the type of all values in the language: command arguments,
//! variable contents, command results.  Everything is a string; a `Value`
//! wraps an immutable, cheaply-cloneable string and provides typed accessors
//! that parse it on demand.  Parsing failures surface as ordinary script
//! errors (`expected integer but got "..."`, etc.), never as panics.
//!
//! Expression evaluation uses its own typed cells internally (see
//! [`crate::expr`]); those cells escape only by being formatted back into a
//! `Value`.

use crate::list;
use crate::types::*;
use std::fmt;
use std::rc::Rc;

/// A value in the command language: an immutable shared string with typed
/// accessors.  Cloning a `Value` is cheap (a reference-count bump), so values
/// can be passed around freely.
///
/// `Value` is deliberately not `Sync`; an interpreter and all of its values
/// belong to a single thread.
#[derive(Clone, Debug)]
pub struct Value {
    string: Rc<str>,
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.string == other.string
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.string)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::empty()
    }
}

impl From<&str> for Value {
    fn from(str: &str) -> Self {
        Self { string: str.into() }
    }
}

impl From<String> for Value {
    fn from(str: String) -> Self {
        Self { string: str.into() }
    }
}

impl From<&String> for Value {
    fn from(str: &String) -> Self {
        Self {
            string: str.as_str().into(),
        }
    }
}

impl From<&Value> for Value {
    fn from(val: &Value) -> Self {
        val.clone()
    }
}

impl From<TaclInt> for Value {
    fn from(int: TaclInt) -> Self {
        Self {
            string: int.to_string().into(),
        }
    }
}

impl From<TaclFloat> for Value {
    fn from(flt: TaclFloat) -> Self {
        Self {
            string: fmt_float(flt).into(),
        }
    }
}

impl From<bool> for Value {
    fn from(flag: bool) -> Self {
        Value::from(if flag { "1" } else { "0" })
    }
}

impl From<TaclList> for Value {
    fn from(list: TaclList) -> Self {
        Value::from(list::list_to_string(&list))
    }
}

impl From<&[Value]> for Value {
    fn from(list: &[Value]) -> Self {
        Value::from(list::list_to_string(list))
    }
}

/// Formats a float the way the language expects: integral values keep a
/// trailing `.0` so they remain recognizably floating-point.
fn fmt_float(flt: TaclFloat) -> String {
    if flt.is_infinite() || flt.is_nan() {
        return format!("{}", flt);
    }

    let str = format!("{}", flt);
    if str.contains('.') || str.contains('e') || str.contains('E') {
        str
    } else {
        format!("{}.0", str)
    }
}

impl Value {
    /// The empty value.
    pub fn empty() -> Self {
        Value::from("")
    }

    /// The value's string form.
    pub fn as_str(&self) -> &str {
        &self.string
    }

    /// True if the value is the empty string.
    pub fn is_empty(&self) -> bool {
        self.string.is_empty()
    }

    /// Parses the value as an integer: optional sign, decimal digits or a
    /// `0x` hex prefix, surrounded by optional whitespace.
    pub fn as_int(&self) -> Result<TaclInt, Exception> {
        parse_int(self.as_str())
            .ok_or_else(|| Exception::tacl_err(Value::from(format!(
                "expected integer but got \"{}\"",
                self.string
            ))))
    }

    /// Parses the value as a float, with optional surrounding whitespace.
    pub fn as_float(&self) -> Result<TaclFloat, Exception> {
        let trimmed = self.string.trim();
        if trimmed.is_empty() {
            return Err(self.float_error());
        }
        trimmed
            .parse::<TaclFloat>()
            .map_err(|_| self.float_error())
    }

    fn float_error(&self) -> Exception {
        Exception::tacl_err(Value::from(format!(
            "expected floating-point number but got \"{}\"",
            self.string
        )))
    }

    /// Interprets the value as a boolean: the words `true`/`false`,
    /// `yes`/`no`, `on`/`off`, or any numeric value (nonzero is true).
    pub fn as_bool(&self) -> Result<bool, Exception> {
        match self.string.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => return Ok(true),
            "0" | "false" | "no" | "off" => return Ok(false),
            _ => (),
        }

        if let Some(int) = parse_int(self.as_str()) {
            return Ok(int != 0);
        }
        if let Ok(flt) = self.as_float() {
            return Ok(flt != 0.0);
        }

        Err(Exception::tacl_err(Value::from(format!(
            "expected boolean but got \"{}\"",
            self.string
        ))))
    }

    /// Parses the value as a list.
    pub fn as_list(&self) -> Result<TaclList, Exception> {
        list::get_list(self.as_str())
    }

    /// Splits the value into a variable name and optional array index:
    /// `name(index)` refers to an array element, anything else to a scalar.
    pub fn as_var_name(&self) -> VarName {
        VarName::parse(self.as_str())
    }
}

/// Parses C-`strtol`-style integers: optional surrounding whitespace,
/// optional sign, then decimal digits or `0x` hex digits consuming the rest
/// of the string.  Returns `None` on anything else, including overflow.
pub(crate) fn parse_int(str: &str) -> Option<TaclInt> {
    let trimmed = str.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let value = TaclInt::from_str_radix(hex, 16).ok()?;
        return Some(if negative { value.wrapping_neg() } else { value });
    }

    if digits.is_empty() || !digits.bytes().all(|ch| ch.is_ascii_digit()) {
        return None;
    }

    // Parse the magnitude wide, then narrow: the minimum value's magnitude
    // doesn't itself fit in TaclInt.
    let magnitude = digits.parse::<i128>().ok()?;
    let value = if negative { -magnitude } else { magnitude };
    TaclInt::try_from(value).ok()
}

/// A parsed variable reference: the variable name plus the array index, if
/// the reference had the `name(index)` form.
#[derive(Debug, PartialEq, Eq)]
pub struct VarName<'a> {
    name: &'a str,
    index: Option<&'a str>,
}

impl<'a> VarName<'a> {
    pub(crate) fn parse(str: &'a str) -> Self {
        if str.ends_with(')') {
            if let Some(paren) = str.find('(') {
                return Self {
                    name: &str[..paren],
                    index: Some(&str[paren + 1..str.len() - 1]),
                };
            }
        }

        Self {
            name: str,
            index: None,
        }
    }

    /// The variable name proper.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The array index, if the reference named an array element.
    pub fn index(&self) -> Option<&str> {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip() {
        let val = Value::from("howdy");
        assert_eq!(val.as_str(), "howdy");
        assert_eq!(val.to_string(), "howdy");
        assert!(!val.is_empty());
        assert!(Value::empty().is_empty());
    }

    #[test]
    fn test_as_int() {
        assert_eq!(Value::from("5").as_int().unwrap(), 5);
        assert_eq!(Value::from(" -12 ").as_int().unwrap(), -12);
        assert_eq!(Value::from("+3").as_int().unwrap(), 3);
        assert_eq!(Value::from("0x10").as_int().unwrap(), 16);
        assert_eq!(
            Value::from(TaclInt::MIN).as_int().unwrap(),
            TaclInt::MIN
        );

        let err = Value::from("five").as_int().unwrap_err();
        assert_eq!(err.value().as_str(), "expected integer but got \"five\"");
        assert!(Value::from("12.5").as_int().is_err());
        assert!(Value::from("").as_int().is_err());
    }

    #[test]
    fn test_as_float() {
        assert_eq!(Value::from("2.5").as_float().unwrap(), 2.5);
        assert_eq!(Value::from("1e3").as_float().unwrap(), 1000.0);
        assert_eq!(Value::from("7").as_float().unwrap(), 7.0);

        let err = Value::from("abc").as_float().unwrap_err();
        assert_eq!(
            err.value().as_str(),
            "expected floating-point number but got \"abc\""
        );
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(Value::from(2.5).as_str(), "2.5");
        assert_eq!(Value::from(4.0).as_str(), "4.0");
        assert_eq!(Value::from(-0.25).as_str(), "-0.25");
    }

    #[test]
    fn test_as_bool() {
        assert!(Value::from("true").as_bool().unwrap());
        assert!(Value::from("YES").as_bool().unwrap());
        assert!(!Value::from("off").as_bool().unwrap());
        assert!(Value::from("3").as_bool().unwrap());
        assert!(!Value::from("0.0").as_bool().unwrap());
        assert!(Value::from("maybe").as_bool().is_err());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(42).as_str(), "42");
        assert_eq!(Value::from(true).as_str(), "1");
        assert_eq!(Value::from(false).as_str(), "0");

        let list: TaclList = vec![Value::from("a"), Value::from("b c")];
        assert_eq!(Value::from(list).as_str(), "a {b c}");
    }

    #[test]
    fn test_var_name() {
        let val = Value::from("x");
        let name = val.as_var_name();
        assert_eq!(name.name(), "x");
        assert_eq!(name.index(), None);

        let val = Value::from("a(1)");
        let name = val.as_var_name();
        assert_eq!(name.name(), "a");
        assert_eq!(name.index(), Some("1"));

        // Nested parens: index is everything between the first '(' and the
        // final ')'.
        let val = Value::from("a(b(c))");
        let name = val.as_var_name();
        assert_eq!(name.name(), "a");
        assert_eq!(name.index(), Some("b(c)"));

        // No trailing paren means scalar.
        let val = Value::from("a(1");
        assert_eq!(val.as_var_name().index(), None);
    }
}
