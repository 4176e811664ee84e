//! List parsing and formatting.
//!
//! A list is a string whose elements are separated by whitespace, with
//! braces and quotes grouping elements that contain whitespace or other
//! special characters.  `get_list` parses a string into its elements;
//! `list_to_string` produces the canonical string form, quoting each element
//! just enough that parsing it back yields the same elements.

use crate::types::*;
use crate::value::Value;

/// Parses a string as a list.
pub fn get_list(str: &str) -> Result<TaclList, Exception> {
    let bytes = str.as_bytes();
    let mut list: TaclList = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let elem = match bytes[i] {
            b'{' => parse_braced(str, &mut i)?,
            b'"' => parse_quoted(str, &mut i)?,
            _ => parse_bare(str, &mut i),
        };

        list.push(Value::from(elem));
    }

    Ok(list)
}

/// Parses a braced element; `i` points at the open brace.  Brace contents
/// are taken verbatim, with nested braces tracked and backslashed characters
/// not counted as delimiters.
fn parse_braced(str: &str, i: &mut usize) -> Result<String, Exception> {
    let bytes = str.as_bytes();
    let start = *i + 1;
    let mut depth = 1;
    let mut j = start;

    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    let elem = str[start..j].to_string();
                    *i = j + 1;
                    if *i < bytes.len() && !bytes[*i].is_ascii_whitespace() {
                        let trailing = str[*i..].chars().next().unwrap_or(' ');
                        return Err(Exception::tacl_err(Value::from(format!(
                            "list element in braces followed by \"{}\" instead of space",
                            trailing
                        ))));
                    }
                    return Ok(elem);
                }
            }
            _ => (),
        }
        j += 1;
    }

    Err(Exception::tacl_err(Value::from(
        "unmatched open brace in list",
    )))
}

/// Parses a quoted element; `i` points at the open quote.  Backslash
/// escapes are substituted.
fn parse_quoted(str: &str, i: &mut usize) -> Result<String, Exception> {
    let bytes = str.as_bytes();
    let mut elem = String::new();
    let mut j = *i + 1;

    while j < bytes.len() {
        match bytes[j] {
            b'"' => {
                *i = j + 1;
                if *i < bytes.len() && !bytes[*i].is_ascii_whitespace() {
                    let trailing = str[*i..].chars().next().unwrap_or(' ');
                    return Err(Exception::tacl_err(Value::from(format!(
                        "list element in quotes followed by \"{}\" instead of space",
                        trailing
                    ))));
                }
                return Ok(elem);
            }
            b'\\' => {
                let (ch, used) = backslash_subst(str, j);
                elem.push_str(&ch);
                j += used;
            }
            _ => {
                let ch = str[j..].chars().next().expect("byte index at char start");
                elem.push(ch);
                j += ch.len_utf8();
            }
        }
    }

    Err(Exception::tacl_err(Value::from(
        "unmatched open quote in list",
    )))
}

/// Parses a bare element, ending at unescaped whitespace.
fn parse_bare(str: &str, i: &mut usize) -> String {
    let bytes = str.as_bytes();
    let mut elem = String::new();
    let mut j = *i;

    while j < bytes.len() {
        match bytes[j] {
            ch if ch.is_ascii_whitespace() => break,
            b'\\' => {
                let (ch, used) = backslash_subst(str, j);
                elem.push_str(&ch);
                j += used;
            }
            _ => {
                let ch = str[j..].chars().next().expect("byte index at char start");
                elem.push(ch);
                j += ch.len_utf8();
            }
        }
    }

    *i = j;
    elem
}

/// Substitutes a backslash sequence starting at byte `i` (which holds the
/// backslash).  Returns the replacement text and the number of bytes
/// consumed.
pub(crate) fn backslash_subst(str: &str, i: usize) -> (String, usize) {
    let rest = &str[i + 1..];
    let Some(ch) = rest.chars().next() else {
        return ("\\".to_string(), 1);
    };

    let subst = match ch {
        'a' => '\x07',
        'b' => '\x08',
        'f' => '\x0c',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\x0b',
        other => other,
    };

    (subst.to_string(), 1 + ch.len_utf8())
}

/// Converts a slice of values into the canonical list string.
pub fn list_to_string(list: &[Value]) -> String {
    let mut out = String::new();

    for (i, elem) in list.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        quote_elem(elem.as_str(), &mut out);
    }

    out
}

/// Appends one element to the output, quoted as needed: verbatim when it
/// contains no special characters, brace-quoted when its braces balance,
/// and backslash-escaped otherwise.
fn quote_elem(elem: &str, out: &mut String) {
    if elem.is_empty() {
        out.push_str("{}");
        return;
    }

    let special = elem.bytes().any(|ch| {
        ch.is_ascii_whitespace()
            || matches!(ch, b';' | b'$' | b'[' | b']' | b'"' | b'\\' | b'{' | b'}')
    });

    if !special {
        out.push_str(elem);
    } else if braces_balanced(elem) && !elem.ends_with('\\') {
        out.push('{');
        out.push_str(elem);
        out.push('}');
    } else {
        for ch in elem.chars() {
            match ch {
                '\n' => out.push_str("\\n"),
                '\t' => out.push_str("\\t"),
                '\r' => out.push_str("\\r"),
                '\x0c' => out.push_str("\\f"),
                ' ' | ';' | '$' | '[' | ']' | '"' | '\\' | '{' | '}' => {
                    out.push('\\');
                    out.push(ch);
                }
                _ => out.push(ch),
            }
        }
    }
}

/// True if the element's unescaped braces nest properly, so the element can
/// be quoted by bracing it.
fn braces_balanced(elem: &str) -> bool {
    let bytes = elem.as_bytes();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 1,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => (),
        }
        i += 1;
    }

    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(str: &str) -> Vec<String> {
        get_list(str)
            .unwrap()
            .iter()
            .map(|val| val.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_simple_lists() {
        assert_eq!(parse("a b c"), vec!["a", "b", "c"]);
        assert_eq!(parse("  a   b "), vec!["a", "b"]);
        assert!(parse("").is_empty());
    }

    #[test]
    fn test_braced_elements() {
        assert_eq!(parse("a {b c} d"), vec!["a", "b c", "d"]);
        assert_eq!(parse("{a {b c}}"), vec!["a {b c}"]);
        assert_eq!(parse("{}"), vec![""]);
    }

    #[test]
    fn test_quoted_elements() {
        assert_eq!(parse("\"a b\" c"), vec!["a b", "c"]);
        assert_eq!(parse("\"a\\tb\""), vec!["a\tb"]);
    }

    #[test]
    fn test_bare_escapes() {
        assert_eq!(parse("a\\ b"), vec!["a b"]);
        assert_eq!(parse("a\\nb"), vec!["a\nb"]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            get_list("{a b").unwrap_err().value().as_str(),
            "unmatched open brace in list"
        );
        assert_eq!(
            get_list("\"a b").unwrap_err().value().as_str(),
            "unmatched open quote in list"
        );
        assert!(get_list("{a}b").is_err());
    }

    #[test]
    fn test_list_to_string() {
        let list = vec![Value::from("a"), Value::from("b c"), Value::from("")];
        assert_eq!(list_to_string(&list), "a {b c} {}");

        let list = vec![Value::from("un{balanced")];
        assert_eq!(list_to_string(&list), "un\\{balanced");
    }

    #[test]
    fn test_round_trip() {
        let elems = vec![
            Value::from("plain"),
            Value::from("with space"),
            Value::from("brace{inside}"),
            Value::from("un}matched"),
            Value::from(""),
            Value::from("tab\there"),
        ];
        let str = list_to_string(&elems);
        let back = get_list(&str).unwrap();
        assert_eq!(elems, back);
    }
}
