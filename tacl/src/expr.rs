//! The expression sub-language used by `expr`, `if`, `while`, and `for`.
//!
//! Unlike command evaluation, expressions are typed: operands are parsed
//! into integer, float, or string cells, operators coerce between them, and
//! the final cell is formatted back into a [`Value`] at the end.  Evaluation
//! is a single precedence-climbing pass over the source text with no
//! intermediate tree.
//!
//! `&&`, `||`, and `?:` short-circuit by parsing the untaken side with a
//! suppression counter raised: the text is still syntax-checked, but no
//! variables are read, no bracketed scripts run, and no operators are
//! applied, so `expr {0 && 1/0}` is 0, not an error.

use crate::interp::Interp;
use crate::list;
use crate::parser;
use crate::types::*;
use crate::value::{parse_int, Value};

/// Evaluates an expression string, returning its value.
pub fn expr(interp: &mut Interp, text: &Value) -> TaclResult {
    let mut parser = ExprParser::new(text.as_str());
    let datum = parser.parse(interp, 0)?;

    parser.skip_space();
    if parser.pos < parser.input.len() {
        return Err(parser.syntax_error());
    }

    Ok(datum.into_value())
}

/// Evaluates an expression string as a condition, for the control-flow
/// commands.
pub fn expr_test(interp: &mut Interp, text: &Value) -> Result<bool, Exception> {
    let mut parser = ExprParser::new(text.as_str());
    let datum = parser.parse(interp, 0)?;

    parser.skip_space();
    if parser.pos < parser.input.len() {
        return Err(parser.syntax_error());
    }

    truth(&datum)
}

/// A typed operand cell.
#[derive(Clone, Debug, PartialEq)]
enum Datum {
    Int(TaclInt),
    Flt(TaclFloat),
    Str(Value),
}

impl Datum {
    /// Types a value: integer if it parses as one, float if it parses as
    /// one, string otherwise.
    fn from_value(value: Value) -> Self {
        Self::from_str(value.as_str())
    }

    fn from_str(str: &str) -> Self {
        if let Some(int) = parse_int(str) {
            Datum::Int(int)
        } else if let Ok(flt) = str.trim().parse::<TaclFloat>() {
            if str.trim().is_empty() {
                Datum::Str(Value::from(str))
            } else {
                Datum::Flt(flt)
            }
        } else {
            Datum::Str(Value::from(str))
        }
    }

    fn into_value(self) -> Value {
        match self {
            Datum::Int(int) => Value::from(int),
            Datum::Flt(flt) => Value::from(flt),
            Datum::Str(value) => value,
        }
    }
}

/// The truth of a cell: nonzero numbers, or a recognized boolean word.
fn truth(datum: &Datum) -> Result<bool, Exception> {
    match datum {
        Datum::Int(int) => Ok(*int != 0),
        Datum::Flt(flt) => Ok(*flt != 0.0),
        Datum::Str(value) => value.as_bool(),
    }
}

/// Binary operators, in lexing order: two-byte operators must be tried
/// before their one-byte prefixes.
#[derive(Clone, Copy, Debug, PartialEq)]
enum BinOp {
    Shl,
    Shr,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Lt,
    Gt,
    Plus,
    Minus,
    Times,
    Divide,
    Modulo,
    BitAnd,
    BitXor,
    BitOr,
    Question,
}

impl BinOp {
    fn token(self) -> &'static str {
        match self {
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Plus => "+",
            BinOp::Minus => "-",
            BinOp::Times => "*",
            BinOp::Divide => "/",
            BinOp::Modulo => "%",
            BinOp::BitAnd => "&",
            BinOp::BitXor => "^",
            BinOp::BitOr => "|",
            BinOp::Question => "?",
        }
    }

    fn prec(self) -> u8 {
        match self {
            BinOp::Times | BinOp::Divide | BinOp::Modulo => 12,
            BinOp::Plus | BinOp::Minus => 11,
            BinOp::Shl | BinOp::Shr => 10,
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 9,
            BinOp::Eq | BinOp::Ne => 8,
            BinOp::BitAnd => 7,
            BinOp::BitXor => 6,
            BinOp::BitOr => 5,
            BinOp::And => 4,
            BinOp::Or => 3,
            BinOp::Question => 2,
        }
    }
}

const OPERATORS: [BinOp; 19] = [
    BinOp::Shl,
    BinOp::Shr,
    BinOp::Le,
    BinOp::Ge,
    BinOp::Eq,
    BinOp::Ne,
    BinOp::And,
    BinOp::Or,
    BinOp::Lt,
    BinOp::Gt,
    BinOp::Plus,
    BinOp::Minus,
    BinOp::Times,
    BinOp::Divide,
    BinOp::Modulo,
    BinOp::BitAnd,
    BinOp::BitXor,
    BinOp::BitOr,
    BinOp::Question,
];

/// Nesting cap for the recursive-descent evaluator; parentheses, unary
/// chains, and ternaries past this depth error out instead of exhausting
/// the stack.
const MAX_NESTING_DEPTH: usize = 255;

struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
    /// Nonzero while parsing a short-circuited branch: operands yield
    /// placeholder zeros and operators are not applied.
    no_eval: u32,
    /// Current operand nesting depth, against [`MAX_NESTING_DEPTH`].
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            no_eval: 0,
            depth: 0,
        }
    }

    fn syntax_error(&self) -> Exception {
        Exception::tacl_err(Value::from(format!(
            "syntax error in expression \"{}\"",
            self.input
        )))
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    fn skip_space(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.pos += 1;
            } else if ch == b'\\' && self.bytes().get(self.pos + 1) == Some(&b'\n') {
                // A continuation line inside a braced expression.
                self.pos += 2;
            } else {
                break;
            }
        }
    }

    fn peek_op(&self) -> Option<BinOp> {
        let rest = &self.input[self.pos..];
        OPERATORS
            .iter()
            .copied()
            .find(|op| rest.starts_with(op.token()))
    }

    /// Parses a sub-expression whose operators all bind at least as tightly
    /// as `min_prec`, guarding the recursion depth.
    fn parse(&mut self, interp: &mut Interp, min_prec: u8) -> Result<Datum, Exception> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(too_deep());
        }
        self.depth += 1;
        let result = self.parse_binary(interp, min_prec);
        self.depth -= 1;
        result
    }

    /// The precedence-climbing loop.
    fn parse_binary(&mut self, interp: &mut Interp, min_prec: u8) -> Result<Datum, Exception> {
        let mut lhs = self.parse_unary(interp)?;

        loop {
            self.skip_space();
            let Some(op) = self.peek_op() else {
                break;
            };
            if op.prec() < min_prec {
                break;
            }
            self.pos += op.token().len();

            lhs = match op {
                BinOp::And => self.parse_logical(interp, lhs, false)?,
                BinOp::Or => self.parse_logical(interp, lhs, true)?,
                BinOp::Question => self.parse_ternary(interp, lhs)?,
                _ => {
                    let rhs = self.parse(interp, op.prec() + 1)?;
                    self.apply(op, lhs, rhs)?
                }
            };
        }

        Ok(lhs)
    }

    /// `&&` and `||`.  The right side is parsed either way; when the left
    /// side already decides the answer it is parsed suppressed.
    fn parse_logical(
        &mut self,
        interp: &mut Interp,
        lhs: Datum,
        is_or: bool,
    ) -> Result<Datum, Exception> {
        let prec = if is_or { BinOp::Or.prec() } else { BinOp::And.prec() };

        if self.no_eval > 0 {
            self.parse(interp, prec + 1)?;
            return Ok(Datum::Int(0));
        }

        let left = truth(&lhs)?;
        let decided = left == is_or;

        if decided {
            self.no_eval += 1;
            let result = self.parse(interp, prec + 1);
            self.no_eval -= 1;
            result?;
            Ok(Datum::Int(if is_or { 1 } else { 0 }))
        } else {
            let rhs = self.parse(interp, prec + 1)?;
            Ok(Datum::Int(if truth(&rhs)? { 1 } else { 0 }))
        }
    }

    /// `?:`, right-associative; only the selected branch is evaluated.
    fn parse_ternary(&mut self, interp: &mut Interp, cond: Datum) -> Result<Datum, Exception> {
        let suppressed = self.no_eval > 0;
        let pick_then = if suppressed { true } else { truth(&cond)? };

        if !pick_then {
            self.no_eval += 1;
        }
        let then_result = self.parse(interp, 0);
        if !pick_then {
            self.no_eval -= 1;
        }
        let then_datum = then_result?;

        self.skip_space();
        if self.peek() != Some(b':') {
            return Err(self.syntax_error());
        }
        self.pos += 1;

        if pick_then {
            self.no_eval += 1;
        }
        let else_result = self.parse(interp, BinOp::Question.prec());
        if pick_then {
            self.no_eval -= 1;
        }
        let else_datum = else_result?;

        if suppressed {
            Ok(Datum::Int(0))
        } else if pick_then {
            Ok(then_datum)
        } else {
            Ok(else_datum)
        }
    }

    fn parse_unary(&mut self, interp: &mut Interp) -> Result<Datum, Exception> {
        self.skip_space();

        if self.depth >= MAX_NESTING_DEPTH {
            return Err(too_deep());
        }
        self.depth += 1;

        let result = match self.peek() {
            Some(b'-') => {
                self.pos += 1;
                let operand = self.parse_unary(interp)?;
                self.negate(operand)
            }
            Some(b'+') => {
                self.pos += 1;
                let operand = self.parse_unary(interp)?;
                self.require_number(operand, "+")
            }
            Some(b'!') => {
                self.pos += 1;
                let operand = self.parse_unary(interp)?;
                if self.no_eval > 0 {
                    Ok(Datum::Int(0))
                } else {
                    Ok(Datum::Int(if truth(&operand)? { 0 } else { 1 }))
                }
            }
            Some(b'~') => {
                self.pos += 1;
                let operand = self.parse_unary(interp)?;
                match self.require_int(operand, "~")? {
                    Datum::Int(int) => Ok(Datum::Int(!int)),
                    other => Ok(other),
                }
            }
            _ => self.parse_primary(interp),
        };

        self.depth -= 1;
        result
    }

    fn negate(&self, operand: Datum) -> Result<Datum, Exception> {
        if self.no_eval > 0 {
            return Ok(Datum::Int(0));
        }
        match coerce_number(operand, "-")? {
            Datum::Int(int) => Ok(Datum::Int(int.wrapping_neg())),
            Datum::Flt(flt) => Ok(Datum::Flt(-flt)),
            Datum::Str(_) => Err(non_numeric("-")),
        }
    }

    fn require_number(&self, operand: Datum, op: &str) -> Result<Datum, Exception> {
        if self.no_eval > 0 {
            return Ok(Datum::Int(0));
        }
        coerce_number(operand, op)
    }

    fn require_int(&self, operand: Datum, op: &str) -> Result<Datum, Exception> {
        if self.no_eval > 0 {
            return Ok(Datum::Int(0));
        }
        match coerce_number(operand, op)? {
            operand @ Datum::Int(_) => Ok(operand),
            _ => Err(non_integer(op)),
        }
    }

    fn parse_primary(&mut self, interp: &mut Interp) -> Result<Datum, Exception> {
        self.skip_space();

        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let datum = self.parse(interp, 0)?;
                self.skip_space();
                if self.peek() != Some(b')') {
                    return Err(self.syntax_error());
                }
                self.pos += 1;
                Ok(datum)
            }
            Some(b'$') => self.parse_variable(interp),
            Some(b'[') => self.parse_command(interp),
            Some(b'"') => self.parse_quoted(),
            Some(b'{') => self.parse_braced(),
            Some(ch) if ch.is_ascii_digit() => self.parse_number(),
            Some(b'.') if matches!(self.bytes().get(self.pos + 1), Some(d) if d.is_ascii_digit()) => {
                self.parse_number()
            }
            Some(ch) if ch.is_ascii_alphabetic() || ch == b'_' => {
                let start = self.pos;
                while let Some(ch) = self.peek() {
                    if ch.is_ascii_alphanumeric() || ch == b'_' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                let word = &self.input[start..self.pos];
                // Boolean literals are valid operands; anything else bare
                // would have to be a function call, and there are none.
                if matches!(
                    word.to_lowercase().as_str(),
                    "true" | "false" | "yes" | "no" | "on" | "off"
                ) {
                    Ok(Datum::Str(Value::from(word)))
                } else {
                    Err(Exception::tacl_err(Value::from(format!(
                        "unknown math function \"{}\"",
                        word
                    ))))
                }
            }
            _ => Err(self.syntax_error()),
        }
    }

    /// `$name` or `$name(index)`; the index is taken literally.
    fn parse_variable(&mut self, interp: &mut Interp) -> Result<Datum, Exception> {
        self.pos += 1;
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.syntax_error());
        }

        let mut name = self.input[start..self.pos].to_string();
        if self.peek() == Some(b'(') {
            let Some(close) = self.input[self.pos..].find(')') else {
                return Err(self.syntax_error());
            };
            name.push_str(&self.input[self.pos..self.pos + close + 1]);
            self.pos += close + 1;
        }

        if self.no_eval > 0 {
            return Ok(Datum::Int(0));
        }
        let value = interp.var(&Value::from(name))?;
        Ok(Datum::from_value(value))
    }

    /// `[script]`: the script is parsed either way, but only run when not
    /// suppressed.
    fn parse_command(&mut self, interp: &mut Interp) -> Result<Datum, Exception> {
        let (script, used) = parser::parse_bracketed(&self.input[self.pos + 1..])?;
        self.pos += 1 + used;

        if self.no_eval > 0 {
            return Ok(Datum::Int(0));
        }
        let value = interp.eval_script(&script)?;
        Ok(Datum::from_value(value))
    }

    /// A double-quoted operand; backslash sequences are substituted.  The
    /// operand stays string-typed: comparisons on it are lexical, and the
    /// numeric operators coerce it when applied.
    fn parse_quoted(&mut self) -> Result<Datum, Exception> {
        self.pos += 1;
        let mut text = String::new();

        loop {
            match self.peek() {
                None => return Err(self.syntax_error()),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(Datum::Str(Value::from(text)));
                }
                Some(b'\\') => {
                    let (subst, used) = list::backslash_subst(self.input, self.pos);
                    text.push_str(&subst);
                    self.pos += used;
                }
                Some(_) => {
                    let ch = self.input[self.pos..]
                        .chars()
                        .next()
                        .ok_or_else(|| self.syntax_error())?;
                    text.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    /// A braced operand: the contents are taken verbatim, and stay
    /// string-typed like a quoted operand.
    fn parse_braced(&mut self) -> Result<Datum, Exception> {
        let start = self.pos + 1;
        let mut depth = 1;
        let mut j = start;
        let bytes = self.bytes();

        while j < bytes.len() {
            match bytes[j] {
                b'\\' => j += 1,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        let text = &self.input[start..j];
                        self.pos = j + 1;
                        return Ok(Datum::Str(Value::from(text)));
                    }
                }
                _ => (),
            }
            j += 1;
        }

        Err(self.syntax_error())
    }

    fn parse_number(&mut self) -> Result<Datum, Exception> {
        let start = self.pos;
        let bytes = self.bytes();

        if self.input[start..].starts_with("0x") || self.input[start..].starts_with("0X") {
            self.pos += 2;
            let digits = self.pos;
            while matches!(self.peek(), Some(ch) if ch.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            if self.pos == digits {
                return Err(self.syntax_error());
            }
            return match TaclInt::from_str_radix(&self.input[digits..self.pos], 16) {
                Ok(int) => Ok(Datum::Int(int)),
                Err(_) => Err(self.syntax_error()),
            };
        }

        let mut is_float = false;
        while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
            self.pos += 1;
        }
        if self.peek() == Some(b'.')
            && matches!(bytes.get(self.pos + 1), Some(d) if d.is_ascii_digit())
        {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mut j = self.pos + 1;
            if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
                j += 1;
            }
            if matches!(bytes.get(j), Some(d) if d.is_ascii_digit()) {
                is_float = true;
                self.pos = j;
                while matches!(self.peek(), Some(ch) if ch.is_ascii_digit()) {
                    self.pos += 1;
                }
            }
        }

        let text = &self.input[start..self.pos];
        if !is_float {
            if let Ok(int) = text.parse::<TaclInt>() {
                return Ok(Datum::Int(int));
            }
            // Decimal literals too big for the integer type degrade to
            // floats rather than erroring.
        }
        match text.parse::<TaclFloat>() {
            Ok(flt) => Ok(Datum::Flt(flt)),
            Err(_) => Err(self.syntax_error()),
        }
    }

    //--------------------------------------------------------------------------------------------
    // Operator application

    fn apply(&self, op: BinOp, lhs: Datum, rhs: Datum) -> Result<Datum, Exception> {
        if self.no_eval > 0 {
            return Ok(Datum::Int(0));
        }

        match op {
            BinOp::Plus | BinOp::Minus | BinOp::Times | BinOp::Divide | BinOp::Modulo => {
                self.arith(op, lhs, rhs)
            }
            BinOp::Shl | BinOp::Shr | BinOp::BitAnd | BinOp::BitXor | BinOp::BitOr => {
                self.bitwise(op, lhs, rhs)
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne => {
                self.compare(op, lhs, rhs)
            }
            BinOp::And | BinOp::Or | BinOp::Question => unreachable!("handled in parse loop"),
        }
    }

    fn arith(&self, op: BinOp, lhs: Datum, rhs: Datum) -> Result<Datum, Exception> {
        let lhs = coerce_number(lhs, op.token())?;
        let rhs = coerce_number(rhs, op.token())?;
        match (lhs, rhs) {
            (Datum::Int(a), Datum::Int(b)) => match op {
                BinOp::Plus => Ok(Datum::Int(a.wrapping_add(b))),
                BinOp::Minus => Ok(Datum::Int(a.wrapping_sub(b))),
                BinOp::Times => Ok(Datum::Int(a.wrapping_mul(b))),
                BinOp::Divide => {
                    if b == 0 {
                        Err(Exception::tacl_err(Value::from("divide by zero")))
                    } else {
                        Ok(Datum::Int(a.wrapping_div(b)))
                    }
                }
                BinOp::Modulo => {
                    if b == 0 {
                        Err(Exception::tacl_err(Value::from("divide by zero")))
                    } else {
                        Ok(Datum::Int(a.wrapping_rem(b)))
                    }
                }
                _ => unreachable!(),
            },
            (lhs, rhs) => {
                if op == BinOp::Modulo {
                    return Err(non_integer(op.token()));
                }
                let a = as_float(lhs);
                let b = as_float(rhs);
                match op {
                    BinOp::Plus => Ok(Datum::Flt(a + b)),
                    BinOp::Minus => Ok(Datum::Flt(a - b)),
                    BinOp::Times => Ok(Datum::Flt(a * b)),
                    BinOp::Divide => {
                        if b == 0.0 {
                            Err(Exception::tacl_err(Value::from("divide by zero")))
                        } else {
                            Ok(Datum::Flt(a / b))
                        }
                    }
                    _ => unreachable!(),
                }
            }
        }
    }

    fn bitwise(&self, op: BinOp, lhs: Datum, rhs: Datum) -> Result<Datum, Exception> {
        let lhs = coerce_number(lhs, op.token())?;
        let rhs = coerce_number(rhs, op.token())?;
        let (a, b) = match (lhs, rhs) {
            (Datum::Int(a), Datum::Int(b)) => (a, b),
            _ => return Err(non_integer(op.token())),
        };

        let result = match op {
            BinOp::Shl => a.wrapping_shl(b as u32),
            BinOp::Shr => a.wrapping_shr(b as u32),
            BinOp::BitAnd => a & b,
            BinOp::BitXor => a ^ b,
            BinOp::BitOr => a | b,
            _ => unreachable!(),
        };
        Ok(Datum::Int(result))
    }

    /// Comparisons are numeric when both sides are numbers, lexical when
    /// either side is a string.
    fn compare(&self, op: BinOp, lhs: Datum, rhs: Datum) -> Result<Datum, Exception> {
        use std::cmp::Ordering;

        let lexical = matches!(lhs, Datum::Str(_)) || matches!(rhs, Datum::Str(_));
        let ordering = if lexical {
            let a = lhs.into_value();
            let b = rhs.into_value();
            a.as_str().cmp(b.as_str())
        } else if let (Datum::Int(a), Datum::Int(b)) = (&lhs, &rhs) {
            a.cmp(b)
        } else {
            let a = as_float(lhs);
            let b = as_float(rhs);
            a.partial_cmp(&b).unwrap_or(Ordering::Less)
        };

        let flag = match op {
            BinOp::Lt => ordering == Ordering::Less,
            BinOp::Gt => ordering == Ordering::Greater,
            BinOp::Le => ordering != Ordering::Greater,
            BinOp::Ge => ordering != Ordering::Less,
            BinOp::Eq => ordering == Ordering::Equal,
            BinOp::Ne => ordering != Ordering::Equal,
            _ => unreachable!(),
        };
        Ok(Datum::Int(if flag { 1 } else { 0 }))
    }
}

fn as_float(datum: Datum) -> TaclFloat {
    match datum {
        Datum::Int(int) => int as TaclFloat,
        Datum::Flt(flt) => flt,
        Datum::Str(_) => unreachable!("callers rule out strings"),
    }
}

/// Coerces a string operand to a number for a numeric operator.  Non-string
/// cells pass through.
fn coerce_number(datum: Datum, op: &str) -> Result<Datum, Exception> {
    match datum {
        Datum::Str(value) => match Datum::from_value(value) {
            Datum::Str(_) => Err(non_numeric(op)),
            number => Ok(number),
        },
        other => Ok(other),
    }
}

fn too_deep() -> Exception {
    Exception::tacl_err(Value::from(
        "too many nested calls to Interp::eval (infinite loop?)",
    ))
}

fn non_numeric(op: &str) -> Exception {
    Exception::tacl_err(Value::from(format!(
        "can't use non-numeric string as operand of \"{}\"",
        op
    )))
}

fn non_integer(op: &str) -> Exception {
    Exception::tacl_err(Value::from(format!(
        "can't use floating-point value as operand of \"{}\"",
        op
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calc(text: &str) -> String {
        let mut interp = Interp::new();
        expr(&mut interp, &Value::from(text))
            .unwrap()
            .as_str()
            .to_string()
    }

    fn calc_err(text: &str) -> String {
        let mut interp = Interp::new();
        expr(&mut interp, &Value::from(text))
            .unwrap_err()
            .value()
            .as_str()
            .to_string()
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(calc("2+3*4"), "14");
        assert_eq!(calc("(2+3)*4"), "20");
        assert_eq!(calc("7/2"), "3");
        assert_eq!(calc("7%3"), "1");
        assert_eq!(calc("-3 + 1"), "-2");
        assert_eq!(calc("0x10 + 1"), "17");
    }

    #[test]
    fn test_float_arithmetic() {
        assert_eq!(calc("7.0/2"), "3.5");
        assert_eq!(calc("1.5 + 1.5"), "3.0");
        assert_eq!(calc("1e3 + 0"), "1000.0");
        assert_eq!(calc(".5 * 2"), "1.0");
    }

    #[test]
    fn test_divide_by_zero() {
        assert_eq!(calc_err("1/0"), "divide by zero");
        assert_eq!(calc_err("1%0"), "divide by zero");
        assert_eq!(calc_err("1.0/0"), "divide by zero");
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(calc("1 < 2"), "1");
        assert_eq!(calc("2 <= 2"), "1");
        assert_eq!(calc("2 > 3"), "0");
        assert_eq!(calc("2 == 2.0"), "1");
        assert_eq!(calc("1 != 2"), "1");
    }

    #[test]
    fn test_string_comparisons() {
        assert_eq!(calc("\"abc\" < \"abd\""), "1");
        assert_eq!(calc("\"a\" == \"a\""), "1");
        // One string side forces lexical comparison.
        assert_eq!(calc("\"10\" < \"9\""), "1");
    }

    #[test]
    fn test_logical() {
        assert_eq!(calc("1 && 1"), "1");
        assert_eq!(calc("1 && 0"), "0");
        assert_eq!(calc("0 || 1"), "1");
        assert_eq!(calc("!0"), "1");
        assert_eq!(calc("!3"), "0");
        assert_eq!(calc("true && 1"), "1");
        assert_eq!(calc("off || no"), "0");
    }

    #[test]
    fn test_short_circuit() {
        // The untaken side is parsed but never evaluated.
        assert_eq!(calc("0 && 1/0"), "0");
        assert_eq!(calc("1 || 1/0"), "1");
        assert_eq!(calc("0 && $noSuchVar"), "0");
        assert_eq!(calc("1 || [no_such_command]"), "1");
    }

    #[test]
    fn test_ternary() {
        assert_eq!(calc("1 ? 2 : 3"), "2");
        assert_eq!(calc("0 ? 2 : 3"), "3");
        assert_eq!(calc("1 ? 2 : 1/0"), "2");
        assert_eq!(calc("0 ? 1/0 : 3"), "3");
        // Right-associative chaining.
        assert_eq!(calc("0 ? 1 : 0 ? 2 : 3"), "3");
    }

    #[test]
    fn test_bitwise() {
        assert_eq!(calc("6 & 3"), "2");
        assert_eq!(calc("6 | 3"), "7");
        assert_eq!(calc("6 ^ 3"), "5");
        assert_eq!(calc("1 << 3"), "8");
        assert_eq!(calc("16 >> 2"), "4");
        assert_eq!(calc("~0"), "-1");
    }

    #[test]
    fn test_operand_type_errors() {
        assert_eq!(
            calc_err("\"abc\" + 1"),
            "can't use non-numeric string as operand of \"+\""
        );
        assert_eq!(
            calc_err("1.5 & 2"),
            "can't use floating-point value as operand of \"&\""
        );
        assert_eq!(
            calc_err("1.5 % 2"),
            "can't use floating-point value as operand of \"%\""
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(calc_err("abc"), "unknown math function \"abc\"");
        assert_eq!(calc_err("1 + foo(2)"), "unknown math function \"foo\"");
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(calc_err("1 +"), "syntax error in expression \"1 +\"");
        assert!(calc_err("(1").starts_with("syntax error"));
        assert!(calc_err("1 ? 2").starts_with("syntax error"));
        assert!(calc_err("1 2").starts_with("syntax error"));
    }

    #[test]
    fn test_variables() {
        let mut interp = Interp::new();
        interp
            .set_var(&Value::from("x"), Value::from("5"))
            .unwrap();
        assert_eq!(
            expr(&mut interp, &Value::from("$x * 2")).unwrap().as_str(),
            "10"
        );

        let err = expr(&mut interp, &Value::from("$nope")).unwrap_err();
        assert_eq!(
            err.value().as_str(),
            "can't read \"nope\": no such variable"
        );
    }

    #[test]
    fn test_command_substitution() {
        let mut interp = Interp::new();
        assert_eq!(
            expr(&mut interp, &Value::from("[list 7] + 2"))
                .unwrap()
                .as_str(),
            "9"
        );
    }

    #[test]
    fn test_braced_and_quoted_operands() {
        assert_eq!(calc("{12} + 1"), "13");
        assert_eq!(calc("\"1.5\" + 0.5"), "2.0");
        assert_eq!(calc("\"a\\tb\" == \"a\tb\""), "1");
    }

    #[test]
    fn test_string_operands_coerce_for_numeric_operators() {
        // Quoted and braced operands compare lexically but still work as
        // numbers under arithmetic and bitwise operators.
        assert_eq!(calc("\"10\" + 0"), "10");
        assert_eq!(calc("\"6\" & 3"), "2");
        assert_eq!(calc("{2} * {3}"), "6");
        assert_eq!(calc("- \"5\""), "-5");
        assert_eq!(calc("\"10\" < \"9\""), "1");
    }

    #[test]
    fn test_nesting_depth_limit() {
        let parens = "(".repeat(10_000);
        assert_eq!(
            calc_err(&parens),
            "too many nested calls to Interp::eval (infinite loop?)"
        );

        let minuses = format!("{}1", "-".repeat(10_000));
        assert_eq!(
            calc_err(&minuses),
            "too many nested calls to Interp::eval (infinite loop?)"
        );

        let ternaries = format!("{}0", "1?1:".repeat(10_000));
        assert!(calc_err(&ternaries).starts_with("too many nested calls"));

        // Reasonable nesting is unaffected.
        assert_eq!(calc(&format!("{}7{}", "(".repeat(50), ")".repeat(50))), "7");
    }

    #[test]
    fn test_condition_helper() {
        let mut interp = Interp::new();
        assert!(expr_test(&mut interp, &Value::from("1 < 2")).unwrap());
        assert!(!expr_test(&mut interp, &Value::from("false")).unwrap());
        assert!(expr_test(&mut interp, &Value::from("yes")).unwrap());
    }
}
