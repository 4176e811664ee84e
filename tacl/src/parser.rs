//! The script parser.
//!
//! A script is a sequence of commands separated by newlines or semicolons;
//! each command is a sequence of words.  The parser splits words and records
//! their substitution structure without performing any substitution:
//!
//! * `{...}` — grouped verbatim, substitution suppressed, braces nest.
//! * `"..."` — grouped, `$`/`[...]`/backslash substitution recorded.
//! * `$name`, `$name(index)`, `${name}` — variable references.
//! * `[script]` — a nested script, parsed recursively.
//! * `\x` — backslash escapes; backslash-newline is a line continuation.
//! * `#` at a command boundary starts a comment running to end of line.
//!
//! Evaluation of the parsed [`Script`] happens in [`crate::interp`]; the
//! parser has no access to the interpreter and therefore no side effects.

use crate::list;
use crate::types::*;
use crate::value::Value;

/// A parsed script: a vector of commands, each a vector of words.
#[derive(Clone, Debug, PartialEq)]
pub struct Script {
    commands: Vec<Vec<Word>>,
}

impl Script {
    pub(crate) fn commands(&self) -> &[Vec<Word>] {
        &self.commands
    }
}

/// One word of a command, in parsed form.
#[derive(Clone, Debug, PartialEq)]
pub enum Word {
    /// A literal string: a bare word, or the verbatim contents of braces.
    String(String),

    /// A `$name` scalar variable reference.
    VarRef(String),

    /// A `$name(index)` array element reference; the index is itself a word.
    ArrayRef(String, Box<Word>),

    /// A `[script]` command substitution.
    Script(Script),

    /// A word assembled from several parts, e.g. `"x is $x"`.
    Tokens(Vec<Word>),
}

/// Parses a script.  Returns an error for unmatched braces, brackets, or
/// quotes, or for extra characters after a close brace or quote.
pub fn parse(input: &str) -> Result<Script, Exception> {
    let mut ctx = Context::new(input);
    ctx.parse_script(false)
}

/// Parses a bracketed script body; `input` starts just after the `[`.
/// Returns the script and the number of bytes consumed, including the
/// closing bracket.  Used by the expression evaluator, which must keep its
/// own scan position.
pub(crate) fn parse_bracketed(input: &str) -> Result<(Script, usize), Exception> {
    let mut ctx = Context::new(input);
    let script = ctx.parse_script(true)?;
    Ok((script, ctx.pos))
}

fn parse_error(msg: &str) -> Exception {
    Exception::tacl_err(Value::from(msg))
}

/// Substitution nesting cap; bracket and array-index nesting past this
/// depth errors out instead of exhausting the stack.
const MAX_NESTING_DEPTH: usize = 255;

struct Context<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Context<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.as_bytes().get(self.pos + offset).copied()
    }

    /// The next character, decoded; the parser advances byte-wise but only
    /// ever splits at ASCII delimiters, so multi-byte characters pass
    /// through literal runs intact.
    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_line_space(&mut self) {
        loop {
            match self.peek() {
                Some(b' ') | Some(b'\t') | Some(b'\r') => self.pos += 1,
                Some(b'\\') if self.peek_at(1) == Some(b'\n') => self.pos += 2,
                _ => break,
            }
        }
    }

    /// True if the parse position is a valid word boundary.
    fn at_word_end(&self, bracketed: bool) -> bool {
        match self.peek() {
            None => true,
            Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | Some(b';') => true,
            Some(b'\\') if self.peek_at(1) == Some(b'\n') => true,
            Some(b']') => bracketed,
            _ => false,
        }
    }

    fn parse_script(&mut self, bracketed: bool) -> Result<Script, Exception> {
        let mut commands: Vec<Vec<Word>> = Vec::new();
        let mut words: Vec<Word> = Vec::new();

        loop {
            self.skip_line_space();

            match self.peek() {
                None => {
                    if bracketed {
                        return Err(parse_error("missing close-bracket"));
                    }
                    break;
                }
                Some(b']') if bracketed => {
                    self.pos += 1;
                    break;
                }
                Some(b'\n') | Some(b';') => {
                    self.pos += 1;
                    if !words.is_empty() {
                        commands.push(std::mem::take(&mut words));
                    }
                }
                Some(b'#') if words.is_empty() => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => {
                    words.push(self.parse_word(bracketed)?);
                }
            }
        }

        if !words.is_empty() {
            commands.push(words);
        }

        Ok(Script { commands })
    }

    fn parse_word(&mut self, bracketed: bool) -> Result<Word, Exception> {
        match self.peek() {
            Some(b'{') => self.parse_braced_word(bracketed),
            Some(b'"') => self.parse_quoted_word(bracketed),
            _ => self.parse_bare_word(bracketed),
        }
    }

    /// A braced word: contents taken verbatim, braces nest, backslashed
    /// braces don't count as delimiters.
    fn parse_braced_word(&mut self, bracketed: bool) -> Result<Word, Exception> {
        self.pos += 1;
        let start = self.pos;
        let mut depth = 1;

        loop {
            match self.peek() {
                None => return Err(parse_error("missing close-brace")),
                Some(b'\\') if self.peek_at(1).is_some() => self.pos += 2,
                Some(b'{') => {
                    depth += 1;
                    self.pos += 1;
                }
                Some(b'}') => {
                    depth -= 1;
                    self.pos += 1;
                    if depth == 0 {
                        let content = self.input[start..self.pos - 1].to_string();
                        if !self.at_word_end(bracketed) {
                            return Err(parse_error("extra characters after close-brace"));
                        }
                        return Ok(Word::String(content));
                    }
                }
                Some(_) => self.pos += 1,
            }
        }
    }

    /// A quoted word: substitutions performed, whitespace kept.
    fn parse_quoted_word(&mut self, bracketed: bool) -> Result<Word, Exception> {
        self.pos += 1;
        let mut tokens: Vec<Word> = Vec::new();
        let mut literal = String::new();

        loop {
            match self.peek() {
                None => return Err(parse_error("missing quote")),
                Some(b'"') => {
                    self.pos += 1;
                    if !self.at_word_end(bracketed) {
                        return Err(parse_error("extra characters after close-quote"));
                    }
                    flush(&mut tokens, &mut literal);
                    return Ok(collapse(tokens));
                }
                Some(b'$') => self.var_token(&mut tokens, &mut literal)?,
                Some(b'[') => self.script_token(&mut tokens, &mut literal)?,
                Some(b'\\') => self.backslash_token(&mut literal),
                Some(_) => {
                    let ch = self.peek_char().expect("peeked byte");
                    literal.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    /// A bare word: ends at whitespace, a command separator, or (inside
    /// brackets) the closing bracket.
    fn parse_bare_word(&mut self, bracketed: bool) -> Result<Word, Exception> {
        let mut tokens: Vec<Word> = Vec::new();
        let mut literal = String::new();

        while !self.at_word_end(bracketed) {
            match self.peek() {
                Some(b'$') => self.var_token(&mut tokens, &mut literal)?,
                Some(b'[') => self.script_token(&mut tokens, &mut literal)?,
                Some(b'\\') => self.backslash_token(&mut literal),
                _ => {
                    let ch = self.peek_char().expect("peeked byte");
                    literal.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }

        flush(&mut tokens, &mut literal);
        Ok(collapse(tokens))
    }

    /// A `$` variable reference.  A `$` not followed by a variable name is
    /// an ordinary character.
    fn var_token(&mut self, tokens: &mut Vec<Word>, literal: &mut String) -> Result<(), Exception> {
        self.pos += 1;

        // ${name}: any characters up to the close brace.
        if self.peek() == Some(b'{') {
            self.pos += 1;
            let start = self.pos;
            loop {
                match self.peek() {
                    None => return Err(parse_error("missing close-brace for variable name")),
                    Some(b'}') => break,
                    Some(_) => self.pos += 1,
                }
            }
            let name = self.input[start..self.pos].to_string();
            self.pos += 1;
            flush(tokens, literal);
            tokens.push(Word::VarRef(name));
            return Ok(());
        }

        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }

        if self.pos == start {
            literal.push('$');
            return Ok(());
        }

        let name = self.input[start..self.pos].to_string();
        flush(tokens, literal);

        if self.peek() == Some(b'(') {
            let index = self.parse_index()?;
            tokens.push(Word::ArrayRef(name, Box::new(index)));
        } else {
            tokens.push(Word::VarRef(name));
        }

        Ok(())
    }

    /// The index part of `$name(index)`; substitutions apply inside it.
    fn parse_index(&mut self) -> Result<Word, Exception> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(parse_error(
                "too many nested calls to Interp::eval (infinite loop?)",
            ));
        }
        self.depth += 1;
        self.pos += 1;
        let mut tokens: Vec<Word> = Vec::new();
        let mut literal = String::new();

        loop {
            match self.peek() {
                None => return Err(parse_error("missing )")),
                Some(b')') => {
                    self.pos += 1;
                    flush(&mut tokens, &mut literal);
                    self.depth -= 1;
                    return Ok(collapse(tokens));
                }
                Some(b'$') => self.var_token(&mut tokens, &mut literal)?,
                Some(b'[') => self.script_token(&mut tokens, &mut literal)?,
                Some(b'\\') => self.backslash_token(&mut literal),
                Some(_) => {
                    let ch = self.peek_char().expect("peeked byte");
                    literal.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    /// A `[script]` command substitution.
    fn script_token(
        &mut self,
        tokens: &mut Vec<Word>,
        literal: &mut String,
    ) -> Result<(), Exception> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(parse_error(
                "too many nested calls to Interp::eval (infinite loop?)",
            ));
        }
        self.pos += 1;
        flush(tokens, literal);
        let mut ctx = Context {
            input: &self.input[self.pos..],
            pos: 0,
            depth: self.depth + 1,
        };
        let script = ctx.parse_script(true)?;
        self.pos += ctx.pos;
        tokens.push(Word::Script(script));
        Ok(())
    }

    /// A backslash escape.  Backslash-newline is a line continuation: it
    /// ends a bare word, and inside quotes it collapses (with any following
    /// blanks) to a single space.
    fn backslash_token(&mut self, literal: &mut String) {
        if self.peek_at(1) == Some(b'\n') {
            self.pos += 2;
            while matches!(self.peek(), Some(b' ') | Some(b'\t')) {
                self.pos += 1;
            }
            literal.push(' ');
            return;
        }

        let (subst, used) = list::backslash_subst(self.input, self.pos);
        literal.push_str(&subst);
        self.pos += used;
    }
}

fn flush(tokens: &mut Vec<Word>, literal: &mut String) {
    if !literal.is_empty() {
        tokens.push(Word::String(std::mem::take(literal)));
    }
}

fn collapse(mut tokens: Vec<Word>) -> Word {
    match tokens.len() {
        0 => Word::String(String::new()),
        1 => tokens.pop().expect("length checked"),
        _ => Word::Tokens(tokens),
    }
}
