//! Public types used throughout the interpreter.
//!
//! The central type is [`Exception`], which represents every non-Okay way a
//! command can complete: errors, `return`, `break`, and `continue`.  Every
//! evaluating function returns a [`TaclResult`], i.e.,
//! `Result<Value, Exception>`, and either forwards the exception unchanged or
//! rewrites its code where it owns loop or procedure semantics.

use crate::interp::Interp;
use crate::value::Value;
use std::rc::Rc;

/// The interpreter's integer type.
pub type TaclInt = i64;

/// The interpreter's floating-point type.
pub type TaclFloat = f64;

/// A list of values, as produced by list commands and argument binding.
pub type TaclList = Vec<Value>;

/// The result of evaluating a script, expression, or command.
pub type TaclResult = Result<Value, Exception>;

/// The hasher used for all name-keyed tables (commands, scopes, arrays).
pub type TaclHasher = fnv::FnvBuildHasher;

/// A native command: a Rust function registered in the command table.
///
/// `argv[0]` is the name under which the command was invoked; the remaining
/// entries are its arguments.
pub type CommandFunc = fn(&mut Interp, &[Value]) -> TaclResult;

/// A command that carries its own state.
///
/// Object commands are how a host application attaches opaque data to a
/// command.  The interpreter calls [`ObjectCommand::deleted`] when the
/// binding is overwritten or removed, so the object can release external
/// resources.  Script-visible behavior is otherwise identical to a native
/// command.
pub trait ObjectCommand {
    /// Executes the command.
    fn execute(&self, interp: &mut Interp, argv: &[Value]) -> TaclResult;

    /// Called when the command's registry entry is overwritten or removed.
    fn deleted(&self, _name: &str) {}
}

/// A callback fired before each command invocation.  Informational only;
/// execution traces cannot veto or alter the command.
pub type ExecTraceFn = dyn Fn(&mut Interp, &str, &[Value]);

/// Trace mask bit: fire on variable reads.
pub const TRACE_READ: u8 = 0x1;
/// Trace mask bit: fire on variable writes.
pub const TRACE_WRITE: u8 = 0x2;
/// Trace mask bit: fire on variable unsets.
pub const TRACE_UNSET: u8 = 0x4;

/// The operation that fired a variable trace.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceOp {
    Read,
    Write,
    Unset,
}

impl TraceOp {
    /// The mask bit corresponding to this operation.
    pub fn mask(self) -> u8 {
        match self {
            TraceOp::Read => TRACE_READ,
            TraceOp::Write => TRACE_WRITE,
            TraceOp::Unset => TRACE_UNSET,
        }
    }

    /// The single-letter name passed to script-level trace callbacks.
    pub fn letter(self) -> &'static str {
        match self {
            TraceOp::Read => "r",
            TraceOp::Write => "w",
            TraceOp::Unset => "u",
        }
    }
}

/// A variable trace callback.
///
/// Receives the interpreter, the variable name, the array element (if the
/// traced access was to an element), and the firing operation.  Returning
/// `Some(message)` from a read or write trace vetoes the access; unset
/// traces cannot veto and their result is ignored.
///
/// Callbacks are handed names, never variable records: a callback may write,
/// unset, or re-trace the variable, and the dispatcher re-resolves it by
/// name afterward.
pub type VarTraceFn = dyn Fn(&mut Interp, &str, Option<&str>, TraceOp) -> Option<Value>;

/// The five control-flow codes.  `Okay` appears only inside exceptions that
/// have been rewritten; normal completion is the `Ok` arm of [`TaclResult`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultCode {
    Okay,
    Error,
    Return,
    Break,
    Continue,
}

impl ResultCode {
    /// The numeric code reported by `catch`.
    pub fn as_int(self) -> TaclInt {
        match self {
            ResultCode::Okay => 0,
            ResultCode::Error => 1,
            ResultCode::Return => 2,
            ResultCode::Break => 3,
            ResultCode::Continue => 4,
        }
    }
}

/// Accumulated diagnostic data for an error exception: the `errorInfo`
/// stack-trace text and the `errorCode` value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorData {
    error_info: String,
    error_code: Value,
}

/// Frame-description lines longer than this are cut and marked with an
/// ellipsis, keeping `errorInfo` bounded for deeply nested commands.
const MAX_INFO_LINE: usize = 160;

impl ErrorData {
    fn new(msg: &Value) -> Self {
        Self {
            error_info: msg.as_str().to_string(),
            error_code: Value::from("NONE"),
        }
    }

    /// The accumulated `errorInfo` text.
    pub fn error_info(&self) -> Value {
        Value::from(self.error_info.as_str())
    }

    /// The machine-readable `errorCode` value.
    pub fn error_code(&self) -> Value {
        self.error_code.clone()
    }

    fn add_info(&mut self, line: &str) {
        self.error_info.push('\n');
        if line.chars().count() > MAX_INFO_LINE {
            let cut: String = line.chars().take(MAX_INFO_LINE).collect();
            self.error_info.push_str(&cut);
            self.error_info.push_str("...");
        } else {
            self.error_info.push_str(line);
        }
    }
}

/// An exceptional return from a script, expression, or command: an error or
/// one of the `return`/`break`/`continue` control codes, together with its
/// value and (for errors) the accumulated diagnostic data.
#[derive(Clone, Debug)]
pub struct Exception {
    code: ResultCode,
    value: Value,
    error_data: Option<ErrorData>,
    new_error: bool,
    info_seeded: bool,
}

// Equality ignores the accumulated error data; two errors with the same
// message compare equal even if caught at different stack depths.
impl PartialEq for Exception {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.value == other.value
    }
}

impl Eq for Exception {}

impl Exception {
    /// Creates an error exception with the given message value.
    pub fn tacl_err(value: Value) -> Self {
        Self {
            code: ResultCode::Error,
            error_data: Some(ErrorData::new(&value)),
            value,
            new_error: true,
            info_seeded: false,
        }
    }

    /// Creates a `return` exception carrying the returned value.
    pub fn tacl_return(value: Value) -> Self {
        Self {
            code: ResultCode::Return,
            value,
            error_data: None,
            new_error: false,
            info_seeded: false,
        }
    }

    /// Creates a `break` exception.
    pub fn tacl_break() -> Self {
        Self {
            code: ResultCode::Break,
            value: Value::empty(),
            error_data: None,
            new_error: false,
            info_seeded: false,
        }
    }

    /// Creates a `continue` exception.
    pub fn tacl_continue() -> Self {
        Self {
            code: ResultCode::Continue,
            value: Value::empty(),
            error_data: None,
            new_error: false,
            info_seeded: false,
        }
    }

    /// The exception's control code.
    pub fn code(&self) -> ResultCode {
        self.code
    }

    /// The exception's value: the error message, or the `return` value.
    pub fn value(&self) -> Value {
        self.value.clone()
    }

    /// True if this is an error exception.
    pub fn is_error(&self) -> bool {
        self.code == ResultCode::Error
    }

    /// True if this error has not yet been annotated with a stack frame.
    /// The evaluator uses this to choose between the `while executing` and
    /// `invoked from within` frame descriptions.
    pub fn is_new_error(&self) -> bool {
        self.new_error
    }

    /// The error's diagnostic data, if this is an error.
    pub fn error_data(&self) -> Option<&ErrorData> {
        self.error_data.as_ref()
    }

    /// Appends one frame-description line to the error's `errorInfo`.
    pub fn add_error_info(&mut self, line: &str) {
        if let Some(data) = &mut self.error_data {
            data.add_info(line);
        }
        self.new_error = false;
    }

    /// Replaces the error's `errorInfo` wholesale; used by the `error`
    /// command's optional info argument to re-raise a caught error with its
    /// original stack trace.
    pub fn set_error_info(&mut self, info: &str) {
        if let Some(data) = &mut self.error_data {
            data.error_info = info.to_string();
        }
        self.new_error = false;
        self.info_seeded = true;
    }

    /// True once, right after [`Exception::set_error_info`].  The evaluator
    /// checks this so the supplied trace passes through the raising command
    /// without an extra frame line; frames are appended normally as the
    /// error propagates further.
    pub(crate) fn take_seeded_info(&mut self) -> bool {
        std::mem::take(&mut self.info_seeded)
    }

    /// Sets the error's machine-readable `errorCode`.
    pub fn set_error_code(&mut self, code: Value) {
        if let Some(data) = &mut self.error_data {
            data.error_code = code;
        }
    }
}

/// A subcommand of an ensemble command: its name and implementation.
#[derive(Debug)]
pub struct Subcommand(pub &'static str, pub CommandFunc);

impl Subcommand {
    /// Looks up a subcommand by name, accepting any unambiguous prefix.
    /// An exact match always wins, even when the name is also a prefix of
    /// other subcommands.  The error message lists the valid names.
    pub fn find<'a>(subcommands: &'a [Subcommand], name: &str) -> Result<&'a Subcommand, Exception> {
        if let Some(sub) = subcommands.iter().find(|sub| sub.0 == name) {
            return Ok(sub);
        }

        let mut prefixed = subcommands.iter().filter(|sub| sub.0.starts_with(name));
        if let (Some(sub), None) = (prefixed.next(), prefixed.next()) {
            return Ok(sub);
        }

        let mut msg = format!("unknown or ambiguous subcommand \"{}\": must be ", name);
        for (i, sub) in subcommands.iter().enumerate() {
            if i > 0 {
                if i == subcommands.len() - 1 {
                    msg.push_str(", or ");
                } else {
                    msg.push_str(", ");
                }
            }
            msg.push_str(sub.0);
        }
        Err(Exception::tacl_err(Value::from(msg)))
    }
}

/// An execution-trace handle, used to remove the trace later.
pub type ExecTraceId = usize;

/// A registered execution trace.
pub(crate) struct ExecTrace {
    pub(crate) id: ExecTraceId,
    pub(crate) func: Rc<ExecTraceFn>,
}
