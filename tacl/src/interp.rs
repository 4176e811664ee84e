//! The interpreter itself.
//!
//! An [`Interp`] owns the command registry and the variable store, and
//! provides the evaluator that ties the parser, the expression engine, and
//! the commands together.  A host embeds the language by creating an
//! `Interp`, registering its own commands, and calling [`Interp::eval`].
//!
//! The evaluator is re-entrant: commands receive `&mut Interp` and may call
//! back into `eval`, which is how every control-flow command works.  A
//! recursion limit bounds the nesting depth.

use crate::commands;
use crate::parser::{self, Script, Word};
use crate::scope::ScopeStack;
use crate::types::*;
use crate::value::Value;
use crate::{check_args, tacl_err};
use indexmap::IndexMap;
use std::rc::Rc;

/// The default maximum depth of nested command invocations.
const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// A registered command.
enum Command {
    /// A native command: a plain Rust function.
    Native(CommandFunc),

    /// A command object carrying host data; told when its binding dies.
    Object(Rc<dyn ObjectCommand>),

    /// A procedure defined by the `proc` command.
    Proc(Procedure),
}

/// The interpreter: a command registry, a scope stack, and the evaluator.
pub struct Interp {
    commands: IndexMap<String, Rc<Command>, TaclHasher>,
    pub(crate) scopes: ScopeStack,

    /// Current command nesting depth, against `recursion_limit`.
    num_levels: usize,
    recursion_limit: usize,

    exec_traces: Vec<ExecTrace>,
    next_exec_trace: ExecTraceId,
}

impl Default for Interp {
    fn default() -> Self {
        Self::new()
    }
}

impl Interp {
    /// Creates an interpreter with no commands at all.  Hosts that want a
    /// restricted language start here and register only what they need.
    pub fn empty() -> Self {
        let mut interp = Self {
            commands: IndexMap::default(),
            scopes: ScopeStack::new(),
            num_levels: 0,
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            exec_traces: Vec::new(),
            next_exec_trace: 1,
        };

        interp.scopes.set_global("errorInfo", Value::empty());
        interp.scopes.set_global("errorCode", Value::from("NONE"));

        interp
    }

    /// Creates an interpreter with the standard command set, and the
    /// process environment in the global `env()` array.
    pub fn new() -> Self {
        let mut interp = Self::empty();
        commands::register(&mut interp);

        for (key, val) in std::env::vars() {
            // Environment writes can't fail: env is fresh, never a scalar.
            let _ = interp
                .scopes
                .set_elem("env", &key, Value::from(val), false);
        }

        interp
    }

    //--------------------------------------------------------------------------------------------
    // Script evaluation

    /// Evaluates a script and returns its result.
    ///
    /// This is the top-level entry point: a `return` in the script yields
    /// the returned value as a normal result, `break` and `continue` outside
    /// a loop become errors, and an error's diagnostic data is mirrored into
    /// the global `errorInfo` and `errorCode` variables.
    pub fn eval(&mut self, script: &str) -> TaclResult {
        let result = parser::parse(script).and_then(|parsed| self.eval_script(&parsed));
        self.finish_eval(result)
    }

    /// Evaluates a script value; see [`Interp::eval`].
    pub fn eval_value(&mut self, script: &Value) -> TaclResult {
        self.eval(script.as_str())
    }

    /// Evaluates a script as the body of a control structure: `return`,
    /// `break`, and `continue` exceptions propagate to the caller, which
    /// owns their semantics.
    pub fn eval_body(&mut self, body: &Value) -> TaclResult {
        let parsed = parser::parse(body.as_str())?;
        self.eval_script(&parsed)
    }

    /// Evaluates an expression string and returns its value.
    pub fn expr(&mut self, text: &Value) -> TaclResult {
        crate::expr::expr(self, text)
    }

    /// Evaluates an expression string as a boolean condition.
    pub fn expr_bool(&mut self, text: &Value) -> Result<bool, Exception> {
        crate::expr::expr_test(self, text)
    }

    /// Evaluates an expression string, requiring an integer result.
    pub fn expr_int(&mut self, text: &Value) -> Result<TaclInt, Exception> {
        self.expr(text)?.as_int()
    }

    /// Evaluates an expression string, requiring a numeric result.
    pub fn expr_float(&mut self, text: &Value) -> Result<TaclFloat, Exception> {
        self.expr(text)?.as_float()
    }

    /// Applies top-level result processing to an evaluation result.
    fn finish_eval(&mut self, result: TaclResult) -> TaclResult {
        let ex = match result {
            Ok(value) => return Ok(value),
            Err(ex) => ex,
        };

        match ex.code() {
            ResultCode::Return | ResultCode::Okay => Ok(ex.value()),
            ResultCode::Break => {
                let ex = Exception::tacl_err(Value::from("invoked \"break\" outside of a loop"));
                self.mirror_error(&ex);
                Err(ex)
            }
            ResultCode::Continue => {
                let ex =
                    Exception::tacl_err(Value::from("invoked \"continue\" outside of a loop"));
                self.mirror_error(&ex);
                Err(ex)
            }
            ResultCode::Error => {
                self.mirror_error(&ex);
                Err(ex)
            }
        }
    }

    pub(crate) fn mirror_error(&mut self, ex: &Exception) {
        if let Some(data) = ex.error_data() {
            self.scopes.set_global("errorInfo", data.error_info());
            self.scopes.set_global("errorCode", data.error_code());
        }
    }

    /// Evaluates a parsed script: each command in turn, the last command's
    /// result becoming the script's result.
    pub(crate) fn eval_script(&mut self, script: &Script) -> TaclResult {
        let mut result = Value::empty();

        for command in script.commands() {
            result = self.eval_command(command)?;
        }

        Ok(result)
    }

    /// Evaluates one command: substitutes its words, then executes.
    fn eval_command(&mut self, words: &[Word]) -> TaclResult {
        let mut argv: Vec<Value> = Vec::with_capacity(words.len());
        for word in words {
            argv.push(self.eval_word(word)?);
        }

        if argv.is_empty() {
            return Ok(Value::empty());
        }

        let result = self.execute(&argv);

        #[cfg(feature = "error-stack-trace")]
        let result = result.map_err(|mut ex| {
            // An error whose errorInfo was supplied wholesale keeps it as-is
            // for the raising command; later frames are appended normally.
            if ex.is_error() && !ex.take_seeded_info() {
                if ex.is_new_error() {
                    ex.add_error_info("    while executing");
                } else {
                    ex.add_error_info("    invoked from within");
                }
                ex.add_error_info(&format!("\"{}\"", crate::list::list_to_string(&argv)));
            }
            ex
        });

        result
    }

    /// Substitutes one word into a value.
    fn eval_word(&mut self, word: &Word) -> TaclResult {
        match word {
            Word::String(str) => Ok(Value::from(str.as_str())),
            Word::VarRef(name) => self.var_by_parts(name, None),
            Word::ArrayRef(name, index) => {
                let index = self.eval_word(index)?;
                self.var_by_parts(name, Some(index.as_str()))
            }
            Word::Script(script) => self.eval_script(script),
            Word::Tokens(tokens) => {
                let mut joined = String::new();
                for token in tokens {
                    joined.push_str(self.eval_word(token)?.as_str());
                }
                Ok(Value::from(joined))
            }
        }
    }

    /// Executes a substituted command line.
    fn execute(&mut self, argv: &[Value]) -> TaclResult {
        let name = argv[0].as_str();

        let Some(cmd) = self.commands.get(name).cloned() else {
            // The unknown fallback: re-dispatch with "unknown" prepended.
            if name != "unknown" && self.commands.contains_key("unknown") {
                let mut fallback = Vec::with_capacity(argv.len() + 1);
                fallback.push(Value::from("unknown"));
                fallback.extend_from_slice(argv);
                return self.execute(&fallback);
            }
            return tacl_err!("invalid command name \"{}\"", name);
        };

        self.num_levels += 1;
        if self.num_levels > self.recursion_limit {
            self.num_levels -= 1;
            return tacl_err!("too many nested calls to Interp::eval (infinite loop?)");
        }

        if !self.exec_traces.is_empty() {
            let fired: Vec<Rc<ExecTraceFn>> = self
                .exec_traces
                .iter()
                .map(|tr| Rc::clone(&tr.func))
                .collect();
            for func in fired {
                func(self, argv[0].as_str(), argv);
            }
        }

        let result = match &*cmd {
            Command::Native(func) => func(self, argv),
            Command::Object(obj) => obj.execute(self, argv),
            Command::Proc(procedure) => procedure.execute(self, argv),
        };

        self.num_levels -= 1;
        result
    }

    /// True if the script is syntactically complete: no unclosed brace,
    /// bracket, or quote.  Line editors use this to decide whether to keep
    /// reading continuation lines.
    pub fn complete(&self, script: &str) -> bool {
        match parser::parse(script) {
            Ok(_) => true,
            Err(ex) => !matches!(
                ex.value().as_str(),
                "missing close-brace"
                    | "missing close-bracket"
                    | "missing quote"
                    | "missing close-brace for variable name"
                    | "missing )"
            ),
        }
    }

    /// The maximum depth of nested command invocations.
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Sets the maximum depth of nested command invocations.
    pub fn set_recursion_limit(&mut self, limit: usize) {
        self.recursion_limit = limit;
    }

    //--------------------------------------------------------------------------------------------
    // Command registry

    /// Registers a native command.  Any previous binding is replaced; if it
    /// was an object command, it is told.
    pub fn add_command(&mut self, name: &str, func: CommandFunc) {
        self.insert_command(name, Command::Native(func));
    }

    /// Registers an object command, attaching host data to a command name.
    pub fn add_object_command(&mut self, name: &str, object: Rc<dyn ObjectCommand>) {
        self.insert_command(name, Command::Object(object));
    }

    pub(crate) fn add_proc(&mut self, name: &str, procedure: Procedure) {
        self.insert_command(name, Command::Proc(procedure));
    }

    fn insert_command(&mut self, name: &str, command: Command) {
        let old = self.commands.insert(name.to_string(), Rc::new(command));
        if let Some(old) = old {
            Self::notify_deleted(&old, name);
        }
    }

    /// Removes a command.  Returns true if it existed.
    pub fn remove_command(&mut self, name: &str) -> bool {
        match self.commands.shift_remove(name) {
            Some(old) => {
                Self::notify_deleted(&old, name);
                true
            }
            None => false,
        }
    }

    /// Renames a command; renaming to the empty string removes it.
    pub fn rename_command(&mut self, old_name: &str, new_name: &str) -> Result<(), Exception> {
        if !self.commands.contains_key(old_name) {
            return Err(Exception::tacl_err(Value::from(format!(
                "can't rename \"{}\": command doesn't exist",
                old_name
            ))));
        }

        if new_name.is_empty() {
            self.remove_command(old_name);
            return Ok(());
        }

        if self.commands.contains_key(new_name) {
            return Err(Exception::tacl_err(Value::from(format!(
                "can't rename to \"{}\": command already exists",
                new_name
            ))));
        }

        // The binding moves intact; the object, if any, is not told.
        if let Some(cmd) = self.commands.shift_remove(old_name) {
            self.commands.insert(new_name.to_string(), cmd);
        }
        Ok(())
    }

    fn notify_deleted(command: &Rc<Command>, name: &str) {
        if let Command::Object(obj) = &**command {
            obj.deleted(name);
        }
    }

    /// True if a command with this name is registered.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// The kind of a registered command: `"native"`, `"object"`, or
    /// `"proc"`.  `None` if no such command exists.
    pub fn command_type(&self, name: &str) -> Option<&'static str> {
        self.commands.get(name).map(|cmd| match &**cmd {
            Command::Native(_) => "native",
            Command::Object(_) => "object",
            Command::Proc(_) => "proc",
        })
    }

    /// The names of all registered commands, in registration order.
    pub fn command_names(&self) -> TaclList {
        self.commands.keys().map(Value::from).collect()
    }

    /// The names of all procedures defined by `proc`.
    pub fn proc_names(&self) -> TaclList {
        self.commands
            .iter()
            .filter(|(_, cmd)| matches!(&***cmd, Command::Proc(_)))
            .map(|(name, _)| Value::from(name))
            .collect()
    }

    fn procedure(&self, name: &str) -> Option<Rc<Command>> {
        let cmd = self.commands.get(name)?;
        if matches!(&**cmd, Command::Proc(_)) {
            Some(Rc::clone(cmd))
        } else {
            None
        }
    }

    /// The body of a procedure, if the name is one.
    pub fn proc_body(&self, name: &str) -> Option<Value> {
        let cmd = self.procedure(name)?;
        let Command::Proc(procedure) = &*cmd else {
            return None;
        };
        Some(procedure.body.clone())
    }

    /// The parameter names of a procedure, if the name is one.
    pub fn proc_args(&self, name: &str) -> Option<TaclList> {
        let cmd = self.procedure(name)?;
        let Command::Proc(procedure) = &*cmd else {
            return None;
        };
        Some(
            procedure
                .params
                .iter()
                .map(|param| Value::from(param.name.as_str()))
                .collect(),
        )
    }

    /// The default value of a procedure parameter: `None` if the name isn't
    /// a procedure or has no such parameter, `Some(None)` if the parameter
    /// has no default.
    pub fn proc_default(&self, name: &str, param: &str) -> Option<Option<Value>> {
        let cmd = self.procedure(name)?;
        let Command::Proc(procedure) = &*cmd else {
            return None;
        };
        procedure
            .params
            .iter()
            .find(|spec| spec.name == param)
            .map(|spec| spec.default.clone())
    }

    //--------------------------------------------------------------------------------------------
    // Variable access

    /// Gets a variable's value, firing read traces.  The name may have the
    /// `name(index)` array element form.
    pub fn var(&mut self, name: &Value) -> TaclResult {
        let parts = name.as_var_name();
        let name = parts.name().to_string();
        let index = parts.index().map(str::to_string);
        self.var_by_parts(&name, index.as_deref())
    }

    fn var_by_parts(&mut self, name: &str, index: Option<&str>) -> TaclResult {
        self.fire_var_traces(name, index, TraceOp::Read)?;
        match index {
            Some(index) => self.scopes.get_elem(name, index),
            None => self.scopes.get(name),
        }
    }

    /// Sets a variable, firing write traces, and returns the new value.
    /// The name may have the `name(index)` array element form.
    pub fn set_var(&mut self, name: &Value, value: Value) -> TaclResult {
        self.set_var_impl(name, value, false)
    }

    /// Appends to a variable, firing write traces, and returns the new
    /// value.  A missing variable starts out empty.
    pub fn append_var(&mut self, name: &Value, value: Value) -> TaclResult {
        self.set_var_impl(name, value, true)
    }

    fn set_var_impl(&mut self, name: &Value, value: Value, append: bool) -> TaclResult {
        let parts = name.as_var_name();
        let name = parts.name().to_string();
        let index = parts.index().map(str::to_string);

        match &index {
            Some(index) => self.scopes.set_elem(&name, index, value, append)?,
            None => self.scopes.set(&name, value, append)?,
        }

        // The write happened; a vetoing trace errors the command but the
        // variable keeps its new value.
        self.fire_var_traces(&name, index.as_deref(), TraceOp::Write)?;

        match &index {
            Some(index) => self.scopes.get_elem(&name, index),
            None => self.scopes.get(&name),
        }
    }

    /// True if the variable (or array element) is defined in the current
    /// scope.  Fires no traces.
    pub fn var_exists(&self, name: &Value) -> bool {
        let parts = name.as_var_name();
        match parts.index() {
            Some(index) => self.scopes.elem_exists(parts.name(), index),
            None => self.scopes.exists(parts.name()),
        }
    }

    /// Unsets a variable or array element, firing unset traces.  Does
    /// nothing if the variable doesn't exist; script-level `unset` checks
    /// existence first.
    pub fn unset_var(&mut self, name: &Value) {
        let parts = name.as_var_name();
        let name = parts.name().to_string();

        match parts.index().map(str::to_string) {
            Some(index) => {
                let _ = self.fire_var_traces(&name, Some(&index), TraceOp::Unset);
                self.scopes.unset_element(&name, &index);
            }
            None => {
                if self.scopes.array_exists(&name) {
                    self.fire_element_unset_traces(&name);
                }
                let _ = self.fire_var_traces(&name, None, TraceOp::Unset);
                self.scopes.unset(&name);
            }
        }
    }

    /// The names visible in the current scope.
    pub fn vars_in_scope(&self) -> TaclList {
        self.scopes.vars_in_scope()
    }

    /// The names defined in the global scope.
    pub fn vars_in_global_scope(&self) -> TaclList {
        self.scopes.vars_in_global_scope()
    }

    /// The names defined locally in the current scope.
    pub fn vars_in_local_scope(&self) -> TaclList {
        self.scopes.vars_in_local_scope()
    }

    /// The current scope level; 0 is the global scope.
    pub fn scope_level(&self) -> usize {
        self.scopes.current()
    }

    /// Links `myname` in the current scope to the variable `other` at the
    /// given scope level.
    pub fn upvar(&mut self, level: usize, other: &str, myname: &str) -> Result<(), Exception> {
        self.scopes.upvar(level, other, myname)
    }

    //--------------------------------------------------------------------------------------------
    // Arrays

    /// True if the name is an array variable in the current scope.
    pub fn array_exists(&self, name: &str) -> bool {
        self.scopes.array_exists(name)
    }

    /// The array's indices and values as a flat list.
    pub fn array_get(&self, name: &str) -> TaclList {
        self.scopes.array_get(name)
    }

    /// Merges a flat index/value list into the array, firing write traces
    /// per element.
    pub fn array_set(&mut self, name: &str, kvlist: &[Value]) -> Result<(), Exception> {
        for pair in kvlist.chunks(2) {
            let elem = Value::from(format!("{}({})", name, pair[0].as_str()));
            self.set_var(&elem, pair[1].clone())?;
        }
        Ok(())
    }

    /// The array's indices.
    pub fn array_indices(&self, name: &str) -> TaclList {
        self.scopes.array_indices(name)
    }

    /// The number of elements in the array.
    pub fn array_size(&self, name: &str) -> usize {
        self.scopes.array_size(name)
    }

    /// Starts a search over the array's indices; returns the search id.
    pub fn array_search_start(&mut self, name: &str) -> TaclResult {
        self.scopes.array_start_search(name)
    }

    /// True if the search has indices left.
    pub fn array_search_anymore(&mut self, name: &str, id: &str) -> Result<bool, Exception> {
        self.scopes.search_anymore(name, id)
    }

    /// The next index in the search, or the empty value when exhausted.
    pub fn array_search_next(&mut self, name: &str, id: &str) -> TaclResult {
        self.scopes.search_next(name, id)
    }

    /// Ends the search, invalidating its id.
    pub fn array_search_done(&mut self, name: &str, id: &str) -> Result<(), Exception> {
        self.scopes.search_done(name, id)
    }

    //--------------------------------------------------------------------------------------------
    // Variable traces

    /// Attaches a trace callback to a variable; `ops` is a mask of
    /// [`TRACE_READ`], [`TRACE_WRITE`], and [`TRACE_UNSET`].  The name may
    /// have the `name(index)` form to trace one array element.  Returns the
    /// trace's id.
    pub fn trace_var(&mut self, name: &Value, ops: u8, func: Rc<VarTraceFn>) -> usize {
        self.add_var_trace(name, ops, func, None)
    }

    pub(crate) fn add_var_trace(
        &mut self,
        name: &Value,
        ops: u8,
        func: Rc<VarTraceFn>,
        script: Option<Value>,
    ) -> usize {
        let parts = name.as_var_name();
        let elem = parts.index().map(str::to_string);
        let name = parts.name().to_string();
        self.scopes.add_trace(&name, elem, ops, func, script)
    }

    /// Removes a variable trace by id.  Returns true if it existed.
    pub fn untrace_var(&mut self, name: &Value, id: usize) -> bool {
        let parts = name.as_var_name();
        let name = parts.name().to_string();
        self.scopes.remove_trace_id(&name, id)
    }

    pub(crate) fn remove_var_trace_matching(
        &mut self,
        name: &Value,
        ops: u8,
        script: &Value,
    ) -> bool {
        let parts = name.as_var_name();
        let name = parts.name().to_string();
        self.scopes.remove_trace_matching(&name, ops, script)
    }

    pub(crate) fn var_trace_info(&self, name: &Value) -> Vec<(u8, Option<Value>)> {
        let parts = name.as_var_name();
        self.scopes.trace_info(parts.name())
    }

    /// Fires the traces for one variable access.  A read or write trace
    /// returning a message vetoes the access; unset traces cannot veto.
    fn fire_var_traces(
        &mut self,
        name: &str,
        elem: Option<&str>,
        op: TraceOp,
    ) -> Result<(), Exception> {
        let fired = self.scopes.collect_traces(name, elem, op);
        if fired.is_empty() {
            return Ok(());
        }

        self.scopes.enter_trace(name);
        let mut veto: Option<Value> = None;
        for trace in fired {
            if let Some(msg) = (trace.func)(self, name, elem, op) {
                if op != TraceOp::Unset {
                    veto = Some(msg);
                    break;
                }
            }
        }
        self.scopes.leave_trace(name);

        match veto {
            None => Ok(()),
            Some(msg) => {
                let verb = match op {
                    TraceOp::Read => "read",
                    TraceOp::Write => "set",
                    TraceOp::Unset => "unset",
                };
                let what = match elem {
                    Some(index) => format!("{}({})", name, index),
                    None => name.to_string(),
                };
                tacl_err!("can't {} \"{}\": {}", verb, what, msg)
            }
        }
    }

    /// Fires element-level unset traces for every element of an array being
    /// unset as a whole.  Whole-variable traces fire once, separately.
    fn fire_element_unset_traces(&mut self, name: &str) {
        let indices: Vec<String> = self
            .scopes
            .array_indices(name)
            .iter()
            .map(|val| val.as_str().to_string())
            .collect();

        for index in indices {
            let fired: Vec<_> = self
                .scopes
                .collect_traces(name, Some(&index), TraceOp::Unset)
                .into_iter()
                .filter(|trace| trace.elem.is_some())
                .collect();
            if fired.is_empty() {
                continue;
            }

            self.scopes.enter_trace(name);
            for trace in fired {
                let _ = (trace.func)(self, name, Some(&index), TraceOp::Unset);
            }
            self.scopes.leave_trace(name);
        }
    }

    //--------------------------------------------------------------------------------------------
    // Execution traces

    /// Registers a callback fired before every command invocation; returns
    /// an id for later removal.
    pub fn add_exec_trace(&mut self, func: Rc<ExecTraceFn>) -> ExecTraceId {
        let id = self.next_exec_trace;
        self.next_exec_trace += 1;
        self.exec_traces.push(ExecTrace { id, func });
        id
    }

    /// Removes an execution trace by id.  Returns true if it existed.
    pub fn remove_exec_trace(&mut self, id: ExecTraceId) -> bool {
        let before = self.exec_traces.len();
        self.exec_traces.retain(|tr| tr.id != id);
        self.exec_traces.len() != before
    }

    //--------------------------------------------------------------------------------------------
    // Ensemble support

    /// Dispatches to a subcommand of an ensemble command; `argv[1]` selects
    /// the subcommand, by name or unambiguous prefix.
    pub fn call_subcommand(
        &mut self,
        argv: &[Value],
        subcommands: &[Subcommand],
    ) -> TaclResult {
        check_args(1, argv, 2, 0, "subcommand ?arg ...?")?;
        let sub = Subcommand::find(subcommands, argv[1].as_str())?;
        (sub.1)(self, argv)
    }
}

/// A procedure defined by the `proc` command.
pub(crate) struct Procedure {
    params: Vec<Param>,
    body: Value,
}

struct Param {
    name: String,
    default: Option<Value>,
}

impl Procedure {
    /// Parses an argument specification list into a procedure.  Each spec
    /// is a name, or a name and a default value.
    pub(crate) fn new(arg_specs: &[Value], body: Value) -> Result<Self, Exception> {
        let mut params = Vec::with_capacity(arg_specs.len());

        for spec in arg_specs {
            let fields = spec.as_list()?;
            if fields.first().map(Value::is_empty).unwrap_or(true) {
                return tacl_err!("argument with no name");
            }
            match fields.len() {
                1 => params.push(Param {
                    name: fields[0].as_str().to_string(),
                    default: None,
                }),
                2 => params.push(Param {
                    name: fields[0].as_str().to_string(),
                    default: Some(fields[1].clone()),
                }),
                _ => {
                    return tacl_err!(
                        "too many fields in argument specifier \"{}\"",
                        spec.as_str()
                    )
                }
            }
        }

        Ok(Self { params, body })
    }

    fn execute(&self, interp: &mut Interp, argv: &[Value]) -> TaclResult {
        interp.scopes.push();
        let result = self
            .bind_params(interp, argv)
            .and_then(|_| interp.eval_body(&self.body));
        interp.scopes.pop();

        match result {
            Ok(value) => Ok(value),
            Err(ex) => match ex.code() {
                ResultCode::Return => Ok(ex.value()),
                ResultCode::Break => {
                    tacl_err!("invoked \"break\" outside of a loop")
                }
                ResultCode::Continue => {
                    tacl_err!("invoked \"continue\" outside of a loop")
                }
                _ => {
                    let mut ex = ex;
                    if ex.is_error() {
                        ex.add_error_info(&format!("    (procedure \"{}\")", argv[0]));
                    }
                    Err(ex)
                }
            },
        }
    }

    /// Binds the call's arguments to the procedure's parameters in the
    /// fresh scope.  A final parameter named `args` takes the remaining
    /// arguments as a list.
    fn bind_params(&self, interp: &mut Interp, argv: &[Value]) -> Result<(), Exception> {
        let mut next = 1;

        for (i, param) in self.params.iter().enumerate() {
            let variadic = param.name == "args" && i == self.params.len() - 1;

            if variadic {
                let rest: TaclList = argv[next.min(argv.len())..].to_vec();
                next = argv.len();
                interp
                    .scopes
                    .set(&param.name, Value::from(rest), false)?;
                break;
            }

            let value = if next < argv.len() {
                let value = argv[next].clone();
                next += 1;
                value
            } else if let Some(default) = &param.default {
                default.clone()
            } else {
                return tacl_err!(
                    "no value given for parameter \"{}\" to \"{}\"",
                    param.name,
                    argv[0]
                );
            };

            interp.scopes.set(&param.name, value, false)?;
        }

        if next < argv.len() {
            return tacl_err!("called \"{}\" with too many arguments", argv[0]);
        }

        Ok(())
    }
}
