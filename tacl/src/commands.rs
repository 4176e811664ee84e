//! The standard command set.
//!
//! Each command is a [`CommandFunc`] registered by [`register`]; commands
//! validate their arguments with [`check_args`] and signal results through
//! the normal [`TaclResult`] channel, including the `break`, `continue`, and
//! `return` exceptions that the control-flow commands here consume.

use crate::interp::{Interp, Procedure};
use crate::list;
use crate::types::*;
use crate::value::Value;
use crate::{check_args, tacl_err, tacl_ok};
use std::io::Write;
use std::rc::Rc;

/// Registers the standard commands into the interpreter.
pub(crate) fn register(interp: &mut Interp) {
    interp.add_command("append", cmd_append);
    interp.add_command("array", cmd_array);
    interp.add_command("break", cmd_break);
    interp.add_command("catch", cmd_catch);
    interp.add_command("continue", cmd_continue);
    interp.add_command("error", cmd_error);
    interp.add_command("exit", cmd_exit);
    interp.add_command("expr", cmd_expr);
    interp.add_command("for", cmd_for);
    interp.add_command("foreach", cmd_foreach);
    interp.add_command("global", cmd_global);
    interp.add_command("if", cmd_if);
    interp.add_command("incr", cmd_incr);
    #[cfg(feature = "info")]
    interp.add_command("info", cmd_info);
    interp.add_command("join", cmd_join);
    interp.add_command("lappend", cmd_lappend);
    interp.add_command("lindex", cmd_lindex);
    interp.add_command("list", cmd_list);
    interp.add_command("llength", cmd_llength);
    interp.add_command("proc", cmd_proc);
    interp.add_command("puts", cmd_puts);
    interp.add_command("rename", cmd_rename);
    interp.add_command("return", cmd_return);
    interp.add_command("set", cmd_set);
    interp.add_command("source", cmd_source);
    interp.add_command("trace", cmd_trace);
    interp.add_command("unset", cmd_unset);
    interp.add_command("upvar", cmd_upvar);
    interp.add_command("while", cmd_while);
}

/// # append *varName* ?*value* ...?
///
/// Appends the values to the variable, creating it if needed, and returns
/// the variable's new value.
pub fn cmd_append(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 0, "varName ?value ...?")?;

    if argv.len() == 2 {
        return interp.append_var(&argv[1], Value::empty());
    }

    let mut result = Value::empty();
    for value in &argv[2..] {
        result = interp.append_var(&argv[1], value.clone())?;
    }
    Ok(result)
}

/// # array *subcommand* ?*arg* ...?
///
/// Queries and manipulates array variables.
pub fn cmd_array(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    interp.call_subcommand(argv, &ARRAY_SUBCOMMANDS)
}

const ARRAY_SUBCOMMANDS: [Subcommand; 10] = [
    Subcommand("anymore", cmd_array_anymore),
    Subcommand("donesearch", cmd_array_donesearch),
    Subcommand("exists", cmd_array_exists),
    Subcommand("get", cmd_array_get),
    Subcommand("names", cmd_array_names),
    Subcommand("nextelement", cmd_array_nextelement),
    Subcommand("set", cmd_array_set),
    Subcommand("size", cmd_array_size),
    Subcommand("startsearch", cmd_array_startsearch),
    Subcommand("unset", cmd_array_unset),
];

fn cmd_array_exists(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "arrayName")?;
    tacl_ok!(interp.array_exists(argv[2].as_str()))
}

fn cmd_array_get(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "arrayName")?;
    tacl_ok!(interp.array_get(argv[2].as_str()))
}

fn cmd_array_names(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "arrayName")?;
    tacl_ok!(interp.array_indices(argv[2].as_str()))
}

fn cmd_array_set(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 4, 4, "arrayName list")?;
    let kvlist = argv[3].as_list()?;
    if kvlist.len() % 2 != 0 {
        return tacl_err!("list must have an even number of elements");
    }
    interp.array_set(argv[2].as_str(), &kvlist)?;
    tacl_ok!()
}

fn cmd_array_size(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "arrayName")?;
    tacl_ok!(interp.array_size(argv[2].as_str()) as TaclInt)
}

fn cmd_array_unset(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "arrayName")?;
    if interp.array_exists(argv[2].as_str()) {
        interp.unset_var(&argv[2]);
    }
    tacl_ok!()
}

fn cmd_array_startsearch(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "arrayName")?;
    interp.array_search_start(argv[2].as_str())
}

fn cmd_array_anymore(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 4, 4, "arrayName searchId")?;
    let more = interp.array_search_anymore(argv[2].as_str(), argv[3].as_str())?;
    tacl_ok!(more)
}

fn cmd_array_nextelement(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 4, 4, "arrayName searchId")?;
    interp.array_search_next(argv[2].as_str(), argv[3].as_str())
}

fn cmd_array_donesearch(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 4, 4, "arrayName searchId")?;
    interp.array_search_done(argv[2].as_str(), argv[3].as_str())?;
    tacl_ok!()
}

/// # break
///
/// Terminates the innermost enclosing loop.
pub fn cmd_break(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 1, 1, "")?;
    Err(Exception::tacl_break())
}

/// # catch *script* ?*resultVarName*?
///
/// Evaluates the script, catching any exceptional result.  Returns the
/// numeric result code; the script's result or error message is stored in
/// the optional variable.
pub fn cmd_catch(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 3, "script ?resultVarName?")?;

    let (code, value) = match interp.eval_body(&argv[1]) {
        Ok(value) => (ResultCode::Okay, value),
        Err(ex) => {
            if ex.is_error() {
                interp.mirror_error(&ex);
            }
            (ex.code(), ex.value())
        }
    };

    if argv.len() == 3 {
        interp.set_var(&argv[2], value)?;
    }

    tacl_ok!(code.as_int())
}

/// # continue
///
/// Skips to the next iteration of the innermost enclosing loop.
pub fn cmd_continue(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 1, 1, "")?;
    Err(Exception::tacl_continue())
}

/// # error *message* ?*errorInfo*? ?*errorCode*?
///
/// Raises an error.  The optional arguments seed the error's diagnostic
/// data, which is how a caught error is re-raised with its original trace.
pub fn cmd_error(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 4, "message ?errorInfo? ?errorCode?")?;

    let mut ex = Exception::tacl_err(argv[1].clone());
    if argv.len() >= 3 && !argv[2].is_empty() {
        ex.set_error_info(argv[2].as_str());
    }
    if argv.len() == 4 {
        ex.set_error_code(argv[3].clone());
    }
    Err(ex)
}

/// # exit ?*returnCode*?
///
/// Terminates the process.
pub fn cmd_exit(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 1, 2, "?returnCode?")?;

    let code = if argv.len() == 2 { argv[1].as_int()? } else { 0 };
    std::process::exit(code as i32);
}

/// # expr *expr* ?*arg* ...?
///
/// Evaluates the concatenation of the arguments as an expression.
pub fn cmd_expr(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 0, "expr ?arg ...?")?;

    if argv.len() == 2 {
        return interp.expr(&argv[1]);
    }

    let mut text = String::new();
    for (i, arg) in argv[1..].iter().enumerate() {
        if i > 0 {
            text.push(' ');
        }
        text.push_str(arg.as_str());
    }
    interp.expr(&Value::from(text))
}

/// # for *start* *test* *next* *command*
///
/// The C-style loop.  `break` in the body terminates the loop; `continue`
/// skips to the next script.
pub fn cmd_for(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 5, 5, "start test next command")?;

    interp.eval_body(&argv[1])?;

    while interp.expr_bool(&argv[2])? {
        match interp.eval_body(&argv[4]) {
            Ok(_) => (),
            Err(ex) => match ex.code() {
                ResultCode::Break => break,
                ResultCode::Continue => (),
                _ => return Err(ex),
            },
        }
        interp.eval_body(&argv[3])?;
    }

    tacl_ok!()
}

/// # foreach *varList* *list* *body*
///
/// Iterates over the list, binding its items to the variables in chunks.
/// Missing items at the end of the list bind as empty.
pub fn cmd_foreach(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 4, 4, "varList list body")?;

    let var_list = argv[1].as_list()?;
    if var_list.is_empty() {
        return tacl_err!("foreach varlist is empty");
    }
    let items = argv[2].as_list()?;

    let mut next = 0;
    while next < items.len() {
        for var in &var_list {
            let value = items.get(next).cloned().unwrap_or_default();
            next += 1;
            interp.set_var(var, value)?;
        }

        match interp.eval_body(&argv[3]) {
            Ok(_) => (),
            Err(ex) => match ex.code() {
                ResultCode::Break => break,
                ResultCode::Continue => (),
                _ => return Err(ex),
            },
        }
    }

    tacl_ok!()
}

/// # global *varName* ?*varName* ...?
///
/// Links the named global variables into the current procedure's scope.
/// A no-op at global scope.
pub fn cmd_global(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 0, "varName ?varName ...?")?;

    if interp.scope_level() > 0 {
        for name in &argv[1..] {
            interp.upvar(0, name.as_str(), name.as_str())?;
        }
    }
    tacl_ok!()
}

/// # if *expr* ?then? *script* ?elseif *expr* ?then? *script* ...? ?else? ?*script*?
///
/// Conditional evaluation; only the selected script runs.
pub fn cmd_if(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    let mut i = 1;

    loop {
        if i >= argv.len() {
            return tacl_err!(
                "wrong # args: no expression after \"{}\" argument",
                argv[i - 1]
            );
        }
        let flag = interp.expr_bool(&argv[i])?;
        i += 1;

        if i < argv.len() && argv[i].as_str() == "then" {
            i += 1;
        }
        if i >= argv.len() {
            return tacl_err!(
                "wrong # args: no script following \"{}\" argument",
                argv[i - 1]
            );
        }

        if flag {
            return interp.eval_body(&argv[i]);
        }
        i += 1;

        if i >= argv.len() {
            return tacl_ok!();
        }

        match argv[i].as_str() {
            "elseif" => {
                i += 1;
            }
            keyword => {
                if keyword == "else" {
                    i += 1;
                    if i >= argv.len() {
                        return tacl_err!(
                            "wrong # args: no script following \"else\" argument"
                        );
                    }
                }
                if i != argv.len() - 1 {
                    return tacl_err!(
                        "wrong # args: extra words after \"else\" clause in \"if\" command"
                    );
                }
                return interp.eval_body(&argv[i]);
            }
        }
    }
}

/// # incr *varName* ?*increment*?
///
/// Increments the integer variable; a missing variable starts at 0.
pub fn cmd_incr(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 3, "varName ?increment?")?;

    let increment = if argv.len() == 3 { argv[2].as_int()? } else { 1 };
    let current = if interp.var_exists(&argv[1]) {
        interp.var(&argv[1])?.as_int()?
    } else {
        0
    };

    interp.set_var(&argv[1], Value::from(current.wrapping_add(increment)))
}

/// # info *subcommand* ?*arg* ...?
///
/// Introspection: registered commands, defined variables, and procedure
/// definitions.
#[cfg(feature = "info")]
pub fn cmd_info(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    interp.call_subcommand(argv, &INFO_SUBCOMMANDS)
}

#[cfg(feature = "info")]
const INFO_SUBCOMMANDS: [Subcommand; 10] = [
    Subcommand("args", cmd_info_args),
    Subcommand("body", cmd_info_body),
    Subcommand("commands", cmd_info_commands),
    Subcommand("default", cmd_info_default),
    Subcommand("exists", cmd_info_exists),
    Subcommand("globals", cmd_info_globals),
    Subcommand("level", cmd_info_level),
    Subcommand("locals", cmd_info_locals),
    Subcommand("procs", cmd_info_procs),
    Subcommand("vars", cmd_info_vars),
];

#[cfg(feature = "info")]
fn cmd_info_commands(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 2, 2, "")?;
    tacl_ok!(interp.command_names())
}

#[cfg(feature = "info")]
fn cmd_info_exists(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "varName")?;
    tacl_ok!(interp.var_exists(&argv[2]))
}

#[cfg(feature = "info")]
fn cmd_info_globals(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 2, 2, "")?;
    tacl_ok!(interp.vars_in_global_scope())
}

#[cfg(feature = "info")]
fn cmd_info_locals(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 2, 2, "")?;
    tacl_ok!(interp.vars_in_local_scope())
}

#[cfg(feature = "info")]
fn cmd_info_vars(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 2, 2, "")?;
    tacl_ok!(interp.vars_in_scope())
}

#[cfg(feature = "info")]
fn cmd_info_procs(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 2, 2, "")?;
    tacl_ok!(interp.proc_names())
}

#[cfg(feature = "info")]
fn cmd_info_body(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "procname")?;
    match interp.proc_body(argv[2].as_str()) {
        Some(body) => Ok(body),
        None => tacl_err!("\"{}\" isn't a procedure", argv[2]),
    }
}

#[cfg(feature = "info")]
fn cmd_info_args(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "procname")?;
    match interp.proc_args(argv[2].as_str()) {
        Some(args) => tacl_ok!(args),
        None => tacl_err!("\"{}\" isn't a procedure", argv[2]),
    }
}

#[cfg(feature = "info")]
fn cmd_info_default(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 5, 5, "procname arg varname")?;

    let name = argv[2].as_str();
    if interp.proc_args(name).is_none() {
        return tacl_err!("\"{}\" isn't a procedure", argv[2]);
    }

    match interp.proc_default(name, argv[3].as_str()) {
        None => tacl_err!(
            "procedure \"{}\" doesn't have an argument \"{}\"",
            argv[2],
            argv[3]
        ),
        Some(None) => {
            interp.set_var(&argv[4], Value::empty())?;
            tacl_ok!(false)
        }
        Some(Some(default)) => {
            interp.set_var(&argv[4], default)?;
            tacl_ok!(true)
        }
    }
}

#[cfg(feature = "info")]
fn cmd_info_level(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 2, 2, "")?;
    tacl_ok!(interp.scope_level() as TaclInt)
}

/// # join *list* ?*joinString*?
///
/// Joins the list's elements with the separator, a space by default.
pub fn cmd_join(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 3, "list ?joinString?")?;

    let sep = if argv.len() == 3 { argv[2].as_str() } else { " " };
    let items = argv[1].as_list()?;

    let mut joined = String::new();
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            joined.push_str(sep);
        }
        joined.push_str(item.as_str());
    }
    tacl_ok!(joined)
}

/// # lappend *varName* ?*value* ...?
///
/// Appends the values to the variable as list elements, creating the
/// variable as an empty list if needed.
pub fn cmd_lappend(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 0, "varName ?value ...?")?;

    let mut items = if interp.var_exists(&argv[1]) {
        interp.var(&argv[1])?.as_list()?
    } else {
        TaclList::new()
    };
    items.extend_from_slice(&argv[2..]);

    interp.set_var(&argv[1], Value::from(items))
}

/// # lindex *list* ?*index*?
///
/// Returns the list element at the index, or the empty value when the
/// index is out of range.  Without an index, returns the list itself.
pub fn cmd_lindex(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 3, "list ?index?")?;

    if argv.len() == 2 {
        return Ok(argv[1].clone());
    }

    let items = argv[1].as_list()?;
    let index = argv[2].as_int()?;
    if index < 0 || index as usize >= items.len() {
        tacl_ok!()
    } else {
        Ok(items[index as usize].clone())
    }
}

/// # list ?*value* ...?
///
/// Returns its arguments as a well-formed list.
pub fn cmd_list(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    Ok(Value::from(&argv[1..]))
}

/// # llength *list*
pub fn cmd_llength(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 2, "list")?;
    tacl_ok!(argv[1].as_list()?.len() as TaclInt)
}

/// # proc *name* *args* *body*
///
/// Defines a procedure.  Each argument specifier is a name, or a name and
/// a default value; a final `args` parameter takes any extra arguments as
/// a list.
pub fn cmd_proc(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 4, 4, "name args body")?;

    let specs = argv[2].as_list()?;
    let procedure = Procedure::new(&specs, argv[3].clone())?;
    interp.add_proc(argv[1].as_str(), procedure);
    tacl_ok!()
}

/// # puts ?-nonewline? *string*
pub fn cmd_puts(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 3, "?-nonewline? string")?;

    if argv.len() == 3 {
        if argv[1].as_str() != "-nonewline" {
            return tacl_err!("bad option \"{}\": should be -nonewline", argv[1]);
        }
        print!("{}", argv[2]);
        let _ = std::io::stdout().flush();
    } else {
        println!("{}", argv[1]);
    }
    tacl_ok!()
}

/// # rename *oldName* *newName*
///
/// Renames a command; renaming to the empty string removes it.
pub fn cmd_rename(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 3, 3, "oldName newName")?;
    interp.rename_command(argv[1].as_str(), argv[2].as_str())?;
    tacl_ok!()
}

/// # return ?*value*?
///
/// Returns from the enclosing procedure (or script) with the given value.
pub fn cmd_return(_interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 1, 2, "?value?")?;

    let value = if argv.len() == 2 {
        argv[1].clone()
    } else {
        Value::empty()
    };
    Err(Exception::tacl_return(value))
}

/// # set *varName* ?*newValue*?
///
/// Sets or reads a variable.
pub fn cmd_set(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 3, "varName ?newValue?")?;

    if argv.len() == 3 {
        interp.set_var(&argv[1], argv[2].clone())
    } else {
        interp.var(&argv[1])
    }
}

/// # source *filename*
///
/// Evaluates the file's contents as a script.  A `return` in the file
/// terminates the sourcing.
pub fn cmd_source(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 2, "filename")?;

    let filename = argv[1].as_str();
    let script = match std::fs::read_to_string(filename) {
        Ok(script) => script,
        Err(error) => return tacl_err!("couldn't read file \"{}\": {}", filename, error),
    };

    match interp.eval_body(&Value::from(script)) {
        Err(ex) if ex.code() == ResultCode::Return => Ok(ex.value()),
        other => other,
    }
}

/// # trace *subcommand* ?*arg* ...?
///
/// Script-level variable traces.
pub fn cmd_trace(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    interp.call_subcommand(argv, &TRACE_SUBCOMMANDS)
}

const TRACE_SUBCOMMANDS: [Subcommand; 3] = [
    Subcommand("variable", cmd_trace_variable),
    Subcommand("vdelete", cmd_trace_vdelete),
    Subcommand("vinfo", cmd_trace_vinfo),
];

/// Parses a trace operations string: one or more of "rwu".
fn trace_ops_mask(ops: &Value) -> Result<u8, Exception> {
    let mut mask = 0;
    for ch in ops.as_str().chars() {
        mask |= match ch {
            'r' => TRACE_READ,
            'w' => TRACE_WRITE,
            'u' => TRACE_UNSET,
            _ => {
                return tacl_err!(
                    "bad operations \"{}\": should be one or more of rwu",
                    ops
                )
            }
        };
    }
    if mask == 0 {
        return tacl_err!("bad operations \"{}\": should be one or more of rwu", ops);
    }
    Ok(mask)
}

fn trace_ops_string(mask: u8) -> String {
    let mut ops = String::new();
    if mask & TRACE_READ != 0 {
        ops.push('r');
    }
    if mask & TRACE_WRITE != 0 {
        ops.push('w');
    }
    if mask & TRACE_UNSET != 0 {
        ops.push('u');
    }
    ops
}

fn cmd_trace_variable(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 5, 5, "name ops command")?;

    let mask = trace_ops_mask(&argv[3])?;
    let command = argv[4].clone();

    // The callback invokes the command with the variable name, the element
    // (or empty), and the operation letter appended.  An exceptional result
    // vetoes the access.
    let func: Rc<VarTraceFn> = Rc::new(move |interp, name, elem, op| {
        let mut line = command.as_str().to_string();
        line.push(' ');
        let tail = [
            Value::from(name),
            Value::from(elem.unwrap_or("")),
            Value::from(op.letter()),
        ];
        line.push_str(&list::list_to_string(&tail));

        match interp.eval_body(&Value::from(line)) {
            Ok(_) => None,
            Err(ex) => Some(ex.value()),
        }
    });

    interp.add_var_trace(&argv[2], mask, func, Some(argv[4].clone()));
    tacl_ok!()
}

fn cmd_trace_vdelete(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 5, 5, "name ops command")?;

    let mask = trace_ops_mask(&argv[3])?;
    interp.remove_var_trace_matching(&argv[2], mask, &argv[4]);
    tacl_ok!()
}

fn cmd_trace_vinfo(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(2, argv, 3, 3, "name")?;

    let mut items = TaclList::new();
    for (mask, script) in interp.var_trace_info(&argv[2]) {
        if let Some(script) = script {
            let pair = [Value::from(trace_ops_string(mask)), script];
            items.push(Value::from(&pair[..]));
        }
    }
    tacl_ok!(items)
}

/// # unset *varName* ?*varName* ...?
///
/// Removes the named variables or array elements.
pub fn cmd_unset(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 2, 0, "varName ?varName ...?")?;

    for name in &argv[1..] {
        if !interp.var_exists(name) {
            return tacl_err!("can't unset \"{}\": no such variable", name);
        }
        interp.unset_var(name);
    }
    tacl_ok!()
}

/// # upvar ?*level*? *otherVar* *myVar* ?*otherVar* *myVar* ...?
///
/// Links variables in the current scope to variables in an enclosing
/// scope.  The level is `#N` for absolute scope N, or a count of scopes up
/// from the caller (default 1).
pub fn cmd_upvar(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 3, 0, "?level? otherVar myVar ?otherVar myVar ...?")?;

    // The first argument is a level if it starts with '#' or is an integer.
    let first = argv[1].as_str();
    let explicit = first.starts_with('#') || first.parse::<usize>().is_ok();

    let (level, mut next) = if explicit {
        let level = parse_level(interp, first)
            .ok_or_else(|| Exception::tacl_err(Value::from(format!("bad level \"{}\"", first))))?;
        (level, 2)
    } else {
        match interp.scope_level().checked_sub(1) {
            Some(level) => (level, 1),
            None => return tacl_err!("bad level \"1\""),
        }
    };

    if next >= argv.len() || (argv.len() - next) % 2 != 0 {
        return tacl_err!(
            "wrong # args: should be \"upvar ?level? otherVar myVar ?otherVar myVar ...?\""
        );
    }

    while next < argv.len() {
        interp.upvar(level, argv[next].as_str(), argv[next + 1].as_str())?;
        next += 2;
    }
    tacl_ok!()
}

fn parse_level(interp: &Interp, spec: &str) -> Option<usize> {
    if let Some(rest) = spec.strip_prefix('#') {
        let level = rest.parse::<usize>().ok()?;
        if level <= interp.scope_level() {
            Some(level)
        } else {
            None
        }
    } else {
        let up = spec.parse::<usize>().ok()?;
        interp.scope_level().checked_sub(up)
    }
}

/// # while *test* *command*
pub fn cmd_while(interp: &mut Interp, argv: &[Value]) -> TaclResult {
    check_args(1, argv, 3, 3, "test command")?;

    while interp.expr_bool(&argv[1])? {
        match interp.eval_body(&argv[2]) {
            Ok(_) => (),
            Err(ex) => match ex.code() {
                ResultCode::Break => break,
                ResultCode::Continue => (),
                _ => return Err(ex),
            },
        }
    }

    tacl_ok!()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(interp: &mut Interp, script: &str) -> String {
        interp.eval(script).unwrap().as_str().to_string()
    }

    fn run_err(interp: &mut Interp, script: &str) -> String {
        interp.eval(script).unwrap_err().value().as_str().to_string()
    }

    #[test]
    fn test_set_and_incr() {
        let mut interp = Interp::new();
        assert_eq!(run(&mut interp, "set x 5; incr x 3"), "8");
        assert_eq!(run(&mut interp, "incr fresh"), "1");
        assert_eq!(run(&mut interp, "incr x -10"), "-2");
        assert_eq!(
            run_err(&mut interp, "set"),
            "wrong # args: should be \"set varName ?newValue?\""
        );
    }

    #[test]
    fn test_append() {
        let mut interp = Interp::new();
        assert_eq!(run(&mut interp, "append s foo bar"), "foobar");
        assert_eq!(run(&mut interp, "append s !"), "foobar!");
        assert_eq!(run(&mut interp, "append fresh"), "");
    }

    #[test]
    fn test_list_commands() {
        let mut interp = Interp::new();
        assert_eq!(run(&mut interp, "list a {b c} d"), "a {b c} d");
        assert_eq!(run(&mut interp, "llength {a b c}"), "3");
        assert_eq!(run(&mut interp, "lindex {a b c} 1"), "b");
        assert_eq!(run(&mut interp, "lindex {a b c} 5"), "");
        assert_eq!(run(&mut interp, "join {a b c} -"), "a-b-c");
        assert_eq!(run(&mut interp, "lappend v 1 2"), "1 2");
        assert_eq!(run(&mut interp, "lappend v {3 4}"), "1 2 {3 4}");
    }

    #[test]
    fn test_while_loop() {
        let mut interp = Interp::new();
        run(&mut interp, "set i 0; set total 0");
        run(
            &mut interp,
            "while {$i < 5} { incr i; set total [expr {$total + $i}] }",
        );
        assert_eq!(run(&mut interp, "set total"), "15");
    }

    #[test]
    fn test_while_break_continue() {
        let mut interp = Interp::new();
        run(&mut interp, "set n 0; set i 0");
        run(
            &mut interp,
            "while {$i < 10} { incr i; if {$i > 5} { break }; if {$i % 2} { continue }; incr n }",
        );
        assert_eq!(run(&mut interp, "set n"), "2");
        assert_eq!(run(&mut interp, "set i"), "6");
    }

    #[test]
    fn test_for_loop() {
        let mut interp = Interp::new();
        run(&mut interp, "set total 0");
        run(
            &mut interp,
            "for {set i 1} {$i <= 4} {incr i} { incr total $i }",
        );
        assert_eq!(run(&mut interp, "set total"), "10");
        assert_eq!(run(&mut interp, "set i"), "5");
    }

    #[test]
    fn test_foreach() {
        let mut interp = Interp::new();
        run(&mut interp, "set out {}");
        run(&mut interp, "foreach x {a b c} { append out $x }");
        assert_eq!(run(&mut interp, "set out"), "abc");

        // Chunked binding; a short final chunk binds empty.
        run(&mut interp, "set pairs {}");
        run(
            &mut interp,
            "foreach {k v} {a 1 b} { lappend pairs $k=$v }",
        );
        assert_eq!(run(&mut interp, "set pairs"), "a=1 b=");
    }

    #[test]
    fn test_if_command() {
        let mut interp = Interp::new();
        assert_eq!(run(&mut interp, "if {1} { list yes }"), "yes");
        assert_eq!(run(&mut interp, "if {0} { list yes }"), "");
        assert_eq!(run(&mut interp, "if {0} { list a } else { list b }"), "b");
        assert_eq!(
            run(
                &mut interp,
                "if {0} { list a } elseif {1} { list b } else { list c }"
            ),
            "b"
        );
        assert_eq!(run(&mut interp, "if {1} then { list yes }"), "yes");
    }

    #[test]
    fn test_catch_codes() {
        let mut interp = Interp::new();
        assert_eq!(run(&mut interp, "catch { list ok } out"), "0");
        assert_eq!(run(&mut interp, "set out"), "ok");
        assert_eq!(run(&mut interp, "catch { error oops } out"), "1");
        assert_eq!(run(&mut interp, "set out"), "oops");
        assert_eq!(run(&mut interp, "catch { return val } out"), "2");
        assert_eq!(run(&mut interp, "set out"), "val");
        assert_eq!(run(&mut interp, "catch { break }"), "3");
        assert_eq!(run(&mut interp, "catch { continue }"), "4");
    }

    #[test]
    fn test_error_command() {
        let mut interp = Interp::new();
        assert_eq!(run_err(&mut interp, "error oops"), "oops");

        run(&mut interp, "catch { error msg info CODE }");
        assert_eq!(run(&mut interp, "set errorInfo"), "info");
        assert_eq!(run(&mut interp, "set errorCode"), "CODE");
    }

    #[test]
    fn test_global_command() {
        let mut interp = Interp::new();
        run(&mut interp, "set g 1");
        run(&mut interp, "proc bump {} { global g; incr g }");
        run(&mut interp, "bump");
        run(&mut interp, "bump");
        assert_eq!(run(&mut interp, "set g"), "3");
    }

    #[test]
    fn test_upvar_command() {
        let mut interp = Interp::new();
        run(
            &mut interp,
            "proc double {varName} { upvar $varName v; set v [expr {$v * 2}] }",
        );
        run(&mut interp, "set x 4");
        run(&mut interp, "double x");
        assert_eq!(run(&mut interp, "set x"), "8");
    }

    #[test]
    fn test_upvar_absolute_level() {
        let mut interp = Interp::new();
        run(&mut interp, "set g 1");
        run(&mut interp, "proc outer {} { inner }");
        run(&mut interp, "proc inner {} { upvar #0 g v; set v 2 }");
        run(&mut interp, "outer");
        assert_eq!(run(&mut interp, "set g"), "2");
    }

    #[test]
    fn test_upvar_bad_level() {
        let mut interp = Interp::new();
        run(&mut interp, "proc p {} { upvar #9 x y }");
        assert_eq!(run_err(&mut interp, "p"), "bad level \"#9\"");
    }

    #[test]
    fn test_unset_command() {
        let mut interp = Interp::new();
        run(&mut interp, "set x 1");
        run(&mut interp, "unset x");
        assert_eq!(
            run_err(&mut interp, "set x"),
            "can't read \"x\": no such variable"
        );
        assert_eq!(
            run_err(&mut interp, "unset x"),
            "can't unset \"x\": no such variable"
        );

        run(&mut interp, "set a(1) one; set a(2) two");
        run(&mut interp, "unset a(1)");
        assert_eq!(run(&mut interp, "array names a"), "2");
    }

    #[test]
    fn test_array_command() {
        let mut interp = Interp::new();
        run(&mut interp, "set a(z) 1; set a(y) 2");
        assert_eq!(run(&mut interp, "array exists a"), "1");
        assert_eq!(run(&mut interp, "array exists nope"), "0");
        assert_eq!(run(&mut interp, "array size a"), "2");
        assert_eq!(run(&mut interp, "array names a"), "z y");
        assert_eq!(run(&mut interp, "array get a"), "z 1 y 2");

        run(&mut interp, "array set b {k1 v1 k2 v2}");
        assert_eq!(run(&mut interp, "set b(k2)"), "v2");
        assert_eq!(
            run_err(&mut interp, "array set b {odd}"),
            "list must have an even number of elements"
        );
    }

    #[test]
    fn test_array_search() {
        let mut interp = Interp::new();
        run(&mut interp, "set a(one) 1; set a(two) 2");
        run(&mut interp, "set id [array startsearch a]");
        assert_eq!(run(&mut interp, "array anymore a $id"), "1");
        assert_eq!(run(&mut interp, "array nextelement a $id"), "one");
        assert_eq!(run(&mut interp, "array nextelement a $id"), "two");
        assert_eq!(run(&mut interp, "array anymore a $id"), "0");
        run(&mut interp, "array donesearch a $id");
        assert!(run_err(&mut interp, "array anymore a $id").starts_with("couldn't find search"));
        assert_eq!(
            run_err(&mut interp, "array startsearch nope"),
            "\"nope\" isn't an array"
        );
    }

    #[test]
    fn test_trace_command() {
        let mut interp = Interp::new();
        run(&mut interp, "set log {}");
        run(
            &mut interp,
            "proc watch {name elem op} { global log; lappend log $name:$op }",
        );
        run(&mut interp, "trace variable x w watch");
        run(&mut interp, "set x 1");
        run(&mut interp, "set x 2");
        assert_eq!(run(&mut interp, "set log"), "x:w x:w");

        assert_eq!(run(&mut interp, "trace vinfo x"), "{w watch}");
        run(&mut interp, "trace vdelete x w watch");
        run(&mut interp, "set x 3");
        assert_eq!(run(&mut interp, "set log"), "x:w x:w");
        assert_eq!(run(&mut interp, "trace vinfo x"), "");
    }

    #[test]
    fn test_trace_script_veto() {
        let mut interp = Interp::new();
        run(
            &mut interp,
            "proc guard {name elem op} { error \"read-only\" }",
        );
        run(&mut interp, "set x 1");
        run(&mut interp, "trace variable x w guard");
        assert_eq!(
            run_err(&mut interp, "set x 2"),
            "can't set \"x\": read-only"
        );
    }

    #[test]
    fn test_bad_trace_ops() {
        let mut interp = Interp::new();
        assert_eq!(
            run_err(&mut interp, "trace variable x q cmd"),
            "bad operations \"q\": should be one or more of rwu"
        );
    }

    #[test]
    fn test_expr_command_joins_args() {
        let mut interp = Interp::new();
        assert_eq!(run(&mut interp, "expr {2 + 3}"), "5");
        assert_eq!(run(&mut interp, "expr 2 + 3"), "5");
    }

    #[cfg(feature = "info")]
    #[test]
    fn test_info_command() {
        let mut interp = Interp::new();
        assert_eq!(run(&mut interp, "info exists x"), "0");
        run(&mut interp, "set x 1");
        assert_eq!(run(&mut interp, "info exists x"), "1");
        assert_eq!(run(&mut interp, "info level"), "0");

        run(&mut interp, "proc p {a {b 5}} { list $a $b }");
        assert_eq!(run(&mut interp, "info args p"), "a b");
        assert_eq!(run(&mut interp, "info body p"), " list $a $b ");
        assert_eq!(run(&mut interp, "info default p b dvar"), "1");
        assert_eq!(run(&mut interp, "set dvar"), "5");
        assert_eq!(run(&mut interp, "info default p a dvar"), "0");
        assert_eq!(
            run_err(&mut interp, "info body set"),
            "\"set\" isn't a procedure"
        );

        let procs = run(&mut interp, "info procs");
        assert_eq!(procs, "p");
    }

    #[test]
    fn test_rename() {
        let mut interp = Interp::new();
        run(&mut interp, "proc p {} { list 1 }");
        run(&mut interp, "rename p q");
        assert_eq!(run(&mut interp, "q"), "1");
        assert_eq!(
            run_err(&mut interp, "rename p r"),
            "can't rename \"p\": command doesn't exist"
        );
        run(&mut interp, "proc p {} { list 2 }");
        assert_eq!(
            run_err(&mut interp, "rename p q"),
            "can't rename to \"q\": command already exists"
        );
        run(&mut interp, "rename q {}");
        assert!(!interp.has_command("q"));
    }

    #[test]
    fn test_source(){
        let mut interp = Interp::new();
        assert!(
            run_err(&mut interp, "source /no/such/file.tcl")
                .starts_with("couldn't read file \"/no/such/file.tcl\"")
        );
    }

    #[test]
    fn test_subcommand_prefixes() {
        let mut interp = Interp::new();
        run(&mut interp, "set a(x) 1");
        // Unambiguous prefixes are accepted.
        assert_eq!(run(&mut interp, "array ex a"), "1");
        assert!(run_err(&mut interp, "array nope a")
            .starts_with("unknown or ambiguous subcommand \"nope\""));
    }
}
