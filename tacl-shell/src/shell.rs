use rustyline::{error::ReadlineError, history::MemHistory, Config, Editor};
use std::fs;
use tacl::{Interp, TaclList, Value};

/// Invokes an interactive REPL for the given interpreter, using `rustyline`
/// line editing.
///
/// The REPL displays a default prompt.  Press `^C` to terminate the REPL,
/// returning control to the caller.  Entering `exit` will also normally
/// cause the application to terminate (but the `exit` command can be removed
/// or redefined by the application).
///
/// A line with an unclosed brace, bracket, or quote is not evaluated;
/// further lines are read until the command is complete.
///
/// To change the prompt, set the `tcl_prompt1` variable to a script that
/// returns the desired prompt.
///
/// # Example
///
/// ```no_run
/// use tacl::Interp;
///
/// // FIRST, create and initialize the interpreter.
/// let mut interp = Interp::new();
///
/// // NOTE: commands can be added to the interpreter here.
///
/// // NEXT, invoke the REPL.
/// tacl_shell::repl(&mut interp);
/// ```
pub fn repl(interp: &mut Interp) {
    let mut rl = Editor::<(), MemHistory>::with_history(Config::default(), MemHistory::new())
        .expect("failed to init rustyline");

    loop {
        let readline = if let Ok(pscript) = interp.var(&Value::from("tcl_prompt1")) {
            match interp.eval(pscript.as_str()) {
                Ok(prompt) => rl.readline(prompt.as_str()),
                Err(exception) => {
                    println!("{}", exception.value());
                    rl.readline("% ")
                }
            }
        } else {
            rl.readline("% ")
        };

        match readline {
            Ok(line) => {
                let mut command = line;

                // Gather continuation lines until the command is complete.
                while !interp.complete(&command) {
                    match rl.readline("> ") {
                        Ok(more) => {
                            command.push('\n');
                            command.push_str(&more);
                        }
                        Err(_) => break,
                    }
                }

                let command = command.trim();
                if command.is_empty() {
                    continue;
                }

                match interp.eval(command) {
                    Ok(value) => {
                        if let Err(e) = rl.add_history_entry(command) {
                            eprintln!("History error: {e}");
                        }

                        // Don't output empty values.
                        if !value.as_str().is_empty() {
                            println!("{}", value);
                        }
                    }
                    Err(exception) => {
                        println!("{}", exception.value());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("I/O Error: {:?}", err);
                break;
            }
        }
    }
}

/// Executes a script from a set of command line arguments.
///
/// `args[0]` is presumed to be the name of a script file, with any
/// subsequent arguments being arguments to pass to the script.  The script
/// is executed in the context of the given interpreter.
///
/// The calling information is passed to the script through variables:
///
/// * `arg0` is set to the script file name.
/// * `argv` is set to a list containing the remaining arguments.
///
/// # Example
///
/// ```no_run
/// use tacl::Interp;
/// use std::env;
///
/// // FIRST, get the command line arguments.
/// let args: Vec<String> = env::args().collect();
///
/// // NEXT, create and initialize the interpreter.
/// let mut interp = Interp::new();
///
/// // NOTE: commands can be added to the interpreter here.
///
/// // NEXT, evaluate the file, if any.
/// if args.len() > 1 {
///     tacl_shell::script(&mut interp, &args[1..]);
/// } else {
///     eprintln!("Usage: taclsh ?filename.tcl?");
/// }
/// ```
pub fn script(interp: &mut Interp, args: &[String]) {
    let arg0 = &args[0];
    let argv = &args[1..];
    match fs::read_to_string(arg0) {
        Ok(script) => execute_script(interp, script, arg0, argv),
        Err(e) => println!("{}", e),
    }
}

/// Executes the text of a script file with its calling information bound to
/// the `arg0` and `argv` variables.
fn execute_script(interp: &mut Interp, script: String, arg0: &str, argv: &[String]) {
    let argv: TaclList = argv.iter().map(Value::from).collect();
    interp
        .set_var(&Value::from("arg0"), Value::from(arg0))
        .expect("arg0 predefined as array!");
    interp
        .set_var(&Value::from("argv"), Value::from(argv))
        .expect("argv predefined as array!");

    match interp.eval(&script) {
        Ok(_) => (),
        Err(exception) => {
            eprintln!("{}", exception.value());
            std::process::exit(1);
        }
    }
}
