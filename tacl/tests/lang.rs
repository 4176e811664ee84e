//! End-to-end language tests: scripts evaluated through the public API.

use std::cell::RefCell;
use std::rc::Rc;
use tacl::{tacl_ok, Interp, ObjectCommand, TaclResult, Value, TRACE_WRITE};

fn run(interp: &mut Interp, script: &str) -> String {
    interp.eval(script).unwrap().as_str().to_string()
}

fn run_err(interp: &mut Interp, script: &str) -> String {
    interp.eval(script).unwrap_err().value().as_str().to_string()
}

#[test]
fn set_and_incr() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "set x 5; incr x 3"), "8");
}

#[test]
fn set_get_round_trip() {
    let mut interp = Interp::new();
    run(&mut interp, "set greeting {hello, world}");
    assert_eq!(run(&mut interp, "set greeting"), "hello, world");

    interp
        .set_var(&Value::from("host"), Value::from("from rust"))
        .unwrap();
    assert_eq!(run(&mut interp, "set host"), "from rust");
    assert_eq!(
        interp.var(&Value::from("greeting")).unwrap().as_str(),
        "hello, world"
    );
}

#[test]
fn expr_precedence_and_ternary() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "expr {2+3*4}"), "14");
    assert_eq!(run(&mut interp, "expr {1?2:3}"), "2");
}

#[test]
fn short_circuit_skips_side_effects() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "expr {0 && [set neverSet 1]}"), "0");
    assert!(!interp.var_exists(&Value::from("neverSet")));
    assert_eq!(run(&mut interp, "expr {1 || [set neverSet 1]}"), "1");
    assert!(!interp.var_exists(&Value::from("neverSet")));
}

#[test]
fn proc_defaults() {
    let mut interp = Interp::new();
    run(&mut interp, "proc p {a {b 10}} { expr {$a + $b} }");
    assert_eq!(run(&mut interp, "p 5"), "15");
    assert_eq!(run(&mut interp, "p 5 20"), "25");
}

#[test]
fn proc_too_many_arguments() {
    let mut interp = Interp::new();
    run(&mut interp, "proc q {a b} { list $a $b }");
    assert_eq!(
        run_err(&mut interp, "q 1 2 3"),
        "called \"q\" with too many arguments"
    );
    assert_eq!(
        run_err(&mut interp, "q 1"),
        "no value given for parameter \"b\" to \"q\""
    );
}

#[test]
fn proc_variadic_args() {
    let mut interp = Interp::new();
    run(&mut interp, "proc count {args} { llength $args }");
    assert_eq!(run(&mut interp, "count"), "0");
    assert_eq!(run(&mut interp, "count a b c"), "3");
}

#[test]
fn break_outside_loop_is_error() {
    let mut interp = Interp::new();
    assert_eq!(
        run_err(&mut interp, "break"),
        "invoked \"break\" outside of a loop"
    );

    run(&mut interp, "set n 0");
    run(&mut interp, "while {1} { incr n; break }");
    assert_eq!(run(&mut interp, "set n"), "1");

    run(&mut interp, "set m 0");
    run(&mut interp, "for {set i 0} {$i < 10} {incr i} { if {$i == 3} { break }; incr m }");
    assert_eq!(run(&mut interp, "set m"), "3");
}

#[test]
fn write_trace_fires_per_write_with_new_value() {
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let mut interp = Interp::new();

    let log = seen.clone();
    interp.trace_var(
        &Value::from("x"),
        TRACE_WRITE,
        Rc::new(move |interp, name, _elem, _op| {
            let value = interp.var(&Value::from(name)).unwrap();
            log.borrow_mut().push(value.as_str().to_string());
            None
        }),
    );

    run(&mut interp, "set x 1");
    run(&mut interp, "set x 2");

    // Exactly two firings, each observing the post-write value.
    assert_eq!(*seen.borrow(), vec!["1", "2"]);
}

#[test]
fn upvar_alias_survives_target_unset() {
    let mut interp = Interp::new();
    run(&mut interp, "set target 1");
    run(
        &mut interp,
        "proc probe {} {
            upvar #0 target t
            global out
            unset t
            set out [catch {set t} msg]
            lappend out $msg
            set t revived
        }",
    );
    run(&mut interp, "probe");
    // Reading the dangling alias failed as a missing variable...
    assert_eq!(
        run(&mut interp, "set out"),
        "1 {can't read \"t\": no such variable}"
    );
    // ...and writing through it re-created the target.
    assert_eq!(run(&mut interp, "set target"), "revived");
}

#[test]
fn catch_reports_all_codes() {
    let mut interp = Interp::new();
    assert_eq!(run(&mut interp, "catch { list fine }"), "0");
    assert_eq!(run(&mut interp, "catch { error bad }"), "1");
    assert_eq!(run(&mut interp, "catch { return done }"), "2");
    assert_eq!(run(&mut interp, "catch { break }"), "3");
    assert_eq!(run(&mut interp, "catch { continue }"), "4");
}

#[cfg(feature = "error-stack-trace")]
#[test]
fn error_info_records_stack() {
    let mut interp = Interp::new();
    run(&mut interp, "proc inner {} { error deep }");
    run(&mut interp, "proc outer {} { inner }");
    assert_eq!(run_err(&mut interp, "outer"), "deep");

    let info = run(&mut interp, "set errorInfo");
    assert!(info.starts_with("deep"));
    assert!(info.contains("    while executing"));
    assert!(info.contains("\"error deep\""));
    assert!(info.contains("    (procedure \"inner\")"));
    assert!(info.contains("    invoked from within"));
}

#[test]
fn array_enumeration_is_insertion_ordered() {
    let mut interp = Interp::new();
    run(&mut interp, "set a(zebra) 1; set a(apple) 2; set a(mango) 3");
    assert_eq!(run(&mut interp, "array names a"), "zebra apple mango");

    run(&mut interp, "set found {}");
    run(
        &mut interp,
        "set id [array startsearch a]
         while {[array anymore a $id]} { lappend found [array nextelement a $id] }
         array donesearch a $id",
    );
    assert_eq!(run(&mut interp, "set found"), "zebra apple mango");
}

#[test]
fn unknown_fallback_sees_original_words() {
    let mut interp = Interp::new();
    run(
        &mut interp,
        "proc unknown {args} { return \"unknown: $args\" }",
    );
    assert_eq!(run(&mut interp, "frobnicate a b"), "unknown: frobnicate a b");
}

struct Gadget {
    torn_down: RefCell<Vec<String>>,
}

impl ObjectCommand for Gadget {
    fn execute(&self, _interp: &mut Interp, argv: &[Value]) -> TaclResult {
        tacl_ok!("gadget {}", argv[0])
    }

    fn deleted(&self, name: &str) {
        self.torn_down.borrow_mut().push(name.to_string());
    }
}

#[test]
fn object_command_teardown() {
    let mut interp = Interp::new();
    let gadget = Rc::new(Gadget {
        torn_down: RefCell::new(Vec::new()),
    });

    interp.add_object_command("g1", gadget.clone());
    interp.add_object_command("g2", gadget.clone());
    assert_eq!(run(&mut interp, "g1"), "gadget g1");

    // Overwriting tears down the old binding; removal tears down the other.
    run(&mut interp, "proc g1 {} { list replaced }");
    assert!(interp.remove_command("g2"));
    assert_eq!(*gadget.torn_down.borrow(), vec!["g1", "g2"]);

    assert_eq!(run(&mut interp, "g1"), "replaced");
}

#[test]
fn nested_substitution() {
    let mut interp = Interp::new();
    run(&mut interp, "set inner value");
    run(&mut interp, "set name inner");
    assert_eq!(run(&mut interp, "set result [set [set name]]"), "value");
}

#[test]
fn comments_and_continuations() {
    let mut interp = Interp::new();
    let script = "\
# a comment line
set a 1
set b \\
    [expr {$a + 1}]
set b";
    assert_eq!(run(&mut interp, script), "2");
}

#[test]
fn pathological_nesting_is_an_error() {
    let mut interp = Interp::new();

    let brackets = "[".repeat(100_000);
    assert_eq!(
        run_err(&mut interp, &brackets),
        "too many nested calls to Interp::eval (infinite loop?)"
    );

    let parens = format!("expr {}1", "(".repeat(100_000));
    assert_eq!(
        run_err(&mut interp, &parens),
        "too many nested calls to Interp::eval (infinite loop?)"
    );

    // The interpreter is still usable afterward.
    assert_eq!(run(&mut interp, "expr {1 + 1}"), "2");
}
