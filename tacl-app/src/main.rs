//! The `taclsh` shell: runs a script file, or an interactive REPL.

use std::env;
use tacl::Interp;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut interp = Interp::new();

    if args.len() > 1 {
        tacl_shell::script(&mut interp, &args[1..]);
    } else {
        println!("Tacl {}", env!("CARGO_PKG_VERSION"));
        tacl_shell::repl(&mut interp);
    }
}
