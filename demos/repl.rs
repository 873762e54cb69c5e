use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use statelisp::Interpreter;
use statelisp::ast::Value;
use statelisp::builtinops::{ArgKind, Arity, PrimitiveTable};
use statelisp::evaluator::{Bindings, SPECIAL_FORMS};
use statelisp::wire;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    // RUST_LOG=statelisp=trace shows every primitive dispatch and closure call
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run_repl() {
        eprintln!("The REPL encountered an unexpected error and must exit: {e}");
        process::exit(1);
    }
}

fn run_repl() -> Result<(), ReadlineError> {
    println!("Statelisp evaluator");
    println!("Enter forms like: (do (def x 1) (+ x 2))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;

    // Register a host primitive alongside the shipped catalog for demonstration purposes
    let mut table = PrimitiveTable::pure();
    table.register("print", Arity::Exact(1), vec![ArgKind::Any], |_, args| {
        for arg in &args {
            println!("{arg}");
        }
        Ok(Value::Null)
    });
    let mut interp = Interpreter::new(Bindings::with_table(table));

    let mut wire_mode = false;

    loop {
        match rl.readline("statelisp> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help(&interp);
                        continue;
                    }
                    ":env" => {
                        print_environment(interp.bindings());
                        continue;
                    }
                    ":wire" => {
                        wire_mode = !wire_mode;
                        if wire_mode {
                            println!("Wire mode enabled: results shown as JSON envelopes");
                        } else {
                            println!("Wire mode disabled: results shown as forms");
                        }
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match interp.eval_str(line) {
                    // Don't print Null values (e.g., from def)
                    Ok(Value::Null) => {}
                    Ok(result) if wire_mode => match wire::to_json(&result) {
                        Ok(json) => println!("{json}"),
                        Err(_) => println!("{result}"),
                    },
                    Ok(result) => println!("{result}"),
                    Err(e) => println!("Error: {e}"),
                }
            }

            Err(ReadlineError::Eof | ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

fn print_help(interp: &Interpreter) {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :wire      - Toggle JSON wire output");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  {}", SPECIAL_FORMS.join(" "));
    println!();
    println!("Primitives:");
    print_columns(interp.bindings().primitives().names());
    println!();
    println!("Examples:");
    println!("  (def-rec fact (fn [n] (if (eq? n 0) 1 (* n (fact (- n 1))))))");
    println!("  (fact 5)");
    println!("  (base-eval '(+ 1 2) (pure-state))");
    println!("  (do (def r (ref 0)) (write-ref r 5) (read-ref r))");
    println!();
}

fn print_columns<'a>(names: impl Iterator<Item = &'a str>) {
    let mut col = 0;
    for name in names {
        print!("  {name:<18}");
        col += 1;
        if col % 4 == 0 {
            println!();
        }
    }
    if col % 4 != 0 {
        println!();
    }
}

fn print_environment(bindings: &Bindings) {
    let env = bindings.env().bindings();

    if env.is_empty() {
        println!("Environment is empty.");
    } else {
        println!("Environment bindings ({} total):", env.len());
        for (name, value) in env {
            println!("  {name} = {value}");
        }
    }

    if !bindings.refs().is_empty() {
        println!();
        println!("References ({} total):", bindings.refs().len());
        for (ix, value) in bindings.refs().iter() {
            println!("  #<ref:{ix}> = {value}");
        }
    }
}
