use std::fs;
use std::io::{self, Read, Write};
use std::panic;
use std::process;

use clap::{Arg, ArgAction, Command, value_parser};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use sexpr::json::to_json_string;
use sexpr::{Binding, Environment, Error, ErrorPolicy, Value, run_program};

fn main() {
    env_logger::init();

    let matches = Command::new("sexpr")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Evaluate S-expression programs")
        .arg(Arg::new("FILE").help("Program to run, or - for stdin; starts a REPL when omitted"))
        .arg(
            Arg::new("keep-going")
                .long("keep-going")
                .help("Keep evaluating after a form fails")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("max-depth")
                .long("max-depth")
                .value_name("N")
                .help("Limit evaluation nesting depth")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print results as JSON")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let mut env = Environment::new();
    env.set_max_depth(matches.get_one::<usize>("max-depth").copied());
    register_output_functions(&mut env);
    let json = matches.get_flag("json");

    let Some(path) = matches.get_one::<String>("FILE") else {
        let result = panic::catch_unwind(panic::AssertUnwindSafe(|| run_repl(env, json)));
        if result.is_err() {
            eprintln!("The REPL encountered an unexpected error and must exit.");
            process::exit(1);
        }
        return;
    };

    let source = match read_source(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("{path}: {e}");
            process::exit(1);
        }
    };
    let policy = if matches.get_flag("keep-going") {
        ErrorPolicy::Continue
    } else {
        ErrorPolicy::Halt
    };

    let outcome = match run_program(&source, &mut env, policy) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    for e in outcome.errors() {
        eprintln!("Error: {e}");
    }
    if json && let Some(value) = outcome.last_value() {
        print_value(value, true);
    }
    if !outcome.is_success() {
        process::exit(1);
    }
}

fn read_source(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut buffer = String::new();
        io::stdin().lock().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        fs::read_to_string(path)
    }
}

/// `printf` and `print` write their argument to stdout; strings are written
/// without quotes.
fn register_output_functions(env: &mut Environment) {
    fn write_out(value: &Value, newline: bool) -> Result<Value, Error> {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let mut stdout = io::stdout().lock();
        let written = if newline {
            writeln!(stdout, "{text}")
        } else {
            write!(stdout, "{text}").and_then(|()| stdout.flush())
        };
        written.map_err(|e| Error::HostError(format!("write to stdout failed: {e}")))?;
        Ok(Value::Nil)
    }

    env.register_host_fn("printf", |value| write_out(&value, false));
    env.register_host_fn("print", |value| write_out(&value, true));
}

fn print_value(value: &Value, json: bool) {
    if json {
        match to_json_string(value) {
            Ok(text) => println!("{text}"),
            Err(_) => println!("{value}"),
        }
    } else {
        println!("{value}");
    }
}

fn run_repl(mut env: Environment, mut json: bool) {
    println!("sexpr {}", env!("CARGO_PKG_VERSION"));
    println!("Enter S-expressions like: (defun double (x) (+ x x)) (double 21)");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize REPL: {e}");
            process::exit(1);
        }
    };

    loop {
        match rl.readline("sexpr> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env);
                        continue;
                    }
                    ":json" => {
                        json = !json;
                        println!("JSON output {}", if json { "enabled" } else { "disabled" });
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match run_program(line, &mut env, ErrorPolicy::Halt) {
                    Ok(outcome) => {
                        for result in outcome.results {
                            match result {
                                // Definitions evaluate to nil; keep the prompt quiet
                                Ok(value) if value.is_nil() => {}
                                Ok(value) => print_value(&value, json),
                                Err(e) => println!("Error: {e}"),
                            }
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }
}

fn print_help() {
    println!("Commands:");
    println!("  :help  - Show this help message");
    println!("  :env   - Show current bindings and host functions");
    println!("  :json  - Toggle JSON output of results");
    println!("  :quit  - Exit the interpreter");
    println!("  :exit  - Exit the interpreter");
    println!("  Ctrl+C - Exit the interpreter");
    println!();
    println!("Forms:");
    println!("  Arithmetic: + - * /");
    println!("  Comparison: = !=");
    println!("  Logic: and or true false if");
    println!("  Data: quote 'x list concat eval");
    println!("  Definitions: defun defmacro setq progn");
    println!("  Host calls: (php print \"hello\")");
    println!();
    println!("Examples:");
    println!("  (+ 1 (* 2 3))");
    println!("  (defmacro inc (var) (list 'setq var (list '+ var 1)))");
    println!("  (if (= 1 1) \"yes\" \"no\")");
    println!();
}

fn print_environment(env: &Environment) {
    let bindings = env.bindings();
    let host_fns = env.host_fn_names();

    if bindings.is_empty() && host_fns.is_empty() {
        println!("Environment is empty.");
        return;
    }

    if !host_fns.is_empty() {
        println!("Host functions ({}):", host_fns.len());
        println!("  {}", host_fns.join(" "));
        println!();
    }

    if !bindings.is_empty() {
        println!("Bindings ({}):", bindings.len());
        for (name, binding) in bindings {
            match binding {
                Binding::Value(value) => println!("  {name} = {value}"),
                other => println!("  {other}"),
            }
        }
    }
}
