use std::path::PathBuf;

use tarn::{DriverOptions, check_file, load_module, usrs_named};

#[cfg(test)]
mod main_tests;

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(message) => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32, String> {
    let args = std::env::args().collect::<Vec<_>>();
    let command = parse_cli(&args)?;

    match command {
        Command::Check { input, stats, trace } => {
            let options = if trace {
                DriverOptions::traced()
            } else {
                DriverOptions::default()
            };
            let result = check_file(&input, &options)?;
            print!("{}", result.render());
            if stats {
                println!("{}", to_json(&result.stats)?);
            }
            if trace {
                let steps = serde_json::json!({
                    "evaluator": result.eval_trace,
                    "solver": result.solver_trace(),
                });
                println!("{}", to_json(&steps)?);
            }
            if result.has_errors() {
                eprintln!(
                    "{} error(s) in `{}`",
                    result.error_count(),
                    input.display()
                );
                return Ok(1);
            }
            Ok(0)
        }
        Command::Usr { input, name } => {
            let module = load_module(&input)?;
            for (_, usr) in usrs_named(module, &name)? {
                println!("{usr}");
            }
            Ok(0)
        }
    }
}

fn to_json(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| format!("failed to encode JSON: {err}"))
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Check {
        input: PathBuf,
        stats: bool,
        trace: bool,
    },
    Usr {
        input: PathBuf,
        name: String,
    },
}

fn parse_cli(args: &[String]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err(usage());
    }

    match args[1].as_str() {
        "check" => {
            let input = PathBuf::from(&args[2]);
            let mut stats = false;
            let mut trace = false;
            for arg in &args[3..] {
                match arg.as_str() {
                    "--stats" => stats = true,
                    "--trace" => trace = true,
                    unknown => {
                        return Err(format!("unknown argument `{unknown}`\n{}", usage()));
                    }
                }
            }
            Ok(Command::Check {
                input,
                stats,
                trace,
            })
        }
        "usr" => match &args[2..] {
            [input, name] => Ok(Command::Usr {
                input: PathBuf::from(input),
                name: name.clone(),
            }),
            [_] => Err(format!("missing declaration name\n{}", usage())),
            _ => Err(format!("too many arguments\n{}", usage())),
        },
        _ => Err(usage()),
    }
}

fn usage() -> String {
    "usage:\n  tarn check <module.json> [--stats] [--trace]\n  tarn usr <module.json> <decl-name>"
        .to_string()
}
