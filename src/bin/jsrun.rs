//! jsrun command-line runner
//!
//! Evaluates a file (or `-e` source) and prints the completion value.
//! Runtime errors report with the recorded source position and a little
//! ANSI color when writing to a terminal.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use jsrun::realm::{ModuleResolver, SourceInfo};
use jsrun::{Agent, RunResult, Value};

struct Options {
    path: Option<PathBuf>,
    eval: Option<String>,
    module: bool,
    print_ir: bool,
}

fn usage() -> ! {
    eprintln!("usage: jsrun [--print-ir] [--module] <file | -e SOURCE>");
    std::process::exit(2);
}

fn parse_args() -> Options {
    let mut options = Options {
        path: None,
        eval: None,
        module: false,
        print_ir: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--print-ir" => options.print_ir = true,
            "--module" => options.module = true,
            "-e" => match args.next() {
                Some(source) => options.eval = Some(source),
                None => usage(),
            },
            "--help" | "-h" => usage(),
            _ => options.path = Some(PathBuf::from(arg)),
        }
    }
    if options.path.is_none() && options.eval.is_none() {
        usage();
    }
    options
}

/// Resolves import specifiers relative to the importing file.
struct FileResolver;

impl ModuleResolver for FileResolver {
    fn resolve(&mut self, specifier: &str, referrer: &str) -> Result<SourceInfo, String> {
        let base = Path::new(referrer)
            .parent()
            .unwrap_or_else(|| Path::new("."));
        let path = base.join(specifier);
        let text = std::fs::read_to_string(&path).map_err(|e| e.to_string())?;
        Ok(SourceInfo {
            name: path.display().to_string(),
            text,
            is_module: true,
        })
    }
}

fn main() -> ExitCode {
    let options = parse_args();
    let mut agent = Agent::new();
    agent.print_ir = options.print_ir;
    let realm = agent.make_realm();
    realm.set_module_resolver(Box::new(FileResolver));

    let result = match (&options.eval, &options.path) {
        (Some(source), _) => {
            if options.module {
                jsrun::run_module_source(&mut agent, &realm, "<eval>", source)
            } else {
                jsrun::run_source(&mut agent, &realm, source)
            }
        }
        (None, Some(path)) => jsrun::run_file(&mut agent, &realm, path),
        (None, None) => unreachable!("usage() exits"),
    };

    let color = std::io::stderr().is_terminal();
    let (red, dim, reset) = if color {
        ("\x1b[31m", "\x1b[2m", "\x1b[0m")
    } else {
        ("", "", "")
    };

    match result {
        RunResult::Success(value) => {
            if !value.is_undefined() {
                let text = jsrun::builtins::display_value(&mut agent, &value);
                println!("{}", text);
            }
            ExitCode::SUCCESS
        }
        RunResult::RuntimeError(value) => {
            let message = describe_thrown(&mut agent, &value);
            eprintln!("{}Uncaught {}{}", red, message, reset);
            ExitCode::FAILURE
        }
        RunResult::ParseError(e) => {
            eprintln!(
                "{}{}{} {}at {}{}",
                red, e.reason, reset, dim, e.span.start, reset
            );
            ExitCode::FAILURE
        }
        RunResult::InternalError(reason) => {
            eprintln!("{}internal error:{} {}", red, reset, reason);
            ExitCode::FAILURE
        }
    }
}

fn describe_thrown(agent: &mut Agent, value: &Value) -> String {
    if let Value::Object(obj) = value {
        if obj.borrow().internal("ErrorData").is_some() {
            if let Ok(text) = jsrun::api::call_method(agent, value, "toString", &[]) {
                if let Some(s) = text.as_str() {
                    return s.to_string();
                }
            }
        }
    }
    jsrun::builtins::display_value(agent, value)
}
