mod debug_report;

use patch_rules::{DEFAULT_MAX_DEPTH, Options, PatchRules};
use serde_json::Value;
use std::fs;
use std::io::{self, IsTerminal};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PATCH_RULES_LOG";

fn main() -> ExitCode {
    init_tracing();

    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(3),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(io::stderr).init();
}

/// Returns whether the document was fully patched.
fn run(config: &CliConfig) -> Result<bool, String> {
    let mut rules = config.rules.clone();
    if let Some(path) = &config.rules_file {
        rules.extend(read_rules_file(path)?);
    }

    let engine = PatchRules::with_options(&rules, Options::default().with_max_depth(config.max_depth))
        .map_err(|err| format!("error: {err}"))?;
    let old = read_document(&config.old)?;
    let new = read_document(&config.new)?;

    let report = engine.apply_verbose(&old, &new).map_err(|err| format!("error: {err}"))?;

    if config.json {
        let rendered = serde_json::to_string_pretty(&report.outcome.patched_document)
            .map_err(|err| format!("error: failed to render document: {err}"))?;
        println!("{rendered}");
    } else {
        debug_report::print_report(engine.rules(), &report, config.color);
    }

    Ok(report.outcome.fully_patched)
}

fn read_document(path: &str) -> Result<Value, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("error: failed to read '{path}': {err}"))?;
    serde_json::from_str(&text).map_err(|err| format!("error: '{path}' is not valid JSON: {err}"))
}

fn read_rules_file(path: &str) -> Result<Vec<String>, String> {
    let text = fs::read_to_string(path).map_err(|err| format!("error: failed to read '{path}': {err}"))?;
    serde_json::from_str(&text).map_err(|err| format!("error: '{path}' must hold a JSON array of rule strings: {err}"))
}

struct CliConfig {
    rules: Vec<String>,
    rules_file: Option<String>,
    old: String,
    new: String,
    max_depth: usize,
    json: bool,
    color: bool,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut rules = Vec::new();
    let mut rules_file: Option<String> = None;
    let mut documents: Vec<String> = Vec::new();
    let mut max_depth = DEFAULT_MAX_DEPTH;
    let mut json = false;
    let mut color = io::stdout().is_terminal();
    let mut args = std::env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-V" | "--version" => {
                println!("patch-rules {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--color" => color = true,
            "--no-color" => color = false,
            "--json" => json = true,
            "-r" | "--rule" => {
                let value = args.next().ok_or_else(|| "error: --rule expects a value".to_string())?;
                rules.push(value);
            }
            "--rules-file" => {
                let value = args.next().ok_or_else(|| "error: --rules-file expects a value".to_string())?;
                if rules_file.is_some() {
                    return Err("error: --rules-file provided multiple times".to_string());
                }
                rules_file = Some(value);
            }
            "--max-depth" => {
                let value = args.next().ok_or_else(|| "error: --max-depth expects a value".to_string())?;
                max_depth = parse_max_depth(&value)?;
            }
            "--" => {
                documents.extend(args.by_ref());
                break;
            }
            _ if arg.starts_with("--rule=") => {
                rules.push(arg.trim_start_matches("--rule=").to_string());
            }
            _ if arg.starts_with("--rules-file=") => {
                if rules_file.is_some() {
                    return Err("error: --rules-file provided multiple times".to_string());
                }
                rules_file = Some(arg.trim_start_matches("--rules-file=").to_string());
            }
            _ if arg.starts_with("--max-depth=") => {
                max_depth = parse_max_depth(arg.trim_start_matches("--max-depth="))?;
            }
            _ if arg.starts_with('-') && arg != "-" => {
                return Err(format!("error: unknown option '{arg}'"));
            }
            _ => documents.push(arg),
        }
    }

    let [old, new]: [String; 2] = documents.try_into().map_err(|documents: Vec<String>| {
        format!("error: expected <OLD.json> <NEW.json>, got {} path(s)\n\n{}", documents.len(), help_text())
    })?;

    Ok(CliConfig { rules, rules_file, old, new, max_depth, json, color })
}

fn parse_max_depth(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(depth) if depth > 0 => Ok(depth),
        _ => Err(format!("error: invalid --max-depth '{value}' (expected a positive integer)")),
    }
}

fn print_help() {
    println!("{}", help_text());
}

fn help_text() -> String {
    format!(
        "patch-rules {version}

Merge the permitted fields of a candidate JSON document into an old one.

Usage:
  patch-rules [OPTIONS] <OLD.json> <NEW.json>

Options:
  -r, --rule <rule>          Add a rule. Repeatable; rules apply in the order
                             given, later rules override earlier ones.
  --rules-file <file>        Read rules from a JSON array of strings. They are
                             appended after any --rule values.
  --max-depth <n>            Maximum nesting of the new document.
                             Default: {default_depth}
  --json                     Print only the patched document as JSON.
  --color                    Force ANSI color output.
  --no-color                 Disable ANSI color output.
  -h, --help                 Show this help message.
  -V, --version              Print version information.

Rules:
  user.name                  A single field.
  user.*                     Everything under user.
  user.{{name,email}}          Either key.
  {{*}}.id                     Exactly one key segment.
  user.contacts[*].number    Any array index.
  user.contacts[:replace:]   Replace the whole value at once.
  user.tags[:unique:]        Replace with a deduplicated array.
  !user.role                 Deny, overriding earlier rules.

Environment:
  {log_env}            Log filter (tracing syntax). Default: warn

Exit codes:
  0  Fully patched.
  1  Malformed rule, unreadable input or incompatible documents.
  2  Invalid arguments.
  3  Patched, but some paths were denied.
",
        version = env!("CARGO_PKG_VERSION"),
        default_depth = DEFAULT_MAX_DEPTH,
        log_env = LOG_ENV,
    )
}
