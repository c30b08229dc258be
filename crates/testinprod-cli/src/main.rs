//! Command-line front end: instrument a bundled demo class, call one of its methods and
//! write the generated test module.
//!
//! ```bash
//! testinprod Calculator add 2 3 --thorough
//! testinprod Greeter greet "{'name': 'Al'}" --record Person
//! testinprod HelperClass my_func "[55]" --init 3
//! ```
//!
//! Set `RUST_LOG=debug` to see every recorded call and emitted case.

mod demo;

use std::{fmt, fs, io, path::PathBuf, process::ExitCode};

use clap::Parser;
use testinprod::{
    Exception, FileWriter, InstrumentOptions, Instrumenter, LiteralError, LogTracer, Record, Value,
    parse_literal,
};

#[derive(Parser, Debug)]
#[command(name = "testinprod")]
#[command(about = "Record a method call and turn it into a regression test")]
#[command(version)]
struct Cli {
    /// Demo class to instrument (Calculator, Greeter or HelperClass)
    class: String,

    /// Method to call
    method: String,

    /// Positional arguments, as Python literals
    #[arg(allow_hyphen_values = true)]
    args: Vec<String>,

    /// Keyword argument as NAME=LITERAL (repeatable)
    #[arg(long = "kwarg", value_name = "NAME=LITERAL")]
    kwargs: Vec<String>,

    /// Constructor argument for instance methods, as a Python literal (repeatable)
    #[arg(long = "init", value_name = "LITERAL")]
    init: Vec<String>,

    /// Turn dict arguments into objects of this class, with the keys as attributes
    #[arg(long, value_name = "CLASS")]
    record: Option<String>,

    /// Also emit fuzz and metamorphic variants
    #[arg(long, env = "TESTINPROD_THOROUGH")]
    thorough: bool,

    /// Ask for confirmation on stdin before keeping a test case
    #[arg(long)]
    untrusted: bool,

    /// Module path the generated test imports the class from
    #[arg(long, value_name = "PATH")]
    module: Option<String>,

    /// Directory the test module is written to
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Also write the recorded traces as JSON to this file
    #[arg(long, value_name = "FILE")]
    dump_traces: Option<PathBuf>,
}

/// Everything that can stop the CLI.
#[derive(Debug)]
enum CliError {
    UnknownClass(String),
    BadKwarg(String),
    Literal { source: String, error: LiteralError },
    Call(Exception),
    Io(io::Error),
    Json(serde_json::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownClass(name) => write!(f, "unknown class '{name}', expected one of {}", demo::CLASSES.join(", ")),
            Self::BadKwarg(raw) => write!(f, "keyword argument '{raw}' is not NAME=LITERAL"),
            Self::Literal { source, error } => write!(f, "cannot parse '{source}': {error}"),
            Self::Call(exc) => write!(f, "call raised {exc}"),
            Self::Io(error) => write!(f, "{error}"),
            Self::Json(error) => write!(f, "{error}"),
        }
    }
}

impl From<Exception> for CliError {
    fn from(exc: Exception) -> Self {
        Self::Call(exc)
    }
}

impl From<io::Error> for CliError {
    fn from(error: io::Error) -> Self {
        Self::Io(error)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json(error)
    }
}

fn main() -> ExitCode {
    // Set RUST_LOG=debug for verbose logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let def = demo::class(&cli.class).ok_or_else(|| CliError::UnknownClass(cli.class.clone()))?;
    let takes_self = def
        .get_method(&cli.method)
        .is_some_and(|method| method.params().first().is_some_and(|param| param == "self"));

    let mut options = InstrumentOptions::default()
        .thorough(cli.thorough)
        .trusted(!cli.untrusted);
    if let Some(module) = &cli.module {
        options = options.module_path(module.clone());
    }
    tracing::debug!(?options, class = %cli.class, method = %cli.method, "instrumenting");

    let writer = FileWriter::new(&cli.out);
    let target = writer.module_path(&cli.class);
    let class = Instrumenter::new(options)
        .writer(writer)
        .tracer(LogTracer)
        .instrument(def);

    let mut args = Vec::with_capacity(cli.args.len() + 1);
    if takes_self {
        let init = parse_all(&cli.init, cli.record.as_deref())?;
        args.push(class.construct(&init, &[])?);
    }
    args.extend(parse_all(&cli.args, cli.record.as_deref())?);
    let kwargs = cli
        .kwargs
        .iter()
        .map(|raw| {
            let (name, literal) = raw.split_once('=').ok_or_else(|| CliError::BadKwarg(raw.clone()))?;
            Ok((name.trim().to_owned(), parse_arg(literal, cli.record.as_deref())?))
        })
        .collect::<Result<Vec<_>, CliError>>()?;

    let output = class.call(&cli.method, &args, &kwargs)?;
    println!("{}", output.py_repr());
    eprintln!("{} test case(s) written to {}", class.cases().len(), target.display());

    if let Some(path) = &cli.dump_traces {
        let json = serde_json::to_string_pretty(&class.log().to_json_value())?;
        fs::write(path, json)?;
    }
    Ok(())
}

fn parse_all(sources: &[String], record: Option<&str>) -> Result<Vec<Value>, CliError> {
    sources.iter().map(|source| parse_arg(source, record)).collect()
}

fn parse_arg(source: &str, record: Option<&str>) -> Result<Value, CliError> {
    let value = parse_literal(source).map_err(|error| CliError::Literal {
        source: source.to_owned(),
        error,
    })?;
    Ok(match record {
        Some(class_name) => into_records(value, class_name),
        None => value,
    })
}

/// Replaces every dict with string keys, at any depth, by a record of `class_name`.
fn into_records(value: Value, class_name: &str) -> Value {
    match value {
        Value::Dict(pairs) if pairs.iter().all(|(key, _)| matches!(key, Value::Text(_))) => {
            let mut record = Record::new(class_name);
            for (key, value) in pairs {
                if let Value::Text(name) = key {
                    record = record.with_attr(name, into_records(value, class_name));
                }
            }
            Value::object(record)
        }
        Value::List(items) => Value::List(items.into_iter().map(|item| into_records(item, class_name)).collect()),
        Value::Tuple(items) => Value::Tuple(items.into_iter().map(|item| into_records(item, class_name)).collect()),
        other => other,
    }
}
