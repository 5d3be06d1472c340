use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use annotate_pure_calls::{Config, annotate_program};
use anyhow::{Context, Result, bail};
use clap::Parser;
use owo_colors::OwoColorize;
use swc_core::{
    common::{
        FileName, GLOBALS, SourceMap, Spanned, comments::SingleThreadedComments, sync::Lrc,
    },
    ecma::{
        ast::{EsVersion, Program},
        codegen::to_code_default,
        parser::{
            EsSyntax, Syntax, TsSyntax, error::Error, parse_file_as_module, parse_file_as_script,
        },
    },
};
use tracing_subscriber::EnvFilter;

/// Annotates calls that run during module initialization with `/*#__PURE__*/`
/// and prints the resulting code.
///
/// Set `RUST_LOG=annotate_pure_calls=trace` to see why calls were skipped.
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// File to transform. Reads stdin when omitted or `-`.
    input: Option<PathBuf>,

    /// Name of a function or constructor whose calls may be annotated. Can be
    /// repeated or comma separated.
    #[arg(long = "annotate-calls", value_name = "NAME", value_delimiter = ',')]
    annotate_calls: Vec<String>,

    /// JSON options file, e.g. `{ "annotateCalls": ["createContext"] }`.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Parse the input as a script instead of a module.
    #[arg(long)]
    script: bool,

    /// Parse the input as TypeScript.
    #[arg(long)]
    ts: bool,

    /// Print the number of inserted annotations to stderr.
    #[arg(long)]
    stats: bool,
}

struct Annotated {
    code: String,
    inserted: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), &cli.annotate_calls)?;
    if config.annotate_calls.is_empty() {
        tracing::warn!("no callee names configured, nothing will be annotated");
    }

    let (file_name, source) = read_input(cli.input.as_deref(), io::stdin())?;
    let annotated = annotate_source(file_name, source, config, cli.script, cli.ts)?;

    print!("{}", annotated.code);
    if cli.stats {
        eprintln!(
            "{} {} call(s)",
            "annotated".green().bold(),
            annotated.inserted
        );
    }
    Ok(())
}

fn load_config(path: Option<&Path>, names: &[String]) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            Config::from_json(&json).with_context(|| format!("in {}", path.display()))?
        }
        None => Config::default(),
    };
    config.annotate_calls.extend(names.iter().cloned());
    Ok(config)
}

fn read_input(input: Option<&Path>, mut stdin: impl Read) -> Result<(FileName, String)> {
    match input {
        Some(path) if path != Path::new("-") => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok((FileName::Real(path.to_path_buf()), source))
        }
        _ => {
            let mut source = String::new();
            stdin
                .read_to_string(&mut source)
                .context("failed to read stdin")?;
            Ok((FileName::Anon, source))
        }
    }
}

fn syntax(ts: bool) -> Syntax {
    if ts {
        Syntax::Typescript(TsSyntax {
            tsx: true,
            ..Default::default()
        })
    } else {
        Syntax::Es(EsSyntax {
            jsx: true,
            ..Default::default()
        })
    }
}

fn annotate_source(
    file_name: FileName,
    source: String,
    config: Config,
    script: bool,
    ts: bool,
) -> Result<Annotated> {
    GLOBALS.set(&Default::default(), || {
        let cm = Lrc::new(SourceMap::default());
        let fm = cm.new_source_file(Lrc::new(file_name), source);
        let comments = SingleThreadedComments::default();
        let mut errors = vec![];

        let parsed = if script {
            parse_file_as_script(
                &fm,
                syntax(ts),
                EsVersion::latest(),
                Some(&comments),
                &mut errors,
            )
            .map(Program::Script)
        } else {
            parse_file_as_module(
                &fm,
                syntax(ts),
                EsVersion::latest(),
                Some(&comments),
                &mut errors,
            )
            .map(Program::Module)
        };

        let mut program = match parsed {
            Ok(program) if errors.is_empty() => program,
            Ok(_) => bail!(describe_errors(&cm, &errors)),
            Err(err) => {
                errors.push(err);
                bail!(describe_errors(&cm, &errors))
            }
        };

        let inserted = annotate_program(&mut program, config, &comments);

        Ok(Annotated {
            code: to_code_default(cm.clone(), Some(&comments), &program),
            inserted,
        })
    })
}

fn describe_errors(cm: &SourceMap, errors: &[Error]) -> String {
    errors
        .iter()
        .map(|err| {
            let loc = cm.lookup_char_pos(err.span().lo);
            format!(
                "{}:{}:{}: {}",
                loc.file.name,
                loc.line,
                loc.col_display + 1,
                err.kind().msg()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
