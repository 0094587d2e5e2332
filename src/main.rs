use std::fs;
use std::io::Read as _;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use eyre::{Context, Result};

mod ancestors;
mod ast;
mod class_table;
mod conformance;
mod emitter;
mod environment;
mod errors;
mod inheritance;
mod reader;
mod typecheck;

use ast::Program;
use class_table::build_class_table;
use errors::AnalyzerError;
use reader::Reader;

/// Command-line options for the semantic-analysis stage.
#[derive(Parser)]
#[command(name = "cool-typecheck", version, about = "Semantic analyzer for the serialized COOL AST format")]
struct Cli {
    /// Path to the input `.cl-ast` file.
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() -> ExitCode {
    simple_logger::SimpleLogger::new().env().init().ok();

    let cli = Cli::parse();
    match run(&cli.input) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Environmental(report)) => {
            eprintln!("{report:?}");
            ExitCode::FAILURE
        }
        Err(Failure::Analysis(err)) => {
            println!("ERROR: {}: Type-Check: {}", err.line(), err);
            ExitCode::FAILURE
        }
    }
}

enum Failure {
    Environmental(eyre::Report),
    Analysis(AnalyzerError),
}

impl From<eyre::Report> for Failure {
    fn from(report: eyre::Report) -> Self {
        Failure::Environmental(report)
    }
}

impl From<AnalyzerError> for Failure {
    fn from(err: AnalyzerError) -> Self {
        Failure::Analysis(err)
    }
}

fn run(input: &PathBuf) -> Result<(), Failure> {
    let lines = read_lines(input)?;
    log::debug!("read {} lines from {:?}", lines.len(), input);

    let program = Reader::new(lines)
        .read_program()
        .map_err(AnalyzerError::from)?;
    log::debug!("reader produced {} classes", program.classes.len());
    let user_class_names: Vec<String> = program.classes.iter().map(|c| c.name.clone()).collect();

    let mut table = build_class_table(program).map_err(AnalyzerError::from)?;
    log::debug!("class table built, {} classes including builtins", table.len());
    inheritance::normalize_and_validate(&mut table).map_err(AnalyzerError::from)?;
    log::debug!("inheritance graph validated");
    typecheck::check_program(&mut table).map_err(AnalyzerError::from)?;
    log::info!("type-checked {} classes", table.len());

    let annotated_program = Program {
        classes: user_class_names
            .iter()
            .map(|name| table.get(name).expect("class survived analysis").clone())
            .collect(),
    };
    log::debug!("emitting output sections");
    let output = emitter::emit(&table, &annotated_program);

    let output_path = output_path_for(input);
    fs::write(&output_path, output)
        .wrap_err_with(|| format!("failed to write output file {:?}", output_path))?;
    log::debug!("wrote {:?}", output_path);

    Ok(())
}

fn read_lines(path: &PathBuf) -> Result<Vec<String>> {
    let mut contents = String::new();
    fs::File::open(path)
        .wrap_err_with(|| format!("failed to open input file {:?}", path))?
        .read_to_string(&mut contents)
        .wrap_err_with(|| format!("failed to read input file {:?}", path))?;
    Ok(contents.lines().map(str::to_string).collect())
}

fn output_path_for(input: &PathBuf) -> PathBuf {
    input.with_extension("cl-type")
}
