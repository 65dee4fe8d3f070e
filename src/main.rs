use std::{
    env::args,
    fs::File,
    io,
    path::PathBuf,
    process,
};

use pretty_env_logger::formatted_builder;
use simplesat::{
    parser::{self, parse_file, read_problem},
    prelude::*,
    report::Report,
    writer::write_solution,
};

fn usage_string() -> String {
    format!(
        "Usage: {} [options] [file]

Reads a DIMACS CNF problem from <file>, or from standard input when no
file is given, and writes the solution to standard output.

Options:
    --help     Show this help text
    --version  Show the program version
    -o <file>  Set the output file",
        args().next().unwrap()
    )
}

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("{}: Invalid argument", arg))]
    InvalidArgument { arg: String },
    #[snafu(display("{}: Expected argument", arg))]
    MissingOptionValue { arg: String },
    #[snafu(display("{}: Extra argument", arg))]
    ExtraArgument { arg: String },
    #[snafu(display("Failed to read problem"))]
    ReadProblem { source: parser::Error },
    #[snafu(display("Cannot open output file '{}'", path.display()))]
    OpenOutput { path: PathBuf, source: io::Error },
    #[snafu(display("Failed to write solution"))]
    WriteSolution { source: io::Error },
}

impl Error {
    /// Usage errors get a `Try --help` hint after the diagnostic.
    fn is_usage(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument { .. }
                | Error::MissingOptionValue { .. }
                | Error::ExtraArgument { .. }
        )
    }
}

enum Action {
    SolveProblem,
    ShowHelp,
    ShowVersion,
}

struct Options {
    infile: Option<PathBuf>,
    outfile: Option<PathBuf>,
    action: Action,
}

fn parse_options(argv: &[String]) -> Result<Options, Error> {
    let mut opts = Options {
        infile: None,
        outfile: None,
        action: Action::SolveProblem,
    };

    let mut iter = argv.iter();
    while let Some(arg) = iter.next() {
        if arg.starts_with('-') {
            // Arguments that start with "-" are taken as config options
            match arg.as_str() {
                "--help" => opts.action = Action::ShowHelp,
                "--version" => opts.action = Action::ShowVersion,
                "-o" => {
                    let value = iter.next().context(MissingOptionValue { arg: arg.clone() })?;
                    opts.outfile = Some(PathBuf::from(value));
                }
                _ => InvalidArgument { arg: arg.clone() }.fail()?,
            }
        } else if opts.infile.is_none() {
            opts.infile = Some(PathBuf::from(arg));
        } else {
            ExtraArgument { arg: arg.clone() }.fail()?
        }
    }

    Ok(opts)
}

fn solve_problem(opts: &Options) -> Result<(), Error> {
    let mut solver = match &opts.infile {
        Some(path) => parse_file(path).context(ReadProblem)?,
        None => {
            let stdin = io::stdin();
            read_problem(stdin.lock()).context(ReadProblem)?
        }
    };

    solver.solve();

    match &opts.outfile {
        Some(path) => {
            let mut stream = File::create(path).context(OpenOutput { path: path.clone() })?;
            write_solution(&solver, &mut stream).context(WriteSolution)?;
        }
        None => {
            let stdout = io::stdout();
            write_solution(&solver, &mut stdout.lock()).context(WriteSolution)?;
        }
    }

    Ok(())
}

fn init_logger() {
    let mut builder = formatted_builder();

    if let Ok(s) = std::env::var("RUST_LOG") {
        builder.parse_filters(&s);
    } else if cfg!(debug_assertions) {
        builder.parse_filters("simplesat=debug");
    } else {
        builder.parse_filters("simplesat=warn");
    }

    builder.try_init().expect("Failed to initialize the logger");
}

fn run() -> Result<(), Error> {
    let argv = args().skip(1).collect::<Vec<_>>();
    let opts = parse_options(&argv)?;

    match opts.action {
        Action::SolveProblem => solve_problem(&opts),
        Action::ShowHelp => {
            println!("{}", usage_string());
            Ok(())
        }
        Action::ShowVersion => {
            println!("SimpleSAT {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn main() {
    init_logger();

    if let Err(err) = run() {
        let usage = err.is_usage();
        eprintln!("simplesat: {}", Report::from(err));
        if usage {
            eprintln!("Try --help for usage");
        }
        process::exit(1);
    }
}
