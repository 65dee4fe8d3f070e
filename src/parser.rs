/*!
DIMACS CNF reader.

The reader consumes comment lines, one problem line, and then a stream of
whitespace-separated signed integers: each clause is a run of nonzero
literals closed by a `0` terminator, and clauses may span lines. The parsed
problem is delivered as a fully seeded [`Solver`].
*/

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::literal::Literal;
use crate::prelude::*;
use crate::solver::{ClauseIdx, Solver};

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("I/O error occurred while opening '{}'", path.display()))]
    OpenFile {
        path: PathBuf,
        source: io::Error,
    },
    #[snafu(display("I/O error occurred while reading CNF input"))]
    ReadInput { source: io::Error },
    #[snafu(display("Expected problem line 'p cnf <n_vars> <n_clauses>'"))]
    MissingProblemLine,
    #[snafu(display("Invalid problem line '{}'", line.trim_end()))]
    MalformedProblemLine { line: String },
    #[snafu(display("Invalid number of variables"))]
    InvalidVariableCount,
    #[snafu(display("Invalid number of clauses"))]
    InvalidClauseCount,
    #[snafu(display("Expected more clauses"))]
    UnexpectedEnd,
    #[snafu(display("Expected a literal, found '{}'", token))]
    MalformedLiteral { token: String },
    #[snafu(display("Variable {} is out of range (must be within 1 to {})", var, n_vars))]
    VariableOutOfRange { var: usize, n_vars: usize },
    #[snafu(display("Expected end of input"))]
    TrailingContent,
}

/// Parses a CNF problem from a file into a seeded solver.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Solver, Error> {
    let path = path.as_ref();
    let file = File::open(path).context(OpenFile {
        path: path.to_owned(),
    })?;

    read_problem(BufReader::new(file))
}

/// Reads a CNF problem from any buffered stream into a seeded solver.
pub fn read_problem(mut reader: impl BufRead) -> Result<Solver, Error> {
    let (n_vars, n_clauses) = read_header(&mut reader)?;

    let mut solver = Solver::new(n_vars, n_clauses);

    for i in 0..n_clauses {
        let clause_index = ClauseIdx::from(i);

        loop {
            let token = next_token(&mut reader)
                .context(ReadInput)?
                .context(UnexpectedEnd)?;
            let repr = token
                .parse::<i32>()
                .ok()
                .context(MalformedLiteral { token })?;

            // `0` closes the clause
            match Literal::from_dimacs(repr) {
                Some(lit) => {
                    ensure!(
                        lit.var_index() < n_vars,
                        VariableOutOfRange {
                            var: lit.var_index() + 1,
                            n_vars,
                        }
                    );
                    solver.add_literal_to_clause(clause_index, lit);
                }
                None => break,
            }
        }

        solver.seal_clause(clause_index);
    }

    // Only whitespace may remain after the final clause
    ensure!(
        next_token(&mut reader).context(ReadInput)?.is_none(),
        TrailingContent
    );

    Ok(solver)
}

/// Skips comment lines and parses the problem line.
fn read_header(reader: &mut impl BufRead) -> Result<(usize, usize), Error> {
    let mut line = String::new();

    // Read lines until one of them is not a comment
    loop {
        line.clear();
        let n_read = reader.read_line(&mut line).context(ReadInput)?;
        ensure!(n_read != 0, MissingProblemLine);

        if !line.starts_with('c') {
            break;
        }
    }

    ensure!(line.starts_with('p'), MissingProblemLine);

    let fields = line.split_whitespace().collect::<Vec<_>>();
    ensure!(
        fields.len() == 4 && fields[0] == "p" && fields[1] == "cnf",
        MalformedProblemLine { line: line.clone() }
    );

    let n_vars = fields[2]
        .parse::<i64>()
        .ok()
        .context(MalformedProblemLine { line: line.clone() })?;
    let n_clauses = fields[3]
        .parse::<i64>()
        .ok()
        .context(MalformedProblemLine { line: line.clone() })?;

    ensure!(n_vars > 0, InvalidVariableCount);
    ensure!(n_clauses > 0, InvalidClauseCount);

    Ok((n_vars as usize, n_clauses as usize))
}

/// Reads the next whitespace-separated token, or `None` at end of input.
fn next_token(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    // Skip leading whitespace
    loop {
        let buffer = reader.fill_buf()?;
        if buffer.is_empty() {
            return Ok(None);
        }

        match buffer.iter().position(|b| !b.is_ascii_whitespace()) {
            Some(start) => {
                reader.consume(start);
                break;
            }
            None => {
                let len = buffer.len();
                reader.consume(len);
            }
        }
    }

    // Collect bytes up to the next whitespace or end of input
    let mut token = Vec::new();
    loop {
        let buffer = reader.fill_buf()?;
        if buffer.is_empty() {
            break;
        }

        match buffer.iter().position(|b| b.is_ascii_whitespace()) {
            Some(end) => {
                token.extend_from_slice(&buffer[..end]);
                reader.consume(end);
                break;
            }
            None => {
                token.extend_from_slice(buffer);
                let len = buffer.len();
                reader.consume(len);
            }
        }
    }

    Ok(Some(String::from_utf8_lossy(&token).into_owned()))
}
