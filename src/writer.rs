/*!
Solution output in the DIMACS solver format.
*/

use std::io::{self, Write};

use crate::solver::{Solution, Solver};

/// Soft line-length cap for `v` lines.
const LINE_WIDTH: usize = 79;

/// Writes the statistics banner, the verdict line, and, when satisfiable,
/// the assignment lines.
pub fn write_solution(solver: &Solver, stream: &mut impl Write) -> io::Result<()> {
    let stats = solver.stats();

    writeln!(stream, "c Generated by SimpleSAT {}", env!("CARGO_PKG_VERSION"))?;
    writeln!(stream, "c")?;
    writeln!(stream, "c Performance statistics")?;
    writeln!(stream, "c ----------------------")?;
    writeln!(
        stream,
        "c Elapsed time:       {:.6} (s)",
        stats.elapsed.as_secs_f64()
    )?;
    writeln!(stream, "c Attempted branches: {}", stats.branches)?;
    writeln!(stream, "c Unit propagations:  {}", stats.propagations)?;
    writeln!(stream, "c")?;

    writeln!(stream, "s {}", solver.solution())?;

    if solver.solution() == Solution::Satisfiable {
        write_assignment(&solver.assignment(), stream)?;
    }

    Ok(())
}

/// Emits `v` lines for the model, starting a fresh line before any token
/// that would run past the column cap, and closes with the ` 0` terminator.
fn write_assignment(model: &[i32], stream: &mut impl Write) -> io::Result<()> {
    let mut column = 2;
    write!(stream, "v")?;

    for &repr in model {
        let token = format!(" {}", repr);

        if column + token.len() > LINE_WIDTH {
            write!(stream, "\nv")?;
            column = 1;
        }

        write!(stream, "{}", token)?;
        column += token.len();
    }

    if column + 2 > LINE_WIDTH {
        writeln!(stream, "\nv 0")?;
    } else {
        writeln!(stream, " 0")?;
    }

    Ok(())
}
