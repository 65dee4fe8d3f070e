#[macro_use]
extern crate log;

pub mod literal;
pub mod parser;
pub mod prelude;
pub mod report;
pub mod solver;
pub mod writer;
