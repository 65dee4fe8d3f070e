/*!
Crate-wide re-exports for error handling.
*/

pub use snafu::{ensure, OptionExt, ResultExt, Snafu};
