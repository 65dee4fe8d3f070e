/*!
Single-line error printer for CLI diagnostics.
*/

use std::error::Error as StdError;

/// Wraps an error so that `Display` renders it together with its source
/// chain on one line, `: `-separated.
pub struct Report(Box<dyn StdError>);

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)?;

        for cause in std::iter::successors(self.0.source(), |e| -> Option<&(dyn StdError + 'static)> {
            (*e).source()
        }) {
            write!(f, ": {}", cause)?;
        }

        Ok(())
    }
}

impl<E: Into<Box<dyn StdError>>> From<E> for Report {
    fn from(e: E) -> Self {
        Report(e.into())
    }
}
