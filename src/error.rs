//! Error type shared by the collector, the matrix operations and the results tooling


use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::collector::CollectorKind;


pub type Result<T> = std::result::Result<T, Error>;


#[derive(Debug, Error)]
pub enum Error {
    /// Operand shapes don't fit the operation.
    #[error("incompatible dimensions for {op}: {}x{} and {}x{}", .lhs.0, .lhs.1, .rhs.0, .rhs.1)]
    IncompatibleDimensions {
        op: &'static str,
        lhs: (usize, usize),
        rhs: (usize, usize),
    },

    #[error("failed to build the collector thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("a {0} collector is already attached to this thread")]
    AlreadyAttached(CollectorKind),

    #[error("the collector is busy; it cannot be reconfigured from inside a collection")]
    CollectorBusy,

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no benchmark metrics found in {}", .0.display())]
    Unparsable(PathBuf),
}
