//! Continuous sync: runs reconciliation passes on a fixed interval until
//! ctrl-c or an explicit shutdown.

mod error;
mod runtime;

pub use error::DaemonError;
pub use runtime::{
    init_tracing, poll, run, start_blocking, PassKind, PollReport, PollSettings, Services,
};
