#[allow(clippy::module_inception)]
mod executor;
mod process;

pub use executor::{execute_line, run, wait_for};
pub use process::{ExecError, Pid, Process, UnixProcess, EXIT_FAILURE, EXIT_SUCCESS};
