//! Local process supervision.
//!
//! - `supervisor`: [`ProcessSupervisor`], one child process per instance
//! - `shutdown`: SIGTERM → SIGKILL escalation against the process group
//! - `stream` / `logs`: lossy line capture into a ring buffer plus broadcast
//! - `ports`: port allocation for local backends

mod logs;
pub mod ports;
mod shutdown;
mod stream;
mod supervisor;

pub use logs::{LogBuffer, MAX_LOG_LINES};
pub use ports::{PortAllocationError, allocate_port, is_port_available};
pub use shutdown::StopPolicy;
pub use supervisor::{ProcessEvent, ProcessSupervisor};
