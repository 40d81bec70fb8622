// Agent module: the long-running guard process
//
// The agent runs the periodic check loop, hands triggers to the warning
// coordinator, and shuts everything down cleanly on SIGINT/SIGTERM.

mod daemon;
mod signals;

pub use daemon::{GuardLoop, run_guard_daemon};
