// Public API
pub use supervisor::{heartbeat, sweep_stale, LivenessHandle, LivenessSupervisor, SweepReport};

// Internal modules
mod supervisor;
