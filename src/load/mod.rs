// Load generation: shared target ratio, per-core duty-cycle workers,
// and the profile state machine that moves the target over time.

pub mod affinity;
pub mod controller;
pub mod profile;
pub mod worker;
