// Telemetry: host sensors, package power derivation, and the per-second
// sampler that turns them into records.

pub mod power;
pub mod sampler;
pub mod sensors;
pub mod system_info;
