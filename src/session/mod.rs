// Session control: validated parameters, the timer-driven controller
// and the thread that drives it.

pub mod clock;
pub mod controller;
pub mod handle;
pub mod params;
pub mod scheduler;
