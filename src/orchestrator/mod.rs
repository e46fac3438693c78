//! Tick-driven stage execution: the agent seam ([`driver`]), the one
//! tick function per stage ([`tick`]), and stall detection ([`watchdog`]).

pub mod driver;
pub mod tick;
pub mod watchdog;

pub use driver::{AgentRunner, AgentTask, DriverOutcome, FixtureRunner};
pub use tick::TickOutcome;
