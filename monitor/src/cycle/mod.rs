pub mod in_flight;
pub mod orchestrator;

pub use in_flight::{InFlight, InFlightGuard};
pub use orchestrator::{CycleOrchestrator, CycleReport, Delivery, SymbolReport, SymbolStatus};
