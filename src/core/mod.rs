mod engine;
mod types;

pub use engine::{level_payment, simulate, simulate_baseline};
pub use types::{
    AcceleratorPolicy, BaselineReference, LoanParameters, ScheduleRow, SimulationResult,
};
