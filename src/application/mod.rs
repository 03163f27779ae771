// Application layer - use cases and orchestration over the repository

pub mod aggregation;
pub mod delivery;
pub mod error;
pub mod reporting;
pub mod reports;
pub mod scheduler;
pub mod service;

pub use delivery::*;
pub use error::*;
pub use reporting::*;
pub use reports::*;
pub use scheduler::*;
pub use service::*;
