mod account;
mod allocation;
mod attribution;
mod budget;
mod expense;
mod family;
mod income;
mod money;
mod payment;
mod period;
mod recurrence;
mod scheduled_report;

pub use account::*;
pub use allocation::*;
pub use attribution::*;
pub use budget::*;
pub use expense::*;
pub use family::*;
pub use income::*;
pub use money::*;
pub use payment::*;
pub use period::*;
pub use recurrence::*;
pub use scheduled_report::*;
