pub mod config;
pub mod report;
pub mod types;
pub mod week;

pub use config::{Config, CrmConfig};
pub use types::*;
pub use week::WeekInfo;
