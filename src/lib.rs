pub mod agent;
pub mod config;
pub mod data;
pub mod error;
pub mod gym;
pub mod io;
mod macros;
pub mod math;
pub mod prelude;
pub mod report;
pub mod session;
