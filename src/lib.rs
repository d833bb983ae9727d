pub mod cli;
pub mod errors;
pub mod model;
pub mod platform;
pub mod report;
pub mod scanner;
