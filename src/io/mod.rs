// Backup export/import and CSV reports

pub mod export;
pub mod import;

pub use export::*;
pub use import::*;
