pub mod format;
pub mod report;
