pub mod pulse;
pub mod report;
pub mod setup;
pub mod stats;
pub mod sync;
pub mod ui;
