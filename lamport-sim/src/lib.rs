//! Driver support for the mutual-exclusion simulation: the log-file writers
//! the binary flushes after a run.

pub mod logs;
