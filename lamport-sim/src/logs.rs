//! Writers for the two simulation artifacts.
//!
//! Both files land in the output directory, which is created on demand:
//! `messageLog.csv` holds one row per delivered message copy in extended
//! Lamport order, `criticalSectionLog.txt` one line per critical-section
//! operation.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use lamport_mutex::{Delivery, Operation};

pub const MESSAGE_LOG: &str = "messageLog.csv";
pub const CRITICAL_SECTION_LOG: &str = "criticalSectionLog.txt";

/// Write the audit log as CSV.
///
/// # Errors
///
/// Fails if the output directory cannot be created or the file cannot be
/// written.
pub fn write_message_log(directory: &Path, deliveries: &[Delivery]) -> io::Result<()> {
    fs::create_dir_all(directory)?;
    let mut file = BufWriter::new(File::create(directory.join(MESSAGE_LOG))?);
    writeln!(file, "messageType,senderId,receiverId,timestamp")?;
    for delivery in deliveries {
        writeln!(file, "{delivery}")?;
    }
    file.flush()
}

/// Write the critical-section operations log.
///
/// # Errors
///
/// Fails if the output directory cannot be created or the file cannot be
/// written.
pub fn write_critical_section_log(directory: &Path, operations: &[Operation]) -> io::Result<()> {
    fs::create_dir_all(directory)?;
    let mut file = BufWriter::new(File::create(directory.join(CRITICAL_SECTION_LOG))?);
    writeln!(file, "Operations at critical section:")?;
    for operation in operations {
        writeln!(file, "{operation}")?;
    }
    file.flush()
}
