pub mod files;
pub mod fs_scan;
pub mod history;
pub mod log_status;
pub mod stats;
