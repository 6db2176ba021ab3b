// src/constants.rs

/// Backup written by `apply` and read by `restore` when no path is given.
pub const AUTO_BACKUP_FILE: &str = "auto_backup_ultimate.json";

pub const BACKUP_FORMAT_VERSION: &str = "1.0";

// Manual exports are named `manual_backup_<timestamp>.json`.
pub const MANUAL_BACKUP_PREFIX: &str = "manual_backup_";
pub const MANUAL_BACKUP_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

pub const SUMMARY_RULE_WIDTH: usize = 60;
