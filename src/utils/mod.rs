//! Cross-platform utilities and helpers
//!
//! - [`fs`] - File system operations with atomic writes and safe removal
//! - [`platform`] - Platform-specific helpers (command lookup, tool-cache arch)

pub mod fs;
pub mod platform;

pub use fs::{atomic_write, copy_dir, ensure_dir, is_dir, remove_path};
pub use platform::{command_exists, get_svn_command, tool_cache_arch};
