//! Common test utilities for integration tests.

use ndproxy::Registry;
use ndproxy::ndp::SystemIo;

/// The loopback device, present in every network namespace.
pub const LOOPBACK: &str = "lo";

/// A registry backed by real sockets.
pub fn registry() -> Registry<SystemIo> {
    Registry::new(SystemIo::new())
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Skip the test if not running as root.
///
/// Use this at the beginning of integration tests that require root privileges.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}

/// Skip the test if not running as root (for non-Result functions).
#[macro_export]
macro_rules! require_root_void {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return;
        }
    };
}
