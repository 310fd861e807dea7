//! Registry integration tests.

use ndproxy::Result;
use ndproxy::util::MacAddr;

use crate::common::{LOOPBACK, registry};

#[test]
fn test_open_loopback() -> Result<()> {
    require_root!();

    let mut registry = registry();
    let id = registry.open_capture_socket(LOOPBACK)?;

    let link = registry.link(id)?;
    assert_eq!(link.name(), LOOPBACK);
    assert_eq!(link.link_address(), MacAddr::default());
    assert!(link.has_icmp_socket());
    assert!(link.has_capture_socket());

    let fds: Vec<_> = registry.poll_set().entries().iter().map(|p| p.fd).collect();
    assert_eq!(fds.len(), 2);
    assert!(fds.iter().all(|fd| *fd >= 0));
    assert_ne!(fds[0], fds[1]);

    // Reopening hands back the same sockets.
    assert_eq!(registry.open_icmp_socket(LOOPBACK)?, id);
    assert_eq!(registry.open_capture_socket(LOOPBACK)?, id);
    let again: Vec<_> = registry.poll_set().entries().iter().map(|p| p.fd).collect();
    assert_eq!(fds, again);

    Ok(())
}

#[test]
fn test_missing_device() {
    require_root_void!();

    let mut registry = registry();
    let err = registry.open_capture_socket("ndpx-nosuch0").unwrap_err();
    assert!(err.is_setup());
    assert!(err.is_not_found());
    assert!(registry.is_empty());
    assert!(registry.poll_set().is_empty());
}

#[test]
fn test_invalid_name() {
    // Rejected before any system call, so no privileges needed.
    let mut registry = registry();
    let err = registry.open_icmp_socket("").unwrap_err();
    assert!(matches!(err, ndproxy::Error::InvalidName(_)));
    assert!(registry.is_empty());
}

#[test]
fn test_remove_and_reopen() -> Result<()> {
    require_root!();

    let mut registry = registry();
    let id = registry.open_capture_socket(LOOPBACK)?;

    registry.remove_link(LOOPBACK)?;
    assert!(registry.link(id).unwrap_err().is_not_found());
    assert!(registry.poll_set().is_empty());

    // The device can be acquired again under a fresh handle.
    let again = registry.open_capture_socket(LOOPBACK)?;
    assert_ne!(again, id);
    assert_eq!(registry.len(), 1);

    Ok(())
}

#[test]
fn test_allmulti_toggle() -> Result<()> {
    require_root!();

    let mut registry = registry();
    let id = registry.open_capture_socket(LOOPBACK)?;

    let prior = registry.allmulti(id)?;
    assert_eq!(registry.set_allmulti(id, !prior)?, prior);
    assert_eq!(registry.allmulti(id)?, !prior);

    assert_eq!(registry.set_allmulti(id, prior)?, !prior);
    assert_eq!(registry.allmulti(id)?, prior);

    Ok(())
}
