//! Interface name utilities.

/// Maximum interface name length (including null terminator).
pub const IFNAMSIZ: usize = 16;

/// Error type for interface names.
#[derive(Debug, thiserror::Error)]
pub enum IfError {
    #[error("invalid interface name: {0}")]
    InvalidName(String),
}

pub type Result<T> = std::result::Result<T, IfError>;

/// Validate an interface name.
pub fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(IfError::InvalidName("empty name".to_string()));
    }

    if name.len() >= IFNAMSIZ {
        return Err(IfError::InvalidName(format!(
            "name too long (max {} chars)",
            IFNAMSIZ - 1
        )));
    }

    if name.contains('/') || name.contains('\0') {
        return Err(IfError::InvalidName(
            "name contains invalid characters".to_string(),
        ));
    }

    if name.chars().any(|c| c.is_whitespace()) {
        return Err(IfError::InvalidName("name contains whitespace".to_string()));
    }

    Ok(())
}

/// Encode a validated name as the NUL-padded buffer `struct ifreq` expects.
pub fn to_ifr_name(name: &str) -> Result<[libc::c_char; IFNAMSIZ]> {
    validate(name)?;

    let mut buf = [0 as libc::c_char; IFNAMSIZ];
    for (dst, &src) in buf.iter_mut().zip(name.as_bytes()) {
        *dst = src as libc::c_char;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(validate("eth0").is_ok());
        assert!(validate("lo").is_ok());
        assert!(validate("veth123").is_ok());

        assert!(validate("").is_err());
        assert!(validate("this_name_is_way_too_long_for_an_interface").is_err());
        assert!(validate("eth/0").is_err());
        assert!(validate("eth 0").is_err());
    }

    #[test]
    fn test_to_ifr_name() {
        let buf = to_ifr_name("eth0").unwrap();
        assert_eq!(buf[..4], [b'e' as libc::c_char, b't' as _, b'h' as _, b'0' as _]);
        assert!(buf[4..].iter().all(|&c| c == 0));

        // Longest accepted name still leaves room for the terminator.
        let buf = to_ifr_name("abcdefghijklmno").unwrap();
        assert_eq!(buf[IFNAMSIZ - 1], 0);

        assert!(to_ifr_name("abcdefghijklmnop").is_err());
    }
}
