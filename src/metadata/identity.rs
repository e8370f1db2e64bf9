//! Module identity: four-part versions and strong-name public keys.

use std::{fmt, str::FromStr};

use crate::{Error, Result};

/// Four-part module version (`major.minor.build.revision`).
///
/// # Examples
///
/// ```rust
/// use cilweave::metadata::identity::Version;
///
/// let version: Version = "1.2.3.4".parse()?;
/// assert_eq!(version, Version::new(1, 2, 3, 4));
/// assert_eq!(Version::parse("2.0")?.to_string(), "2.0.0.0");
/// assert!(Version::new(2, 0, 0, 0) > version);
/// # Ok::<(), cilweave::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    /// Major component
    pub major: u16,
    /// Minor component
    pub minor: u16,
    /// Build component
    pub build: u16,
    /// Revision component
    pub revision: u16,
}

impl Version {
    /// `0.0.0.0`
    pub const ZERO: Version = Version::new(0, 0, 0, 0);

    /// Creates a version from its components
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Version {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses one to four dot-separated components; missing components are zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for more than four components or a component that is not
    /// a `u16`.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.trim().split('.').collect();
        if parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", text));
        }

        let mut components = [0u16; 4];
        for (component, part) in components.iter_mut().zip(&parts) {
            *component = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The public key a module is strong-named with.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    /// Wraps a raw public key blob
    #[must_use]
    pub fn new(blob: Vec<u8>) -> Self {
        PublicKey(blob)
    }

    /// The raw blob
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey(")?;
        for byte in self.0.iter().take(8) {
            write!(f, "{byte:02x}")?;
        }
        if self.0.len() > 8 {
            write!(f, "..")?;
        }
        write!(f, ")")
    }
}
