//! Overlay VLAN identifier with validation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A VLAN identifier as used on VLAN-over-VXLAN fabric links.
///
/// The fabric restricts VLAN children to ids below 1024, and VLAN 0 is
/// reserved, so the valid range is 1-1023.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Minimum valid VLAN id.
    pub const MIN: u16 = 1;

    /// Maximum valid VLAN id on a fabric link.
    pub const MAX: u16 = 1023;

    /// Creates a new VLAN id.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is not in the valid range (1-1023).
    pub const fn new(id: u16) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(VlanId(id))
        } else {
            Err(ParseError::InvalidVlanId(id as u32))
        }
    }

    /// Returns the VLAN id as a u16.
    pub const fn as_u16(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VlanId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s.parse().map_err(|_| ParseError::InvalidVlanId(0))?;
        if id > u16::MAX as u32 {
            return Err(ParseError::InvalidVlanId(id));
        }
        VlanId::new(id as u16)
    }
}

impl TryFrom<u16> for VlanId {
    type Error = ParseError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        VlanId::new(id)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> u16 {
        vlan.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_boundaries() {
        assert!(VlanId::new(0).is_err());
        assert!(VlanId::new(1).is_ok());
        assert!(VlanId::new(1023).is_ok());
        assert!(VlanId::new(1024).is_err());
    }

    #[test]
    fn test_parse() {
        let vlan: VlanId = "1023".parse().unwrap();
        assert_eq!(vlan.as_u16(), 1023);
        assert!("1024".parse::<VlanId>().is_err());
        assert!("0".parse::<VlanId>().is_err());
        assert!("70000".parse::<VlanId>().is_err());
    }
}
