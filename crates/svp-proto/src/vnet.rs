//! VXLAN network identifier with validation.

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 24-bit VXLAN network identifier (vnet-id).
///
/// Zero is not a valid segment and the identifier must fit in 24 bits,
/// so the valid range is 1-16777215.
///
/// # Examples
///
/// ```
/// use svp_proto::VnetId;
///
/// let vnet = VnetId::new(4385813).unwrap();
/// assert_eq!(vnet.as_u32(), 4385813);
///
/// assert!(VnetId::new(0).is_err());
/// assert!(VnetId::new(1 << 24).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct VnetId(u32);

impl VnetId {
    /// Minimum valid vnet-id.
    pub const MIN: u32 = 1;

    /// Maximum valid vnet-id (2^24 - 1).
    pub const MAX: u32 = (1 << 24) - 1;

    /// Creates a new vnet-id.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is zero or does not fit in 24 bits.
    pub const fn new(id: u32) -> Result<Self, ParseError> {
        if id >= Self::MIN && id <= Self::MAX {
            Ok(VnetId(id))
        } else {
            Err(ParseError::InvalidVnetId(id))
        }
    }

    /// Returns the vnet-id as a u32.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for VnetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VnetId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s.parse().map_err(|_| ParseError::InvalidVnetId(0))?;
        VnetId::new(id)
    }
}

impl TryFrom<u32> for VnetId {
    type Error = ParseError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        VnetId::new(id)
    }
}

impl From<VnetId> for u32 {
    fn from(vnet: VnetId) -> u32 {
        vnet.0
    }
}
