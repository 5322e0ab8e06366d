//! The fabric link inventory.
//!
//! Every overlay-participating interface the host exposes is tracked as
//! a [`FabricLink`] in a [`LinkTable`] keyed directly by the kernel's
//! ifindex. Kernel ifindex values monotonically increase and are not
//! reused, so the table only ever grows.

use crate::error::{Result, VarpdError};
use std::sync::Arc;
use tracing::warn;

/// Initial link table size; the table doubles from here on demand.
pub const LINKTAB_START_SIZE: usize = 64;

/// Longest interface name the kernel allows (IFNAMSIZ minus the NUL).
pub const LINK_NAME_MAX: usize = 15;

/// One interface in the overlay stack.
///
/// A VXLAN device has `parent == None` and `id` is its vnet-id; a
/// VLAN-over-VXLAN child points at its VXLAN and `id` is its VLAN id.
/// Entries are immutable once registered.
#[derive(Debug)]
pub struct FabricLink {
    pub ifindex: i32,
    pub name: String,
    pub id: u32,
    pub parent: Option<Arc<FabricLink>>,
}

impl FabricLink {
    /// True for VXLAN devices, false for VLAN children.
    pub fn is_vxlan(&self) -> bool {
        self.parent.is_none()
    }

    /// The vnet-id of the VXLAN segment this link participates in.
    pub fn vnetid(&self) -> u32 {
        match &self.parent {
            Some(vxlan) => vxlan.id,
            None => self.id,
        }
    }
}

/// The ifindex-keyed inventory of fabric links.
#[derive(Debug)]
pub struct LinkTable {
    slots: Vec<Option<Arc<FabricLink>>>,
}

impl LinkTable {
    pub fn new() -> Self {
        Self {
            slots: vec![None; LINKTAB_START_SIZE],
        }
    }

    /// Current table size (slot count, not occupancy).
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Registers a link, or verifies an existing registration.
    ///
    /// An occupied slot must match the incoming fields exactly; any
    /// difference means the kernel reused an ifindex out from under us
    /// and is fatal.
    pub fn upsert(
        &mut self,
        parent: Option<&Arc<FabricLink>>,
        name: &str,
        ifindex: i32,
        id: u32,
    ) -> Result<Arc<FabricLink>> {
        if ifindex < 0 {
            return Err(VarpdError::LinkIndex(ifindex));
        }
        if name.len() > LINK_NAME_MAX || !name.is_ascii() {
            return Err(VarpdError::LinkName(name.to_string()));
        }

        let index = ifindex as usize;
        while index >= self.slots.len() {
            let newsize = self
                .slots
                .len()
                .checked_mul(2)
                .filter(|&n| n <= i32::MAX as usize + 1)
                .ok_or(VarpdError::LinkIndex(ifindex))?;
            warn!(
                ifindex,
                from = self.slots.len(),
                to = newsize,
                "index forcing link table resize"
            );
            self.slots.resize(newsize, None);
        }

        match &self.slots[index] {
            None => {
                let link = Arc::new(FabricLink {
                    ifindex,
                    name: name.to_string(),
                    id,
                    parent: parent.cloned(),
                });
                self.slots[index] = Some(Arc::clone(&link));
                Ok(link)
            }
            Some(existing) => {
                let parents_match = match (&existing.parent, parent) {
                    (None, None) => true,
                    (Some(have), Some(want)) => have.ifindex == want.ifindex,
                    _ => false,
                };
                if !parents_match
                    || existing.ifindex != ifindex
                    || existing.id != id
                    || existing.name != name
                {
                    return Err(VarpdError::LinkMismatch {
                        ifindex,
                        name: name.to_string(),
                    });
                }
                Ok(Arc::clone(existing))
            }
        }
    }

    /// Point lookup by ifindex.
    pub fn link_by_index(&self, ifindex: i32) -> Option<&Arc<FabricLink>> {
        if ifindex < 0 {
            return None;
        }
        self.slots.get(ifindex as usize)?.as_ref()
    }

    /// The vnet-id to use in requests triggered on `ifindex`: a VLAN
    /// child reports its VXLAN parent's vnet-id, a VXLAN its own.
    pub fn vnet_for_index(&self, ifindex: i32) -> Option<u32> {
        self.link_by_index(ifindex).map(|link| link.vnetid())
    }
}

impl Default for LinkTable {
    fn default() -> Self {
        Self::new()
    }
}
