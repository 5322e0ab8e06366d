//! Fabric link discovery from the kernel's virtual-net sysfs view.
//!
//! Two walks populate the [`LinkTable`]:
//!
//! - the VXLAN-side walk: every `sdcvxl<vnetid>` directory under the
//!   virtual-net root, plus its `upper_vx<vnetid>v<vid>` children;
//! - the fabric-side walk: the shallow fabric interfaces named in the
//!   fabric-NIC file, chased down their
//!   `lower_vx<vnetid>v<vid>/lower_sdcvxl<vnetid>` symlink chain.
//!
//! Both walks commit through the same verifying upsert, so a
//! disagreement between them surfaces as a fatal mismatch.

use crate::config;
use crate::error::{Result, VarpdError};
use crate::link::LinkTable;
use std::fs;
use std::path::{Path, PathBuf};
use svp_proto::{VlanId, VnetId};
use tracing::{debug, warn};

/// Kernel directory exporting the virtual network devices.
pub const SYSFS_VNICS: &str = "/sys/devices/virtual/net";

const VXLAN_PREFIX: &str = "sdcvxl";
const UPPER_PREFIX: &str = "upper_vx";
const LOWER_VLAN_PREFIX: &str = "lower_vx";
const LOWER_VXLAN_PREFIX: &str = "lower_sdcvxl";

/// Walks the kernel's virtual-net tree and keeps a [`LinkTable`]
/// current.
#[derive(Debug)]
pub struct FabricScanner {
    sysfs_root: PathBuf,
    nic_file: PathBuf,
}

impl FabricScanner {
    pub fn new(nic_file: PathBuf) -> Self {
        Self::with_root(PathBuf::from(SYSFS_VNICS), nic_file)
    }

    /// Scanner rooted somewhere other than the live sysfs tree.
    pub fn with_root(sysfs_root: PathBuf, nic_file: PathBuf) -> Self {
        Self {
            sysfs_root,
            nic_file,
        }
    }

    /// Discovers every fabric-participating interface and registers it.
    ///
    /// Invoked once at startup and again on link add/remove events and
    /// SIGHUP. Rescans only ever add or re-verify entries.
    pub fn scan(&self, table: &mut LinkTable, startup: bool) -> Result<()> {
        debug!(startup, root = %self.sysfs_root.display(), "scanning fabric links");
        self.scan_vxlans(table)?;
        self.scan_fabric_nics(table)?;
        Ok(())
    }

    /// VXLAN-side walk over `sdcvxl<vnetid>` directories.
    fn scan_vxlans(&self, table: &mut LinkTable) -> Result<()> {
        let entries = fs::read_dir(&self.sysfs_root).map_err(|e| {
            VarpdError::Scan(format!("opendir {}: {e}", self.sysfs_root.display()))
        })?;

        for entry in entries {
            let entry = entry
                .map_err(|e| VarpdError::Scan(format!("readdir {}: {e}", self.sysfs_root.display())))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(digits) = name.strip_prefix(VXLAN_PREFIX) else {
                continue;
            };
            let vnetid = match digits.parse::<VnetId>() {
                Ok(vnetid) => vnetid,
                Err(_) => {
                    warn!(name, "unparsable vnet id in device name, skipping");
                    continue;
                }
            };

            let dir = entry.path();
            let uppers = match fs::read_dir(&dir) {
                Ok(uppers) => uppers,
                Err(e) => {
                    warn!(name, error = %e, "cannot open device directory, continuing");
                    continue;
                }
            };

            let ifindex = read_ifindex(&dir)?;
            let vxlan = table.upsert(None, name, ifindex, vnetid.as_u32())?;
            debug!(name, ifindex, vnetid = vnetid.as_u32(), "registered VXLAN link");

            // Hang the VLAN children off the VXLAN.
            for upper in uppers {
                let upper = upper
                    .map_err(|e| VarpdError::Scan(format!("readdir {}: {e}", dir.display())))?;
                let upper_name = upper.file_name();
                let Some(upper_name) = upper_name.to_str() else {
                    continue;
                };
                if !upper_name.starts_with(UPPER_PREFIX) {
                    continue;
                }
                let Some(vid) = parse_vid_suffix(&upper_name[UPPER_PREFIX.len()..]) else {
                    warn!(name = upper_name, "unparsable VLAN id in upper link, skipping");
                    continue;
                };

                let child_dir = dir.join(upper_name);
                if let Err(e) = fs::metadata(&child_dir) {
                    warn!(name = upper_name, error = %e, "cannot open upper link, continuing");
                    continue;
                }
                let vlan_ifindex = read_ifindex(&child_dir)?;
                // Strip "upper_"; the link itself is named vx<vnetid>v<vid>.
                table.upsert(
                    Some(&vxlan),
                    &upper_name["upper_".len()..],
                    vlan_ifindex,
                    vid.as_u16() as u32,
                )?;
                debug!(
                    name = upper_name,
                    ifindex = vlan_ifindex,
                    vid = vid.as_u16(),
                    "registered VLAN link"
                );
            }
        }
        Ok(())
    }

    /// Fabric-side walk seeded from the fabric-NIC file.
    fn scan_fabric_nics(&self, table: &mut LinkTable) -> Result<()> {
        let nics = match config::load_fabric_nics(&self.nic_file) {
            Ok(nics) => nics,
            Err(e) => {
                warn!(file = %self.nic_file.display(), error = %e,
                      "fabric-NIC file unavailable, skipping fabric-side walk");
                return Ok(());
            }
        };

        for nic in &nics {
            let dir = self.sysfs_root.join(nic);
            let Some(vlan_entry) = find_entry_with_prefix(&dir, LOWER_VLAN_PREFIX) else {
                warn!(nic = %nic, "no lower VLAN link under fabric interface, skipping");
                continue;
            };
            let Some((vnetid, vid)) =
                parse_vlan_link_name(&vlan_entry[LOWER_VLAN_PREFIX.len()..])
            else {
                warn!(name = %vlan_entry, "unparsable lower VLAN link name, skipping");
                continue;
            };

            let vlan_dir = dir.join(&vlan_entry);
            let Some(vxlan_entry) = find_entry_with_prefix(&vlan_dir, LOWER_VXLAN_PREFIX) else {
                warn!(nic = %nic, "no lower VXLAN link under VLAN link, skipping");
                continue;
            };
            let vxlan_name = &vxlan_entry["lower_".len()..];
            match vxlan_name[VXLAN_PREFIX.len()..].parse::<VnetId>() {
                Ok(lower_vnetid) if lower_vnetid == vnetid => {}
                _ => {
                    warn!(name = %vxlan_entry, vnetid = vnetid.as_u32(),
                          "lower VXLAN link does not match its VLAN child, skipping");
                    continue;
                }
            }

            let vlan_ifindex = read_ifindex(&vlan_dir)?;
            let vxlan_ifindex = read_ifindex(&vlan_dir.join(&vxlan_entry))?;

            let vxlan = table.upsert(None, vxlan_name, vxlan_ifindex, vnetid.as_u32())?;
            table.upsert(
                Some(&vxlan),
                &vlan_entry["lower_".len()..],
                vlan_ifindex,
                vid.as_u16() as u32,
            )?;
            debug!(nic = %nic, vnetid = vnetid.as_u32(), vid = vid.as_u16(), "registered fabric chain");
        }
        Ok(())
    }
}

/// Reads `<dir>/ifindex`: a single decimal line. The kernel always
/// writes these; unparsable content means the tree under us is not what
/// we think it is, and that is fatal.
fn read_ifindex(dir: &Path) -> Result<i32> {
    let path = dir.join("ifindex");
    let raw = fs::read_to_string(&path)
        .map_err(|e| VarpdError::Scan(format!("read {}: {e}", path.display())))?;
    raw.trim_end_matches('\n')
        .parse::<i32>()
        .map_err(|e| VarpdError::Scan(format!("parse {}: {e}", path.display())))
}

/// `<vid>` out of the tail of `upper_vx<vnetid>v<vid>`: the digits
/// after the first `v` past the prefix.
fn parse_vid_suffix(tail: &str) -> Option<VlanId> {
    let (_, vid) = tail.split_once('v')?;
    vid.parse::<VlanId>().ok()
}

/// `(<vnetid>, <vid>)` out of `<vnetid>v<vid>`.
fn parse_vlan_link_name(tail: &str) -> Option<(VnetId, VlanId)> {
    let (vnetid, vid) = tail.split_once('v')?;
    Some((vnetid.parse().ok()?, vid.parse().ok()?))
}

/// First directory entry whose name starts with `prefix`, if the
/// directory is readable at all.
fn find_entry_with_prefix(dir: &Path, prefix: &str) -> Option<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot open directory, continuing");
            return None;
        }
    };
    entries
        .flatten()
        .filter_map(|e| e.file_name().into_string().ok())
        .find(|name| name.starts_with(prefix))
}
