//! Fabric scanner tests over synthetic virtual-net trees.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use varpd::link::LinkTable;
use varpd::scan::FabricScanner;
use varpd::VarpdError;

/// Creates a device directory with its `ifindex` file, the way the
/// kernel exports them.
fn mkdev(root: &Path, name: &str, ifindex: i32) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("ifindex"), format!("{ifindex}\n")).unwrap();
    dir
}

fn scanner_for(root: &TempDir) -> FabricScanner {
    FabricScanner::with_root(
        root.path().to_path_buf(),
        root.path().join("fabric-nics.txt"),
    )
}

#[test]
fn test_vxlan_and_vlan_discovery() {
    let root = TempDir::new().unwrap();
    let vxlan_dir = mkdev(root.path(), "sdcvxl5", 7);
    mkdev(&vxlan_dir, "upper_vx5v3", 9);

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();

    let vxlan = links.link_by_index(7).expect("VXLAN registered");
    assert_eq!(vxlan.name, "sdcvxl5");
    assert_eq!(vxlan.id, 5);
    assert!(vxlan.is_vxlan());

    let vlan = links.link_by_index(9).expect("VLAN registered");
    assert_eq!(vlan.name, "vx5v3");
    assert_eq!(vlan.id, 3);
    assert_eq!(vlan.parent.as_ref().unwrap().ifindex, 7);

    assert_eq!(links.vnet_for_index(7), Some(5));
    assert_eq!(links.vnet_for_index(9), Some(5));
}

#[test]
fn test_rescan_is_idempotent() {
    let root = TempDir::new().unwrap();
    let vxlan_dir = mkdev(root.path(), "sdcvxl44", 12);
    mkdev(&vxlan_dir, "upper_vx44v7", 13);

    let scanner = scanner_for(&root);
    let mut links = LinkTable::new();
    scanner.scan(&mut links, true).unwrap();
    scanner.scan(&mut links, false).unwrap();

    assert_eq!(links.link_by_index(12).unwrap().id, 44);
    assert_eq!(links.link_by_index(13).unwrap().id, 7);
}

#[test]
fn test_vnetid_parse_bounds() {
    let root = TempDir::new().unwrap();
    mkdev(root.path(), "sdcvxl0", 10);
    mkdev(root.path(), "sdcvxl16777216", 11);
    mkdev(root.path(), "sdcvxl1", 12);
    mkdev(root.path(), "sdcvxl16777215", 13);

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();

    assert!(links.link_by_index(10).is_none());
    assert!(links.link_by_index(11).is_none());
    assert_eq!(links.link_by_index(12).unwrap().id, 1);
    assert_eq!(links.link_by_index(13).unwrap().id, 16777215);
}

#[test]
fn test_vid_parse_bounds() {
    let root = TempDir::new().unwrap();
    let vxlan_dir = mkdev(root.path(), "sdcvxl5", 7);
    mkdev(&vxlan_dir, "upper_vx5v0", 20);
    mkdev(&vxlan_dir, "upper_vx5v1024", 21);
    mkdev(&vxlan_dir, "upper_vx5v1", 22);
    mkdev(&vxlan_dir, "upper_vx5v1023", 23);

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();

    assert!(links.link_by_index(20).is_none());
    assert!(links.link_by_index(21).is_none());
    assert_eq!(links.link_by_index(22).unwrap().id, 1);
    assert_eq!(links.link_by_index(23).unwrap().id, 1023);
}

#[test]
fn test_unrelated_devices_are_ignored() {
    let root = TempDir::new().unwrap();
    mkdev(root.path(), "eth0", 2);
    mkdev(root.path(), "docker0", 3);
    mkdev(root.path(), "sdcvx", 4); // prefix almost, but not quite

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();

    for ifindex in [2, 3, 4] {
        assert!(links.link_by_index(ifindex).is_none());
    }
}

#[test]
fn test_reregistration_mismatch_is_fatal() {
    let root = TempDir::new().unwrap();
    mkdev(root.path(), "sdcvxl5", 7);

    let scanner = scanner_for(&root);
    let mut links = LinkTable::new();
    scanner.scan(&mut links, true).unwrap();

    // The same ifindex reappears under a different vnet-id.
    fs::remove_dir_all(root.path().join("sdcvxl5")).unwrap();
    mkdev(root.path(), "sdcvxl6", 7);

    assert!(matches!(
        scanner.scan(&mut links, false),
        Err(VarpdError::LinkMismatch { ifindex: 7, .. })
    ));
}

#[test]
fn test_unparsable_ifindex_is_fatal() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("sdcvxl5");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("ifindex"), "bogus\n").unwrap();

    let mut links = LinkTable::new();
    assert!(matches!(
        scanner_for(&root).scan(&mut links, true),
        Err(VarpdError::Scan(_))
    ));
}

#[test]
fn test_missing_root_is_fatal() {
    let scanner = FabricScanner::with_root(
        PathBuf::from("/nonexistent/virtual/net"),
        PathBuf::from("/nonexistent/fabric-nics.txt"),
    );
    let mut links = LinkTable::new();
    assert!(matches!(
        scanner.scan(&mut links, true),
        Err(VarpdError::Scan(_))
    ));
}

#[test]
fn test_fabric_side_walk() {
    let root = TempDir::new().unwrap();
    let fabric_dir = root.path().join("fabric0");
    let vlan_dir = mkdev(&fabric_dir, "lower_vx5v3", 9);
    mkdev(&vlan_dir, "lower_sdcvxl5", 7);
    fs::write(root.path().join("fabric-nics.txt"), "fabric0\n").unwrap();

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();

    let vxlan = links.link_by_index(7).expect("VXLAN found via lower chain");
    assert_eq!(vxlan.name, "sdcvxl5");
    assert_eq!(vxlan.id, 5);

    let vlan = links.link_by_index(9).expect("VLAN found via lower chain");
    assert_eq!(vlan.name, "vx5v3");
    assert_eq!(vlan.id, 3);
    assert_eq!(vlan.parent.as_ref().unwrap().ifindex, 7);
}

#[test]
fn test_both_walks_commit_the_same_entries() {
    let root = TempDir::new().unwrap();

    // VXLAN-side view.
    let vxlan_dir = mkdev(root.path(), "sdcvxl5", 7);
    mkdev(&vxlan_dir, "upper_vx5v3", 9);

    // Fabric-side view of the same links.
    let fabric_dir = root.path().join("fabric0");
    let vlan_dir = mkdev(&fabric_dir, "lower_vx5v3", 9);
    mkdev(&vlan_dir, "lower_sdcvxl5", 7);
    fs::write(root.path().join("fabric-nics.txt"), "fabric0\n").unwrap();

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();

    assert_eq!(links.link_by_index(7).unwrap().name, "sdcvxl5");
    assert_eq!(links.link_by_index(9).unwrap().name, "vx5v3");
}

#[test]
fn test_missing_nic_file_skips_fabric_walk() {
    let root = TempDir::new().unwrap();
    mkdev(root.path(), "sdcvxl5", 7);

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();
    assert!(links.link_by_index(7).is_some());
}

#[test]
fn test_malformed_fabric_entries_are_skipped() {
    let root = TempDir::new().unwrap();
    // fabric1 has no lower VLAN link at all; fabric2's chain carries a
    // mismatched vnet-id.
    fs::create_dir_all(root.path().join("fabric1")).unwrap();
    let fabric2 = root.path().join("fabric2");
    let vlan_dir = mkdev(&fabric2, "lower_vx5v3", 9);
    mkdev(&vlan_dir, "lower_sdcvxl8", 7);
    fs::write(root.path().join("fabric-nics.txt"), "fabric1\nfabric2\n").unwrap();

    let mut links = LinkTable::new();
    scanner_for(&root).scan(&mut links, true).unwrap();
    assert!(links.link_by_index(7).is_none());
    assert!(links.link_by_index(9).is_none());
}
