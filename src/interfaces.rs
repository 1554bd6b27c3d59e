//! Network interface discovery
//!
//! Lists the link-layer interfaces a publisher can bind to, so the binary can
//! offer a choice (`--list-interfaces`) before any socket is opened.

use crate::error::Result;

/// Names of every interface with a link-layer (`AF_PACKET`) address
///
/// Order follows the kernel's listing; duplicates are dropped.
#[cfg(target_os = "linux")]
pub fn list_network_interfaces() -> Result<Vec<String>> {
    use std::ffi::CStr;

    let mut addrs: *mut libc::ifaddrs = std::ptr::null_mut();
    // SAFETY: getifaddrs writes a list head we free below
    if unsafe { libc::getifaddrs(&mut addrs) } != 0 {
        return Err(std::io::Error::last_os_error().into());
    }

    let mut names: Vec<String> = Vec::new();
    let mut cursor = addrs;
    while !cursor.is_null() {
        // SAFETY: cursor is a node of the list returned by getifaddrs
        let entry = unsafe { &*cursor };
        let is_packet = !entry.ifa_addr.is_null()
            // SAFETY: ifa_addr checked non-null
            && i32::from(unsafe { (*entry.ifa_addr).sa_family }) == libc::AF_PACKET;
        if is_packet && !entry.ifa_name.is_null() {
            // SAFETY: ifa_name is a NUL-terminated string owned by the list
            let name = unsafe { CStr::from_ptr(entry.ifa_name) }
                .to_string_lossy()
                .into_owned();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        cursor = entry.ifa_next;
    }

    // SAFETY: addrs came from a successful getifaddrs and is freed once
    unsafe { libc::freeifaddrs(addrs) };

    tracing::debug!("Found {} network interface(s)", names.len());
    Ok(names)
}

/// Raw Ethernet publishing is Linux-only; nothing to list elsewhere
#[cfg(not(target_os = "linux"))]
pub fn list_network_interfaces() -> Result<Vec<String>> {
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_has_no_duplicates() {
        let names = list_network_interfaces().unwrap();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_names_are_not_empty() {
        for name in list_network_interfaces().unwrap() {
            assert!(!name.is_empty());
        }
    }
}
