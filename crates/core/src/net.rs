//! IPv4 helpers shared by the game model and the ban store

use std::net::Ipv4Addr;

/// Convert a dotted IPv4 string into its host-order `u32`
///
/// Returns 0 for anything that is not a plain IPv4 address.
pub fn ipv4_to_u32(ip: &str) -> u32 {
    ip.trim().parse::<Ipv4Addr>().map(u32::from).unwrap_or(0)
}

/// Render a host-order `u32` as a dotted IPv4 string
pub fn u32_to_ipv4(ip: u32) -> String {
    Ipv4Addr::from(ip).to_string()
}

/// Netmask for a CIDR prefix length (values above 32 are treated as 32)
#[inline]
pub fn netmask(prefix_length: u8) -> u32 {
    match prefix_length {
        0 => 0,
        n if n >= 32 => u32::MAX,
        n => u32::MAX << (32 - n as u32),
    }
}

/// Whether `a` and `b` fall in the same network of the given prefix length
#[inline]
pub fn same_network(a: u32, b: u32, prefix_length: u8) -> bool {
    let mask = netmask(prefix_length);
    a & mask == b & mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_roundtrip() {
        assert_eq!(ipv4_to_u32("127.0.0.1"), 0x7F00_0001);
        assert_eq!(u32_to_ipv4(0x7F00_0001), "127.0.0.1");
        assert_eq!(ipv4_to_u32("::1"), 0);
        assert_eq!(ipv4_to_u32("garbage"), 0);
    }

    #[test]
    fn test_netmask() {
        assert_eq!(netmask(0), 0);
        assert_eq!(netmask(8), 0xFF00_0000);
        assert_eq!(netmask(24), 0xFFFF_FF00);
        assert_eq!(netmask(32), u32::MAX);
        assert_eq!(netmask(40), u32::MAX);
    }

    #[test]
    fn test_same_network() {
        let a = ipv4_to_u32("10.1.2.3");
        let b = ipv4_to_u32("10.1.2.200");
        assert!(same_network(a, b, 24));
        assert!(!same_network(a, b, 32));
        assert!(same_network(a, ipv4_to_u32("99.0.0.1"), 0));
    }
}
