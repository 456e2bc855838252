//! Map values

use serde::Serialize;
use std::fmt;

/// A map name plus its 128-bit GUID
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Map {
    pub name: String,
    pub guid: [u64; 2],
}

impl Map {
    /// Create a map without a GUID
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            guid: [0, 0],
        }
    }

    pub fn with_guid(name: impl Into<String>, guid: [u64; 2]) -> Self {
        Self {
            name: name.into(),
            guid,
        }
    }

    /// GUID as 32 upper-case hex digits
    pub fn guid_string(&self) -> String {
        format!("{:016X}{:016X}", self.guid[0], self.guid[1])
    }

    /// Parse a GUID rendered by [`Map::guid_string`]
    ///
    /// # Returns
    /// `None` unless the input is exactly 32 hex digits
    pub fn parse_guid(value: &str) -> Option<[u64; 2]> {
        let value = value.trim();
        if value.len() != 32 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let high = u64::from_str_radix(&value[..16], 16).ok()?;
        let low = u64::from_str_radix(&value[16..], 16).ok()?;
        Some([high, low])
    }

    /// Case-insensitive name comparison
    #[inline]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

impl fmt::Display for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guid_string() {
        let map = Map::with_guid("CNC-Field", [0x0123_4567_89AB_CDEF, 0x0F]);
        assert_eq!(map.guid_string(), "0123456789ABCDEF000000000000000F");
        assert_eq!(Map::parse_guid(&map.guid_string()), Some(map.guid));
    }

    #[test]
    fn test_parse_guid_rejects_bad_input() {
        assert_eq!(Map::parse_guid("1234"), None);
        assert_eq!(Map::parse_guid("ZZ23456789ABCDEF000000000000000F"), None);
        assert_eq!(
            Map::parse_guid("0123456789abcdef000000000000000f"),
            Some([0x0123_4567_89AB_CDEF, 0x0F])
        );
    }

    #[test]
    fn test_name_compare() {
        assert!(Map::new("CNC-Walls").is("cnc-walls"));
    }
}
