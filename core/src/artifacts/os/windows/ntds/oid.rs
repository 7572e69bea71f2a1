/**
 * Object identifiers in NTDS are stored prefix encoded: the top 16 bits select one of the
 * well known prefixes below and the low 16 bits are the last arc.
 * Schema extensions introduce prefixes outside this table
 */
const OID_PREFIXES: [Option<&str>; 39] = [
    Some("2.5.4"),
    Some("2.5.6"),
    Some("1.2.134.72.134.247.20.1.2"),
    Some("1.2.134.72.134.247.20.1.3"),
    Some("2.16.134.72.1.101.2.2.1"),
    Some("2.16.134.72.1.101.2.2.3"),
    Some("2.16.134.72.1.101.2.1.5"),
    Some("2.16.134.72.1.101.2.1.4"),
    Some("2.5.5"),
    Some("1.2.134.72.134.247.20.1.4"),
    Some("1.2.134.72.134.247.20.1.5"),
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    None,
    Some("0.9.146.38.137.147.242.44.100"),
    Some("2.16.134.72.1.134.248.66.3"),
    Some("0.9.146.38.137.147.242.44.100.1"),
    Some("2.16.134.72.1.134.248.66.3.1"),
    Some("1.2.134.72.134.247.20.1.5.182.88"),
    Some("2.5.21"),
    Some("2.5.18"),
    Some("2.5.20"),
    Some("1.3.6.1.4.1.1466.101.119"),
    Some("2.16.840.1.113730.3.2"),
    Some("1.3.6.1.4.1.250.1"),
    Some("1.2.840.113549.1.9"),
    Some("0.9.2342.19200300.100.4"),
    Some("1.2.840.113556.1.6.23"),
    Some("1.2.840.113556.1.6.18.1"),
    Some("1.2.840.113556.1.6.18.2"),
    Some("1.2.840.113556.1.6.13.3"),
    Some("1.2.840.113556.1.6.13.4"),
    Some("1.3.6.1.1.1.1"),
    Some("1.3.6.1.1.1.2"),
];

pub(crate) const UNKNOWN_PREFIX: &str = "<unknown prefix>";

/// Decode a prefix encoded OID. Unmapped prefixes decode to a placeholder
pub fn decode_prefixed_oid(encoded: u32) -> String {
    let prefix_index = (encoded >> 16) as usize;
    let prefix = OID_PREFIXES
        .get(prefix_index)
        .copied()
        .flatten()
        .unwrap_or(UNKNOWN_PREFIX);
    format!("{prefix}.{}", encoded & 0xffff)
}

/// Encode an OID using the prefix table. `None` if no prefix matches or the last arc is too large
pub fn encode_prefixed_oid(oid: &str) -> Option<u32> {
    let (prefix, last) = oid.rsplit_once('.')?;
    let last_arc: u16 = last.parse().ok()?;
    let index = OID_PREFIXES
        .iter()
        .position(|entry| *entry == Some(prefix))?;
    Some(((index as u32) << 16) | last_arc as u32)
}

/// Decode a BER encoded OID. Arcs after the first byte are taken one byte at a time
pub fn decode_ber_oid(data: &[u8]) -> Option<String> {
    let (first, remaining) = data.split_first()?;
    let mut oid = format!("{}.{}", first / 40, first % 40);
    for arc in remaining {
        oid.push_str(&format!(".{arc}"));
    }
    Some(oid)
}

#[cfg(test)]
mod tests {
    use super::{decode_ber_oid, decode_prefixed_oid, encode_prefixed_oid};

    #[test]
    fn test_decode_prefixed_oid() {
        // objectClass attribute: 2.5.4.0
        assert_eq!(decode_prefixed_oid(0), "2.5.4.0");
        // classSchema
        assert_eq!(decode_prefixed_oid(196621), "1.2.134.72.134.247.20.1.3.13");
        // DS-DN syntax: 2.5.5.1
        assert_eq!(decode_prefixed_oid(0x80001), "2.5.5.1");
        // objectSid attribute
        assert_eq!(decode_prefixed_oid(589970), "1.2.134.72.134.247.20.1.4.146");
    }

    #[test]
    fn test_unknown_prefix() {
        assert_eq!(decode_prefixed_oid(0xc0005), "<unknown prefix>.5");
        assert_eq!(decode_prefixed_oid(0x1000_0001), "<unknown prefix>.1");
    }

    #[test]
    fn test_encode_prefixed_oid() {
        assert_eq!(encode_prefixed_oid("2.5.6.13"), Some(65549));
        assert_eq!(
            encode_prefixed_oid("1.2.134.72.134.247.20.1.3.13"),
            Some(196621)
        );
        assert_eq!(encode_prefixed_oid("9.9.9.1"), None);
        assert_eq!(encode_prefixed_oid("2.5.6.70000"), None);
    }

    #[test]
    fn test_decode_ber_oid() {
        assert_eq!(decode_ber_oid(&[85, 4, 3]).unwrap(), "2.5.4.3");
        assert!(decode_ber_oid(&[]).is_none());
    }
}
