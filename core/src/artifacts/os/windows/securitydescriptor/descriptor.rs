use super::{acl::AccessControlEntry, sid::grab_sid};
use crate::utils::nom_helper::{
    nom_unsigned_four_bytes, nom_unsigned_one_byte, nom_unsigned_two_bytes, Endian,
};
use nom::bytes::complete::take;

#[derive(Debug, Clone)]
pub(crate) struct Descriptor {
    pub(crate) control: u16,
    pub(crate) owner_sid: Option<String>,
    pub(crate) group_sid: Option<String>,
    pub(crate) dacls: Option<Vec<AccessControlEntry>>,
    pub(crate) sacls: Option<Vec<AccessControlEntry>>,
}

const DACL_AUTO_INHERIT_REQ: u16 = 0x100;
const SACL_AUTO_INHERIT_REQ: u16 = 0x200;
const DACL_AUTO_INHERITED: u16 = 0x400;
const SACL_AUTO_INHERITED: u16 = 0x800;
const DACL_PROTECTED: u16 = 0x1000;
const SACL_PROTECTED: u16 = 0x2000;

impl Descriptor {
    /// Parse a self-relative Security Descriptor. Typically contains ACLs and SIDs
    pub(crate) fn parse_descriptor(data: &[u8]) -> nom::IResult<&[u8], Descriptor> {
        let (input, _revision) = nom_unsigned_one_byte(data, Endian::Le)?;
        let (input, _padding) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, control) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, owner_sid_offset) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, group_sid_offset) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, sacl_offset) = nom_unsigned_four_bytes(input, Endian::Le)?;
        let (input, dacl_offset) = nom_unsigned_four_bytes(input, Endian::Le)?;

        let empty = 0;
        let mut security_info = Descriptor {
            control,
            owner_sid: None,
            group_sid: None,
            dacls: None,
            sacls: None,
        };

        if sacl_offset != empty {
            let (acl_start, _) = take(sacl_offset)(data)?;
            let (_, acl) = AccessControlEntry::parse_acl(acl_start)?;
            security_info.sacls = Some(acl);
        }
        if dacl_offset != empty {
            let (acl_start, _) = take(dacl_offset)(data)?;
            let (_, acl) = AccessControlEntry::parse_acl(acl_start)?;
            security_info.dacls = Some(acl);
        }
        if owner_sid_offset != empty {
            let (sid_start, _) = take(owner_sid_offset)(data)?;
            let (_, sid) = grab_sid(sid_start)?;
            security_info.owner_sid = Some(sid);
        }
        if group_sid_offset != empty {
            let (sid_start, _) = take(group_sid_offset)(data)?;
            let (_, sid) = grab_sid(sid_start)?;
            security_info.group_sid = Some(sid);
        }

        Ok((input, security_info))
    }

    /// Render the descriptor as SDDL text
    pub(crate) fn to_sddl(&self) -> String {
        let mut sddl = String::new();
        if let Some(owner) = &self.owner_sid {
            sddl.push_str(&format!("O:{owner}"));
        }
        if let Some(group) = &self.group_sid {
            sddl.push_str(&format!("G:{group}"));
        }
        if let Some(dacls) = &self.dacls {
            sddl.push_str("D:");
            sddl.push_str(&self.acl_flags(
                DACL_PROTECTED,
                DACL_AUTO_INHERIT_REQ,
                DACL_AUTO_INHERITED,
            ));
            for entry in dacls {
                sddl.push_str(&entry.to_sddl());
            }
        }
        if let Some(sacls) = &self.sacls {
            sddl.push_str("S:");
            sddl.push_str(&self.acl_flags(
                SACL_PROTECTED,
                SACL_AUTO_INHERIT_REQ,
                SACL_AUTO_INHERITED,
            ));
            for entry in sacls {
                sddl.push_str(&entry.to_sddl());
            }
        }
        sddl
    }

    fn acl_flags(&self, protected: u16, inherit_req: u16, inherited: u16) -> String {
        let mut flags = String::new();
        if (self.control & protected) == protected {
            flags.push('P');
        }
        if (self.control & inherit_req) == inherit_req {
            flags.push_str("AR");
        }
        if (self.control & inherited) == inherited {
            flags.push_str("AI");
        }
        flags
    }
}

/// Parse a self-relative descriptor and render it as SDDL. `None` if the data is malformed
pub(crate) fn descriptor_to_sddl(data: &[u8]) -> Option<String> {
    let (_, descriptor) = Descriptor::parse_descriptor(data).ok()?;
    Some(descriptor.to_sddl())
}

#[cfg(test)]
mod tests {
    use super::{descriptor_to_sddl, Descriptor};

    #[test]
    fn test_parse_descriptor() {
        let test = [
            1, 0, 20, 156, 196, 0, 0, 0, 212, 0, 0, 0, 0, 0, 0, 0, 20, 0, 0, 0, 2, 0, 176, 0, 6, 0,
            0, 0, 0, 2, 24, 0, 25, 0, 2, 0, 1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 33, 2, 0, 0, 0, 2,
            24, 0, 63, 0, 15, 0, 1, 2, 0, 0, 0, 0, 0, 5, 32, 0, 0, 0, 32, 2, 0, 0, 0, 2, 20, 0, 63,
            0, 15, 0, 1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0, 0, 2, 20, 0, 63, 0, 15, 0, 1, 1, 0, 0,
            0, 0, 0, 3, 0, 0, 0, 0, 0, 2, 24, 0, 25, 0, 2, 0, 1, 2, 0, 0, 0, 0, 0, 15, 2, 0, 0, 0,
            1, 0, 0, 0, 0, 2, 56, 0, 25, 0, 2, 0, 1, 10, 0, 0, 0, 0, 0, 15, 3, 0, 0, 0, 0, 4, 0, 0,
            176, 49, 128, 63, 108, 188, 99, 76, 60, 224, 80, 209, 151, 12, 161, 98, 15, 1, 203, 25,
            126, 122, 166, 192, 250, 230, 151, 241, 25, 163, 12, 206, 1, 2, 0, 0, 0, 0, 0, 5, 32,
            0, 0, 0, 32, 2, 0, 0, 1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0,
        ];
        let (_, results) = Descriptor::parse_descriptor(&test).unwrap();

        assert_eq!(results.group_sid.as_deref(), Some("S-1-5-18"));
        assert_eq!(results.owner_sid.as_deref(), Some("S-1-5-32-544"));
        assert!(results.sacls.is_none());

        let dacls = results.dacls.as_ref().unwrap();
        assert_eq!(dacls.len(), 6);
        assert_eq!(dacls[0].sid, "S-1-5-32-545");

        let sddl = results.to_sddl();
        assert!(sddl.starts_with("O:S-1-5-32-544G:S-1-5-18D:PAI(A;CI;0x20019;;;S-1-5-32-545)"));
    }

    #[test]
    fn test_descriptor_to_sddl() {
        // Owner and group only
        let test = [
            1, 0, 0, 128, 20, 0, 0, 0, 32, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0,
            5, 18, 0, 0, 0, 1, 1, 0, 0, 0, 0, 0, 5, 18, 0, 0, 0,
        ];
        assert_eq!(descriptor_to_sddl(&test).unwrap(), "O:S-1-5-18G:S-1-5-18");
        assert!(descriptor_to_sddl(&test[..10]).is_none());
    }
}
