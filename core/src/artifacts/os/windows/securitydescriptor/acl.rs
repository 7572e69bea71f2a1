use super::sid::grab_sid;
use crate::utils::{
    nom_helper::{nom_unsigned_four_bytes, nom_unsigned_one_byte, nom_unsigned_two_bytes, Endian},
    uuid::format_guid_le_bytes,
};
use nom::{bytes::complete::take, Needed};
use std::mem::size_of;

#[derive(Debug, PartialEq, Clone)]
pub(crate) struct AccessControlEntry {
    pub(crate) ace_type: AceType,
    pub(crate) flags: u8,
    pub(crate) access_mask: u32,
    pub(crate) object_type_guid: Option<String>,
    pub(crate) inherited_object_type_guid: Option<String>,
    pub(crate) sid: String,
}

#[derive(Debug, PartialEq, Clone)]
pub(crate) enum AceType {
    AccessAllowed,
    AccessDenied,
    SystemAudit,
    SystemAlarm,
    AccessAllowedObject,
    AccessDeniedObject,
    SystemAuditObject,
    SystemAlarmObject,
    AccessAllowedCallback,
    AccessDeniedCallback,
    AccessAllowedObjectCallback,
    SystemMandatoryLabel,
    Unknown(u8),
}

impl AceType {
    fn from_value(value: u8) -> AceType {
        match value {
            0x0 => AceType::AccessAllowed,
            0x1 => AceType::AccessDenied,
            0x2 => AceType::SystemAudit,
            0x3 => AceType::SystemAlarm,
            0x5 => AceType::AccessAllowedObject,
            0x6 => AceType::AccessDeniedObject,
            0x7 => AceType::SystemAuditObject,
            0x8 => AceType::SystemAlarmObject,
            0x9 => AceType::AccessAllowedCallback,
            0xa => AceType::AccessDeniedCallback,
            0xb => AceType::AccessAllowedObjectCallback,
            0x11 => AceType::SystemMandatoryLabel,
            _ => AceType::Unknown(value),
        }
    }

    fn is_object(&self) -> bool {
        matches!(
            self,
            AceType::AccessAllowedObject
                | AceType::AccessDeniedObject
                | AceType::SystemAuditObject
                | AceType::SystemAlarmObject
                | AceType::AccessAllowedObjectCallback
        )
    }

    fn sddl(&self) -> String {
        let value = match self {
            AceType::AccessAllowed => "A",
            AceType::AccessDenied => "D",
            AceType::SystemAudit => "AU",
            AceType::SystemAlarm => "AL",
            AceType::AccessAllowedObject => "OA",
            AceType::AccessDeniedObject => "OD",
            AceType::SystemAuditObject => "OU",
            AceType::SystemAlarmObject => "OL",
            AceType::AccessAllowedCallback => "XA",
            AceType::AccessDeniedCallback => "XD",
            AceType::AccessAllowedObjectCallback => "ZA",
            AceType::SystemMandatoryLabel => "ML",
            AceType::Unknown(value) => return format!("0x{value:x}"),
        };
        value.to_string()
    }
}

/// ACE header flags and their SDDL tokens
const ACE_FLAGS: [(u8, &str); 7] = [
    (0x1, "OI"),
    (0x2, "CI"),
    (0x4, "NP"),
    (0x8, "IO"),
    (0x10, "ID"),
    (0x40, "SA"),
    (0x80, "FA"),
];

impl AccessControlEntry {
    /// Parse the raw Windows Access Control List (ACL) data
    pub(crate) fn parse_acl(data: &[u8]) -> nom::IResult<&[u8], Vec<AccessControlEntry>> {
        // Nom header of ACL
        let (input, _revision) = nom_unsigned_one_byte(data, Endian::Le)?;
        let (input, _padding) = nom_unsigned_one_byte(input, Endian::Le)?;
        let (input, size) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, count) = nom_unsigned_two_bytes(input, Endian::Le)?;
        let (input, _padding) = nom_unsigned_two_bytes(input, Endian::Le)?;

        let adjust_size = 8;
        if size < adjust_size {
            return Err(nom::Err::Incomplete(Needed::Unknown));
        }
        // Size includes the header too, but we already nom'd that away
        let (remaining_input, mut entries_data) = take(size - adjust_size)(input)?;

        let mut entries: Vec<AccessControlEntry> = Vec::new();
        for _ in 0..count {
            let (input, ace_type_value) = nom_unsigned_one_byte(entries_data, Endian::Le)?;
            let (input, flags) = nom_unsigned_one_byte(input, Endian::Le)?;
            let (input, size) = nom_unsigned_two_bytes(input, Endian::Le)?;

            let adjust_entry_size = 4;
            if size < adjust_entry_size {
                return Err(nom::Err::Incomplete(Needed::Unknown));
            }
            let (input, ace_entry_data) = take(size - adjust_entry_size)(input)?;
            entries_data = input;

            let (ace_entry_data, access_mask) = nom_unsigned_four_bytes(ace_entry_data, Endian::Le)?;
            let mut entry = AccessControlEntry {
                ace_type: AceType::from_value(ace_type_value),
                flags,
                access_mask,
                object_type_guid: None,
                inherited_object_type_guid: None,
                sid: String::new(),
            };

            let mut sid_data = ace_entry_data;
            if entry.ace_type.is_object() {
                let (input, object_flags) = nom_unsigned_four_bytes(sid_data, Endian::Le)?;
                sid_data = input;

                let object_type_present = 0x1;
                let inherited_type_present = 0x2;
                if (object_flags & object_type_present) == object_type_present {
                    let (input, guid_data) = take(size_of::<u128>())(sid_data)?;
                    entry.object_type_guid = format_guid_le_bytes(guid_data);
                    sid_data = input;
                }
                if (object_flags & inherited_type_present) == inherited_type_present {
                    let (input, guid_data) = take(size_of::<u128>())(sid_data)?;
                    entry.inherited_object_type_guid = format_guid_le_bytes(guid_data);
                    sid_data = input;
                }
            }

            let (_, sid) = grab_sid(sid_data)?;
            entry.sid = sid;
            entries.push(entry);
        }

        Ok((remaining_input, entries))
    }

    /// Render the entry as an SDDL ACE string. SIDs are always numeric
    pub(crate) fn to_sddl(&self) -> String {
        let mut flags = String::new();
        for (flag, token) in ACE_FLAGS {
            if (self.flags & flag) == flag {
                flags.push_str(token);
            }
        }

        format!(
            "({};{flags};0x{:x};{};{};{})",
            self.ace_type.sddl(),
            self.access_mask,
            self.object_type_guid.as_deref().unwrap_or_default(),
            self.inherited_object_type_guid
                .as_deref()
                .unwrap_or_default(),
            self.sid
        )
    }
}
