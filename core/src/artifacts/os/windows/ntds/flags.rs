use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum InstanceTypeFlag {
    HeadOfNamingContext,
    ReplicaNotInstantiated,
    Writable,
    ParentNcHeld,
    NcUnderConstruction,
    NcDeleting,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SystemFlag {
    NotReplicated,
    ReplicatedToGc,
    Constructed,
    BaseSchema,
    DeletedImmediately,
    Unmovable,
    Unrenamable,
    ConfCanMoveWithRestrictions,
    ConfCanMove,
    ConfCanRenameWithRestrictions,
    CannotDelete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SearchFlag {
    Indexed,
    IndexedPerContainer,
    Anr,
    TombstonePreserve,
    CopyWithObject,
    TupleIndex,
    IndexedVlv,
    Confidential,
}

pub(crate) const HEAD_OF_NAMING_CONTEXT: u32 = 0x1;
pub(crate) const SEARCH_ANR: u32 = 0x4;

/// Get the instanceType flags of an object
pub fn instance_type_flags(value: &u32) -> Vec<InstanceTypeFlag> {
    let replica_not_instantiated = 0x2;
    let writable = 0x4;
    let parent_nc_held = 0x8;
    let under_construction = 0x10;
    let deleting = 0x20;

    let mut flags = Vec::new();
    if (value & HEAD_OF_NAMING_CONTEXT) == HEAD_OF_NAMING_CONTEXT {
        flags.push(InstanceTypeFlag::HeadOfNamingContext);
    }
    if (value & replica_not_instantiated) == replica_not_instantiated {
        flags.push(InstanceTypeFlag::ReplicaNotInstantiated);
    }
    if (value & writable) == writable {
        flags.push(InstanceTypeFlag::Writable);
    }
    if (value & parent_nc_held) == parent_nc_held {
        flags.push(InstanceTypeFlag::ParentNcHeld);
    }
    if (value & under_construction) == under_construction {
        flags.push(InstanceTypeFlag::NcUnderConstruction);
    }
    if (value & deleting) == deleting {
        flags.push(InstanceTypeFlag::NcDeleting);
    }
    flags
}

/// Get the systemFlags of a schema or configuration object
pub fn system_flags(value: &u32) -> Vec<SystemFlag> {
    let flag_values = [
        (0x1, SystemFlag::NotReplicated),
        (0x2, SystemFlag::ReplicatedToGc),
        (0x4, SystemFlag::Constructed),
        (0x10, SystemFlag::BaseSchema),
        (0x2000000, SystemFlag::DeletedImmediately),
        (0x4000000, SystemFlag::Unmovable),
        (0x8000000, SystemFlag::Unrenamable),
        (0x10000000, SystemFlag::ConfCanMoveWithRestrictions),
        (0x20000000, SystemFlag::ConfCanMove),
        (0x40000000, SystemFlag::ConfCanRenameWithRestrictions),
        (0x80000000, SystemFlag::CannotDelete),
    ];

    let mut flags = Vec::new();
    for (flag, name) in flag_values {
        if (value & flag) == flag {
            flags.push(name);
        }
    }
    flags
}

/// Get the searchFlags of an attribute
pub fn search_flags(value: &u32) -> Vec<SearchFlag> {
    let flag_values = [
        (0x1, SearchFlag::Indexed),
        (0x2, SearchFlag::IndexedPerContainer),
        (SEARCH_ANR, SearchFlag::Anr),
        (0x8, SearchFlag::TombstonePreserve),
        (0x10, SearchFlag::CopyWithObject),
        (0x20, SearchFlag::TupleIndex),
        (0x40, SearchFlag::IndexedVlv),
        (0x80, SearchFlag::Confidential),
    ];

    let mut flags = Vec::new();
    for (flag, name) in flag_values {
        if (value & flag) == flag {
            flags.push(name);
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::{
        instance_type_flags, search_flags, system_flags, InstanceTypeFlag, SearchFlag, SystemFlag,
    };

    #[test]
    fn test_instance_type_flags() {
        let result = instance_type_flags(&5);
        assert_eq!(
            result,
            vec![InstanceTypeFlag::HeadOfNamingContext, InstanceTypeFlag::Writable]
        );
        assert!(instance_type_flags(&0).is_empty());
    }

    #[test]
    fn test_system_flags() {
        let result = system_flags(&0x8000_0010);
        assert_eq!(result, vec![SystemFlag::BaseSchema, SystemFlag::CannotDelete]);
    }

    #[test]
    fn test_search_flags() {
        let result = search_flags(&0x85);
        assert_eq!(
            result,
            vec![SearchFlag::Indexed, SearchFlag::Anr, SearchFlag::Confidential]
        );
    }
}
