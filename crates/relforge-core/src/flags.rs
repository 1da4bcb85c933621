use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Behavioural roles of a column.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct ColumnFlags: u16 {
        // returned by `_get`
        const GET = 0x0001;
        // accepted by `_update` and projected by views
        const INSERT = 0x0002;
        // written by the UPDATE branch of `_update`
        const UPDATE = 0x0004;
        // parameter of `_drop`
        const DELETE = 0x0008;
        const PK = 0x0010;
        const FK = 0x0020;
        const AUTONUM = 0x0040;
        // not stored in the entity table
        const FAKE = 0x0080;

        const CRUD = Self::GET.bits() | Self::INSERT.bits() | Self::UPDATE.bits() | Self::DELETE.bits();
        const DEFAULT = Self::GET.bits() | Self::INSERT.bits() | Self::UPDATE.bits();
        const PRIMARY_KEY = Self::GET.bits() | Self::INSERT.bits() | Self::DELETE.bits() | Self::PK.bits();
        /// Flags that tie a column to table storage or a procedure role.
        const STORAGE = Self::CRUD.bits() | Self::PK.bits() | Self::FK.bits() | Self::AUTONUM.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_key_preset_excludes_update() {
        assert!(ColumnFlags::PRIMARY_KEY.contains(ColumnFlags::PK | ColumnFlags::DELETE));
        assert!(!ColumnFlags::PRIMARY_KEY.contains(ColumnFlags::UPDATE));
    }

    #[test]
    fn named_flags_resolve_to_constants() {
        assert_eq!(ColumnFlags::from_name("AUTONUM"), Some(ColumnFlags::AUTONUM));
        assert_eq!(ColumnFlags::from_name("CRUD"), Some(ColumnFlags::CRUD));
        assert_eq!(ColumnFlags::from_name("autonum"), None);
    }
}
