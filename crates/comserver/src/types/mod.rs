//! Core types shared by every part of the server runtime
//!
//! - Identifiers: CLSID, IID
//! - Status codes: HRESULT
//! - Errors: `ComError`

mod error;
mod guid;

pub use error::*;
pub use guid::{Guid, Clsid, Iid};
pub(crate) use error::short_type_name;

/// Well-known interface identifiers
pub mod iid {
    use super::Iid;

    /// IUnknown
    pub const IUNKNOWN: Iid = Iid::from_u128(0x00000000_0000_0000_c000_000000000046);
    /// IClassFactory
    pub const ICLASSFACTORY: Iid = Iid::from_u128(0x00000001_0000_0000_c000_000000000046);
    /// IDispatch
    pub const IDISPATCH: Iid = Iid::from_u128(0x00020400_0000_0000_c000_000000000046);
    /// IEnumUnknown
    pub const IENUMUNKNOWN: Iid = Iid::from_u128(0x00000100_0000_0000_c000_000000000046);
    /// IEnumVARIANT
    pub const IENUMVARIANT: Iid = Iid::from_u128(0x00020404_0000_0000_c000_000000000046);
    /// ISupportErrorInfo
    pub const ISUPPORTERRORINFO: Iid = Iid::from_u128(0xdf0b3d60_548f_101b_8e65_08002b2bd119);
    /// IErrorInfo
    pub const IERRORINFO: Iid = Iid::from_u128(0x1cf2b120_547d_101b_8e65_08002b2bd119);
}
