pub(crate) mod error;
pub(crate) mod ntds_collection;
pub mod os;
pub(crate) mod output;
