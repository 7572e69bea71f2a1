pub(crate) mod catalog;
pub mod cursor;
pub(crate) mod dit;
pub mod error;
pub(crate) mod header;
pub mod memory;
pub(crate) mod page;
pub(crate) mod pages;
pub(crate) mod reader;
pub(crate) mod record;
pub(crate) mod snapshot;
pub(crate) mod tags;
