pub mod directory;
pub(crate) mod entries;
pub mod enumerator;
pub mod error;
pub mod flags;
pub(crate) mod links;
pub mod object;
pub mod oid;
pub mod schema;
pub(crate) mod search;
pub(crate) mod store;
pub mod syntax;
pub mod values;

#[cfg(test)]
pub(crate) mod fixture;
