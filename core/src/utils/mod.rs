pub(crate) mod compression;
pub(crate) mod encoding;
pub(crate) mod error;
pub(crate) mod logging;
pub(crate) mod nom_helper;
pub(crate) mod ntds_toml;
pub(crate) mod strings;
pub(crate) mod time;
pub(crate) mod uuid;
