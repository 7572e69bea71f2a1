pub(crate) mod artifacts;
pub(crate) mod error;
pub mod ese;
pub mod ntds;
pub(crate) mod securitydescriptor;
