pub(crate) mod acl;
pub(crate) mod descriptor;
pub(crate) mod sid;
