use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct NtdsToml {
    pub output: Output,
    pub directory: DirectoryOptions,
    #[serde(default)]
    pub queries: Vec<Query>,
}

#[derive(Debug, Deserialize)]
pub struct Output {
    pub name: String,
    pub directory: String,
    /**json or jsonl */
    pub format: String,
    pub compress: bool,
    pub logging: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DirectoryOptions {
    /**Path to NTDS.dit or a JSON table snapshot of it */
    pub path: String,
    #[serde(default = "default_true")]
    pub read_only: bool,
    /**Distinguished name of the root domain. Autodetected when absent */
    pub root_domain: Option<String>,
    #[serde(default = "default_true")]
    pub cache_generic_objects: bool,
}

#[derive(Debug, Deserialize)]
pub struct Query {
    /**Based on query name run one of the directory queries */
    pub query_name: String,
    /**Child names relative to the root domain, separated by '/' */
    pub path: Option<String>,
    pub search: Option<String>,
    pub class: Option<String>,
    #[serde(default)]
    pub include_subclasses: bool,
    /**Attributes to include for each object. Empty means none */
    #[serde(default)]
    pub attributes: Vec<String>,
}

fn default_true() -> bool {
    true
}
