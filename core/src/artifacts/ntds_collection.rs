use super::os::windows::{
    artifacts::{
        attributes, children, classes, members, memberof, object, output_data, root, search,
        subtree,
    },
    error::WinArtifactError,
    ntds::directory::{NtdsDirectory, OpenOptions},
};
use crate::{structs::toml::NtdsToml, utils::time::time_now};
use log::{error, info};

/// Parse an NTDS collection TOML script and run each query against the directory
pub(crate) fn ntds_collection(toml_data: &[u8]) -> Result<(), WinArtifactError> {
    let collector = match NtdsToml::parse_ntds_toml(toml_data) {
        Ok(results) => results,
        Err(err) => {
            error!("[ntds] Failed to parse TOML data: {err:?}");
            return Err(WinArtifactError::BadToml);
        }
    };

    let options = OpenOptions {
        read_only: collector.directory.read_only,
        root_domain: collector.directory.root_domain.clone(),
        cache_generic_objects: collector.directory.cache_generic_objects,
    };
    let directory = match NtdsDirectory::open(&collector.directory.path, &options) {
        Ok(result) => result,
        Err(err) => {
            error!(
                "[ntds] Could not open directory {}: {err:?}",
                collector.directory.path
            );
            return Err(WinArtifactError::Directory);
        }
    };

    let mut output_failed = false;
    for query in &collector.queries {
        let start_time = time_now();
        let results = match query.query_name.as_str() {
            "root" => root(&directory, query),
            "children" => children(&directory, query),
            "subtree" => subtree(&directory, query),
            "search" => search(&directory, query),
            "object" => object(&directory, query),
            "members" => members(&directory, query),
            "memberof" => memberof(&directory, query),
            "classes" => classes(&directory),
            "attributes" => attributes(&directory),
            _ => {
                error!("[ntds] Unknown query name: {}", query.query_name);
                continue;
            }
        };

        let serde_data = match results {
            Ok(result) => result,
            Err(err) => {
                error!("[ntds] Failed to run query {}: {err:?}", query.query_name);
                continue;
            }
        };
        match output_data(&serde_data, &query.query_name, &collector.output, &start_time) {
            Ok(_) => info!("[ntds] Collected {}", query.query_name),
            Err(err) => {
                error!("[ntds] Failed to output {}: {err:?}", query.query_name);
                output_failed = true;
            }
        }
    }

    if output_failed {
        return Err(WinArtifactError::Output);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::ntds_collection;
    use crate::artifacts::os::windows::error::WinArtifactError;
    use std::{fs::remove_dir_all, path::PathBuf};

    #[test]
    fn test_ntds_collection() {
        let mut test_location = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        test_location.push("tests/test_data/ntds/ntds.json");

        let toml = format!(
            r#"
[output]
name = "ntds_collection_test"
directory = "./tmp"
format = "json"
compress = true

[directory]
path = "{}"

[[queries]]
query_name = "search"
search = "alice"
attributes = ["sAMAccountName"]

[[queries]]
query_name = "unknown"

[[queries]]
query_name = "children"
path = "Missing"
"#,
            test_location.display().to_string().replace('\\', "/")
        );
        ntds_collection(toml.as_bytes()).unwrap();
        remove_dir_all("./tmp/ntds_collection_test").unwrap();
    }

    #[test]
    fn test_ntds_collection_bad_directory() {
        let toml = r#"
[output]
name = "ntds_collection_bad"
directory = "./tmp"
format = "json"
compress = false

[directory]
path = "./does/not/exist.json"
"#;
        let result = ntds_collection(toml.as_bytes());
        assert!(matches!(result, Err(WinArtifactError::Directory)));
    }

    #[test]
    fn test_ntds_collection_bad_toml() {
        let result = ntds_collection(b"[output");
        assert!(matches!(result, Err(WinArtifactError::BadToml)));
    }
}
