use super::error::LocalError;
use crate::structs::toml::Output;
use log::error;
use std::{
    fs::{create_dir_all, OpenOptions},
    io::Write,
};

/// Output to local directory provided by TOML input
pub(crate) fn local_output(
    data: &[u8],
    output: &Output,
    output_name: &str,
    extension: &str,
) -> Result<String, LocalError> {
    let output_path = format!("{}/{}", output.directory, output.name);

    let result = create_dir_all(&output_path);
    match result {
        Ok(_) => {}
        Err(err) => {
            error!("[ntds] Failed to create output directory for {output_path}. Error: {err:?}");
            return Err(LocalError::CreateDirectory);
        }
    }

    let file_extension = if output.compress {
        format!("{extension}.gz")
    } else {
        extension.to_string()
    };

    let full_path = format!("{output_path}/{output_name}.{file_extension}");
    let json_file_result = OpenOptions::new()
        .append(true)
        .create(true)
        .open(&full_path);

    let mut json_file = match json_file_result {
        Ok(results) => results,
        Err(err) => {
            error!(
                "[ntds] Failed to create output file {output_name} at {output_path}. Error: {err:?}"
            );
            return Err(LocalError::CreateFile);
        }
    };

    let write_result = json_file.write_all(data);
    match write_result {
        Ok(_) => {}
        Err(err) => {
            error!(
                "[ntds] Failed to write output to file {output_name} at {output_path}. Error: {err:?}",
            );
            return Err(LocalError::WriteJson);
        }
    }
    Ok(full_path)
}

#[cfg(test)]
mod tests {
    use crate::{output::local::output::local_output, structs::toml::Output};
    use std::fs::{read_to_string, remove_file};

    #[test]
    fn test_output_json() {
        let output = Output {
            name: String::from("test_output"),
            directory: String::from("./tmp"),
            format: String::from("json"),
            compress: false,
            logging: None,
        };
        let test = "A rust program";
        let name = "output";
        let path = local_output(test.as_bytes(), &output, name, &output.format).unwrap();
        assert!(path.ends_with("tmp/test_output/output.json"));
        assert!(read_to_string(&path).unwrap().contains("A rust program"));
        remove_file(path).unwrap();
    }
}
