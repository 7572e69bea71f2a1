use super::{error::UtilsError, uuid::generate_uuid};
use crate::structs::toml::Output;
use log::{error, LevelFilter};
use std::fs::{create_dir_all, File};

/// Create log output file and logging level based on TOML `Output` configuration
pub(crate) fn create_log_file(output: &Output) -> Result<(File, LevelFilter), UtilsError> {
    let path = format!("{}/{}", output.directory, output.name);
    let result = create_dir_all(&path);
    match result {
        Ok(_) => {}
        Err(err) => {
            error!("[ntds] Failed to create logging output directory for {path}. Error: {err:?}");
            return Err(UtilsError::CreateDirectory);
        }
    }

    let output_result = File::create(format!("{path}/{}.log", generate_uuid()));
    let log_file = match output_result {
        Ok(result) => result,
        Err(err) => {
            error!("[ntds] Failed to create log file at {path}. Error: {err:?}");
            return Err(UtilsError::LogFile);
        }
    };

    Ok((log_file, log_level(output.logging.as_deref())))
}

fn log_level(level: Option<&str>) -> LevelFilter {
    let Some(log_level) = level else {
        return LevelFilter::Warn;
    };
    match log_level.to_lowercase().as_str() {
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        _ => LevelFilter::Warn,
    }
}

#[cfg(test)]
mod tests {
    use super::{create_log_file, log_level};
    use crate::structs::toml::Output;
    use log::LevelFilter;
    use std::fs::remove_dir_all;

    #[test]
    fn test_create_log_file() {
        let output = Output {
            name: String::from("logging_test"),
            directory: String::from("./tmp"),
            format: String::from("json"),
            compress: false,
            logging: Some(String::from("DEBUG")),
        };

        let (_, level) = create_log_file(&output).unwrap();
        assert_eq!(level, LevelFilter::Debug);
        remove_dir_all("./tmp/logging_test").unwrap();
    }

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(None), LevelFilter::Warn);
        assert_eq!(log_level(Some("error")), LevelFilter::Error);
        assert_eq!(log_level(Some("verbose")), LevelFilter::Warn);
    }
}
