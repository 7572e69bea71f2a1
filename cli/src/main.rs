use base64::{engine::general_purpose, Engine};
use clap::Parser;
use log::info;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about,
    long_about = None,
    after_help = "Generalized-Time values are written as RFC 3339 timestamps in UTC"
)]
struct Args {
    /// Full path to TOML collector describing the NTDS.dit (or JSON table snapshot) and queries
    #[clap(short, long, value_parser)]
    toml: Option<String>,

    /// Base64 encoded TOML file
    #[clap(short, long, value_parser)]
    data: Option<String>,
}

fn main() {
    let args = Args::parse();
    println!("[ditexplorer] Starting directory collection!");

    if let Some(toml) = args.toml {
        if toml.is_empty() {
            println!("[ditexplorer] Empty TOML path provided!");
            return;
        }
        match ntds::core::parse_toml_file(&toml) {
            Ok(_) => info!("[ditexplorer] Collection success"),
            Err(err) => {
                println!("[ditexplorer] Failed to collect directory data: {err}");
                return;
            }
        }
    } else if let Some(data) = args.data {
        let toml_data = match general_purpose::STANDARD.decode(&data) {
            Ok(results) => results,
            Err(err) => {
                println!("[ditexplorer] Failed to base64 decode TOML collector {data}, error: {err:?}");
                return;
            }
        };
        match ntds::core::parse_toml_data(&toml_data) {
            Ok(_) => info!("[ditexplorer] Collection success"),
            Err(err) => {
                println!("[ditexplorer] Failed to collect directory data: {err}");
                return;
            }
        }
    } else {
        println!("[ditexplorer] No TOML file or data provided!");
        return;
    }
    println!("[ditexplorer] Finished directory collection!");
}

#[cfg(test)]
mod tests {
    use super::Args;
    use clap::{CommandFactory, Parser};

    #[test]
    fn test_args() {
        let args = Args::parse_from(["ditexplorer", "--toml", "collection.toml"]);
        assert_eq!(args.toml.as_deref(), Some("collection.toml"));
        assert!(args.data.is_none());
    }

    #[test]
    fn test_help_names_time_zone() {
        let mut command = Args::command();
        let help = command.render_help().to_string();
        assert!(help.contains("in UTC"));
    }
}
