use clap::{Parser, Subcommand};

/// s3bridge - one client for S3-compatible object storage
#[derive(Parser, Debug)]
#[command(name = "s3bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Profile to use from config
    #[arg(long, global = true, env = "S3BRIDGE_PROFILE")]
    pub profile: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List containers, or the blobs of one container
    Ls {
        /// Container name; omit to list containers
        container: Option<String>,

        /// Only blobs whose names start with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// List through pseudo-directories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Make container
    Mb { container: String },

    /// Remove container
    Rb { container: String },

    /// Show blob properties and metadata
    Head { container: String, blob: String },

    /// Download a blob to a file
    Get {
        container: String,
        blob: String,
        file: String,
    },

    /// Upload a file to a blob
    Put {
        container: String,
        blob: String,
        file: String,

        /// Content type of the blob
        #[arg(long)]
        content_type: Option<String>,

        /// User metadata as key=value, repeatable
        #[arg(long = "meta", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },

    /// Remove a blob
    Rm { container: String, blob: String },
}

/// Parse a `key=value` argument
pub fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Expected KEY=VALUE, got '{}'", arg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(parse_key_value("color=blue").unwrap(), ("color".to_string(), "blue".to_string()));
        assert_eq!(parse_key_value("empty=").unwrap(), ("empty".to_string(), String::new()));
        assert!(parse_key_value("=x").is_err());
        assert!(parse_key_value("novalue").is_err());
    }

    #[test]
    fn test_parse_put() {
        let cli = Cli::try_parse_from([
            "s3bridge", "--profile", "dev", "put", "photos", "a.jpg", "./a.jpg", "--meta", "color=blue",
        ])
        .unwrap();
        assert_eq!(cli.profile.as_deref(), Some("dev"));
        match cli.command {
            Commands::Put { container, metadata, .. } => {
                assert_eq!(container, "photos");
                assert_eq!(metadata, vec![("color".to_string(), "blue".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
