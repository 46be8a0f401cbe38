use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tubefetch")]
#[command(author, version, about = "Search YouTube and download short clips as mp3/mp4", long_about = None)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Bind address, overrides WEB_HOST
        #[arg(long)]
        host: Option<String>,

        /// Port, overrides WEB_PORT
        #[arg(long)]
        port: Option<u16>,
    },

    /// Search by keyword, video id or link and print the results
    Search {
        query: String,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Download one video into DOWNLOAD_FOLDER and print the file path
    Download {
        video_id: String,

        /// Title used for the file name
        #[arg(short, long)]
        title: String,

        /// mp3 or mp4
        #[arg(short, long, default_value = "mp3")]
        format: String,
    },

    /// Print the tubefetch and yt-dlp versions
    Version,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download() {
        let cli = Cli::try_parse_from(["tubefetch", "download", "dQw4w9WgXcQ", "--title", "Never", "-f", "mp4"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Commands::Download {
                video_id: "dQw4w9WgXcQ".to_string(),
                title: "Never".to_string(),
                format: "mp4".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_serve_and_default() {
        let cli = Cli::try_parse_from(["tubefetch", "-v", "serve", "--port", "9000"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.command, Some(Commands::Serve { host: None, port: Some(9000) }));

        let cli = Cli::try_parse_from(["tubefetch"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_download_requires_title() {
        assert!(Cli::try_parse_from(["tubefetch", "download", "dQw4w9WgXcQ"]).is_err());
    }
}
