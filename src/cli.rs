//! CLI argument definitions using clap derive macros.

use clap::{Parser, Subcommand};

/// Search a book archive and deliver files to disk or an e-reader inbox.
///
/// Configuration is read from the environment and from a `.env` file in
/// the working directory or next to the executable.
#[derive(Parser, Debug)]
#[command(name = "bookcourier")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Search the archive and print matching records.
    Search {
        /// Search term
        term: String,

        /// Move records in this format to the front
        #[arg(short, long)]
        format: Option<String>,

        /// Print records as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Download a record by hash and save it locally.
    Download {
        /// Record hash
        hash: String,

        /// Target filename; the extension names the declared format (e.g. `Dune.epub`)
        filename: String,
    },

    /// Serve search and download as JSON-RPC tools over stdio.
    Mcp,

    /// Send a small test PDF to the configured default inbox.
    TestEmail,
}

impl Args {
    /// Default tracing filter for the chosen verbosity.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_search_parses_term_and_flags() {
        let args =
            Args::try_parse_from(["bookcourier", "search", "dune", "--format", "epub", "--json"])
                .unwrap();
        assert_eq!(
            args.command,
            Command::Search {
                term: "dune".to_string(),
                format: Some("epub".to_string()),
                json: true,
            }
        );
    }

    #[test]
    fn test_cli_download_requires_filename() {
        let result = Args::try_parse_from(["bookcourier", "download", "abc123"]);
        let err = result.unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);

        let args = Args::try_parse_from(["bookcourier", "download", "abc123", "Dune.epub"]).unwrap();
        assert_eq!(
            args.command,
            Command::Download {
                hash: "abc123".to_string(),
                filename: "Dune.epub".to_string(),
            }
        );
    }

    #[test]
    fn test_cli_mcp_and_test_email_subcommands() {
        let args = Args::try_parse_from(["bookcourier", "mcp"]).unwrap();
        assert_eq!(args.command, Command::Mcp);
        let args = Args::try_parse_from(["bookcourier", "test-email"]).unwrap();
        assert_eq!(args.command, Command::TestEmail);
    }

    #[test]
    fn test_cli_missing_subcommand_is_error() {
        let result = Args::try_parse_from(["bookcourier"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["bookcourier", "-vv", "mcp"]).unwrap();
        assert_eq!(args.verbose, 2);

        let args = Args::try_parse_from(["bookcourier", "mcp", "--verbose"]).unwrap();
        assert_eq!(args.verbose, 1);
    }

    #[test]
    fn test_cli_log_levels() {
        let level = |argv: &[&str]| Args::try_parse_from(argv).unwrap().default_log_level();
        assert_eq!(level(&["bookcourier", "mcp"]), "warn");
        assert_eq!(level(&["bookcourier", "-v", "mcp"]), "info");
        assert_eq!(level(&["bookcourier", "-vv", "mcp"]), "debug");
        assert_eq!(level(&["bookcourier", "-vvv", "mcp"]), "trace");
        assert_eq!(level(&["bookcourier", "-q", "-vv", "mcp"]), "error");
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["bookcourier", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }

    #[test]
    fn test_cli_version_flag_shows_version() {
        let err = Args::try_parse_from(["bookcourier", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_cli_invalid_flag_returns_error() {
        let err = Args::try_parse_from(["bookcourier", "--invalid-flag"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
