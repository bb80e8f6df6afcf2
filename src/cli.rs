use crate::search::SearchMode;
use clap::{Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(long, global = true, value_parser, default_value_t = false)]
    pub verbose: bool,

    /// Write logs to this file instead of stderr
    #[clap(long, global = true, value_parser)]
    pub log: Option<PathBuf>,

    /// Configuration file to use instead of the default locations
    #[clap(long, global = true, value_parser)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode and segment a book, then summarize it
    Import {
        file: PathBuf,

        /// Skip detection and decode with this encoding
        #[clap(long, value_parser)]
        encoding: Option<String>,

        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Quick look at the first 100 KiB of a book
    Preview {
        file: PathBuf,

        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// List detected chapters with their char offsets
    Chapters {
        file: PathBuf,

        #[clap(long, value_parser)]
        encoding: Option<String>,
    },
    /// Search one or more books
    Search {
        query: String,

        #[clap(required = true)]
        files: Vec<PathBuf>,

        #[clap(long, value_enum)]
        mode: Option<SearchMode>,

        #[clap(short = 's', long, value_parser, default_value_t = false)]
        case_sensitive: bool,

        #[clap(short, long, value_parser, default_value_t = false)]
        whole_word: bool,

        /// Treat the query as a regular expression
        #[clap(short, long, value_parser, default_value_t = false)]
        regex: bool,

        /// Chars of context on each side of a hit
        #[clap(long, value_parser)]
        context: Option<usize>,

        #[clap(long, value_parser)]
        max_results: Option<usize>,

        #[clap(long, value_parser)]
        per_chapter: Option<usize>,

        /// Print line numbers instead of context excerpts
        #[clap(long, value_parser, default_value_t = false)]
        no_context: bool,

        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Print search counters after the results
        #[clap(long, value_parser, default_value_t = false)]
        metrics: bool,
    },
    /// Generate shell completions
    Completions {
        #[clap(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn search_arguments() {
        let cli = Cli::try_parse_from([
            "novelscan",
            "search",
            "林老师",
            "a.txt",
            "b.txt",
            "--mode",
            "frequency",
            "--whole-word",
            "--format",
            "json",
            "--no-context",
            "--verbose",
        ])
        .unwrap();
        match cli.command {
            Commands::Search {
                query,
                files,
                mode,
                whole_word,
                format,
                no_context,
                ..
            } => {
                assert_eq!(query, "林老师");
                assert_eq!(files.len(), 2);
                assert_eq!(mode, Some(SearchMode::Frequency));
                assert!(whole_word);
                assert!(no_context);
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(cli.verbose);
    }

    #[test]
    fn search_needs_files() {
        assert!(Cli::try_parse_from(["novelscan", "search", "x"]).is_err());
    }
}
