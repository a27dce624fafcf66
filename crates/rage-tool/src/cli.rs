//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rage_resource::CodecOptions;

/// Default log filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Log filter used with `--verbose`.
pub const VERBOSE_LOG_FILTER: &str = "debug";

#[derive(Parser, Debug)]
#[command(about = "Read, check and rewrite GTA V resource XML")]
pub struct Cli {
    /// Shader catalogue to use instead of the built-in one.
    #[arg(long, global = true)]
    pub catalogue: Option<PathBuf>,

    /// Log debug events.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Parse a file, refresh derived fields and write it back out.
    Roundtrip {
        input: PathBuf,

        /// Output file; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Emit the records as read, without refreshing derived fields.
        #[arg(long)]
        raw: bool,

        #[command(flatten)]
        refresh: RefreshArgs,
    },
    /// Summarise the contents of a file.
    Info { input: PathBuf },
    /// Show a shader definition by filename or `hash_<hex>`.
    Shader { name: String },
    /// Parse and validate files without writing anything.
    Check {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        refresh: RefreshArgs,
    },
}

/// Switches for the derived-field pass.
#[derive(Args, Debug, Default)]
pub struct RefreshArgs {
    /// Derive bone tags from bone names.
    #[arg(long)]
    pub auto_bone_tags: bool,

    /// Keep the skeleton checksums found in the input.
    #[arg(long)]
    pub keep_checksums: bool,

    /// Keep dictionary items in input order.
    #[arg(long)]
    pub keep_order: bool,
}

impl RefreshArgs {
    pub fn options(&self) -> CodecOptions {
        CodecOptions {
            auto_bone_tags: self.auto_bone_tags,
            recompute_skeleton_checksums: !self.keep_checksums,
            sort_dictionaries: !self.keep_order,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_refresh_defaults_match_codec() {
        assert_eq!(RefreshArgs::default().options(), CodecOptions::default());
    }

    #[test]
    fn test_parses_roundtrip() {
        let cli = Cli::parse_from(["rage-tool", "-v", "roundtrip", "a.ydr.xml", "--keep-checksums"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Roundtrip { input, output, raw, refresh } => {
                assert_eq!(input, PathBuf::from("a.ydr.xml"));
                assert!(output.is_none());
                assert!(!raw);
                assert!(!refresh.options().recompute_skeleton_checksums);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
