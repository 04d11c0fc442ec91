use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chatmark",
    about = "Inspect and maintain chatmark annotation stores",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Store file (JSON)
    #[arg(long, global = true, env = "CHATMARK_STORE", default_value = "chatmark.json")]
    pub store: PathBuf,

    /// Engine configuration (TOML)
    #[arg(long, global = true, env = "CHATMARK_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the collection key for a page path
    Key(KeyArgs),
    /// List stored collections
    List(ListArgs),
    /// Show the annotations of one collection
    Show(ShowArgs),
    /// Add an annotation to one item of a transcript
    Annotate(AnnotateArgs),
    /// Resolve a collection against a transcript
    Resolve(ResolveArgs),
    /// Export one collection, or all of them
    Export(ExportArgs),
    /// Merge an export file into the store
    Import(ImportArgs),
    /// Delete collections
    Delete(DeleteArgs),
    /// Delete every collection
    Clear(ClearArgs),
    /// Compute the fingerprint of a message
    Fingerprint(FingerprintArgs),
}

#[derive(Args)]
pub struct KeyArgs {
    pub path: String,
}

#[derive(Args)]
pub struct ListArgs {}

#[derive(Args)]
pub struct ShowArgs {
    /// Collection key or page path
    pub key: String,
}

#[derive(Args)]
pub struct AnnotateArgs {
    /// Collection key or page path
    pub key: String,
    /// Transcript: a JSON array of `{role, text}` objects
    pub transcript: PathBuf,
    /// Position of the item in the transcript
    pub ordinal: u32,
    pub note: String,
    #[arg(short, long)]
    pub tag: Option<String>,
    #[arg(short, long, default_value = "yellow")]
    pub color: String,
}

#[derive(Args)]
pub struct ResolveArgs {
    /// Collection key or page path
    pub key: String,
    /// Transcript: a JSON array of `{role, text}` objects
    pub transcript: PathBuf,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Export only this collection (key or page path)
    #[arg(short, long)]
    pub key: Option<String>,
    /// Write to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ImportArgs {
    pub file: PathBuf,
    /// Target collection for a single-collection file (key or page path)
    #[arg(long)]
    pub into: Option<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Collection keys or page paths
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Args)]
pub struct ClearArgs {
    /// Confirm deletion of every collection
    #[arg(long)]
    pub yes: bool,
}

#[derive(Args)]
pub struct FingerprintArgs {
    pub role: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_key() {
        let cli = Cli::try_parse_from(["chatmark", "key", "/c/abcdefgh"]).unwrap();
        if let Command::Key(args) = cli.command {
            assert_eq!(args.path, "/c/abcdefgh");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_list_with_store() {
        let cli = Cli::try_parse_from(["chatmark", "--store", "/tmp/s.json", "list"]).unwrap();
        assert!(matches!(cli.command, Command::List(_)));
        assert_eq!(cli.store, PathBuf::from("/tmp/s.json"));
    }

    #[test]
    fn parse_annotate() {
        let cli = Cli::try_parse_from([
            "chatmark", "annotate", "chatmark:abcdefgh", "t.json", "2", "remember", "-t", "todo",
            "--color", "red",
        ])
        .unwrap();
        if let Command::Annotate(args) = cli.command {
            assert_eq!(args.ordinal, 2);
            assert_eq!(args.note, "remember");
            assert_eq!(args.tag, Some("todo".into()));
            assert_eq!(args.color, "red");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_export_one_to_file() {
        let cli = Cli::try_parse_from(["chatmark", "export", "-k", "chatmark:x", "-o", "out.json"])
            .unwrap();
        if let Command::Export(args) = cli.command {
            assert_eq!(args.key, Some("chatmark:x".into()));
            assert_eq!(args.output, Some(PathBuf::from("out.json")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_import_into() {
        let cli = Cli::try_parse_from(["chatmark", "import", "in.json", "--into", "/c/abcdefgh"])
            .unwrap();
        if let Command::Import(args) = cli.command {
            assert_eq!(args.into, Some("/c/abcdefgh".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn delete_requires_a_key() {
        assert!(Cli::try_parse_from(["chatmark", "delete"]).is_err());
    }

    #[test]
    fn parse_clear_yes() {
        let cli = Cli::try_parse_from(["chatmark", "clear", "--yes"]).unwrap();
        if let Command::Clear(args) = cli.command {
            assert!(args.yes);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_verbose_json() {
        let cli = Cli::try_parse_from(["chatmark", "-v", "--format", "json", "list"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
