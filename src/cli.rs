use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start hypermemo as a service.
    Serve {
        /// Address to listen on. Overrides listen_addr from config.yaml
        #[clap(long)]
        addr: Option<String>,
    },
    /// Ask a question against your bookmarks
    Ask {
        /// The question
        #[clap(allow_hyphen_values = true)]
        question: String,

        /// Filter and boost by tags (comma separated)
        #[clap(short = 'g', long)]
        tags: Option<String>,

        /// Owner whose corpus is queried. Defaults to auth.anon_owner
        #[clap(short, long)]
        owner: Option<String>,

        /// Maximum number of citations
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// List tags
    Tags {
        /// Owner whose tags are listed. Defaults to auth.anon_owner
        #[clap(short, long)]
        owner: Option<String>,
    },
    /// List the most recently saved bookmarks
    Bookmarks {
        /// Owner whose bookmarks are listed. Defaults to auth.anon_owner
        #[clap(short, long)]
        owner: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let args = Args::try_parse_from([
            "hypermemo",
            "ask",
            "what is rust?",
            "--tags",
            "rust,systems",
            "-k",
            "3",
        ])
        .unwrap();

        match args.command {
            Command::Ask {
                question,
                tags,
                owner,
                top_k,
            } => {
                assert_eq!(question, "what is rust?");
                assert_eq!(tags.as_deref(), Some("rust,systems"));
                assert_eq!(owner, None);
                assert_eq!(top_k, Some(3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_serve() {
        let args = Args::try_parse_from(["hypermemo", "serve", "--addr", "127.0.0.1:9000"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Serve { addr: Some(ref addr) } if addr == "127.0.0.1:9000"
        ));
    }

    #[test]
    fn test_parse_bookmarks() {
        let args = Args::try_parse_from(["hypermemo", "bookmarks", "-o", "alice"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Bookmarks { owner: Some(ref owner) } if owner == "alice"
        ));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
