use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "anon")]
#[command(about = "Browse repositories with identifying terms redacted", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Directory holding registrations and cached pages
    #[arg(long, global = true, env = "ANON_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// Public base URL self links are rewritten to
        #[arg(long)]
        public_url: Option<String>,
    },

    /// Register a repository for anonymized browsing
    Register {
        /// Repository URL (https://github.com/owner/repo) or owner/repo
        url: String,

        /// Branch to publish (default: from the URL, else main)
        #[arg(long)]
        branch: Option<String>,

        /// Term to redact; repeat for several
        #[arg(short, long = "term")]
        terms: Vec<String>,

        /// Use this id instead of a generated one
        #[arg(long)]
        id: Option<String>,

        /// Replace every link with the mask
        #[arg(long)]
        strip_links: bool,

        /// Remove markdown images
        #[arg(long)]
        strip_images: bool,

        /// Mask only the term inside URLs, not the whole URL
        #[arg(long)]
        no_whole_url: bool,

        /// Match terms inside words too
        #[arg(long)]
        no_word_boundary: bool,
    },

    /// Drop a repository's cached pages
    Invalidate {
        /// Registration id
        id: String,
    },

    /// List registrations
    List,
}
