use clap::{Parser, Subcommand};
use openrq_core::{Identity, ItemKind};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Headless editor for OpenRQ requirement projects")]
pub struct Cli {
    /// Project file; `.orq` is appended when missing
    #[clap(long, short = 'p')]
    pub project: PathBuf,

    /// JSON engine configuration
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Absolute directory for log files (overrides the config)
    #[clap(long)]
    pub log_dir: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print project name, path and item counts
    Info,

    /// Print root items
    Roots,

    /// Print the item forest with labels
    Tree,

    /// Create an item at a drop position
    New {
        /// `requirement` or `solution`
        #[clap(value_parser = parse_kind)]
        kind: ItemKind,

        #[clap(long, default_value_t = 0, allow_negative_numbers = true)]
        x: i64,

        #[clap(long, default_value_t = 0, allow_negative_numbers = true)]
        y: i64,
    },

    /// Link a parent to a child, e.g. `link R1 S2`
    Link { parent: Identity, child: Identity },

    /// Remove the link between a parent and a child
    Unlink { parent: Identity, child: Identity },

    /// Move an item
    Move {
        id: Identity,

        #[clap(allow_negative_numbers = true)]
        x: i64,

        #[clap(allow_negative_numbers = true)]
        y: i64,
    },

    /// Set the description of an item
    Describe { id: Identity, text: String },

    /// Delete an item and every link touching it
    Delete { id: Identity },

    /// Add or remove a structural member of a solution
    Member {
        solution: Identity,
        member: Identity,

        /// Remove instead of add
        #[clap(long)]
        remove: bool,
    },
}

fn parse_kind(value: &str) -> Result<ItemKind, String> {
    ItemKind::parse(&value.trim().to_ascii_lowercase())
        .ok_or_else(|| format!("unknown item kind `{value}`; expected requirement|solution"))
}
