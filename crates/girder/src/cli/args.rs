//! CLI argument structs for all commands.

use clap::Parser;

use super::types::{ItemTypeArg, NextStrategyArg, ReadyOrderArg};

/// Arguments for the `ready` command
#[derive(Parser, Debug, Clone)]
pub struct ReadyArgs {
    /// Root item of the hierarchy (`#12`, `12` or `owner/repo#12`)
    pub root: String,

    /// Only items assigned to this login
    #[arg(short, long, conflicts_with = "any")]
    pub assignee: Option<String>,

    /// Include assigned items
    #[arg(long)]
    pub any: bool,

    /// Required labels (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub label: Vec<String>,

    /// Required item type
    #[arg(short = 't', long = "type", value_enum)]
    pub item_type: Option<ItemTypeArg>,

    /// Output order
    #[arg(long, value_enum, default_value = "priority")]
    pub order: ReadyOrderArg,

    /// Maximum number of items to print
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

/// Arguments for the `next` command
#[derive(Parser, Debug, Clone)]
pub struct NextArgs {
    /// Root item of the hierarchy
    pub root: String,

    /// Only items assigned to this login
    #[arg(short, long, conflicts_with = "any")]
    pub assignee: Option<String>,

    /// Include assigned items
    #[arg(long)]
    pub any: bool,

    /// Required labels (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub label: Vec<String>,

    /// Required item type
    #[arg(short = 't', long = "type", value_enum)]
    pub item_type: Option<ItemTypeArg>,

    /// Selection strategy
    #[arg(short, long, value_enum, default_value = "priority")]
    pub strategy: NextStrategyArg,
}

/// Arguments for the `deps` command
#[derive(Parser, Debug, Clone)]
pub struct DepsArgs {
    /// Item whose dependency section is updated
    pub item: String,

    /// Items this item is blocked by (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub depends_on: Vec<String>,

    /// Items this item blocks (comma-separated)
    #[arg(short, long, value_delimiter = ',')]
    pub blocks: Vec<String>,

    /// Wave number to record
    #[arg(short, long)]
    pub wave: Option<u32>,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Root item of the hierarchy
    pub root: String,

    /// Exit with an error when any structural error is found
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the `import` command
#[derive(Parser, Debug, Clone)]
pub struct ImportArgs {
    /// Graph file (`.json` for JSON, anything else is read as YAML)
    pub file: std::path::PathBuf,
}
