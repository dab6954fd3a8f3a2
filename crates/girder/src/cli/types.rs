//! Value enums for CLI arguments.

use clap::ValueEnum;

use crate::domain::{ItemType, NextStrategy, ReadyOrder};

/// Item type for CLI arguments
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTypeArg {
    /// Top-level container
    Epic,
    /// Container below an epic
    Feature,
    /// General task
    Task,
    /// Bug fix
    Bug,
}

impl From<ItemTypeArg> for ItemType {
    fn from(arg: ItemTypeArg) -> Self {
        match arg {
            ItemTypeArg::Epic => ItemType::Epic,
            ItemTypeArg::Feature => ItemType::Feature,
            ItemTypeArg::Task => ItemType::Task,
            ItemTypeArg::Bug => ItemType::Bug,
        }
    }
}

/// Order of the ready list
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyOrderArg {
    /// Label priority, highest first
    #[default]
    Priority,
    /// Issue number ascending
    Number,
    /// Title ascending
    Title,
}

impl From<ReadyOrderArg> for ReadyOrder {
    fn from(arg: ReadyOrderArg) -> Self {
        match arg {
            ReadyOrderArg::Priority => ReadyOrder::Priority,
            ReadyOrderArg::Number => ReadyOrder::Number,
            ReadyOrderArg::Title => ReadyOrder::Title,
        }
    }
}

/// Strategy for picking the next item
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NextStrategyArg {
    /// Deepest item first
    Depth,
    /// Highest label priority first
    Labels,
    /// Oldest item first
    Oldest,
    /// Depth, then label priority, then age
    #[default]
    Priority,
}

impl From<NextStrategyArg> for NextStrategy {
    fn from(arg: NextStrategyArg) -> Self {
        match arg {
            NextStrategyArg::Depth => NextStrategy::Depth,
            NextStrategyArg::Labels => NextStrategy::Labels,
            NextStrategyArg::Oldest => NextStrategy::Oldest,
            NextStrategyArg::Priority => NextStrategy::Priority,
        }
    }
}
