mod cache;
mod config_cmd;
mod init;
mod resource;
mod sync_cmd;

use clap::ValueEnum;

pub use cache::CacheCommand;
pub use config_cmd::ConfigCommand;
pub use init::InitCommand;
pub use resource::{CreateCommand, DeleteCommand, GetCommand, UpdateCommand};
pub use sync_cmd::SyncCommand;

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}
