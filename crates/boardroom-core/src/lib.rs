pub mod api_client;
pub mod config;
pub mod conversation;
pub mod generator;
pub mod log_store;
pub mod persona;
pub mod prompt;
pub mod roster;
pub mod scheduler;
pub mod topic;
pub mod turn;

pub use api_client::*;
pub use config::*;
pub use conversation::*;
pub use generator::*;
pub use log_store::*;
pub use persona::*;
pub use prompt::GenerationSettings;
pub use roster::*;
pub use scheduler::*;
pub use topic::*;
pub use turn::*;
