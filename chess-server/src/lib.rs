//! 国际象棋服务端
//!
//! 包含:
//! - 座位管理（白黑两个座位）
//! - 对局会话
//! - 消息处理和广播
//! - 配置加载

pub mod config;
pub mod player;
pub mod server;
pub mod session;

pub use config::{ConfigError, ServerConfig};
pub use player::{ConnectionId, JoinError, Player, PlayerManager};
pub use server::{run, serve, MessageHandler, ServerState};
pub use session::Session;
