//! 消息类型定义
//!
//! 非法走法不会收到任何回复：服务端既不发送错误，也不广播棋盘。
//! 客户端可以用 `Ping` 确认服务端已经处理完之前的请求。

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::game::GameResult;
use crate::moves::Move;
use crate::piece::{Color, Square};

/// 玩家 ID（由客户端提供）
pub type PlayerId = String;

/// 客户端发送给服务端的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// 加入对局，先到的执白，后到的执黑
    Join { player_id: PlayerId },
    /// 走棋，颜色由服务端按座位确定
    MakeMove { from: Square, to: Square },
    /// 心跳请求
    Ping,
}

/// 服务端发送给客户端的消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServerMessage {
    // === 座位 ===
    /// 加入成功（只发给加入者）
    Joined {
        color: Color,
        board: Board,
        side_to_move: Color,
        result: Option<GameResult>,
    },
    /// 对手加入
    PlayerJoined { player_id: PlayerId, color: Color },
    /// 对手离开
    PlayerLeft { player_id: PlayerId },

    // === 对局 ===
    /// 走棋被接受后的新局面（发给双方）
    BoardUpdated {
        board: Board,
        side_to_move: Color,
        last_move: Move,
    },
    /// 对局结束
    GameOver { result: GameResult },

    // === 心跳 ===
    /// 心跳响应
    Pong,

    // === 错误 ===
    /// 错误消息（只发给请求方）
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// 使用默认描述构造错误消息
    pub fn error(code: ErrorCode) -> Self {
        ServerMessage::Error {
            code,
            message: code.message().to_string(),
        }
    }
}

/// 错误码定义
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum ErrorCode {
    // === 请求格式 (1xx) ===
    /// 缺少玩家 ID
    MissingPlayerId = 100,
    /// 玩家 ID 过长
    PlayerIdTooLong = 101,
    /// 无法解析的消息
    MalformedMessage = 102,

    // === 座位相关 (2xx) ===
    /// 同一玩家重复加入
    AlreadyJoined = 200,
    /// 两个座位都已占用
    GameFull = 201,
    /// 尚未加入就走棋
    NotJoined = 202,
}

impl ErrorCode {
    /// 默认错误描述
    pub fn message(&self) -> &'static str {
        match self {
            ErrorCode::MissingPlayerId => "Missing player ID",
            ErrorCode::PlayerIdTooLong => "Player ID too long",
            ErrorCode::MalformedMessage => "Malformed message",
            ErrorCode::AlreadyJoined => "Player already joined",
            ErrorCode::GameFull => "Game is full",
            ErrorCode::NotJoined => "Join the game before making moves",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}
