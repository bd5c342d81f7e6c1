//! 错误类型定义

use thiserror::Error;

use crate::piece::{Color, Square};

/// 象棋规则错误
///
/// 走法被拒绝时的具体原因只用于服务端日志，不会发送给走子方。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChessError {
    /// 坐标越界
    #[error("Square out of bounds: ({row}, {col})")]
    OutOfBounds { row: u8, col: u8 },

    /// 起点没有棋子
    #[error("No piece on {square}")]
    NoPiece { square: Square },

    /// 不是该方的回合
    #[error("Not {color}'s turn")]
    NotYourTurn { color: Color },

    /// 不符合棋子走法
    #[error("Illegal move: {from} -> {to}")]
    IllegalMove { from: Square, to: Square },

    /// 走完后己方王被攻击
    #[error("Move would leave the king in check")]
    KingInCheck,

    /// 被将军时不能易位，王也不能经过被攻击的格子
    #[error("Cannot castle out of or through check")]
    CastlingThroughCheck,

    /// 非法局面
    #[error("Invalid position: {reason}")]
    InvalidPosition { reason: String },

    /// 无效的 FEN 字符串
    #[error("Invalid FEN string: {reason}")]
    InvalidFen { reason: String },
}

/// 协议错误类型
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// IO 错误
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 序列化错误（bincode）
    #[error("Bincode serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// 协议版本不匹配
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u8, actual: u8 },

    /// 帧大小超限
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// 连接超时
    #[error("Connection timeout")]
    ConnectionTimeout,

    /// 连接已关闭
    #[error("Connection closed")]
    ConnectionClosed,

    /// 象棋规则错误
    #[error("Chess error: {0}")]
    Chess(#[from] ChessError),
}

/// 协议操作结果类型
pub type Result<T> = std::result::Result<T, ProtocolError>;
