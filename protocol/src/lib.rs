//! 国际象棋共享协议库
//!
//! 包含:
//! - 棋子、棋盘、易位权等核心数据结构
//! - 攻击判断和走法合法性验证
//! - 走子执行、将死和逼和判断
//! - FEN 局面格式
//! - 消息类型定义 (ClientMessage, ServerMessage)
//! - 传输层抽象 (Connector, Connection, Listener traits) 和帧编解码

mod board;
mod constants;
mod error;
mod fen;
mod game;
mod message;
mod moves;
mod piece;
mod transport;

pub use board::{Board, BoardState, CastleSide, CastlingRights, LastMove, KING_START_COL};
pub use constants::*;
pub use error::{ChessError, ProtocolError, Result};
pub use fen::{Fen, INITIAL_FEN};
pub use game::{GameResult, MoveOutcome};
pub use message::{ClientMessage, ErrorCode, PlayerId, ServerMessage};
pub use moves::{Move, MoveGenerator};
pub use piece::{Color, Piece, PieceType, Square};
pub use transport::{
    Connection, Connector, FrameReader, FrameWriter, Listener, NetworkConfig, TcpConnection,
    TcpConnector, TcpListener,
};
