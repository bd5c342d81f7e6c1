//! 玩家座位管理
//!
//! 只有白黑两个座位。先加入的执白，后加入的执黑，第三个人被拒绝。

use std::collections::HashMap;

use thiserror::Error;

use protocol::{Color, ErrorCode, PlayerId, MAX_PLAYER_ID_LEN};

/// 连接 ID（由服务端为每个 TCP 连接分配）
pub type ConnectionId = u64;

/// 已入座的玩家
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub color: Color,
}

/// 加入失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("Missing player ID")]
    MissingPlayerId,

    #[error("Player ID too long: {len} characters (max: {max})")]
    PlayerIdTooLong { len: usize, max: usize },

    #[error("Player already joined")]
    AlreadyJoined,

    #[error("Game is full")]
    GameFull,
}

impl JoinError {
    /// 对应的协议错误码
    pub fn code(&self) -> ErrorCode {
        match self {
            JoinError::MissingPlayerId => ErrorCode::MissingPlayerId,
            JoinError::PlayerIdTooLong { .. } => ErrorCode::PlayerIdTooLong,
            JoinError::AlreadyJoined => ErrorCode::AlreadyJoined,
            JoinError::GameFull => ErrorCode::GameFull,
        }
    }
}

/// 座位管理器
#[derive(Debug, Default)]
pub struct PlayerManager {
    /// 连接 ID -> 玩家
    seats: HashMap<ConnectionId, Player>,
}

impl PlayerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 验证玩家 ID
    pub fn validate_player_id(player_id: &str) -> Result<(), JoinError> {
        if player_id.is_empty() {
            return Err(JoinError::MissingPlayerId);
        }
        let len = player_id.chars().count();
        if len > MAX_PLAYER_ID_LEN {
            return Err(JoinError::PlayerIdTooLong {
                len,
                max: MAX_PLAYER_ID_LEN,
            });
        }
        Ok(())
    }

    /// 入座，返回分配到的颜色
    pub fn join(&mut self, conn: ConnectionId, player_id: PlayerId) -> Result<Color, JoinError> {
        Self::validate_player_id(&player_id)?;

        if self.seats.contains_key(&conn) || self.seats.values().any(|p| p.id == player_id) {
            return Err(JoinError::AlreadyJoined);
        }

        let color = [Color::White, Color::Black]
            .into_iter()
            .find(|&c| self.connection_of(c).is_none())
            .ok_or(JoinError::GameFull)?;

        self.seats.insert(
            conn,
            Player {
                id: player_id,
                color,
            },
        );
        Ok(color)
    }

    /// 离开座位
    pub fn leave(&mut self, conn: ConnectionId) -> Option<Player> {
        self.seats.remove(&conn)
    }

    pub fn get(&self, conn: ConnectionId) -> Option<&Player> {
        self.seats.get(&conn)
    }

    /// 连接所在座位的颜色
    pub fn color_of(&self, conn: ConnectionId) -> Option<Color> {
        self.seats.get(&conn).map(|p| p.color)
    }

    /// 坐在指定颜色座位上的连接
    pub fn connection_of(&self, color: Color) -> Option<ConnectionId> {
        self.seats
            .iter()
            .find(|(_, p)| p.color == color)
            .map(|(&conn, _)| conn)
    }

    /// 对手的连接
    pub fn opponent_of(&self, conn: ConnectionId) -> Option<ConnectionId> {
        let color = self.color_of(conn)?;
        self.connection_of(color.opponent())
    }

    /// 所有已入座的连接
    pub fn seated(&self) -> Vec<ConnectionId> {
        self.seats.keys().copied().collect()
    }

    pub fn count(&self) -> usize {
        self.seats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seats.is_empty()
    }
}
