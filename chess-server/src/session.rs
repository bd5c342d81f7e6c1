//! 对局会话

use tracing::{debug, info};

use protocol::{BoardState, Color, GameResult, MoveOutcome, Square};

/// 一局棋
///
/// 拥有权威的棋盘状态，所有走子都经过 [`Session::make_move`]。
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: BoardState,
    result: Option<GameResult>,
    move_count: u32,
}

impl Session {
    /// 从初始局面开始
    pub fn new() -> Self {
        Self::default()
    }

    /// 从指定局面开始
    pub fn from_state(state: BoardState) -> Self {
        let result = state.check_game_over();
        Self {
            state,
            result,
            move_count: 0,
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn result(&self) -> Option<GameResult> {
        self.result
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn is_over(&self) -> bool {
        self.result.is_some()
    }

    /// 尝试走子
    ///
    /// 被拒绝时返回 None，局面不变，原因只记录在日志里。
    pub fn make_move(&mut self, from: Square, to: Square, mover: Color) -> Option<MoveOutcome> {
        if let Some(result) = self.result {
            debug!("对局已结束（{}），忽略走子 {} -> {}", result, from, to);
            return None;
        }

        match self.state.attempt_move(from, to, mover) {
            Ok(outcome) => {
                self.move_count += 1;
                self.result = outcome.result;
                info!("第 {} 步: {} {}", self.move_count, mover, outcome.mv);
                Some(outcome)
            }
            Err(e) => {
                debug!("{} 走子 {} -> {} 被拒绝: {}", mover, from, to, e);
                None
            }
        }
    }

    /// 回到初始局面
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
