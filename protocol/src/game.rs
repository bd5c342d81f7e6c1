//! 走子执行和终局判断

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::board::{BoardState, CastleSide, LastMove};
use crate::error::ChessError;
use crate::moves::{Move, MoveGenerator};
use crate::piece::{Color, Piece, PieceType, Square};

/// 对局结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameResult {
    /// 将死
    Checkmate { winner: Color },
    /// 逼和
    Stalemate,
}

impl GameResult {
    /// 获胜方（逼和时为 None）
    pub fn winner(&self) -> Option<Color> {
        match self {
            GameResult::Checkmate { winner } => Some(*winner),
            GameResult::Stalemate => None,
        }
    }
}

impl std::fmt::Display for GameResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GameResult::Checkmate { winner } => write!(f, "checkmate, {} wins", winner),
            GameResult::Stalemate => write!(f, "stalemate"),
        }
    }
}

/// 一步被接受的走法的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    /// 实际执行的走法
    pub mv: Move,
    /// 走完后的走子方
    pub side_to_move: Color,
    /// 终局结果（对局继续时为 None）
    pub result: Option<GameResult>,
}

impl BoardState {
    /// 在自身上执行一步走法的全部效果，不做任何合法性检查
    ///
    /// 包括吃过路兵、易位移车、易位权、升变、上一步记录和交换走子方。
    /// 返回被吃的棋子。
    fn play_unchecked(&mut self, from: Square, to: Square, piece: Piece) -> Option<Piece> {
        let mover = piece.color;
        let mut captured = self.board.move_piece(from, to);

        match piece.piece_type {
            PieceType::Pawn => {
                // 斜走到空格只能是吃过路兵，被吃的兵在起点行、目标列
                if from.col != to.col && captured.is_none() {
                    let victim = Square::new_unchecked(from.row, to.col);
                    captured = self.board.get(victim);
                    self.board.set(victim, None);
                }
                if to.row == mover.promotion_row() {
                    self.board.set(to, Some(Piece::new(PieceType::Queen, mover)));
                }
            }
            PieceType::King => {
                self.set_king_square(mover, to);
                if from.col.abs_diff(to.col) == 2 {
                    if let Some(side) = CastleSide::from_king_target(to.col) {
                        let home = mover.home_row();
                        self.board.move_piece(
                            Square::new_unchecked(home, side.rook_col()),
                            Square::new_unchecked(home, side.rook_target_col()),
                        );
                    }
                }
            }
            _ => {}
        }

        self.castling.touch(from);
        self.castling.touch(to);
        self.last_move = Some(LastMove { from, to, piece });
        self.side_to_move = mover.opponent();

        captured
    }

    /// 在副本上尝试走子，合法时返回走完后的状态和被吃的棋子
    ///
    /// 自身不会被修改。
    pub fn try_move(
        &self,
        from: Square,
        to: Square,
        mover: Color,
    ) -> Result<(BoardState, Option<Piece>), ChessError> {
        for square in [from, to] {
            if !square.is_valid() {
                return Err(ChessError::OutOfBounds {
                    row: square.row,
                    col: square.col,
                });
            }
        }

        if mover != self.side_to_move {
            return Err(ChessError::NotYourTurn { color: mover });
        }

        let piece = self
            .board
            .get(from)
            .ok_or(ChessError::NoPiece { square: from })?;

        if !MoveGenerator::is_pseudo_legal(self, piece, from, to, mover) {
            return Err(ChessError::IllegalMove { from, to });
        }

        // 易位：不能在被将军时易位，王经过的格子也不能被攻击
        if piece.piece_type == PieceType::King && from.col.abs_diff(to.col) == 2 {
            if let Some(side) = CastleSide::from_king_target(to.col) {
                let crossed = Square::new_unchecked(from.row, side.king_passes_col());
                if MoveGenerator::is_in_check(self, mover)
                    || MoveGenerator::is_square_attacked(&self.board, crossed, mover.opponent())
                {
                    return Err(ChessError::CastlingThroughCheck);
                }
            }
        }

        let mut next = self.clone();
        let captured = next.play_unchecked(from, to, piece);

        if MoveGenerator::is_in_check(&next, mover) {
            return Err(ChessError::KingInCheck);
        }

        Ok((next, captured))
    }

    /// 执行走子
    ///
    /// 被拒绝时状态保持不变；接受时一次性替换整个状态，然后判断新走子方是否终局。
    pub fn attempt_move(
        &mut self,
        from: Square,
        to: Square,
        mover: Color,
    ) -> Result<MoveOutcome, ChessError> {
        let (next, captured) = self.try_move(from, to, mover)?;
        *self = next;

        trace!("{} 走子 {} -> {}\n{}", mover, from, to, self.board);

        let mv = Move {
            from,
            to,
            captured,
        };
        Ok(MoveOutcome {
            mv,
            side_to_move: self.side_to_move,
            result: self.check_game_over(),
        })
    }

    /// 当前走子方的所有合法走法
    pub fn legal_moves(&self) -> Vec<Move> {
        let mover = self.side_to_move;
        let mut moves = Vec::new();

        for (from, _) in self.board.pieces(mover) {
            for to in Square::all() {
                if let Ok((_, captured)) = self.try_move(from, to, mover) {
                    moves.push(Move { from, to, captured });
                }
            }
        }

        moves
    }

    /// 当前走子方是否至少有一步合法走法
    pub fn has_legal_move(&self) -> bool {
        let mover = self.side_to_move;
        self.board.pieces(mover).into_iter().any(|(from, _)| {
            Square::all().any(|to| self.try_move(from, to, mover).is_ok())
        })
    }

    /// 判断当前走子方是否已经终局
    pub fn check_game_over(&self) -> Option<GameResult> {
        if self.has_legal_move() {
            return None;
        }

        let side = self.side_to_move;
        if MoveGenerator::is_in_check(self, side) {
            Some(GameResult::Checkmate {
                winner: side.opponent(),
            })
        } else {
            Some(GameResult::Stalemate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::Fen;

    fn sq(name: &str) -> Square {
        Square::from_name(name).unwrap()
    }

    fn play(state: &mut BoardState, from: &str, to: &str) -> Result<MoveOutcome, ChessError> {
        let mover = state.side_to_move;
        state.attempt_move(sq(from), sq(to), mover)
    }

    #[test]
    fn test_opening_moves() {
        let state = BoardState::initial();
        assert_eq!(state.legal_moves().len(), 20);
        assert_eq!(state.check_game_over(), None);

        let mut state = state;
        play(&mut state, "e2", "e4").unwrap();
        assert_eq!(state.legal_moves().len(), 20);
    }

    #[test]
    fn test_fools_mate() {
        let mut state = BoardState::initial();

        let outcome = play(&mut state, "f2", "f3").unwrap();
        assert_eq!(outcome.side_to_move, Color::Black);
        assert_eq!(outcome.result, None);

        play(&mut state, "e7", "e5").unwrap();
        play(&mut state, "g2", "g4").unwrap();
        let outcome = play(&mut state, "d8", "h4").unwrap();

        assert_eq!(
            outcome.result,
            Some(GameResult::Checkmate {
                winner: Color::Black
            })
        );
        assert_eq!(outcome.result.and_then(|r| r.winner()), Some(Color::Black));
        assert!(state.legal_moves().is_empty());
    }

    #[test]
    fn test_stalemate() {
        let mut state = Fen::parse("k7/3Q4/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let outcome = play(&mut state, "d7", "c7").unwrap();

        assert_eq!(outcome.result, Some(GameResult::Stalemate));
        assert_eq!(outcome.result.and_then(|r| r.winner()), None);
        assert!(!MoveGenerator::is_in_check(&state, Color::Black));
    }

    #[test]
    fn test_promotion_to_queen() {
        let mut state = Fen::parse("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        play(&mut state, "a7", "a8").unwrap();

        assert_eq!(
            state.board.get(sq("a8")),
            Some(Piece::new(PieceType::Queen, Color::White))
        );
        assert_eq!(state.board.get(sq("a7")), None);
    }

    #[test]
    fn test_black_promotion_with_capture() {
        let mut state = Fen::parse("4k3/8/8/8/8/8/p7/1N2K3 b - - 0 1").unwrap();
        let outcome = play(&mut state, "a2", "b1").unwrap();

        assert_eq!(
            outcome.mv.captured,
            Some(Piece::new(PieceType::Knight, Color::White))
        );
        assert_eq!(
            state.board.get(sq("b1")),
            Some(Piece::new(PieceType::Queen, Color::Black))
        );
    }

    #[test]
    fn test_turn_alternation() {
        let mut state = BoardState::initial();

        // 黑方不能先走
        assert_eq!(
            state.attempt_move(sq("e7"), sq("e5"), Color::Black),
            Err(ChessError::NotYourTurn {
                color: Color::Black
            })
        );
        assert_eq!(state.side_to_move, Color::White);

        // 非法走法不交换走子方
        assert!(play(&mut state, "e2", "e5").is_err());
        assert_eq!(state.side_to_move, Color::White);

        play(&mut state, "e2", "e4").unwrap();
        assert_eq!(state.side_to_move, Color::Black);
    }

    #[test]
    fn test_rejection_is_idempotent() {
        let mut state = BoardState::initial();
        play(&mut state, "e2", "e4").unwrap();
        let before = state.clone();

        let first = play(&mut state, "d8", "d5");
        assert_eq!(state, before);
        let second = play(&mut state, "d8", "d5");
        assert_eq!(state, before);
        assert_eq!(first, second);
        assert!(first.is_err());
    }

    #[test]
    fn test_empty_square_and_out_of_bounds() {
        let mut state = BoardState::initial();
        assert_eq!(
            play(&mut state, "e4", "e5"),
            Err(ChessError::NoPiece { square: sq("e4") })
        );
        assert_eq!(
            state.attempt_move(sq("e2"), Square::new_unchecked(9, 4), Color::White),
            Err(ChessError::OutOfBounds { row: 9, col: 4 })
        );
        // 走对方的棋子
        assert_eq!(
            state.attempt_move(sq("e7"), sq("e6"), Color::White),
            Err(ChessError::IllegalMove {
                from: sq("e7"),
                to: sq("e6")
            })
        );
    }

    #[test]
    fn test_cannot_move_into_check() {
        // 黑车控制 d 列，白王不能走到 d1
        let mut state = Fen::parse("3rk3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert_eq!(play(&mut state, "e1", "d1"), Err(ChessError::KingInCheck));
        assert_eq!(state.king_square(Color::White), sq("e1"));
        play(&mut state, "e1", "f1").unwrap();
        assert_eq!(state.king_square(Color::White), sq("f1"));
    }

    #[test]
    fn test_pinned_piece() {
        // e2 的马被 e8 的车钉住
        let mut state = Fen::parse("k3r3/8/8/8/8/8/4N3/4K3 w - - 0 1").unwrap();
        assert_eq!(play(&mut state, "e2", "c3"), Err(ChessError::KingInCheck));
    }

    #[test]
    fn test_must_answer_check() {
        let mut state = Fen::parse("k3r3/8/8/8/8/8/P7/4K3 w - - 0 1").unwrap();
        assert!(MoveGenerator::is_in_check(&state, Color::White));
        assert_eq!(play(&mut state, "a2", "a3"), Err(ChessError::KingInCheck));
        play(&mut state, "e1", "d1").unwrap();
    }

    #[test]
    fn test_en_passant_capture() {
        let mut state = BoardState::initial();
        play(&mut state, "e2", "e4").unwrap();
        play(&mut state, "a7", "a6").unwrap();
        play(&mut state, "e4", "e5").unwrap();
        play(&mut state, "d7", "d5").unwrap();

        let outcome = play(&mut state, "e5", "d6").unwrap();
        assert_eq!(
            outcome.mv.captured,
            Some(Piece::new(PieceType::Pawn, Color::Black))
        );
        assert_eq!(state.board.get(sq("d5")), None);
        assert_eq!(
            state.board.get(sq("d6")),
            Some(Piece::new(PieceType::Pawn, Color::White))
        );
    }

    #[test]
    fn test_en_passant_window_expires() {
        let mut state = BoardState::initial();
        play(&mut state, "e2", "e4").unwrap();
        play(&mut state, "a7", "a6").unwrap();
        play(&mut state, "e4", "e5").unwrap();
        play(&mut state, "d7", "d5").unwrap();
        // 白黑各走一步无关的棋
        play(&mut state, "h2", "h3").unwrap();
        play(&mut state, "h7", "h6").unwrap();

        assert_eq!(
            play(&mut state, "e5", "d6"),
            Err(ChessError::IllegalMove {
                from: sq("e5"),
                to: sq("d6")
            })
        );
    }

    #[test]
    fn test_en_passant_rank_pin() {
        // 吃过路兵后第 5 行同时空出两格，白王暴露给 h5 的黑车
        let mut state = Fen::parse("7k/8/8/K2pP2r/8/8/8/8 w - d6 0 1").unwrap();
        assert_eq!(play(&mut state, "e5", "d6"), Err(ChessError::KingInCheck));
    }

    #[test]
    fn test_castling_kingside() {
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut state, "e1", "g1").unwrap();

        assert_eq!(
            state.board.get(sq("g1")),
            Some(Piece::new(PieceType::King, Color::White))
        );
        assert_eq!(
            state.board.get(sq("f1")),
            Some(Piece::new(PieceType::Rook, Color::White))
        );
        assert_eq!(state.board.get(sq("h1")), None);
        assert_eq!(state.king_square(Color::White), sq("g1"));
        assert!(state.castling.king_moved(Color::White));
        assert!(!state.castling.king_moved(Color::Black));
    }

    #[test]
    fn test_castling_queenside_black() {
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1").unwrap();
        play(&mut state, "e8", "c8").unwrap();

        assert_eq!(
            state.board.get(sq("d8")),
            Some(Piece::new(PieceType::Rook, Color::Black))
        );
        assert_eq!(state.board.get(sq("a8")), None);
        assert_eq!(state.king_square(Color::Black), sq("c8"));
    }

    #[test]
    fn test_castling_through_attacked_square() {
        // f8 的黑车攻击 f1：短易位被拒绝，长易位可以
        let mut state = Fen::parse("4kr2/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert_eq!(
            play(&mut state, "e1", "g1"),
            Err(ChessError::CastlingThroughCheck)
        );
        play(&mut state, "e1", "c1").unwrap();
    }

    #[test]
    fn test_castling_queenside_through_attacked_square() {
        // d8 的黑车攻击 d1
        let mut state = Fen::parse("3rk3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert_eq!(
            play(&mut state, "e1", "c1"),
            Err(ChessError::CastlingThroughCheck)
        );
        play(&mut state, "e1", "g1").unwrap();

        // b1 被攻击不影响长易位，王不经过 b1
        let mut state = Fen::parse("1r2k3/8/8/8/8/8/8/R3K3 w Q - 0 1").unwrap();
        play(&mut state, "e1", "c1").unwrap();
        assert_eq!(state.king_square(Color::White), sq("c1"));
        assert_eq!(
            state.board.get(sq("d1")),
            Some(Piece::new(PieceType::Rook, Color::White))
        );
    }

    #[test]
    fn test_black_castling_through_attacked_square() {
        // f1 的白车攻击 f8
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/8/4KR2 b kq - 0 1").unwrap();
        assert_eq!(
            play(&mut state, "e8", "g8"),
            Err(ChessError::CastlingThroughCheck)
        );
        play(&mut state, "e8", "c8").unwrap();

        // d1 的白车攻击 d8
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/8/3RK3 b kq - 0 1").unwrap();
        assert_eq!(
            play(&mut state, "e8", "c8"),
            Err(ChessError::CastlingThroughCheck)
        );
        play(&mut state, "e8", "g8").unwrap();

        // b8 被攻击时仍可长易位
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/8/1R2K3 b kq - 0 1").unwrap();
        play(&mut state, "e8", "c8").unwrap();
        assert_eq!(state.king_square(Color::Black), sq("c8"));
    }

    #[test]
    fn test_castling_out_of_check() {
        let mut state = Fen::parse("4r1k1/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert_eq!(
            play(&mut state, "e1", "g1"),
            Err(ChessError::CastlingThroughCheck)
        );
        assert_eq!(
            play(&mut state, "e1", "c1"),
            Err(ChessError::CastlingThroughCheck)
        );
    }

    #[test]
    fn test_castling_into_check() {
        // g8 的黑车攻击 g1
        let mut state = Fen::parse("4k1r1/8/8/8/8/8/8/4K2R w K - 0 1").unwrap();
        assert_eq!(play(&mut state, "e1", "g1"), Err(ChessError::KingInCheck));
    }

    #[test]
    fn test_castling_gating_after_king_returns() {
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut state, "e1", "f1").unwrap();
        play(&mut state, "a8", "b8").unwrap();
        play(&mut state, "f1", "e1").unwrap();
        play(&mut state, "b8", "a8").unwrap();

        // 王回到 e1，易位权仍然失去
        assert!(state.castling.king_moved(Color::White));
        assert!(play(&mut state, "e1", "g1").is_err());
        assert!(play(&mut state, "e1", "c1").is_err());
        // 黑方动过后车回到 a8，长易位也不再允许
        assert!(state.castling.rook_moved(Color::Black, CastleSide::QueenSide));
    }

    #[test]
    fn test_captured_rook_loses_right() {
        // 白象吃掉 h8 的车
        let mut state = Fen::parse("r3k2r/8/8/8/8/8/1B6/4K3 w kq - 0 1").unwrap();
        play(&mut state, "b2", "h8").unwrap();
        assert!(state.castling.rook_moved(Color::Black, CastleSide::KingSide));
        assert!(!state.castling.rook_moved(Color::Black, CastleSide::QueenSide));
        assert!(play(&mut state, "e8", "g8").is_err());
    }

    #[test]
    fn test_committed_state_never_in_check() {
        let mut state = BoardState::initial();
        for (from, to) in [("e2", "e4"), ("e7", "e5"), ("d1", "h5"), ("b8", "c6"), ("f1", "c4")] {
            let mover = state.side_to_move;
            play(&mut state, from, to).unwrap();
            assert!(!MoveGenerator::is_in_check(&state, mover));
        }

        // 所有候选走法都不会让走子方的王暴露
        let mover = state.side_to_move;
        for mv in state.legal_moves() {
            let (next, _) = state.try_move(mv.from, mv.to, mover).unwrap();
            assert!(!MoveGenerator::is_in_check(&next, mover));
        }
    }

    #[test]
    fn test_game_result_display() {
        assert_eq!(
            GameResult::Checkmate {
                winner: Color::White
            }
            .to_string(),
            "checkmate, white wins"
        );
        assert_eq!(GameResult::Stalemate.to_string(), "stalemate");
    }
}
