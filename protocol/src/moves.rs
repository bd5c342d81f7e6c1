//! 走法生成和验证
//!
//! 合法性分两步判断：先看是否伪合法（只考虑棋子走法、阻挡、吃子、易位和
//! 吃过路兵的前提），再由 [`crate::BoardState::attempt_move`] 在副本上走完后
//! 检查己方王是否被攻击。

use serde::{Deserialize, Serialize};

use crate::board::{Board, BoardState, CastleSide, KING_START_COL};
use crate::piece::{Color, Piece, PieceType, Square};

/// 走法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Move {
    /// 起始格
    pub from: Square,
    /// 目标格
    pub to: Square,
    /// 被吃的棋子（如果有，含吃过路兵）
    pub captured: Option<Piece>,
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// 走法生成器
pub struct MoveGenerator;

impl MoveGenerator {
    /// 直线或斜线上两格之间（不含两端）是否没有棋子
    ///
    /// 调用方保证两格共线；不共线或有一格不在棋盘内时返回 false。
    pub fn is_path_clear(board: &Board, from: Square, to: Square) -> bool {
        if !from.is_valid() || !to.is_valid() {
            return false;
        }

        let dr = (to.row as i8 - from.row as i8).signum();
        let dc = (to.col as i8 - from.col as i8).signum();

        let mut current = from;
        while let Some(next) = current.offset(dr, dc) {
            if next == to {
                return true;
            }
            if board.get(next).is_some() {
                return false;
            }
            current = next;
        }
        false
    }

    /// 指定格子是否被 `by` 方攻击
    ///
    /// 每次查询都扫描整个棋盘。
    pub fn is_square_attacked(board: &Board, square: Square, by: Color) -> bool {
        board
            .pieces(by)
            .into_iter()
            .any(|(from, piece)| Self::can_attack(board, from, piece, square))
    }

    /// 指定阵营是否被将军
    pub fn is_in_check(state: &BoardState, color: Color) -> bool {
        Self::is_square_attacked(&state.board, state.king_square(color), color.opponent())
    }

    /// 棋子能否吃掉站在目标格上的对方棋子
    ///
    /// 兵只斜向攻击，王只攻击相邻格（易位不算攻击）。
    fn can_attack(board: &Board, from: Square, piece: Piece, target: Square) -> bool {
        if from == target {
            return false;
        }
        let dr = target.row as i8 - from.row as i8;
        let dc = target.col as i8 - from.col as i8;

        match piece.piece_type {
            PieceType::Pawn => dr == piece.color.pawn_direction() && dc.abs() == 1,
            PieceType::Knight => Self::is_knight_jump(dr, dc),
            PieceType::King => dr.abs() <= 1 && dc.abs() <= 1,
            PieceType::Rook => (dr == 0 || dc == 0) && Self::is_path_clear(board, from, target),
            PieceType::Bishop => dr.abs() == dc.abs() && Self::is_path_clear(board, from, target),
            PieceType::Queen => {
                (dr == 0 || dc == 0 || dr.abs() == dc.abs())
                    && Self::is_path_clear(board, from, target)
            }
        }
    }

    fn is_knight_jump(dr: i8, dc: i8) -> bool {
        (dr.abs() == 2 && dc.abs() == 1) || (dr.abs() == 1 && dc.abs() == 2)
    }

    /// 判断走法是否伪合法（不考虑走后己方王是否被攻击）
    pub fn is_pseudo_legal(
        state: &BoardState,
        piece: Piece,
        from: Square,
        to: Square,
        mover: Color,
    ) -> bool {
        if !from.is_valid() || !to.is_valid() || from == to || piece.color != mover {
            return false;
        }

        // 不能吃自己的棋子
        let target = state.board.get(to);
        if target.is_some_and(|t| t.color == mover) {
            return false;
        }

        let dr = to.row as i8 - from.row as i8;
        let dc = to.col as i8 - from.col as i8;

        match piece.piece_type {
            PieceType::Pawn => Self::is_pawn_move(state, from, to, mover, target),
            PieceType::Rook => (dr == 0 || dc == 0) && Self::is_path_clear(&state.board, from, to),
            PieceType::Bishop => {
                dr.abs() == dc.abs() && Self::is_path_clear(&state.board, from, to)
            }
            PieceType::Queen => {
                (dr == 0 || dc == 0 || dr.abs() == dc.abs())
                    && Self::is_path_clear(&state.board, from, to)
            }
            PieceType::Knight => Self::is_knight_jump(dr, dc),
            PieceType::King => {
                if dr.abs() <= 1 && dc.abs() <= 1 {
                    return true;
                }
                Self::castle_side(state, from, to, mover).is_some()
            }
        }
    }

    /// 兵的走法
    fn is_pawn_move(
        state: &BoardState,
        from: Square,
        to: Square,
        mover: Color,
        target: Option<Piece>,
    ) -> bool {
        let dir = mover.pawn_direction();
        let dr = to.row as i8 - from.row as i8;
        let dc = to.col as i8 - from.col as i8;

        // 前进一格
        if dc == 0 && dr == dir {
            return target.is_none();
        }

        // 从起始行前进两格，中间格和目标格都要空
        if dc == 0 && dr == 2 * dir && from.row == mover.pawn_start_row() {
            let middle = from.offset(dir, 0);
            return middle.is_some_and(|m| state.board.get(m).is_none()) && target.is_none();
        }

        // 斜吃
        if dc.abs() == 1 && dr == dir {
            return target.is_some() || Self::is_en_passant(state, from, to, mover);
        }

        false
    }

    /// 吃过路兵：上一步必须是对方兵从起始行走两格，落在目标列、与己方兵同一行
    fn is_en_passant(state: &BoardState, from: Square, to: Square, mover: Color) -> bool {
        if from.row != mover.en_passant_row() || state.board.get(to).is_some() {
            return false;
        }
        match state.last_move {
            Some(last) => {
                last.piece == Piece::new(PieceType::Pawn, mover.opponent())
                    && last.is_double_pawn_push()
                    && last.to.col == to.col
                    && last.to.row == from.row
            }
            None => false,
        }
    }

    /// 如果是合乎前提的易位，返回易位方向
    ///
    /// 只检查王车是否动过、车是否在角上以及中间格是否为空；王是否经过被攻击
    /// 的格子由走子时的将军过滤负责。
    pub fn castle_side(
        state: &BoardState,
        from: Square,
        to: Square,
        mover: Color,
    ) -> Option<CastleSide> {
        let home = mover.home_row();
        if from != Square::new_unchecked(home, KING_START_COL) || to.row != home {
            return None;
        }
        let side = CastleSide::from_king_target(to.col)?;

        if !state.castling.can_castle(mover, side) {
            return None;
        }

        let corner = Square::new_unchecked(home, side.rook_col());
        if state.board.get(corner) != Some(Piece::new(PieceType::Rook, mover)) {
            return None;
        }

        let path_empty = side
            .between_cols()
            .all(|col| state.board.get(Square::new_unchecked(home, col)).is_none());

        path_empty.then_some(side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::LastMove;
    use crate::fen::Fen;

    fn sq(name: &str) -> Square {
        Square::from_name(name).unwrap()
    }

    /// 判断当前走子方从 from 到 to 是否伪合法
    fn pseudo(state: &BoardState, from: &str, to: &str) -> bool {
        let from = sq(from);
        let piece = state.board.get(from).unwrap();
        MoveGenerator::is_pseudo_legal(state, piece, from, sq(to), piece.color)
    }

    #[test]
    fn test_path_clear() {
        let board = Board::initial();

        // a1 到 a8 被兵挡住
        assert!(!MoveGenerator::is_path_clear(&board, sq("a1"), sq("a8")));
        // a2 到 a7 中间是空的
        assert!(MoveGenerator::is_path_clear(&board, sq("a2"), sq("a7")));
        // 斜线 c1 到 h6 被 d2 挡住
        assert!(!MoveGenerator::is_path_clear(&board, sq("c1"), sq("h6")));
        // 相邻格之间没有格子
        assert!(MoveGenerator::is_path_clear(&board, sq("e1"), sq("e2")));
        // 不共线的两格
        assert!(!MoveGenerator::is_path_clear(&Board::empty(), sq("a1"), sq("b3")));
    }

    #[test]
    fn test_path_clear_off_board() {
        let board = Board::empty();
        let far = Square::new_unchecked(128, 0);
        assert!(!MoveGenerator::is_path_clear(&board, far, sq("a1")));
        assert!(!MoveGenerator::is_path_clear(&board, sq("a1"), far));
        assert!(!MoveGenerator::is_path_clear(
            &board,
            Square::new_unchecked(0, 255),
            sq("h8")
        ));
    }

    #[test]
    fn test_basic_validation() {
        let state = BoardState::initial();
        let pawn = Piece::new(PieceType::Pawn, Color::White);

        // 越界
        assert!(!MoveGenerator::is_pseudo_legal(
            &state,
            pawn,
            sq("e2"),
            Square::new_unchecked(8, 4),
            Color::White
        ));
        // 原地不动
        assert!(!MoveGenerator::is_pseudo_legal(&state, pawn, sq("e2"), sq("e2"), Color::White));
        // 颜色不符
        assert!(!MoveGenerator::is_pseudo_legal(&state, pawn, sq("e2"), sq("e4"), Color::Black));
        // 吃自己的棋子
        assert!(!pseudo(&state, "a1", "a2"));
    }

    #[test]
    fn test_pawn_moves() {
        let state = BoardState::initial();

        assert!(pseudo(&state, "e2", "e3"));
        assert!(pseudo(&state, "e2", "e4"));
        assert!(!pseudo(&state, "e2", "e5"));
        // 不能斜走到空格
        assert!(!pseudo(&state, "e2", "d3"));
        // 黑兵向第 7 行方向走
        assert!(pseudo(&state, "d7", "d5"));
        assert!(!pseudo(&state, "d7", "d8"));
    }

    #[test]
    fn test_pawn_blocked() {
        // e3 有子时既不能走一格也不能走两格
        let state = Fen::parse("4k3/8/8/8/8/4n3/4P3/4K3 w - - 0 1").unwrap();
        assert!(!pseudo(&state, "e2", "e3"));
        assert!(!pseudo(&state, "e2", "e4"));

        // 只挡住 e4 时可以走一格
        let state = Fen::parse("4k3/8/8/8/4n3/8/4P3/4K3 w - - 0 1").unwrap();
        assert!(pseudo(&state, "e2", "e3"));
        assert!(!pseudo(&state, "e2", "e4"));
    }

    #[test]
    fn test_pawn_double_step_only_from_start() {
        let state = Fen::parse("4k3/8/8/8/8/4P3/8/4K3 w - - 0 1").unwrap();
        assert!(pseudo(&state, "e3", "e4"));
        assert!(!pseudo(&state, "e3", "e5"));
    }

    #[test]
    fn test_pawn_capture() {
        let state = Fen::parse("4k3/8/8/3p1p2/4P3/8/8/4K3 w - - 0 1").unwrap();
        assert!(pseudo(&state, "e4", "d5"));
        assert!(pseudo(&state, "e4", "f5"));
        // 兵不能后退或平移
        assert!(!pseudo(&state, "e4", "e3"));
        assert!(!pseudo(&state, "e4", "d4"));
    }

    #[test]
    fn test_en_passant() {
        // 黑兵 d7-d5 刚走完，白兵在 e5
        let state = Fen::parse("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        assert!(pseudo(&state, "e5", "d6"));
        // 另一侧没有可吃的兵
        assert!(!pseudo(&state, "e5", "f6"));

        // 上一步不是两格时不能吃
        let mut stale = state.clone();
        stale.last_move = Some(LastMove {
            from: sq("d6"),
            to: sq("d5"),
            piece: Piece::new(PieceType::Pawn, Color::Black),
        });
        assert!(!pseudo(&stale, "e5", "d6"));

        // 没有上一步记录时不能吃
        stale.last_move = None;
        assert!(!pseudo(&stale, "e5", "d6"));
    }

    #[test]
    fn test_en_passant_wrong_column() {
        // d 列的兵刚走两格，b5 的兵不相邻
        let state = Fen::parse("4k3/8/8/1P1p4/8/8/8/4K3 w - d6 0 1").unwrap();
        assert!(!pseudo(&state, "b5", "c6"));
        assert!(!pseudo(&state, "b5", "a6"));
    }

    #[test]
    fn test_black_en_passant() {
        let state = Fen::parse("4k3/8/8/8/4Pp2/8/8/4K3 b - e3 0 1").unwrap();
        assert!(pseudo(&state, "f4", "e3"));
    }

    #[test]
    fn test_sliding_pieces() {
        let state = Fen::parse("4k3/8/8/8/3Q4/8/8/4K3 w - - 0 1").unwrap();
        assert!(pseudo(&state, "d4", "d8"));
        assert!(pseudo(&state, "d4", "a4"));
        assert!(pseudo(&state, "d4", "h8"));
        assert!(pseudo(&state, "d4", "a1"));
        assert!(!pseudo(&state, "d4", "e6"));

        let state = Fen::parse("4k3/8/8/8/3R4/8/8/4K3 w - - 0 1").unwrap();
        assert!(pseudo(&state, "d4", "h4"));
        assert!(!pseudo(&state, "d4", "e5"));

        let state = Fen::parse("4k3/8/8/8/3B4/8/8/4K3 w - - 0 1").unwrap();
        assert!(pseudo(&state, "d4", "g7"));
        assert!(!pseudo(&state, "d4", "d5"));
    }

    #[test]
    fn test_sliding_blocked() {
        // 车被 d6 的黑兵挡住：能吃 d6，不能越过
        let state = Fen::parse("3k4/8/3p4/8/3R4/8/8/4K3 w - - 0 1").unwrap();
        assert!(pseudo(&state, "d4", "d6"));
        assert!(!pseudo(&state, "d4", "d7"));
    }

    #[test]
    fn test_knight_moves() {
        let state = BoardState::initial();
        assert!(pseudo(&state, "g1", "f3"));
        assert!(pseudo(&state, "g1", "h3"));
        // 被己方兵占据
        assert!(!pseudo(&state, "g1", "e2"));
        assert!(!pseudo(&state, "g1", "g3"));
    }

    #[test]
    fn test_king_steps() {
        let state = Fen::parse("4k3/8/8/8/4K3/8/8/8 w - - 0 1").unwrap();
        let king_moves = Square::all()
            .filter(|&to| {
                MoveGenerator::is_pseudo_legal(
                    &state,
                    Piece::new(PieceType::King, Color::White),
                    sq("e4"),
                    to,
                    Color::White,
                )
            })
            .count();
        assert_eq!(king_moves, 8);
        assert!(!pseudo(&state, "e4", "e6"));
    }

    #[test]
    fn test_castling_preconditions() {
        let state = Fen::parse("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert!(pseudo(&state, "e1", "g1"));
        assert!(pseudo(&state, "e1", "c1"));
        assert!(pseudo(&state, "e8", "g8"));
        assert!(pseudo(&state, "e8", "c8"));

        // 易位权已失去
        let state = Fen::parse("r3k2r/8/8/8/8/8/8/R3K2R w Qk - 0 1").unwrap();
        assert!(!pseudo(&state, "e1", "g1"));
        assert!(pseudo(&state, "e1", "c1"));
        assert!(pseudo(&state, "e8", "g8"));
        assert!(!pseudo(&state, "e8", "c8"));

        // 中间有子（b1 上的马挡住长易位）
        let state = Fen::parse("4k3/8/8/8/8/8/8/RN2K2R w KQ - 0 1").unwrap();
        assert!(!pseudo(&state, "e1", "c1"));
        assert!(pseudo(&state, "e1", "g1"));
    }

    #[test]
    fn test_castle_side_requires_rook() {
        // 易位权仍在但车已不在角上
        let mut state = Fen::parse("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        state.board.set(sq("h1"), None);
        assert_eq!(MoveGenerator::castle_side(&state, sq("e1"), sq("g1"), Color::White), None);
        assert_eq!(
            MoveGenerator::castle_side(&state, sq("e1"), sq("c1"), Color::White),
            Some(CastleSide::QueenSide)
        );
    }

    #[test]
    fn test_square_attacked() {
        let state = Fen::parse("4k3/8/8/8/8/8/3p4/4K2R w - - 0 1").unwrap();

        // 黑兵 d2 攻击 e1 和 c1，但不攻击前方的 d1
        assert!(MoveGenerator::is_square_attacked(&state.board, sq("e1"), Color::Black));
        assert!(MoveGenerator::is_square_attacked(&state.board, sq("c1"), Color::Black));
        assert!(!MoveGenerator::is_square_attacked(&state.board, sq("d1"), Color::Black));

        // 白车攻击 h 列直到黑方底线
        assert!(MoveGenerator::is_square_attacked(&state.board, sq("h8"), Color::White));
        // 白车到 e1 左侧被王挡住，王也够不到 c1
        assert!(!MoveGenerator::is_square_attacked(&state.board, sq("c1"), Color::White));
    }

    #[test]
    fn test_castling_is_not_an_attack() {
        // 王能易位到 g1 和 c1，但这两格不算被王攻击
        let state = Fen::parse("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        assert!(pseudo(&state, "e1", "g1"));
        assert!(pseudo(&state, "e1", "c1"));

        let mut board = state.board.clone();
        board.set(sq("a1"), None);
        board.set(sq("h1"), None);
        assert!(!MoveGenerator::is_square_attacked(&board, sq("g1"), Color::White));
        assert!(!MoveGenerator::is_square_attacked(&board, sq("c1"), Color::White));
    }

    #[test]
    fn test_check_detection() {
        let state = Fen::parse("4k3/8/8/8/8/8/8/r3K3 w - - 0 1").unwrap();
        assert!(MoveGenerator::is_in_check(&state, Color::White));
        assert!(!MoveGenerator::is_in_check(&state, Color::Black));

        let state = Fen::parse("4k3/8/3N4/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(MoveGenerator::is_in_check(&state, Color::Black));

        assert!(!MoveGenerator::is_in_check(&BoardState::initial(), Color::White));
    }
}
