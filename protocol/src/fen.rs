//! FEN 格式解析和生成
//!
//! 国际象棋 FEN 格式：
//! `<棋盘> <走子方> <易位权> <过路兵目标格> <半回合数> <回合数>`
//!
//! 示例：
//! `rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1`
//!
//! 半回合数和回合数只做容错解析，不参与规则判断，输出时固定为 `0 1`。

use crate::board::{Board, BoardState, CastleSide, CastlingRights, LastMove};
use crate::constants::BOARD_SIZE;
use crate::error::ChessError;
use crate::piece::{Color, Piece, PieceType, Square};

/// 初始局面 FEN
pub const INITIAL_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// 易位权字段中的字符顺序
const CASTLING_FLAGS: [(char, Color, CastleSide); 4] = [
    ('K', Color::White, CastleSide::KingSide),
    ('Q', Color::White, CastleSide::QueenSide),
    ('k', Color::Black, CastleSide::KingSide),
    ('q', Color::Black, CastleSide::QueenSide),
];

/// FEN 格式处理
pub struct Fen;

impl Fen {
    /// 解析 FEN 字符串为棋盘状态
    pub fn parse(fen: &str) -> Result<BoardState, ChessError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.is_empty() {
            return Err(ChessError::InvalidFen {
                reason: "Empty FEN string".to_string(),
            });
        }

        let board = Self::parse_board(parts[0])?;

        // 走子方（默认白方）
        let side_to_move = match parts.get(1) {
            Some(s) => Self::parse_side(s)?,
            None => Color::White,
        };

        let mut state = BoardState::from_board(board, side_to_move).map_err(|e| {
            ChessError::InvalidFen {
                reason: e.to_string(),
            }
        })?;

        if let Some(field) = parts.get(2) {
            state.castling = Self::parse_castling(field, state.castling)?;
        }

        if let Some(field) = parts.get(3) {
            state.last_move = Self::parse_en_passant(field, &state)?;
        }

        Ok(state)
    }

    /// 解析棋盘部分
    fn parse_board(board_str: &str) -> Result<Board, ChessError> {
        let mut board = Board::empty();
        let rows: Vec<&str> = board_str.split('/').collect();

        if rows.len() != BOARD_SIZE {
            return Err(ChessError::InvalidFen {
                reason: format!("Expected {} rows, got {}", BOARD_SIZE, rows.len()),
            });
        }

        // FEN 从第 8 行写到第 1 行，正好对应 row 0 到 row 7
        for (row_idx, row) in rows.iter().enumerate() {
            let mut col = 0usize;

            for c in row.chars() {
                if col >= BOARD_SIZE {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Row {} has too many columns", row_idx),
                    });
                }

                if let Some(empty_count) = c.to_digit(10) {
                    if !(1..=BOARD_SIZE as u32).contains(&empty_count) {
                        return Err(ChessError::InvalidFen {
                            reason: format!("Invalid empty square count: {}", c),
                        });
                    }
                    col += empty_count as usize;
                } else if let Some(piece) = Piece::from_fen_char(c) {
                    board.set(Square::new_unchecked(row_idx as u8, col as u8), Some(piece));
                    col += 1;
                } else {
                    return Err(ChessError::InvalidFen {
                        reason: format!("Invalid piece character: {}", c),
                    });
                }
            }

            if col != BOARD_SIZE {
                return Err(ChessError::InvalidFen {
                    reason: format!("Row {} has {} columns, expected {}", row_idx, col, BOARD_SIZE),
                });
            }
        }

        Ok(board)
    }

    fn parse_side(field: &str) -> Result<Color, ChessError> {
        let mut chars = field.chars();
        match (chars.next().and_then(Color::from_fen_char), chars.next()) {
            (Some(color), None) => Ok(color),
            _ => Err(ChessError::InvalidFen {
                reason: format!("Invalid side to move: {}", field),
            }),
        }
    }

    /// 解析易位权，在按摆放推断的易位权基础上再去掉未列出的方向
    fn parse_castling(
        field: &str,
        mut rights: CastlingRights,
    ) -> Result<CastlingRights, ChessError> {
        if field != "-" && !field.chars().all(|c| CASTLING_FLAGS.iter().any(|f| f.0 == c)) {
            return Err(ChessError::InvalidFen {
                reason: format!("Invalid castling field: {}", field),
            });
        }

        for (flag, color, side) in CASTLING_FLAGS {
            if !field.contains(flag) {
                rights.mark_rook_moved(color, side);
            }
        }

        Ok(rights)
    }

    /// 过路兵目标格换算为等价的上一步记录（对方兵从起始行走两格）
    fn parse_en_passant(field: &str, state: &BoardState) -> Result<Option<LastMove>, ChessError> {
        if field == "-" {
            return Ok(None);
        }

        let invalid = || ChessError::InvalidFen {
            reason: format!("Invalid en passant square: {}", field),
        };

        let target = Square::from_name(field).ok_or_else(invalid)?;
        let pusher = state.side_to_move.opponent();
        let dir = pusher.pawn_direction();

        let from = Square::new_unchecked(pusher.pawn_start_row(), target.col);
        if from.offset(dir, 0) != Some(target) {
            return Err(invalid());
        }
        let to = from.offset(2 * dir, 0).ok_or_else(invalid)?;

        let piece = Piece::new(PieceType::Pawn, pusher);
        if state.board.get(to) != Some(piece) {
            return Err(invalid());
        }

        Ok(Some(LastMove { from, to, piece }))
    }

    /// 将棋盘状态转换为 FEN 字符串
    pub fn to_string(state: &BoardState) -> String {
        format!(
            "{} {} {} {} 0 1",
            Self::board_to_string(&state.board),
            state.side_to_move.to_fen_char(),
            Self::castling_to_string(&state.castling),
            Self::en_passant_to_string(state),
        )
    }

    /// 将棋盘转换为 FEN 棋盘部分
    pub fn board_to_string(board: &Board) -> String {
        let mut rows = Vec::with_capacity(BOARD_SIZE);

        for row in 0..BOARD_SIZE as u8 {
            let mut line = String::new();
            let mut empty_count = 0;

            for col in 0..BOARD_SIZE as u8 {
                if let Some(piece) = board.get(Square::new_unchecked(row, col)) {
                    if empty_count > 0 {
                        line.push_str(&empty_count.to_string());
                        empty_count = 0;
                    }
                    line.push(piece.to_fen_char());
                } else {
                    empty_count += 1;
                }
            }

            if empty_count > 0 {
                line.push_str(&empty_count.to_string());
            }

            rows.push(line);
        }

        rows.join("/")
    }

    fn castling_to_string(rights: &CastlingRights) -> String {
        let field: String = CASTLING_FLAGS
            .iter()
            .filter(|(_, color, side)| rights.can_castle(*color, *side))
            .map(|(flag, _, _)| *flag)
            .collect();

        if field.is_empty() {
            "-".to_string()
        } else {
            field
        }
    }

    fn en_passant_to_string(state: &BoardState) -> String {
        match state.last_move {
            Some(last) if last.is_double_pawn_push() => {
                let passed = Square::new_unchecked((last.from.row + last.to.row) / 2, last.to.col);
                passed.to_string()
            }
            _ => "-".to_string(),
        }
    }
}
