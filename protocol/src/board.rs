//! 棋盘状态

use serde::{Deserialize, Serialize};

use crate::constants::BOARD_SIZE;
use crate::error::ChessError;
use crate::piece::{Color, Piece, PieceType, Square};

/// 底线棋子排列（a 到 h 列）
const BACK_RANK: [PieceType; BOARD_SIZE] = [
    PieceType::Rook,
    PieceType::Knight,
    PieceType::Bishop,
    PieceType::Queen,
    PieceType::King,
    PieceType::Bishop,
    PieceType::Knight,
    PieceType::Rook,
];

/// 王的初始列
pub const KING_START_COL: u8 = 4;

/// 棋盘
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// 8x8 棋盘，索引为 row * 8 + col，使用 Vec 以支持 serde
    squares: Vec<Option<Piece>>,
}

impl Board {
    /// 创建空棋盘
    pub fn empty() -> Self {
        Self {
            squares: vec![None; BOARD_SIZE * BOARD_SIZE],
        }
    }

    /// 创建初始棋盘
    pub fn initial() -> Self {
        let mut board = Self::empty();

        for color in [Color::White, Color::Black] {
            let home = color.home_row();
            let pawns = color.pawn_start_row();
            for (col, piece_type) in BACK_RANK.iter().enumerate() {
                let col = col as u8;
                board.set(Square::new_unchecked(home, col), Some(Piece::new(*piece_type, color)));
                board.set(Square::new_unchecked(pawns, col), Some(Piece::new(PieceType::Pawn, color)));
            }
        }

        board
    }

    /// 获取指定格子的棋子（越界视为空）
    pub fn get(&self, square: Square) -> Option<Piece> {
        if square.is_valid() {
            self.squares[square.to_index()]
        } else {
            None
        }
    }

    /// 设置指定格子的棋子（越界忽略）
    pub fn set(&mut self, square: Square, piece: Option<Piece>) {
        if square.is_valid() {
            self.squares[square.to_index()] = piece;
        }
    }

    /// 移动棋子（不检查规则），返回被吃的棋子
    pub fn move_piece(&mut self, from: Square, to: Square) -> Option<Piece> {
        let piece = self.get(from);
        let captured = self.get(to);
        self.set(from, None);
        self.set(to, piece);
        captured
    }

    /// 查找指定阵营的王
    pub fn find_king(&self, color: Color) -> Option<Square> {
        Square::all().find(|&sq| {
            self.get(sq)
                .is_some_and(|p| p.is(PieceType::King, color))
        })
    }

    /// 获取指定阵营的所有棋子
    pub fn pieces(&self, color: Color) -> Vec<(Square, Piece)> {
        self.all_pieces()
            .into_iter()
            .filter(|(_, piece)| piece.color == color)
            .collect()
    }

    /// 获取所有棋子
    pub fn all_pieces(&self) -> Vec<(Square, Piece)> {
        Square::all()
            .filter_map(|sq| self.get(sq).map(|piece| (sq, piece)))
            .collect()
    }

    /// 统计指定棋子的数量
    pub fn count(&self, piece: Piece) -> usize {
        self.squares.iter().filter(|p| **p == Some(piece)).count()
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..BOARD_SIZE as u8 {
            write!(f, "{} ", 8 - row)?;
            for col in 0..BOARD_SIZE as u8 {
                let c = self
                    .get(Square::new_unchecked(row, col))
                    .map_or('·', |p| p.symbol());
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        write!(f, "  abcdefgh")
    }
}

/// 易位方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CastleSide {
    /// 短易位（王翼）
    KingSide,
    /// 长易位（后翼）
    QueenSide,
}

impl CastleSide {
    /// 根据王的目标列判断易位方向
    pub fn from_king_target(col: u8) -> Option<CastleSide> {
        match col {
            6 => Some(CastleSide::KingSide),
            2 => Some(CastleSide::QueenSide),
            _ => None,
        }
    }

    /// 车的初始列
    pub fn rook_col(&self) -> u8 {
        match self {
            CastleSide::KingSide => 7,
            CastleSide::QueenSide => 0,
        }
    }

    /// 易位后车所在的列（紧挨王的新位置）
    pub fn rook_target_col(&self) -> u8 {
        match self {
            CastleSide::KingSide => 5,
            CastleSide::QueenSide => 3,
        }
    }

    /// 王在移动中经过的列
    pub fn king_passes_col(&self) -> u8 {
        self.rook_target_col()
    }

    /// 王与车之间必须为空的列
    pub fn between_cols(&self) -> std::ops::Range<u8> {
        match self {
            CastleSide::KingSide => 5..7,
            CastleSide::QueenSide => 1..4,
        }
    }
}

/// 易位权
///
/// 六个标志只会从 false 变为 true，没有任何方法能把它们重置。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CastlingRights {
    white_king_moved: bool,
    white_rook_kingside_moved: bool,
    white_rook_queenside_moved: bool,
    black_king_moved: bool,
    black_rook_kingside_moved: bool,
    black_rook_queenside_moved: bool,
}

impl CastlingRights {
    /// 王是否已经动过
    pub fn king_moved(&self, color: Color) -> bool {
        match color {
            Color::White => self.white_king_moved,
            Color::Black => self.black_king_moved,
        }
    }

    /// 车是否已经动过（或被吃掉）
    pub fn rook_moved(&self, color: Color, side: CastleSide) -> bool {
        match (color, side) {
            (Color::White, CastleSide::KingSide) => self.white_rook_kingside_moved,
            (Color::White, CastleSide::QueenSide) => self.white_rook_queenside_moved,
            (Color::Black, CastleSide::KingSide) => self.black_rook_kingside_moved,
            (Color::Black, CastleSide::QueenSide) => self.black_rook_queenside_moved,
        }
    }

    /// 该方向是否还保留易位权
    pub fn can_castle(&self, color: Color, side: CastleSide) -> bool {
        !self.king_moved(color) && !self.rook_moved(color, side)
    }

    /// 标记王已移动
    pub fn mark_king_moved(&mut self, color: Color) {
        match color {
            Color::White => self.white_king_moved = true,
            Color::Black => self.black_king_moved = true,
        }
    }

    /// 标记车已移动
    pub fn mark_rook_moved(&mut self, color: Color, side: CastleSide) {
        match (color, side) {
            (Color::White, CastleSide::KingSide) => self.white_rook_kingside_moved = true,
            (Color::White, CastleSide::QueenSide) => self.white_rook_queenside_moved = true,
            (Color::Black, CastleSide::KingSide) => self.black_rook_kingside_moved = true,
            (Color::Black, CastleSide::QueenSide) => self.black_rook_queenside_moved = true,
        }
    }

    /// 某个初始格被走子触及（走出或被吃）时更新对应标志
    pub fn touch(&mut self, square: Square) {
        for color in [Color::White, Color::Black] {
            if square.row != color.home_row() {
                continue;
            }
            if square.col == KING_START_COL {
                self.mark_king_moved(color);
            }
            for side in [CastleSide::KingSide, CastleSide::QueenSide] {
                if square.col == side.rook_col() {
                    self.mark_rook_moved(color, side);
                }
            }
        }
    }

    /// 根据棋子摆放推断易位权（王和车都在初始格才保留）
    pub fn from_placement(board: &Board) -> Self {
        let mut rights = Self::default();
        for color in [Color::White, Color::Black] {
            let home = color.home_row();
            let king_home = Square::new_unchecked(home, KING_START_COL);
            if board.get(king_home) != Some(Piece::new(PieceType::King, color)) {
                rights.mark_king_moved(color);
            }
            for side in [CastleSide::KingSide, CastleSide::QueenSide] {
                let corner = Square::new_unchecked(home, side.rook_col());
                if board.get(corner) != Some(Piece::new(PieceType::Rook, color)) {
                    rights.mark_rook_moved(color, side);
                }
            }
        }
        rights
    }
}

/// 上一步走法记录（只用于判断吃过路兵）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LastMove {
    pub from: Square,
    pub to: Square,
    pub piece: Piece,
}

impl LastMove {
    /// 是否为兵从起始行走两格
    pub fn is_double_pawn_push(&self) -> bool {
        self.piece.piece_type == PieceType::Pawn
            && self.from.row == self.piece.color.pawn_start_row()
            && self.from.col == self.to.col
            && (self.to.row as i8 - self.from.row as i8) == 2 * self.piece.color.pawn_direction()
    }
}

/// 完整的对局状态
///
/// 所有修改都通过 [`BoardState::attempt_move`] 进行。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardState {
    /// 棋盘
    pub board: Board,
    /// 当前走子方
    pub side_to_move: Color,
    /// 白王位置
    pub white_king: Square,
    /// 黑王位置
    pub black_king: Square,
    /// 易位权
    pub castling: CastlingRights,
    /// 上一步走法（开局前为空）
    pub last_move: Option<LastMove>,
}

impl BoardState {
    /// 创建初始状态
    pub fn initial() -> Self {
        Self {
            board: Board::initial(),
            side_to_move: Color::White,
            white_king: Square::new_unchecked(Color::White.home_row(), KING_START_COL),
            black_king: Square::new_unchecked(Color::Black.home_row(), KING_START_COL),
            castling: CastlingRights::default(),
            last_move: None,
        }
    }

    /// 从任意棋盘创建状态，易位权按棋子摆放推断
    pub fn from_board(board: Board, side_to_move: Color) -> Result<Self, ChessError> {
        let white_king = Self::locate_single_king(&board, Color::White)?;
        let black_king = Self::locate_single_king(&board, Color::Black)?;
        let castling = CastlingRights::from_placement(&board);

        Ok(Self {
            board,
            side_to_move,
            white_king,
            black_king,
            castling,
            last_move: None,
        })
    }

    fn locate_single_king(board: &Board, color: Color) -> Result<Square, ChessError> {
        let count = board.count(Piece::new(PieceType::King, color));
        if count != 1 {
            return Err(ChessError::InvalidPosition {
                reason: format!("expected one {} king, found {}", color, count),
            });
        }
        board.find_king(color).ok_or_else(|| ChessError::InvalidPosition {
            reason: format!("no {} king", color),
        })
    }

    /// 指定阵营的王所在格
    pub fn king_square(&self, color: Color) -> Square {
        match color {
            Color::White => self.white_king,
            Color::Black => self.black_king,
        }
    }

    /// 更新王的位置记录
    pub fn set_king_square(&mut self, color: Color, square: Square) {
        match color {
            Color::White => self.white_king = square,
            Color::Black => self.black_king = square,
        }
    }
}

impl Default for BoardState {
    fn default() -> Self {
        Self::initial()
    }
}
