use arrayvec::ArrayVec;
use derive_more::{Display, Error};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroU32;
use std::{fmt, ops::Index, str::FromStr};

use super::{Castles, Color, File, Move, MoveContext, Outcome, Piece, Promotion, Rank, Role, Square};

/// Represents an illegal [`Move`] in a given [`Position`].
#[derive(Debug, Display, Clone, Eq, PartialEq, Error)]
#[display(fmt = "move `{_0}` is illegal in this position")]
pub struct IllegalMove(#[error(not(source))] pub Move);

const KNIGHT_JUMPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];

const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

const ROOK_RAYS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_RAYS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

const PROMOTIONS: [Promotion; 4] = [
    Promotion::Queen,
    Promotion::Rook,
    Promotion::Bishop,
    Promotion::Knight,
];

/// The current position on the chess board.
///
/// This type guarantees that it only holds valid positions: exactly one king
/// per color and no pawns on the back ranks.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Position {
    board: [Option<Piece>; 64],
    turn: Color,
    castles: Castles,
    en_passant: Option<Square>,
    halfmoves: u32,
    fullmoves: NonZeroU32,
}

impl Default for Position {
    fn default() -> Self {
        let mut board = [None; 64];

        use Role::*;
        let backrank = [Rook, Knight, Bishop, Queen, King, Bishop, Knight, Rook];

        for (file, role) in File::ALL.into_iter().zip(backrank) {
            for color in Color::iter() {
                let pawn_rank = match color {
                    Color::White => Rank::Second,
                    Color::Black => Rank::Seventh,
                };

                board[Square::new(file, color.backrank()).index() as usize] =
                    Some(Piece(role, color));
                board[Square::new(file, pawn_rank).index() as usize] = Some(Piece(Pawn, color));
            }
        }

        Position {
            board,
            turn: Color::White,
            castles: Castles::all(),
            en_passant: None,
            halfmoves: 0,
            fullmoves: NonZeroU32::MIN,
        }
    }
}

impl Position {
    /// The side to move.
    pub fn turn(&self) -> Color {
        self.turn
    }

    /// The castling rights.
    pub fn castles(&self) -> Castles {
        self.castles
    }

    /// The en passant target square, if the last move was a double pawn push.
    pub fn en_passant_square(&self) -> Option<Square> {
        self.en_passant
    }

    /// The number of halfmoves since the last capture or pawn advance.
    pub fn halfmoves(&self) -> u32 {
        self.halfmoves
    }

    /// The current move number since the start of the game.
    ///
    /// It starts at 1, and is incremented after every move by black.
    pub fn fullmoves(&self) -> NonZeroU32 {
        self.fullmoves
    }

    fn piece_on(&self, sq: Square) -> Option<Piece> {
        self.board[sq.index() as usize]
    }

    /// The square of the given side's king.
    fn king(&self, side: Color) -> Square {
        match Square::ALL
            .into_iter()
            .find(|&sq| self.piece_on(sq) == Some(Piece(Role::King, side)))
        {
            Some(sq) => sq,
            None => unreachable!("position without a {side} king"),
        }
    }

    /// Whether the given square is attacked by a piece of the given color.
    pub fn attacked(&self, sq: Square, by: Color) -> bool {
        for df in [-1, 1] {
            if let Some(from) = sq.shift(df, -by.forward()) {
                if self.piece_on(from) == Some(Piece(Role::Pawn, by)) {
                    return true;
                }
            }
        }

        for (df, dr) in KNIGHT_JUMPS {
            if let Some(from) = sq.shift(df, dr) {
                if self.piece_on(from) == Some(Piece(Role::Knight, by)) {
                    return true;
                }
            }
        }

        for (df, dr) in KING_STEPS {
            if let Some(from) = sq.shift(df, dr) {
                if self.piece_on(from) == Some(Piece(Role::King, by)) {
                    return true;
                }
            }
        }

        for (rays, diagonal) in [(ROOK_RAYS, false), (BISHOP_RAYS, true)] {
            for (df, dr) in rays {
                let mut from = sq;
                while let Some(next) = from.shift(df, dr) {
                    from = next;

                    match self.piece_on(from) {
                        None => continue,
                        Some(p) if p.color() != by => break,
                        Some(p) => {
                            let slider = match diagonal {
                                false => Role::Rook,
                                true => Role::Bishop,
                            };

                            if p.role() == slider || p.role() == Role::Queen {
                                return true;
                            }

                            break;
                        }
                    }
                }
            }
        }

        false
    }

    /// Whether the given side's king is in check.
    pub fn in_check(&self, side: Color) -> bool {
        self.attacked(self.king(side), !side)
    }

    fn pawn_moves(&self, sq: Square, moves: &mut ArrayVec<MoveContext, 256>) {
        let side = self.turn;
        let dir = side.forward();
        let promo_rank = (!side).backrank();
        let start_rank = match side {
            Color::White => Rank::Second,
            Color::Black => Rank::Seventh,
        };

        let push = |from: Square, to: Square, capture, moves: &mut ArrayVec<MoveContext, 256>| {
            if to.rank() == promo_rank {
                for p in PROMOTIONS {
                    moves.push(MoveContext(Move(from, to, p), Role::Pawn, capture));
                }
            } else {
                moves.push(MoveContext(Move(from, to, Promotion::None), Role::Pawn, capture));
            }
        };

        if let Some(to) = sq.shift(0, dir) {
            if self.piece_on(to).is_none() {
                push(sq, to, None, moves);

                if sq.rank() == start_rank {
                    if let Some(far) = sq.shift(0, 2 * dir) {
                        if self.piece_on(far).is_none() {
                            push(sq, far, None, moves);
                        }
                    }
                }
            }
        }

        for df in [-1, 1] {
            let Some(to) = sq.shift(df, dir) else {
                continue;
            };

            match self.piece_on(to) {
                Some(p) if p.color() != side => push(sq, to, Some((p.role(), to)), moves),

                None if self.en_passant == Some(to) => {
                    let victim = Square::new(to.file(), sq.rank());
                    moves.push(MoveContext(
                        Move(sq, to, Promotion::None),
                        Role::Pawn,
                        Some((Role::Pawn, victim)),
                    ));
                }

                _ => {}
            }
        }
    }

    fn step_moves(
        &self,
        sq: Square,
        role: Role,
        steps: [(i8, i8); 8],
        moves: &mut ArrayVec<MoveContext, 256>,
    ) {
        for (df, dr) in steps {
            let Some(to) = sq.shift(df, dr) else {
                continue;
            };

            match self.piece_on(to) {
                None => moves.push(MoveContext(Move(sq, to, Promotion::None), role, None)),
                Some(p) if p.color() != self.turn => moves.push(MoveContext(
                    Move(sq, to, Promotion::None),
                    role,
                    Some((p.role(), to)),
                )),
                Some(_) => {}
            }
        }
    }

    fn slider_moves(
        &self,
        sq: Square,
        role: Role,
        rays: &[(i8, i8)],
        moves: &mut ArrayVec<MoveContext, 256>,
    ) {
        for &(df, dr) in rays {
            let mut to = sq;
            while let Some(next) = to.shift(df, dr) {
                to = next;

                match self.piece_on(to) {
                    None => moves.push(MoveContext(Move(sq, to, Promotion::None), role, None)),
                    Some(p) if p.color() != self.turn => {
                        moves.push(MoveContext(
                            Move(sq, to, Promotion::None),
                            role,
                            Some((p.role(), to)),
                        ));
                        break;
                    }
                    Some(_) => break,
                }
            }
        }
    }

    fn castling_moves(&self, moves: &mut ArrayVec<MoveContext, 256>) {
        let side = self.turn;
        let rank = side.backrank();
        let king = Square::new(File::E, rank);

        if self.attacked(king, !side) {
            return;
        }

        if self.castles.has_short(side) {
            let transit = Square::new(File::F, rank);
            let target = Square::new(File::G, rank);

            if self.piece_on(transit).is_none()
                && self.piece_on(target).is_none()
                && !self.attacked(transit, !side)
                && !self.attacked(target, !side)
            {
                moves.push(MoveContext(Move(king, target, Promotion::None), Role::King, None));
            }
        }

        if self.castles.has_long(side) {
            let edge = Square::new(File::B, rank);
            let target = Square::new(File::C, rank);
            let transit = Square::new(File::D, rank);

            if self.piece_on(edge).is_none()
                && self.piece_on(target).is_none()
                && self.piece_on(transit).is_none()
                && !self.attacked(transit, !side)
                && !self.attacked(target, !side)
            {
                moves.push(MoveContext(Move(king, target, Promotion::None), Role::King, None));
            }
        }
    }

    fn pseudo_moves(&self, moves: &mut ArrayVec<MoveContext, 256>) {
        for sq in Square::ALL {
            let Some(piece) = self.piece_on(sq) else {
                continue;
            };

            if piece.color() != self.turn {
                continue;
            }

            match piece.role() {
                Role::Pawn => self.pawn_moves(sq, moves),
                Role::Knight => self.step_moves(sq, Role::Knight, KNIGHT_JUMPS, moves),
                Role::Bishop => self.slider_moves(sq, Role::Bishop, &BISHOP_RAYS, moves),
                Role::Rook => self.slider_moves(sq, Role::Rook, &ROOK_RAYS, moves),
                Role::Queen => {
                    self.slider_moves(sq, Role::Queen, &ROOK_RAYS, moves);
                    self.slider_moves(sq, Role::Queen, &BISHOP_RAYS, moves);
                }
                Role::King => self.step_moves(sq, Role::King, KING_STEPS, moves),
            }
        }

        self.castling_moves(moves);
    }

    /// An exhaustive, duplicate-free enumeration of the legal moves in this position.
    pub fn moves(&self) -> Vec<MoveContext> {
        let mut pseudo = ArrayVec::new();
        self.pseudo_moves(&mut pseudo);

        pseudo
            .into_iter()
            .filter(|&ctx| !self.cast(ctx).in_check(self.turn))
            .collect()
    }

    /// Applies a generated move without checking its legality.
    fn cast(&self, ctx: MoveContext) -> Position {
        let mut next = self.clone();
        let side = self.turn;
        let m = ctx.0;

        let piece = next.board[m.whence().index() as usize].take();

        if let Some((_, sq)) = ctx.capture() {
            next.board[sq.index() as usize] = None;
        }

        next.board[m.whither().index() as usize] = match m.promotion().role() {
            Some(role) => Some(Piece(role, side)),
            None => piece,
        };

        if ctx.is_castling() {
            let rank = side.backrank();
            let (from, to) = match m.whither().file() {
                File::G => (File::H, File::F),
                _ => (File::A, File::D),
            };

            let rook = next.board[Square::new(from, rank).index() as usize].take();
            next.board[Square::new(to, rank).index() as usize] = rook;
        }

        next.castles.discard(m.whence());
        next.castles.discard(m.whither());

        next.en_passant = if ctx.is_double_push() {
            let skipped = (m.whence().rank().index() + m.whither().rank().index()) / 2;
            Some(Square::new(m.whence().file(), Rank::new(skipped)))
        } else {
            None
        };

        next.halfmoves = if ctx.role() == Role::Pawn || ctx.is_capture() {
            0
        } else {
            self.halfmoves + 1
        };

        if side == Color::Black {
            next.fullmoves = self.fullmoves.saturating_add(1);
        }

        next.turn = !side;
        next
    }

    /// Plays a move if legal.
    ///
    /// This is a pure function; the position played from is never mutated.
    pub fn play(&self, m: Move) -> Result<(Position, MoveContext), IllegalMove> {
        match self.moves().into_iter().find(|ctx| ctx.0 == m) {
            Some(ctx) => Ok((self.cast(ctx), ctx)),
            None => Err(IllegalMove(m)),
        }
    }

    /// Whether neither side retains enough material to deliver checkmate.
    pub fn is_material_insufficient(&self) -> bool {
        let mut minors = Vec::new();

        for sq in Square::ALL {
            match self.piece_on(sq) {
                None => {}
                Some(p) if p.role() == Role::King => {}
                Some(p) if p.role() == Role::Knight => minors.push(None),
                Some(p) if p.role() == Role::Bishop => {
                    minors.push(Some((sq.file().index() + sq.rank().index()) % 2))
                }
                Some(_) => return false,
            }
        }

        match minors.as_slice() {
            [] | [_] => true,
            bishops => {
                let mut shades = bishops.iter().flatten();
                let first = shades.next();
                first.is_some() && bishops.len() == bishops.iter().flatten().count()
                    && shades.all(|s| Some(s) == first)
            }
        }
    }

    /// The outcome of the game as far as this position can tell, if terminal.
    ///
    /// Threefold repetition requires the game history and is judged by the
    /// session layer through [`Position::signature`].
    pub fn outcome(&self) -> Option<Outcome> {
        if self.moves().is_empty() {
            if self.in_check(self.turn) {
                Some(Outcome::Checkmate(!self.turn))
            } else {
                Some(Outcome::Stalemate)
            }
        } else if self.halfmoves >= 100 {
            Some(Outcome::DrawBy50MoveRule)
        } else if self.is_material_insufficient() {
            Some(Outcome::DrawByInsufficientMaterial)
        } else {
            None
        }
    }

    /// A hash of everything that identifies this position for repetition purposes.
    ///
    /// Covers piece placement, side to move, and castling rights; the en
    /// passant square participates only while an en passant capture is
    /// actually possible.
    pub fn signature(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.board.hash(&mut hasher);
        self.turn.hash(&mut hasher);
        self.castles.hash(&mut hasher);

        if let Some(ep) = self.en_passant {
            let capturable = [-1, 1].into_iter().any(|df| {
                ep.shift(df, -self.turn.forward())
                    .and_then(|sq| self.piece_on(sq))
                    == Some(Piece(Role::Pawn, self.turn))
            });

            if capturable {
                ep.hash(&mut hasher);
            }
        }

        hasher.finish()
    }
}

impl Index<Square> for Position {
    type Output = Option<Piece>;

    fn index(&self, sq: Square) -> &Self::Output {
        &self.board[sq.index() as usize]
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({self})")
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in (0..8).rev() {
            let mut run = 0;

            for file in File::ALL {
                match self.piece_on(Square::new(file, Rank::new(r))) {
                    None => run += 1,
                    Some(p) => {
                        if run > 0 {
                            write!(f, "{run}")?;
                            run = 0;
                        }

                        write!(f, "{p}")?;
                    }
                }
            }

            if run > 0 {
                write!(f, "{run}")?;
            }

            if r > 0 {
                write!(f, "/")?;
            }
        }

        let turn = match self.turn {
            Color::White => 'w',
            Color::Black => 'b',
        };

        write!(f, " {turn} {}", self.castles)?;

        match self.en_passant {
            Some(sq) => write!(f, " {sq}")?,
            None => write!(f, " -")?,
        }

        write!(f, " {} {}", self.halfmoves, self.fullmoves)
    }
}

/// The reason why parsing [`Position`] failed.
#[derive(Debug, Display, Clone, Eq, PartialEq, Error)]
pub enum ParseFenError {
    #[display(fmt = "expected six whitespace-separated fields")]
    MissingFields,
    #[display(fmt = "failed to parse piece placement")]
    InvalidPlacement,
    #[display(fmt = "failed to parse side to move")]
    InvalidTurn,
    #[display(fmt = "failed to parse castling rights")]
    InvalidCastles,
    #[display(fmt = "failed to parse en passant square")]
    InvalidEnPassant,
    #[display(fmt = "failed to parse halfmove clock")]
    InvalidHalfmoveClock,
    #[display(fmt = "failed to parse fullmove number")]
    InvalidFullmoveNumber,
    #[display(fmt = "the piece placement violates the rules of chess")]
    IllegalPosition,
}

impl FromStr for Position {
    type Err = ParseFenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ParseFenError::*;

        let mut fields = s.split_whitespace();
        let mut next = || fields.next().ok_or(MissingFields);
        let (placement, turn, castles, en_passant, halfmoves, fullmoves) =
            (next()?, next()?, next()?, next()?, next()?, next()?);

        let mut board = [None; 64];
        let ranks: Vec<_> = placement.split('/').collect();

        if ranks.len() != 8 {
            return Err(InvalidPlacement);
        }

        for (i, rank) in ranks.iter().enumerate() {
            let r = 7 - i as i8;
            let mut f = 0i8;

            for c in rank.chars() {
                if let Some(skip) = c.to_digit(10) {
                    f += skip as i8;

                    if f > 8 {
                        return Err(InvalidPlacement);
                    }
                } else {
                    let piece = c
                        .to_string()
                        .parse::<Piece>()
                        .map_err(|_| InvalidPlacement)?;

                    if f >= 8 {
                        return Err(InvalidPlacement);
                    }

                    board[Square::new(File::new(f), Rank::new(r)).index() as usize] = Some(piece);
                    f += 1;
                }
            }

            if f != 8 {
                return Err(InvalidPlacement);
            }
        }

        let turn = match turn {
            "w" => Color::White,
            "b" => Color::Black,
            _ => return Err(InvalidTurn),
        };

        let mut castles: Castles = castles.parse().map_err(|_| InvalidCastles)?;

        let en_passant = match en_passant {
            "-" => None,
            s => Some(s.parse::<Square>().map_err(|_| InvalidEnPassant)?),
        };

        if let Some(ep) = en_passant {
            let expected = match turn {
                Color::White => Rank::Sixth,
                Color::Black => Rank::Third,
            };

            if ep.rank() != expected {
                return Err(InvalidEnPassant);
            }
        }

        let halfmoves = halfmoves.parse().map_err(|_| InvalidHalfmoveClock)?;
        let fullmoves = fullmoves.parse().map_err(|_| InvalidFullmoveNumber)?;

        for color in Color::iter() {
            let kings = Square::ALL
                .into_iter()
                .filter(|&sq| board[sq.index() as usize] == Some(Piece(Role::King, color)))
                .count();

            if kings != 1 {
                return Err(IllegalPosition);
            }
        }

        for file in File::ALL {
            for rank in [Rank::First, Rank::Eighth] {
                if let Some(p) = board[Square::new(file, rank).index() as usize] {
                    if p.role() == Role::Pawn {
                        return Err(IllegalPosition);
                    }
                }
            }
        }

        // Rights that do not match the piece placement are silently dropped.
        for color in Color::iter() {
            let rank = color.backrank();
            let king = board[Square::new(File::E, rank).index() as usize];

            if king != Some(Piece(Role::King, color)) {
                castles.discard(Square::new(File::E, rank));
            }

            for rook in [File::A, File::H] {
                let sq = Square::new(rook, rank);
                if board[sq.index() as usize] != Some(Piece(Role::Rook, color)) {
                    castles.discard(sq);
                }
            }
        }

        Ok(Position {
            board,
            turn,
            castles,
            en_passant,
            halfmoves,
            fullmoves,
        })
    }
}
