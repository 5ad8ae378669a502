use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    unwrap_payload, FormatError, GridCell, Piece, PieceKind, PlayerId, RawRecord, Side,
};

/// What a player looks like at one point of the game.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerState {
    pub name: String,
    pub score: u32,
    pub id: PlayerId,
    /// Contains an entry for every [`PieceKind`].
    pub pieces_left: BTreeMap<PieceKind, u8>,
}

impl PlayerState {
    /// A player with a full inventory and no points.
    pub fn initial(name: &str, id: PlayerId) -> Self {
        Self {
            name: String::from(name),
            score: 0,
            id,
            pieces_left: PieceKind::ALL
                .iter()
                .map(|&kind| (kind, kind.shape.initial_count()))
                .collect(),
        }
    }

    pub fn remaining(&self, kind: PieceKind) -> u8 {
        self.pieces_left.get(&kind).copied().unwrap_or(0)
    }
}

/// A piece on the board, together with the player who placed it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Occupant {
    pub piece: Piece,
    pub owner: PlayerId,
}

/// The occupied cells of the board. Absent cells are empty.
pub type BoardOccupancy = BTreeMap<GridCell, Occupant>;

/// One recorded point of a game.
///
/// Snapshots are only created from validated data and never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    occupancy: BoardOccupancy,
    /// Indexed by `Side as usize`.
    players: [PlayerState; 2],
    next_player_name: String,
}

impl Snapshot {
    /// The empty board shown before any game data arrived. It is nobody's turn.
    pub fn initial() -> Self {
        Self {
            occupancy: BoardOccupancy::new(),
            players: [
                PlayerState::initial("Player 1", PlayerId::from("1")),
                PlayerState::initial("Player 2", PlayerId::from("2")),
            ],
            next_player_name: String::new(),
        }
    }

    /// Validates a raw record, after removing one level of string encoding.
    pub fn from_json(payload: Value) -> Result<Self, FormatError> {
        let record: RawRecord = serde_json::from_value(unwrap_payload(payload)?)?;
        Snapshot::try_from(record)
    }

    pub fn occupancy(&self) -> &BoardOccupancy {
        &self.occupancy
    }

    pub fn player(&self, side: Side) -> &PlayerState {
        &self.players[side as usize]
    }

    pub fn players(&self) -> impl Iterator<Item = (Side, &PlayerState)> {
        Side::ALL.into_iter().zip(self.players.iter())
    }

    pub fn next_player_name(&self) -> &str {
        &self.next_player_name
    }

    pub fn is_turn_of(&self, name: &str) -> bool {
        !name.is_empty() && self.next_player_name == name
    }

    pub fn player_by_id(&self, id: &PlayerId) -> Option<(Side, &PlayerState)> {
        self.players().find(|(_, player)| &player.id == id)
    }
}

impl TryFrom<RawRecord> for Snapshot {
    type Error = FormatError;

    fn try_from(record: RawRecord) -> Result<Self, Self::Error> {
        let mut occupancy = BoardOccupancy::new();
        for (key, raw) in record.rep.env {
            let cell: GridCell = key
                .parse()
                .map_err(|err| FormatError::InvalidCellKey { key, err })?;
            if !cell.is_playable() {
                return Err(FormatError::CellOffBoard(cell));
            }
            let piece: Piece =
                raw.piece_type
                    .parse()
                    .map_err(|err| FormatError::InvalidPieceType {
                        piece_type: raw.piece_type.clone(),
                        err,
                    })?;
            occupancy.insert(
                cell,
                Occupant {
                    piece,
                    owner: raw.owner_id,
                },
            );
        }

        // The authority lists players, scores and inventories separately,
        // keyed by id. Regroup them by the side each player plays.
        let mut players: [Option<PlayerState>; 2] = [None, None];
        for raw in record.players {
            let side: Side = raw
                .piece_type
                .parse()
                .map_err(|_| FormatError::InvalidSide {
                    piece_type: raw.piece_type.clone(),
                })?;
            let id_key = raw.id.as_str();
            let score = *record
                .scores
                .get(id_key)
                .ok_or_else(|| FormatError::MissingScore {
                    player_id: String::from(id_key),
                })?;
            let raw_counts = record.players_pieces_left.get(id_key).ok_or_else(|| {
                FormatError::MissingPieceCounts {
                    player_id: String::from(id_key),
                }
            })?;
            let pieces_left = piece_counts(id_key, raw_counts)?;

            let slot = &mut players[side as usize];
            if slot.is_some() {
                return Err(FormatError::DuplicateSide(side));
            }
            *slot = Some(PlayerState {
                name: raw.name,
                score,
                id: raw.id,
                pieces_left,
            });
        }
        let [white, black] = players;
        let white = white.ok_or(FormatError::MissingSide(Side::White))?;
        let black = black.ok_or(FormatError::MissingSide(Side::Black))?;

        Ok(Snapshot {
            occupancy,
            players: [white, black],
            next_player_name: record.next_player.name,
        })
    }
}

fn piece_counts(
    player_id: &str,
    raw: &BTreeMap<String, u8>,
) -> Result<BTreeMap<PieceKind, u8>, FormatError> {
    let mut counts = BTreeMap::new();
    for (key, &count) in raw {
        let kind: PieceKind = key
            .parse()
            .map_err(|_| FormatError::InvalidPieceCountKey {
                player_id: String::from(player_id),
                key: key.clone(),
            })?;
        counts.insert(kind, count);
    }
    if let Some(missing) = PieceKind::ALL.iter().find(|kind| !counts.contains_key(kind)) {
        return Err(FormatError::MissingPieceCount {
            player_id: String::from(player_id),
            kind: missing.to_string(),
        });
    }
    Ok(counts)
}
