//! Wire protocol types for game-controller communication.
//!
//! Two fixed-layout records travel over UDP:
//! - **Status record** (controller → robot): full game state, 154 bytes
//! - **Ack record** (robot → controller): keepalive reply, 8 bytes
//!
//! All multi-byte integers are little-endian. Enum bytes outside the known
//! value set decode to `Unknown(raw)` so a newer controller generation does
//! not abort the packet.

pub mod codec;

pub use codec::DecodeError;

/// 4-byte ASCII magic opening every status record.
pub const STATUS_MAGIC: [u8; 4] = *b"RGme";

/// Protocol generation this codec understands. A different byte is a hard
/// decode failure, not a warning.
pub const STATUS_VERSION: u8 = 8;

/// Exact wire size of a status record. Decode rejects any other length.
pub const STATUS_SIZE: usize = 154;

/// 4-byte ASCII magic opening every ack record.
pub const ACK_MAGIC: [u8; 4] = *b"RGrt";

/// Protocol generation of the ack record.
pub const ACK_VERSION: u8 = 2;

/// Exact wire size of an ack record.
pub const ACK_SIZE: usize = 8;

/// Players carried per team block, whether or not they are on the field.
pub const MAX_PLAYERS: usize = 11;

/// Opaque coach-message buffer length inside each team block.
pub const COACH_MESSAGE_SIZE: usize = 40;

/// Top-level game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GamePhase {
    Initial,
    Ready,
    Set,
    Playing,
    Finished,
    /// Forward-compatible fallback: the wire byte was outside the known set.
    Unknown(u8),
}

impl GamePhase {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => GamePhase::Initial,
            1 => GamePhase::Ready,
            2 => GamePhase::Set,
            3 => GamePhase::Playing,
            4 => GamePhase::Finished,
            other => GamePhase::Unknown(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            GamePhase::Initial => 0,
            GamePhase::Ready => 1,
            GamePhase::Set => 2,
            GamePhase::Playing => 3,
            GamePhase::Finished => 4,
            GamePhase::Unknown(raw) => raw,
        }
    }
}

impl std::fmt::Display for GamePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GamePhase::Initial => write!(f, "INITIAL"),
            GamePhase::Ready => write!(f, "READY"),
            GamePhase::Set => write!(f, "SET"),
            GamePhase::Playing => write!(f, "PLAYING"),
            GamePhase::Finished => write!(f, "FINISHED"),
            GamePhase::Unknown(raw) => write!(f, "UNKNOWN({raw})"),
        }
    }
}

/// Orthogonal in-phase modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondaryPhase {
    Normal,
    PenaltyShootout,
    Overtime,
    Timeout,
    Unknown(u8),
}

impl SecondaryPhase {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => SecondaryPhase::Normal,
            1 => SecondaryPhase::PenaltyShootout,
            2 => SecondaryPhase::Overtime,
            3 => SecondaryPhase::Timeout,
            other => SecondaryPhase::Unknown(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            SecondaryPhase::Normal => 0,
            SecondaryPhase::PenaltyShootout => 1,
            SecondaryPhase::Overtime => 2,
            SecondaryPhase::Timeout => 3,
            SecondaryPhase::Unknown(raw) => raw,
        }
    }
}

/// Jersey color of a team block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeamColor {
    Blue,
    Red,
    Unknown(u8),
}

impl TeamColor {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => TeamColor::Blue,
            1 => TeamColor::Red,
            other => TeamColor::Unknown(other),
        }
    }

    pub fn raw(self) -> u8 {
        match self {
            TeamColor::Blue => 0,
            TeamColor::Red => 1,
            TeamColor::Unknown(raw) => raw,
        }
    }
}

/// Per-player penalty info inside a team block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayerInfo {
    pub penalty: u8,
    pub secs_till_unpenalized: u8,
}

/// One of the two fixed team blocks in a status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeamInfo {
    pub team_number: u8,
    pub color: TeamColor,
    pub score: u8,
    /// Penalty-shot attempt counter.
    pub penalty_shots: u8,
    /// Bitmask of penalty-shot successes, LSB first.
    pub single_shots: u16,
    pub coach_message: [u8; COACH_MESSAGE_SIZE],
    pub players: [PlayerInfo; MAX_PLAYERS],
}

impl Default for TeamInfo {
    fn default() -> Self {
        Self {
            team_number: 0,
            color: TeamColor::Blue,
            score: 0,
            penalty_shots: 0,
            single_shots: 0,
            coach_message: [0; COACH_MESSAGE_SIZE],
            players: [PlayerInfo::default(); MAX_PLAYERS],
        }
    }
}

/// Decoded status packet. Magic and version are validated at decode and not
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRecord {
    pub packet_number: u8,
    pub players_per_team: u8,
    pub state: GamePhase,
    pub first_half: u8,
    pub kickoff_team: u8,
    pub secondary_state: SecondaryPhase,
    pub drop_in_team: u8,
    pub drop_in_time: u16,
    pub seconds_remaining: u16,
    pub secondary_seconds_remaining: u16,
    pub teams: [TeamInfo; 2],
}

impl Default for StatusRecord {
    fn default() -> Self {
        Self {
            packet_number: 0,
            players_per_team: 0,
            state: GamePhase::Initial,
            first_half: 1,
            kickoff_team: 0,
            secondary_state: SecondaryPhase::Normal,
            drop_in_team: 0,
            drop_in_time: 0,
            seconds_remaining: 0,
            secondary_seconds_remaining: 0,
            teams: [TeamInfo::default(); 2],
        }
    }
}

/// Keepalive reply sent back to the controller after every accepted packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckRecord {
    pub team: u8,
    pub player: u8,
    pub message: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_raw_roundtrip() {
        for raw in 0..=u8::MAX {
            assert_eq!(GamePhase::from_raw(raw).raw(), raw);
            assert_eq!(SecondaryPhase::from_raw(raw).raw(), raw);
            assert_eq!(TeamColor::from_raw(raw).raw(), raw);
        }
    }

    #[test]
    fn unknown_values_tagged() {
        assert_eq!(GamePhase::from_raw(9), GamePhase::Unknown(9));
        assert_eq!(SecondaryPhase::from_raw(200), SecondaryPhase::Unknown(200));
        assert_eq!(TeamColor::from_raw(5), TeamColor::Unknown(5));
    }

    #[test]
    fn phase_display_names() {
        assert_eq!(GamePhase::Playing.to_string(), "PLAYING");
        assert_eq!(GamePhase::Unknown(7).to_string(), "UNKNOWN(7)");
    }
}
