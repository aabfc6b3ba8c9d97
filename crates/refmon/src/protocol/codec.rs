//! Fixed-layout binary codec for the status and ack records.
//!
//! Both records have a fixed total byte length with no padding and no length
//! prefixes. Decode consumes exactly that many bytes or rejects the buffer
//! outright; there is no partial decode. Multi-byte integers are
//! little-endian.

use super::{
    ACK_MAGIC, ACK_SIZE, ACK_VERSION, AckRecord, COACH_MESSAGE_SIZE, GamePhase, MAX_PLAYERS,
    PlayerInfo, STATUS_MAGIC, STATUS_SIZE, STATUS_VERSION, SecondaryPhase, StatusRecord, TeamColor,
    TeamInfo,
};

/// Reasons a datagram is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Buffer length differs from the fixed record size. Nothing was read.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Magic header or protocol version did not match. Usually means the
    /// sender speaks an incompatible protocol generation; callers log this
    /// distinctly and keep listening.
    #[error("bad magic or protocol version")]
    BadMagicOrVersion,
}

/// Cursor over an exact-size buffer. The size check in `decode` guarantees
/// every read below stays in bounds.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> u8 {
        let v = self.buf[self.pos];
        self.pos += 1;
        v
    }

    fn u16_le(&mut self) -> u16 {
        let v = u16::from_le_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        v
    }

    fn bytes<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }
}

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> Writer<'a> {
    fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    fn u16_le(&mut self, v: u16) {
        self.buf[self.pos..self.pos + 2].copy_from_slice(&v.to_le_bytes());
        self.pos += 2;
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf[self.pos..self.pos + v.len()].copy_from_slice(v);
        self.pos += v.len();
    }
}

impl StatusRecord {
    /// Decode a status record from one datagram payload.
    ///
    /// The buffer length must equal [`STATUS_SIZE`] exactly.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != STATUS_SIZE {
            return Err(DecodeError::SizeMismatch {
                expected: STATUS_SIZE,
                actual: buf.len(),
            });
        }

        let mut r = Reader::new(buf);
        let magic: [u8; 4] = r.bytes();
        let version = r.u8();
        if magic != STATUS_MAGIC || version != STATUS_VERSION {
            return Err(DecodeError::BadMagicOrVersion);
        }

        let packet_number = r.u8();
        let players_per_team = r.u8();
        let state = GamePhase::from_raw(r.u8());
        let first_half = r.u8();
        let kickoff_team = r.u8();
        let secondary_state = SecondaryPhase::from_raw(r.u8());
        let drop_in_team = r.u8();
        let drop_in_time = r.u16_le();
        let seconds_remaining = r.u16_le();
        let secondary_seconds_remaining = r.u16_le();
        let teams = [decode_team(&mut r), decode_team(&mut r)];
        debug_assert_eq!(r.pos, STATUS_SIZE);

        Ok(Self {
            packet_number,
            players_per_team,
            state,
            first_half,
            kickoff_team,
            secondary_state,
            drop_in_team,
            drop_in_time,
            seconds_remaining,
            secondary_seconds_remaining,
            teams,
        })
    }

    /// Encode into an exact-size buffer, the inverse of [`StatusRecord::decode`].
    pub fn encode(&self) -> [u8; STATUS_SIZE] {
        let mut buf = [0u8; STATUS_SIZE];
        let mut w = Writer::new(&mut buf);
        w.bytes(&STATUS_MAGIC);
        w.u8(STATUS_VERSION);
        w.u8(self.packet_number);
        w.u8(self.players_per_team);
        w.u8(self.state.raw());
        w.u8(self.first_half);
        w.u8(self.kickoff_team);
        w.u8(self.secondary_state.raw());
        w.u8(self.drop_in_team);
        w.u16_le(self.drop_in_time);
        w.u16_le(self.seconds_remaining);
        w.u16_le(self.secondary_seconds_remaining);
        for team in &self.teams {
            encode_team(&mut w, team);
        }
        debug_assert_eq!(w.pos, STATUS_SIZE);
        buf
    }
}

fn decode_team(r: &mut Reader<'_>) -> TeamInfo {
    let team_number = r.u8();
    let color = TeamColor::from_raw(r.u8());
    let score = r.u8();
    let penalty_shots = r.u8();
    let single_shots = r.u16_le();
    let coach_message: [u8; COACH_MESSAGE_SIZE] = r.bytes();
    let mut players = [PlayerInfo::default(); MAX_PLAYERS];
    for player in &mut players {
        player.penalty = r.u8();
        player.secs_till_unpenalized = r.u8();
    }
    TeamInfo {
        team_number,
        color,
        score,
        penalty_shots,
        single_shots,
        coach_message,
        players,
    }
}

fn encode_team(w: &mut Writer<'_>, team: &TeamInfo) {
    w.u8(team.team_number);
    w.u8(team.color.raw());
    w.u8(team.score);
    w.u8(team.penalty_shots);
    w.u16_le(team.single_shots);
    w.bytes(&team.coach_message);
    for player in &team.players {
        w.u8(player.penalty);
        w.u8(player.secs_till_unpenalized);
    }
}

impl AckRecord {
    /// Encode into the 8-byte keepalive payload.
    pub fn encode(&self) -> [u8; ACK_SIZE] {
        let mut buf = [0u8; ACK_SIZE];
        let mut w = Writer::new(&mut buf);
        w.bytes(&ACK_MAGIC);
        w.u8(ACK_VERSION);
        w.u8(self.team);
        w.u8(self.player);
        w.u8(self.message);
        buf
    }

    /// Decode an ack record, same exact-size contract as the status record.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        if buf.len() != ACK_SIZE {
            return Err(DecodeError::SizeMismatch {
                expected: ACK_SIZE,
                actual: buf.len(),
            });
        }

        let mut r = Reader::new(buf);
        let magic: [u8; 4] = r.bytes();
        let version = r.u8();
        if magic != ACK_MAGIC || version != ACK_VERSION {
            return Err(DecodeError::BadMagicOrVersion);
        }

        Ok(Self {
            team: r.u8(),
            player: r.u8(),
            message: r.u8(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> StatusRecord {
        let mut record = StatusRecord {
            packet_number: 42,
            players_per_team: 4,
            state: GamePhase::Playing,
            first_half: 1,
            kickoff_team: 1,
            secondary_state: SecondaryPhase::Overtime,
            drop_in_team: 0,
            drop_in_time: 77,
            seconds_remaining: 600,
            secondary_seconds_remaining: 30,
            ..StatusRecord::default()
        };
        record.teams[0] = TeamInfo {
            team_number: 7,
            color: TeamColor::Blue,
            score: 3,
            penalty_shots: 2,
            single_shots: 0b101,
            ..TeamInfo::default()
        };
        record.teams[1].team_number = 9;
        record.teams[1].color = TeamColor::Red;
        record.teams[1].players[10].penalty = 15;
        record.teams[1].players[10].secs_till_unpenalized = 30;
        record
    }

    #[test]
    fn status_roundtrip() {
        let record = sample_record();
        let wire = record.encode();
        assert_eq!(wire.len(), STATUS_SIZE);
        let decoded = StatusRecord::decode(&wire).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn ack_roundtrip() {
        let ack = AckRecord {
            team: 7,
            player: 3,
            message: 2,
        };
        let wire = ack.encode();
        assert_eq!(wire.len(), ACK_SIZE);
        assert_eq!(AckRecord::decode(&wire).unwrap(), ack);
    }

    #[test]
    fn status_rejects_wrong_length() {
        let wire = sample_record().encode();

        for len in [0, 1, STATUS_SIZE - 1] {
            assert_eq!(
                StatusRecord::decode(&wire[..len]),
                Err(DecodeError::SizeMismatch {
                    expected: STATUS_SIZE,
                    actual: len,
                })
            );
        }

        let mut long = wire.to_vec();
        long.push(0);
        assert_eq!(
            StatusRecord::decode(&long),
            Err(DecodeError::SizeMismatch {
                expected: STATUS_SIZE,
                actual: STATUS_SIZE + 1,
            })
        );
    }

    #[test]
    fn status_rejects_bad_magic() {
        let mut wire = sample_record().encode();
        wire[0] = b'X';
        assert_eq!(
            StatusRecord::decode(&wire),
            Err(DecodeError::BadMagicOrVersion)
        );
    }

    #[test]
    fn status_rejects_bad_version() {
        let mut wire = sample_record().encode();
        wire[4] = STATUS_VERSION + 1;
        assert_eq!(
            StatusRecord::decode(&wire),
            Err(DecodeError::BadMagicOrVersion)
        );
    }

    #[test]
    fn unknown_enum_bytes_decode() {
        let mut wire = sample_record().encode();
        wire[7] = 200; // primary state
        wire[10] = 9; // secondary state
        wire[19] = 4; // team 0 color

        let decoded = StatusRecord::decode(&wire).unwrap();
        assert_eq!(decoded.state, GamePhase::Unknown(200));
        assert_eq!(decoded.secondary_state, SecondaryPhase::Unknown(9));
        assert_eq!(decoded.teams[0].color, TeamColor::Unknown(4));
    }

    #[test]
    fn multibyte_fields_are_little_endian() {
        let record = StatusRecord {
            seconds_remaining: 0x1234,
            ..StatusRecord::default()
        };
        let wire = record.encode();
        assert_eq!(wire[14], 0x34);
        assert_eq!(wire[15], 0x12);
    }

    #[test]
    fn ack_rejects_wrong_length_and_magic() {
        assert_eq!(
            AckRecord::decode(&[0u8; 7]),
            Err(DecodeError::SizeMismatch {
                expected: ACK_SIZE,
                actual: 7,
            })
        );

        let mut wire = AckRecord {
            team: 1,
            player: 1,
            message: 0,
        }
        .encode();
        wire[4] = ACK_VERSION + 1;
        assert_eq!(AckRecord::decode(&wire), Err(DecodeError::BadMagicOrVersion));
    }
}
