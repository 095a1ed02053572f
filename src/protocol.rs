//! Wire-compatible protocol types for the SpyWord game server.
//!
//! Every frame is a JSON text message carrying one named event:
//!
//! ```json
//! {"event": "timerTick", "data": {"remainingSeconds": 12}}
//! ```
//!
//! Event names and payload fields are `camelCase` to match the server.
//! [`ServerMessage`] is a closed set: a frame whose event name is unknown, or
//! whose payload is missing a required field, fails to decode and is dropped
//! by the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Type aliases ────────────────────────────────────────────────────

/// Connection-scoped identifier the server assigns to each player.
pub type PlayerId = String;

/// Short human-shareable room code (e.g. `"AB12"`).
pub type RoomId = String;

/// Role label the server uses for the player who does not know the word.
pub const IMPOSTER_ROLE: &str = "IMPOSTER";

/// Suspect id meaning "abstain" in a [`ClientMessage::Vote`].
pub const SKIP_SENTINEL: &str = "SKIP";

// ── Enums ───────────────────────────────────────────────────────────

/// Top-level UI phase of a client session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Choosing a name and avatar; not in a room yet.
    #[default]
    Login,
    /// Waiting in a room for the host to start.
    Lobby,
    /// Players take turns describing the secret word.
    Playing,
    /// Players vote on who the imposter is.
    Voting,
    /// The game is over; identities are revealed.
    Ended,
}

impl Phase {
    /// Returns the wire name of this phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::Lobby => "LOBBY",
            Self::Playing => "PLAYING",
            Self::Voting => "VOTING",
            Self::Ended => "ENDED",
        }
    }

    /// `true` for the two in-game phases (turns and voting).
    pub fn in_game(&self) -> bool {
        matches!(self, Self::Playing | Self::Voting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Room state as reported in a [`RoomSnapshot`].
///
/// Values this client does not know are carried as [`GameState::Other`]
/// rather than failing the whole snapshot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    #[default]
    Lobby,
    Playing,
    Voting,
    Ended,
    #[serde(other)]
    Other,
}

/// Target of a vote: a suspected player, or an abstention.
///
/// Serialized as a bare string; abstention is the literal `"SKIP"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Ballot {
    /// Vote to eliminate the given player.
    Suspect(PlayerId),
    /// Abstain from this round's vote.
    Skip,
}

impl From<String> for Ballot {
    fn from(value: String) -> Self {
        if value == SKIP_SENTINEL {
            Self::Skip
        } else {
            Self::Suspect(value)
        }
    }
}

impl From<Ballot> for String {
    fn from(value: Ballot) -> Self {
        match value {
            Ballot::Suspect(id) => id,
            Ballot::Skip => SKIP_SENTINEL.to_string(),
        }
    }
}

// ── Structs ─────────────────────────────────────────────────────────

/// A player as listed in a room snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub avatar: String,
    pub is_alive: bool,
    /// Revealed only once the game is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Revealed only once the game is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

/// Authoritative room state pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    #[serde(rename = "host")]
    pub host_id: PlayerId,
    pub game_state: GameState,
    pub players: Vec<Player>,
}

impl RoomSnapshot {
    /// Looks up a player by id.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// Partial player record sent with `gameOver`.
///
/// Only `id` is required; every other field present overwrites the matching
/// field of the roster entry with the same id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedPlayer {
    pub id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_alive: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

impl RevealedPlayer {
    /// Builds a full [`Player`] when the id is not yet on the roster.
    pub fn into_player(self) -> Player {
        Player {
            id: self.id,
            username: self.username.unwrap_or_default(),
            avatar: self.avatar.unwrap_or_default(),
            is_alive: self.is_alive.unwrap_or(false),
            role: self.role,
            word: self.word,
        }
    }

    /// Overwrites the fields of `player` that this record carries.
    pub fn merge_into(self, player: &mut Player) {
        if let Some(username) = self.username {
            player.username = username;
        }
        if let Some(avatar) = self.avatar {
            player.avatar = avatar;
        }
        if let Some(is_alive) = self.is_alive {
            player.is_alive = is_alive;
        }
        if self.role.is_some() {
            player.role = self.role;
        }
        if self.word.is_some() {
            player.word = self.word;
        }
    }
}

// ── Messages ────────────────────────────────────────────────────────

/// Intents sent from the client to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Open a new room with this player as host.
    CreateRoom { username: String, avatar: String },
    /// Join an existing room by code.
    JoinRoom {
        room_id: RoomId,
        username: String,
        avatar: String,
    },
    /// Host only: deal roles and begin the first round.
    StartGame { room_id: RoomId },
    /// Describe the secret word on this player's turn.
    SubmitWord { room_id: RoomId, word: String },
    /// Cast this round's vote.
    Vote { room_id: RoomId, suspect_id: Ballot },
}

impl ClientMessage {
    /// Returns the wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::StartGame { .. } => "startGame",
            Self::SubmitWord { .. } => "submitWord",
            Self::Vote { .. } => "vote",
        }
    }
}

/// Events pushed from the server to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    /// Full room snapshot; replaces the previous one.
    UpdateRoom(RoomSnapshot),
    /// The server rejected the last action.
    Error { message: String },
    /// Roles are dealt. The imposter may receive no word.
    GameStarted {
        role: String,
        #[serde(default)]
        word: Option<String>,
        #[serde(default)]
        category: Option<String>,
    },
    /// It is now this player's turn to describe the word.
    TurnUpdate { current_player_id: PlayerId },
    /// Another player acted; only `WORD` actions are shown.
    PlayerAction {
        username: String,
        action: String,
        payload: String,
    },
    /// The game moved to a new phase.
    PhaseChange { phase_name: Phase },
    /// Seconds remaining in the current timed phase.
    TimerTick { remaining_seconds: i32 },
    /// Acknowledges `createRoom`.
    RoomCreated { room_id: RoomId },
    /// Running vote tally for this round.
    VoteUpdate { votes_cast: u32, total: u32 },
    /// Outcome of a vote.
    RoundResult {
        message: String,
        #[serde(default)]
        role: Option<String>,
    },
    /// The game is over.
    GameOver {
        winner: String,
        #[serde(default)]
        players: Option<Vec<RevealedPlayer>>,
    },
}

impl ServerMessage {
    /// Returns the wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UpdateRoom(_) => "updateRoom",
            Self::Error { .. } => "error",
            Self::GameStarted { .. } => "gameStarted",
            Self::TurnUpdate { .. } => "turnUpdate",
            Self::PlayerAction { .. } => "playerAction",
            Self::PhaseChange { .. } => "phaseChange",
            Self::TimerTick { .. } => "timerTick",
            Self::RoomCreated { .. } => "roomCreated",
            Self::VoteUpdate { .. } => "voteUpdate",
            Self::RoundResult { .. } => "roundResult",
            Self::GameOver { .. } => "gameOver",
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn ballot_skip_uses_sentinel() {
        let json = serde_json::to_string(&Ballot::Skip).unwrap();
        assert_eq!(json, "\"SKIP\"");
        let back: Ballot = serde_json::from_str("\"SKIP\"").unwrap();
        assert_eq!(back, Ballot::Skip);
    }

    #[test]
    fn unknown_game_state_is_tolerated() {
        let state: GameState = serde_json::from_str("\"PAUSED\"").unwrap();
        assert_eq!(state, GameState::Other);
    }

    #[test]
    fn phase_display_matches_wire_name() {
        for phase in [
            Phase::Login,
            Phase::Lobby,
            Phase::Playing,
            Phase::Voting,
            Phase::Ended,
        ] {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{phase}\""));
        }
    }

    #[test]
    fn message_names_match_serialized_tag() {
        let msg = ServerMessage::TimerTick {
            remaining_seconds: 3,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["event"], msg.name());
    }

    #[test]
    fn revealed_player_merges_only_present_fields() {
        let mut player = Player {
            id: "p1".into(),
            username: "Ana".into(),
            avatar: "🐺".into(),
            is_alive: true,
            role: None,
            word: None,
        };
        RevealedPlayer {
            id: "p1".into(),
            role: Some("IMPOSTER".into()),
            ..Default::default()
        }
        .merge_into(&mut player);
        assert_eq!(player.username, "Ana");
        assert!(player.is_alive);
        assert_eq!(player.role.as_deref(), Some("IMPOSTER"));
        assert!(player.word.is_none());
    }
}
