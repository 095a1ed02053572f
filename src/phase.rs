//! Phase state machine and session data.
//!
//! [`PhaseStateMachine`] owns everything the UI renders: the current
//! [`Phase`], the [`Session`] fields, the countdown, the vote guard, and the
//! game log. Server events go through [`apply`](PhaseStateMachine::apply);
//! local input goes through the setter and intent methods. Nothing else
//! mutates this state.
//!
//! Transitions:
//!
//! | From          | Event                      | To      |
//! |---------------|----------------------------|---------|
//! | LOGIN         | `roomCreated`              | LOBBY   |
//! | LOGIN / LOBBY | `updateRoom` (LOBBY state) | LOBBY   |
//! | LOBBY         | `gameStarted`              | PLAYING |
//! | not ENDED     | `phaseChange(p)`           | p       |
//! | not ENDED     | `gameOver`                 | ENDED   |
//!
//! ENDED is terminal; only [`reset`](PhaseStateMachine::reset) leaves it.

use tracing::debug;

use crate::error::ValidationError;
use crate::game_log::GameLog;
use crate::protocol::{
    Ballot, ClientMessage, GameState, Phase, Player, PlayerId, RevealedPlayer, RoomSnapshot,
    ServerMessage, IMPOSTER_ROLE,
};
use crate::sound::Cue;
use crate::timer::{TimerSync, TimerZone};
use crate::vote::VoteSession;

/// Avatars offered on the login screen.
pub const AVATARS: [&str; 20] = [
    "🐺", "🦊", "🐻", "🐼", "🐨", "🦁", "🐯", "🦝", "🦄", "🐸", "🦉", "🐙", "🦋", "🦖", "🧙", "🤖",
    "👽", "🧛", "🥷", "🐲",
];

/// Avatar selected before the player picks one.
pub const DEFAULT_AVATAR: &str = "🐺";

/// Longest room code the join field accepts.
pub const ROOM_CODE_MAX_LEN: usize = 6;

/// Only player actions with this tag are written to the log.
pub const WORD_ACTION: &str = "WORD";

/// Log line written when voting opens.
pub const VOTING_BANNER: &str = "🗳️ Voting phase! Who is the spy?";

/// Log line written when a new round of turns starts.
pub const NEW_ROUND_BANNER: &str = "🔄 New round starting...";

/// Per-client session fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub phase: Phase,
    /// Id the server knows this client by, when the transport reports it.
    pub self_id: Option<PlayerId>,
    /// Room code: the join field before joining, the current room after.
    pub room_id: String,
    pub username: String,
    pub avatar: String,
    pub my_role: Option<String>,
    pub my_word: Option<String>,
    pub my_category: Option<String>,
    pub turn_player_id: Option<PlayerId>,
    pub room: Option<RoomSnapshot>,
    /// Transient status line; last write wins.
    pub notification: Option<String>,
    /// Blocking notice from a server rejection, until dismissed.
    pub notice: Option<String>,
    pub word_revealed: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            phase: Phase::Login,
            self_id: None,
            room_id: String::new(),
            username: String::new(),
            avatar: DEFAULT_AVATAR.to_string(),
            my_role: None,
            my_word: None,
            my_category: None,
            turn_player_id: None,
            room: None,
            notification: None,
            notice: None,
            word_revealed: false,
        }
    }
}

/// What applying one server event did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    /// `false` when the event was ignored in the current phase.
    pub applied: bool,
    /// Sounds the transition asks for, in order.
    pub cues: Vec<Cue>,
}

impl Outcome {
    fn ignored() -> Self {
        Self::default()
    }

    fn applied() -> Self {
        Self {
            applied: true,
            cues: Vec::new(),
        }
    }

    fn with_cue(mut self, cue: Cue) -> Self {
        self.cues.push(cue);
        self
    }
}

/// Owns the current phase and all session state.
#[derive(Debug, Clone)]
pub struct PhaseStateMachine {
    session: Session,
    timer: TimerSync,
    votes: VoteSession,
    log: GameLog,
    min_players: usize,
}

impl PhaseStateMachine {
    /// Creates a machine in LOGIN.
    pub fn new(round_seconds: i32, min_players: usize) -> Self {
        Self {
            session: Session::default(),
            timer: TimerSync::new(round_seconds),
            votes: VoteSession::new(),
            log: GameLog::new(),
            min_players,
        }
    }

    // ── Server events ───────────────────────────────────────────────

    /// Applies one server event to completion.
    pub fn apply(&mut self, msg: ServerMessage) -> Outcome {
        if self.session.phase == Phase::Ended {
            debug!(event = msg.name(), "game over, event ignored");
            return Outcome::ignored();
        }

        match msg {
            ServerMessage::UpdateRoom(snapshot) => self.on_room_snapshot(snapshot),
            ServerMessage::Error { message } => {
                debug!(%message, "server rejected action");
                self.session.notice = Some(message);
                Outcome::applied()
            }
            ServerMessage::GameStarted {
                role,
                word,
                category,
            } => self.on_game_started(role, word, category),
            ServerMessage::TurnUpdate { current_player_id } => {
                let mine = self.is_self(&current_player_id)
                    && self.session.turn_player_id.as_deref() != Some(current_player_id.as_str());
                self.session.turn_player_id = Some(current_player_id);
                let outcome = Outcome::applied();
                if mine {
                    outcome.with_cue(Cue::YourTurn)
                } else {
                    outcome
                }
            }
            ServerMessage::PlayerAction {
                username,
                action,
                payload,
            } => {
                if action != WORD_ACTION {
                    return Outcome::ignored();
                }
                self.log.append(format!("{username}: \"{payload}\""));
                Outcome::applied()
            }
            ServerMessage::PhaseChange { phase_name } => self.on_phase_change(phase_name),
            ServerMessage::TimerTick { remaining_seconds } => {
                self.timer.tick(remaining_seconds);
                let outcome = Outcome::applied();
                if !self.session.phase.in_game() {
                    outcome
                } else if remaining_seconds > 0 {
                    outcome.with_cue(Cue::TimerTick {
                        seconds: remaining_seconds,
                    })
                } else {
                    outcome.with_cue(Cue::TimeUp)
                }
            }
            ServerMessage::RoomCreated { room_id } => {
                if self.session.phase != Phase::Login {
                    return Outcome::ignored();
                }
                self.session.room_id = room_id;
                self.enter(Phase::Lobby);
                Outcome::applied()
            }
            ServerMessage::VoteUpdate { votes_cast, total } => {
                self.votes.record_tally(votes_cast, total);
                self.session.notification = Some(format!("Votes: {votes_cast} / {total}"));
                Outcome::applied()
            }
            ServerMessage::RoundResult { message, role } => {
                let line = match &role {
                    Some(role) => format!("{message} · {role}"),
                    None => message.clone(),
                };
                self.log.append(line);
                self.session.notification = Some(message);
                let outcome = Outcome::applied();
                match role.as_deref() {
                    Some(IMPOSTER_ROLE) => outcome.with_cue(Cue::ImposterCaught),
                    Some(_) => outcome.with_cue(Cue::Eliminated),
                    None => outcome,
                }
            }
            ServerMessage::GameOver { winner, players } => self.on_game_over(winner, players),
        }
    }

    fn on_room_snapshot(&mut self, snapshot: RoomSnapshot) -> Outcome {
        let grew = self.session.room.as_ref().is_some_and(|prev| {
            prev.room_id == snapshot.room_id && snapshot.players.len() > prev.players.len()
        });
        let to_lobby = snapshot.game_state == GameState::Lobby
            && matches!(self.session.phase, Phase::Login | Phase::Lobby);

        // In LOGIN the room id is the user's join field until a room is entered.
        if to_lobby || self.session.phase != Phase::Login {
            self.session.room_id.clone_from(&snapshot.room_id);
        }
        self.session.room = Some(snapshot);
        if to_lobby {
            self.enter(Phase::Lobby);
        }

        let outcome = Outcome::applied();
        if grew && self.session.phase == Phase::Lobby {
            outcome.with_cue(Cue::PlayerJoined)
        } else {
            outcome
        }
    }

    fn on_game_started(
        &mut self,
        role: String,
        word: Option<String>,
        category: Option<String>,
    ) -> Outcome {
        if self.session.phase != Phase::Lobby {
            return Outcome::ignored();
        }
        self.log.reset();
        self.log.append(format!("🎮 Game started! You are a {role}"));
        self.session.my_role = Some(role);
        self.session.my_word = word;
        self.session.my_category = category;
        self.session.turn_player_id = None;
        self.enter(Phase::Playing);
        Outcome::applied().with_cue(Cue::GameStart)
    }

    fn on_phase_change(&mut self, phase: Phase) -> Outcome {
        // Any server-driven phase change closes the ballot and the countdown.
        self.votes.open_round();
        self.timer.reset();
        self.enter(phase);
        let outcome = Outcome::applied();
        match phase {
            Phase::Voting => {
                self.log.append(VOTING_BANNER);
                outcome.with_cue(Cue::Voting)
            }
            Phase::Playing => {
                self.log.append(NEW_ROUND_BANNER);
                outcome
            }
            _ => outcome,
        }
    }

    fn on_game_over(&mut self, winner: String, players: Option<Vec<RevealedPlayer>>) -> Outcome {
        if let Some(revealed) = players {
            let room = self.session.room.get_or_insert_with(|| RoomSnapshot {
                room_id: self.session.room_id.clone(),
                host_id: String::new(),
                game_state: GameState::Ended,
                players: Vec::new(),
            });
            for record in revealed {
                match room.players.iter_mut().find(|p| p.id == record.id) {
                    Some(player) => record.merge_into(player),
                    None => room.players.push(record.into_player()),
                }
            }
        }
        let cue = if winner.to_lowercase().contains("citizen") {
            Cue::CitizensWin
        } else {
            Cue::ImposterWins
        };
        self.session.notification = Some(format!("🏆 Winner: {winner}"));
        self.enter(Phase::Ended);
        Outcome::applied().with_cue(cue)
    }

    /// Sets the phase and runs its entry effects.
    fn enter(&mut self, phase: Phase) {
        let from = self.session.phase;
        self.session.phase = phase;
        match phase {
            Phase::Playing => {
                self.votes.open_round();
                self.timer.reset();
                self.session.word_revealed = false;
            }
            Phase::Voting => {
                self.votes.open_round();
                self.timer.reset();
            }
            _ => {}
        }
        debug!(%from, to = %phase, "phase entered");
    }

    // ── Local input ─────────────────────────────────────────────────

    pub fn set_self_id(&mut self, id: Option<PlayerId>) {
        self.session.self_id = id;
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.session.username = username.into();
    }

    pub fn set_avatar(&mut self, avatar: impl Into<String>) {
        self.session.avatar = avatar.into();
    }

    /// Sets the join field, upper-cased and cut to the maximum code length.
    ///
    /// The field only exists on the login screen. Once in a room,
    /// `room_id` is the server's code and the call returns `false`.
    pub fn set_room_code(&mut self, code: &str) -> bool {
        if self.session.phase != Phase::Login {
            return false;
        }
        self.session.room_id = code.to_uppercase().chars().take(ROOM_CODE_MAX_LEN).collect();
        true
    }

    /// Uncovers the secret word. Returns `false` outside a game.
    pub fn reveal_word(&mut self) -> bool {
        if !self.session.phase.in_game() {
            return false;
        }
        self.session.word_revealed = true;
        true
    }

    pub fn dismiss_notice(&mut self) {
        self.session.notice = None;
    }

    /// Returns every field to its initial value, as a page reload would.
    ///
    /// The connection id is kept; it belongs to the transport.
    pub fn reset(&mut self) {
        let self_id = self.session.self_id.take();
        self.session = Session {
            self_id,
            ..Session::default()
        };
        self.timer.reset();
        self.votes = VoteSession::new();
        self.log = GameLog::new();
        debug!("session reset");
    }

    // ── Intents ─────────────────────────────────────────────────────

    /// Builds `createRoom`, or says why it cannot be sent.
    pub fn create_room_intent(&self) -> Result<ClientMessage, ValidationError> {
        self.require_phase(Phase::Login)?;
        let username = self.require_username()?;
        Ok(ClientMessage::CreateRoom {
            username,
            avatar: self.session.avatar.clone(),
        })
    }

    /// Builds `joinRoom` from the join field.
    pub fn join_room_intent(&self) -> Result<ClientMessage, ValidationError> {
        self.require_phase(Phase::Login)?;
        let username = self.require_username()?;
        if self.session.room_id.trim().is_empty() {
            return Err(ValidationError::MissingRoomCode);
        }
        Ok(ClientMessage::JoinRoom {
            room_id: self.session.room_id.clone(),
            username,
            avatar: self.session.avatar.clone(),
        })
    }

    /// Builds `startGame` if this client is the host of a full enough room.
    pub fn start_game_intent(&self) -> Result<ClientMessage, ValidationError> {
        self.require_phase(Phase::Lobby)?;
        let room = self.session.room.as_ref().ok_or(ValidationError::NotInRoom)?;
        if self.session.self_id.is_some() && !self.is_host() {
            return Err(ValidationError::NotHost);
        }
        if room.players.len() < self.min_players {
            return Err(ValidationError::NotEnoughPlayers {
                have: room.players.len(),
                need: self.min_players,
            });
        }
        Ok(ClientMessage::StartGame {
            room_id: room.room_id.clone(),
        })
    }

    /// Builds `submitWord` for this client's turn.
    pub fn submit_word_intent(&self, word: &str) -> Result<ClientMessage, ValidationError> {
        self.require_phase(Phase::Playing)?;
        let word = word.trim();
        if word.is_empty() {
            return Err(ValidationError::EmptyWord);
        }
        if self.session.self_id.is_some() && !self.is_my_turn() {
            return Err(ValidationError::NotYourTurn);
        }
        Ok(ClientMessage::SubmitWord {
            room_id: self.require_room_id()?,
            word: word.to_string(),
        })
    }

    /// Consumes this round's vote against `target`.
    ///
    /// Returns `None` outside voting or when the vote was already cast.
    pub fn cast_vote(&mut self, target: impl Into<PlayerId>) -> Option<ClientMessage> {
        if self.session.phase != Phase::Voting {
            return None;
        }
        let ballot = self.votes.cast_vote(target)?;
        Some(self.vote_message(ballot))
    }

    /// Consumes this round's vote as an abstention.
    pub fn cast_skip(&mut self) -> Option<ClientMessage> {
        if self.session.phase != Phase::Voting {
            return None;
        }
        let ballot = self.votes.cast_skip()?;
        Some(self.vote_message(ballot))
    }

    fn vote_message(&self, suspect_id: Ballot) -> ClientMessage {
        ClientMessage::Vote {
            room_id: self.session.room_id.clone(),
            suspect_id,
        }
    }

    fn require_phase(&self, phase: Phase) -> Result<(), ValidationError> {
        if self.session.phase == phase {
            Ok(())
        } else {
            Err(ValidationError::WrongPhase(self.session.phase))
        }
    }

    fn require_username(&self) -> Result<String, ValidationError> {
        if self.session.username.trim().is_empty() {
            Err(ValidationError::MissingUsername)
        } else {
            Ok(self.session.username.clone())
        }
    }

    fn require_room_id(&self) -> Result<String, ValidationError> {
        if self.session.room_id.is_empty() {
            Err(ValidationError::NotInRoom)
        } else {
            Ok(self.session.room_id.clone())
        }
    }

    // ── Views ───────────────────────────────────────────────────────

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn has_voted(&self) -> bool {
        self.votes.has_voted()
    }

    pub fn votes(&self) -> &VoteSession {
        &self.votes
    }

    pub fn turn_timer_remaining(&self) -> i32 {
        self.timer.remaining()
    }

    pub fn timer_zone(&self) -> TimerZone {
        self.timer.zone()
    }

    pub fn timer(&self) -> &TimerSync {
        &self.timer
    }

    pub fn log(&self) -> &GameLog {
        &self.log
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    fn is_self(&self, id: &str) -> bool {
        self.session.self_id.as_deref() == Some(id)
    }

    pub fn is_host(&self) -> bool {
        self.session
            .room
            .as_ref()
            .is_some_and(|room| self.is_self(&room.host_id))
    }

    pub fn is_my_turn(&self) -> bool {
        self.session
            .turn_player_id
            .as_deref()
            .is_some_and(|id| self.is_self(id))
    }

    /// `true` when the start button should be offered.
    pub fn can_start(&self) -> bool {
        self.start_game_intent().is_ok() && self.is_host()
    }

    /// The player whose turn it is, if listed in the room.
    pub fn turn_player(&self) -> Option<&Player> {
        let id = self.session.turn_player_id.as_deref()?;
        self.session.room.as_ref()?.player(id)
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players().filter(|p| p.is_alive)
    }

    /// Players this client may vote against: alive and not itself.
    pub fn vote_candidates(&self) -> impl Iterator<Item = &Player> {
        self.alive_players().filter(|p| !self.is_self(&p.id))
    }

    fn players(&self) -> impl Iterator<Item = &Player> {
        self.session
            .room
            .iter()
            .flat_map(|room| room.players.iter())
    }

    /// Header line shown outside the login screen, e.g. `Room AB12 · 🐺 Ana`.
    pub fn room_badge(&self) -> Option<String> {
        if self.session.phase == Phase::Login {
            return None;
        }
        Some(format!(
            "Room {} · {} {}",
            self.session.room_id, self.session.avatar, self.session.username
        ))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn player(id: &str, name: &str) -> Player {
        Player {
            id: id.into(),
            username: name.into(),
            avatar: "🦊".into(),
            is_alive: true,
            role: None,
            word: None,
        }
    }

    fn snapshot(state: GameState, ids: &[&str]) -> RoomSnapshot {
        RoomSnapshot {
            room_id: "AB12".into(),
            host_id: "s1".into(),
            game_state: state,
            players: ids.iter().map(|id| player(id, id)).collect(),
        }
    }

    fn in_lobby() -> PhaseStateMachine {
        let mut m = PhaseStateMachine::new(30, 3);
        m.set_self_id(Some("s1".into()));
        m.apply(ServerMessage::UpdateRoom(snapshot(
            GameState::Lobby,
            &["s1", "s2", "s3"],
        )));
        m
    }

    fn playing() -> PhaseStateMachine {
        let mut m = in_lobby();
        m.apply(ServerMessage::GameStarted {
            role: "CITIZEN".into(),
            word: Some("Banana".into()),
            category: Some("Fruits".into()),
        });
        m
    }

    fn phase_change(phase: Phase) -> ServerMessage {
        ServerMessage::PhaseChange { phase_name: phase }
    }

    #[test]
    fn starts_in_login_with_default_avatar() {
        let m = PhaseStateMachine::new(30, 3);
        assert_eq!(m.phase(), Phase::Login);
        assert_eq!(m.session().avatar, DEFAULT_AVATAR);
        assert_eq!(m.turn_timer_remaining(), 30);
        assert!(m.room_badge().is_none());
    }

    #[test]
    fn room_created_only_applies_in_login() {
        let mut m = PhaseStateMachine::new(30, 3);
        let out = m.apply(ServerMessage::RoomCreated {
            room_id: "AB12".into(),
        });
        assert!(out.applied);
        assert_eq!(m.phase(), Phase::Lobby);
        assert_eq!(m.session().room_id, "AB12");

        let out = m.apply(ServerMessage::RoomCreated {
            room_id: "ZZ99".into(),
        });
        assert!(!out.applied);
        assert_eq!(m.session().room_id, "AB12");
    }

    #[test]
    fn non_lobby_snapshot_in_login_keeps_phase() {
        let mut m = PhaseStateMachine::new(30, 3);
        m.apply(ServerMessage::UpdateRoom(snapshot(GameState::Playing, &["a"])));
        assert_eq!(m.phase(), Phase::Login);
        assert!(m.session().room.is_some());
    }

    #[test]
    fn non_lobby_snapshot_in_login_keeps_typed_code() {
        let mut m = PhaseStateMachine::new(30, 3);
        m.set_room_code("qq11");
        m.apply(ServerMessage::UpdateRoom(snapshot(GameState::Playing, &["a"])));
        assert_eq!(m.phase(), Phase::Login);
        assert_eq!(m.session().room_id, "QQ11");

        // Entering the lobby adopts the server's code.
        m.apply(ServerMessage::UpdateRoom(snapshot(GameState::Lobby, &["a"])));
        assert_eq!(m.phase(), Phase::Lobby);
        assert_eq!(m.session().room_id, "AB12");
    }

    #[test]
    fn growing_lobby_plays_join_chime() {
        let mut m = in_lobby();
        let out = m.apply(ServerMessage::UpdateRoom(snapshot(
            GameState::Lobby,
            &["s1", "s2", "s3", "s4"],
        )));
        assert_eq!(out.cues, vec![Cue::PlayerJoined]);

        let out = m.apply(ServerMessage::UpdateRoom(snapshot(GameState::Lobby, &["s1"])));
        assert!(out.cues.is_empty());
        assert_eq!(m.session().room.as_ref().unwrap().players.len(), 1);
    }

    #[test]
    fn game_started_is_ignored_outside_lobby() {
        let mut m = PhaseStateMachine::new(30, 3);
        let out = m.apply(ServerMessage::GameStarted {
            role: "IMPOSTER".into(),
            word: None,
            category: None,
        });
        assert!(!out.applied);
        assert_eq!(m.phase(), Phase::Login);
        assert!(m.session().my_role.is_none());
    }

    #[test]
    fn game_start_clears_log_and_hides_word() {
        let mut m = playing();
        m.reveal_word();
        m.apply(ServerMessage::PlayerAction {
            username: "s2".into(),
            action: WORD_ACTION.into(),
            payload: "yellow".into(),
        });
        assert_eq!(m.log().len(), 2);
        assert!(m.session().word_revealed);

        // A brand-new game from the lobby.
        m.apply(phase_change(Phase::Lobby));
        m.apply(ServerMessage::GameStarted {
            role: "IMPOSTER".into(),
            word: None,
            category: Some("Animals".into()),
        });
        assert_eq!(m.log().len(), 1);
        assert_eq!(
            m.log().last().unwrap().text,
            "🎮 Game started! You are a IMPOSTER"
        );
        assert!(!m.session().word_revealed);
        assert!(m.session().my_word.is_none());
    }

    #[test]
    fn round_transitions_keep_log() {
        let mut m = playing();
        m.apply(phase_change(Phase::Voting));
        m.apply(phase_change(Phase::Playing));
        let texts: Vec<_> = m.log().texts().collect();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts[1], VOTING_BANNER);
        assert_eq!(texts[2], NEW_ROUND_BANNER);
    }

    #[test]
    fn phase_change_resets_vote_and_timer() {
        let mut m = playing();
        m.apply(phase_change(Phase::Voting));
        m.apply(ServerMessage::TimerTick {
            remaining_seconds: 4,
        });
        assert!(m.cast_skip().is_some());
        assert!(m.has_voted());

        m.apply(phase_change(Phase::Voting));
        assert!(!m.has_voted());
        assert_eq!(m.turn_timer_remaining(), 30);
    }

    #[test]
    fn new_round_hides_the_word_again() {
        let mut m = playing();
        assert!(m.reveal_word());
        m.apply(phase_change(Phase::Voting));
        assert!(m.session().word_revealed);

        m.apply(phase_change(Phase::Playing));
        assert_eq!(m.phase(), Phase::Playing);
        assert!(!m.session().word_revealed);
        assert_eq!(m.session().my_word.as_deref(), Some("Banana"));
    }

    #[test]
    fn only_word_actions_are_logged() {
        let mut m = playing();
        let out = m.apply(ServerMessage::PlayerAction {
            username: "s2".into(),
            action: "EMOTE".into(),
            payload: "wave".into(),
        });
        assert!(!out.applied);
        m.apply(ServerMessage::PlayerAction {
            username: "Ana".into(),
            action: WORD_ACTION.into(),
            payload: "curved".into(),
        });
        assert_eq!(m.log().last().unwrap().text, "Ana: \"curved\"");
    }

    #[test]
    fn round_result_logs_role_and_picks_cue() {
        let mut m = playing();
        let out = m.apply(ServerMessage::RoundResult {
            message: "s2 was eliminated".into(),
            role: Some("CITIZEN".into()),
        });
        assert_eq!(out.cues, vec![Cue::Eliminated]);
        assert_eq!(m.log().last().unwrap().text, "s2 was eliminated · CITIZEN");

        let out = m.apply(ServerMessage::RoundResult {
            message: "s3 was caught".into(),
            role: Some(IMPOSTER_ROLE.into()),
        });
        assert_eq!(out.cues, vec![Cue::ImposterCaught]);
        assert_eq!(m.session().notification.as_deref(), Some("s3 was caught"));

        let out = m.apply(ServerMessage::RoundResult {
            message: "Nobody was eliminated".into(),
            role: None,
        });
        assert!(out.cues.is_empty());
        assert_eq!(m.log().last().unwrap().text, "Nobody was eliminated");
    }

    #[test]
    fn your_turn_cue_only_when_turn_moves_to_self() {
        let mut m = playing();
        let out = m.apply(ServerMessage::TurnUpdate {
            current_player_id: "s2".into(),
        });
        assert!(out.cues.is_empty());
        let out = m.apply(ServerMessage::TurnUpdate {
            current_player_id: "s1".into(),
        });
        assert_eq!(out.cues, vec![Cue::YourTurn]);
        let out = m.apply(ServerMessage::TurnUpdate {
            current_player_id: "s1".into(),
        });
        assert!(out.cues.is_empty());
        assert!(m.is_my_turn());
        assert_eq!(m.turn_player().unwrap().id, "s1");
    }

    #[test]
    fn ticks_pick_tick_or_time_up_cue() {
        let mut m = playing();
        let out = m.apply(ServerMessage::TimerTick {
            remaining_seconds: 7,
        });
        assert_eq!(out.cues, vec![Cue::TimerTick { seconds: 7 }]);
        let out = m.apply(ServerMessage::TimerTick {
            remaining_seconds: 0,
        });
        assert_eq!(out.cues, vec![Cue::TimeUp]);
    }

    #[test]
    fn server_error_sets_notice_without_phase_change() {
        let mut m = in_lobby();
        m.apply(ServerMessage::Error {
            message: "Room is full".into(),
        });
        assert_eq!(m.phase(), Phase::Lobby);
        assert_eq!(m.session().notice.as_deref(), Some("Room is full"));
        m.dismiss_notice();
        assert!(m.session().notice.is_none());
    }

    #[test]
    fn game_over_merges_and_then_ignores_everything() {
        let mut m = playing();
        m.apply(phase_change(Phase::Voting));
        let out = m.apply(ServerMessage::GameOver {
            winner: "Imposter".into(),
            players: Some(vec![RevealedPlayer {
                id: "s2".into(),
                role: Some(IMPOSTER_ROLE.into()),
                word: Some("Banana".into()),
                ..Default::default()
            }]),
        });
        assert_eq!(out.cues, vec![Cue::ImposterWins]);
        assert_eq!(m.phase(), Phase::Ended);
        let room = m.session().room.as_ref().unwrap();
        assert_eq!(room.players.len(), 3);
        assert_eq!(room.player("s2").unwrap().role.as_deref(), Some(IMPOSTER_ROLE));
        assert_eq!(room.player("s2").unwrap().username, "s2");

        for msg in [
            ServerMessage::GameOver {
                winner: "Citizens".into(),
                players: None,
            },
            phase_change(Phase::Playing),
            ServerMessage::UpdateRoom(snapshot(GameState::Lobby, &["s1"])),
        ] {
            assert!(!m.apply(msg).applied);
        }
        assert_eq!(m.phase(), Phase::Ended);
        assert_eq!(
            m.session().notification.as_deref(),
            Some("🏆 Winner: Imposter")
        );
        assert_eq!(m.session().room.as_ref().unwrap().players.len(), 3);
    }

    #[test]
    fn reset_leaves_ended() {
        let mut m = playing();
        m.apply(ServerMessage::GameOver {
            winner: "Citizens".into(),
            players: None,
        });
        m.reset();
        assert_eq!(m.phase(), Phase::Login);
        assert!(m.log().is_empty());
        assert_eq!(m.session().self_id.as_deref(), Some("s1"));
        assert!(m.session().room.is_none());
    }

    #[test]
    fn room_code_is_upper_cased_and_truncated() {
        let mut m = PhaseStateMachine::new(30, 3);
        assert!(m.set_room_code("ab12cdef"));
        assert_eq!(m.session().room_id, "AB12CD");
    }

    #[test]
    fn room_code_is_fixed_once_in_a_room() {
        let mut m = playing();
        m.apply(phase_change(Phase::Voting));
        assert!(!m.set_room_code("zz99"));
        assert_eq!(m.session().room_id, "AB12");

        let vote = m.cast_vote("s2").unwrap();
        assert_eq!(
            vote,
            ClientMessage::Vote {
                room_id: "AB12".into(),
                suspect_id: Ballot::Suspect("s2".into()),
            }
        );
    }

    #[test]
    fn intents_validate_locally() {
        let mut m = PhaseStateMachine::new(30, 3);
        assert_eq!(
            m.create_room_intent(),
            Err(ValidationError::MissingUsername)
        );
        m.set_username("Ana");
        assert_eq!(m.join_room_intent(), Err(ValidationError::MissingRoomCode));
        assert!(matches!(
            m.create_room_intent(),
            Ok(ClientMessage::CreateRoom { .. })
        ));
        assert_eq!(
            m.start_game_intent(),
            Err(ValidationError::WrongPhase(Phase::Login))
        );
    }

    #[test]
    fn start_requires_host_and_enough_players() {
        let mut m = PhaseStateMachine::new(30, 3);
        m.set_self_id(Some("s2".into()));
        m.apply(ServerMessage::UpdateRoom(snapshot(GameState::Lobby, &["s1", "s2"])));
        assert_eq!(m.start_game_intent(), Err(ValidationError::NotHost));

        m.set_self_id(Some("s1".into()));
        assert_eq!(
            m.start_game_intent(),
            Err(ValidationError::NotEnoughPlayers { have: 2, need: 3 })
        );
        assert!(!m.can_start());

        let m = in_lobby();
        assert!(m.can_start());
        assert_eq!(
            m.start_game_intent(),
            Ok(ClientMessage::StartGame {
                room_id: "AB12".into()
            })
        );
    }

    #[test]
    fn submit_word_requires_turn_and_text() {
        let mut m = playing();
        assert_eq!(m.submit_word_intent("  "), Err(ValidationError::EmptyWord));
        assert_eq!(
            m.submit_word_intent("curved"),
            Err(ValidationError::NotYourTurn)
        );
        m.apply(ServerMessage::TurnUpdate {
            current_player_id: "s1".into(),
        });
        assert_eq!(
            m.submit_word_intent(" curved "),
            Ok(ClientMessage::SubmitWord {
                room_id: "AB12".into(),
                word: "curved".into()
            })
        );
    }

    #[test]
    fn vote_candidates_exclude_self_and_dead() {
        let mut m = in_lobby();
        let mut snap = snapshot(GameState::Voting, &["s1", "s2", "s3"]);
        snap.players[2].is_alive = false;
        m.apply(ServerMessage::UpdateRoom(snap));
        let ids: Vec<_> = m.vote_candidates().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["s2"]);
    }

    #[test]
    fn votes_outside_voting_are_ignored() {
        let mut m = playing();
        assert!(m.cast_vote("s2").is_none());
        assert!(!m.has_voted());
    }
}
