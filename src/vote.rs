//! One-vote-per-round guard.

use crate::protocol::{Ballot, PlayerId};

/// Advisory tally reported by the server during voting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTally {
    pub votes_cast: u32,
    pub total: u32,
}

/// Tracks whether this client has voted in the current voting round.
///
/// A round opens on every entry into voting. Within a round the first cast
/// yields a [`Ballot`] to send and every later cast yields nothing. Nothing
/// but [`open_round`](Self::open_round) clears the flag; in particular the
/// server tally never re-enables voting.
#[derive(Debug, Clone, Default)]
pub struct VoteSession {
    has_voted: bool,
    tally: Option<VoteTally>,
}

impl VoteSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a fresh round.
    pub fn open_round(&mut self) {
        self.has_voted = false;
        self.tally = None;
    }

    /// Votes against `target`. Returns the ballot to send, or `None` if this
    /// round's vote was already cast.
    pub fn cast_vote(&mut self, target: impl Into<PlayerId>) -> Option<Ballot> {
        self.cast(Ballot::Suspect(target.into()))
    }

    /// Abstains. Returns the ballot to send, or `None` if this round's vote
    /// was already cast.
    pub fn cast_skip(&mut self) -> Option<Ballot> {
        self.cast(Ballot::Skip)
    }

    fn cast(&mut self, ballot: Ballot) -> Option<Ballot> {
        if self.has_voted {
            return None;
        }
        self.has_voted = true;
        Some(ballot)
    }

    pub fn record_tally(&mut self, votes_cast: u32, total: u32) {
        self.tally = Some(VoteTally { votes_cast, total });
    }

    pub fn has_voted(&self) -> bool {
        self.has_voted
    }

    pub fn tally(&self) -> Option<VoteTally> {
        self.tally
    }
}
