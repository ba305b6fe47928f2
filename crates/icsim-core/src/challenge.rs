//! Capture-the-flag scoring ledger

use serde::Serialize;
use tracing::info;

/// Highest reachable score
pub const MAX_SCORE: u32 = 100;

/// Goals a player can reach by talking to the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Challenge {
    /// Luminosity above the light level while the control node says night
    SpoofLight,
    /// Speed at or above the gauge maximum
    SpoofSpeed,
    /// Indicator lit without the control node asking for it
    TurnSignals,
    /// Full VIN read over ISO-TP
    RequestVin,
    /// Hazard routine found through RoutineControl
    FindRoutineControl,
    /// Security access key derived
    SecurityAccess,
}

impl Challenge {
    pub const ALL: [Challenge; 6] = [
        Challenge::SpoofLight,
        Challenge::SpoofSpeed,
        Challenge::TurnSignals,
        Challenge::RequestVin,
        Challenge::FindRoutineControl,
        Challenge::SecurityAccess,
    ];

    pub fn points(self) -> u32 {
        match self {
            Self::SpoofLight | Self::SpoofSpeed | Self::TurnSignals => 10,
            Self::RequestVin | Self::FindRoutineControl => 20,
            Self::SecurityAccess => 30,
        }
    }

    fn index(self) -> usize {
        match self {
            Self::SpoofLight => 0,
            Self::SpoofSpeed => 1,
            Self::TurnSignals => 2,
            Self::RequestVin => 3,
            Self::FindRoutineControl => 4,
            Self::SecurityAccess => 5,
        }
    }
}

/// Set of solved challenges and the resulting score
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChallengeRegistry {
    solved: [bool; 6],
    score: u32,
}

impl ChallengeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a challenge solved; returns true the first time only
    pub fn validate(&mut self, challenge: Challenge) -> bool {
        let slot = &mut self.solved[challenge.index()];
        if *slot {
            return false;
        }
        *slot = true;
        self.score = (self.score + challenge.points()).min(MAX_SCORE);
        info!(
            challenge = ?challenge,
            points = challenge.points(),
            score = self.score,
            "Challenge solved"
        );
        true
    }

    pub fn is_solved(&self, challenge: Challenge) -> bool {
        self.solved[challenge.index()]
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn solved(&self) -> impl Iterator<Item = Challenge> + '_ {
        Challenge::ALL.into_iter().filter(|c| self.is_solved(*c))
    }
}
