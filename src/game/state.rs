//! Game State Definitions
//!
//! Player identity, round phases and the payloads pushed to clients.

use rust_decimal::Decimal;
use serde::{Serialize, Deserialize};

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (UUID as bytes), one per connection.
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random identifier for a new connection.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Short hex prefix for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

// =============================================================================
// PHASES
// =============================================================================

/// Publicly visible round phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Accepting bets, counting down to launch.
    Starting,
    /// Multiplier climbing; locked bets may cash out.
    Running,
    /// Crashed; waiting for the next round.
    Ended,
}

/// Internal round phase. The goal multiplier only exists while running.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoundPhase {
    /// Accepting bets.
    Starting,
    /// Running towards a hidden goal multiplier.
    Running {
        /// Crash point drawn at launch, >= 1.0.
        goal: f64,
    },
    /// Crashed.
    Ended,
}

impl RoundPhase {
    /// Phase as shown to players, without the goal.
    pub fn public(self) -> MatchPhase {
        match self {
            RoundPhase::Starting => MatchPhase::Starting,
            RoundPhase::Running { .. } => MatchPhase::Running,
            RoundPhase::Ended => MatchPhase::Ended,
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Round snapshot broadcast every tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchSnapshot {
    /// Current phase.
    pub state: MatchPhase,
    /// Seconds elapsed in the current phase.
    pub t: f64,
    /// Current multiplier.
    pub mul: f64,
}

/// Bet lifecycle of a single player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BetState {
    /// No wager this round.
    #[default]
    NotPlaced,
    /// Wager placed during Starting, still cancellable for a refund.
    Placed,
    /// Round launched with the wager in; only a cashout returns it.
    Locked,
}

/// Bet state pushed to a player.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetStateUpdate {
    /// New state.
    pub bet_state: BetState,
    /// Amount at stake (0 when not placed).
    pub amount: Decimal,
}

impl BetStateUpdate {
    /// No active wager.
    pub fn cleared() -> Self {
        Self {
            bet_state: BetState::NotPlaced,
            amount: Decimal::ZERO,
        }
    }
}

/// Severity of a player-facing log line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogType {
    /// Neutral information.
    Info,
    /// Rejected request or lost bet.
    Error,
    /// Winning cashout or accepted bet.
    Success,
}

/// Player-facing log line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogMessage {
    /// Severity.
    pub log_type: LogType,
    /// Text shown to the player.
    pub message: String,
}

impl LogMessage {
    /// Info line.
    pub fn info(message: impl Into<String>) -> Self {
        Self { log_type: LogType::Info, message: message.into() }
    }

    /// Error line.
    pub fn error(message: impl Into<String>) -> Self {
        Self { log_type: LogType::Error, message: message.into() }
    }

    /// Success line.
    pub fn success(message: impl Into<String>) -> Self {
        Self { log_type: LogType::Success, message: message.into() }
    }
}

// =============================================================================
// MATCH STATE
// =============================================================================

/// The single shared round context.
#[derive(Clone, Debug)]
pub struct MatchState {
    /// Current phase (carries the goal while running).
    pub phase: RoundPhase,
    /// Seconds elapsed in the current phase.
    pub elapsed: f64,
    /// Displayed multiplier.
    pub multiplier: f64,
    /// Past crash points, most recent last.
    pub crash_history: Vec<f64>,
}

impl MatchState {
    /// Initial state: Ended with the timer preloaded so the first tick
    /// opens betting.
    pub fn new(preload: f64) -> Self {
        Self {
            phase: RoundPhase::Ended,
            elapsed: preload,
            multiplier: 1.0,
            crash_history: Vec::new(),
        }
    }

    /// Public snapshot.
    pub fn snapshot(&self) -> MatchSnapshot {
        MatchSnapshot {
            state: self.phase.public(),
            t: self.elapsed,
            mul: self.multiplier,
        }
    }

    /// Goal multiplier, if the round is running.
    pub(crate) fn goal(&self) -> Option<f64> {
        match self.phase {
            RoundPhase::Running { goal } => Some(goal),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_uuid_roundtrip() {
        let id = PlayerId::random();
        let parsed = uuid::Uuid::parse_str(&id.to_uuid_string()).unwrap();
        assert_eq!(PlayerId::new(*parsed.as_bytes()), id);
        assert_eq!(id.short().len(), 8);
    }

    #[test]
    fn test_snapshot_hides_goal() {
        let mut state = MatchState::new(5.0);
        assert_eq!(state.snapshot().state, MatchPhase::Ended);
        assert_eq!(state.goal(), None);

        state.phase = RoundPhase::Running { goal: 3.5 };
        let json = serde_json::to_value(state.snapshot()).unwrap();
        assert_eq!(json["state"], "Running");
        assert!(json.get("goal").is_none());
        assert_eq!(state.goal(), Some(3.5));
    }

    #[test]
    fn test_payload_field_names() {
        let update = BetStateUpdate {
            bet_state: BetState::Placed,
            amount: Decimal::new(105, 1),
        };
        let json = serde_json::to_value(update).unwrap();
        assert_eq!(json["betState"], "Placed");
        assert_eq!(json["amount"], 10.5);

        let log = serde_json::to_value(LogMessage::success("ok")).unwrap();
        assert_eq!(log["logType"], "Success");
        assert_eq!(log["message"], "ok");
    }
}
