//! Authoritative Match Engine
//!
//! Round state machine driven by a periodic `tick(dt)`:
//!
//! ```text
//!   Ended ──(elapsed >= end_time)──▶ Starting ──(elapsed >= waiting_time)──▶ Running
//!     ▲                                                                        │
//!     └───────────────────(multiplier >= goal)─────────────────────────────────┘
//! ```
//!
//! The engine is a plain owned value. Whoever owns it serializes access
//! (the network layer keeps it behind one lock), so a bet is never applied
//! halfway through a tick's transition.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::config::GameConfig;
use crate::core::crash_point::{CrashPointGenerator, CrashRoll};
use crate::core::curve::multiplier_at;
use crate::core::rng::EntropySource;
use crate::game::events::{EventSink, GameEvent};
use crate::game::ledger::{BetError, BetOutcome, BettingLedger};
use crate::game::state::{LogMessage, MatchSnapshot, MatchState, PlayerId, RoundPhase};

/// Phase change that happened during a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseTransition {
    /// Ended -> Starting: bets are open.
    BettingOpened,
    /// Starting -> Running.
    Launched {
        /// Bets locked into the round.
        locked_bets: usize,
    },
    /// Running -> Ended.
    Crashed {
        /// Multiplier the round ended at.
        crash_point: f64,
        /// Bets still in at the crash.
        lost_bets: usize,
    },
}

/// Result of a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    /// Snapshot broadcast for this tick.
    pub snapshot: MatchSnapshot,
    /// Transition taken, if any.
    pub transition: Option<PhaseTransition>,
}

/// The room's single match and ledger.
pub struct MatchEngine<S, E> {
    config: GameConfig,
    state: MatchState,
    ledger: BettingLedger,
    crash: CrashPointGenerator<E>,
    /// Roll behind the current or most recent round.
    round: Option<CrashRoll>,
    sink: S,
}

impl<S: EventSink, E: EntropySource> MatchEngine<S, E> {
    /// Create the engine in the Ended phase, primed so the first tick opens
    /// betting.
    pub fn new(config: GameConfig, entropy: E, sink: S) -> Self {
        let preload = config.waiting_time.max(config.end_time);
        Self {
            config,
            state: MatchState::new(preload),
            ledger: BettingLedger::new(),
            crash: CrashPointGenerator::new(entropy),
            round: None,
            sink,
        }
    }

    /// Register a newly connected player: seed their balance, send the crash
    /// history and greet them.
    pub fn connect(&mut self, player_id: PlayerId) {
        self.ledger
            .set_balance(player_id, self.config.starting_balance, &mut self.sink);
        self.sink.notify(
            player_id,
            GameEvent::CrashPoints(self.state.crash_history.clone()),
        );
        self.sink
            .notify(player_id, GameEvent::Log(LogMessage::info("Connected!")));
        info!("Player {} joined ({} in room)", player_id.short(), self.ledger.player_count());
    }

    /// Remove a player. Returns their final balance.
    pub fn disconnect(&mut self, player_id: &PlayerId) -> Option<Decimal> {
        let removed = self.ledger.remove_player(player_id).map(|p| p.balance);
        if removed.is_some() {
            info!("Player {} left ({} in room)", player_id.short(), self.ledger.player_count());
        }
        removed
    }

    /// Inbound bet request: place, cancel or cash out.
    pub fn bet(&mut self, player_id: PlayerId, amount: Decimal) -> Result<BetOutcome, BetError> {
        self.ledger.bet(
            player_id,
            amount,
            self.state.phase.public(),
            self.state.multiplier,
            &mut self.sink,
        )
    }

    /// Advance the round by `dt` seconds and broadcast the snapshot.
    pub fn tick(&mut self, dt: f64) -> TickResult {
        self.state.elapsed += dt;

        let phase = self.state.phase;
        let transition = match phase {
            RoundPhase::Starting if self.state.elapsed >= self.config.waiting_time => {
                Some(self.launch())
            }
            RoundPhase::Starting => None,
            RoundPhase::Running { goal } => {
                let next = multiplier_at(self.state.elapsed);
                debug_assert!(next >= self.state.multiplier, "multiplier went backwards");
                if next >= goal {
                    Some(self.crash(goal))
                } else {
                    self.state.multiplier = next;
                    None
                }
            }
            RoundPhase::Ended if self.state.elapsed >= self.config.end_time => {
                self.state.phase = RoundPhase::Starting;
                self.state.elapsed = 0.0;
                self.state.multiplier = 1.0;
                debug!("Betting open");
                Some(PhaseTransition::BettingOpened)
            }
            RoundPhase::Ended => None,
        };

        let snapshot = self.state.snapshot();
        self.sink.broadcast(GameEvent::Tick(snapshot));

        TickResult { snapshot, transition }
    }

    /// Starting -> Running: lock bets and draw the hidden goal.
    fn launch(&mut self) -> PhaseTransition {
        self.state.elapsed = 0.0;
        self.state.multiplier = 1.0;
        self.ledger.lock_all(&mut self.sink);

        let roll = self.crash.generate(self.config.crash_per);
        self.state.phase = RoundPhase::Running { goal: roll.multiplier };

        // The hash commits to the round; the seed is only logged at the crash.
        let locked_bets = self.ledger.active_bets().len();
        info!("Round launched with {} bets (hash {})", locked_bets, roll.hash_hex());
        self.round = Some(roll);
        PhaseTransition::Launched { locked_bets }
    }

    /// Running -> Ended: clamp to the goal, record it and settle losers.
    fn crash(&mut self, goal: f64) -> PhaseTransition {
        self.state.phase = RoundPhase::Ended;
        self.state.multiplier = goal;
        self.state.crash_history.push(goal);
        self.sink
            .broadcast(GameEvent::CrashPoints(self.state.crash_history.clone()));
        self.state.elapsed = 0.0;

        let lost_bets = self.ledger.settle_loss(&mut self.sink).len();
        if let Some(roll) = &self.round {
            info!(
                "Crashed at {:.2}x, {} bets lost (seed {}, hash {}, instant: {})",
                goal,
                lost_bets,
                roll.seed_hex(),
                roll.hash_hex(),
                roll.instant
            );
        }
        PhaseTransition::Crashed { crash_point: goal, lost_bets }
    }

    /// Current public snapshot.
    pub fn snapshot(&self) -> MatchSnapshot {
        self.state.snapshot()
    }

    /// Past crash points, most recent last.
    pub fn crash_history(&self) -> &[f64] {
        &self.state.crash_history
    }

    /// The last round's roll, once it has crashed. `None` while a round is
    /// running, so the goal never leaks early.
    pub fn revealed_round(&self) -> Option<&CrashRoll> {
        match self.state.phase {
            RoundPhase::Running { .. } => None,
            _ => self.round.as_ref(),
        }
    }

    /// Read access to the ledger.
    pub fn ledger(&self) -> &BettingLedger {
        &self.ledger
    }

    /// Engine configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// The event sink.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Mutable access to the event sink (registering transport clients).
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Seconds per tick for the configured rate.
    pub fn tick_dt(&self) -> f64 {
        self.config.tick_dt()
    }
}

// =============================================================================
// TESTS
// =============================================================================
