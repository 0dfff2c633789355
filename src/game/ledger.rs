//! Betting Ledger
//!
//! Balances and the active round's bets. For every player
//! `balance + active bet` only changes when a bet is placed (debit),
//! refunded or cashed out (credit) or lost at the crash (no credit, the stake
//! was already debited).

use std::collections::BTreeMap;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::debug;

use crate::game::events::{EventSink, GameEvent};
use crate::game::state::{BetState, BetStateUpdate, LogMessage, MatchPhase, PlayerId};

/// Rejected bet request. The Display text is what the player sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BetError {
    /// No balance tracked for this player.
    #[error("Invalid balance")]
    UnknownPlayer,

    /// Placement amount not strictly positive.
    #[error("Invalid amount")]
    InvalidAmount,

    /// Placement amount above the balance.
    #[error("Insufficient balance")]
    InsufficientBalance,

    /// New wager outside the Starting phase.
    #[error("Wait for game to restart!")]
    WrongPhase,
}

/// Accepted bet request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BetOutcome {
    /// New wager recorded.
    Placed {
        /// Debited stake.
        amount: Decimal,
    },
    /// Wager withdrawn before launch at 1x.
    Refunded {
        /// Returned stake.
        amount: Decimal,
    },
    /// Locked wager converted at the running multiplier.
    CashedOut {
        /// Original stake.
        amount: Decimal,
        /// Multiplier at cashout.
        multiplier: f64,
        /// Credited amount (`amount * multiplier`).
        payout: Decimal,
        /// `payout - amount`.
        profit: Decimal,
    },
}

/// An active wager for the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bet {
    /// Owner.
    pub player_id: PlayerId,
    /// Stake, already debited from the balance.
    pub amount: Decimal,
}

/// Per-player ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Player {
    /// Spendable balance, never negative.
    pub balance: Decimal,
    /// State of this round's wager.
    pub bet_state: BetState,
}

/// Credit for cashing out `amount` at `multiplier`.
pub fn payout(amount: Decimal, multiplier: f64) -> Decimal {
    match Decimal::from_f64(multiplier) {
        Some(m) => amount * m,
        None => {
            debug_assert!(false, "non-finite multiplier {}", multiplier);
            amount
        }
    }
}

/// Balances and active bets for the room.
#[derive(Debug, Clone, Default)]
pub struct BettingLedger {
    players: BTreeMap<PlayerId, Player>,
    /// Active bets in placement order.
    round_bets: Vec<Bet>,
}

impl BettingLedger {
    /// Empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a player's balance (creating the player if needed) and notify them.
    pub fn set_balance(&mut self, player_id: PlayerId, amount: Decimal, sink: &mut impl EventSink) {
        debug_assert!(amount >= Decimal::ZERO, "negative balance {} for {:?}", amount, player_id);
        self.players.entry(player_id).or_default().balance = amount;
        sink.notify(player_id, GameEvent::Balance(amount));
    }

    /// Forget a player. An active bet is forfeited.
    pub fn remove_player(&mut self, player_id: &PlayerId) -> Option<Player> {
        self.round_bets.retain(|bet| bet.player_id != *player_id);
        self.players.remove(player_id)
    }

    /// Place, cancel or cash out, depending on phase and existing wager.
    ///
    /// With an active bet this always withdraws it: a straight refund while
    /// Starting, a cashout at `multiplier` while Running. `amount` is ignored
    /// in that case, the recorded stake is what counts. Without one, a new
    /// wager of `amount` is placed if the phase allows.
    ///
    /// Rejections are also reported to the player as an error log line and
    /// leave the ledger untouched.
    pub fn bet(
        &mut self,
        player_id: PlayerId,
        amount: Decimal,
        phase: MatchPhase,
        multiplier: f64,
        sink: &mut impl EventSink,
    ) -> Result<BetOutcome, BetError> {
        let result = self.apply_bet(player_id, amount, phase, multiplier, sink);
        if let Err(err) = result {
            debug!("Bet from {} rejected: {}", player_id.short(), err);
            sink.notify(player_id, GameEvent::Log(LogMessage::error(err.to_string())));
        }
        result
    }

    fn apply_bet(
        &mut self,
        player_id: PlayerId,
        amount: Decimal,
        phase: MatchPhase,
        multiplier: f64,
        sink: &mut impl EventSink,
    ) -> Result<BetOutcome, BetError> {
        let balance = self
            .players
            .get(&player_id)
            .map(|p| p.balance)
            .ok_or(BetError::UnknownPlayer)?;

        if let Some(index) = self.round_bets.iter().position(|b| b.player_id == player_id) {
            let stake = self.round_bets.remove(index).amount;
            let outcome = match phase {
                MatchPhase::Running => {
                    let credited = payout(stake, multiplier);
                    BetOutcome::CashedOut {
                        amount: stake,
                        multiplier,
                        payout: credited,
                        profit: credited - stake,
                    }
                }
                MatchPhase::Starting | MatchPhase::Ended => BetOutcome::Refunded { amount: stake },
            };

            let credit = match outcome {
                BetOutcome::CashedOut { payout, .. } => payout,
                BetOutcome::Refunded { amount } | BetOutcome::Placed { amount } => amount,
            };
            self.set_balance(player_id, balance + credit, sink);

            match (phase, outcome) {
                (MatchPhase::Starting, _) => {
                    sink.notify(player_id, GameEvent::Log(LogMessage::info("Unplaced bet")));
                }
                (MatchPhase::Running, BetOutcome::CashedOut { profit, .. }) => {
                    sink.notify(
                        player_id,
                        GameEvent::Log(LogMessage::success(format!("Win amount: {:.2}$", profit))),
                    );
                }
                _ => {}
            }

            self.set_bet_state(player_id, BetStateUpdate::cleared(), sink);
            debug!("Player {} withdrew bet: {:?}", player_id.short(), outcome);
            return Ok(outcome);
        }

        if phase != MatchPhase::Starting {
            return Err(BetError::WrongPhase);
        }
        if amount <= Decimal::ZERO {
            return Err(BetError::InvalidAmount);
        }
        if amount > balance {
            return Err(BetError::InsufficientBalance);
        }

        self.set_balance(player_id, balance - amount, sink);
        self.round_bets.push(Bet { player_id, amount });

        sink.notify(player_id, GameEvent::Log(LogMessage::info("Placed bet")));
        self.set_bet_state(
            player_id,
            BetStateUpdate { bet_state: BetState::Placed, amount },
            sink,
        );
        debug!("Player {} placed {}", player_id.short(), amount);

        Ok(BetOutcome::Placed { amount })
    }

    /// Lock every active bet at launch. Balances are unchanged.
    pub fn lock_all(&mut self, sink: &mut impl EventSink) {
        for bet in self.round_bets.clone() {
            self.set_bet_state(
                bet.player_id,
                BetStateUpdate { bet_state: BetState::Locked, amount: bet.amount },
                sink,
            );
            sink.notify(
                bet.player_id,
                GameEvent::Log(LogMessage::info(format!("Locked bet of {:.2}$", bet.amount))),
            );
        }
    }

    /// Settle every bet still in at the crash as lost and clear the round.
    ///
    /// Returns the lost bets.
    pub fn settle_loss(&mut self, sink: &mut impl EventSink) -> Vec<Bet> {
        let lost = std::mem::take(&mut self.round_bets);
        for bet in &lost {
            self.set_bet_state(bet.player_id, BetStateUpdate::cleared(), sink);
            sink.notify(
                bet.player_id,
                GameEvent::Log(LogMessage::error(format!("Crashed and you lost: {}$", bet.amount))),
            );
        }
        lost
    }

    fn set_bet_state(&mut self, player_id: PlayerId, update: BetStateUpdate, sink: &mut impl EventSink) {
        if let Some(player) = self.players.get_mut(&player_id) {
            player.bet_state = update.bet_state;
        }
        sink.notify(player_id, GameEvent::BetState(update));
    }

    /// A player's ledger entry.
    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// A player's balance.
    pub fn balance(&self, player_id: &PlayerId) -> Option<Decimal> {
        self.players.get(player_id).map(|p| p.balance)
    }

    /// A player's active bet.
    pub fn active_bet(&self, player_id: &PlayerId) -> Option<&Bet> {
        self.round_bets.iter().find(|b| b.player_id == *player_id)
    }

    /// Active bets in placement order.
    pub fn active_bets(&self) -> &[Bet] {
        &self.round_bets
    }

    /// Tracked players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

// =============================================================================
// TESTS
// =============================================================================
