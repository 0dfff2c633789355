//! Game Events
//!
//! Everything the engine tells the outside world goes through [`EventSink`],
//! either targeted at one player or broadcast to the whole room. The engine
//! never knows which transport sits behind the sink.

use rust_decimal::Decimal;

use crate::game::state::{BetStateUpdate, LogMessage, MatchSnapshot, PlayerId};

/// Outbound notification.
#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    /// Round snapshot, every tick (room).
    Tick(MatchSnapshot),
    /// Full crash history, most recent last (room, or a newly joined player).
    CrashPoints(Vec<f64>),
    /// Updated balance (player).
    Balance(Decimal),
    /// Updated bet state (player).
    BetState(BetStateUpdate),
    /// Log line (player).
    Log(LogMessage),
}

/// Capability the engine uses to publish events.
///
/// Implementations must not block: the engine calls them while holding the
/// match state.
pub trait EventSink {
    /// Deliver an event to a single player.
    fn notify(&mut self, player: PlayerId, event: GameEvent);

    /// Deliver an event to every player in the room.
    fn broadcast(&mut self, event: GameEvent);
}

/// Recipient of a recorded event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Audience {
    /// One player.
    Player(PlayerId),
    /// Whole room.
    Room,
}

/// Sink that keeps every event in memory, in emission order.
///
/// Used by the offline simulator and tests.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    /// Recorded events.
    pub events: Vec<(Audience, GameEvent)>,
}

impl RecordingSink {
    /// Empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Events targeted at `player` (broadcasts excluded).
    pub fn for_player(&self, player: PlayerId) -> impl Iterator<Item = &GameEvent> {
        self.events.iter().filter_map(move |(audience, event)| match audience {
            Audience::Player(id) if *id == player => Some(event),
            _ => None,
        })
    }

    /// Log lines sent to `player`.
    pub fn logs_for(&self, player: PlayerId) -> Vec<&LogMessage> {
        self.for_player(player)
            .filter_map(|event| match event {
                GameEvent::Log(log) => Some(log),
                _ => None,
            })
            .collect()
    }

    /// Most recent balance sent to `player`.
    pub fn last_balance(&self, player: PlayerId) -> Option<Decimal> {
        self.for_player(player)
            .filter_map(|event| match event {
                GameEvent::Balance(balance) => Some(*balance),
                _ => None,
            })
            .last()
    }

    /// Most recent bet state sent to `player`.
    pub fn last_bet_state(&self, player: PlayerId) -> Option<BetStateUpdate> {
        self.for_player(player)
            .filter_map(|event| match event {
                GameEvent::BetState(update) => Some(*update),
                _ => None,
            })
            .last()
    }

    /// Room broadcasts.
    pub fn broadcasts(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter().filter_map(|(audience, event)| match audience {
            Audience::Room => Some(event),
            Audience::Player(_) => None,
        })
    }

    /// Drop everything recorded so far.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn notify(&mut self, player: PlayerId, event: GameEvent) {
        self.events.push((Audience::Player(player), event));
    }

    fn broadcast(&mut self, event: GameEvent) {
        self.events.push((Audience::Room, event));
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn notify(&mut self, player: PlayerId, event: GameEvent) {
        (**self).notify(player, event);
    }

    fn broadcast(&mut self, event: GameEvent) {
        (**self).broadcast(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::LogType;

    #[test]
    fn test_recording_sink_filters_by_audience() {
        let alice = PlayerId::new([1; 16]);
        let bob = PlayerId::new([2; 16]);
        let mut sink = RecordingSink::new();

        sink.notify(alice, GameEvent::Balance(Decimal::from(100)));
        sink.notify(bob, GameEvent::Log(LogMessage::info("hi")));
        sink.broadcast(GameEvent::CrashPoints(vec![1.5]));
        sink.notify(alice, GameEvent::Balance(Decimal::from(90)));

        assert_eq!(sink.last_balance(alice), Some(Decimal::from(90)));
        assert_eq!(sink.last_balance(bob), None);
        assert_eq!(sink.logs_for(bob)[0].log_type, LogType::Info);
        assert_eq!(sink.broadcasts().count(), 1);

        sink.clear();
        assert!(sink.events.is_empty());
    }
}
