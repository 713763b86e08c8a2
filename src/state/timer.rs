use super::{AppState, Room, SharedRoom};
use crate::protocol::ServerMessage;
use crate::types::{Phase, PlayerId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Handles of the tasks a room has in flight
#[derive(Debug, Default)]
pub struct RoomTimers {
    /// The single deadline or results delay of the current phase
    phase: Option<AbortHandle>,
    /// Content fetches and bot work of the current round
    round_tasks: Vec<AbortHandle>,
    /// Reconnect grace periods by player; they outlive resets
    grace: HashMap<PlayerId, AbortHandle>,
}

impl RoomTimers {
    pub fn arm_phase(&mut self, handle: AbortHandle) {
        self.cancel_phase();
        self.phase = Some(handle);
    }

    pub fn cancel_phase(&mut self) {
        if let Some(handle) = self.phase.take() {
            handle.abort();
        }
    }

    /// Forget the phase timer without aborting it; called by the timer itself
    pub fn disarm_phase(&mut self) {
        self.phase = None;
    }

    pub fn has_phase_timer(&self) -> bool {
        self.phase.is_some()
    }

    pub fn track_round_task(&mut self, handle: AbortHandle) {
        self.round_tasks.retain(|h| !h.is_finished());
        self.round_tasks.push(handle);
    }

    /// At most one grace period per player; a newer one replaces the old
    pub fn track_grace(&mut self, identity: &str, handle: AbortHandle) {
        self.grace.retain(|_, h| !h.is_finished());
        if let Some(previous) = self.grace.insert(identity.to_string(), handle) {
            previous.abort();
        }
    }

    pub fn cancel_grace(&mut self, identity: &str) {
        if let Some(handle) = self.grace.remove(identity) {
            handle.abort();
        }
    }

    pub fn cancel_round_tasks(&mut self) {
        self.cancel_phase();
        for handle in self.round_tasks.drain(..) {
            handle.abort();
        }
    }

    /// Take every handle; the caller aborts them once the room is unreachable
    pub fn take_all(&mut self) -> Vec<AbortHandle> {
        let mut handles: Vec<AbortHandle> = self.phase.take().into_iter().collect();
        handles.append(&mut self.round_tasks);
        handles.extend(self.grace.drain().map(|(_, handle)| handle));
        handles
    }
}

/// Whole seconds left, rounded up so "0" only shows at the deadline
fn seconds_left(deadline: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(Instant::now());
    remaining.as_millis().div_ceil(1000) as u64
}

impl AppState {
    /// Arm the deadline of a Submitting or Voting phase.
    ///
    /// The timer ticks `time_update` to the room until the deadline, then
    /// runs the expiry path. Expiry is a no-op when the room has moved on
    /// since arming, so it races safely with the quorum path.
    pub(super) fn arm_deadline(
        self: &Arc<Self>,
        shared: &SharedRoom,
        room: &mut Room,
        phase: Phase,
        duration: Duration,
    ) {
        let epoch = room.epoch();
        let deadline = Instant::now() + duration;
        match phase {
            Phase::Submitting => room.submission_deadline = Some(deadline),
            Phase::Voting => room.voting_deadline = Some(deadline),
            _ => {
                tracing::warn!("Room {}: no deadline for {:?}", room.id, phase);
                return;
            }
        }

        let state = self.clone();
        let shared = shared.clone();
        let tick = self.config.tick;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = tokio::time::sleep_until(deadline) => break,
                    _ = ticker.tick() => {
                        let room = shared.lock().await;
                        if room.epoch() != epoch {
                            return;
                        }
                        room.broadcast(ServerMessage::TimeUpdate {
                            seconds_remaining: seconds_left(deadline),
                        });
                    }
                }
            }

            let mut room = shared.lock().await;
            if room.epoch() != epoch || room.phase != phase {
                tracing::debug!("Room {}: stale {:?} deadline ignored", room.id, phase);
                return;
            }
            room.timers.disarm_phase();
            room.broadcast(ServerMessage::TimeUpdate {
                seconds_remaining: 0,
            });

            match phase {
                Phase::Submitting => state.expire_submissions(&shared, &mut room),
                Phase::Voting => state.expire_voting(&shared, &mut room),
                _ => {}
            }
        })
        .abort_handle();

        room.timers.arm_phase(handle);
    }

    /// Start the next round once the results have been on screen long enough
    pub(super) fn arm_next_round(self: &Arc<Self>, shared: &SharedRoom, room: &mut Room) {
        let epoch = room.epoch();
        let delay = self.config.results_delay();
        let state = self.clone();
        let shared = shared.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut room = shared.lock().await;
            if room.epoch() != epoch || room.phase != Phase::RoundResults {
                return;
            }
            room.timers.disarm_phase();
            state.begin_round(&shared, &mut room);
        })
        .abort_handle();

        room.timers.arm_phase(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_phase_aborts_timer() {
        let mut timers = RoomTimers::default();
        let handle = tokio::spawn(std::future::pending::<()>());
        timers.arm_phase(handle.abort_handle());
        assert!(timers.has_phase_timer());

        timers.cancel_phase();
        assert!(!timers.has_phase_timer());
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_arming_replaces_previous_timer() {
        let mut timers = RoomTimers::default();
        let first = tokio::spawn(std::future::pending::<()>());
        let second = tokio::spawn(std::future::pending::<()>());
        timers.arm_phase(first.abort_handle());
        timers.arm_phase(second.abort_handle());

        assert!(first.await.unwrap_err().is_cancelled());
        timers.cancel_round_tasks();
        assert!(second.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_round_reset_spares_grace_tasks() {
        let mut timers = RoomTimers::default();
        let round = tokio::spawn(std::future::pending::<()>());
        let grace = tokio::spawn(std::future::pending::<()>());
        timers.track_round_task(round.abort_handle());
        timers.track_grace("bob", grace.abort_handle());

        timers.cancel_round_tasks();
        assert!(round.await.unwrap_err().is_cancelled());
        assert!(!grace.is_finished());

        let rest = timers.take_all();
        assert_eq!(rest.len(), 1);
        for handle in rest {
            handle.abort();
        }
        assert!(grace.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_new_grace_replaces_previous_for_same_player() {
        let mut timers = RoomTimers::default();
        let first = tokio::spawn(std::future::pending::<()>());
        let second = tokio::spawn(std::future::pending::<()>());
        let other = tokio::spawn(std::future::pending::<()>());
        timers.track_grace("bob", first.abort_handle());
        timers.track_grace("carol", other.abort_handle());
        timers.track_grace("bob", second.abort_handle());

        assert!(first.await.unwrap_err().is_cancelled());
        assert!(!second.is_finished());

        timers.cancel_grace("bob");
        assert!(second.await.unwrap_err().is_cancelled());
        assert!(!other.is_finished());
        assert_eq!(timers.take_all().len(), 1);
        other.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_seconds_left_rounds_up() {
        let deadline = Instant::now() + Duration::from_millis(1500);
        assert_eq!(seconds_left(deadline), 2);
        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(seconds_left(deadline), 1);
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(seconds_left(deadline), 0);
    }
}
