//! Scheduled events and the event queue.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::SimError;
use crate::simulator::Simulator;
use crate::token::OwnerToken;
use crate::Time;

pub type EventId = u64;

/// Work executed when an event is dequeued.
pub trait EventTrigger {
    fn trigger(self: Box<Self>, sim: &mut Simulator) -> Result<(), SimError>;
}

impl<F> EventTrigger for F
where
    F: FnOnce(&mut Simulator) -> Result<(), SimError>,
{
    fn trigger(self: Box<Self>, sim: &mut Simulator) -> Result<(), SimError> {
        (*self)(sim)
    }
}

/// An event created for a simulator but not inserted yet.
///
/// The trigger time is fixed at creation as the simulator's current time plus `time_from_now`.
pub struct Event {
    simulator: OwnerToken,
    time: Time,
    priority: i32,
    trigger: Box<dyn EventTrigger>,
}

impl Event {
    pub fn new<F>(sim: &Simulator, priority: i32, time_from_now: Time, trigger: F) -> Self
    where
        F: FnOnce(&mut Simulator) -> Result<(), SimError> + 'static,
    {
        Self::with_trigger(sim, priority, time_from_now, trigger)
    }

    /// Same as [`new`](Self::new) for any [`EventTrigger`] implementation.
    pub fn with_trigger(
        sim: &Simulator,
        priority: i32,
        time_from_now: Time,
        trigger: impl EventTrigger + 'static,
    ) -> Self {
        Self {
            simulator: sim.token(),
            time: sim.current_time().saturating_add(time_from_now),
            priority,
            trigger: Box::new(trigger),
        }
    }

    pub fn time(&self) -> Time {
        self.time
    }

    /// Among events with the same time, higher priority events are triggered first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn simulator(&self) -> OwnerToken {
        self.simulator
    }
}

/// Position of an inserted event in the execution order.
///
/// Events are ordered by time ascending, then by priority descending, then by insertion order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub time: Time,
    pub priority: i32,
    pub id: EventId,
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

pub(crate) struct QueuedEvent {
    pub key: EventKey,
    pub trigger: Box<dyn EventTrigger>,
}

impl Eq for QueuedEvent {}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // inverted for the max-heap
        other.key.cmp(&self.key)
    }
}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of events with lazy cancellation.
#[derive(Default)]
pub(crate) struct EventQueue {
    events: BinaryHeap<QueuedEvent>,
    // time of every inserted event that was not dequeued yet
    pending: FxHashMap<EventId, Time>,
    canceled_events: FxHashSet<EventId>,
    next_id: EventId,
}

impl EventQueue {
    pub fn push(&mut self, event: Event) -> EventId {
        let id = self.next_id;
        self.next_id += 1;
        let key = EventKey {
            time: event.time,
            priority: event.priority,
            id,
        };
        self.pending.insert(id, event.time);
        self.events.push(QueuedEvent {
            key,
            trigger: event.trigger,
        });
        id
    }

    pub fn cancel(&mut self, id: EventId) {
        self.canceled_events.insert(id);
    }

    pub fn scheduled_time(&self, id: EventId) -> Option<Time> {
        self.pending.get(&id).copied()
    }

    pub fn is_active(&self, id: EventId) -> bool {
        self.pending.contains_key(&id) && !self.canceled_events.contains(&id)
    }

    /// Removes and returns the next active event, dropping canceled ones on the way.
    pub fn pop(&mut self) -> Option<QueuedEvent> {
        while let Some(event) = self.events.pop() {
            self.pending.remove(&event.key.id);
            if !self.canceled_events.remove(&event.key.id) {
                return Some(event);
            }
        }
        None
    }

    /// Time of the next active event.
    pub fn peek_time(&mut self) -> Option<Time> {
        loop {
            let key = self.events.peek()?.key;
            if !self.canceled_events.remove(&key.id) {
                return Some(key.time);
            }
            self.pending.remove(&key.id);
            self.events.pop();
        }
    }

    pub fn num_active(&self) -> usize {
        self.pending.len() - self.canceled_events.len()
    }
}
