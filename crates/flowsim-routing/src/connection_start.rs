use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use flowsim_core::{Connection, Event, EventTrigger, SimError, Simulator, Time};

use crate::routing::RoutingStrategy;

/// Activates a connection and lets a routing strategy start its flows.
pub struct ConnectionStartEvent {
    connection: Connection,
    routing: Rc<RefCell<dyn RoutingStrategy>>,
}

impl ConnectionStartEvent {
    pub fn new(connection: Connection, routing: Rc<RefCell<dyn RoutingStrategy>>) -> Self {
        Self { connection, routing }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Wraps the trigger into an event with priority 0 that fires `time_from_now` after the
    /// simulator's current time.
    pub fn into_event(self, sim: &Simulator, time_from_now: Time) -> Event {
        Event::with_trigger(sim, 0, time_from_now, self)
    }
}

impl EventTrigger for ConnectionStartEvent {
    fn trigger(self: Box<Self>, sim: &mut Simulator) -> Result<(), SimError> {
        let Self { connection, routing } = *self;
        let id = sim.activate_connection(connection)?;
        let result = routing.borrow_mut().assign_start_flows(sim, id);
        result
    }
}

impl fmt::Display for ConnectionStartEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} starting", self.connection)
    }
}
