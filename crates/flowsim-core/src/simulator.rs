//! Simulation engine.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::json;

use crate::aftermath::Aftermath;
use crate::config::SimulatorConfig;
use crate::connection::{Connection, ConnectionStatus};
use crate::error::SimError;
use crate::event::{Event, EventId, EventQueue};
use crate::logger::{ConnectionLog, FlowLog, LinkLog, LoggerFactory, VoidLoggerFactory};
use crate::network::{EndedFlow, Network};
use crate::path::AcyclicPath;
use crate::token::OwnerToken;
use crate::{log_debug, log_error, log_info, log_trace};
use crate::{ConnectionId, FlowId, LinkId, NodeId, Time};

/// Lifecycle of a simulator. Transitions only go forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SimulatorState {
    Instantiated,
    Setup,
    Running,
    Finished,
}

/// Discrete-event simulator of bandwidth allocation.
///
/// A simulator is used for exactly one run: [`setup`](Self::setup), insert the initial events,
/// then [`run`](Self::run). Each tick advances the clock to the next active event, applies the
/// progress of every active connection, triggers all events due at that time, invokes the
/// aftermath once and schedules a wake-up for the next connection that needs attention.
pub struct Simulator {
    token: OwnerToken,
    config: SimulatorConfig,
    state: SimulatorState,
    now: Time,
    total_runtime: Time,
    queue: EventQueue,
    network: Network,
    aftermath: Option<Box<dyn Aftermath>>,
    loggers: Box<dyn LoggerFactory>,
    next_connection_id: ConnectionId,
    connections: BTreeMap<ConnectionId, Connection>,
    active_connections: BTreeSet<ConnectionId>,
    wakeup_event: Option<EventId>,
    last_progress_time: Time,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    /// Creates a simulator with the default configuration.
    pub fn new() -> Self {
        Self {
            token: OwnerToken::fresh(),
            config: SimulatorConfig::default(),
            state: SimulatorState::Instantiated,
            now: 0,
            total_runtime: 0,
            queue: EventQueue::default(),
            network: Network::new(0),
            aftermath: None,
            loggers: Box::new(VoidLoggerFactory),
            next_connection_id: 0,
            connections: BTreeMap::new(),
            active_connections: BTreeSet::new(),
            wakeup_event: None,
            last_progress_time: 0,
        }
    }

    pub fn with_config(config: SimulatorConfig) -> Result<Self, SimError> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new()
        })
    }

    /// Attaches the network, the per-tick aftermath and the logger factory.
    pub fn setup(
        &mut self,
        mut network: Network,
        aftermath: impl Aftermath + 'static,
        loggers: impl LoggerFactory + 'static,
    ) -> Result<(), SimError> {
        self.check_state("setup", &[SimulatorState::Instantiated])?;
        let mut loggers: Box<dyn LoggerFactory> = Box::new(loggers);
        network.attach(loggers.as_mut(), self.config.flow_precision, self.now);
        self.network = network;
        self.aftermath = Some(Box::new(aftermath));
        self.loggers = loggers;
        self.state = SimulatorState::Setup;
        log_info!(
            self,
            "set up with {} nodes and {} links",
            self.network.num_nodes(),
            self.network.num_links()
        );
        Ok(())
    }

    /// Runs the simulation for `duration` units of simulated time.
    ///
    /// If an event trigger or the aftermath fails, the run stops immediately with that error
    /// and the simulator moves to the finished state without flushing the logs.
    pub fn run(&mut self, duration: Time) -> Result<(), SimError> {
        self.check_state("run", &[SimulatorState::Setup])?;
        self.total_runtime = duration;
        self.state = SimulatorState::Running;
        log_info!(self, "running for {} time units", duration);

        if let Err(e) = self.run_ticks() {
            log_error!(self, "run aborted: {}", e);
            self.state = SimulatorState::Finished;
            return Err(e);
        }
        self.shutdown()
    }

    // Queries ---------------------------------------------------------------------------------

    pub fn current_time(&self) -> Time {
        self.now
    }

    /// Duration passed to [`run`](Self::run), zero before the run starts.
    pub fn total_runtime(&self) -> Time {
        self.total_runtime
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn flow_precision(&self) -> f64 {
        self.config.flow_precision
    }

    /// The network being simulated, empty before [`setup`](Self::setup).
    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Takes the network back, e.g. to reuse it in another simulator.
    pub fn into_network(self) -> Network {
        self.network
    }

    /// Connection activated in this simulator (active or terminated).
    pub fn connection(&self, id: ConnectionId) -> Result<&Connection, SimError> {
        self.connections.get(&id).ok_or(SimError::UnknownConnection(id))
    }

    pub(crate) fn connection_mut(&mut self, id: ConnectionId) -> Result<&mut Connection, SimError> {
        self.connections.get_mut(&id).ok_or(SimError::UnknownConnection(id))
    }

    pub fn active_connection_ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.active_connections.iter().copied()
    }

    pub fn active_connections(&self) -> impl Iterator<Item = &Connection> {
        self.active_connections.iter().filter_map(|id| self.connections.get(id))
    }

    pub fn num_active_connections(&self) -> usize {
        self.active_connections.len()
    }

    pub fn is_connection_active(&self, id: ConnectionId) -> bool {
        self.active_connections.contains(&id)
    }

    pub fn is_event_active(&self, id: EventId) -> bool {
        self.queue.is_active(id)
    }

    /// Number of inserted events that are neither triggered nor canceled.
    pub fn num_pending_events(&self) -> usize {
        self.queue.num_active()
    }

    pub fn can_allocate_flow_bandwidth(&self, flow: FlowId, bandwidth: f64) -> bool {
        self.network.can_allocate_flow_bandwidth(flow, bandwidth)
    }

    pub(crate) fn token(&self) -> OwnerToken {
        self.token
    }

    // Connections -----------------------------------------------------------------------------

    /// Creates a connection bound to this simulator, to be activated later.
    ///
    /// Node ids are checked against the network once it is attached.
    pub fn create_connection(&mut self, src: NodeId, dst: NodeId, total_size: f64) -> Result<Connection, SimError> {
        if self.state != SimulatorState::Instantiated {
            self.network.check_node(src)?;
            self.network.check_node(dst)?;
        }
        let connection = Connection::new(
            self.next_connection_id,
            self.token,
            src,
            dst,
            total_size,
            self.config.flow_precision,
        )?;
        self.next_connection_id += 1;
        Ok(connection)
    }

    /// Moves a connection into the active set. Returns its id.
    pub fn activate_connection(&mut self, mut connection: Connection) -> Result<ConnectionId, SimError> {
        self.check_state("activate_connection", &[SimulatorState::Running])?;
        if connection.simulator() != self.token {
            return Err(SimError::ForeignSimulator);
        }
        if connection.status() != ConnectionStatus::AwaitingActivation {
            return Err(SimError::ConnectionStatus {
                id: connection.id(),
                actual: connection.status(),
                expected: ConnectionStatus::AwaitingActivation,
            });
        }
        self.network.check_node(connection.src())?;
        self.network.check_node(connection.dst())?;

        let id = connection.id();
        let log = ConnectionLog::new(
            self.loggers.create_connection_logger(id),
            self.loggers.settings(),
            self.config.flow_precision,
            self.now,
        );
        connection.activate(log);
        log_debug!(self, "activated {}", connection);
        self.connections.insert(id, connection);
        self.active_connections.insert(id);
        Ok(id)
    }

    /// Ends all flows of an active connection and terminates it.
    pub fn terminate_connection(&mut self, id: ConnectionId) -> Result<(), SimError> {
        self.check_state("terminate_connection", &[SimulatorState::Running])?;
        self.active_connection(id)?;
        self.finish_connection(id)
    }

    /// Requests a wake-up once `threshold` more data of the connection is sent.
    pub fn set_remainder_update_threshold(&mut self, id: ConnectionId, threshold: f64) -> Result<(), SimError> {
        self.check_state("set_remainder_update_threshold", &[SimulatorState::Running])?;
        self.connection_mut(id)?.set_remainder_update_threshold(threshold)
    }

    // Flows -----------------------------------------------------------------------------------

    /// Starts a new flow of an active connection along `path`.
    ///
    /// The path must be non-empty, built from links of this simulator's network that are still
    /// present, and go from the connection source to its destination.
    pub fn add_flow_to_connection(&mut self, connection: ConnectionId, path: AcyclicPath) -> Result<FlowId, SimError> {
        self.check_state("add_flow_to_connection", &[SimulatorState::Running])?;
        let conn = self.active_connection(connection)?;
        let (Some(path_src), Some(path_dst)) = (path.src(), path.dst()) else {
            return Err(SimError::EmptyPath);
        };
        if path.network() != Some(self.network.token()) {
            return Err(SimError::ForeignNetwork(path.links()[0]));
        }
        if path_src != conn.src() || path_dst != conn.dst() {
            return Err(SimError::PathEndpointMismatch {
                path_src,
                path_dst,
                src: conn.src(),
                dst: conn.dst(),
            });
        }
        for link_id in path.links() {
            self.network.link(*link_id)?;
        }

        let log = FlowLog::new(
            self.loggers.create_flow_logger(self.network.next_flow_id()),
            self.loggers.settings(),
            self.config.flow_precision,
            self.now,
        );
        let flow_id = self.network.start_flow(connection, path, log, self.now)?;
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.add_flow(flow_id);
        }
        log_trace!(self, "started flow {} of connection {}", flow_id, connection);
        Ok(flow_id)
    }

    /// Sets the bandwidth of an active flow, updating its links and its connection.
    pub fn allocate_flow_bandwidth(&mut self, flow: FlowId, bandwidth: f64) -> Result<(), SimError> {
        self.check_state("allocate_flow_bandwidth", &[SimulatorState::Running])?;
        let (connection, delta) = self.network.allocate_flow_bandwidth(flow, bandwidth, self.now)?;
        if let Some(conn) = self.connections.get_mut(&connection) {
            conn.adapt_bandwidth(delta, self.now);
        }
        Ok(())
    }

    /// Ends an active flow and detaches it from its connection.
    pub fn end_flow(&mut self, flow: FlowId) -> Result<(), SimError> {
        self.check_state("end_flow", &[SimulatorState::Running])?;
        let connection = self.network.active_flow(flow)?.connection();
        self.active_connection(connection)?;
        let ended = self.network.end_flow(flow, self.now)?;
        self.detach_flows(&[ended]);
        Ok(())
    }

    /// Attaches free-form metadata to an active flow, reported in its info record.
    pub fn set_flow_metadata(&mut self, flow: FlowId, metadata: impl Into<String>) -> Result<(), SimError> {
        self.check_state("set_flow_metadata", &[SimulatorState::Running])?;
        self.network.active_flow_mut(flow)?.set_metadata(metadata);
        Ok(())
    }

    // Topology --------------------------------------------------------------------------------

    /// Adds a link during the run. Returns its id.
    pub fn add_new_link(&mut self, from: NodeId, to: NodeId, capacity: f64) -> Result<LinkId, SimError> {
        self.check_state("add_new_link", &[SimulatorState::Running])?;
        self.network.check_new_link(from, to, capacity)?;
        let log = LinkLog::new(
            self.loggers.create_link_logger(self.network.next_link_id()),
            self.loggers.settings(),
            self.config.flow_precision,
            self.now,
        );
        let id = self.network.insert_link(from, to, capacity, log)?;
        log_debug!(self, "added link {} ({} -> {}, capacity {})", id, from, to, capacity);
        Ok(id)
    }

    /// Removes a link during the run, ending every flow routed over it.
    pub fn remove_existing_link(&mut self, link: LinkId) -> Result<(), SimError> {
        self.check_state("remove_existing_link", &[SimulatorState::Running])?;
        let ended = self.network.remove_link(link, self.now)?;
        log_debug!(self, "removed link {}, ended {} flows", link, ended.len());
        self.detach_flows(&ended);
        Ok(())
    }

    // Events ----------------------------------------------------------------------------------

    /// Inserts an event into the queue. Returns its id.
    ///
    /// While running, the event must be strictly in the future.
    pub fn insert_event(&mut self, event: Event) -> Result<EventId, SimError> {
        self.check_event(&event)?;
        Ok(self.queue.push(event))
    }

    /// Inserts several events; either all of them are inserted or none.
    pub fn insert_events(&mut self, events: impl IntoIterator<Item = Event>) -> Result<Vec<EventId>, SimError> {
        let events: Vec<Event> = events.into_iter().collect();
        for event in &events {
            self.check_event(event)?;
        }
        Ok(events.into_iter().map(|event| self.queue.push(event)).collect())
    }

    /// Cancels an active event that is strictly in the future.
    pub fn cancel_event(&mut self, id: EventId) -> Result<(), SimError> {
        self.check_state("cancel_event", &[SimulatorState::Setup, SimulatorState::Running])?;
        let time = self.queue.scheduled_time(id).ok_or(SimError::UnknownEvent(id))?;
        if !self.queue.is_active(id) {
            return Err(SimError::InactiveEvent(id));
        }
        self.check_future(time)?;
        self.queue.cancel(id);
        Ok(())
    }

    // Internals -------------------------------------------------------------------------------

    fn check_state(&self, operation: &'static str, allowed: &[SimulatorState]) -> Result<(), SimError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(SimError::IllegalState {
                operation,
                state: self.state,
            })
        }
    }

    fn check_event(&self, event: &Event) -> Result<(), SimError> {
        self.check_state("insert_event", &[SimulatorState::Setup, SimulatorState::Running])?;
        if event.simulator() != self.token {
            return Err(SimError::ForeignSimulator);
        }
        self.check_future(event.time())
    }

    fn check_future(&self, time: Time) -> Result<(), SimError> {
        if time < self.now || (time == self.now && self.state == SimulatorState::Running) {
            return Err(SimError::EventNotInFuture { time, now: self.now });
        }
        Ok(())
    }

    fn active_connection(&self, id: ConnectionId) -> Result<&Connection, SimError> {
        let connection = self.connection(id)?;
        if !connection.is_active() {
            return Err(SimError::ConnectionStatus {
                id,
                actual: connection.status(),
                expected: ConnectionStatus::Active,
            });
        }
        Ok(connection)
    }

    fn detach_flows(&mut self, ended: &[EndedFlow]) {
        for flow in ended {
            if let Some(conn) = self.connections.get_mut(&flow.connection) {
                conn.remove_flow(flow.id, flow.bandwidth, self.now);
            }
        }
    }

    fn finish_connection(&mut self, id: ConnectionId) -> Result<(), SimError> {
        let flows: Vec<FlowId> = self.connection(id)?.flows().iter().copied().collect();
        let mut ended = Vec::with_capacity(flows.len());
        for flow in flows {
            ended.push(self.network.end_flow(flow, self.now)?);
        }
        self.detach_flows(&ended);
        let now = self.now;
        let connection = self.connection_mut(id)?;
        connection.flush_log(now);
        connection.terminate();
        self.active_connections.remove(&id);
        log_debug!(self, "terminated connection {}", id);
        Ok(())
    }

    fn run_ticks(&mut self) -> Result<(), SimError> {
        while let Some(time) = self.queue.peek_time() {
            if time > self.total_runtime {
                break;
            }
            let elapsed = time - self.now;
            self.now = time;
            if elapsed > 0 {
                self.update_connection_progression(elapsed)?;
            }

            while self.queue.peek_time() == Some(self.now) {
                let Some(event) = self.queue.pop() else {
                    break;
                };
                log_trace!(self, "triggering event {}", event.key.id);
                event.trigger.trigger(self)?;
            }

            self.perform_aftermath()?;

            if self.now == self.total_runtime {
                self.show_progress(true);
                break;
            }
            self.schedule_wakeup();
            self.show_progress(false);
        }
        Ok(())
    }

    fn update_connection_progression(&mut self, elapsed: Time) -> Result<(), SimError> {
        let mut finished = Vec::new();
        for id in self.active_connections.iter() {
            if let Some(connection) = self.connections.get_mut(id) {
                if connection.reduce_remainder(elapsed) {
                    finished.push(*id);
                }
            }
        }
        for id in finished {
            self.finish_connection(id)?;
        }
        Ok(())
    }

    fn perform_aftermath(&mut self) -> Result<(), SimError> {
        let Some(mut aftermath) = self.aftermath.take() else {
            return Ok(());
        };
        let result = aftermath.perform(self);
        self.aftermath = Some(aftermath);
        result
    }

    fn schedule_wakeup(&mut self) {
        if let Some(id) = self.wakeup_event.take() {
            if self.queue.is_active(id) {
                self.queue.cancel(id);
            }
        }
        let delay = self
            .active_connections()
            .map(|c| c.time_till_update_needed())
            .fold(self.total_runtime - self.now, Time::min)
            .max(1);
        let event = Event::new(self, 0, delay, |_: &mut Simulator| Ok(()));
        self.wakeup_event = Some(self.queue.push(event));
    }

    fn show_progress(&mut self, last: bool) {
        if !last && self.now - self.last_progress_time < self.config.progress_show_interval {
            return;
        }
        self.last_progress_time = self.now;
        log_info!(
            self,
            "progress: {}",
            json!({
                "time": self.now,
                "runtime": self.total_runtime,
                "active_connections": self.active_connections.len(),
                "active_flows": self.network.num_active_flows(),
                "pending_events": self.queue.num_active(),
            })
        );
    }

    fn shutdown(&mut self) -> Result<(), SimError> {
        self.now = self.total_runtime;
        self.network.flush_logs(self.now);
        for id in self.active_connections.iter() {
            if let Some(connection) = self.connections.get_mut(id) {
                connection.flush_log(self.now);
            }
        }
        let ended = self.network.finalize_flows(self.now)?;
        self.detach_flows(&ended);
        self.loggers.close();
        self.state = SimulatorState::Finished;
        log_info!(
            self,
            "finished with {} active connections left",
            self.active_connections.len()
        );
        Ok(())
    }
}
