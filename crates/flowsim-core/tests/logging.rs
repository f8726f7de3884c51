use approx::assert_abs_diff_eq;

use flowsim_core::logger::LogInterval;
use flowsim_core::{
    AcyclicPath, Event, LogSettings, MemoryLoggerFactory, Network, SimError, Simulator, SimulatorConfig, VoidAftermath,
};

fn start_transfer(sim: &mut Simulator) -> Result<(), SimError> {
    let mut connection = sim.create_connection(0, 1, 100.)?;
    connection.set_metadata("transfer");
    let id = sim.activate_connection(connection)?;
    let path = AcyclicPath::from_links([sim.network().link(0)?])?;
    let flow = sim.add_flow_to_connection(id, path)?;
    sim.allocate_flow_bandwidth(flow, 10.)
}

fn run_transfer(factory: MemoryLoggerFactory) -> Simulator {
    let mut network = Network::new(2);
    network.add_link(0, 1, 10.).unwrap();
    let mut sim = Simulator::new();
    sim.setup(network, VoidAftermath, factory).unwrap();
    sim.insert_event(Event::new(&sim, 0, 0, start_transfer)).unwrap();
    sim.run(20).unwrap();
    sim
}

#[test]
fn test_memory_log() {
    let factory = MemoryLoggerFactory::new();
    let log = factory.log();
    run_transfer(factory);
    let log = log.borrow();
    assert!(log.closed);

    let connection = &log.connection_info[&0];
    assert_abs_diff_eq!(connection.transmitted, 100., epsilon = 1e-9);
    assert_eq!(connection.start_time, 0);
    assert_eq!(connection.end_time, 10);
    assert_abs_diff_eq!(connection.avg_bandwidth, 10., epsilon = 1e-9);
    assert!(connection.finished);
    assert_eq!(connection.flow_ids, vec![0]);
    assert_eq!(connection.metadata.as_deref(), Some("transfer"));

    let flow = &log.flow_info[&0];
    assert_eq!(flow.connection_id, 0);
    assert_eq!(flow.path, vec![0]);
    assert_eq!((flow.start_time, flow.end_time), (0, 10));
    assert_abs_diff_eq!(flow.total_transmitted, 100., epsilon = 1e-9);
    assert_eq!(log.flow_bandwidth[&0], vec![LogInterval::new(0, 10, 10.)]);

    assert_eq!(
        log.link_utilization[&0],
        vec![LogInterval::new(0, 10, 1.), LogInterval::new(10, 20, 0.)]
    );
    assert_eq!(
        log.link_num_active_flows[&0],
        vec![LogInterval::new(0, 10, 1), LogInterval::new(10, 20, 0)]
    );
    let link = &log.link_info[&0];
    assert_eq!((link.src, link.dst, link.duration), (0, 1, 20));
    assert_abs_diff_eq!(link.avg_utilization, 0.5, epsilon = 1e-9);

    for node in [0, 1] {
        assert_abs_diff_eq!(log.node_info[&node].avg_num_active_flows, 0.5, epsilon = 1e-9);
    }

    let json = log.to_json();
    assert_eq!(json["closed"], true);
    assert_eq!(json["connection_info"]["0"]["finished"], true);
}

#[test]
fn test_info_only() {
    let factory = MemoryLoggerFactory::new().with_settings(LogSettings::info_only());
    let log = factory.log();
    run_transfer(factory);
    let log = log.borrow();

    assert!(log.link_utilization.is_empty());
    assert!(log.flow_bandwidth.is_empty());
    assert!(log.connection_bandwidth.is_empty());
    assert!(log.node_num_active_flows.is_empty());
    assert_eq!(log.connection_info.len(), 1);
    assert_eq!(log.flow_info.len(), 1);
    assert_eq!(log.link_info.len(), 1);
    assert_eq!(log.node_info.len(), 2);
}

#[test]
fn test_unfinished_connection() {
    let factory = MemoryLoggerFactory::new();
    let log = factory.log();
    let sim = {
        let mut network = Network::new(2);
        network.add_link(0, 1, 10.).unwrap();
        let mut sim = Simulator::new();
        sim.setup(network, VoidAftermath, factory).unwrap();
        sim.insert_event(Event::new(&sim, 0, 0, start_transfer)).unwrap();
        sim.run(4).unwrap();
        sim
    };
    assert_abs_diff_eq!(sim.connection(0).unwrap().remainder(), 60., epsilon = 1e-9);

    let log = log.borrow();
    let connection = &log.connection_info[&0];
    assert!(!connection.finished);
    assert_eq!(connection.end_time, 4);
    assert_abs_diff_eq!(connection.transmitted, 40., epsilon = 1e-9);
}

#[test]
fn test_metadata_and_queries() {
    assert!(Simulator::with_config(SimulatorConfig {
        flow_precision: -1.,
        progress_show_interval: 1,
    })
    .is_err());
    let mut sim = Simulator::with_config(SimulatorConfig {
        flow_precision: 1e-6,
        progress_show_interval: 1,
    })
    .unwrap();
    assert_eq!(sim.flow_precision(), 1e-6);

    let mut network = Network::new(2);
    network.add_link(0, 1, 10.).unwrap();
    network.node_mut(0).unwrap().set_metadata("sender");
    network.link_mut(0).unwrap().set_metadata("uplink");
    let factory = MemoryLoggerFactory::new();
    let log = factory.log();
    sim.setup(network, VoidAftermath, factory).unwrap();
    sim.insert_event(Event::new(&sim, 0, 1, |sim| {
        start_transfer(sim)?;
        sim.set_flow_metadata(0, "only flow")?;
        assert_eq!(sim.set_flow_metadata(7, "missing"), Err(SimError::UnknownFlow(7)));
        assert_eq!(sim.active_connection_ids().collect::<Vec<_>>(), vec![0]);
        assert!(sim.is_connection_active(0));
        assert_eq!(sim.network().link(0)?.used_capacity(), 10.);
        Ok(())
    }))
    .unwrap();
    sim.run(20).unwrap();
    assert!(!sim.is_connection_active(0));

    let log = log.borrow();
    assert_eq!(log.node_info[&0].metadata.as_deref(), Some("sender"));
    assert_eq!(log.node_info[&1].metadata, None);
    assert_eq!(log.link_info[&0].metadata.as_deref(), Some("uplink"));
    assert_eq!(log.flow_info[&0].metadata.as_deref(), Some("only flow"));
    assert_eq!(log.connection_info[&0].start_time, 1);
    assert_eq!(log.connection_info[&0].end_time, 11);
}
