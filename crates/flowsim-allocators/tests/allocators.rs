use rstest::rstest;
use sugars::{rc, refcell};

use flowsim_allocators::{GenericMmfAllocator, SimpleMmfAllocator, UniformFixedAllocator, UpperLimitMmfAllocator};
use flowsim_core::{
    aftermath_fn, AcyclicPath, Aftermath, Event, Network, NodeId, SimError, Simulator, VoidLoggerFactory,
};

const EPSILON: f64 = 1e-9;

#[derive(Clone, Copy)]
enum AllocatorImpl {
    Simple,
    Generic,
    UpperLimit,
}

impl AllocatorImpl {
    fn build(self) -> Box<dyn Aftermath> {
        match self {
            AllocatorImpl::Simple => Box::new(SimpleMmfAllocator::new()),
            AllocatorImpl::Generic => Box::new(GenericMmfAllocator::new()),
            AllocatorImpl::UpperLimit => Box::new(UpperLimitMmfAllocator::new()),
        }
    }
}

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(
        (x - y).abs() < eps || (x.max(y) - x.min(y)) / x.min(y) < eps,
        "Values do not match: {:.15} vs {:.15}",
        x,
        y
    );
}

fn assert_bandwidths(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len());
    for (x, y) in actual.iter().zip(expected) {
        assert_float_eq(*x, *y, EPSILON);
    }
}

fn start_flow(sim: &mut Simulator, route: &[NodeId]) -> Result<(), SimError> {
    let network = sim.network();
    let links = route
        .windows(2)
        .map(|hop| network.link(network.links_between(hop[0], hop[1])[0]))
        .collect::<Result<Vec<_>, _>>()?;
    let path = AcyclicPath::from_links(links)?;
    let connection = sim.create_connection(route[0], route[route.len() - 1], 1e9)?;
    let id = sim.activate_connection(connection)?;
    sim.add_flow_to_connection(id, path)?;
    Ok(())
}

fn check_capacity(sim: &Simulator) {
    let network = sim.network();
    for link in network.links() {
        assert!(link.remainder_capacity() >= -EPSILON, "{}", link);
        assert!(link.remainder_capacity() <= link.capacity() + EPSILON, "{}", link);
        let carried: f64 = link
            .active_flows()
            .iter()
            .map(|flow| network.active_flow(*flow).unwrap().bandwidth())
            .sum();
        assert!(carried <= link.capacity() + EPSILON, "{}", link);
    }
    for connection in sim.active_connections() {
        let total: f64 = connection
            .flows()
            .iter()
            .map(|flow| network.active_flow(*flow).unwrap().bandwidth())
            .sum();
        assert_float_eq(total, connection.total_bandwidth(), EPSILON);
    }
}

/// Starts one flow (and connection) per route at time 0, runs the allocator once and returns
/// the resulting flow bandwidths in flow id order.
fn allocate(
    mut allocator: Box<dyn Aftermath>,
    num_nodes: usize,
    links: &[(NodeId, NodeId, f64)],
    routes: &[&[NodeId]],
) -> Result<Vec<f64>, SimError> {
    let mut network = Network::new(num_nodes);
    for (from, to, capacity) in links {
        network.add_link(*from, *to, *capacity)?;
    }
    let routes: Vec<Vec<NodeId>> = routes.iter().map(|route| route.to_vec()).collect();
    let bandwidths = rc!(refcell!(Vec::new()));
    let bandwidths_ = bandwidths.clone();
    let aftermath = aftermath_fn(move |sim: &mut Simulator| {
        if sim.current_time() == 0 {
            for route in routes.iter() {
                start_flow(sim, route)?;
            }
            allocator.perform(sim)?;
            check_capacity(sim);
            *bandwidths_.borrow_mut() = sim.network().active_flows().map(|flow| flow.bandwidth()).collect();
        }
        Ok(())
    });

    let mut sim = Simulator::new();
    sim.setup(network, aftermath, VoidLoggerFactory)?;
    sim.insert_event(Event::new(&sim, 0, 0, |_| Ok(())))?;
    sim.run(1)?;
    let result = bandwidths.borrow().clone();
    Ok(result)
}

fn star_links() -> Vec<(NodeId, NodeId, f64)> {
    let mut links = Vec::new();
    for leaf in 1..=4 {
        links.push((leaf, 0, 10.));
        links.push((0, leaf, 10.));
    }
    links
}

#[rstest]
#[case(AllocatorImpl::Simple)]
#[case(AllocatorImpl::Generic)]
#[case(AllocatorImpl::UpperLimit)]
fn star(#[case] allocator: AllocatorImpl) {
    let routes: [&[NodeId]; 5] = [&[1, 0, 2], &[1, 0, 3], &[1, 0, 4], &[2, 0, 3], &[4, 0, 1]];
    let bandwidths = allocate(allocator.build(), 5, &star_links(), &routes).unwrap();
    assert_bandwidths(
        &bandwidths,
        &[10. / 3., 10. / 3., 10. / 3., 20. / 3., 10.],
    );
}

#[rstest]
#[case(AllocatorImpl::Simple)]
#[case(AllocatorImpl::Generic)]
#[case(AllocatorImpl::UpperLimit)]
fn chain(#[case] allocator: AllocatorImpl) {
    let links = [(0, 1, 5.), (1, 2, 10.)];
    let routes: [&[NodeId]; 3] = [&[0, 1, 2], &[0, 1], &[1, 2]];
    let bandwidths = allocate(allocator.build(), 3, &links, &routes).unwrap();
    assert_bandwidths(&bandwidths, &[2.5, 2.5, 7.5]);
}

#[rstest]
#[case(AllocatorImpl::Simple)]
#[case(AllocatorImpl::Generic)]
#[case(AllocatorImpl::UpperLimit)]
fn no_flows(#[case] allocator: AllocatorImpl) {
    let bandwidths = allocate(allocator.build(), 5, &star_links(), &[]).unwrap();
    assert!(bandwidths.is_empty());
}

#[rstest]
#[case(AllocatorImpl::Simple)]
#[case(AllocatorImpl::Generic)]
#[case(AllocatorImpl::UpperLimit)]
fn parallel_links(#[case] allocator: AllocatorImpl) {
    // two links between the same pair of nodes, flows pinned to the first one
    let links = [(0, 1, 6.), (0, 1, 100.), (1, 2, 3.)];
    let routes: [&[NodeId]; 3] = [&[0, 1], &[0, 1], &[0, 1, 2]];
    let bandwidths = allocate(allocator.build(), 3, &links, &routes).unwrap();
    assert_bandwidths(&bandwidths, &[2., 2., 2.]);
}

#[test]
fn simple_mmf_is_idempotent() {
    let mut network = Network::new(5);
    for (from, to, capacity) in star_links() {
        network.add_link(from, to, capacity).unwrap();
    }
    let mut allocator = SimpleMmfAllocator::new();
    let runs = rc!(refcell!(Vec::new()));
    let runs_ = runs.clone();
    let aftermath = aftermath_fn(move |sim: &mut Simulator| {
        if sim.current_time() == 0 {
            for route in [[1, 0, 2], [1, 0, 3], [1, 0, 4], [2, 0, 3], [4, 0, 1]] {
                start_flow(sim, &route)?;
            }
        }
        for _ in 0..2 {
            allocator.perform(sim)?;
            let bandwidths: Vec<f64> = sim.network().active_flows().map(|flow| flow.bandwidth()).collect();
            let remainders: Vec<f64> = sim.network().links().map(|link| link.remainder_capacity()).collect();
            runs_.borrow_mut().push((bandwidths, remainders));
        }
        Ok(())
    });

    let mut sim = Simulator::new();
    sim.setup(network, aftermath, VoidLoggerFactory).unwrap();
    sim.insert_event(Event::new(&sim, 0, 0, |_| Ok(()))).unwrap();
    sim.insert_event(Event::new(&sim, 0, 5, |_| Ok(()))).unwrap();
    sim.run(10).unwrap();

    let runs = runs.borrow();
    assert!(runs.len() >= 4);
    for run in runs.iter() {
        assert_eq!(*run, runs[0]);
    }
}

#[test]
fn upper_limits() {
    let allocator = UpperLimitMmfAllocator::new().with_upper_limits([(0, 2.), (1, 2.6), (2, 4.), (3, 5.)])
        .unwrap();
    let routes: [&[NodeId]; 4] = [&[0, 1]; 4];
    let bandwidths = allocate(Box::new(allocator), 2, &[(0, 1, 10.)], &routes).unwrap();
    assert_bandwidths(&bandwidths, &[2., 2.6, 2.7, 2.7]);
}

#[rstest]
#[case(&[2., 2.6, 4., 5.], &[1., 1., 1., 1.], 10., &[2., 2.6, 2.7, 2.7])]
#[case(&[f64::INFINITY; 4], &[2., 2.6, 2.7, 2.7], 10., &[2., 2.6, 2.7, 2.7])]
#[case(&[4., 2., 10., 4.], &[2.5, 4., 0.5, 1.], 16., &[4., 2., 6., 4.])]
fn generic_mmf_single_link(
    #[case] upper_limits: &[f64],
    #[case] weights: &[f64],
    #[case] capacity: f64,
    #[case] expected: &[f64],
) {
    let allocator = GenericMmfAllocator::new()
        .with_upper_limits(upper_limits.iter().copied().enumerate())
        .and_then(|allocator| allocator.with_weights(weights.iter().copied().enumerate()))
        .unwrap();
    let routes: [&[NodeId]; 4] = [&[0, 1]; 4];
    let bandwidths = allocate(Box::new(allocator), 2, &[(0, 1, capacity)], &routes).unwrap();
    assert_bandwidths(&bandwidths, expected);
}

#[test]
fn generic_mmf_weighted_chain() {
    let allocator = GenericMmfAllocator::new()
        .with_upper_limits([(0, 100.), (1, 100.), (2, 100.)])
        .and_then(|allocator| allocator.with_weights([(0, 10.), (1, 10.), (2, 1.)]))
        .unwrap();
    let links = [(0, 1, 5.), (1, 2, 10.)];
    let routes: [&[NodeId]; 3] = [&[0, 1, 2], &[0, 1], &[1, 2]];
    let bandwidths = allocate(Box::new(allocator), 3, &links, &routes).unwrap();
    assert_bandwidths(&bandwidths, &[2.5, 2.5, 7.5]);
}

#[test]
fn generic_mmf_weight_does_not_override_bottleneck() {
    let allocator = GenericMmfAllocator::new().with_weights([(0, 9.), (1, 1.)]).unwrap();
    let links = [(0, 1, 10.), (1, 2, 5.)];
    let routes: [&[NodeId]; 2] = [&[0, 1, 2], &[0, 1]];
    let bandwidths = allocate(Box::new(allocator), 3, &links, &routes).unwrap();
    assert_bandwidths(&bandwidths, &[5., 5.]);
}

#[test]
fn generic_mmf_parameters_can_change_during_run() {
    let mut network = Network::new(2);
    network.add_link(0, 1, 12.).unwrap();
    let allocator = rc!(refcell!(GenericMmfAllocator::new()));
    let observed = rc!(refcell!(Vec::new()));

    let mut sim = Simulator::new();
    sim.setup(network, allocator.clone(), VoidLoggerFactory).unwrap();
    sim.insert_event(Event::new(&sim, 0, 0, |sim| {
        start_flow(sim, &[0, 1])?;
        start_flow(sim, &[0, 1])
    }))
    .unwrap();
    let observed_ = observed.clone();
    sim.insert_event(Event::new(&sim, 0, 1, move |sim| {
        observed_.borrow_mut().push(sim.network().active_flow(0)?.bandwidth());
        allocator.borrow_mut().set_weight(0, 2.)?;
        Ok(())
    }))
    .unwrap();
    let observed_ = observed.clone();
    sim.insert_event(Event::new(&sim, 0, 2, move |sim| {
        observed_.borrow_mut().push(sim.network().active_flow(0)?.bandwidth());
        Ok(())
    }))
    .unwrap();
    sim.run(3).unwrap();

    assert_bandwidths(&observed.borrow(), &[6., 8.]);
}

#[test]
fn uniform_fixed() {
    let routes: [&[NodeId]; 3] = [&[0, 1], &[0, 1], &[1, 2]];
    let links = [(0, 1, 10.), (1, 2, 10.)];
    let bandwidths = allocate(Box::new(UniformFixedAllocator::new(3.)), 3, &links, &routes).unwrap();
    assert_bandwidths(&bandwidths, &[3., 3., 3.]);

    let err = allocate(Box::new(UniformFixedAllocator::new(6.)), 3, &links, &routes).unwrap_err();
    assert!(matches!(err, SimError::InsufficientCapacity { flow: 1, link: 0, .. }));
}

#[rstest]
#[case(0.)]
#[case(-1.)]
#[case(f64::NAN)]
#[case(f64::INFINITY)]
fn generic_mmf_rejects_invalid_weight(#[case] weight: f64) {
    let mut allocator = GenericMmfAllocator::new();
    let err = allocator.set_weight(0, weight).unwrap_err();
    assert!(matches!(err, SimError::NonPositiveWeight(_)));
    assert!(err.is_illegal_argument());
    assert_eq!(allocator.weight(0), 1.);
    assert!(GenericMmfAllocator::new().with_weights([(0, 2.), (1, weight)]).is_err());
}

#[rstest]
#[case(-0.5)]
#[case(f64::NAN)]
fn upper_limit_rejects_invalid_limit(#[case] upper_limit: f64) {
    let mut generic = GenericMmfAllocator::new();
    assert!(matches!(
        generic.set_upper_limit(0, upper_limit),
        Err(SimError::NegativeUpperLimit(_))
    ));
    assert_eq!(generic.upper_limit(0), f64::INFINITY);

    let mut unweighted = UpperLimitMmfAllocator::new();
    assert!(matches!(
        unweighted.set_upper_limit(0, upper_limit),
        Err(SimError::NegativeUpperLimit(_))
    ));
    assert!(UpperLimitMmfAllocator::new().with_upper_limits([(0, upper_limit)]).is_err());
}

#[test]
fn zero_upper_limit_starves_flow() {
    let allocator = UpperLimitMmfAllocator::new().with_upper_limits([(0, 0.)]).unwrap();
    let routes: [&[NodeId]; 2] = [&[0, 1]; 2];
    let bandwidths = allocate(Box::new(allocator), 2, &[(0, 1, 10.)], &routes).unwrap();
    assert_bandwidths(&bandwidths, &[0., 10.]);
}
