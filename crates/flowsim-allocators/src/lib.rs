//! Bandwidth allocators run as the simulator aftermath.
//!
//! Every allocator starts from scratch on each tick: all active flows are reset to zero and
//! bandwidth is then handed out again according to the allocator's policy.

pub mod generic_mmf;
pub mod simple_mmf;
pub mod uniform_fixed;
pub mod upper_limit_mmf;

pub use generic_mmf::GenericMmfAllocator;
pub use simple_mmf::SimpleMmfAllocator;
pub use uniform_fixed::UniformFixedAllocator;
pub use upper_limit_mmf::UpperLimitMmfAllocator;

use std::collections::{BTreeMap, BTreeSet};

use flowsim_core::{FlowId, LinkId, SimError, Simulator};

/// Sets the bandwidth of every active flow to zero, freeing all link capacity.
pub fn reset_bandwidths(sim: &mut Simulator) -> Result<(), SimError> {
    for flow in sim.network().active_flow_ids() {
        sim.allocate_flow_bandwidth(flow, 0.)?;
    }
    Ok(())
}

/// Active flows of every link that carries at least one.
pub(crate) fn unfixed_flows_per_link(sim: &Simulator) -> Result<BTreeMap<LinkId, BTreeSet<FlowId>>, SimError> {
    let network = sim.network();
    let mut unfixed = BTreeMap::new();
    for link_id in network.flow_active_links() {
        unfixed.insert(*link_id, network.link(*link_id)?.active_flows().clone());
    }
    Ok(unfixed)
}

pub(crate) fn check_upper_limit(upper_limit: f64) -> Result<f64, SimError> {
    if upper_limit >= 0. {
        Ok(upper_limit)
    } else {
        Err(SimError::NegativeUpperLimit(upper_limit))
    }
}

/// Marks the flow as fixed on every link of its path, dropping links left without unfixed flows.
pub(crate) fn fix_flow(
    sim: &Simulator,
    flow: FlowId,
    unfixed: &mut BTreeMap<LinkId, BTreeSet<FlowId>>,
) -> Result<(), SimError> {
    for link_id in sim.network().active_flow(flow)?.links() {
        if let Some(flows) = unfixed.get_mut(link_id) {
            flows.remove(&flow);
            if flows.is_empty() {
                unfixed.remove(link_id);
            }
        }
    }
    Ok(())
}
