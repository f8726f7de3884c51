//! Unweighted max-min fair allocation.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use priority_queue::DoublePriorityQueue;

use flowsim_core::{log_debug, Aftermath, FlowId, LinkId, SimError, Simulator};

use crate::reset_bandwidths;

/// Share of the remaining capacity of a link that each of its unfixed flows may get.
#[derive(Clone, Copy, Debug)]
struct LinkShare {
    link_id: LinkId,
    unfixed_flows: usize,
    remainder: f64,
}

impl LinkShare {
    fn fair_share(&self) -> f64 {
        self.remainder / self.unfixed_flows as f64
    }
}

impl Ord for LinkShare {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fair_share()
            .total_cmp(&other.fair_share())
            .then(self.link_id.cmp(&other.link_id))
    }
}

impl PartialOrd for LinkShare {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for LinkShare {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for LinkShare {}

/// Max-min fair allocator with equal weights and no upper limits.
///
/// Repeatedly takes the link with the smallest fair share, fixes all its unfixed flows to that
/// share and updates the shares of the links those flows traverse.
/// Runs in O(E^2 + E*F).
#[derive(Default)]
pub struct SimpleMmfAllocator {}

impl SimpleMmfAllocator {
    pub fn new() -> Self {
        Self {}
    }
}

impl Aftermath for SimpleMmfAllocator {
    fn perform(&mut self, sim: &mut Simulator) -> Result<(), SimError> {
        reset_bandwidths(sim)?;

        let mut shares = DoublePriorityQueue::new();
        for link_id in sim.network().flow_active_links() {
            let link = sim.network().link(*link_id)?;
            shares.push(
                *link_id,
                LinkShare {
                    link_id: *link_id,
                    unfixed_flows: link.num_active_flows(),
                    remainder: link.remainder_capacity(),
                },
            );
        }
        let num_links = shares.len();

        let mut fixed = BTreeSet::new();
        while let Some((bottleneck, share)) = shares.pop_min() {
            let bandwidth = share.fair_share();
            let flows: Vec<FlowId> = sim
                .network()
                .link(bottleneck)?
                .active_flows()
                .iter()
                .filter(|flow| !fixed.contains(*flow))
                .copied()
                .collect();

            let mut newly_fixed_on: BTreeMap<LinkId, usize> = BTreeMap::new();
            for flow in flows {
                fixed.insert(flow);
                sim.allocate_flow_bandwidth(flow, bandwidth)?;
                for link_id in sim.network().active_flow(flow)?.links() {
                    *newly_fixed_on.entry(*link_id).or_default() += 1;
                }
            }

            for (link_id, count) in newly_fixed_on {
                let Some((_, share)) = shares.get(&link_id) else {
                    continue;
                };
                if share.unfixed_flows == count {
                    shares.remove(&link_id);
                    continue;
                }
                let remainder = sim.network().link(link_id)?.remainder_capacity();
                shares.change_priority_by(&link_id, |share: &mut LinkShare| {
                    share.unfixed_flows -= count;
                    share.remainder = remainder;
                });
            }
        }

        log_debug!(sim, "mmf allocated {} flows over {} links", fixed.len(), num_links);
        Ok(())
    }
}
