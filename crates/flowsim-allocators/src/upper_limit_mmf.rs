//! Unweighted max-min fair allocation with per-flow upper limits.

use rustc_hash::FxHashMap;

use flowsim_core::{log_debug, Aftermath, FlowId, SimError, Simulator};

use crate::{check_upper_limit, fix_flow, reset_bandwidths, unfixed_flows_per_link};

/// Max-min fair allocator where each flow may be capped by an upper limit.
///
/// Without weights the tightest allocation of a step is always final, so every step fixes one
/// flow for good.
#[derive(Default)]
pub struct UpperLimitMmfAllocator {
    upper_limits: FxHashMap<FlowId, f64>,
}

impl UpperLimitMmfAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upper_limits(
        mut self,
        upper_limits: impl IntoIterator<Item = (FlowId, f64)>,
    ) -> Result<Self, SimError> {
        for (flow, upper_limit) in upper_limits {
            self.set_upper_limit(flow, upper_limit)?;
        }
        Ok(self)
    }

    /// Fails if the limit is negative or NaN. An infinite limit leaves the flow unbounded.
    pub fn set_upper_limit(&mut self, flow: FlowId, upper_limit: f64) -> Result<(), SimError> {
        self.upper_limits.insert(flow, check_upper_limit(upper_limit)?);
        Ok(())
    }

    /// Upper limit of the flow, unbounded if none was set.
    pub fn upper_limit(&self, flow: FlowId) -> f64 {
        self.upper_limits.get(&flow).copied().unwrap_or(f64::INFINITY)
    }
}

impl Aftermath for UpperLimitMmfAllocator {
    fn perform(&mut self, sim: &mut Simulator) -> Result<(), SimError> {
        reset_bandwidths(sim)?;
        let mut unfixed = unfixed_flows_per_link(sim)?;
        let mut num_fixed = 0;

        while !unfixed.is_empty() {
            let mut tightest: Option<(FlowId, f64)> = None;
            for (link_id, flows) in unfixed.iter() {
                let share = sim.network().link(*link_id)?.remainder_capacity() / flows.len() as f64;
                for flow in flows {
                    let allocation = self.upper_limit(*flow).min(share);
                    if tightest.map_or(true, |(_, best)| allocation < best) {
                        tightest = Some((*flow, allocation));
                    }
                }
            }

            // every link in the map has at least one unfixed flow
            let Some((flow, allocation)) = tightest else {
                break;
            };
            sim.allocate_flow_bandwidth(flow, allocation)?;
            fix_flow(sim, flow, &mut unfixed)?;
            num_fixed += 1;
        }

        log_debug!(sim, "upper-limited mmf allocated {} flows", num_fixed);
        Ok(())
    }
}
