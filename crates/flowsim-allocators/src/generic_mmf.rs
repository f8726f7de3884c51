//! Weighted max-min fair allocation with per-flow upper limits.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use flowsim_core::{log_debug, log_warn, Aftermath, FlowId, LinkId, SimError, Simulator};

use crate::{check_upper_limit, fix_flow, reset_bandwidths, unfixed_flows_per_link};

/// Max-min fair allocator honoring per-flow weights and upper limits.
///
/// Flows without a weight get 1, flows without an upper limit are unbounded. Under weights the
/// locally tightest flow is not necessarily settled for good: it is fixed permanently only when
/// it takes all that is left on its link or hits its upper limit, otherwise it is fixed
/// temporarily and released again once some flow gets fixed permanently.
#[derive(Default)]
pub struct GenericMmfAllocator {
    upper_limits: FxHashMap<FlowId, f64>,
    weights: FxHashMap<FlowId, f64>,
}

struct Tightest {
    flow: FlowId,
    link: LinkId,
    allocation: f64,
}

impl GenericMmfAllocator {
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

    pub fn with_weights(mut self, weights: impl IntoIterator<Item = (FlowId, f64)>) -> Result<Self, SimError> {
        for (flow, weight) in weights {
            self.set_weight(flow, weight)?;
        }
        Ok(self)
    }

    pub fn set_upper_limit(&mut self, flow: FlowId, upper_limit: f64) -> Result<(), SimError> {
        self.upper_limits.insert(flow, check_upper_limit(upper_limit)?);
        Ok(())
    }

    /// Fails unless the weight is positive and finite.
    pub fn set_weight(&mut self, flow: FlowId, weight: f64) -> Result<(), SimError> {
        if !(weight > 0. && weight.is_finite()) {
            return Err(SimError::NonPositiveWeight(weight));
        }
        self.weights.insert(flow, weight);
        Ok(())
    }

    pub fn upper_limit(&self, flow: FlowId) -> f64 {
        self.upper_limits.get(&flow).copied().unwrap_or(f64::INFINITY)
    }

    pub fn weight(&self, flow: FlowId) -> f64 {
        self.weights.get(&flow).copied().unwrap_or(1.)
    }
}

impl Aftermath for GenericMmfAllocator {
    fn perform(&mut self, sim: &mut Simulator) -> Result<(), SimError> {
        reset_bandwidths(sim)?;
        let precision = sim.flow_precision();
        let mut unfixed = unfixed_flows_per_link(sim)?;
        let mut temporarily_fixed = BTreeSet::new();
        let mut num_fixed = 0;

        while !unfixed.is_empty() {
            let mut tightest: Option<Tightest> = None;
            for (link_id, flows) in unfixed.iter() {
                let remainder = sim.network().link(*link_id)?.remainder_capacity();
                let candidates = flows.iter().filter(|flow| !temporarily_fixed.contains(*flow));
                let sum_weight: f64 = candidates.clone().map(|flow| self.weight(*flow)).sum();
                for flow in candidates {
                    let allocation = self
                        .upper_limit(*flow)
                        .min(remainder * self.weight(*flow) / sum_weight);
                    if tightest.as_ref().map_or(true, |t| allocation < t.allocation) {
                        tightest = Some(Tightest {
                            flow: *flow,
                            link: *link_id,
                            allocation,
                        });
                    }
                }
            }

            let Some(Tightest { flow, link, allocation }) = tightest else {
                log_warn!(
                    sim,
                    "mmf stopped with {} temporarily fixed flows left",
                    temporarily_fixed.len()
                );
                break;
            };

            let link_is_tight = (allocation - sim.network().link(link)?.remainder_capacity()).abs() <= precision;
            let at_upper_limit = (allocation - self.upper_limit(flow)).abs() <= precision;
            if link_is_tight || at_upper_limit {
                for released in std::mem::take(&mut temporarily_fixed) {
                    sim.allocate_flow_bandwidth(released, 0.)?;
                }
                sim.allocate_flow_bandwidth(flow, allocation)?;
                fix_flow(sim, flow, &mut unfixed)?;
                num_fixed += 1;
            } else {
                sim.allocate_flow_bandwidth(flow, allocation)?;
                temporarily_fixed.insert(flow);
            }
        }

        log_debug!(sim, "weighted mmf allocated {} flows", num_fixed);
        Ok(())
    }
}
