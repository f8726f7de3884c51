use flowsim_core::{Aftermath, FlowId, SimError, Simulator};

use crate::reset_bandwidths;

/// Gives every flow of every active connection the same fixed bandwidth.
///
/// Fails with insufficient capacity if some link cannot carry all of its flows at that rate.
pub struct UniformFixedAllocator {
    flow_bandwidth: f64,
}

impl UniformFixedAllocator {
    pub fn new(flow_bandwidth: f64) -> Self {
        Self { flow_bandwidth }
    }

    pub fn flow_bandwidth(&self) -> f64 {
        self.flow_bandwidth
    }
}

impl Aftermath for UniformFixedAllocator {
    fn perform(&mut self, sim: &mut Simulator) -> Result<(), SimError> {
        reset_bandwidths(sim)?;
        let flows: Vec<FlowId> = sim
            .active_connections()
            .flat_map(|connection| connection.flows().iter().copied())
            .collect();
        for flow in flows {
            sim.allocate_flow_bandwidth(flow, self.flow_bandwidth)?;
        }
        Ok(())
    }
}
