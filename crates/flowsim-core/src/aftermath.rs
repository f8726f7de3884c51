//! Hook invoked once per tick after all events of the tick were triggered.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::SimError;
use crate::simulator::Simulator;

/// Policy run at the end of every tick, typically a bandwidth allocator.
///
/// It sees the whole network state and changes it only through the simulator's mutation
/// methods.
pub trait Aftermath {
    fn perform(&mut self, sim: &mut Simulator) -> Result<(), SimError>;
}

/// Aftermath that does nothing.
#[derive(Default)]
pub struct VoidAftermath;

impl Aftermath for VoidAftermath {
    fn perform(&mut self, _sim: &mut Simulator) -> Result<(), SimError> {
        Ok(())
    }
}

/// Shared aftermath, so that a driver can keep tuning it while the simulator owns a handle.
impl<A: Aftermath> Aftermath for Rc<RefCell<A>> {
    fn perform(&mut self, sim: &mut Simulator) -> Result<(), SimError> {
        self.borrow_mut().perform(sim)
    }
}

/// Aftermath backed by a closure, see [`aftermath_fn`].
pub struct AftermathFn<F>(F);

impl<F> Aftermath for AftermathFn<F>
where
    F: FnMut(&mut Simulator) -> Result<(), SimError>,
{
    fn perform(&mut self, sim: &mut Simulator) -> Result<(), SimError> {
        (self.0)(sim)
    }
}

/// Wraps a closure into an [`Aftermath`].
pub fn aftermath_fn<F>(f: F) -> AftermathFn<F>
where
    F: FnMut(&mut Simulator) -> Result<(), SimError>,
{
    AftermathFn(f)
}
