use rustc_hash::FxHashMap;

use flowsim_core::{AcyclicPath, LinkId, Network, NodeId, SimError};

/// Builds an acyclic path from a walk given as link ids, cutting out every cycle of the walk.
///
/// When the walk returns to a node it already visited, the links taken since that visit are
/// dropped. Fails if some link is unknown or two consecutive links do not connect.
pub fn convert_to_acyclic(network: &Network, walk: &[LinkId]) -> Result<AcyclicPath, SimError> {
    let Some(first) = walk.first() else {
        return Ok(AcyclicPath::new());
    };
    // node -> number of kept links up to and including the arrival at it
    let mut visited: FxHashMap<NodeId, usize> = FxHashMap::default();
    visited.insert(network.link(*first)?.from(), 0);
    let mut kept = Vec::with_capacity(walk.len());
    for link_id in walk {
        let link = network.link(*link_id)?;
        if let Some(&keep) = visited.get(&link.to()) {
            while kept.len() > keep {
                if let Some(removed) = kept.pop() {
                    visited.remove(&network.link(removed)?.to());
                }
            }
        } else {
            kept.push(*link_id);
            visited.insert(link.to(), kept.len());
        }
    }

    let mut path = AcyclicPath::new();
    for link_id in kept {
        path.push(network.link(link_id)?)?;
    }
    Ok(path)
}
