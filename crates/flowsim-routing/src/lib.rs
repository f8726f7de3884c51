//! Routing of connections onto flows.

pub mod connection_start;
pub mod routing;
pub mod shortest_paths;
pub mod utility;

pub use connection_start::ConnectionStartEvent;
pub use routing::{
    EcmpRoutingStrategy, ExplicitPathsRoutingStrategy, KspMultiPathRoutingStrategy, KspRoutingStrategy, RoutingStrategy,
    SinglePathRoutingStrategy, ValiantRoutingStrategy, VoidRoutingStrategy,
};
pub use utility::convert_to_acyclic;
