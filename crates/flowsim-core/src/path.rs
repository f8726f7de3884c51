//! Acyclic paths over network links.

use rustc_hash::FxHashSet;

use crate::error::SimError;
use crate::link::Link;
use crate::token::OwnerToken;
use crate::{LinkId, NodeId};

/// Sequence of links forming a simple path.
///
/// Every pushed link must start where the path currently ends and must not lead back to a node
/// already on the path. A rejected link leaves the path unchanged.
#[derive(Clone, Debug, Default)]
pub struct AcyclicPath {
    links: Vec<LinkId>,
    nodes: FxHashSet<NodeId>,
    src: Option<NodeId>,
    dst: Option<NodeId>,
    network: Option<OwnerToken>,
}

impl AcyclicPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a path from links in order.
    pub fn from_links<'a>(links: impl IntoIterator<Item = &'a Link>) -> Result<Self, SimError> {
        let mut path = Self::new();
        for link in links {
            path.push(link)?;
        }
        Ok(path)
    }

    /// Appends a link to the end of the path.
    pub fn push(&mut self, link: &Link) -> Result<(), SimError> {
        if let Some(network) = self.network {
            if network != link.network() {
                return Err(SimError::ForeignNetwork(link.id()));
            }
        }
        if let Some(path_end) = self.dst {
            if path_end != link.from() {
                return Err(SimError::DiscontinuousPath {
                    link: link.id(),
                    from: link.from(),
                    path_end,
                });
            }
        }
        if self.nodes.contains(&link.to()) {
            return Err(SimError::CyclicPath {
                link: link.id(),
                node: link.to(),
            });
        }

        self.links.push(link.id());
        self.nodes.insert(link.from());
        self.nodes.insert(link.to());
        self.src.get_or_insert(link.from());
        self.dst = Some(link.to());
        self.network = Some(link.network());
        Ok(())
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// First node of the path, `None` for an empty path.
    pub fn src(&self) -> Option<NodeId> {
        self.src
    }

    /// Last node of the path, `None` for an empty path.
    pub fn dst(&self) -> Option<NodeId> {
        self.dst
    }

    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    pub fn contains_link(&self, link: LinkId) -> bool {
        self.links.contains(&link)
    }

    pub(crate) fn network(&self) -> Option<OwnerToken> {
        self.network
    }
}
