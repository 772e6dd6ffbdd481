// SPDX-License-Identifier: MIT OR Apache-2.0
//! Registry mapping property links to the arrows that show them.
//!
//! At most one arrow exists per unordered pair of properties. A link in the
//! opposite direction of an existing arrow attaches to it as its reverse
//! component instead of creating a second arrow.

use crate::arrow::PropertyArrow;
use crate::handle::{HandleAllocator, NodeHandle, PropertyArrowHandle, PropertyEndpoint};
use indexmap::{IndexMap, IndexSet};
use netweave_network::{PropertyLink, PropertyLinkId};
use std::collections::HashMap;

/// Error registering a property link
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The property pair already has links in both directions, or the link is known
    #[error("Duplicate property link: {0:?}")]
    DuplicateLink(PropertyLinkId),
}

/// Which end of an arrow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowEnd {
    /// Source end of the primary link
    Source,
    /// Destination end of the primary link
    Destination,
}

/// What `unregister` did
#[derive(Debug, Clone, PartialEq)]
pub enum Unregistered {
    /// The arrow keeps its other link
    Kept(PropertyArrowHandle),
    /// The arrow was deleted
    Removed(PropertyArrow),
}

/// Bidirectional map between property links and arrows
#[derive(Debug, Default)]
pub struct PropertyLinkRegistry {
    arrows: IndexMap<PropertyArrowHandle, PropertyArrow>,
    by_link: HashMap<PropertyLinkId, PropertyArrowHandle>,
    /// Property handles currently materialized on nodes
    handles: IndexSet<PropertyEndpoint>,
    ids: HandleAllocator,
}

impl PropertyLinkRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link whose endpoints are shown on `source_node` and `destination_node`.
    ///
    /// `hidden_in` only applies when a new arrow is created.
    pub fn register(
        &mut self,
        link: &PropertyLink,
        source_node: NodeHandle,
        destination_node: NodeHandle,
        hidden_in: Option<NodeHandle>,
    ) -> Result<PropertyArrowHandle, RegistryError> {
        if self.by_link.contains_key(&link.id) {
            return Err(RegistryError::DuplicateLink(link.id));
        }

        let existing = self.arrows.values_mut().find(|a| {
            a.source.property == link.destination && a.destination.property == link.source
        });
        if let Some(arrow) = existing {
            if arrow.reverse.is_some() {
                return Err(RegistryError::DuplicateLink(link.id));
            }
            arrow.reverse = Some((link.id, link.evaluator));
            arrow.source_arrowhead = true;
            let handle = arrow.handle;
            self.by_link.insert(link.id, handle);
            return Ok(handle);
        }

        if self
            .arrows
            .values()
            .any(|a| a.source.property == link.source && a.destination.property == link.destination)
        {
            return Err(RegistryError::DuplicateLink(link.id));
        }

        let handle = PropertyArrowHandle(self.ids.next());
        let source = PropertyEndpoint::new(source_node, link.source);
        let destination = PropertyEndpoint::new(destination_node, link.destination);
        self.handles.insert(source);
        self.handles.insert(destination);
        self.arrows.insert(
            handle,
            PropertyArrow {
                handle,
                source,
                destination,
                forward: link.id,
                evaluator: link.evaluator,
                reverse: None,
                source_arrowhead: false,
                hidden_in,
            },
        );
        self.by_link.insert(link.id, handle);
        Ok(handle)
    }

    /// Remove a link from its arrow. Returns `None` for unknown links.
    pub fn unregister(&mut self, link_id: PropertyLinkId) -> Option<Unregistered> {
        let handle = self.by_link.remove(&link_id)?;
        let arrow = self.arrows.get_mut(&handle)?;

        if arrow.reverse.is_some_and(|(id, _)| id == link_id) {
            arrow.reverse = None;
            arrow.source_arrowhead = false;
            return Some(Unregistered::Kept(handle));
        }
        if let Some((reverse, evaluator)) = arrow.reverse.take() {
            // Promote the reverse link; the arrow now points the other way
            arrow.forward = reverse;
            arrow.evaluator = evaluator;
            std::mem::swap(&mut arrow.source, &mut arrow.destination);
            arrow.source_arrowhead = false;
            return Some(Unregistered::Kept(handle));
        }

        let arrow = self.arrows.shift_remove(&handle)?;
        self.release(arrow.source);
        self.release(arrow.destination);
        Some(Unregistered::Removed(arrow))
    }

    /// Move one end of an arrow to another node
    pub fn redirect(&mut self, handle: PropertyArrowHandle, end: ArrowEnd, node: NodeHandle) {
        let Some(arrow) = self.arrows.get_mut(&handle) else {
            return;
        };
        let slot = match end {
            ArrowEnd::Source => &mut arrow.source,
            ArrowEnd::Destination => &mut arrow.destination,
        };
        let old = *slot;
        slot.node = node;
        let new = *slot;
        self.handles.insert(new);
        self.release(old);
    }

    /// Hide an arrow inside an aggregate, or show it again
    pub fn set_hidden(&mut self, handle: PropertyArrowHandle, hidden_in: Option<NodeHandle>) {
        if let Some(arrow) = self.arrows.get_mut(&handle) {
            arrow.hidden_in = hidden_in;
        }
    }

    /// Get an arrow
    pub fn arrow(&self, handle: PropertyArrowHandle) -> Option<&PropertyArrow> {
        self.arrows.get(&handle)
    }

    /// Arrow showing a link
    pub fn arrow_for_link(&self, link_id: PropertyLinkId) -> Option<&PropertyArrow> {
        self.by_link.get(&link_id).and_then(|h| self.arrows.get(h))
    }

    /// All arrows
    pub fn arrows(&self) -> impl Iterator<Item = &PropertyArrow> {
        self.arrows.values()
    }

    /// Arrows shown at top level
    pub fn visible_arrows(&self) -> impl Iterator<Item = &PropertyArrow> {
        self.arrows.values().filter(|a| a.is_visible())
    }

    /// Handles of all arrows
    pub fn arrow_handles(&self) -> Vec<PropertyArrowHandle> {
        self.arrows.keys().copied().collect()
    }

    /// Number of arrows
    pub fn arrow_count(&self) -> usize {
        self.arrows.len()
    }

    /// Whether a property handle is materialized
    pub fn has_handle(&self, endpoint: &PropertyEndpoint) -> bool {
        self.handles.contains(endpoint)
    }

    /// Property handles materialized on a node
    pub fn handles_of(&self, node: NodeHandle) -> impl Iterator<Item = &PropertyEndpoint> {
        self.handles.iter().filter(move |h| h.node == node)
    }

    fn release(&mut self, endpoint: PropertyEndpoint) {
        let in_use = self
            .arrows
            .values()
            .any(|a| a.source == endpoint || a.destination == endpoint);
        if !in_use {
            self.handles.shift_remove(&endpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netweave_network::{LinkEvaluator, ProcessorId, PropertyId, PropertyRef};

    fn prop() -> PropertyRef {
        PropertyRef::new(ProcessorId::new(), PropertyId::new())
    }

    const A: NodeHandle = NodeHandle(1);
    const B: NodeHandle = NodeHandle(2);

    #[test]
    fn test_reverse_link_attaches_to_existing_arrow() {
        let (p, q) = (prop(), prop());
        let mut registry = PropertyLinkRegistry::new();
        let forward = PropertyLink::new(p, q, LinkEvaluator::Id);
        let reverse = PropertyLink::new(q, p, LinkEvaluator::Id);

        let h1 = registry.register(&forward, A, B, None).unwrap();
        let h2 = registry.register(&reverse, B, A, None).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(registry.arrow_count(), 1);
        let arrow = registry.arrow(h1).unwrap();
        assert!(arrow.source_arrowhead);
        assert_eq!(arrow.reverse, Some((reverse.id, LinkEvaluator::Id)));
    }

    #[test]
    fn test_third_link_is_duplicate() {
        let (p, q) = (prop(), prop());
        let mut registry = PropertyLinkRegistry::new();
        registry
            .register(&PropertyLink::new(p, q, LinkEvaluator::Id), A, B, None)
            .unwrap();
        registry
            .register(&PropertyLink::new(q, p, LinkEvaluator::Id), B, A, None)
            .unwrap();

        let third = PropertyLink::new(q, p, LinkEvaluator::Invert);
        assert_eq!(
            registry.register(&third, B, A, None),
            Err(RegistryError::DuplicateLink(third.id))
        );
        let same_direction = PropertyLink::new(p, q, LinkEvaluator::Invert);
        assert!(registry.register(&same_direction, A, B, None).is_err());
        assert_eq!(registry.arrow_count(), 1);
    }

    #[test]
    fn test_unregister_promotes_reverse() {
        let (p, q) = (prop(), prop());
        let mut registry = PropertyLinkRegistry::new();
        let forward = PropertyLink::new(p, q, LinkEvaluator::Id);
        let reverse = PropertyLink::new(q, p, LinkEvaluator::Id);
        let handle = registry.register(&forward, A, B, None).unwrap();
        registry.register(&reverse, B, A, None).unwrap();

        assert_eq!(registry.unregister(forward.id), Some(Unregistered::Kept(handle)));
        let arrow = registry.arrow(handle).unwrap();
        assert_eq!(arrow.forward, reverse.id);
        assert_eq!(arrow.source.property, q);
        assert_eq!(arrow.destination.property, p);
        assert!(!arrow.source_arrowhead);
        assert_eq!(registry.arrow_for_link(reverse.id).map(|a| a.handle), Some(handle));
    }

    #[test]
    fn test_promoted_reverse_keeps_its_evaluator() {
        let (p, q) = (prop(), prop());
        let mut registry = PropertyLinkRegistry::new();
        let camera = PropertyLink::new(p, q, LinkEvaluator::CameraId);
        let scale = PropertyLink::new(q, p, LinkEvaluator::Scale(2.0));
        let handle = registry.register(&camera, A, B, None).unwrap();
        registry.register(&scale, B, A, None).unwrap();
        assert_eq!(registry.arrow(handle).unwrap().evaluator, LinkEvaluator::CameraId);

        registry.unregister(camera.id).unwrap();
        let arrow = registry.arrow(handle).unwrap();
        assert_eq!(arrow.forward, scale.id);
        assert_eq!(arrow.evaluator, LinkEvaluator::Scale(2.0));
        assert!(!arrow.evaluator.is_camera());

        // Removing the reverse slot leaves the primary evaluator alone
        let back = PropertyLink::new(p, q, LinkEvaluator::Id);
        registry.register(&back, A, B, None).unwrap();
        registry.unregister(back.id).unwrap();
        assert_eq!(registry.arrow(handle).unwrap().evaluator, LinkEvaluator::Scale(2.0));
    }

    #[test]
    fn test_unregister_last_link_releases_handles() {
        let (p, q, r) = (prop(), prop(), prop());
        let mut registry = PropertyLinkRegistry::new();
        let pq = PropertyLink::new(p, q, LinkEvaluator::Id);
        let pr = PropertyLink::new(p, r, LinkEvaluator::Id);
        registry.register(&pq, A, B, None).unwrap();
        registry.register(&pr, A, B, None).unwrap();

        assert!(matches!(registry.unregister(pq.id), Some(Unregistered::Removed(_))));
        // p is still used by p -> r
        assert!(registry.has_handle(&PropertyEndpoint::new(A, p)));
        assert!(!registry.has_handle(&PropertyEndpoint::new(B, q)));
        assert_eq!(registry.unregister(pq.id), None);
    }

    #[test]
    fn test_at_most_one_arrow_per_pair() {
        let props: Vec<PropertyRef> = (0..4).map(|_| prop()).collect();
        let mut registry = PropertyLinkRegistry::new();
        for (i, a) in props.iter().enumerate() {
            for (j, b) in props.iter().enumerate() {
                if i != j {
                    let _ = registry.register(&PropertyLink::new(*a, *b, LinkEvaluator::Id), A, B, None);
                    let _ = registry.register(&PropertyLink::new(*a, *b, LinkEvaluator::Invert), A, B, None);
                }
            }
        }
        let mut pairs: Vec<(PropertyRef, PropertyRef)> = registry
            .arrows()
            .map(|a| {
                let (x, y) = (a.source.property, a.destination.property);
                if x < y { (x, y) } else { (y, x) }
            })
            .collect();
        let total = pairs.len();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), total);
        assert_eq!(total, 6);
    }

    #[test]
    fn test_redirect_moves_handle() {
        let (p, q) = (prop(), prop());
        let mut registry = PropertyLinkRegistry::new();
        let handle = registry
            .register(&PropertyLink::new(p, q, LinkEvaluator::Id), A, B, None)
            .unwrap();
        let aggregate = NodeHandle(9);
        registry.redirect(handle, ArrowEnd::Source, aggregate);
        assert!(registry.has_handle(&PropertyEndpoint::new(aggregate, p)));
        assert!(!registry.has_handle(&PropertyEndpoint::new(A, p)));
        assert_eq!(registry.handles_of(aggregate).count(), 1);
    }
}
