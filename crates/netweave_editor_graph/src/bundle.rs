// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection bundles: groups of port arrows routed through shared handles.
//!
//! Bundles are purely visual. They dissolve on their own once fewer than two
//! member arrows remain and never block a disconnect.

use crate::handle::{BundleHandle, HandleAllocator, PortArrowHandle};
use indexmap::IndexMap;
use netweave_network::PortId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Resolves the scene endpoints of a port arrow
pub trait ArrowGeometry {
    /// Source and destination points of `arrow`, or `None` if it does not exist
    fn endpoints(&self, arrow: PortArrowHandle) -> Option<([f32; 2], [f32; 2])>;
}

/// Layout parameters for default bundle routing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BundleStyle {
    /// Distance between the start/end handle and the connected nodes
    pub margin: f32,
    /// Handle size of an empty bundle
    pub handle_size: f32,
    /// Extra handle size per member arrow
    pub handle_growth: f32,
}

impl Default for BundleStyle {
    fn default() -> Self {
        Self {
            margin: 40.0,
            handle_size: 10.0,
            handle_growth: 1.5,
        }
    }
}

impl BundleStyle {
    fn size_for(&self, links: usize) -> f32 {
        self.handle_size + self.handle_growth * links as f32
    }
}

/// A group of port arrows drawn through a shared path
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionBundle {
    /// Handle of this bundle
    pub handle: BundleHandle,
    links: Vec<PortArrowHandle>,
    handles: Vec<[f32; 2]>,
    start_detached: bool,
    end_detached: bool,
    handle_size: f32,
}

impl ConnectionBundle {
    /// Member arrows
    pub fn links(&self) -> &[PortArrowHandle] {
        &self.links
    }

    /// Whether `link` is a member
    pub fn contains(&self, link: PortArrowHandle) -> bool {
        self.links.contains(&link)
    }

    /// Routing handles, start first and end last
    pub fn handles(&self) -> &[[f32; 2]] {
        &self.handles
    }

    /// Whether the start handle was dragged away from its default position
    pub fn start_detached(&self) -> bool {
        self.start_detached
    }

    /// Whether the end handle was dragged away from its default position
    pub fn end_detached(&self) -> bool {
        self.end_detached
    }

    /// Visual size of the routing handles
    pub fn handle_size(&self) -> f32 {
        self.handle_size
    }
}

/// Persisted form of a bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleRecord {
    /// Member connections as (outport, inport) pairs
    pub connections: Vec<(PortId, PortId)>,
    /// Handle positions, start first and end last
    pub points: Vec<[f32; 2]>,
    /// Start handle detached
    pub start_detached: bool,
    /// End handle detached
    pub end_detached: bool,
}

/// Result of removing an arrow from its bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleChange {
    /// The bundle lost a member and was re-routed
    Shrunk(BundleHandle),
    /// The bundle was dissolved; `remaining` is its last member, now unbundled
    Dissolved {
        /// Dissolved bundle
        bundle: BundleHandle,
        /// Former last member
        remaining: Option<PortArrowHandle>,
    },
}

/// Error when editing bundles
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    /// Fewer than two distinct arrows
    #[error("A bundle needs at least 2 connections, got {0}")]
    TooFewLinks(usize),
    /// Arrow does not exist
    #[error("Port arrow not found: {0}")]
    ArrowNotFound(PortArrowHandle),
    /// Arrow already belongs to a bundle
    #[error("{arrow} is already bundled in {bundle}")]
    AlreadyBundled {
        /// Arrow
        arrow: PortArrowHandle,
        /// Its bundle
        bundle: BundleHandle,
    },
    /// Bundle does not exist
    #[error("Bundle not found: {0}")]
    BundleNotFound(BundleHandle),
    /// Handle index out of range
    #[error("{bundle} has no handle {index}")]
    HandleNotFound {
        /// Bundle
        bundle: BundleHandle,
        /// Requested index
        index: usize,
    },
}

/// Owner of all bundles and of the arrow-to-bundle mapping
#[derive(Debug, Default)]
pub struct BundleManager {
    bundles: IndexMap<BundleHandle, ConnectionBundle>,
    membership: HashMap<PortArrowHandle, BundleHandle>,
    style: BundleStyle,
    ids: HandleAllocator,
}

impl BundleManager {
    /// Create an empty manager
    pub fn new(style: BundleStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Routing parameters
    pub fn style(&self) -> BundleStyle {
        self.style
    }

    /// Bundle at least two unbundled arrows
    pub fn bundle(
        &mut self,
        links: &[PortArrowHandle],
        geometry: &dyn ArrowGeometry,
    ) -> Result<BundleHandle, BundleError> {
        let mut members: Vec<PortArrowHandle> = Vec::with_capacity(links.len());
        for link in links {
            if !members.contains(link) {
                members.push(*link);
            }
        }
        if members.len() < 2 {
            return Err(BundleError::TooFewLinks(members.len()));
        }
        for link in &members {
            if geometry.endpoints(*link).is_none() {
                return Err(BundleError::ArrowNotFound(*link));
            }
            if let Some(bundle) = self.membership.get(link) {
                return Err(BundleError::AlreadyBundled {
                    arrow: *link,
                    bundle: *bundle,
                });
            }
        }

        let handle = BundleHandle(self.ids.next());
        let mut bundle = ConnectionBundle {
            handle,
            links: members,
            handles: Vec::new(),
            start_detached: false,
            end_detached: false,
            handle_size: 0.0,
        };
        reroute(self.style, &mut bundle, geometry);
        for link in &bundle.links {
            self.membership.insert(*link, handle);
        }
        tracing::info!("Bundled {} connections into {handle}", bundle.links.len());
        self.bundles.insert(handle, bundle);
        Ok(handle)
    }

    /// Dissolve a bundle; returns its former members
    pub fn unbundle(&mut self, handle: BundleHandle) -> Result<Vec<PortArrowHandle>, BundleError> {
        let bundle = self
            .bundles
            .shift_remove(&handle)
            .ok_or(BundleError::BundleNotFound(handle))?;
        for link in &bundle.links {
            self.membership.remove(link);
        }
        tracing::info!("Unbundled {handle}");
        Ok(bundle.links)
    }

    /// Insert an interior handle next to the existing handle nearest to `point`.
    ///
    /// Returns the index of the new handle.
    pub fn add_handle(&mut self, handle: BundleHandle, point: [f32; 2]) -> Result<usize, BundleError> {
        let bundle = self
            .bundles
            .get_mut(&handle)
            .ok_or(BundleError::BundleNotFound(handle))?;
        let last = bundle.handles.len().saturating_sub(1);
        let nearest = nearest_index(&bundle.handles, point).unwrap_or(0);

        let index = if nearest == 0 {
            1
        } else if nearest >= last {
            last
        } else {
            let before = distance_sq(bundle.handles[nearest - 1], point);
            let after = distance_sq(bundle.handles[nearest + 1], point);
            if before < after { nearest } else { nearest + 1 }
        };
        let index = index.min(bundle.handles.len());
        bundle.handles.insert(index, point);
        Ok(index)
    }

    /// Move a handle; moving the start or end handle detaches it from default routing
    pub fn move_handle(
        &mut self,
        handle: BundleHandle,
        index: usize,
        point: [f32; 2],
    ) -> Result<(), BundleError> {
        let bundle = self
            .bundles
            .get_mut(&handle)
            .ok_or(BundleError::BundleNotFound(handle))?;
        let last = bundle.handles.len().saturating_sub(1);
        let slot = bundle
            .handles
            .get_mut(index)
            .ok_or(BundleError::HandleNotFound { bundle: handle, index })?;
        *slot = point;
        if index == 0 {
            bundle.start_detached = true;
        }
        if index == last {
            bundle.end_detached = true;
        }
        Ok(())
    }

    /// Remove an arrow whose connection went away from its bundle.
    ///
    /// Returns `None` if the arrow was not bundled.
    pub fn remove_link_from_bundle(
        &mut self,
        link: PortArrowHandle,
        geometry: &dyn ArrowGeometry,
    ) -> Option<BundleChange> {
        let handle = self.membership.remove(&link)?;
        let bundle = self.bundles.get_mut(&handle)?;
        bundle.links.retain(|l| *l != link);

        if bundle.links.len() <= 1 {
            let remaining = bundle.links.first().copied();
            if let Some(last) = remaining {
                self.membership.remove(&last);
            }
            self.bundles.shift_remove(&handle);
            tracing::info!("Dissolved {handle}");
            return Some(BundleChange::Dissolved {
                bundle: handle,
                remaining,
            });
        }

        reroute(self.style, bundle, geometry);
        Some(BundleChange::Shrunk(handle))
    }

    /// Recompute the default routing of every bundle touching one of `links`
    pub fn refresh(&mut self, links: &[PortArrowHandle], geometry: &dyn ArrowGeometry) {
        let style = self.style;
        for bundle in self
            .bundles
            .values_mut()
            .filter(|b| b.links.iter().any(|l| links.contains(l)))
        {
            reroute(style, bundle, geometry);
        }
    }

    /// Get a bundle
    pub fn get(&self, handle: BundleHandle) -> Option<&ConnectionBundle> {
        self.bundles.get(&handle)
    }

    /// All bundles in creation order
    pub fn bundles(&self) -> impl Iterator<Item = &ConnectionBundle> {
        self.bundles.values()
    }

    /// Bundle containing an arrow
    pub fn bundle_of(&self, link: PortArrowHandle) -> Option<BundleHandle> {
        self.membership.get(&link).copied()
    }

    /// Whether an arrow is bundled
    pub fn is_bundled(&self, link: PortArrowHandle) -> bool {
        self.membership.contains_key(&link)
    }

    /// Number of bundles
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Whether there are no bundles
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Persist all bundles, resolving arrows to their (outport, inport) pairs
    pub fn records(
        &self,
        resolve: impl Fn(PortArrowHandle) -> Option<(PortId, PortId)>,
    ) -> Vec<BundleRecord> {
        self.bundles
            .values()
            .map(|b| BundleRecord {
                connections: b.links.iter().filter_map(|l| resolve(*l)).collect(),
                points: b.handles.clone(),
                start_detached: b.start_detached,
                end_detached: b.end_detached,
            })
            .collect()
    }

    /// Rebuild bundles from records; corrupt records are skipped.
    ///
    /// Returns the number of restored bundles.
    pub fn restore(
        &mut self,
        records: &[BundleRecord],
        find: impl Fn(PortId, PortId) -> Option<PortArrowHandle>,
    ) -> usize {
        let mut restored = 0;
        'records: for (i, record) in records.iter().enumerate() {
            if record.points.len() < 2 {
                tracing::warn!("Skipping bundle record {i}: {} handle positions", record.points.len());
                continue;
            }
            let mut links = Vec::with_capacity(record.connections.len());
            for (outport, inport) in &record.connections {
                match find(*outport, *inport) {
                    Some(link) if !self.membership.contains_key(&link) && !links.contains(&link) => {
                        links.push(link)
                    }
                    _ => {
                        tracing::warn!("Skipping bundle record {i}: connection {outport:?} -> {inport:?} not available");
                        continue 'records;
                    }
                }
            }
            if links.len() < 2 {
                tracing::warn!("Skipping bundle record {i}: {} connections", links.len());
                continue;
            }

            let handle = BundleHandle(self.ids.next());
            for link in &links {
                self.membership.insert(*link, handle);
            }
            let handle_size = self.style.size_for(links.len());
            self.bundles.insert(
                handle,
                ConnectionBundle {
                    handle,
                    links,
                    handles: record.points.clone(),
                    start_detached: record.start_detached,
                    end_detached: record.end_detached,
                    handle_size,
                },
            );
            restored += 1;
        }
        restored
    }

    /// Drop all bundles
    pub fn clear(&mut self) {
        self.bundles.clear();
        self.membership.clear();
    }
}

fn reroute(style: BundleStyle, bundle: &mut ConnectionBundle, geometry: &dyn ArrowGeometry) {
    let ends: Vec<([f32; 2], [f32; 2])> = bundle
        .links
        .iter()
        .filter_map(|l| geometry.endpoints(*l))
        .collect();
    bundle.handle_size = style.size_for(bundle.links.len());
    if ends.is_empty() {
        return;
    }

    let n = ends.len() as f32;
    let source_x = ends.iter().map(|(s, _)| s[0]).sum::<f32>() / n;
    let source_y = ends.iter().map(|(s, _)| s[1]).fold(f32::MIN, f32::max);
    let target_x = ends.iter().map(|(_, d)| d[0]).sum::<f32>() / n;
    let target_y = ends.iter().map(|(_, d)| d[1]).fold(f32::MAX, f32::min);
    let start = [source_x, source_y + style.margin];
    let end = [target_x, target_y - style.margin];

    if bundle.handles.len() < 2 {
        bundle.handles = vec![start, end];
        return;
    }
    if !bundle.start_detached {
        bundle.handles[0] = start;
    }
    if !bundle.end_detached {
        let last = bundle.handles.len() - 1;
        bundle.handles[last] = end;
    }
}

fn distance_sq(a: [f32; 2], b: [f32; 2]) -> f32 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}

fn nearest_index(points: &[[f32; 2]], point: [f32; 2]) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| distance_sq(**a, point).total_cmp(&distance_sq(**b, point)))
        .map(|(i, _)| i)
}
