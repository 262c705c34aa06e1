// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Slice orchestration
//!
//! `compute` is pure and may run on any thread; `apply` pushes a computed
//! outcome back into the host. Requests on the same object are serialized
//! by a per-object lock.

use crate::collider::{ColliderInput, COLLIDER_MATERIAL};
use crate::config::{SliceConfig, SliceSettings, SliceType};
use crate::dissection::{dissect, validate_input, Dissection, DissectionStats, NotSlicedReason};
use crate::error::{SliceError, SliceResult};
use crate::geometry::reassembly::merge_pieces;
use crate::geometry::{BoundingBox, Cap, MeshPiece, MeshSnapshot, Side, SlicePlane};
use crate::grouping::{group_islands, Island, IslandSource};
use crate::host::{ColliderId, MaterialId, MeshAdapter, ObjectHost, ObjectId, RendererId};
use dashmap::DashMap;
use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, PoisonError};

/// World-space render mesh of one renderer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RendererInput {
    pub id: RendererId,
    pub mesh: MeshSnapshot,
    /// Material per submesh
    pub materials: Vec<MaterialId>,
    pub config: SliceConfig,
}

/// Everything needed to slice one object
#[derive(Debug, Clone)]
pub struct SliceRequest {
    pub object: ObjectId,
    pub plane: SlicePlane,
    pub renderers: Vec<RendererInput>,
    pub colliders: Vec<ColliderInput>,
}

impl SliceRequest {
    pub fn new(object: ObjectId, plane: SlicePlane) -> Self {
        Self {
            object,
            plane,
            renderers: Vec::new(),
            colliders: Vec::new(),
        }
    }

    pub fn with_renderer(mut self, renderer: RendererInput) -> Self {
        self.renderers.push(renderer);
        self
    }

    pub fn with_collider(mut self, collider: ColliderInput) -> Self {
        self.colliders.push(collider);
        self
    }

    /// Capture the renderers and colliders of `object` from the host
    pub fn gather<H>(host: &H, object: ObjectId, plane: SlicePlane) -> SliceResult<Self>
    where
        H: MeshAdapter + ObjectHost + ?Sized,
    {
        let renderers = host
            .renderers(object)
            .into_iter()
            .map(|id| {
                Ok(RendererInput {
                    id,
                    mesh: MeshSnapshot::capture(host, id)?,
                    materials: host.materials(id),
                    config: host.slice_config(id),
                })
            })
            .collect::<SliceResult<Vec<_>>>()?;

        Ok(Self {
            object,
            plane,
            renderers,
            colliders: host.colliders(object),
        })
    }

    pub fn triangle_count(&self) -> usize {
        self.renderers.iter().map(|r| r.mesh.triangle_count()).sum()
    }

    /// Bounding box of all render meshes
    pub fn bounding_box(&self) -> BoundingBox {
        self.renderers
            .iter()
            .fold(BoundingBox::empty(), |acc, r| acc.union(&r.mesh.bounding_box()))
    }
}

/// Why a request was turned away before any geometry work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// The object has no render triangles
    NoGeometry,
    /// Another slice of the same object is in flight
    Busy,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectReason::NoGeometry => "object has no render triangles",
            RejectReason::Busy => "another slice of the object is in flight",
        };
        f.write_str(text)
    }
}

/// New render mesh of one renderer within a fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererPiece {
    pub renderer: RendererId,
    pub mesh: MeshSnapshot,
    pub materials: Vec<MaterialId>,
}

/// New collision mesh of one collider within a fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColliderPiece {
    pub collider: ColliderId,
    pub mesh: MeshSnapshot,
}

/// One output object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub group: usize,
    pub side: Side,
    pub renderers: Vec<RendererPiece>,
    pub colliders: Vec<ColliderPiece>,
}

impl Fragment {
    pub fn renderer(&self, id: RendererId) -> Option<&RendererPiece> {
        self.renderers.iter().find(|piece| piece.renderer == id)
    }

    pub fn collider(&self, id: ColliderId) -> Option<&ColliderPiece> {
        self.colliders.iter().find(|piece| piece.collider == id)
    }

    pub fn triangle_count(&self) -> usize {
        self.renderers.iter().map(|r| r.mesh.triangle_count()).sum()
    }
}

/// A successfully cut object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlicedObject {
    /// Fragments in group order; the first one stays on the original object
    pub fragments: Vec<Fragment>,
    /// Cut-surface caps of the render meshes
    pub caps: Vec<Cap>,
    /// Render mesh counters summed over renderers
    pub stats: DissectionStats,
}

impl SlicedObject {
    pub fn fragments_on(&self, side: Side) -> impl Iterator<Item = &Fragment> + '_ {
        self.fragments.iter().filter(move |f| f.side == side)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SliceOutcome {
    NotSliced { side: Side, reason: NotSlicedReason },
    Sliced(SlicedObject),
    Rejected { reason: RejectReason },
}

impl SliceOutcome {
    pub fn is_sliced(&self) -> bool {
        matches!(self, SliceOutcome::Sliced(_))
    }

    pub fn as_sliced(&self) -> Option<&SlicedObject> {
        match self {
            SliceOutcome::Sliced(object) => Some(object),
            _ => None,
        }
    }
}

/// Islands and caps produced from one component
#[derive(Default)]
struct ComponentCut {
    islands: Vec<Island>,
    caps: Vec<Cap>,
    stats: DissectionStats,
    not_sliced: Option<NotSlicedReason>,
}

/// Slice a single mesh.
///
/// The mesh is treated as the only renderer of an object. The object-level
/// rules apply: all geometry on one side is `NotSliced`, no triangles is
/// `Rejected`.
pub fn slice_mesh(
    snapshot: &MeshSnapshot,
    plane: &SlicePlane,
    materials: &[MaterialId],
    config: &SliceConfig,
    settings: &SliceSettings,
) -> SliceResult<SliceOutcome> {
    let request = SliceRequest::new(ObjectId(0), *plane).with_renderer(RendererInput {
        id: RendererId(0),
        mesh: snapshot.clone(),
        materials: materials.to_vec(),
        config: config.clone(),
    });
    compute_request(&request, settings)
}

/// Compute the outcome of a request without touching any host state
pub fn compute_request(request: &SliceRequest, settings: &SliceSettings) -> SliceResult<SliceOutcome> {
    for renderer in &request.renderers {
        validate_input(&renderer.mesh, &renderer.materials)?;
    }
    if request.triangle_count() == 0 {
        let reason = RejectReason::NoGeometry;
        debug!("Rejecting slice of {}: {}", request.object, reason);
        return Ok(SliceOutcome::Rejected { reason });
    }

    let plane = &request.plane;
    let center_side = plane.side_of(&request.bounding_box().center());
    debug!(
        "Slicing {} with {} renderers and {} colliders",
        request.object,
        request.renderers.len(),
        request.colliders.len()
    );

    let renderer_cuts = map_inputs(&request.renderers, settings.parallel, |renderer| {
        cut_component(
            IslandSource::Renderer(renderer.id),
            &renderer.mesh,
            &renderer.materials,
            &renderer.config,
            plane,
            center_side,
            settings,
        )
    })?;

    // Object-level fallback when nothing crossed the plane
    let mut renderer_sides = renderer_cuts.iter().flat_map(|cut| cut.islands.iter().map(Island::side));
    if let Some(first) = renderer_sides.next() {
        if renderer_sides.all(|side| side == first) {
            let reason = if request.renderers.iter().all(|r| r.config.slice_type == SliceType::KeepOne) {
                NotSlicedReason::KeepOne
            } else {
                renderer_cuts
                    .iter()
                    .find_map(|cut| cut.not_sliced.filter(|r| *r != NotSlicedReason::KeepOne))
                    .unwrap_or(NotSlicedReason::AllOnOneSide)
            };
            debug!("{} not sliced: {} ({} side)", request.object, reason, first);
            return Ok(SliceOutcome::NotSliced { side: first, reason });
        }
    }

    let collider_cuts = map_inputs(&request.colliders, settings.parallel, |collider| {
        let mesh = collider.to_snapshot()?;
        cut_component(
            IslandSource::Collider(collider.id),
            &mesh,
            &[COLLIDER_MATERIAL],
            &collider.mesh_config(),
            plane,
            center_side,
            settings,
        )
    })?;

    let mut islands = Vec::new();
    let mut caps = Vec::new();
    let mut stats = DissectionStats::default();
    for cut in renderer_cuts {
        islands.extend(cut.islands);
        caps.extend(cut.caps);
        stats.accumulate(&cut.stats);
    }
    for cut in collider_cuts {
        islands.extend(cut.islands);
    }

    let groups = group_islands(&islands, settings);
    let fragments: Vec<Fragment> = groups
        .iter()
        .map(|group| {
            let members: Vec<&Island> = group.members.iter().map(|&i| &islands[i]).collect();

            let renderers = request
                .renderers
                .iter()
                .filter_map(|renderer| {
                    let source = IslandSource::Renderer(renderer.id);
                    merge_pieces(members.iter().filter(|i| i.source == source).map(|i| &i.piece)).map(|piece| {
                        RendererPiece {
                            renderer: renderer.id,
                            mesh: piece.mesh,
                            materials: piece.materials,
                        }
                    })
                })
                .collect();

            let colliders = request
                .colliders
                .iter()
                .filter_map(|collider| {
                    let source = IslandSource::Collider(collider.id);
                    merge_pieces(members.iter().filter(|i| i.source == source).map(|i| &i.piece)).map(|piece| {
                        ColliderPiece {
                            collider: collider.id,
                            mesh: piece.mesh,
                        }
                    })
                })
                .collect();

            Fragment {
                group: group.number,
                side: group.side,
                renderers,
                colliders,
            }
        })
        .collect();

    debug!(
        "Sliced {} into {} fragments with {} caps",
        request.object,
        fragments.len(),
        caps.len()
    );
    Ok(SliceOutcome::Sliced(SlicedObject { fragments, caps, stats }))
}

fn map_inputs<T, R, F>(items: &[T], parallel: bool, f: F) -> SliceResult<Vec<R>>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> SliceResult<R> + Sync + Send,
{
    if parallel && items.len() > 1 {
        items.par_iter().map(&f).collect()
    } else {
        items.iter().map(&f).collect()
    }
}

fn cut_component(
    source: IslandSource,
    mesh: &MeshSnapshot,
    materials: &[MaterialId],
    config: &SliceConfig,
    plane: &SlicePlane,
    center_side: Side,
    settings: &SliceSettings,
) -> SliceResult<ComponentCut> {
    let slice_type = config.slice_type;
    let whole = |side: Side| Island {
        source,
        slice_type,
        piece: MeshPiece {
            side,
            mesh: mesh.clone(),
            materials: materials[..mesh.submesh_count()].to_vec(),
        },
    };

    validate_input(mesh, materials)?;
    if mesh.triangle_count() == 0 {
        return Ok(ComponentCut::default());
    }

    let cut = match slice_type {
        SliceType::Slice => match dissect(mesh, plane, materials, config, settings)? {
            Dissection::Sliced(dissected) => ComponentCut {
                islands: dissected
                    .islands
                    .into_iter()
                    .map(|piece| Island {
                        source,
                        slice_type,
                        piece,
                    })
                    .collect(),
                caps: dissected.caps,
                stats: dissected.stats,
                not_sliced: None,
            },
            Dissection::NotSliced { side, reason, stats } => {
                trace!("{:?} kept whole on the {} side: {}", source, side, reason);
                ComponentCut {
                    islands: vec![whole(side)],
                    caps: Vec::new(),
                    stats,
                    not_sliced: Some(reason),
                }
            }
        },
        SliceType::KeepOne => ComponentCut {
            islands: vec![whole(center_side)],
            not_sliced: Some(NotSlicedReason::KeepOne),
            ..ComponentCut::default()
        },
        SliceType::Duplicate => ComponentCut {
            islands: vec![whole(Side::Positive), whole(Side::Negative)],
            ..ComponentCut::default()
        },
    };
    Ok(cut)
}

#[derive(Default)]
struct ObjectLock {
    busy: Mutex<bool>,
    released: Condvar,
}

type LockMap = DashMap<ObjectId, Arc<ObjectLock>>;

/// Marks an object as mid-slice until dropped
struct InFlightGuard<'a> {
    locks: &'a LockMap,
    object: ObjectId,
    lock: Arc<ObjectLock>,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut busy = self.lock.busy.lock().unwrap_or_else(PoisonError::into_inner);
            *busy = false;
        }
        self.lock.released.notify_all();

        // Only the map and this guard left: nobody is waiting
        self.locks
            .remove_if(&self.object, |_, lock| Arc::ptr_eq(lock, &self.lock) && Arc::strong_count(lock) == 2);
    }
}

fn busy_outcome(object: ObjectId) -> SliceOutcome {
    let reason = RejectReason::Busy;
    debug!("Rejecting slice of {}: {}", object, reason);
    SliceOutcome::Rejected { reason }
}

/// Entry point for slicing objects
pub struct Slicer {
    settings: SliceSettings,
    in_flight: LockMap,
}

impl Slicer {
    pub fn new(settings: SliceSettings) -> Self {
        Self {
            settings,
            in_flight: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &SliceSettings {
        &self.settings
    }

    /// True while a slice of `object` holds its lock
    pub fn is_busy(&self, object: ObjectId) -> bool {
        let Some(lock) = self.in_flight.get(&object).map(|entry| Arc::clone(entry.value())) else {
            return false;
        };
        let busy = *lock.busy.lock().unwrap_or_else(PoisonError::into_inner);
        busy
    }

    /// Mark `object` busy, waiting for a running slice when configured to
    fn acquire(&self, object: ObjectId) -> Option<InFlightGuard<'_>> {
        // Clone the lock out so the map shard is not held while waiting
        let lock = self.in_flight.entry(object).or_default().value().clone();

        let mut busy = lock.busy.lock().unwrap_or_else(PoisonError::into_inner);
        if *busy {
            if !self.settings.wait_if_busy {
                return None;
            }
            trace!("Waiting for in-flight slice of {}", object);
            while *busy {
                busy = lock.released.wait(busy).unwrap_or_else(PoisonError::into_inner);
            }
        }
        *busy = true;
        drop(busy);

        Some(InFlightGuard {
            locks: &self.in_flight,
            object,
            lock,
        })
    }

    /// Compute one request under the object's lock
    pub fn compute(&self, request: &SliceRequest) -> SliceResult<SliceOutcome> {
        let Some(_guard) = self.acquire(request.object) else {
            return Ok(busy_outcome(request.object));
        };
        compute_request(request, &self.settings)
    }

    /// Compute many requests, on the rayon pool when parallel.
    ///
    /// Results come back in request order. Requests on the same object run
    /// one after another in batch order. Object locks are taken on the
    /// calling thread in `ObjectId` order, never from inside the pool.
    pub fn compute_batch(&self, requests: &[SliceRequest]) -> Vec<SliceResult<SliceOutcome>> {
        if !self.settings.parallel {
            return requests.iter().map(|request| self.compute(request)).collect();
        }

        let mut by_object: BTreeMap<ObjectId, Vec<usize>> = BTreeMap::new();
        for (i, request) in requests.iter().enumerate() {
            by_object.entry(request.object).or_default().push(i);
        }
        let batches: Vec<(ObjectId, Option<InFlightGuard<'_>>, Vec<usize>)> = by_object
            .into_iter()
            .map(|(object, indices)| (object, self.acquire(object), indices))
            .collect();
        trace!("Batch of {} requests over {} objects", requests.len(), batches.len());

        let mut results: Vec<(usize, SliceResult<SliceOutcome>)> = batches
            .into_par_iter()
            .map(|(object, guard, indices)| {
                let held = guard.is_some();
                let outcomes: Vec<_> = indices
                    .into_iter()
                    .map(|i| {
                        if held {
                            (i, compute_request(&requests[i], &self.settings))
                        } else {
                            (i, Ok(busy_outcome(object)))
                        }
                    })
                    .collect();
                drop(guard);
                outcomes
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect();
        results.sort_unstable_by_key(|(i, _)| *i);
        results.into_iter().map(|(_, result)| result).collect()
    }

    /// Commit an outcome to the host.
    ///
    /// The first fragment stays on `object`, every other fragment gets a new
    /// copy of it. Renderers and colliders without geometry in a fragment are
    /// emptied or removed. Returns the objects holding the fragments in
    /// fragment order, or just `object` when nothing was cut.
    pub fn apply<H>(&self, host: &mut H, object: ObjectId, outcome: &SliceOutcome) -> SliceResult<Vec<ObjectId>>
    where
        H: MeshAdapter + ObjectHost + ?Sized,
    {
        let SliceOutcome::Sliced(sliced) = outcome else {
            return Ok(vec![object]);
        };
        if sliced.fragments.is_empty() {
            warn!("Sliced outcome for {} has no fragments", object);
            return Ok(vec![object]);
        }

        let copies = host.duplicate(object, sliced.fragments.len() - 1)?;
        if copies.len() != sliced.fragments.len() - 1 {
            return Err(SliceError::host(format!(
                "asked for {} copies of {}, got {}",
                sliced.fragments.len() - 1,
                object,
                copies.len()
            )));
        }
        let targets: Vec<ObjectId> = std::iter::once(object).chain(copies).collect();

        let renderers = host.renderers(object);
        let colliders: Vec<ColliderId> = host.colliders(object).iter().map(|c| c.id).collect();

        for (fragment, &target) in sliced.fragments.iter().zip(&targets) {
            for &original in &renderers {
                let renderer = if target == object {
                    original
                } else {
                    host.find_renderer(target, original)
                        .ok_or_else(|| SliceError::host(format!("{} has no copy of {}", target, original)))?
                };
                match fragment.renderer(original) {
                    Some(piece) => host.commit(renderer, piece.mesh.clone(), piece.materials.clone())?,
                    None => host.commit(renderer, MeshSnapshot::empty(), Vec::new())?,
                }
            }

            for &original in &colliders {
                let collider = if target == object {
                    original
                } else {
                    host.find_collider(target, original)
                        .ok_or_else(|| SliceError::host(format!("{} has no copy of {}", target, original)))?
                };
                match fragment.collider(original) {
                    Some(piece) => host.commit_collider(collider, piece.mesh.clone())?,
                    None => host.remove_collider(collider)?,
                }
            }
        }

        debug!("Applied {} fragments of {}", targets.len(), object);
        Ok(targets)
    }

    /// Gather, compute and apply under one lock
    pub fn slice<H>(&self, host: &mut H, object: ObjectId, plane: SlicePlane) -> SliceResult<SliceOutcome>
    where
        H: MeshAdapter + ObjectHost + ?Sized,
    {
        let Some(_guard) = self.acquire(object) else {
            return Ok(busy_outcome(object));
        };

        let request = SliceRequest::gather(host, object, plane)?;
        let outcome = compute_request(&request, &self.settings)?;
        self.apply(host, object, &outcome)?;
        Ok(outcome)
    }
}

impl Default for Slicer {
    fn default() -> Self {
        Self::new(SliceSettings::default())
    }
}
