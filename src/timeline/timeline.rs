use std::{
    cell::RefCell,
    collections::{BTreeMap, BTreeSet},
    rc::Rc,
};

use crate::{
    assets::{asset::AssetKind, registry},
    foundation::{
        core::{
            ClockTime, LAYER_HEIGHT, MAX_CLIP_PRIORITY, MAX_EFFECTS_PER_CLIP, TimeSpan,
            clip_band_base,
        },
        error::{EditError, EditResult},
        meta::{MetaContainer, MetaValue},
    },
    timeline::{
        clip::{Clip, ClipBuilder, ClipKind, EffectSlot, check_extent},
        control::{ControlBinding, ControlSource},
        element::{ClipId, ElementId, ElementKind, LayerId, TrackElement, TrackId},
        layer::Layer,
        track::{Track, TrackType},
    },
};

/// Highest layer priority whose element priorities still fit in `u32`.
pub const MAX_LAYER_PRIORITY: u32 = u32::MAX / LAYER_HEIGHT - 1;

#[derive(Clone, Debug)]
struct TimelineData {
    auto_transition: bool,
    complete: bool,
    metadata: MetaContainer,
    layers: Vec<Layer>,
    tracks: Vec<Track>,
    clips: BTreeMap<ClipId, Rc<Clip>>,
}

/// Layers of clips flattened into per-medium tracks.
///
/// A shared handle: clones refer to the same timeline. Every editing method is
/// all-or-nothing; on error the timeline is left exactly as it was.
#[derive(Clone, Debug)]
pub struct Timeline {
    inner: Rc<RefCell<TimelineData>>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    /// Timeline without tracks or layers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TimelineData {
                auto_transition: false,
                complete: true,
                metadata: MetaContainer::new(),
                layers: Vec::new(),
                tracks: Vec::new(),
                clips: BTreeMap::new(),
            })),
        }
    }

    /// Timeline with one video and one audio track.
    pub fn new_audio_video() -> Self {
        let timeline = Self::new();
        {
            let mut data = timeline.inner.borrow_mut();
            data.tracks.push(Track::new(TrackType::Video));
            data.tracks.push(Track::new(TrackType::Audio));
        }
        timeline
    }

    /// Run `f` against a snapshot that is restored on error. Clips and track
    /// elements are shared with the snapshot until `f` touches them.
    fn transact<R>(&self, f: impl FnOnce(&mut TimelineData) -> EditResult<R>) -> EditResult<R> {
        let mut data = self.inner.borrow_mut();
        let backup = data.clone();
        match f(&mut data) {
            Ok(r) => Ok(r),
            Err(e) => {
                *data = backup;
                Err(e)
            }
        }
    }

    /// Whether both handles refer to the same timeline.
    pub fn same_instance(&self, other: &Timeline) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// `false` while its project is still loading or after the load failed.
    pub fn is_complete(&self) -> bool {
        self.inner.borrow().complete
    }

    pub(crate) fn set_complete(&self, complete: bool) {
        self.inner.borrow_mut().complete = complete;
    }

    pub fn auto_transition(&self) -> bool {
        self.inner.borrow().auto_transition
    }

    /// Set auto-transition on the timeline and on every current and future layer.
    pub fn set_auto_transition(&self, enabled: bool) -> EditResult<()> {
        self.transact(|d| {
            d.auto_transition = enabled;
            for li in 0..d.layers.len() {
                d.layers[li].auto_transition = enabled;
                d.recompute_transitions(li)?;
            }
            Ok(())
        })
    }

    pub fn metadata(&self) -> MetaContainer {
        self.inner.borrow().metadata.clone()
    }

    pub fn set_meta(&self, key: &str, value: impl Into<MetaValue>) -> EditResult<()> {
        self.inner.borrow_mut().metadata.set(key, value)
    }

    /// End of the last clip.
    pub fn duration(&self) -> ClockTime {
        self.inner
            .borrow()
            .clips
            .values()
            .map(|c| c.span().end())
            .max()
            .unwrap_or(ClockTime::ZERO)
    }

    // ---- tracks ----

    /// Add an empty track; existing clips are flattened into it.
    pub fn add_track(&self, track: Track) -> EditResult<TrackId> {
        self.transact(|d| {
            if !track.is_empty() {
                return Err(EditError::validation("only empty tracks can be added"));
            }
            let id = track.id();
            if d.tracks.iter().any(|t| t.id() == id) {
                return Err(EditError::duplicate(format!("{id} is already in the timeline")));
            }
            d.tracks.push(track);
            let ti = d.tracks.len() - 1;
            let (sources, transitions): (Vec<_>, Vec<_>) = d
                .clips
                .values()
                .map(|c| (c.id, c.kind))
                .partition(|(_, kind)| *kind == ClipKind::Source);
            for (clip, _) in sources {
                d.place_clip_elements(clip, Some(ti))?;
            }
            for (clip, _) in transitions {
                d.place_transition_element(clip, ti)?;
            }
            tracing::debug!(track = %id, "track added");
            Ok(id)
        })
    }

    /// Remove a track together with its elements.
    pub fn remove_track(&self, id: TrackId) -> EditResult<Track> {
        self.transact(|d| {
            let ti = d.track_idx(id)?;
            let track = d.tracks.remove(ti);
            for el in track.elements() {
                if let Some(clip) = d.clips.get_mut(&el.owner).map(Rc::make_mut) {
                    clip.sources.retain(|e| *e != el.id);
                    for fx in &mut clip.effects {
                        fx.elements.retain(|e| *e != el.id);
                    }
                }
            }
            Ok(track)
        })
    }

    /// Snapshot of every track.
    pub fn tracks(&self) -> Vec<Track> {
        self.inner.borrow().tracks.clone()
    }

    pub fn track(&self, id: TrackId) -> Option<Track> {
        self.inner
            .borrow()
            .tracks
            .iter()
            .find(|t| t.id() == id)
            .cloned()
    }

    /// Independent snapshot of a track's elements.
    pub fn track_elements(&self, id: TrackId) -> EditResult<Vec<TrackElement>> {
        let data = self.inner.borrow();
        Ok(data.tracks[data.track_idx(id)?].elements())
    }

    // ---- layers ----

    /// New layer below every existing one.
    pub fn append_layer(&self) -> EditResult<LayerId> {
        let mut data = self.inner.borrow_mut();
        let priority = data.layers.last().map_or(0, |l| l.priority + 1);
        if priority > MAX_LAYER_PRIORITY {
            return Err(EditError::validation(format!(
                "layer priority must be <= {MAX_LAYER_PRIORITY}"
            )));
        }
        let layer = Layer::new(priority, data.auto_transition);
        let id = layer.id;
        data.layers.push(layer);
        Ok(id)
    }

    /// New layer at `priority`; layers at or below it move down by one.
    pub fn insert_layer(&self, priority: u32) -> EditResult<LayerId> {
        self.transact(|d| {
            let top = d.layers.last().map_or(0, |l| l.priority + 1);
            if priority > MAX_LAYER_PRIORITY || top > MAX_LAYER_PRIORITY {
                return Err(EditError::validation(format!(
                    "layer priority must be <= {MAX_LAYER_PRIORITY}"
                )));
            }
            let shifted: Vec<usize> = (0..d.layers.len())
                .rev()
                .filter(|li| d.layers[*li].priority >= priority)
                .collect();
            for li in shifted {
                d.shift_layer(li)?;
            }
            let layer = Layer::new(priority, d.auto_transition);
            let id = layer.id;
            d.layers.push(layer);
            d.layers.sort_by_key(|l| l.priority);
            Ok(id)
        })
    }

    /// Remove a layer and every clip on it.
    pub fn remove_layer(&self, id: LayerId) -> EditResult<()> {
        self.transact(|d| {
            let li = d.layer_idx(id)?;
            for clip in d.layers[li].transitions(&d.clips) {
                d.destroy_clip(clip)?;
            }
            for clip in d.layers[li].clips.clone() {
                d.destroy_clip(clip)?;
            }
            d.layers.remove(li);
            Ok(())
        })
    }

    /// Layers in priority order.
    pub fn layers(&self) -> Vec<Layer> {
        self.inner.borrow().layers.clone()
    }

    pub fn layer(&self, id: LayerId) -> Option<Layer> {
        self.inner
            .borrow()
            .layers
            .iter()
            .find(|l| l.id == id)
            .cloned()
    }

    pub fn set_layer_auto_transition(&self, id: LayerId, enabled: bool) -> EditResult<()> {
        self.transact(|d| {
            let li = d.layer_idx(id)?;
            d.layers[li].auto_transition = enabled;
            d.recompute_transitions(li)
        })
    }

    pub fn set_layer_meta(
        &self,
        id: LayerId,
        key: &str,
        value: impl Into<MetaValue>,
    ) -> EditResult<()> {
        let mut data = self.inner.borrow_mut();
        let li = data.layer_idx(id)?;
        data.layers[li].metadata.set(key, value)
    }

    /// Clips of a layer ordered by start, transitions included.
    pub fn layer_clips(&self, id: LayerId) -> EditResult<Vec<Clip>> {
        let data = self.inner.borrow();
        let li = data.layer_idx(id)?;
        Ok(data.layers[li]
            .clips
            .iter()
            .filter_map(|c| data.clips.get(c).map(|c| Clip::clone(c)))
            .collect())
    }

    /// Auto-transition clips of a layer.
    pub fn transitions(&self, id: LayerId) -> EditResult<Vec<Clip>> {
        let data = self.inner.borrow();
        let li = data.layer_idx(id)?;
        Ok(data.layers[li]
            .transitions(&data.clips)
            .iter()
            .filter_map(|c| data.clips.get(c).map(|c| Clip::clone(c)))
            .collect())
    }

    // ---- clips ----

    /// Place a clip on `layer` and flatten it into every compatible track.
    pub fn add_clip(&self, layer: LayerId, builder: ClipBuilder) -> EditResult<ClipId> {
        self.transact(|d| {
            let duration = builder.validate()?;
            let li = d.layer_idx(layer)?;
            let span = TimeSpan::new(builder.start, duration)?;
            let (requested, prefer) = if builder.pinned {
                (builder.priority, None)
            } else {
                (None, builder.priority)
            };
            let priority = d.pick_clip_priority(li, span, None, requested, prefer)?;
            let id = ClipId::next();
            d.clips.insert(
                id,
                Rc::new(Clip {
                    id,
                    layer,
                    kind: ClipKind::Source,
                    asset_id: builder.asset_id,
                    asset_kind: builder.asset_kind,
                    start: builder.start,
                    duration,
                    in_point: builder.in_point,
                    max_duration: builder.max_duration,
                    priority,
                    explicit_priority: builder.pinned,
                    track_types: builder.track_types,
                    sources: Vec::new(),
                    effects: Vec::new(),
                    pair: None,
                }),
            );
            d.layers[li].clips.push(id);
            d.layers[li].sort_clips(&d.clips);
            d.place_clip_elements(id, None)?;
            d.create_pairs(id)?;
            tracing::debug!(clip = %id, layer = %layer, priority, "clip added");
            Ok(id)
        })
    }

    /// Remove a source clip, its elements and its transitions.
    pub fn remove_clip(&self, id: ClipId) -> EditResult<()> {
        self.transact(|d| {
            if d.clip(id)?.kind == ClipKind::Transition {
                return Err(EditError::consistency(
                    "auto-transition clips are managed by their layer",
                ));
            }
            d.drop_pairs(id)?;
            d.destroy_clip(id)
        })
    }

    pub fn move_clip(&self, id: ClipId, start: ClockTime) -> EditResult<()> {
        self.transact(|d| {
            d.edit_clip(id, |c| {
                c.start = start;
                Ok(())
            })
        })
    }

    pub fn set_clip_duration(&self, id: ClipId, duration: ClockTime) -> EditResult<()> {
        self.transact(|d| {
            d.edit_clip(id, |c| {
                c.duration = duration;
                Ok(())
            })
        })
    }

    pub fn set_clip_inpoint(&self, id: ClipId, in_point: ClockTime) -> EditResult<()> {
        self.transact(|d| {
            d.edit_clip(id, |c| {
                c.in_point = in_point;
                Ok(())
            })
        })
    }

    /// Pin the clip's priority; fails when an overlapping clip already uses it.
    pub fn set_clip_priority(&self, id: ClipId, priority: u32) -> EditResult<()> {
        self.transact(|d| {
            d.edit_clip(id, |c| {
                c.priority = priority;
                c.explicit_priority = true;
                Ok(())
            })
        })
    }

    pub fn move_clip_to_layer(&self, id: ClipId, layer: LayerId) -> EditResult<()> {
        self.transact(|d| {
            d.layer_idx(layer)?;
            d.edit_clip(id, |c| {
                c.layer = layer;
                Ok(())
            })
        })
    }

    /// Stack the named effect on a clip. Returns its index among the clip's effects.
    pub fn add_effect(&self, id: ClipId, effect: &str) -> EditResult<usize> {
        let track_type = registry::effect_track_type(effect)
            .ok_or_else(|| EditError::resolution(format!("no such element '{effect}'")))?;
        self.transact(|d| {
            let clip = d.clip(id)?;
            if clip.kind != ClipKind::Source {
                return Err(EditError::consistency("effects go on source clips only"));
            }
            if !clip.track_types.contains(&track_type) {
                return Err(EditError::consistency(format!(
                    "{id} has no {track_type} stream for '{effect}'"
                )));
            }
            let stacked = clip
                .effects
                .iter()
                .filter(|fx| fx.track_type == track_type)
                .count();
            if stacked as u32 >= MAX_EFFECTS_PER_CLIP {
                return Err(EditError::consistency(format!(
                    "{id} already has {MAX_EFFECTS_PER_CLIP} {track_type} effects"
                )));
            }
            d.drop_pairs(id)?;
            let clip = d.clip_mut(id)?;
            clip.effects.push(EffectSlot {
                asset: effect.to_string(),
                track_type,
                elements: Vec::new(),
            });
            let index = clip.effects.len() - 1;
            d.sync_clip_elements(id)?;
            d.place_clip_elements(id, None)?;
            d.create_pairs(id)?;
            Ok(index)
        })
    }

    pub fn clip(&self, id: ClipId) -> Option<Clip> {
        self.inner.borrow().clips.get(&id).map(|c| Clip::clone(c))
    }

    /// Every clip, transitions included.
    pub fn clips(&self) -> Vec<Clip> {
        self.inner
            .borrow()
            .clips
            .values()
            .map(|c| Clip::clone(c))
            .collect()
    }

    // ---- elements ----

    /// Snapshot of one element.
    pub fn element(&self, id: ElementId) -> Option<TrackElement> {
        let data = self.inner.borrow();
        let ti = data.locate(id).ok()?;
        data.tracks[ti].element(id).cloned()
    }

    /// Track holding an element.
    pub fn element_track(&self, id: ElementId) -> Option<TrackId> {
        let data = self.inner.borrow();
        data.locate(id).ok().map(|ti| data.tracks[ti].id())
    }

    /// Attach `source` to `property` of an element.
    ///
    /// A second call for the same property installs a new binding object; the
    /// previous one is detached untouched.
    pub fn set_control_source(
        &self,
        id: ElementId,
        source: &ControlSource,
        property: &str,
        mode: &str,
    ) -> EditResult<Rc<ControlBinding>> {
        self.update_element(id, |e| e.set_control_source(source, property, mode))
    }

    pub fn control_binding(&self, id: ElementId, property: &str) -> Option<Rc<ControlBinding>> {
        self.element(id).and_then(|e| e.control_binding(property))
    }

    /// Detach the binding of `property`; `false` when there was none.
    pub fn remove_control_binding(&self, id: ElementId, property: &str) -> EditResult<bool> {
        self.update_element(id, |e| Ok(e.remove_control_binding(property)))
    }

    pub fn set_child_property(
        &self,
        id: ElementId,
        name: &str,
        value: impl Into<MetaValue>,
    ) -> EditResult<()> {
        let value = value.into();
        self.update_element(id, |e| e.set_child_property(name, value))
    }

    /// Enable or disable an element; enabling fails on a priority collision.
    pub fn set_element_active(&self, id: ElementId, active: bool) -> EditResult<()> {
        self.update_element(id, |e| {
            e.active = active;
            Ok(())
        })
    }

    /// Give one element its own extent; it stops following its clip.
    pub fn trim_element(
        &self,
        id: ElementId,
        start: ClockTime,
        duration: ClockTime,
    ) -> EditResult<()> {
        if duration == ClockTime::ZERO {
            return Err(EditError::validation("element duration must be > 0"));
        }
        TimeSpan::new(start, duration)?;
        self.update_element(id, |e| {
            if e.kind == ElementKind::Transition {
                return Err(EditError::consistency(
                    "transition elements follow their overlap",
                ));
            }
            e.start = start;
            e.duration = duration;
            e.locked = false;
            Ok(())
        })
    }

    fn update_element<R>(
        &self,
        id: ElementId,
        edit: impl FnOnce(&mut TrackElement) -> EditResult<R>,
    ) -> EditResult<R> {
        let mut data = self.inner.borrow_mut();
        let ti = data.locate(id)?;
        data.tracks[ti].update_element(id, edit)
    }
}

impl TimelineData {
    fn layer_idx(&self, id: LayerId) -> EditResult<usize> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or_else(|| EditError::consistency(format!("{id} is not in the timeline")))
    }

    fn track_idx(&self, id: TrackId) -> EditResult<usize> {
        self.tracks
            .iter()
            .position(|t| t.id() == id)
            .ok_or_else(|| EditError::consistency(format!("{id} is not in the timeline")))
    }

    fn clip(&self, id: ClipId) -> EditResult<&Clip> {
        self.clips
            .get(&id)
            .map(Rc::as_ref)
            .ok_or_else(|| EditError::consistency(format!("{id} is not in the timeline")))
    }

    fn clip_mut(&mut self, id: ClipId) -> EditResult<&mut Clip> {
        self.clips
            .get_mut(&id)
            .map(Rc::make_mut)
            .ok_or_else(|| EditError::consistency(format!("{id} is not in the timeline")))
    }

    fn locate(&self, id: ElementId) -> EditResult<usize> {
        self.tracks
            .iter()
            .position(|t| t.element(id).is_some())
            .ok_or_else(|| EditError::consistency(format!("{id} is not on any track")))
    }

    /// Source element of `clip` on track `ti`.
    fn source_on(&self, clip: &Clip, ti: usize) -> Option<ElementId> {
        clip.sources
            .iter()
            .copied()
            .find(|e| self.tracks[ti].element(*e).is_some())
    }

    fn pick_clip_priority(
        &self,
        li: usize,
        span: TimeSpan,
        exclude: Option<ClipId>,
        requested: Option<u32>,
        prefer: Option<u32>,
    ) -> EditResult<u32> {
        let used: BTreeSet<u32> = self.layers[li]
            .overlapping_sources(&self.clips, span, exclude)
            .iter()
            .filter_map(|c| self.clips.get(c))
            .map(|c| c.priority)
            .collect();
        if let Some(p) = requested {
            if p >= MAX_CLIP_PRIORITY {
                return Err(EditError::validation(format!(
                    "clip priority must be < {MAX_CLIP_PRIORITY}"
                )));
            }
            if used.contains(&p) {
                return Err(EditError::consistency(format!(
                    "clip priority {p} is already used by an overlapping clip on layer {}",
                    self.layers[li].id
                )));
            }
            return Ok(p);
        }
        if let Some(p) = prefer
            && !used.contains(&p)
        {
            return Ok(p);
        }
        (0..MAX_CLIP_PRIORITY)
            .find(|p| !used.contains(p))
            .ok_or_else(|| EditError::consistency("no free clip priority left on layer"))
    }

    fn element_priority(
        &self,
        clip: &Clip,
        track_type: TrackType,
        effect: Option<usize>,
    ) -> EditResult<u32> {
        let layer = &self.layers[self.layer_idx(clip.layer)?];
        let on_track: Vec<usize> = clip
            .effects
            .iter()
            .enumerate()
            .filter(|(_, fx)| fx.track_type == track_type)
            .map(|(i, _)| i)
            .collect();
        let slot = match effect {
            Some(i) => on_track.iter().position(|x| *x == i).unwrap_or(on_track.len()),
            None => on_track.len(),
        };
        Ok(clip_band_base(layer.priority, clip.priority) + slot as u32)
    }

    /// Create the missing source and effect elements of a source clip, on one
    /// track or on all of them.
    fn place_clip_elements(&mut self, id: ClipId, only: Option<usize>) -> EditResult<()> {
        let tracks: Vec<usize> = match only {
            Some(ti) => vec![ti],
            None => (0..self.tracks.len()).collect(),
        };
        for ti in tracks {
            let clip = self.clip(id)?.clone();
            let track_type = self.tracks[ti].track_type();
            if !clip.track_types.contains(&track_type) {
                continue;
            }
            if self.source_on(&clip, ti).is_none() {
                let mut el = TrackElement::new(
                    id,
                    track_type,
                    ElementKind::Source,
                    clip.asset_id.clone(),
                    clip.span(),
                );
                el.in_point = clip.in_point;
                el.priority = self.element_priority(&clip, track_type, None)?;
                let el_id = el.id;
                self.tracks[ti].add_element(el)?;
                self.clip_mut(id)?.sources.push(el_id);
            }
            for (i, fx) in clip.effects.iter().enumerate() {
                if fx.track_type != track_type
                    || fx.elements.iter().any(|e| self.tracks[ti].element(*e).is_some())
                {
                    continue;
                }
                let mut el = TrackElement::new(
                    id,
                    track_type,
                    ElementKind::Effect,
                    fx.asset.clone(),
                    clip.span(),
                );
                el.priority = self.element_priority(&clip, track_type, Some(i))?;
                let el_id = el.id;
                self.tracks[ti].add_element(el)?;
                self.clip_mut(id)?.effects[i].elements.push(el_id);
            }
        }
        Ok(())
    }

    /// Re-derive extent and priority of a source clip's elements.
    fn sync_clip_elements(&mut self, id: ClipId) -> EditResult<()> {
        let clip = self.clip(id)?.clone();
        let mut owned: Vec<(ElementId, Option<usize>)> =
            clip.sources.iter().map(|e| (*e, None)).collect();
        for (i, fx) in clip.effects.iter().enumerate() {
            owned.extend(fx.elements.iter().map(|e| (*e, Some(i))));
        }
        // Highest slots first so elements moving up never land on a sibling.
        let mut planned = Vec::with_capacity(owned.len());
        for (el, effect) in owned {
            let ti = self.locate(el)?;
            let priority = self.element_priority(&clip, self.tracks[ti].track_type(), effect)?;
            planned.push((ti, el, effect, priority));
        }
        planned.sort_by_key(|(_, _, _, p)| std::cmp::Reverse(*p));
        for (ti, el, effect, priority) in planned {
            self.tracks[ti].update_element(el, |e| {
                e.priority = priority;
                if e.locked {
                    e.start = clip.start;
                    e.duration = clip.duration;
                    if effect.is_none() {
                        e.in_point = clip.in_point;
                    }
                }
                Ok(())
            })?;
        }
        Ok(())
    }

    /// Apply `mutate` to a source clip, then re-place it and its transitions.
    fn edit_clip(
        &mut self,
        id: ClipId,
        mutate: impl FnOnce(&mut Clip) -> EditResult<()>,
    ) -> EditResult<()> {
        let before = self.clip(id)?.clone();
        if before.kind != ClipKind::Source {
            return Err(EditError::consistency(
                "auto-transition clips follow their sources",
            ));
        }
        self.drop_pairs(id)?;
        mutate(self.clip_mut(id)?)?;

        let clip = self.clip(id)?.clone();
        check_extent(clip.in_point, clip.duration, clip.max_duration)?;
        let span = TimeSpan::new(clip.start, clip.duration)?;
        let li = self.layer_idx(clip.layer)?;
        if clip.layer != before.layer {
            let old = self.layer_idx(before.layer)?;
            self.layers[old].clips.retain(|c| *c != id);
            self.layers[li].clips.push(id);
        }
        let requested = clip.explicit_priority.then_some(clip.priority);
        let priority =
            self.pick_clip_priority(li, span, Some(id), requested, Some(clip.priority))?;
        self.clip_mut(id)?.priority = priority;
        self.layers[li].sort_clips(&self.clips);

        self.sync_clip_elements(id)?;
        self.create_pairs(id)?;
        Ok(())
    }

    /// Remove a clip's elements and the clip itself.
    fn destroy_clip(&mut self, id: ClipId) -> EditResult<()> {
        let clip = self.clips.remove(&id).ok_or_else(|| {
            EditError::consistency(format!("{id} is not in the timeline"))
        })?;
        let owned: BTreeSet<ElementId> = clip.elements().into_iter().collect();
        for track in &mut self.tracks {
            track.retain_elements(|e| !owned.contains(&e.id));
        }
        if let Ok(li) = self.layer_idx(clip.layer) {
            self.layers[li].clips.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Remove every auto-transition involving `id`.
    fn drop_pairs(&mut self, id: ClipId) -> EditResult<()> {
        let layer = self.clip(id)?.layer;
        let li = self.layer_idx(layer)?;
        let involved: Vec<ClipId> = self.layers[li]
            .transitions(&self.clips)
            .into_iter()
            .filter(|t| self.clips.get(t).is_some_and(|c| c.involves(id)))
            .collect();
        for t in involved {
            self.destroy_clip(t)?;
            tracing::debug!(transition = %t, clip = %id, "auto-transition removed");
        }
        Ok(())
    }

    /// Create auto-transitions between `id` and every overlapping source clip.
    fn create_pairs(&mut self, id: ClipId) -> EditResult<()> {
        let clip = self.clip(id)?.clone();
        let li = self.layer_idx(clip.layer)?;
        if clip.kind != ClipKind::Source || !self.layers[li].auto_transition {
            return Ok(());
        }
        for other in self.layers[li].overlapping_sources(&self.clips, clip.span(), Some(id)) {
            self.create_transition(li, id, other)?;
        }
        Ok(())
    }

    /// Drop and rebuild every auto-transition of a layer.
    fn recompute_transitions(&mut self, li: usize) -> EditResult<()> {
        for t in self.layers[li].transitions(&self.clips) {
            self.destroy_clip(t)?;
        }
        if !self.layers[li].auto_transition {
            return Ok(());
        }
        let sources: Vec<Rc<Clip>> = self.layers[li]
            .clips
            .iter()
            .filter_map(|c| self.clips.get(c))
            .filter(|c| c.kind == ClipKind::Source)
            .cloned()
            .collect();
        for (i, a) in sources.iter().enumerate() {
            for b in &sources[i + 1..] {
                if b.start >= a.span().end() {
                    break;
                }
                if a.span().overlaps(b.span()) {
                    self.create_transition(li, a.id, b.id)?;
                }
            }
        }
        Ok(())
    }

    fn create_transition(&mut self, li: usize, a: ClipId, b: ClipId) -> EditResult<()> {
        let (ca, cb) = (self.clip(a)?.clone(), self.clip(b)?.clone());
        let Some(overlap) = ca.span().overlap(cb.span()) else {
            return Ok(());
        };
        let pair = if (ca.start, ca.id) <= (cb.start, cb.id) {
            (a, b)
        } else {
            (b, a)
        };
        let id = ClipId::next();
        self.clips.insert(
            id,
            Rc::new(Clip {
                id,
                layer: self.layers[li].id,
                kind: ClipKind::Transition,
                asset_id: registry::DEFAULT_TRANSITION.to_string(),
                asset_kind: AssetKind::Transition,
                start: overlap.start,
                duration: overlap.duration,
                in_point: ClockTime::ZERO,
                max_duration: None,
                priority: ca.priority.min(cb.priority),
                explicit_priority: false,
                track_types: ca
                    .track_types
                    .iter()
                    .copied()
                    .filter(|t| cb.track_types.contains(t))
                    .collect(),
                sources: Vec::new(),
                effects: Vec::new(),
                pair: Some(pair),
            }),
        );
        self.layers[li].clips.push(id);
        self.layers[li].sort_clips(&self.clips);
        for ti in 0..self.tracks.len() {
            self.place_transition_element(id, ti)?;
        }
        tracing::debug!(
            transition = %id,
            from = %pair.0,
            to = %pair.1,
            start = %overlap.start,
            end = %overlap.end(),
            "auto-transition created"
        );
        Ok(())
    }

    /// Transition element on track `ti`, when both paired clips have a source there.
    fn place_transition_element(&mut self, id: ClipId, ti: usize) -> EditResult<()> {
        let transition = self.clip(id)?.clone();
        let Some((a, b)) = transition.pair else {
            return Ok(());
        };
        if self.source_on(&transition, ti).is_some() {
            return Ok(());
        }
        let (ca, cb) = (self.clip(a)?, self.clip(b)?);
        let (Some(ea), Some(eb)) = (self.source_on(ca, ti), self.source_on(cb, ti)) else {
            return Ok(());
        };
        let track = &self.tracks[ti];
        let (pa, pb) = match (track.element(ea), track.element(eb)) {
            (Some(x), Some(y)) => (x.priority, y.priority),
            _ => return Ok(()),
        };
        let span = transition.span();
        let priority = track
            .free_priority_between(pa.min(pb), pa.max(pb), span)
            .ok_or_else(|| {
                EditError::consistency(format!(
                    "no free priority between {a} and {b} on {}",
                    track.id()
                ))
            })?;
        let mut el = TrackElement::new(
            id,
            track.track_type(),
            ElementKind::Transition,
            transition.asset_id.clone(),
            span,
        );
        el.priority = priority;
        let el_id = el.id;
        self.tracks[ti].add_element(el)?;
        self.clip_mut(id)?.sources.push(el_id);
        Ok(())
    }

    /// Move layer `li` one priority down and re-derive its elements.
    fn shift_layer(&mut self, li: usize) -> EditResult<()> {
        for t in self.layers[li].transitions(&self.clips) {
            self.destroy_clip(t)?;
        }
        self.layers[li].priority += 1;
        for clip in self.layers[li].clips.clone() {
            self.sync_clip_elements(clip)?;
        }
        self.recompute_transitions(li)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/timeline.rs"]
mod tests;
