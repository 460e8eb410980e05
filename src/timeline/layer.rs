use std::{collections::BTreeMap, rc::Rc};

use crate::{
    foundation::{core::TimeSpan, meta::MetaContainer},
    timeline::{
        clip::{Clip, ClipKind},
        element::{ClipId, LayerId},
    },
};

/// Ordered, prioritized group of clips.
///
/// Snapshot type like [`Clip`]; edit through the [`crate::Timeline`].
#[derive(Clone, Debug)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) priority: u32,
    pub(crate) auto_transition: bool,
    pub(crate) clips: Vec<ClipId>,
    pub(crate) metadata: MetaContainer,
}

impl Layer {
    pub(crate) fn new(priority: u32, auto_transition: bool) -> Self {
        Self {
            id: LayerId::next(),
            priority,
            auto_transition,
            clips: Vec::new(),
            metadata: MetaContainer::new(),
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Unique within the timeline; lower layers are drawn on top.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn auto_transition(&self) -> bool {
        self.auto_transition
    }

    /// Every clip (transitions included) ordered by start.
    pub fn clips(&self) -> &[ClipId] {
        &self.clips
    }

    pub fn metadata(&self) -> &MetaContainer {
        &self.metadata
    }

    pub(crate) fn sort_clips(&mut self, clips: &BTreeMap<ClipId, Rc<Clip>>) {
        self.clips.sort_by_key(|id| {
            clips
                .get(id)
                .map(|c| (c.start, c.kind == ClipKind::Transition, *id))
        });
    }

    /// Source clips of this layer overlapping `span`, `exclude` left out.
    pub(crate) fn overlapping_sources(
        &self,
        clips: &BTreeMap<ClipId, Rc<Clip>>,
        span: TimeSpan,
        exclude: Option<ClipId>,
    ) -> Vec<ClipId> {
        self.clips
            .iter()
            .filter_map(|id| clips.get(id))
            .filter(|c| {
                Some(c.id) != exclude && c.kind == ClipKind::Source && c.span().overlaps(span)
            })
            .map(|c| c.id)
            .collect()
    }

    /// Auto-transition clips of this layer.
    pub(crate) fn transitions(&self, clips: &BTreeMap<ClipId, Rc<Clip>>) -> Vec<ClipId> {
        self.clips
            .iter()
            .filter(|id| clips.get(id).is_some_and(|c| c.kind == ClipKind::Transition))
            .copied()
            .collect()
    }
}
