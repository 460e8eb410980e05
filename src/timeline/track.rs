use std::rc::Rc;

use crate::{
    foundation::{
        core::{ClockTime, TimeSpan},
        error::{EditError, EditResult},
    },
    timeline::element::{ElementId, TrackElement, TrackId},
};

/// Medium carried by a track.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrackType {
    /// Audio samples.
    Audio,
    /// Video frames.
    Video,
}

impl std::fmt::Display for TrackType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Audio => "audio",
            Self::Video => "video",
        })
    }
}

/// Single-medium composition channel.
///
/// Elements are kept ordered by `(priority, start, id)`. Two active elements
/// whose time ranges overlap never share a priority. Clones share element
/// storage until one side edits an element.
#[derive(Clone, Debug)]
pub struct Track {
    id: TrackId,
    track_type: TrackType,
    elements: Vec<Rc<TrackElement>>,
}

impl Track {
    /// Empty track.
    pub fn new(track_type: TrackType) -> Self {
        Self {
            id: TrackId::next(),
            track_type,
            elements: Vec::new(),
        }
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Independent copy of the elements in priority order.
    pub fn elements(&self) -> Vec<TrackElement> {
        self.elements.iter().map(|e| TrackElement::clone(e)).collect()
    }

    /// Element by id.
    pub fn element(&self, id: ElementId) -> Option<&TrackElement> {
        self.elements.iter().find(|e| e.id == id).map(Rc::as_ref)
    }

    /// End of the last element.
    pub fn duration(&self) -> ClockTime {
        self.elements
            .iter()
            .map(|e| e.span().end())
            .max()
            .unwrap_or(ClockTime::ZERO)
    }

    /// Place `element`, rejecting a medium mismatch or a priority collision.
    pub fn add_element(&mut self, element: TrackElement) -> EditResult<()> {
        if element.track_type != self.track_type {
            return Err(EditError::consistency(format!(
                "medium mismatch: {} element {} cannot go on {} track {}",
                element.track_type, element.id, self.track_type, self.id
            )));
        }
        if self.element(element.id).is_some() {
            return Err(EditError::duplicate(format!(
                "{} is already on {}",
                element.id, self.id
            )));
        }
        self.check_collision(&element)?;
        self.insert_sorted(Rc::new(element));
        Ok(())
    }

    /// Take `id` off the track.
    pub fn remove_element(&mut self, id: ElementId) -> EditResult<TrackElement> {
        self.take(id).map(Rc::unwrap_or_clone)
    }

    /// Whether placing `candidate` would tie with an overlapping active element.
    pub fn collides(&self, candidate: &TrackElement) -> bool {
        self.check_collision(candidate).is_err()
    }

    /// Apply `edit` to one element; the element is restored when the edit fails
    /// or leaves it colliding.
    pub(crate) fn update_element<R>(
        &mut self,
        id: ElementId,
        edit: impl FnOnce(&mut TrackElement) -> EditResult<R>,
    ) -> EditResult<R> {
        let backup = self.take(id)?;
        let mut element = TrackElement::clone(&backup);
        let placed = edit(&mut element).and_then(|r| {
            self.check_collision(&element)?;
            Ok(r)
        });
        match placed {
            Ok(r) => {
                self.insert_sorted(Rc::new(element));
                Ok(r)
            }
            Err(e) => {
                self.insert_sorted(backup);
                Err(e)
            }
        }
    }

    /// Lowest priority strictly between `lo` and `hi` free over `span`.
    pub(crate) fn free_priority_between(&self, lo: u32, hi: u32, span: TimeSpan) -> Option<u32> {
        ((lo + 1)..hi).find(|p| {
            !self
                .elements
                .iter()
                .any(|e| e.active && e.priority == *p && e.span().overlaps(span))
        })
    }

    fn take(&mut self, id: ElementId) -> EditResult<Rc<TrackElement>> {
        let idx = self
            .elements
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| EditError::consistency(format!("{id} is not on {}", self.id)))?;
        Ok(self.elements.remove(idx))
    }

    fn insert_sorted(&mut self, element: Rc<TrackElement>) {
        let at = self.elements.partition_point(|e| sort_key(e) < sort_key(&element));
        self.elements.insert(at, element);
    }

    fn check_collision(&self, candidate: &TrackElement) -> EditResult<()> {
        if !candidate.active || candidate.duration == ClockTime::ZERO {
            return Ok(());
        }
        let span = candidate.span();
        if let Some(other) = self.elements.iter().find(|e| {
            e.id != candidate.id
                && e.active
                && e.priority == candidate.priority
                && e.span().overlaps(span)
        }) {
            return Err(EditError::consistency(format!(
                "priority collision on {}: {} and {} both at {} over {}..{}",
                self.id,
                candidate.id,
                other.id,
                candidate.priority,
                span.start,
                span.end()
            )));
        }
        Ok(())
    }

    pub(crate) fn retain_elements(&mut self, mut keep: impl FnMut(&TrackElement) -> bool) {
        self.elements.retain(|e| keep(e));
    }
}

fn sort_key(e: &TrackElement) -> (u32, ClockTime, ElementId) {
    (e.priority, e.start, e.id)
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/track.rs"]
mod tests;
