use std::{
    collections::BTreeMap,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use crate::{
    foundation::{
        core::{ClockTime, TimeSpan},
        error::{EditError, EditResult},
        meta::MetaValue,
    },
    timeline::{
        control::{BindingMode, ControlBinding, ControlSource},
        track::TrackType,
    },
};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! object_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u64);

        impl $name {
            pub(crate) fn next() -> Self {
                Self(next_id())
            }

            /// Raw numeric value.
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

object_id!(
    /// Identity of a [`crate::Clip`].
    ClipId,
    "clip"
);
object_id!(
    /// Identity of a [`TrackElement`].
    ElementId,
    "element"
);
object_id!(
    /// Identity of a [`crate::Track`].
    TrackId,
    "track"
);
object_id!(
    /// Identity of a [`crate::Layer`].
    LayerId,
    "layer"
);

/// Role of an element inside its track.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Media or generated content of a source clip.
    Source,
    /// Filter applied to the sources below it.
    Effect,
    /// Blend between two overlapping sources.
    Transition,
}

/// Track-level object: time extent, priority and keyframed properties.
///
/// Values handed out by [`crate::Track::elements`] and [`crate::Timeline::element`]
/// are snapshots; edits go through the owning [`crate::Timeline`].
#[derive(Clone, Debug)]
pub struct TrackElement {
    pub(crate) id: ElementId,
    pub(crate) owner: ClipId,
    pub(crate) track_type: TrackType,
    pub(crate) kind: ElementKind,
    pub(crate) asset: String,
    pub(crate) start: ClockTime,
    pub(crate) duration: ClockTime,
    pub(crate) in_point: ClockTime,
    pub(crate) priority: u32,
    pub(crate) active: bool,
    pub(crate) locked: bool,
    pub(crate) properties: BTreeMap<String, MetaValue>,
    pub(crate) bindings: BTreeMap<String, Rc<ControlBinding>>,
}

impl TrackElement {
    pub(crate) fn new(
        owner: ClipId,
        track_type: TrackType,
        kind: ElementKind,
        asset: impl Into<String>,
        span: TimeSpan,
    ) -> Self {
        Self {
            id: ElementId::next(),
            owner,
            track_type,
            kind,
            asset: asset.into(),
            start: span.start,
            duration: span.duration,
            in_point: ClockTime::ZERO,
            priority: 0,
            active: true,
            locked: true,
            properties: BTreeMap::new(),
            bindings: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ElementId {
        self.id
    }

    /// Clip this element belongs to.
    pub fn owner(&self) -> ClipId {
        self.owner
    }

    pub fn track_type(&self) -> TrackType {
        self.track_type
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// Asset (or effect/transition name) rendered by this element.
    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn start(&self) -> ClockTime {
        self.start
    }

    pub fn duration(&self) -> ClockTime {
        self.duration
    }

    pub fn in_point(&self) -> ClockTime {
        self.in_point
    }

    /// `[start, start + duration)`.
    pub fn span(&self) -> TimeSpan {
        TimeSpan {
            start: self.start,
            duration: self.duration,
        }
    }

    /// Compositing priority inside the track; lower is drawn on top.
    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the element follows its clip's start and duration.
    ///
    /// Trimming an element on its own track unlocks it.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Value of a child property.
    pub fn child_property(&self, name: &str) -> Option<&MetaValue> {
        self.properties.get(name)
    }

    /// Every child property, by name.
    pub fn child_properties(&self) -> &BTreeMap<String, MetaValue> {
        &self.properties
    }

    /// Binding of `property`, if any.
    pub fn control_binding(&self, property: &str) -> Option<Rc<ControlBinding>> {
        self.bindings.get(property).cloned()
    }

    /// Every binding, by property name.
    pub fn control_bindings(&self) -> impl Iterator<Item = &Rc<ControlBinding>> {
        self.bindings.values()
    }

    pub(crate) fn set_child_property(&mut self, name: &str, value: MetaValue) -> EditResult<()> {
        if name.trim().is_empty() {
            return Err(EditError::validation("child property name must be non-empty"));
        }
        self.properties.insert(name.to_string(), value);
        Ok(())
    }

    /// Install a fresh binding for `property`, replacing (not mutating) any prior one.
    pub(crate) fn set_control_source(
        &mut self,
        source: &ControlSource,
        property: &str,
        mode: &str,
    ) -> EditResult<Rc<ControlBinding>> {
        if property.trim().is_empty() {
            return Err(EditError::validation("bound property name must be non-empty"));
        }
        let mode: BindingMode = mode.parse()?;
        let binding = Rc::new(ControlBinding::new(
            property.to_string(),
            mode,
            source.clone(),
        ));
        self.bindings
            .insert(property.to_string(), Rc::clone(&binding));
        Ok(binding)
    }

    pub(crate) fn remove_control_binding(&mut self, property: &str) -> bool {
        self.bindings.remove(property).is_some()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/element.rs"]
mod tests;
