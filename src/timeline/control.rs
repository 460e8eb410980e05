use std::{cell::RefCell, collections::BTreeMap, rc::Rc, str::FromStr};

use crate::foundation::{
    core::ClockTime,
    error::{EditError, EditResult},
};

/// How values between two keyframes are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMode {
    /// Keep the previous keyframe's value until the next one.
    Hold,
    /// Straight line between keyframes.
    #[default]
    Linear,
}

/// How curve values map onto the bound property.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BindingMode {
    /// Curve values are normalized to the property range.
    #[default]
    Direct,
    /// Curve values are used as-is.
    DirectAbsolute,
}

impl BindingMode {
    /// Persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::DirectAbsolute => "direct-absolute",
        }
    }
}

impl FromStr for BindingMode {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "direct" | "" => Ok(Self::Direct),
            "direct-absolute" => Ok(Self::DirectAbsolute),
            other => Err(EditError::validation(format!(
                "unknown binding mode '{other}'"
            ))),
        }
    }
}

/// One keyframe.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimedValue {
    /// Position relative to the element's in-point.
    pub timestamp: ClockTime,
    /// Value at `timestamp`.
    pub value: f64,
}

#[derive(Debug, Default)]
struct Curve {
    mode: InterpolationMode,
    keys: BTreeMap<ClockTime, f64>,
}

/// Keyframe curve that can be bound to element properties.
///
/// A shared handle: clones see the same keyframes, so one source may drive
/// several bindings.
#[derive(Clone, Debug, Default)]
pub struct ControlSource {
    curve: Rc<RefCell<Curve>>,
}

impl ControlSource {
    /// Empty curve with linear interpolation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty curve with the given interpolation.
    pub fn with_mode(mode: InterpolationMode) -> Self {
        let source = Self::default();
        source.curve.borrow_mut().mode = mode;
        source
    }

    /// Interpolation mode.
    pub fn mode(&self) -> InterpolationMode {
        self.curve.borrow().mode
    }

    /// Change the interpolation mode.
    pub fn set_mode(&self, mode: InterpolationMode) {
        self.curve.borrow_mut().mode = mode;
    }

    /// Insert or replace the keyframe at `timestamp`.
    pub fn set(&self, timestamp: ClockTime, value: f64) -> EditResult<()> {
        if !value.is_finite() {
            return Err(EditError::validation(format!(
                "keyframe value at {timestamp} must be finite"
            )));
        }
        self.curve.borrow_mut().keys.insert(timestamp, value);
        Ok(())
    }

    /// Insert every keyframe of `values`.
    pub fn set_from_list(&self, values: &[TimedValue]) -> EditResult<()> {
        if let Some(bad) = values.iter().find(|v| !v.value.is_finite()) {
            return Err(EditError::validation(format!(
                "keyframe value at {} must be finite",
                bad.timestamp
            )));
        }
        let mut curve = self.curve.borrow_mut();
        curve
            .keys
            .extend(values.iter().map(|v| (v.timestamp, v.value)));
        Ok(())
    }

    /// Remove the keyframe at `timestamp`; `false` when there was none.
    pub fn unset(&self, timestamp: ClockTime) -> bool {
        self.curve.borrow_mut().keys.remove(&timestamp).is_some()
    }

    /// Remove every keyframe.
    pub fn unset_all(&self) {
        self.curve.borrow_mut().keys.clear();
    }

    /// Keyframes in timestamp order.
    pub fn values(&self) -> Vec<TimedValue> {
        self.curve
            .borrow()
            .keys
            .iter()
            .map(|(timestamp, value)| TimedValue {
                timestamp: *timestamp,
                value: *value,
            })
            .collect()
    }

    /// Number of keyframes.
    pub fn len(&self) -> usize {
        self.curve.borrow().keys.len()
    }

    /// Whether the curve has no keyframes.
    pub fn is_empty(&self) -> bool {
        self.curve.borrow().keys.is_empty()
    }

    /// Curve value at `t`; clamps outside the keyed range, `None` when empty.
    pub fn value_at(&self, t: ClockTime) -> Option<f64> {
        let curve = self.curve.borrow();
        let (&t0, &a) = curve
            .keys
            .range(..=t)
            .next_back()
            .or_else(|| curve.keys.iter().next())?;
        if t0 >= t {
            return Some(a);
        }
        let Some((&t1, &b)) = curve.keys.range(t..).next() else {
            return Some(a);
        };
        match curve.mode {
            InterpolationMode::Hold => Some(a),
            InterpolationMode::Linear => {
                let span = (t1.0 - t0.0) as f64;
                let frac = (t.0 - t0.0) as f64 / span;
                Some(a + (b - a) * frac)
            }
        }
    }

    /// Whether both handles share one curve.
    pub fn same_source(&self, other: &ControlSource) -> bool {
        Rc::ptr_eq(&self.curve, &other.curve)
    }
}

/// Attachment of a [`ControlSource`] to one element property.
///
/// Bindings are immutable once installed: rebinding a property replaces the
/// whole `Rc<ControlBinding>`.
#[derive(Debug)]
pub struct ControlBinding {
    property: String,
    mode: BindingMode,
    source: ControlSource,
}

impl ControlBinding {
    pub(crate) fn new(property: String, mode: BindingMode, source: ControlSource) -> Self {
        Self {
            property,
            mode,
            source,
        }
    }

    /// Bound property name.
    pub fn property(&self) -> &str {
        &self.property
    }

    /// Value mapping mode.
    pub fn mode(&self) -> BindingMode {
        self.mode
    }

    /// Driving curve.
    pub fn source(&self) -> &ControlSource {
        &self.source
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/control.rs"]
mod tests;
