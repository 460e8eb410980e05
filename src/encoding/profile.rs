use crate::foundation::error::{EditError, EditResult};

/// What a profile encodes.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProfileKind {
    /// Container muxing the listed per-stream profiles.
    Container {
        /// Per-stream sub-profiles, in insertion order.
        #[serde(default)]
        profiles: Vec<EncodingProfile>,
    },
    /// Video stream.
    Video,
    /// Audio stream.
    Audio,
}

/// Encoding target: a container with per-stream sub-profiles, or a single stream.
///
/// `format` and `restriction` are opaque caps strings for the encoder; only their
/// presence is checked here.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EncodingProfile {
    /// Profile name (unique among a project's profiles).
    #[serde(default)]
    pub name: String,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Output format caps, e.g. `video/x-matroska`.
    pub format: String,
    /// Encoder preset name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    /// Input restriction caps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<String>,
    /// Number of times the stream must be present (0 = any).
    #[serde(default)]
    pub presence: u32,
    /// Container or stream profile.
    #[serde(flatten)]
    pub kind: ProfileKind,
}

impl EncodingProfile {
    /// Empty container profile.
    pub fn container(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self::with_kind(
            name.into(),
            format.into(),
            ProfileKind::Container {
                profiles: Vec::new(),
            },
        )
    }

    /// Video stream profile.
    pub fn video(format: impl Into<String>) -> Self {
        Self::with_kind(String::new(), format.into(), ProfileKind::Video)
    }

    /// Audio stream profile.
    pub fn audio(format: impl Into<String>) -> Self {
        Self::with_kind(String::new(), format.into(), ProfileKind::Audio)
    }

    fn with_kind(name: String, format: String, kind: ProfileKind) -> Self {
        Self {
            name,
            description: None,
            format,
            preset: None,
            restriction: None,
            presence: 0,
            kind,
        }
    }

    /// Default profile used for proxy creation: matroska, VP8 video and vorbis audio.
    pub fn default_proxy() -> Self {
        Self::with_kind(
            "proxy".to_string(),
            "video/x-matroska".to_string(),
            ProfileKind::Container {
                profiles: vec![Self::video("video/x-vp8"), Self::audio("audio/x-vorbis")],
            },
        )
        .description("Editing proxy")
    }

    /// Builder-style description.
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Builder-style preset.
    pub fn preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = Some(preset.into());
        self
    }

    /// Builder-style restriction caps.
    pub fn restriction(mut self, caps: impl Into<String>) -> Self {
        self.restriction = Some(caps.into());
        self
    }

    /// Builder-style presence.
    pub fn presence(mut self, presence: u32) -> Self {
        self.presence = presence;
        self
    }

    /// Whether this is a container profile.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, ProfileKind::Container { .. })
    }

    /// Per-stream sub-profiles (empty for stream profiles).
    pub fn sub_profiles(&self) -> &[EncodingProfile] {
        match &self.kind {
            ProfileKind::Container { profiles } => profiles,
            _ => &[],
        }
    }

    /// Append a stream sub-profile to a container.
    ///
    /// Containers do not nest, and an identical sub-profile is only accepted once.
    pub fn add_profile(&mut self, profile: EncodingProfile) -> EditResult<()> {
        if profile.is_container() {
            return Err(EditError::validation("containers cannot be nested"));
        }
        let ProfileKind::Container { profiles } = &mut self.kind else {
            return Err(EditError::validation(format!(
                "profile '{}' is not a container",
                self.name
            )));
        };
        if profiles.contains(&profile) {
            return Err(EditError::duplicate(format!(
                "profile '{}' already has a '{}' stream profile",
                self.name, profile.format
            )));
        }
        profiles.push(profile);
        Ok(())
    }

    /// Structural checks applied before a profile is stored or persisted.
    pub fn validate(&self) -> EditResult<()> {
        if self.format.trim().is_empty() {
            return Err(EditError::validation("encoding profile format must be non-empty"));
        }
        if self.is_container() && self.name.trim().is_empty() {
            return Err(EditError::validation("container profiles must be named"));
        }
        for sub in self.sub_profiles() {
            if sub.is_container() {
                return Err(EditError::validation("containers cannot be nested"));
            }
            sub.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encoding/profile.rs"]
mod tests;
