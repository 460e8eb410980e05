use std::path::Path;

use crate::{
    assets::registry::FORMATTERS,
    foundation::error::{EditError, EditResult},
    serialize::document::ProjectDoc,
};

/// Byte encoding of a [`ProjectDoc`].
pub trait Formatter {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Preferred file extension, without the dot.
    fn extension(&self) -> &'static str;

    /// Cheap sniff of whether `bytes` look like this format.
    fn can_load(&self, bytes: &[u8]) -> bool;

    fn to_bytes(&self, doc: &ProjectDoc) -> EditResult<Vec<u8>>;

    fn from_bytes(&self, bytes: &[u8]) -> EditResult<ProjectDoc>;
}

/// Pretty-printed JSON.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn can_load(&self, bytes: &[u8]) -> bool {
        bytes
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{')
    }

    fn to_bytes(&self, doc: &ProjectDoc) -> EditResult<Vec<u8>> {
        doc.validate()?;
        let mut bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| EditError::serialization(format!("encode project: {e}")))?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    fn from_bytes(&self, bytes: &[u8]) -> EditResult<ProjectDoc> {
        let doc: ProjectDoc = serde_json::from_slice(bytes)
            .map_err(|e| EditError::serialization(format!("parse project JSON: {e}")))?;
        doc.validate()?;
        Ok(doc)
    }
}

/// Formatter registered under `name`.
pub fn formatter_for(name: &str) -> EditResult<Box<dyn Formatter>> {
    match name {
        "json" => Ok(Box::new(JsonFormatter)),
        other => Err(EditError::resolution(format!(
            "no formatter named '{other}'"
        ))),
    }
}

/// Read and parse a saved project, picking the first formatter that accepts it.
#[tracing::instrument(level = "debug", fields(path = %path.display()))]
pub fn load_document(path: &Path) -> EditResult<ProjectDoc> {
    let bytes = std::fs::read(path)?;
    for name in FORMATTERS {
        let formatter = formatter_for(name)?;
        if formatter.can_load(&bytes) {
            return formatter.from_bytes(&bytes);
        }
    }
    Err(EditError::serialization(format!(
        "no formatter can load '{}'",
        path.display()
    )))
}

/// Write `doc` to `path`.
///
/// An existing file is only replaced with `overwrite`.
#[tracing::instrument(level = "debug", skip(doc, formatter), fields(path = %path.display()))]
pub fn save_document(
    doc: &ProjectDoc,
    path: &Path,
    formatter: &dyn Formatter,
    overwrite: bool,
) -> EditResult<()> {
    if path.exists() && !overwrite {
        return Err(EditError::duplicate(format!(
            "'{}' exists and overwrite is off",
            path.display()
        )));
    }
    let bytes = formatter.to_bytes(doc)?;
    ensure_parent_dir(path)?;
    std::fs::write(path, bytes)?;
    tracing::debug!(formatter = formatter.name(), "project written");
    Ok(())
}

fn ensure_parent_dir(path: &Path) -> EditResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/serialize/formatter.rs"]
mod tests;
