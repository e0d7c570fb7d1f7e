use std::fmt;

const FORBIDDEN: [char; 5] = ['.', '$', '#', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path segment is empty")]
    EmptySegment,
    #[error("path segment `{segment}` contains forbidden character {ch:?}")]
    ForbiddenChar { segment: String, ch: char },
    #[error("item id `{0}` must be a single path segment")]
    NestedItemId(String),
}

/// Location inside the remote store, relative to the configured root.
///
/// Items live at `item/{id}`; feeds are addressed by their name verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourcePath(String);

impl SourcePath {
    pub fn item(id: &str) -> Result<Self, PathError> {
        if id.contains('/') {
            return Err(PathError::NestedItemId(id.to_string()));
        }
        validate_segment(id)?;
        Ok(Self(format!("item/{id}")))
    }

    pub fn feed(name: &str) -> Result<Self, PathError> {
        for segment in name.split('/') {
            validate_segment(segment)?;
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment(segment: &str) -> Result<(), PathError> {
    if segment.is_empty() {
        return Err(PathError::EmptySegment);
    }
    if let Some(ch) = segment
        .chars()
        .find(|c| FORBIDDEN.contains(c) || c.is_ascii_control())
    {
        return Err(PathError::ForbiddenChar {
            segment: segment.to_string(),
            ch,
        });
    }
    Ok(())
}
