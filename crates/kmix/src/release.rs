//! release identifier

/// Opaque name of a release
///
/// Threaded through value resolution and every mixer run. It addresses persisted state and
/// is available to documents as `${release}`, but nothing interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseId(String);

impl ReleaseId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReleaseId {
    fn from(value: &str) -> Self {
        ReleaseId(value.to_string())
    }
}

impl From<String> for ReleaseId {
    fn from(value: String) -> Self {
        ReleaseId(value)
    }
}
