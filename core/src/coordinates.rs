use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Placeholder used in paths when a coordinate has no namespace.
pub const NO_NAMESPACE: &str = "-";

/// Identifies one logical definition across the database and the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(rename = "type")]
    pub kind: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub name: String,
    pub revision: String,
}

impl Coordinates {
    pub fn new(
        kind: impl Into<String>,
        provider: impl Into<String>,
        namespace: Option<&str>,
        name: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            provider: provider.into(),
            namespace: namespace.map(str::to_string),
            name: name.into(),
            revision: revision.into(),
        }
    }

    pub fn namespace_or_placeholder(&self) -> &str {
        match self.namespace.as_deref() {
            Some(ns) if !ns.is_empty() => ns,
            _ => NO_NAMESPACE,
        }
    }

    /// Blob-store object name: the lower-cased
    /// `type/provider/namespace/name/revision/<revision>.json` path encoded as
    /// a single path segment, so every `/` becomes `%2f`.
    pub fn blob_path(&self) -> String {
        let raw = format!(
            "{}/{}/{}/{}/revision/{}.json",
            self.kind,
            self.provider,
            self.namespace_or_placeholder(),
            self.name,
            self.revision
        )
        .to_lowercase();
        urlencoding::encode(&raw).to_lowercase()
    }

    /// Identifier understood by the recompute service. Segments keep their
    /// case and are percent-encoded individually.
    pub fn repair_coordinate(&self) -> String {
        [
            self.kind.as_str(),
            self.provider.as_str(),
            self.namespace_or_placeholder(),
            self.name.as_str(),
            self.revision.as_str(),
        ]
        .iter()
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.kind,
            self.provider,
            self.namespace_or_placeholder(),
            self.name,
            self.revision
        )
    }
}
