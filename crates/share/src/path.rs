use serde::{Deserialize, Serialize};

/// Directory names from the share root to the current directory.
///
/// Always starts with the empty root segment, so `["", "docs"]` joins to
/// `"/docs/"` and the root alone joins to `"/"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathStack(Vec<String>);

impl Default for PathStack {
    fn default() -> Self {
        Self(vec![String::new()])
    }
}

impl PathStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Current directory path, always ending in `/`.
    pub fn joined(&self) -> String {
        let joined = self.0.join("/");
        if joined.is_empty() {
            "/".to_string()
        } else {
            joined + "/"
        }
    }

    /// Path to list: the current directory, or `pending` inside it.
    pub fn listing_path(&self, pending: Option<&str>) -> String {
        match pending {
            Some(name) => self.joined() + name,
            None => self.joined(),
        }
    }

    /// Drops `name` and everything after it, if present.
    pub fn truncate_at(&mut self, name: &str) {
        if let Some(index) = self.0.iter().position(|s| s == name) {
            self.0.truncate(index);
        }
    }

    pub fn push(&mut self, name: impl Into<String>) {
        self.0.push(name.into());
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a stored stack. An empty array yields the root.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let stack: PathStack = serde_json::from_str(json)?;
        if stack.0.is_empty() {
            Ok(Self::default())
        } else {
            Ok(stack)
        }
    }
}
