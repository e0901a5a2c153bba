use std::fmt;

/// Namespace prefix shared by every physical key this crate writes.
pub const PERSISTENCE_NAMESPACE: &str = "firebase";

/// Logical slots a session store manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    /// The current user snapshot.
    AuthUser,
    /// Breadcrumb naming the backend that was active before a redirect.
    Persistence,
}

impl LogicalKey {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalKey::AuthUser => "authUser",
            LogicalKey::Persistence => "persistence",
        }
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the physical storage key `firebase:<logical>:<api_key>:<app_name>`.
pub fn compose_key(logical: &str, api_key: &str, app_name: &str) -> String {
    format!("{PERSISTENCE_NAMESPACE}:{logical}:{api_key}:{app_name}")
}

/// The application identity that namespaces all keys of one session store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AppCoordinates {
    pub api_key: String,
    pub app_name: String,
}

impl AppCoordinates {
    pub fn new(api_key: impl Into<String>, app_name: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            app_name: app_name.into(),
        }
    }

    pub fn key(&self, logical: LogicalKey) -> String {
        compose_key(logical.as_str(), &self.api_key, &self.app_name)
    }
}
