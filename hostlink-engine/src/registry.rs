//! Application registry collaborator seam.
//!
//! The real application lifecycle manager lives in the embedding firmware;
//! the dispatcher only needs the narrow view below. [`StaticRegistry`] is a
//! ready-made in-memory implementation for tests and simple hosts.

use crate::error::EngineError;

/// Metadata for one installed application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDescriptor {
    /// Stable ASCII identifier, unique within the registry.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Reference to the executable (path, slot id, whatever the host uses).
    pub executable: String,
}

impl AppDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        executable: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            executable: executable.into(),
        }
    }
}

/// Application lifecycle operations the dispatcher relies on.
pub trait AppRegistry: Send {
    /// All installed applications, in stable order.
    fn list_apps(&self) -> Vec<AppDescriptor>;

    /// Switches to the application with the given id, optionally passing a
    /// start argument.
    fn switch_app(&mut self, id: &str, start_arg: Option<&str>) -> Result<(), EngineError>;

    /// Asks the current application to exit.
    fn request_exit(&mut self) -> Result<(), EngineError>;

    /// Id of the currently running application.
    fn current_app_id(&self) -> String;
}

/// Fixed-list registry.
///
/// Switching just moves the current index; exit requests always succeed.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    apps: Vec<AppDescriptor>,
    current: usize,
    exit_requested: bool,
}

impl StaticRegistry {
    pub fn new(apps: Vec<AppDescriptor>) -> Self {
        Self {
            apps,
            current: 0,
            exit_requested: false,
        }
    }

    /// Whether an exit was requested through the registry.
    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// The currently selected application, if the registry is non-empty.
    pub fn current(&self) -> Option<&AppDescriptor> {
        self.apps.get(self.current)
    }
}

impl AppRegistry for StaticRegistry {
    fn list_apps(&self) -> Vec<AppDescriptor> {
        self.apps.clone()
    }

    fn switch_app(&mut self, id: &str, _start_arg: Option<&str>) -> Result<(), EngineError> {
        match self.apps.iter().position(|app| app.id == id) {
            Some(index) => {
                self.current = index;
                Ok(())
            }
            None => Err(EngineError::AppNotFound(id.to_string())),
        }
    }

    fn request_exit(&mut self) -> Result<(), EngineError> {
        self.exit_requested = true;
        Ok(())
    }

    fn current_app_id(&self) -> String {
        self.apps
            .get(self.current)
            .map(|app| app.id.clone())
            .unwrap_or_default()
    }
}
