//! Service container for dependency injection
//!
//! Wires the workload controller to a container backend.

use std::sync::Arc;

use crate::application::KafkaUiWorkload;
use crate::config::Settings;
use crate::infrastructure::container::Container;
use crate::infrastructure::local::LocalContainer;
use crate::infrastructure::traits::{CommandRunner, FileSystem, RealCommandRunner, RealFileSystem};

/// Container holding all application services.
pub struct ServiceContainer {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Filesystem abstraction
    pub fs: Arc<dyn FileSystem>,

    /// Command runner abstraction
    pub cmd: Arc<dyn CommandRunner>,

    /// Backend the workload drives
    pub container: Arc<dyn Container>,
}

impl ServiceContainer {
    /// Create a service container backed by a [`LocalContainer`] at `settings.container_root`.
    pub fn new(settings: Settings) -> Self {
        Self::with_deps(
            settings,
            Arc::new(RealFileSystem),
            Arc::new(RealCommandRunner),
        )
    }

    /// Create a service container with custom I/O dependencies.
    pub fn with_deps(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
    ) -> Self {
        let container: Arc<dyn Container> = Arc::new(LocalContainer::with_deps(
            &settings.container_root,
            &settings.state_dir,
            fs.clone(),
            cmd.clone(),
        ));
        Self::with_container(settings, fs, cmd, container)
    }

    /// Create a service container around an existing backend.
    pub fn with_container(
        settings: Settings,
        fs: Arc<dyn FileSystem>,
        cmd: Arc<dyn CommandRunner>,
        container: Arc<dyn Container>,
    ) -> Self {
        let settings = Arc::new(settings);

        Self {
            settings,
            fs,
            cmd,
            container,
        }
    }

    /// Workload controller over this container's backend.
    pub fn workload(&self) -> KafkaUiWorkload {
        KafkaUiWorkload::new(self.container.clone(), self.settings.clone())
    }
}
