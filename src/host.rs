//! Ownership of the DOM node the widget renders into.
//!
//! The container lives outside the host application's own view
//! reconciliation so the retained-mode widget can mutate it freely.
//! Exactly one container exists per mount, the readiness callback fires
//! exactly once, and removal on unmount is deferred a tick so an
//! in-flight widget mutation of the same node can finish first.

use crate::{
    sdk::{ContainerHandle, MapInstance},
    Result,
};
use std::sync::Arc;

/// The environment that can create and destroy container nodes
pub trait HostSurface: Send + Sync {
    fn create_container(&self) -> Result<ContainerHandle>;
    fn remove_container(&self, container: ContainerHandle);
}

pub struct MapHost {
    surface: Arc<dyn HostSurface>,
    container: Option<ContainerHandle>,
    reported: bool,
}

impl MapHost {
    pub fn new(surface: Arc<dyn HostSurface>) -> Self {
        Self {
            surface,
            container: None,
            reported: false,
        }
    }

    /// Creates the container on first call and reports it through
    /// `on_ready` exactly once. Repeat calls return the existing handle
    /// without recreating anything.
    pub fn mount<F: FnOnce(ContainerHandle)>(&mut self, on_ready: F) -> Result<ContainerHandle> {
        if let Some(container) = self.container {
            return Ok(container);
        }
        let container = self.surface.create_container()?;
        self.container = Some(container);
        if !self.reported {
            self.reported = true;
            on_ready(container);
        }
        Ok(container)
    }

    pub fn container(&self) -> Option<ContainerHandle> {
        self.container
    }

    /// Detaches widget listeners (best-effort), then removes the
    /// container on a deferred tick when an async runtime is available.
    pub fn unmount(&mut self, instance: Option<&mut dyn MapInstance>) {
        if let Some(instance) = instance {
            instance.clear_listeners();
        }
        if let Some(container) = self.container.take() {
            let surface = Arc::clone(&self.surface);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        tokio::task::yield_now().await;
                        surface.remove_container(container);
                    });
                }
                Err(_) => surface.remove_container(container),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::mock::MockSurface;

    #[test]
    fn test_single_container_per_mount() {
        let surface = Arc::new(MockSurface::new());
        let mut host = MapHost::new(surface.clone());

        let mut reports = 0;
        let first = host.mount(|_| reports += 1).unwrap();
        let second = host.mount(|_| reports += 1).unwrap();

        assert_eq!(first, second);
        assert_eq!(reports, 1);
        assert_eq!(surface.created_count(), 1);
    }

    #[tokio::test]
    async fn test_unmount_defers_removal() {
        let surface = Arc::new(MockSurface::new());
        let mut host = MapHost::new(surface.clone());
        host.mount(|_| {}).unwrap();

        host.unmount(None);
        // Removal happens after a yield, not synchronously
        assert_eq!(surface.removed_count(), 0);

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(surface.removed_count(), 1);
    }
}
