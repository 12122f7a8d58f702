/// Registry wrapper counting mutating calls
///
/// Can also fail a number of `verify_all` calls before delegating.
use crate::config::types::{BridgeError, Result};
use crate::registry::{ImageSource, SandboxPermissions, SandboxRecord, SandboxRegistry};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct CountingRegistry<R> {
    inner: R,
    creations: AtomicUsize,
    permission_saves: AtomicUsize,
    failing_verifications: AtomicUsize,
}

impl<R: SandboxRegistry> CountingRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            creations: AtomicUsize::new(0),
            permission_saves: AtomicUsize::new(0),
            failing_verifications: AtomicUsize::new(0),
        }
    }

    /// Fail the next `times` verifications.
    pub fn with_failing_verifications(self, times: usize) -> Self {
        self.failing_verifications.store(times, Ordering::SeqCst);
        self
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    pub fn permission_saves(&self) -> usize {
        self.permission_saves.load(Ordering::SeqCst)
    }
}

impl<R: SandboxRegistry> SandboxRegistry for CountingRegistry<R> {
    fn contains(&self, name: &str) -> bool {
        self.inner.contains(name)
    }

    fn resolve(&self, name: &str) -> Result<SandboxRecord> {
        self.inner.resolve(name)
    }

    fn create_from_image_source(&self, name: &str, source: &ImageSource) -> Result<()> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        self.inner.create_from_image_source(name, source)
    }

    fn register_service_dependency(&self, owner: &str, helper: &str) -> Result<()> {
        self.inner.register_service_dependency(owner, helper)
    }

    fn verify_all(&self) -> Result<()> {
        let injected = self
            .failing_verifications
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if injected {
            return Err(BridgeError::Verification("injected failure".to_string()));
        }
        self.inner.verify_all()
    }

    fn save_permissions(&self, name: &str, permissions: &SandboxPermissions) -> Result<()> {
        self.permission_saves.fetch_add(1, Ordering::SeqCst);
        self.inner.save_permissions(name, permissions)
    }

    fn silence_output(&self) {
        self.inner.silence_output()
    }
}
