/*!
 * Sandboxing Cabinet
 * Decorator confining all traversal of a delegate cabinet to one root
 *
 * Paths are resolved one component at a time through the delegate. Every
 * symlink met on the way is read and expanded in place, so a chain of links
 * is checked hop by hop and escaping on the second hop is caught just like
 * escaping on the first. Climbing above the root, or following an absolute
 * link target, fails with `Breakout`.
 *
 * The checks are not safe against concurrent modification of the backing
 * store by anything outside this crate. Traversal-then-open on a real
 * filesystem always leaves a TOCTOU window; use kernel confinement (chroot,
 * openat2 with RESOLVE_BENEATH) where that matters.
 */

mod handle;
mod resolve;

pub use handle::SandboxHandle;

use std::sync::Arc;
use tracing::info;

use crate::config::SandboxConfig;
use crate::traits::{Cabinet, Handle};
use crate::types::*;
use resolve::{parse_steps, Containment, Pending, Resolver};

/// Sandboxing decorator over any [`Cabinet`]
///
/// Substitutable anywhere a plain cabinet is expected. The only state kept
/// between calls is the canonical root computed at construction.
pub struct Sandbox<C: Cabinet> {
    delegate: Arc<C>,
    root: Arc<[Name]>,
    config: SandboxConfig,
}

impl<C: Cabinet> Clone for Sandbox<C> {
    fn clone(&self) -> Self {
        Self {
            delegate: Arc::clone(&self.delegate),
            root: Arc::clone(&self.root),
            config: self.config,
        }
    }
}

impl<C: Cabinet> std::fmt::Debug for Sandbox<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("delegate", &self.delegate.layer())
            .field("root", &FsPath::from_names(self.root.to_vec()))
            .field("config", &self.config)
            .finish()
    }
}

impl<C: Cabinet + 'static> Sandbox<C> {
    /// Confine `delegate` to the directory at `root`
    ///
    /// Symlinks along `root` are followed inside the delegate once, here, to
    /// find the canonical root. It must be a directory.
    pub fn new(delegate: C, root: &FsPath, config: SandboxConfig) -> FsResult<Self> {
        Self::with_shared(Arc::new(delegate), root, config)
    }

    /// Like [`Sandbox::new`], for a delegate that is shared elsewhere too
    pub fn with_shared(delegate: Arc<C>, root: &FsPath, config: SandboxConfig) -> FsResult<Self> {
        config.validate()?;

        let resolved = {
            let canonicalize = Resolver {
                delegate: delegate.as_ref(),
                root: &[],
                config,
                containment: Containment::Host,
            };
            let steps = root.names().iter().cloned().map(Pending::caller).collect();
            canonicalize.resolve(steps, OpenMode::read_only(), true)?
        };
        if resolved.handle.kind() != Kind::Directory {
            return Err(FsError::NotADirectory {
                layer: Layer::SANDBOX,
                path: root.to_string(),
            });
        }

        let canonical = FsPath::from_names(resolved.trail);
        info!(
            delegate = %delegate.layer(),
            requested = %root,
            root = %canonical,
            "Sandbox created"
        );
        Ok(Self {
            delegate,
            root: canonical.names().into(),
            config,
        })
    }

    /// Canonical delegate path of the sandbox root
    #[must_use]
    pub fn root(&self) -> FsPath {
        FsPath::from_names(self.root.to_vec())
    }

    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    #[must_use]
    pub fn delegate(&self) -> &C {
        &self.delegate
    }

    /// Open a slash-separated path read-only
    ///
    /// Paths are relative to the sandbox root whether or not they start with
    /// `/`. `.` and `..` are honored; `..` may not climb above the root.
    pub fn open_path(&self, path: &str) -> FsResult<SandboxHandle<C>> {
        self.open_path_with(path, OpenMode::read_only())
    }

    /// Open a path with an explicit mode for the final component
    pub fn open_path_with(&self, path: &str, mode: OpenMode) -> FsResult<SandboxHandle<C>> {
        self.resolve_steps(parse_steps(path, None)?, mode, self.config.follow_final_symlink)
    }

    fn resolver(&self) -> Resolver<'_> {
        Resolver {
            delegate: self.delegate.as_ref(),
            root: &self.root,
            config: self.config,
            containment: Containment::Jail,
        }
    }

    pub(crate) fn resolve_steps(
        &self,
        steps: Vec<Pending>,
        mode: OpenMode,
        follow_final: bool,
    ) -> FsResult<SandboxHandle<C>> {
        let resolved = self.resolver().resolve(steps, mode, follow_final)?;
        Ok(SandboxHandle::new(self.clone(), resolved.handle, resolved.trail))
    }

    /// Canonical delegate path of a directory given by sandbox names
    fn resolve_dir(&self, names: &[Name]) -> FsResult<FsPath> {
        let steps = names.iter().cloned().map(Pending::caller).collect();
        let resolved = self.resolver().resolve(steps, OpenMode::read_only(), true)?;
        if resolved.handle.kind() != Kind::Directory {
            return Err(FsError::NotADirectory {
                layer: Layer::SANDBOX,
                path: FsPath::from_names(names.to_vec()).to_string(),
            });
        }
        Ok(self.delegate_path(&resolved.trail))
    }

    fn delegate_path(&self, trail: &[Name]) -> FsPath {
        FsPath::from_names(self.root.to_vec()).join(trail)
    }
}

impl<C: Cabinet + 'static> Cabinet for Sandbox<C> {
    fn layer(&self) -> Layer {
        Layer::SANDBOX
    }

    fn open_root(&self) -> FsResult<Box<dyn Handle>> {
        Ok(Box::new(self.resolve_steps(Vec::new(), OpenMode::read_only(), false)?))
    }

    /// Parents are resolved through the sandbox; final names are literal
    fn rename(&self, old: &FsPath, dest: &FsPath) -> FsResult<()> {
        let invalid = || FsError::InvalidArgument {
            layer: Layer::SANDBOX,
            message: "cannot rename the sandbox root".to_string(),
        };
        let (old_parent, old_name) = old.split_last().ok_or_else(invalid)?;
        let (dest_parent, dest_name) = dest.split_last().ok_or_else(invalid)?;

        let mut from = self.resolve_dir(old_parent)?;
        from.push(old_name.clone());
        let mut to = self.resolve_dir(dest_parent)?;
        to.push(dest_name.clone());
        self.delegate.rename(&from, &to)
    }
}
