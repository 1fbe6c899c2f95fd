/*!
 * Sandbox Handles
 */

use std::fmt;

use super::resolve::{parse_steps, Pending};
use super::Sandbox;
use crate::traits::{Cabinet, DirIter, Directory, File, Handle, Xattrs};
use crate::types::*;

/// Handle returned by a [`Sandbox`]
///
/// Wraps the delegate handle and remembers the canonical sandbox path it was
/// reached by. That trail is only ever a starting point: opening, creating or
/// listing through this handle re-resolves the trail from the sandbox root, so
/// a directory moved or replaced by a symlink since is checked again. Between
/// the check and the open there is still a window in which the backing store
/// can change.
pub struct SandboxHandle<C: Cabinet> {
    sandbox: Sandbox<C>,
    inner: Box<dyn Handle>,
    trail: Vec<Name>,
}

impl<C: Cabinet> fmt::Debug for SandboxHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxHandle")
            .field("kind", &self.inner.kind())
            .field("path", &FsPath::from_names(self.trail.clone()))
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl<C: Cabinet + 'static> SandboxHandle<C> {
    pub(super) fn new(sandbox: Sandbox<C>, inner: Box<dyn Handle>, trail: Vec<Name>) -> Self {
        Self {
            sandbox,
            inner,
            trail,
        }
    }

    /// Canonical names from the sandbox root to this entry
    #[must_use]
    pub fn trail(&self) -> &[Name] {
        &self.trail
    }

    /// Canonical sandbox path of this entry
    #[must_use]
    pub fn path(&self) -> FsPath {
        FsPath::from_names(self.trail.clone())
    }

    /// Open a path relative to this handle, read-only
    ///
    /// A leading `/` makes the path relative to the sandbox root instead.
    pub fn open_path(&self, path: &str) -> FsResult<SandboxHandle<C>> {
        self.open_path_with(path, OpenMode::read_only())
    }

    pub fn open_path_with(&self, path: &str, mode: OpenMode) -> FsResult<SandboxHandle<C>> {
        if self.inner.is_closed() {
            return Err(FsError::Closed {
                layer: Layer::SANDBOX,
            });
        }
        let mut steps = if path.starts_with('/') {
            Vec::new()
        } else {
            self.trail.iter().cloned().map(Pending::caller).collect()
        };
        steps.extend(parse_steps(path, None)?);
        self.sandbox
            .resolve_steps(steps, mode, self.sandbox.config().follow_final_symlink)
    }

    fn child_steps(&self, name: &Name) -> Vec<Pending> {
        self.trail
            .iter()
            .chain(std::iter::once(name))
            .cloned()
            .map(Pending::caller)
            .collect()
    }

    fn check_open(&self) -> FsResult<()> {
        if self.inner.is_closed() {
            return Err(FsError::Closed {
                layer: Layer::SANDBOX,
            });
        }
        Ok(())
    }

    /// Re-resolve this directory so the delegate call lands inside the root
    fn reopen_dir(&self) -> FsResult<SandboxHandle<C>> {
        let steps = self.trail.iter().cloned().map(Pending::caller).collect();
        let fresh = self.sandbox.resolve_steps(steps, OpenMode::read_only(), true)?;
        if fresh.inner.kind() != Kind::Directory {
            return Err(FsError::NotADirectory {
                layer: Layer::SANDBOX,
                path: fresh.path().to_string(),
            });
        }
        Ok(fresh)
    }

    fn wrap(&self, trail: &[Name], name: &Name, inner: Box<dyn Handle>) -> Box<dyn Handle> {
        let mut child_trail = trail.to_vec();
        child_trail.push(name.clone());
        Box::new(SandboxHandle::new(self.sandbox.clone(), inner, child_trail))
    }
}

impl<C: Cabinet + 'static> Handle for SandboxHandle<C> {
    fn kind(&self) -> Kind {
        self.inner.kind()
    }

    fn read_metadata(&self, out: &mut Metadata) -> FsResult<()> {
        self.inner.read_metadata(out)
    }

    fn as_file(&mut self) -> FsResult<&mut dyn File> {
        self.inner.as_file()
    }

    fn as_dir(&mut self) -> FsResult<&mut dyn Directory> {
        self.inner.as_dir()?;
        Ok(self)
    }

    fn close(&mut self) -> FsResult<()> {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    fn xattrs(&mut self) -> FsResult<&mut dyn Xattrs> {
        self.inner.xattrs()
    }
}

impl<C: Cabinet + 'static> Directory for SandboxHandle<C> {
    fn create(&mut self, name: &Name, kind: Kind, perms: Mode) -> FsResult<Box<dyn Handle>> {
        self.check_open()?;
        let mut dir = self.reopen_dir()?;
        let created = dir.inner.as_dir()?.create(name, kind, perms)?;
        Ok(self.wrap(&dir.trail, name, created))
    }

    fn symlink(&mut self, name: &Name, target: &str) -> FsResult<Box<dyn Handle>> {
        self.check_open()?;
        let mut dir = self.reopen_dir()?;
        let link = dir.inner.as_dir()?.symlink(name, target)?;
        Ok(self.wrap(&dir.trail, name, link))
    }

    /// Resolves `name` through the sandbox; a final symlink is not followed
    fn open(&mut self, name: &Name, mode: OpenMode) -> FsResult<Box<dyn Handle>> {
        self.check_open()?;
        let child = self.sandbox.resolve_steps(self.child_steps(name), mode, false)?;
        Ok(Box::new(child))
    }

    /// Lists the directory currently found at this handle's trail
    ///
    /// The delegate handle is swapped for the freshly resolved one first, so
    /// a directory replaced since it was opened is never listed.
    fn read(&mut self) -> FsResult<Box<dyn DirIter + '_>> {
        self.check_open()?;
        let fresh = self.reopen_dir()?;
        let mut stale = std::mem::replace(&mut self.inner, fresh.inner);
        stale.close()?;
        self.inner.as_dir()?.read()
    }
}
