/*!
 * Sandbox Path Resolution
 * Hop-by-hop walk from the sandbox root, one delegate open per component
 *
 * Nothing is cached between calls: every resolution re-opens the delegate
 * root and re-walks the canonical root prefix, so a symlink swapped into the
 * prefix after construction is still caught.
 */

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, debug_span, trace, warn};

use crate::config::SandboxConfig;
use crate::traits::{Cabinet, Directory, Handle};
use crate::types::*;

/// One component still to be walked
#[derive(Debug, Clone)]
pub(super) enum Step {
    Dot,
    Up,
    Name(Name),
}

/// A step plus the sandbox path of the symlink that introduced it
///
/// `origin` is `None` for steps supplied by the caller.
#[derive(Debug, Clone)]
pub(super) struct Pending {
    step: Step,
    origin: Option<Arc<str>>,
}

impl Pending {
    pub fn caller(name: Name) -> Self {
        Self {
            step: Step::Name(name),
            origin: None,
        }
    }
}

/// Split slash-separated text into steps
///
/// Leading and repeated slashes are ignored here; callers decide what an
/// absolute path means before parsing.
pub(super) fn parse_steps(text: &str, origin: Option<&Arc<str>>) -> FsResult<Vec<Pending>> {
    text.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let step = match part {
                "." => Step::Dot,
                ".." => Step::Up,
                _ => Step::Name(Name::new(part)?),
            };
            Ok(Pending {
                step,
                origin: origin.cloned(),
            })
        })
        .collect()
}

/// Render a sandbox path for errors and logs
pub(super) fn render(trail: &[Name], leaf: Option<&str>) -> String {
    let mut out = String::new();
    for name in trail {
        out.push('/');
        out.push_str(name.as_str());
    }
    if let Some(leaf) = leaf {
        out.push('/');
        out.push_str(leaf);
    }
    if out.is_empty() {
        out.push('/');
    }
    out
}

/// What happens at the bottom of the stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Containment {
    /// Climbing above the bottom, or an absolute link target, is a Breakout
    Jail,
    /// Posix semantics against the delegate root: `..` at the root stays put,
    /// absolute targets restart from the root
    Host,
}

/// Handles opened during one resolution, bottom first
///
/// Everything still held is closed when the stack is dropped, so an early
/// return through `?` leaks nothing.
struct HandleStack {
    handles: Vec<Box<dyn Handle>>,
}

impl HandleStack {
    fn depth(&self) -> usize {
        self.handles.len()
    }

    fn top_dir(&mut self) -> FsResult<&mut dyn Directory> {
        match self.handles.last_mut() {
            Some(top) => top.as_dir(),
            None => Err(FsError::Closed {
                layer: Layer::SANDBOX,
            }),
        }
    }

    fn push(&mut self, handle: Box<dyn Handle>) {
        self.handles.push(handle);
    }

    /// Close everything above the bottom
    fn unwind_to_bottom(&mut self) -> FsResult<()> {
        while self.handles.len() > 1 {
            self.pop_close()?;
        }
        Ok(())
    }

    fn pop_close(&mut self) -> FsResult<()> {
        if let Some(mut handle) = self.handles.pop() {
            handle.close()?;
        }
        Ok(())
    }

    /// Keep the top handle, closing the rest
    fn into_top(mut self) -> FsResult<Box<dyn Handle>> {
        self.handles.pop().ok_or(FsError::Closed {
            layer: Layer::SANDBOX,
        })
    }
}

impl Drop for HandleStack {
    fn drop(&mut self) {
        while let Some(mut handle) = self.handles.pop() {
            if let Err(e) = handle.close() {
                trace!(error = %e, "close failed while unwinding resolution");
            }
        }
    }
}

/// Outcome of a resolution
pub(super) struct Resolved {
    pub handle: Box<dyn Handle>,
    /// Canonical symlink-free path of `handle`, relative to the bottom
    pub trail: Vec<Name>,
}

pub(super) struct Resolver<'a> {
    pub delegate: &'a dyn Cabinet,
    /// Canonical delegate path of the bottom directory
    pub root: &'a [Name],
    pub config: SandboxConfig,
    pub containment: Containment,
}

impl Resolver<'_> {
    fn breakout(&self, path: String) -> FsError {
        warn!(path = %path, "Refused sandbox breakout");
        FsError::Breakout {
            layer: Layer::SANDBOX,
            path,
        }
    }

    /// Open the delegate root and walk the root prefix
    ///
    /// The prefix was symlink-free when the sandbox was built. A symlink
    /// found there now is treated as a breakout.
    fn open_bottom(&self) -> FsResult<HandleStack> {
        let mut current = self.delegate.open_root()?;
        for (depth, name) in self.root.iter().enumerate() {
            let next = current.as_dir()?.open(name, OpenMode::read_only())?;
            match next.kind() {
                Kind::Directory => {}
                Kind::Symlink => return Err(self.breakout(render(&self.root[..=depth], None))),
                _ => {
                    return Err(FsError::NotADirectory {
                        layer: Layer::SANDBOX,
                        path: render(&self.root[..=depth], None),
                    })
                }
            }
            current.close()?;
            current = next;
        }
        Ok(HandleStack {
            handles: vec![current],
        })
    }

    /// Walk `steps` from the bottom directory
    ///
    /// Intermediate components are opened read-only; the final one with
    /// `mode`. A final symlink is followed only when `follow_final` is set.
    pub fn resolve(&self, steps: Vec<Pending>, mode: OpenMode, follow_final: bool) -> FsResult<Resolved> {
        let _span = debug_span!("sandbox.resolve", steps = steps.len()).entered();

        let mut work: VecDeque<Pending> = steps.into();
        let mut stack = self.open_bottom()?;
        let mut trail: Vec<Name> = Vec::new();
        let mut hops = 0u32;
        let mut link = Metadata::default();

        while let Some(Pending { step, origin }) = work.pop_front() {
            let name = match step {
                Step::Dot => continue,
                Step::Up => {
                    if stack.depth() > 1 {
                        stack.pop_close()?;
                        trail.pop();
                    } else if self.containment == Containment::Jail {
                        let path = match origin {
                            Some(link_path) => link_path.to_string(),
                            None => render(&trail, Some("..")),
                        };
                        return Err(self.breakout(path));
                    }
                    continue;
                }
                Step::Name(name) => name,
            };

            let last = work.is_empty();
            let child_mode = if last { mode } else { OpenMode::read_only() };
            let mut child = stack.top_dir()?.open(&name, child_mode)?;

            match child.kind() {
                Kind::Symlink if !last || follow_final => {
                    let link_path = render(&trail, Some(name.as_str()));
                    hops += 1;
                    if hops > self.config.max_symlink_hops {
                        debug!(path = %link_path, hops, "Symlink hop limit exceeded");
                        return Err(FsError::SymlinkLoop {
                            layer: Layer::SANDBOX,
                            path: link_path,
                        });
                    }
                    child.read_metadata(&mut link)?;
                    child.close()?;
                    trace!(link = %link_path, target = %link.linkname, hops, "Following symlink");

                    if link.linkname.is_empty() {
                        return Err(FsError::NotFound {
                            layer: Layer::SANDBOX,
                            path: link_path,
                        });
                    }
                    if link.linkname.starts_with('/') {
                        match self.containment {
                            Containment::Jail => return Err(self.breakout(link_path)),
                            Containment::Host => {
                                stack.unwind_to_bottom()?;
                                trail.clear();
                            }
                        }
                    }
                    let origin: Arc<str> = Arc::from(link_path);
                    for pending in parse_steps(&link.linkname, Some(&origin))?.into_iter().rev() {
                        work.push_front(pending);
                    }
                }
                Kind::Directory if !last => {
                    stack.push(child);
                    trail.push(name);
                }
                _ if !last => {
                    child.close()?;
                    return Err(FsError::NotADirectory {
                        layer: Layer::SANDBOX,
                        path: render(&trail, Some(name.as_str())),
                    });
                }
                _ => {
                    trail.push(name);
                    drop(stack);
                    debug!(path = %render(&trail, None), hops, "Resolved");
                    return Ok(Resolved {
                        handle: child,
                        trail,
                    });
                }
            }
        }

        // the walk ended on `.` or `..`, or there were no steps at all
        let handle = stack.into_top()?;
        debug!(path = %render(&trail, None), hops, "Resolved");
        Ok(Resolved { handle, trail })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps() {
        let steps = parse_steps("/a/./../b//c/", None).unwrap();
        let kinds: Vec<String> = steps
            .iter()
            .map(|p| match &p.step {
                Step::Dot => ".".to_string(),
                Step::Up => "..".to_string(),
                Step::Name(n) => n.to_string(),
            })
            .collect();
        assert_eq!(kinds, vec!["a", ".", "..", "b", "c"]);
        assert!(steps.iter().all(|p| p.origin.is_none()));

        let origin: Arc<str> = Arc::from("/link");
        let steps = parse_steps("../x", Some(&origin)).unwrap();
        assert_eq!(steps[0].origin.as_deref(), Some("/link"));
        assert!(parse_steps("a\0b", None).is_err());
    }

    #[test]
    fn test_render() {
        let trail = vec![Name::new("a").unwrap(), Name::new("b").unwrap()];
        assert_eq!(render(&trail, None), "/a/b");
        assert_eq!(render(&trail, Some("..")), "/a/b/..");
        assert_eq!(render(&[], None), "/");
        assert_eq!(render(&[], Some("x")), "/x");
    }
}
