/*!
 * Names and Paths
 * Validated path components and component sequences
 */

use super::errors::{FsError, FsResult, Layer};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One path component
///
/// Never empty, never `.` or `..`, never contains `/` or NUL. Anything that
/// holds a `Name` can pass it to a backend without re-checking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    /// Validate and wrap a component
    #[must_use = "validation result must be checked"]
    pub fn new(name: impl Into<String>) -> FsResult<Self> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    /// Validate a component without taking ownership
    #[must_use = "validation result must be checked"]
    pub fn validate(name: &str) -> FsResult<()> {
        let reason = if name.is_empty() {
            "name cannot be empty"
        } else if name == "." || name == ".." {
            "name cannot be a relative directory reference"
        } else if name.contains('\0') {
            "name cannot contain null bytes"
        } else if name.contains('/') {
            "name cannot contain path separators"
        } else {
            return Ok(());
        };
        Err(FsError::InvalidName {
            layer: Layer::PATH,
            name: name.to_string(),
            reason: reason.to_string(),
        })
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Replace the contents in place, reusing the allocation
    pub(crate) fn set(&mut self, name: &str) -> FsResult<()> {
        Self::validate(name)?;
        self.0.clear();
        self.0.push_str(name);
        Ok(())
    }

    /// Placeholder for iterator storage that is overwritten before first use
    pub(crate) fn placeholder() -> Self {
        Self(String::from("-"))
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Name {
    type Error = FsError;

    fn try_from(name: &str) -> FsResult<Self> {
        Self::new(name)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Name::new(name).map_err(serde::de::Error::custom)
    }
}

/// Ordered sequence of names, addressed from a cabinet root
///
/// Used where no open handle is involved, such as [`Cabinet::rename`](crate::traits::Cabinet::rename).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FsPath(Vec<Name>);

impl FsPath {
    /// The empty path, naming the root itself
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse slash-separated text
    ///
    /// Leading, trailing and repeated slashes and `.` segments are ignored;
    /// `..` is rejected because a path here is purely downward.
    pub fn parse(text: &str) -> FsResult<Self> {
        let mut names = Vec::new();
        for part in text.split('/') {
            match part {
                "" | "." => continue,
                ".." => {
                    return Err(FsError::InvalidName {
                        layer: Layer::PATH,
                        name: text.to_string(),
                        reason: "path cannot contain '..'".to_string(),
                    })
                }
                _ => names.push(Name::new(part)?),
            }
        }
        Ok(Self(names))
    }

    #[must_use]
    pub fn from_names(names: Vec<Name>) -> Self {
        Self(names)
    }

    #[inline]
    #[must_use]
    pub fn names(&self) -> &[Name] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into parent path and final name; `None` for the root
    #[must_use]
    pub fn split_last(&self) -> Option<(&[Name], &Name)> {
        self.0.split_last().map(|(last, parent)| (parent, last))
    }

    pub fn push(&mut self, name: Name) {
        self.0.push(name);
    }

    /// New path with `other` appended
    #[must_use]
    pub fn join(&self, other: &[Name]) -> Self {
        let mut names = Vec::with_capacity(self.0.len() + other.len());
        names.extend_from_slice(&self.0);
        names.extend_from_slice(other);
        Self(names)
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for name in &self.0 {
            write!(f, "/{}", name)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for FsPath {
    type Err = FsError;

    fn from_str(text: &str) -> FsResult<Self> {
        Self::parse(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(Name::new("test.txt").is_ok());
        assert!(Name::new("...").is_ok());
        assert!(Name::new(".hidden").is_ok());

        assert!(Name::new("").is_err());
        assert!(Name::new(".").is_err());
        assert!(Name::new("..").is_err());
        assert!(Name::new("a/b").is_err());
        assert!(Name::new("a\0b").is_err());

        let err = Name::new("a/b").unwrap_err();
        assert_eq!(err.layer(), &Layer::PATH);
    }

    #[test]
    fn test_name_set_reuses_buffer() {
        let mut name = Name::new("a-longer-name").unwrap();
        let ptr = name.as_str().as_ptr();
        name.set("short").unwrap();
        assert_eq!(name.as_str(), "short");
        assert_eq!(name.as_str().as_ptr(), ptr);
        assert!(name.set("bad/name").is_err());
    }

    #[test]
    fn test_path_parse() {
        let path = FsPath::parse("//a/./b/c/").unwrap();
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "/a/b/c");

        assert!(FsPath::parse("").unwrap().is_root());
        assert_eq!(FsPath::root().to_string(), "/");
        assert!(FsPath::parse("a/../b").is_err());

        let (parent, last) = path.split_last().unwrap();
        assert_eq!(parent.len(), 2);
        assert_eq!(last.as_str(), "c");
        assert!(FsPath::root().split_last().is_none());
    }

    #[test]
    fn test_name_deserialization() {
        let name: Name = serde_json::from_str("\"ok\"").unwrap();
        assert_eq!(name.as_str(), "ok");
        let result: Result<Name, _> = serde_json::from_str("\"a/b\"");
        assert!(result.is_err());

        let path: FsPath = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(path.to_string(), "/a/b");
    }
}
