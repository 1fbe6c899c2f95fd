/*!
 * LocalCabinet Tests
 * Sandboxing a real host directory containing real symlinks
 */

use std::fs;
use std::io::Read;
use std::os::unix::fs::symlink;

use cabinet_fs::{
    Cabinet, FsError, FsPath, Handle, Kind, Layer, LocalCabinet, OpenMode, Sandbox, SandboxConfig,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

/// temp/{secret, jail/{docs/readme, docs_link -> docs, up -> .., abs -> <temp>/secret}}
fn setup() -> (TempDir, Sandbox<LocalCabinet>) {
    let temp = TempDir::new().unwrap();
    let base = temp.path();
    fs::write(base.join("secret"), "host secret").unwrap();
    fs::create_dir_all(base.join("jail/docs")).unwrap();
    fs::write(base.join("jail/docs/readme"), "hello").unwrap();
    symlink("docs", base.join("jail/docs_link")).unwrap();
    symlink("..", base.join("jail/up")).unwrap();
    symlink(base.join("secret"), base.join("jail/abs")).unwrap();

    let cabinet = LocalCabinet::new(base).unwrap();
    let sandbox = Sandbox::new(cabinet, &FsPath::parse("jail").unwrap(), SandboxConfig::default()).unwrap();
    (temp, sandbox)
}

fn read_to_string(sandbox: &Sandbox<LocalCabinet>, path: &str) -> String {
    let mut handle = sandbox.open_path(path).unwrap();
    let mut text = String::new();
    handle.as_file().unwrap().read_to_string(&mut text).unwrap();
    text
}

#[test]
fn test_local_sandbox_reads_inside() {
    let (_temp, sandbox) = setup();
    assert_eq!(read_to_string(&sandbox, "docs/readme"), "hello");
    assert_eq!(read_to_string(&sandbox, "docs_link/readme"), "hello");
    assert_eq!(
        sandbox.open_path("docs_link/readme").unwrap().path().to_string(),
        "/docs/readme"
    );
}

#[test]
fn test_local_sandbox_refuses_escapes() {
    let (_temp, sandbox) = setup();
    for (path, culprit) in [("up/secret", "/up"), ("abs", "/abs"), ("docs/../../secret", "/..")] {
        match sandbox.open_path(path) {
            Err(FsError::Breakout { layer, path }) => {
                assert_eq!(layer, Layer::SANDBOX);
                assert_eq!(path, culprit);
            }
            other => panic!("{} should break out, got {:?}", path, other),
        }
    }
}

#[test]
fn test_local_errors_keep_backend_layer() {
    let (_temp, sandbox) = setup();
    let err = sandbox.open_path("docs/missing").unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.layer(), &Layer::OSFS);
    assert!(err.to_string().starts_with("osfs reports:"));
}

#[test]
fn test_local_create_through_sandbox() {
    let (temp, sandbox) = setup();
    let mut file = sandbox
        .open_path_with("docs/new.txt", OpenMode::create())
        .unwrap();
    std::io::Write::write_all(file.as_file().unwrap(), b"written").unwrap();
    drop(file);
    assert_eq!(fs::read_to_string(temp.path().join("jail/docs/new.txt")).unwrap(), "written");

    let mut root = sandbox.open_root().unwrap();
    let link = root
        .as_dir()
        .unwrap()
        .open(&cabinet_fs::Name::new("up").unwrap(), OpenMode::read_only())
        .unwrap();
    assert_eq!(link.kind(), Kind::Symlink);
    assert_eq!(link.metadata().unwrap().linkname, "..");
}

#[test]
fn test_local_root_through_host_symlink() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join("real")).unwrap();
    fs::write(temp.path().join("real/f"), "x").unwrap();
    symlink("real", temp.path().join("alias")).unwrap();

    let sandbox = Sandbox::new(
        LocalCabinet::new(temp.path()).unwrap(),
        &FsPath::parse("alias").unwrap(),
        SandboxConfig::default(),
    )
    .unwrap();
    assert_eq!(sandbox.root().to_string(), "/real");
    assert_eq!(read_to_string(&sandbox, "f"), "x");
    assert_eq!(sandbox.layer(), Layer::SANDBOX);
}
