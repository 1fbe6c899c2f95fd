/*!
 * Sandbox Tests
 * Breakout refusal, link chains and handle hygiene over an in-memory delegate
 */

use std::io::{Read, Write};

use cabinet_fs::{
    Cabinet, FsError, FsPath, Handle, Kind, Layer, MemCabinet, Mode, Name, OpenMode, Sandbox,
    SandboxConfig,
};
use pretty_assertions::assert_eq;

fn name(s: &str) -> Name {
    Name::new(s).unwrap()
}

/// Builds a tree from `(path, entry)` pairs, where an entry is `"/"` for a
/// directory, `"->target"` for a symlink and anything else for file content.
fn build(entries: &[(&str, &str)]) -> MemCabinet {
    let cabinet = MemCabinet::new();
    for (path, entry) in entries {
        let path = FsPath::parse(path).unwrap();
        let (parent, leaf) = path.split_last().unwrap();
        let mut root = cabinet.open_root().unwrap();
        let mut dir = if parent.is_empty() {
            root
        } else {
            cabinet_fs::lookup_path(root.as_mut(), parent).unwrap()
        };
        let dir = dir.as_dir().unwrap();
        if *entry == "/" {
            dir.create(leaf, Kind::Directory, Mode::DIR_DEFAULT).unwrap();
        } else if let Some(target) = entry.strip_prefix("->") {
            dir.symlink(leaf, target).unwrap();
        } else {
            let mut file = dir.create(leaf, Kind::RegularFile, Mode::FILE_DEFAULT).unwrap();
            file.as_file().unwrap().write_all(entry.as_bytes()).unwrap();
        }
    }
    cabinet
}

fn jail(cabinet: &MemCabinet, config: SandboxConfig) -> Sandbox<MemCabinet> {
    Sandbox::new(cabinet.clone(), &FsPath::parse("jail").unwrap(), config).unwrap()
}

fn read_all(sandbox: &Sandbox<MemCabinet>, path: &str) -> String {
    let mut handle = sandbox.open_path(path).unwrap();
    let mut text = String::new();
    handle.as_file().unwrap().read_to_string(&mut text).unwrap();
    text
}

fn breakout_path(result: Result<impl std::fmt::Debug, FsError>) -> String {
    match result {
        Err(FsError::Breakout { layer, path }) => {
            assert_eq!(layer, Layer::SANDBOX);
            path
        }
        other => panic!("expected a breakout, got {:?}", other),
    }
}

#[test]
fn test_sandbox_sees_delegate_content() {
    let cabinet = build(&[
        ("jail", "/"),
        ("jail/docs", "/"),
        ("jail/docs/readme", "inside"),
        ("jail/latest", "->docs/readme"),
    ]);
    let sandbox = jail(&cabinet, SandboxConfig::default());

    assert_eq!(read_all(&sandbox, "docs/readme"), "inside");
    assert_eq!(read_all(&sandbox, "/docs/./readme"), "inside");
    assert_eq!(read_all(&sandbox, "latest"), "inside");
    assert_eq!(sandbox.open_path("latest").unwrap().path().to_string(), "/docs/readme");
    assert_eq!(cabinet.open_handles(), 0);
}

#[test]
fn test_sandbox_is_a_cabinet() {
    let cabinet = build(&[("jail", "/"), ("jail/a", "x"), ("secret", "s")]);
    let sandbox: Box<dyn Cabinet> = Box::new(jail(&cabinet, SandboxConfig::default()));
    assert_eq!(sandbox.layer(), Layer::SANDBOX);

    let mut root = sandbox.open_root().unwrap();
    let mut names = Vec::new();
    let mut iter = root.as_dir().unwrap().read().unwrap();
    while let Some(entry) = iter.next_brief() {
        names.push(entry.unwrap().to_string());
    }
    assert_eq!(names, vec!["a"]);
}

#[test]
fn test_dotdot_link_is_refused_and_leaks_nothing() {
    let cabinet = build(&[
        ("secret", "top secret"),
        ("jail", "/"),
        ("jail/sub", "/"),
        ("jail/sub/up", "->../.."),
    ]);
    let sandbox = jail(&cabinet, SandboxConfig::default());

    assert_eq!(breakout_path(sandbox.open_path("sub/up/secret")), "/sub/up");
    assert_eq!(cabinet.open_handles(), 0);
}

#[test]
fn test_second_hop_escape_names_second_link() {
    let cabinet = build(&[
        ("secret", "top secret"),
        ("jail", "/"),
        ("jail/a", "/"),
        ("jail/b", "/"),
        ("jail/a/first", "->../b/second"),
        ("jail/b/second", "->../../secret"),
    ]);
    let sandbox = jail(&cabinet, SandboxConfig::default());

    assert_eq!(breakout_path(sandbox.open_path("a/first")), "/b/second");
    assert_eq!(cabinet.open_handles(), 0);
}

#[test]
fn test_absolute_link_is_refused() {
    let cabinet = build(&[
        ("jail", "/"),
        ("jail/inner", "x"),
        ("jail/abs", "->/jail/inner"),
    ]);
    let sandbox = jail(&cabinet, SandboxConfig::default());
    assert_eq!(breakout_path(sandbox.open_path("abs")), "/abs");
}

#[test]
fn test_caller_dotdot_above_root() {
    let cabinet = build(&[("jail", "/"), ("jail/d", "/"), ("secret", "s")]);
    let sandbox = jail(&cabinet, SandboxConfig::default());
    assert_eq!(breakout_path(sandbox.open_path("d/../../secret")), "/..");
    assert_eq!(breakout_path(sandbox.open_path("..")), "/..");
    assert!(sandbox.open_path("d/..").is_ok());
}

#[test]
fn test_link_cycle_hits_hop_limit() {
    let cabinet = build(&[("jail", "/"), ("jail/ping", "->pong"), ("jail/pong", "->ping")]);
    let config = SandboxConfig {
        max_symlink_hops: 5,
        ..SandboxConfig::default()
    };
    let sandbox = jail(&cabinet, config);
    assert!(matches!(
        sandbox.open_path("ping"),
        Err(FsError::SymlinkLoop { ref layer, .. }) if *layer == Layer::SANDBOX
    ));
    assert_eq!(cabinet.open_handles(), 0);
}

#[test]
fn test_final_link_not_followed_when_configured() {
    let cabinet = build(&[("jail", "/"), ("jail/out", "->../secret"), ("secret", "s")]);
    let config = SandboxConfig {
        follow_final_symlink: false,
        ..SandboxConfig::default()
    };
    let sandbox = jail(&cabinet, config);
    let link = sandbox.open_path("out").unwrap();
    assert_eq!(link.kind(), Kind::Symlink);
    assert_eq!(link.metadata().unwrap().linkname, "../secret");
    assert!(sandbox.open_path("out/x").unwrap_err().is_breakout());
}

#[test]
fn test_writes_land_in_delegate() {
    let cabinet = build(&[("jail", "/"), ("jail/d", "/")]);
    let sandbox = jail(&cabinet, SandboxConfig::default());

    let mut file = sandbox.open_path_with("d/new.txt", OpenMode::create()).unwrap();
    file.as_file().unwrap().write_all(b"via sandbox").unwrap();
    drop(file);

    let mut root = cabinet.open_root().unwrap();
    let mut direct =
        cabinet_fs::lookup_path(root.as_mut(), FsPath::parse("jail/d/new.txt").unwrap().names()).unwrap();
    let mut text = String::new();
    direct.as_file().unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text, "via sandbox");
}

#[test]
fn test_create_through_handle() {
    let cabinet = build(&[("jail", "/")]);
    let sandbox = jail(&cabinet, SandboxConfig::default());
    let mut root = sandbox.open_root().unwrap();
    let dir = root.as_dir().unwrap();
    let mut sub = dir.create(&name("sub"), Kind::Directory, Mode::DIR_DEFAULT).unwrap();
    sub.as_dir().unwrap().symlink(&name("home"), "..").unwrap();

    let home = sandbox.open_path("sub/home").unwrap();
    assert_eq!(home.kind(), Kind::Directory);
    assert!(home.path().is_root());
    assert_eq!(breakout_path(sandbox.open_path("sub/home/..")), "/..");
}

#[test]
fn test_rename_confined() {
    let cabinet = build(&[
        ("jail", "/"),
        ("jail/a", "/"),
        ("jail/a/f", "data"),
        ("jail/to_a", "->a"),
        ("jail/out", "->.."),
        ("victim", "v"),
    ]);
    let sandbox = jail(&cabinet, SandboxConfig::default());

    sandbox
        .rename(&FsPath::parse("to_a/f").unwrap(), &FsPath::parse("g").unwrap())
        .unwrap();
    assert_eq!(read_all(&sandbox, "g"), "data");

    let err = sandbox
        .rename(&FsPath::parse("out/victim").unwrap(), &FsPath::parse("mine").unwrap())
        .unwrap_err();
    assert!(err.is_breakout());
    let err = sandbox
        .rename(&FsPath::parse("g").unwrap(), &FsPath::parse("out/g").unwrap())
        .unwrap_err();
    assert!(err.is_breakout());
    assert_eq!(cabinet.open_handles(), 0);
}

#[test]
fn test_nested_sandboxes() {
    let cabinet = build(&[
        ("jail", "/"),
        ("jail/inner", "/"),
        ("jail/inner/f", "deep"),
        ("jail/shallow", "s"),
        ("jail/inner/up", "->../shallow"),
    ]);
    let outer = jail(&cabinet, SandboxConfig::default());
    let inner = Sandbox::new(outer, &FsPath::parse("inner").unwrap(), SandboxConfig::default()).unwrap();

    let mut handle = inner.open_path("f").unwrap();
    let mut text = String::new();
    handle.as_file().unwrap().read_to_string(&mut text).unwrap();
    assert_eq!(text, "deep");
    assert_eq!(breakout_path(inner.open_path("up")), "/up");
}
