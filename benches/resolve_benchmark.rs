/*!
 * Sandbox Resolution Benchmarks
 *
 * Compare direct delegate lookup against hop-by-hop sandbox resolution
 */

use cabinet_fs::{lookup_path, Cabinet, FsPath, Kind, MemCabinet, Mode, Name, Sandbox, SandboxConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

/// /jail/d0/d1/.../d{depth-1}/leaf plus /jail/link{i} chains
fn deep_tree(depth: usize) -> MemCabinet {
    let cabinet = MemCabinet::new();
    let mut current = cabinet.open_root().unwrap();
    current = current
        .as_dir()
        .unwrap()
        .create(&Name::new("jail").unwrap(), Kind::Directory, Mode::DIR_DEFAULT)
        .unwrap();
    for i in 0..depth {
        let next = current
            .as_dir()
            .unwrap()
            .create(&Name::new(format!("d{}", i)).unwrap(), Kind::Directory, Mode::DIR_DEFAULT)
            .unwrap();
        current = next;
    }
    current
        .as_dir()
        .unwrap()
        .create(&Name::new("leaf").unwrap(), Kind::RegularFile, Mode::FILE_DEFAULT)
        .unwrap();
    cabinet
}

fn deep_path(depth: usize) -> String {
    let mut path: Vec<String> = (0..depth).map(|i| format!("d{}", i)).collect();
    path.push("leaf".to_string());
    path.join("/")
}

fn bench_resolution_depth(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution_depth");

    for depth in [1usize, 8, 32] {
        let cabinet = deep_tree(depth);
        let sandbox =
            Sandbox::new(cabinet.clone(), &FsPath::parse("jail").unwrap(), SandboxConfig::default()).unwrap();
        let path = deep_path(depth);
        let full = FsPath::parse(&format!("jail/{}", path)).unwrap();

        group.bench_with_input(BenchmarkId::new("direct", depth), &full, |b, full| {
            b.iter(|| {
                let mut root = cabinet.open_root().unwrap();
                black_box(lookup_path(root.as_mut(), full.names()).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("sandbox", depth), &path, |b, path| {
            b.iter(|| black_box(sandbox.open_path(path).unwrap()));
        });
    }

    group.finish();
}

fn bench_symlink_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("symlink_chain");

    for hops in [1usize, 10, 30] {
        let cabinet = deep_tree(0);
        {
            let mut root = cabinet.open_root().unwrap();
            let mut jail = root
                .as_dir()
                .unwrap()
                .open(&Name::new("jail").unwrap(), cabinet_fs::OpenMode::read_only())
                .unwrap();
            let dir = jail.as_dir().unwrap();
            dir.symlink(&Name::new("link0").unwrap(), "leaf").unwrap();
            for i in 1..hops {
                dir.symlink(&Name::new(format!("link{}", i)).unwrap(), &format!("link{}", i - 1))
                    .unwrap();
            }
        }
        let sandbox =
            Sandbox::new(cabinet, &FsPath::parse("jail").unwrap(), SandboxConfig::default()).unwrap();
        let start = format!("link{}", hops - 1);

        group.bench_with_input(BenchmarkId::from_parameter(hops), &start, |b, start| {
            b.iter(|| black_box(sandbox.open_path(start).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resolution_depth, bench_symlink_chain);
criterion_main!(benches);
