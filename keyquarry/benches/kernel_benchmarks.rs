use criterion::{black_box, criterion_group, criterion_main, Criterion};
use keyquarry::config::Configuration;
use keyquarry::kernel::ops::SetOptions;
use keyquarry::kernel::Kernel;

fn bench_set(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let kernel = Kernel::new(Configuration::default());

    c.bench_function("kernel set new key", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("bench-{}", rand::random::<u32>());
                kernel
                    .set(black_box("bench-client"), black_box(&key), black_box(b"payload".to_vec()), SetOptions::default())
                    .await
                    .unwrap();
            })
        })
    });
}

fn bench_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let kernel = Kernel::new(Configuration::default());
    rt.block_on(async {
        kernel.set("bench-client", "hot-key", b"payload".to_vec(), SetOptions::default()).await.unwrap();
    });

    c.bench_function("kernel get existing key", |b| {
        b.iter(|| {
            rt.block_on(async {
                kernel.get(black_box("bench-client"), black_box("hot-key")).await.unwrap();
            })
        })
    });
}

fn bench_eager_prune(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut cfg = Configuration::default();
    cfg.max_keys = Some(1000);
    cfg.eager_prune_at = Some(1000);
    cfg.eager_prune_to = Some(900);
    cfg.min_lifespan_secs = Some(0);
    let kernel = Kernel::new(cfg);
    rt.block_on(async {
        for i in 0..1000 {
            kernel.set("bench-client", &format!("k{i}"), b"v".to_vec(), SetOptions::default()).await.unwrap();
        }
    });

    c.bench_function("kernel set triggering eager prune", |b| {
        b.iter(|| {
            rt.block_on(async {
                let key = format!("overflow-{}", rand::random::<u32>());
                kernel.set("bench-client", &key, b"v".to_vec(), SetOptions::default()).await.unwrap();
            })
        })
    });
}

criterion_group!(benches, bench_set, bench_get, bench_eager_prune);
criterion_main!(benches);
