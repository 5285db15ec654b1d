use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ringframe_core::{ContentCache, HandleAllocator, HandleKind, TemporalPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
enum Kind {
    Texture,
}

impl HandleKind for Kind {
    const COUNT: usize = 1;

    fn index(self) -> usize {
        self as usize
    }
}

// ---------------------------------------------------------------------------
// Handle allocation
// ---------------------------------------------------------------------------

fn bench_handle_churn(c: &mut Criterion) {
    c.bench_function("handle_allocate_release_advance_1k", |b| {
        let mut allocator = HandleAllocator::<Kind>::new(10);
        let mut live = Vec::with_capacity(1000);
        b.iter(|| {
            for _ in 0..1000 {
                live.push(allocator.allocate(Kind::Texture));
            }
            for handle in live.drain(..) {
                allocator.release(black_box(handle));
            }
            allocator.advance();
        });
    });
}

// ---------------------------------------------------------------------------
// Temporal caches
// ---------------------------------------------------------------------------

fn bench_pool_steady_state(c: &mut Criterion) {
    c.bench_function("temporal_pool_64_keys_per_frame", |b| {
        let mut created = 0u64;
        let mut pool: TemporalPool<u32, u64, u64, ()> = TemporalPool::new(
            "bench",
            4,
            Box::new(|count: &mut u64, _key: &u32| {
                *count += 1;
                Ok(*count)
            }),
            Box::new(|_: &mut u64, _: u64| {}),
        );
        b.iter(|| {
            for key in 0..64u32 {
                black_box(pool.request(&mut created, &key).ok());
            }
            pool.advance(&mut created);
        });
    });
}

fn bench_content_cache_hits(c: &mut Criterion) {
    c.bench_function("content_cache_64_hits_per_frame", |b| {
        let mut ctx = ();
        let mut cache: ContentCache<(u32, u32), u64, (), ()> = ContentCache::new(
            "bench",
            4,
            Box::new(|_: &mut (), key: &(u32, u32)| Ok(((key.0 as u64) << 32) | key.1 as u64)),
            Box::new(|_: &mut (), _: u64| {}),
        );
        b.iter(|| {
            for i in 0..64u32 {
                black_box(cache.request(&mut ctx, &(i, i * 2)).ok());
            }
            cache.advance(&mut ctx);
        });
    });
}

criterion_group!(handles, bench_handle_churn);
criterion_group!(caches, bench_pool_steady_state, bench_content_cache_hits);
criterion_main!(handles, caches);
