#![allow(missing_docs)]
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use permakey_primitives::{
    DEFAULT_SEED_LABEL, HmacDrbg, Jwk, RsaKeyGenerator, Seed, StorageAddress, derive_seed,
    drbg::ByteSource,
};

pub fn seed_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("seed");
    group.sample_size(10);

    group.bench_function("pbkdf2_100k", |b| {
        b.iter(|| black_box(derive_seed(&[1u8; 32], DEFAULT_SEED_LABEL).unwrap()))
    });

    group.finish();
}

pub fn drbg_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("drbg");
    let seed = Seed::new([1u8; 32]);

    for size in [32usize, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("next", size), &size, |b, &size| {
            let mut drbg = HmacDrbg::new(&seed);
            b.iter(|| black_box(drbg.next(size)))
        });
    }

    group.finish();
}

pub fn keygen_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("keygen");
    group.sample_size(10);

    for bits in [1024usize, 2048] {
        group.bench_with_input(BenchmarkId::new("generate", bits), &bits, |b, &bits| {
            let generator = RsaKeyGenerator::new(bits).unwrap();
            let mut counter = 0u8;
            b.iter(|| {
                counter = counter.wrapping_add(1);
                black_box(generator.generate_from_seed(&Seed::new([counter; 32])).unwrap())
            })
        });
    }

    group.finish();
}

pub fn signing_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("pss");
    let key = RsaKeyGenerator::new(2048)
        .unwrap()
        .generate_from_seed(&Seed::new([9u8; 32]))
        .unwrap();
    let message = [0x5au8; 48];
    let signature = key.sign_pss(&message).unwrap();

    group.bench_function("sign_2048", |b| {
        b.iter(|| black_box(key.sign_pss(&message).unwrap()))
    });

    group.bench_function("verify_2048", |b| {
        b.iter(|| black_box(key.verify_pss(&message, &signature)))
    });

    group.bench_function("jwk_decode_2048", |b| {
        let jwk = Jwk::from(&key);
        b.iter(|| black_box(jwk.to_keypair().unwrap()))
    });

    group.bench_function("address_2048", |b| {
        b.iter(|| black_box(StorageAddress::from_keypair(&key)))
    });

    group.finish();
}

criterion_group!(
    benches,
    seed_benchmarks,
    drbg_benchmarks,
    keygen_benchmarks,
    signing_benchmarks
);
criterion_main!(benches);
