// Signing & verification benchmarks for the gateway path.
//
// Covers canonicalization at various parameter counts, HMAC-SHA512 signing
// and verification, full redirect construction, and callback verification
// from a raw query string.

use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use claimpay_protocol::config::GatewayConfig;
use claimpay_protocol::gateway::{
    canonicalize, sign, verify, Amount, CallbackVerifier, ParameterSet, PaymentRequest,
    PaymentRequestBuilder, SignatureEngine,
};

const SECRET: &str = "BENCHSECRETBENCHSECRETBENCHSECRE";

fn params(count: usize) -> ParameterSet {
    ParameterSet::from_pairs((0..count).map(|i| {
        (
            format!("vnp_Field{i:03}"),
            format!("value {i} with spaces & symbols / ? ="),
        )
    }))
    .unwrap()
}

fn bench_canonicalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("gateway/canonicalize");

    for size in [5, 15, 50] {
        let set = params(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &set, |b, set| {
            b.iter(|| canonicalize(set).unwrap());
        });
    }

    group.finish();
}

fn bench_sign(c: &mut Criterion) {
    let text = canonicalize(&params(15)).unwrap();
    c.bench_function("hmac_sha512/sign", |b| {
        b.iter(|| sign(&text, SECRET).unwrap());
    });
}

fn bench_verify(c: &mut Criterion) {
    let text = canonicalize(&params(15)).unwrap();
    let signature = sign(&text, SECRET).unwrap();
    c.bench_function("hmac_sha512/verify", |b| {
        b.iter(|| verify(&text, SECRET, &signature));
    });
}

fn bench_build_redirect(c: &mut Criterion) {
    let builder = PaymentRequestBuilder::new(GatewayConfig::new("CLAIMPAY", SECRET)).unwrap();
    let request = PaymentRequest::new(
        "CLAIM-2025-0042",
        Amount::parse("1250000").unwrap(),
        "travel",
        "https://claims.example.com/payments/return",
        "203.0.113.7",
    );
    let now = Utc.with_ymd_and_hms(2025, 3, 9, 7, 0, 0).unwrap();

    c.bench_function("gateway/build_redirect", |b| {
        b.iter(|| builder.build_at(&request, now).unwrap());
    });
}

fn bench_verify_callback(c: &mut Criterion) {
    let engine = SignatureEngine::with_secret(SECRET).unwrap();
    let query = engine.sign_parameters(params(15)).unwrap().query_string();
    let verifier = CallbackVerifier::new(&GatewayConfig::new("CLAIMPAY", SECRET)).unwrap();

    c.bench_function("gateway/verify_callback_query", |b| {
        b.iter(|| verifier.verify_query(&query));
    });
}

criterion_group!(
    benches,
    bench_canonicalize,
    bench_sign,
    bench_verify,
    bench_build_redirect,
    bench_verify_callback,
);
criterion_main!(benches);
