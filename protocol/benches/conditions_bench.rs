// Crypto-condition and validation benchmarks.
//
// Covers fulfillment serialization and parsing, threshold trees of growing
// width, transaction signing, and full validation of a TRANSFER.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use ccledger_protocol::conditions::{Ed25519Sha256, Fulfillment, ThresholdSha256};
use ccledger_protocol::crypto::Keypair;
use ccledger_protocol::storage::MemoryStore;
use ccledger_protocol::transaction::{Asset, Transaction};
use ccledger_protocol::validation::Validator;

const MESSAGE: &[u8] = b"spend output 0 of 5f1c...";

fn signed_leaf(seed: u8) -> Fulfillment {
    let kp = Keypair::from_seed(&[seed; 32]);
    Fulfillment::Ed25519(
        Ed25519Sha256::new(kp.public_key(), Vec::new(), 32)
            .sign(&kp, MESSAGE)
            .unwrap(),
    )
}

fn threshold(width: u8) -> Fulfillment {
    let k = u32::from(width).div_ceil(2);
    let t = (0..width).fold(ThresholdSha256::new(k).unwrap(), |t, i| {
        t.with_subfulfillment(signed_leaf(i))
    });
    Fulfillment::Threshold(t)
}

fn bench_ed25519_uri(c: &mut Criterion) {
    let leaf = signed_leaf(1);
    let uri = leaf.serialize_uri().unwrap();

    c.bench_function("ed25519/serialize_uri", |b| {
        b.iter(|| leaf.serialize_uri().unwrap());
    });
    c.bench_function("ed25519/from_uri", |b| {
        b.iter(|| Fulfillment::from_uri(&uri).unwrap());
    });
    c.bench_function("ed25519/validate", |b| {
        b.iter(|| leaf.validate_message(MESSAGE));
    });
}

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold");

    for width in [2u8, 8, 32] {
        let tree = threshold(width);
        let uri = tree.serialize_uri().unwrap();

        group.throughput(Throughput::Elements(u64::from(width)));
        group.bench_with_input(BenchmarkId::new("condition", width), &tree, |b, tree| {
            b.iter(|| tree.condition());
        });
        group.bench_with_input(BenchmarkId::new("serialize_uri", width), &tree, |b, tree| {
            b.iter(|| tree.serialize_uri().unwrap());
        });
        group.bench_with_input(BenchmarkId::new("from_uri", width), &uri, |b, uri| {
            b.iter(|| Fulfillment::from_uri(uri).unwrap());
        });
    }

    group.finish();
}

fn bench_transactions(c: &mut Criterion) {
    let issuer = Keypair::generate();
    let alice = Keypair::generate();
    let bob = Keypair::generate();
    let federation = [issuer.public_key()];
    let store = MemoryStore::new();
    let validator = Validator::new(&store, &federation);

    let create = Transaction::create(
        &[issuer.public_key()],
        &[(vec![alice.public_key().into()], 1)],
        Asset::default(),
        None,
    )
    .unwrap()
    .sign(&[issuer.clone()])
    .unwrap();
    validator.submit(&create).unwrap();

    let unsigned = Transaction::transfer(
        create.to_inputs(None).unwrap(),
        &[(vec![bob.public_key().into()], 1)],
        create.asset_id(),
        None,
    )
    .unwrap();
    let signed = unsigned.sign(&[alice.clone()]).unwrap();

    c.bench_function("transaction/sign_transfer", |b| {
        b.iter(|| unsigned.sign(&[alice.clone()]).unwrap());
    });
    c.bench_function("transaction/validate_transfer", |b| {
        b.iter(|| validator.validate_transaction(&signed).unwrap());
    });
}

criterion_group!(
    benches,
    bench_ed25519_uri,
    bench_threshold,
    bench_transactions,
);
criterion_main!(benches);
