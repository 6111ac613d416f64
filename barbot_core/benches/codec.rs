use barbot_core::protocol::{self, HeartbeatFilter};
use criterion::{Criterion, black_box, criterion_group, criterion_main};

// A mixing run as the board reports it: ACKs, a long STATUS stream, DONE.
fn synth_traffic(n_status: usize) -> Vec<String> {
    let mut v = Vec::with_capacity(n_status + 8);
    v.push("ACK SetPumpPower".to_string());
    v.push("ACK Draft".to_string());
    for _ in 0..n_status {
        v.push("STATUS Draft".to_string());
    }
    v.push("DONE Draft".to_string());
    v.push("ACK GetWeight 123.4".to_string());
    v.push("ERROR Crush 33 57".to_string());
    for _ in 0..n_status / 4 {
        v.push("STATUS IDLE".to_string());
    }
    v
}

fn bench_decode(c: &mut Criterion) {
    let lines = synth_traffic(1_000);
    c.bench_function("decode_1k_status", |b| {
        b.iter(|| {
            for l in &lines {
                black_box(protocol::decode(black_box(l)));
            }
        });
    });
}

fn bench_encode(c: &mut Criterion) {
    c.bench_function("encode_draft", |b| {
        b.iter(|| black_box(protocol::encode_command(black_box("Draft"), &["3", "120"])));
    });
}

fn bench_heartbeat_filter(c: &mut Criterion) {
    let msgs: Vec<_> = synth_traffic(1_000)
        .iter()
        .map(|l| protocol::decode(l))
        .collect();
    c.bench_function("heartbeat_filter", |b| {
        b.iter(|| {
            let mut f = HeartbeatFilter::default();
            let mut logged = 0usize;
            for m in &msgs {
                if f.should_log(m) {
                    logged += 1;
                }
            }
            black_box(logged)
        });
    });
}

criterion_group!(benches, bench_decode, bench_encode, bench_heartbeat_filter);
criterion_main!(benches);
