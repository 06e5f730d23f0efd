use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fx10_dxbc::{DxbcFile, FourCC};

fn synthetic_container(chunk_count: usize, chunk_len: usize) -> Vec<u8> {
    let header_len = 32 + 4 * chunk_count;
    let total = header_len + chunk_count * (8 + chunk_len);

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"DXBC");
    out.extend_from_slice(&[0u8; 16]);
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(chunk_count as u32).to_le_bytes());
    for i in 0..chunk_count {
        out.extend_from_slice(&((header_len + i * (8 + chunk_len)) as u32).to_le_bytes());
    }
    for _ in 0..chunk_count {
        out.extend_from_slice(&FourCC::FX10.0);
        out.extend_from_slice(&(chunk_len as u32).to_le_bytes());
        out.resize(out.len() + chunk_len, 0xCD);
    }
    out
}

fn bench_parse(c: &mut Criterion) {
    let small = synthetic_container(4, 256);
    let large = synthetic_container(64, 16 * 1024);

    c.bench_function("dxbc_parse_small", |b| {
        b.iter(|| DxbcFile::parse(black_box(&small)).unwrap())
    });
    c.bench_function("dxbc_parse_large_walk_chunks", |b| {
        b.iter(|| {
            let file = DxbcFile::parse(black_box(&large)).unwrap();
            file.chunks().map(|c| c.data.len()).sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
