use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docbody::streaming::{
    copy, BufferedReader, BufferedWriter, ByteSink, ChunkedReader, ChunkedWriter, SliceSource,
};

fn make_document(len: usize) -> Vec<u8> {
    br#"{"_id":"bench","_rev":"1-abc","value":[1,2,3,4,5]},"#
        .iter()
        .copied()
        .cycle()
        .take(len)
        .collect()
}

fn encode(data: &[u8], write_size: usize) -> Vec<u8> {
    let mut wire = Vec::with_capacity(data.len() + data.len() / 64 + 16);
    {
        let mut writer = ChunkedWriter::new(BufferedWriter::new(&mut wire));
        for piece in data.chunks(write_size) {
            writer.write(piece).unwrap();
        }
        writer.close().unwrap();
    }
    wire
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_encode");
    let data = make_document(1024 * 1024);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for write_size in [16, 512, 4096, 65536].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(write_size),
            write_size,
            |b, &write_size| {
                b.iter(|| encode(black_box(&data), write_size));
            },
        );
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_decode");
    let data = make_document(1024 * 1024);
    let wire = encode(&data, 4096);
    group.throughput(Throughput::Bytes(data.len() as u64));

    for max_span in [64, 1500, 8192].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(max_span),
            max_span,
            |b, &max_span| {
                b.iter(|| {
                    let source = SliceSource::with_max_span(black_box(&wire), max_span);
                    let mut reader = ChunkedReader::new(BufferedReader::new(source));
                    let mut body = Vec::with_capacity(data.len());
                    copy(&mut reader, &mut body).unwrap();
                    body
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
