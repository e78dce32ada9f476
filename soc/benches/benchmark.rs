extern crate criterion;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use soc::fields::parse_fixed;
use soc::prelude::*;
use soc::transpose;

use std::io::Cursor;

fn transpose_benchmark(c: &mut Criterion) {
    // worst case matrix: 32 columns, 32 bits
    let src: Vec<u8> = (0..128u32).map(|i| (i * 37 + 11) as u8).collect();
    let mut out = [0i64; 32];
    c.bench_function("transpose 32x32", |b| {
        b.iter(|| {
            transpose::transpose(black_box(&src), 32, 32, &mut out);
            black_box(out[0])
        })
    });
}

fn parse_benchmark(c: &mut Criterion) {
    c.bench_function("parse_fixed F14.3", |b| {
        b.iter(|| parse_fixed(black_box(b"  23619095.450  "), 14, 3))
    });

    // a day of 30 second epochs, one satellite
    let mut text = String::from(
        "     2.11           OBSERVATION DATA    G (GPS)             RINEX VERSION / TYPE
     2    C1    L1                                          # / TYPES OF OBSERV
                                                            END OF HEADER
",
    );
    for i in 0..2880i64 {
        let (hh, mm, ss) = (i / 120, (i / 2) % 60, (i % 2) * 30);
        text.push_str(&format!(
            " 21 12 21 {:>2} {:>2} {:>2}.0000000  0  1G05\n",
            hh, mm, ss
        ));
        text.push_str(&format!(
            "  {}.{:03}   {}.{:03}48\n",
            20000000 + i,
            (i * 211) % 1000,
            100000000 + i * 3,
            (i * 731) % 1000,
        ));
    }
    c.bench_function("parse one day", |b| {
        b.iter(|| {
            let stream = BufferedStream::new(Cursor::new(text.as_bytes().to_vec()));
            let mut reader = ObsReader::new(stream).unwrap();
            let mut records = 0u32;
            while reader.read().unwrap() {
                records += 1;
            }
            black_box(records)
        })
    });
    c.bench_function("encode one day", |b| {
        b.iter(|| {
            let stream = BufferedStream::new(Cursor::new(text.as_bytes().to_vec()));
            let mut reader = ObsReader::new(stream).unwrap();
            let mut writer = SocWriter::new(reader.header().clone());
            while reader.read().unwrap() {
                writer.add_record(&reader).unwrap();
            }
            let mut bytes = Vec::new();
            writer.write_to(&mut bytes).unwrap();
            black_box(bytes.len())
        })
    });
}

criterion_group!(benches, transpose_benchmark, parse_benchmark);
criterion_main!(benches);
