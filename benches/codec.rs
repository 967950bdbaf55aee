use confstore::config::format::render_item;
use confstore::config::{parse_line, NumericContext};
use confstore::{ConfigPersistence, ModuleDescriptor, OptionItem, PersistenceConfig, Registry};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const LINES: &[&str] = &[
    "[audio] # Audio output\n",
    "# Output volume (integer)\n",
    "#volume=50\n",
    "device=hw:0,0\n",
    "\n",
    "not an option\n",
];

fn benchmark_parse_line(c: &mut Criterion) {
    c.bench_function("parse_line", |b| {
        b.iter(|| {
            for line in LINES {
                black_box(parse_line(black_box(line)));
            }
        })
    });
}

fn benchmark_numbers(c: &mut Criterion) {
    let numeric = NumericContext;
    c.bench_function("parse_integer", |b| {
        b.iter(|| {
            black_box(numeric.parse_integer(black_box("-9223372036854775808")).ok());
            black_box(numeric.parse_integer(black_box("0x7fff")).ok());
        })
    });
    c.bench_function("parse_float", |b| {
        b.iter(|| black_box(numeric.parse_float(black_box("0.3333333"))))
    });
}

fn benchmark_render_item(c: &mut Criterion) {
    let numeric = NumericContext;
    let item = OptionItem::float("rate", 1.25).with_description("Playback rate");
    c.bench_function("render_item", |b| {
        b.iter(|| black_box(render_item(black_box(&item), &numeric)))
    });
}

fn benchmark_save(c: &mut Criterion) {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let persistence = ConfigPersistence::new(PersistenceConfig::in_dir(temp_dir.path()));

    let registry = Registry::new();
    for m in 0..20 {
        let mut module = ModuleDescriptor::new(format!("module{}", m));
        for i in 0..25 {
            module = module.with_item(
                OptionItem::integer(format!("module{}-option{}", m, i), i)
                    .with_description("Benchmark option"),
            );
        }
        registry.register(module).unwrap();
    }

    c.bench_function("save_500_options", |b| {
        b.iter(|| persistence.save(black_box(&registry)).unwrap())
    });
}

criterion_group!(
    benches,
    benchmark_parse_line,
    benchmark_numbers,
    benchmark_render_item,
    benchmark_save
);
criterion_main!(benches);
