use criterion::{Criterion, criterion_group, criterion_main};
use postlink_syntax::{Grammar, parse, tokenize};

fn generate_post(lines: usize) -> String {
    let base = ">>1234 you are wrong\n>implying [spoiler]the ending[/spoiler]\nsee `code` and https://example.org/x >>>/g/\n";
    base.repeat(lines)
}

fn bench_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    group.sample_size(10);

    let grammar = Grammar::default();
    let content = generate_post(50);

    group.bench_function("tokenize", |b| {
        b.iter(|| {
            let tokens: Vec<_> = tokenize(std::hint::black_box(&content), &grammar).collect();
            std::hint::black_box(tokens);
        });
    });

    group.bench_function("tokenize_and_assemble", |b| {
        b.iter(|| {
            let assembly = parse(std::hint::black_box(&content), &grammar);
            std::hint::black_box(assembly);
        });
    });

    let adversarial = format!("{}x", "[spoiler]".repeat(2000));
    group.bench_function("adversarial_openers", |b| {
        b.iter(|| {
            let assembly = parse(std::hint::black_box(&adversarial), &grammar);
            std::hint::black_box(assembly);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parsing);
criterion_main!(benches);
