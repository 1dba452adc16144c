#![expect(clippy::panic)]

use codspeed_criterion_compat::{Criterion, Throughput, criterion_group, criterion_main};
use oxshape::{
    ShaclProcessor, ShapeFormat, ShapeGraph, ShapeSource, Telemetry, ValidationEngineContext,
};
use serde_json::{Map, Value, json};
use std::fmt::Write;

/// Shapes graph with `size` node shapes, each with a string and a numeric property
fn create_shapes(size: usize) -> String {
    let mut turtle = String::from(
        "@prefix sh: <http://www.w3.org/ns/shacl#> .\n\
         @prefix xsd: <http://www.w3.org/2001/XMLSchema#> .\n\
         @prefix ex: <http://example.org/> .\n",
    );
    for i in 0..size {
        let _ = writeln!(
            turtle,
            "ex:Shape{i} a sh:NodeShape ; sh:targetClass ex:Class{i} ;\n\
             sh:property [ sh:path ex:name ; sh:minCount 1 ; sh:datatype xsd:string ; \
             sh:minLength 3 ; sh:pattern \"^[A-Z]\" ] ;\n\
             sh:property [ sh:path ex:score ; sh:minInclusive 0.0 ; sh:maxInclusive 1.0 ] ."
        );
    }
    turtle
}

fn data() -> Map<String, Value> {
    match json!({ "name": "Alice", "score": 0.5 }) {
        Value::Object(map) => map,
        _ => panic!("not an object"),
    }
}

fn parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("shapes graph parsing");
    for size in [10, 100, 1_000] {
        let turtle = create_shapes(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("parse {size} node shapes"), |b| {
            b.iter(|| ShapeGraph::parse(&turtle, ShapeFormat::Turtle).unwrap())
        });
    }
    group.finish();
}

fn compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("rule compilation");
    for size in [10, 100, 1_000] {
        let source = ShapeSource::new(create_shapes(size), ShapeFormat::Turtle);
        let context = ValidationEngineContext::default().with_telemetry(Telemetry::noop());
        let processor = ShaclProcessor::new(&context);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("compile {size} cached node shapes"), |b| {
            b.iter(|| processor.compile(&source).unwrap())
        });
    }
    group.finish();
}

fn validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("data validation");
    let data = data();
    for size in [10, 100, 1_000] {
        let context = ValidationEngineContext::default().with_telemetry(Telemetry::noop());
        let processor = ShaclProcessor::new(&context);
        let rules = processor
            .compile(&ShapeSource::new(create_shapes(size), ShapeFormat::Turtle))
            .unwrap()
            .rules();
        group.throughput(Throughput::Elements(rules.len() as u64));
        group.bench_function(format!("validate against {} rules", rules.len()), |b| {
            b.iter(|| processor.validate_data(&data, &rules))
        });
    }
    group.finish();
}

criterion_group!(benches, parse, compile, validate);
criterion_main!(benches);
