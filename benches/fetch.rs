use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use itemdrive::{
    AttributeQuery, DataSource, FactQuery, InMemoryDataSource, ItemDrive, PartialFact, PartialItem,
    QueryMode, ValueType,
};

const ITEMS: usize = 1_000;

fn populated_drive() -> ItemDrive {
    let drive = ItemDrive::new(Arc::new(InMemoryDataSource::new()));
    for i in 0..ITEMS {
        drive
            .insert_item(
                PartialItem::new()
                    .item_id(format!("item-{i}"))
                    .item_type("person")
                    .attribute(PartialFact::new().attribute("name").value([format!("name-{}", i % 50)]))
                    .attribute(
                        PartialFact::new()
                            .attribute("age")
                            .value_type(ValueType::Number)
                            .numerical_value([(i % 90) as f64]),
                    ),
            )
            .unwrap();
    }
    drive
}

fn bench_fetch(c: &mut Criterion) {
    let drive = populated_drive();
    let mut group = c.benchmark_group("fetch_facts");
    group.throughput(Throughput::Elements((ITEMS * 2) as u64));

    let by_item = FactQuery::for_item("item-500");
    group.bench_function("by_item", |b| {
        b.iter(|| drive.fetch_facts(black_box(&by_item)).unwrap());
    });

    let scan = FactQuery::new().attribute(AttributeQuery::new("age").at_or_above(65.0));
    group.bench_function("full_scan_range", |b| {
        b.iter(|| drive.fetch_facts(black_box(&scan)).unwrap());
    });
    group.finish();

    let items = FactQuery::new()
        .mode(QueryMode::ItemConjunction)
        .attribute(AttributeQuery::new("name").value_includes(["name-7"]))
        .attribute(AttributeQuery::new("age").at_or_below(30.0));
    c.bench_function("fetch_items/item_conjunction", |b| {
        b.iter(|| drive.fetch_items(black_box(&items)).unwrap());
    });
}

criterion_group!(benches, bench_fetch);
criterion_main!(benches);
