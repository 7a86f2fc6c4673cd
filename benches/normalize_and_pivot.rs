use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use inventory_report::aggregate::{self, GroupBy, Measure, SortOrder};
use inventory_report::data::CellValue;
use inventory_report::metrics;
use inventory_report::normalize;
use inventory_report::raw::RawTable;
use inventory_report::synonyms::SynonymDictionary;

fn generate_inventory(rows: usize) -> RawTable {
    let headers = ["Código", "Artículo", "Familia", "Proveedor", "Existencias", "Precio Unitario"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let categories = ["Herramientas", "Pintura", "Ferretería", "Jardín", "Eléctrico"];
    let suppliers = ["Acme", "Bolt", "Norte", "Sur"];
    let data = (0..rows)
        .map(|i| {
            vec![
                CellValue::Text(format!("SKU-{i:06}")),
                CellValue::Text(format!("Item {}", i % 500)),
                CellValue::Text(categories[i % categories.len()].to_string()),
                CellValue::Text(suppliers[i % suppliers.len()].to_string()),
                CellValue::Text(((i * 7) % 300).to_string()),
                CellValue::Text(format!("{}.{:02}", i % 90, i % 100)),
            ]
        })
        .collect();
    RawTable::new(headers, data).expect("raw table")
}

fn bench_normalize_and_pivot(c: &mut Criterion) {
    let dictionary = SynonymDictionary::default();
    let raw = generate_inventory(50_000);

    c.bench_function("normalize_derive_50k", |b| {
        b.iter(|| {
            let normalized = normalize::normalize(&raw, &dictionary);
            metrics::derive(&normalized).expect("derive")
        })
    });

    let normalized = normalize::normalize(&raw, &dictionary);
    let (enriched, _) = metrics::derive(&normalized).expect("derive");

    c.bench_function("pivot_category_supplier_50k", |b| {
        b.iter(|| {
            aggregate::aggregate_by(
                &enriched,
                GroupBy::CategoryBySupplier,
                Measure::TotalValue,
                SortOrder::LabelAscending,
            )
        })
    });

    c.bench_function("product_series_top20_50k", |b| {
        b.iter_batched(
            || enriched.clone(),
            |table| {
                aggregate::group_sum(
                    &table,
                    inventory_report::synonyms::CanonicalField::Product,
                    Measure::TotalValue,
                    SortOrder::ValueDescending,
                )
                .map(|series| series.top(aggregate::CHART_TOP_N))
            },
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_normalize_and_pivot);
criterion_main!(benches);
