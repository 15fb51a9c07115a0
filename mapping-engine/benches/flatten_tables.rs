//! FILENAME: benches/flatten_tables.rs
//! Benchmarks for whole flattening runs and the post-processing passes.
//!
//! Run with: `cargo bench --package mapping-engine`

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};

use entity_model::{EntityClass, EntityClassKind, MemoryModel, ParameterEntry, Value};
use mapping_engine::{
    compact_tables, compute_export, limit_tables, Axis, GroupFunction, MappingItem,
    MappingSpecification, ParameterScope, PreviewCaps, SpecificationData,
};

// =============================================================================
// Fixtures
// =============================================================================

/// A `unit__node` snapshot with `units * nodes` connections, each carrying
/// one `flow` parameter value.
fn create_grid_model(units: usize, nodes: usize) -> MemoryModel {
    let mut model = MemoryModel::new();
    model.add_class(EntityClass::relationship("unit__node", 2));

    for u in 0..units {
        for n in 0..nodes {
            let name = format!("u{u}__n{n}");
            model.add_entity(
                "unit__node",
                &name,
                vec![Value::text(format!("u{u}")), Value::text(format!("n{n}"))],
            );
            model.add_parameter(
                "unit__node",
                &name,
                ParameterEntry::new("flow", Value::Number((u * nodes + n) as f64)),
            );
        }
    }

    model
}

/// Pivot shape: units down the rows, nodes across the columns, summed flow
/// values in the body.
fn flow_matrix_spec() -> MappingSpecification {
    let mut data = SpecificationData::new(EntityClassKind::RelationshipClass);
    data.relationship_dimension_count = 2;
    data.parameter_scope = ParameterScope::Value;
    data.group_function = GroupFunction::Sum;
    data.items = vec![
        MappingItem::dimension(Axis::Row, 0, 1),
        MappingItem::dimension(Axis::Column, 0, 2),
        MappingItem::parameter_value(Axis::Row, 1),
    ];
    data.validate().unwrap()
}

/// Listing shape: one row per parameter visit under a titled header row.
fn listing_spec() -> MappingSpecification {
    let mut data = SpecificationData::new(EntityClassKind::RelationshipClass);
    data.relationship_dimension_count = 2;
    data.parameter_scope = ParameterScope::Value;
    data.always_export_header = true;
    data.items = vec![
        MappingItem::header_marker(0, "unit"),
        MappingItem::header_marker(1, "node"),
        MappingItem::header_marker(2, "parameter"),
        MappingItem::header_marker(3, "value"),
        MappingItem::dimension(Axis::Row, 0, 1),
        MappingItem::dimension(Axis::Row, 1, 2),
        MappingItem::parameter_name(Axis::Row, 2),
        MappingItem::parameter_value(Axis::Row, 3),
    ];
    data.validate().unwrap()
}

/// Listing with deliberate position gaps, leaving empty columns for the
/// compactor to drop.
fn sparse_listing_spec() -> MappingSpecification {
    let mut data = SpecificationData::new(EntityClassKind::RelationshipClass);
    data.relationship_dimension_count = 2;
    data.parameter_scope = ParameterScope::Value;
    data.items = vec![
        MappingItem::dimension(Axis::Row, 0, 1),
        MappingItem::dimension(Axis::Row, 4, 2),
        MappingItem::parameter_value(Axis::Row, 8),
    ];
    data.validate().unwrap()
}

// =============================================================================
// Specification Benchmarks
// =============================================================================

fn bench_specification(c: &mut Criterion) {
    let mut group = c.benchmark_group("specification");

    // Construction-time validation of a typical pivot configuration.
    group.bench_function("validate", |b| {
        b.iter_batched(
            || {
                let mut data = SpecificationData::new(EntityClassKind::RelationshipClass);
                data.relationship_dimension_count = 2;
                data.parameter_scope = ParameterScope::Value;
                data.group_function = GroupFunction::Sum;
                data.items = vec![
                    MappingItem::dimension(Axis::Row, 0, 1),
                    MappingItem::dimension(Axis::Column, 0, 2),
                    MappingItem::parameter_value(Axis::Row, 1),
                ];
                data
            },
            |data| black_box(data.validate().unwrap()),
            BatchSize::SmallInput,
        )
    });

    // Loading a stored specification funnels through the same validation.
    group.bench_function("load_stored_json", |b| {
        let json = serde_json::to_string(&flow_matrix_spec()).unwrap();
        b.iter(|| {
            let spec: MappingSpecification = serde_json::from_str(black_box(&json)).unwrap();
            black_box(spec)
        })
    });

    group.finish();
}

// =============================================================================
// Flattening Benchmarks
// =============================================================================

fn bench_flatten(c: &mut Criterion) {
    let mut group = c.benchmark_group("flatten");

    for (units, nodes) in [(10, 10), (50, 50), (100, 100)] {
        let count = units * nodes;
        let model = create_grid_model(units, nodes);

        // Pivoted matrix: distinct column keys accumulate as the run goes.
        let spec = flow_matrix_spec();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("pivot_matrix", count),
            &(model.clone(), spec),
            |b, (model, spec)| {
                b.iter(|| {
                    let outcome = compute_export(spec, model, None);
                    black_box(outcome.tables.len())
                })
            },
        );

        // Plain listing: row keys only, plus the always-exported header.
        let spec = listing_spec();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::new("titled_listing", count),
            &(model, spec),
            |b, (model, spec)| {
                b.iter(|| {
                    let outcome = compute_export(spec, model, None);
                    black_box(outcome.tables.len())
                })
            },
        );
    }

    group.finish();
}

// =============================================================================
// Post-Processing Benchmarks
// =============================================================================

fn bench_postprocess(c: &mut Criterion) {
    let mut group = c.benchmark_group("postprocess");

    let model = create_grid_model(50, 50);

    // Dropping all-empty columns from a sparse 2500-row listing.
    let sparse = compute_export(&sparse_listing_spec(), &model, None).tables;
    group.throughput(Throughput::Elements(2_500));
    group.bench_function("compact_sparse_listing", |b| {
        b.iter_batched(
            || sparse.clone(),
            |mut tables| {
                compact_tables(&mut tables);
                black_box(tables.len())
            },
            BatchSize::SmallInput,
        )
    });

    // Copying the preview slice out of a full 2500-row output.
    let full = compute_export(&listing_spec(), &model, None).tables;
    let caps = PreviewCaps::new(10, 50);
    group.bench_function("limit_to_preview", |b| {
        b.iter(|| black_box(limit_tables(&full, caps)))
    });

    group.finish();
}

criterion_group!(benches, bench_specification, bench_flatten, bench_postprocess);
criterion_main!(benches);
