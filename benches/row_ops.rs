//! Benchmarks for the hot row-mutation paths: dense append, swap-and-pop
//! delete, and cross-table move. Grounded on the teacher's own
//! `spawn_bench.rs`/`ecs_bench.rs` shape (warm a table, then measure the
//! steady-state cost of one operation at a fixed entity count) adapted to
//! this crate's table-level API instead of a `World::spawn` surface.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use archetype_storage::external::NullObserver;
use archetype_storage::hooks::{ComponentHooks, TypeInfo};
use archetype_storage::id::Id;
use archetype_storage::table::{Table, TableStore};
use archetype_storage::table_data::ColumnMove;
use archetype_storage::type_vec::Type;

#[derive(Clone, Copy)]
#[repr(C)]
struct Position {
    x: f32,
    y: f32,
}

fn position_info() -> TypeInfo {
    TypeInfo::new(
        std::mem::size_of::<Position>(),
        std::mem::align_of::<Position>(),
        ComponentHooks::none(),
    )
}

const POSITION: u64 = 1;
const VELOCITY: u64 = 2;

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    for &n in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut store = TableStore::new();
                let ty = Type::from_ids(vec![Id::plain(POSITION)]).unwrap();
                let mut observer = NullObserver;
                let id = store.create_table(ty, |_| Some(position_info()), &mut observer);
                let table = store.get_mut(id).unwrap();
                for e in 0..n as u64 {
                    black_box(table.append(e, true, false, &mut observer));
                }
            });
        });
    }
    group.finish();
}

fn bench_swap_and_pop_delete(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_front");
    for &n in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let mut store = TableStore::new();
                    let ty = Type::from_ids(vec![Id::plain(POSITION)]).unwrap();
                    let mut observer = NullObserver;
                    let id = store.create_table(ty, |_| Some(position_info()), &mut observer);
                    {
                        let table = store.get_mut(id).unwrap();
                        for e in 0..n as u64 {
                            table.append(e, true, false, &mut observer);
                        }
                    }
                    (store, id)
                },
                |(mut store, id)| {
                    let mut observer = NullObserver;
                    let table = store.get_mut(id).unwrap();
                    for _ in 0..n {
                        black_box(table.delete(0, true, &mut observer));
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_cross_table_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_table_move");
    for &n in &[100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter_batched(
                || {
                    let mut store = TableStore::new();
                    let src_ty = Type::from_ids(vec![Id::plain(POSITION)]).unwrap();
                    let dst_ty = Type::from_ids(vec![Id::plain(POSITION), Id::plain(VELOCITY)]).unwrap();
                    let mut observer = NullObserver;
                    let src = store.create_table(src_ty, |_| Some(position_info()), &mut observer);
                    let dst = store.create_table(dst_ty, |_| Some(position_info()), &mut observer);
                    {
                        let table = store.get_mut(src).unwrap();
                        for e in 0..n as u64 {
                            table.append(e, true, false, &mut observer);
                        }
                    }
                    (store, src, dst)
                },
                |(mut store, src, dst)| {
                    let mut observer = NullObserver;
                    let col_map = [ColumnMove::Shared(0), ColumnMove::New];
                    for _ in 0..n {
                        let [dst_table, src_table] = store.get_disjoint_mut(dst, src).unwrap();
                        // Row 0 is always valid while src is non-empty: the
                        // move's own swap-and-pop pulls the last row into 0.
                        black_box(Table::move_row(
                            dst_table,
                            &col_map,
                            &[],
                            src_table,
                            0,
                            true,
                            true,
                            &mut observer,
                        ));
                    }
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_append, bench_swap_and_pop_delete, bench_cross_table_move);
criterion_main!(benches);
