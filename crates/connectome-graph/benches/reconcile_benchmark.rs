use connectome_core::{Connection, ConnectionType, Neuron, Workspace};
use connectome_graph::{GraphReconciler, ReconcileInput, RenderSurface, RenderedGraph};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

/// Workspace with `classes` bilateral classes, a third of them active, and
/// `density` random connections per class.
fn create_test_dataset(classes: usize, density: usize) -> (Workspace, Vec<Connection>) {
    let mut neurons = Vec::with_capacity(classes * 2);
    for i in 0..classes {
        let class = format!("C{}", i);
        neurons.push(Neuron::new(format!("{}L", class), class.clone()).with_cell_type("i"));
        neurons.push(Neuron::new(format!("{}R", class), class).with_cell_type("m"));
    }
    let ws = Workspace::new("bench", "bench").load_neurons(neurons);
    let ids: Vec<String> = ws.available_neurons.keys().cloned().collect();
    let active: Vec<String> = (0..classes).step_by(3).map(|i| format!("C{}", i)).collect();
    let ws = ws.with_active(active);

    let connections = (0..classes * density)
        .map(|_| {
            let pre = &ids[fastrand::usize(..ids.len())];
            let post = &ids[fastrand::usize(..ids.len())];
            Connection::new(pre.clone(), post.clone(), ConnectionType::Chemical)
                .with_synapses("witvliet_2020_8", fastrand::u32(1..20))
        })
        .collect();
    (ws, connections)
}

fn bench_full_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_empty_surface");
    for classes in [50usize, 150, 300] {
        let (ws, connections) = create_test_dataset(classes, 8);
        let reconciler = GraphReconciler::default();
        group.bench_with_input(BenchmarkId::from_parameter(classes), &classes, |b, _| {
            b.iter(|| black_box(reconciler.reconcile(&ReconcileInput::new(&ws, &connections))))
        });
    }
    group.finish();
}

fn bench_noop_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile_settled_surface");
    for classes in [50usize, 150, 300] {
        let (ws, connections) = create_test_dataset(classes, 8);
        let reconciler = GraphReconciler::default();
        let mut surface = RenderedGraph::new();
        reconciler.sync_surface(&mut surface, &ReconcileInput::new(&ws, &connections));
        let nodes = surface.node_ids();
        let edges = surface.edge_ids();

        group.bench_with_input(BenchmarkId::from_parameter(classes), &classes, |b, _| {
            b.iter(|| {
                let input = ReconcileInput::new(&ws, &connections).with_current(&nodes, &edges);
                black_box(reconciler.reconcile(&input))
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_full_reconcile, bench_noop_reconcile);
criterion_main!(benches);
