use vfxgraph::{
    BufferUsage, CompileTarget, ExprFlags, ExprKind, GraphDoc, Operation, ReducedGraphReport,
    ReductionConfig, Value,
};

fn reduce(fixture: &str, config: ReductionConfig) -> ReducedGraphReport {
    let doc: GraphDoc = serde_json::from_str(fixture).unwrap();
    let mut built = doc.build().unwrap();
    let mut ctx = config.into_context().unwrap();
    for &root in &built.roots {
        ctx.register_expression(root);
    }
    ctx.compile_all(&mut built.graph).unwrap();
    ReducedGraphReport::collect(&built, &ctx).unwrap()
}

fn node<'a>(report: &'a ReducedGraphReport, root: &str) -> &'a vfxgraph::report::NodeReport {
    let reduced = report
        .roots
        .iter()
        .find(|r| r.name == root)
        .unwrap()
        .reduced;
    report.nodes.iter().find(|n| n.id == reduced).unwrap()
}

fn ops(report: &ReducedGraphReport) -> Vec<Operation> {
    report.nodes.iter().map(|n| n.expr.operation()).collect()
}

#[test]
fn reduce_report_is_deterministic() {
    let s = include_str!("data/gpu_graph.json");
    let a = reduce(s, ReductionConfig::for_target(CompileTarget::Gpu));
    let b = reduce(s, ReductionConfig::for_target(CompileTarget::Gpu));
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn simple_graph_folds_and_simplifies() {
    let report = reduce(
        include_str!("data/simple_graph.json"),
        ReductionConfig::for_target(CompileTarget::Gpu),
    );

    // (2 + 3) * 0.5 folds through the foldable variable.
    let scaled = node(&report, "scaled");
    assert_eq!(
        scaled.expr,
        ExprKind::Value {
            value: Value::Float(2.5),
            mode: vfxgraph::ValueMode::FoldableVariable,
        }
    );

    // age + 0 collapses to the attribute read.
    let out = node(&report, "out");
    assert_eq!(out.expr.operation(), Operation::Multiply);
    let wave = report.nodes.iter().find(|n| n.id == out.parents[0]).unwrap();
    assert_eq!(wave.expr.operation(), Operation::Sine);
    let age = report.nodes.iter().find(|n| n.id == wave.parents[0]).unwrap();
    assert_eq!(age.expr.operation(), Operation::ReadAttribute);
    assert!(!ops(&report).contains(&Operation::Add));
}

#[test]
fn gpu_graph_patches_resources_for_device_samplers() {
    let report = reduce(
        include_str!("data/gpu_graph.json"),
        ReductionConfig::for_target(CompileTarget::Gpu),
    );
    let ops = ops(&report);
    for expected in [
        Operation::BakeCurve,
        Operation::BakeGradient,
        Operation::VertexBufferFromMesh,
        Operation::IndexBufferFromMesh,
    ] {
        assert!(ops.contains(&expected), "missing {expected}");
    }
    assert!(!ops.contains(&Operation::BufferWithUsage));

    assert_eq!(report.buffer_usage.len(), 1);
    assert_eq!(report.buffer_usage[0].usage, BufferUsage::Structured);

    let position = node(&report, "position");
    assert!(position.flags.contains(ExprFlags::NOT_COMPILABLE_ON_CPU));
    let buffer = report
        .nodes
        .iter()
        .find(|n| n.id == position.parents[0])
        .unwrap();
    assert_eq!(buffer.expr.operation(), Operation::VertexBufferFromMesh);
}

#[test]
fn cpu_target_leaves_resources_alone() {
    let report = reduce(
        include_str!("data/gpu_graph.json"),
        ReductionConfig::for_target(CompileTarget::Cpu),
    );
    let ops = ops(&report);
    assert!(!ops.contains(&Operation::BakeCurve));
    assert!(!ops.contains(&Operation::VertexBufferFromMesh));
    // Usage markers are unwrapped under every policy.
    assert!(!ops.contains(&Operation::BufferWithUsage));
    assert_eq!(report.buffer_usage.len(), 1);
}

#[test]
fn spawn_config_redirects_current_reads() {
    let config: ReductionConfig =
        serde_json::from_str(include_str!("data/spawn_config.json")).unwrap();
    let report = reduce(include_str!("data/spawn_graph.json"), config);

    let offsets: Vec<u32> = report
        .nodes
        .iter()
        .filter_map(|n| match &n.expr {
            ExprKind::ReadEventAttribute { offset, .. } => Some(*offset),
            _ => None,
        })
        .collect();
    assert_eq!(offsets, vec![4, 7]);

    let source = node(&report, "source_color");
    assert_eq!(source.expr.operation(), Operation::ReadAttribute);
}
