use vfxgraph::{GraphDoc, ReductionConfig, ReductionOptions};

#[test]
fn json_fixtures_validate() {
    for s in [
        include_str!("data/simple_graph.json"),
        include_str!("data/gpu_graph.json"),
        include_str!("data/spawn_graph.json"),
    ] {
        let doc: GraphDoc = serde_json::from_str(s).unwrap();
        doc.validate().unwrap();
        let built = doc.build().unwrap();
        assert_eq!(built.graph.len(), doc.nodes.len());
        assert_eq!(built.roots.len(), doc.roots.len());
    }
}

#[test]
fn spawn_config_validates() {
    let s = include_str!("data/spawn_config.json");
    let cfg: ReductionConfig = serde_json::from_str(s).unwrap();
    cfg.validate().unwrap();
    assert!(cfg.options.contains(ReductionOptions::PATCH_READ_TO_EVENT_ATTRIBUTE));
    assert_eq!(cfg.event_attributes.as_ref().map(Vec::len), Some(2));
}

#[test]
fn graph_doc_survives_serialization() {
    let s = include_str!("data/gpu_graph.json");
    let doc: GraphDoc = serde_json::from_str(s).unwrap();
    let again: GraphDoc = serde_json::from_str(&serde_json::to_string(&doc).unwrap()).unwrap();
    assert_eq!(doc, again);
}
