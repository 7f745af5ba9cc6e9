//! End-to-end scenarios over discovery -> extraction -> graph -> PageRank,
//! seeded from spec.md §8's end-to-end scenario list.

use std::collections::HashMap;

use claudemem_core::{
    compute_pagerank, detect_changes, AstExtractor, CodeParser, PageRankConfig, SourceDiscovery,
    SupportedLanguage, SymbolGraph, UnitType,
};
use tempfile::TempDir;

fn extract_file(path: &std::path::Path, root: &std::path::Path) -> Vec<claudemem_core::CodeUnit> {
    let source = std::fs::read_to_string(path).unwrap();
    let language = SupportedLanguage::from_path(path).unwrap();
    let relative_path = path
        .strip_prefix(root)
        .unwrap()
        .to_string_lossy()
        .to_string();
    let descriptor = claudemem_core::FileDescriptor {
        path: path.to_path_buf(),
        relative_path,
        language,
        byte_len: source.len() as u64,
        content_hash: claudemem_core::content_hash(source.as_bytes()),
    };
    let mut parser = CodeParser::new(language).unwrap();
    let tree = parser.parse(&source).ok();
    AstExtractor::extract(&descriptor, &source, tree.as_ref())
}

#[test]
fn hierarchy_scenario_class_with_nested_method() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("user.py");
    std::fs::write(
        &file,
        "class User:\n    def validate(self, token):\n        def helper():\n            return True\n        return helper()\n",
    )
    .unwrap();

    let units = extract_file(&file, temp.path());

    let file_unit = units.iter().find(|u| u.unit_type == UnitType::File).unwrap();
    let class_unit = units
        .iter()
        .find(|u| u.name.as_deref() == Some("User"))
        .unwrap();
    let method_unit = units
        .iter()
        .find(|u| u.name.as_deref() == Some("validate"))
        .unwrap();

    assert_eq!(class_unit.parent_id.as_deref(), Some(file_unit.id.as_str()));
    assert_eq!(method_unit.parent_id.as_deref(), Some(class_unit.id.as_str()));
    assert_eq!(method_unit.unit_type, UnitType::Method);
}

#[test]
fn context_aware_go_interface_vs_struct() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("io.go");
    std::fs::write(
        &file,
        "package main\n\ntype Reader interface {\n\tRead() int\n}\n\ntype Buffer struct {\n\tdata []byte\n}\n",
    )
    .unwrap();

    let units = extract_file(&file, temp.path());

    let reader = units.iter().find(|u| u.name.as_deref() == Some("Reader")).unwrap();
    let buffer = units.iter().find(|u| u.name.as_deref() == Some("Buffer")).unwrap();
    assert_eq!(reader.unit_type, UnitType::Interface);
    assert_eq!(buffer.unit_type, UnitType::Class);
}

#[test]
fn empty_project_indexes_to_empty_store() {
    let temp = TempDir::new().unwrap();
    let files = SourceDiscovery::default().discover(temp.path()).unwrap();
    assert!(files.is_empty());
}

#[test]
fn change_detection_reindexes_only_the_changed_file() {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("a.py"), "def a():\n    pass\n").unwrap();
    std::fs::write(temp.path().join("b.py"), "def b():\n    pass\n").unwrap();

    let discovery = SourceDiscovery::default();
    let first = discovery.discover(temp.path()).unwrap();
    let previous: HashMap<String, String> = first
        .iter()
        .map(|f| (f.relative_path.clone(), f.content_hash.clone()))
        .collect();

    std::fs::write(temp.path().join("a.py"), "def a():\n    return 1\n").unwrap();
    let second = discovery.discover(temp.path()).unwrap();

    let changes = detect_changes(&previous, &second);
    assert_eq!(changes.modified, vec!["a.py".to_string()]);
    assert!(changes.added.is_empty());
    assert!(changes.deleted.is_empty());
}

#[test]
fn graph_closure_every_edge_endpoint_exists() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("m.py");
    std::fs::write(
        &file,
        "def callee():\n    return 1\n\ndef caller():\n    return callee()\n",
    )
    .unwrap();

    let units = extract_file(&file, temp.path());
    let graph = SymbolGraph::build(&units);

    for edge in graph.edges() {
        assert!(graph.contains(&edge.source));
        assert!(graph.contains(&edge.target));
    }
}

#[test]
fn pagerank_converges_and_normalizes_on_a_small_cycle() {
    let mut adjacency = HashMap::new();
    adjacency.insert("a".to_string(), vec!["b".to_string()]);
    adjacency.insert("b".to_string(), vec!["c".to_string()]);
    adjacency.insert("c".to_string(), vec!["a".to_string()]);

    let scores = compute_pagerank(&adjacency, &PageRankConfig::default(), None);
    let sum: f64 = scores.values().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    assert!(scores.values().all(|&s| s >= 0.0));
}
