use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
};

use chrono::NaiveDate;
use famgraph::{
    AssetResolver, DiagramBuilder, FamGraphError, LayoutEngine, NodeSet, OutputFormat, Person,
    PersonRecord, PlaceholderConfig, diagram::BuilderState, format_date_range,
};

fn year(y: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, 3, 1).expect("date")
}

fn person(id: i64, name: &str, birth: i32, death: Option<i32>) -> Person {
    let mut person = Person::new(name, year(birth));
    person.id = id;
    person.death_date = death.map(year);
    person
}

fn resolver(dir: &Path) -> AssetResolver {
    AssetResolver::new(PlaceholderConfig {
        directory: Some(dir.to_path_buf()),
        ..PlaceholderConfig::default()
    })
}

/// Remembers every layout request instead of running Graphviz.
#[derive(Clone, Default)]
struct RecordingEngine {
    calls: Rc<RefCell<Vec<(String, PathBuf, OutputFormat)>>>,
}

impl LayoutEngine for RecordingEngine {
    fn layout(
        &self,
        dot: &str,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, FamGraphError> {
        self.calls
            .borrow_mut()
            .push((dot.to_string(), destination.to_path_buf(), format));
        Ok(destination.to_path_buf())
    }
}

fn scenario_graph() -> NodeSet {
    NodeSet::from_records(vec![
        PersonRecord {
            person: person(1, "A", 1900, Some(1960)),
            children: vec![2, 3],
        },
        PersonRecord {
            person: person(2, "B", 1925, None),
            children: vec![],
        },
        PersonRecord {
            person: person(3, "C", 1950, None),
            children: vec![],
        },
    ])
    .expect("graph")
}

#[test]
fn test_date_range_formatting() {
    assert_eq!(format_date_range(year(1950), Some(year(2000))), "1950 - 2000");
    assert_eq!(format_date_range(year(1980), None), "1980 - Present");
}

#[test]
fn test_three_person_scenario() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut builder = DiagramBuilder::new(resolver(dir.path()));
    builder.compile(&scenario_graph()).expect("compile");
    let diagram = builder.diagram();

    assert_eq!(diagram.nodes.len(), 3);
    let edges: Vec<_> = diagram
        .edges
        .iter()
        .map(|edge| (edge.parent_id, edge.child_id))
        .collect();
    assert_eq!(edges, vec![(1, 2), (1, 3)]);
    assert!(diagram.nodes[0].date_range.ends_with("1900 - 1960"));
    assert!(diagram.nodes[1].date_range.ends_with(" - Present"));
    assert!(diagram.nodes[2].date_range.ends_with(" - Present"));
    assert!(diagram.nodes.iter().all(|node| node.shape == "plaintext"));
}

#[test]
fn test_dot_output_interleaves_edges_after_their_parent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = NodeSet::from_records(vec![
        PersonRecord {
            person: person(1, "A", 1900, Some(1960)),
            children: vec![3],
        },
        PersonRecord {
            person: person(2, "B", 1902, Some(1970)),
            children: vec![3],
        },
        PersonRecord {
            person: person(3, "C", 1930, None),
            children: vec![],
        },
    ])
    .expect("graph");
    let mut builder = DiagramBuilder::new(resolver(dir.path()));
    builder.compile(&graph).expect("compile");
    let dot = builder.to_dot();

    let statements: Vec<&str> = dot
        .lines()
        .filter(|line| line.starts_with('\t'))
        .map(|line| {
            let line = line.trim_start();
            if line.contains("->") { line } else { &line[..1] }
        })
        .collect();
    assert_eq!(statements, vec!["1", "1 -> 3", "2", "2 -> 3", "3"]);
    assert!(dot.starts_with("// Family Tree\ndigraph {\n"));
    assert!(dot.ends_with("}\n"));
    assert!(dot.contains("<I>1900 - 1960</I>"));
    assert!(dot.contains("<B>C</B>"));
}

#[test]
fn test_compilation_is_reproducible() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assets = resolver(dir.path());
    let mut first = DiagramBuilder::new(assets.clone());
    first.compile(&scenario_graph()).expect("first");
    let mut second = DiagramBuilder::new(assets);
    second.compile(&scenario_graph()).expect("second");
    assert_eq!(first.to_dot(), second.to_dot());
}

#[test]
fn test_parallel_edges_are_not_deduplicated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let parent = person(1, "P", 1900, None);
    let child = person(2, "C", 1930, None);
    let mut builder = DiagramBuilder::new(resolver(dir.path()));
    builder.add_node(&parent).expect("parent");
    builder.add_node(&child).expect("child");
    builder.add_edge(&parent, &child).expect("edge");
    builder.add_edge(&parent, &child).expect("parallel edge");
    assert_eq!(builder.diagram().edges.len(), 2);
    assert_eq!(builder.to_dot().matches("1 -> 2").count(), 2);
}

#[test]
fn test_missing_image_uses_shared_placeholder() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assets = resolver(dir.path());
    let mut builder = DiagramBuilder::new(assets.clone());
    assert!(!assets.placeholder_generated());
    builder.compile(&scenario_graph()).expect("compile");

    let placeholder = dir.path().join("placeholder.svg");
    assert!(placeholder.is_file());
    assert!(assets.placeholder_generated());
    for node in &builder.diagram().nodes {
        assert_eq!(node.image.as_deref(), Some(placeholder.as_path()));
    }
    let svg = std::fs::read_to_string(&placeholder).expect("placeholder");
    assert!(svg.contains("Empty"));
}

#[test]
fn test_placeholder_is_generated_once_per_session() {
    let dir = tempfile::tempdir().expect("tempdir");
    let assets = resolver(dir.path());
    let first = assets.placeholder_path().expect("first");
    std::fs::write(&first, "<svg/>").expect("overwrite");
    let mut builder = DiagramBuilder::new(assets.clone());
    builder
        .add_node(&person(1, "A", 1900, None))
        .expect("node");
    assert_eq!(builder.diagram().nodes[0].image.as_ref(), Some(&first));
    assert_eq!(std::fs::read_to_string(&first).expect("read"), "<svg/>");
}

#[test]
fn test_unreadable_image_falls_back_without_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let portrait = dir.path().join("portrait.png");
    std::fs::write(&portrait, b"png bytes").expect("portrait");

    let mut with_image = person(1, "A", 1900, None);
    with_image.image_path = Some(portrait.to_string_lossy().into_owned());
    let mut broken = person(2, "B", 1930, None);
    broken.image_path = Some(dir.path().join("gone.png").to_string_lossy().into_owned());
    let mut directory = person(3, "C", 1960, None);
    directory.image_path = Some(dir.path().to_string_lossy().into_owned());

    let mut builder = DiagramBuilder::new(resolver(dir.path()));
    for p in [&with_image, &broken, &directory] {
        builder.add_node(p).expect("node");
    }
    let nodes = &builder.diagram().nodes;
    assert_eq!(nodes[0].image, Some(portrait));
    assert_eq!(nodes[1].image, Some(dir.path().join("placeholder.svg")));
    assert_eq!(nodes[2].image, Some(dir.path().join("placeholder.svg")));
}

#[test]
fn test_unwritable_placeholder_directory_omits_image_row() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").expect("blocker");
    let assets = resolver(&blocker.join("sub"));

    let mut builder =
        DiagramBuilder::with_engine(assets.clone(), Box::new(RecordingEngine::default()));
    builder
        .add_node(&person(1, "A", 1900, None))
        .expect("node without portrait");
    builder
        .add_node(&person(2, "B", 1930, None))
        .expect("second node");

    assert!(!assets.placeholder_generated());
    assert!(builder.diagram().nodes.iter().all(|node| node.image.is_none()));
    let dot = builder.to_dot();
    assert!(!dot.contains("<IMG"));
    assert!(dot.contains("<B>A</B>") && dot.contains("<B>B</B>"));
}

#[test]
fn test_names_are_escaped_in_labels() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut builder = DiagramBuilder::new(resolver(dir.path()));
    builder
        .add_node(&person(1, "Tom <\"Junior\"> & Co", 1990, None))
        .expect("node");
    let label = builder.diagram().nodes[0].label();
    assert!(label.contains("<B>Tom &lt;&quot;Junior&quot;&gt; &amp; Co</B>"));
}

#[test]
fn test_render_hands_dot_to_engine_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = RecordingEngine::default();
    let calls = engine.calls.clone();
    let mut builder = DiagramBuilder::with_engine(resolver(dir.path()), Box::new(engine));
    builder.compile(&scenario_graph()).expect("compile");
    let expected_dot = builder.to_dot();

    let destination = dir.path().join("out").join("tree.png");
    let output = builder
        .render(&destination, OutputFormat::Png)
        .expect("render");
    assert_eq!(output, destination);
    assert_eq!(builder.state(), &BuilderState::Rendered(destination.clone()));

    let calls = calls.borrow();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, expected_dot);
    assert_eq!(calls[0].2, OutputFormat::Png);
}

#[test]
fn test_mutation_after_render_is_illegal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut builder =
        DiagramBuilder::with_engine(resolver(dir.path()), Box::new(RecordingEngine::default()));
    let a = person(1, "A", 1900, None);
    builder.add_node(&a).expect("node");
    builder
        .render(&dir.path().join("tree.pdf"), OutputFormat::Pdf)
        .expect("render");

    assert!(matches!(
        builder.add_node(&person(2, "B", 1930, None)),
        Err(FamGraphError::IllegalState(_))
    ));
    assert!(matches!(
        builder.add_edge(&a, &a),
        Err(FamGraphError::IllegalState(_))
    ));
    assert!(matches!(
        builder.render(&dir.path().join("again.pdf"), OutputFormat::Pdf),
        Err(FamGraphError::IllegalState(_))
    ));
    assert_eq!(builder.diagram().nodes.len(), 1);
}

#[test]
fn test_people_without_relations_compile_to_nodes_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let graph = NodeSet::from_records(
        (1..=4)
            .map(|id| PersonRecord {
                person: person(id, &format!("p{id}"), 1900, None),
                children: vec![],
            })
            .collect(),
    )
    .expect("graph");
    let mut builder = DiagramBuilder::new(resolver(dir.path()));
    builder.compile(&graph).expect("compile");
    assert_eq!(builder.diagram().nodes.len(), 4);
    assert!(builder.diagram().edges.is_empty());
    assert!(!builder.to_dot().contains("->"));
}
