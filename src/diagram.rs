use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::{
    assets::AssetResolver,
    errors::FamGraphError,
    loader::NodeSet,
    model::Person,
    render::{GraphvizEngine, LayoutEngine, OutputFormat},
};

pub const NODE_SHAPE: &str = "plaintext";
const DIAGRAM_COMMENT: &str = "Family Tree";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagramNode {
    pub id: i64,
    /// `None` when neither the portrait nor the placeholder is available.
    pub image: Option<PathBuf>,
    pub name: String,
    pub date_range: String,
    pub shape: &'static str,
}

impl DiagramNode {
    /// Graphviz HTML-like label: portrait, bold name, italic date range.
    pub fn label(&self) -> String {
        let mut label = String::from("<<TABLE CELLSPACING=\"2\" CELLPADDING=\"2\" BORDER=\"0\">");
        if let Some(image) = &self.image {
            let _ = write!(
                label,
                "<TR><TD><IMG SRC=\"{}\"/></TD></TR>",
                escape_html(&image.to_string_lossy())
            );
        }
        let _ = write!(
            label,
            "<TR><TD><B>{}</B></TD></TR><TR><TD><I>{}</I></TD></TR></TABLE>>",
            escape_html(&self.name),
            escape_html(&self.date_range),
        );
        label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiagramEdge {
    pub parent_id: i64,
    pub child_id: i64,
}

/// Format-agnostic node/edge description handed to the layout engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagram {
    pub nodes: Vec<DiagramNode>,
    pub edges: Vec<DiagramEdge>,
    #[serde(skip)]
    order: Vec<Statement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Statement {
    Node(usize),
    Edge(usize),
}

impl Diagram {
    pub fn push_node(&mut self, node: DiagramNode) {
        self.order.push(Statement::Node(self.nodes.len()));
        self.nodes.push(node);
    }

    pub fn push_edge(&mut self, edge: DiagramEdge) {
        self.order.push(Statement::Edge(self.edges.len()));
        self.edges.push(edge);
    }

    /// Deterministic DOT text with node and edge statements interleaved
    /// exactly as they were pushed.
    pub fn to_dot(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "// {DIAGRAM_COMMENT}");
        out.push_str("digraph {\n");
        for statement in &self.order {
            match *statement {
                Statement::Node(idx) => {
                    let node = &self.nodes[idx];
                    let _ = writeln!(
                        out,
                        "\t{} [label={} shape={}]",
                        node.id,
                        node.label(),
                        node.shape
                    );
                }
                Statement::Edge(idx) => {
                    let edge = &self.edges[idx];
                    let _ = writeln!(out, "\t{} -> {}", edge.parent_id, edge.child_id);
                }
            }
        }
        out.push_str("}\n");
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderState {
    Building,
    Rendered(PathBuf),
}

pub struct DiagramBuilder {
    assets: AssetResolver,
    engine: Box<dyn LayoutEngine>,
    diagram: Diagram,
    state: BuilderState,
}

impl DiagramBuilder {
    pub fn new(assets: AssetResolver) -> Self {
        Self::with_engine(assets, Box::new(GraphvizEngine::default()))
    }

    pub fn with_engine(assets: AssetResolver, engine: Box<dyn LayoutEngine>) -> Self {
        Self {
            assets,
            engine,
            diagram: Diagram::default(),
            state: BuilderState::Building,
        }
    }

    /// Emits every node in loader order, each followed by its outgoing edges
    /// in child-list order.
    pub fn compile(&mut self, graph: &NodeSet) -> Result<(), FamGraphError> {
        let nodes = graph.nodes();
        for node in nodes {
            self.add_node(&node.person)?;
            for &child in &node.children {
                self.add_edge(&node.person, &nodes[child].person)?;
            }
        }
        Ok(())
    }

    pub fn add_node(&mut self, person: &Person) -> Result<(), FamGraphError> {
        self.ensure_building("add_node")?;
        let image = self.assets.resolve(person.image_path.as_deref());
        self.diagram.push_node(DiagramNode {
            id: person.id,
            image,
            name: person.name.clone(),
            date_range: format_date_range(person.birth_date, person.death_date),
            shape: NODE_SHAPE,
        });
        Ok(())
    }

    /// Parallel edges are kept; one call per relation row.
    pub fn add_edge(&mut self, parent: &Person, child: &Person) -> Result<(), FamGraphError> {
        self.ensure_building("add_edge")?;
        self.diagram.push_edge(DiagramEdge {
            parent_id: parent.id,
            child_id: child.id,
        });
        Ok(())
    }

    pub fn diagram(&self) -> &Diagram {
        &self.diagram
    }

    pub fn state(&self) -> &BuilderState {
        &self.state
    }

    pub fn to_dot(&self) -> String {
        self.diagram.to_dot()
    }

    /// Hands the description to the layout engine. The builder is terminal
    /// afterwards; further calls fail with `IllegalState`.
    pub fn render(
        &mut self,
        destination: &Path,
        format: OutputFormat,
    ) -> Result<PathBuf, FamGraphError> {
        self.ensure_building("render")?;
        let output = self.engine.layout(&self.to_dot(), destination, format)?;
        info!(
            nodes = self.diagram.nodes.len(),
            edges = self.diagram.edges.len(),
            output = %output.display(),
            "family tree rendered"
        );
        self.state = BuilderState::Rendered(output.clone());
        Ok(output)
    }

    pub fn into_diagram(self) -> Diagram {
        self.diagram
    }

    fn ensure_building(&self, operation: &str) -> Result<(), FamGraphError> {
        match &self.state {
            BuilderState::Building => Ok(()),
            BuilderState::Rendered(path) => Err(FamGraphError::illegal_state(format!(
                "{operation} called after the diagram was rendered to {}",
                path.display()
            ))),
        }
    }
}

/// `"1950 - 2000"`, or `"1980 - Present"` for a living person.
pub fn format_date_range(birth_date: NaiveDate, death_date: Option<NaiveDate>) -> String {
    match death_date {
        Some(death) => format!("{} - {}", birth_date.year(), death.year()),
        None => format!("{} - Present", birth_date.year()),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            other => escaped.push(other),
        }
    }
    escaped
}
