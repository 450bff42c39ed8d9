//! Tree writers.
//!
//! Entries of a trace are buffered into an [`EntryForest`], which records one
//! [`TraversalTask`] per begin in discovery order. When the trace ends the
//! forest is walked depth first and each node is handed to a
//! [`TreeRenderer`]. A node is closed only after all of its descendants.

use super::escape::escape_xml;
use super::TraceWriter;
use crate::entries::{BeginEntry, EndEntry};
use log::{debug, warn};
use std::io::{self, Write};

const XML_PROLOGUE: &str = "<?xml version=\"1.0\" standalone=\"yes\"?>\n";

const GRAPHML_PROLOGUE: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\"",
    " xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"",
    " xsi:schemaLocation=\"http://graphml.graphdrawing.org/xmlns",
    " http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd\">\n",
    "<key id=\"d0\" for=\"node\" attr.name=\"Kind\" attr.type=\"string\"/>\n",
    "<key id=\"d1\" for=\"node\" attr.name=\"Name\" attr.type=\"string\"/>\n",
    "<key id=\"d2\" for=\"node\" attr.name=\"Location\" attr.type=\"string\"/>\n",
    "<key id=\"d3\" for=\"node\" attr.name=\"Time\" attr.type=\"double\">\n",
    "<default>0.0</default>\n",
    "</key>\n",
    "<key id=\"d4\" for=\"node\" attr.name=\"Memory\" attr.type=\"long\">\n",
    "<default>0</default>\n",
    "</key>\n",
    "<key id=\"d5\" for=\"node\" attr.name=\"TemplateOrigin\" attr.type=\"string\"/>\n",
);

/// One reconstructed node
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalTask {
    pub begin: BeginEntry,

    /// `None` when the trace ended before this node was closed
    pub end: Option<EndEntry>,

    /// Unique, increasing in discovery order
    pub node_id: usize,

    /// Forest length when the node closed; every task at a lower index
    /// that is not an ancestor lies inside this node's subtree
    pub end_index: Option<usize>,

    pub parent_id: Option<usize>,
}

impl TraversalTask {
    /// Time spent in this node, 0 if it never closed
    pub fn duration(&self) -> f64 {
        self.end
            .map_or(0.0, |end| end.timestamp - self.begin.timestamp)
    }

    /// Memory growth over this node, 0 if it never closed or shrank
    pub fn memory_delta(&self) -> u64 {
        self.end
            .map_or(0, |end| end.memory_usage.saturating_sub(self.begin.memory_usage))
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// Depth-first reconstruction of a flat begin/end sequence
#[derive(Debug, Default)]
pub struct EntryForest {
    tasks: Vec<TraversalTask>,
    first_node_id: usize,
    open: Option<usize>,
    unmatched_ends: usize,
}

impl EntryForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forest whose node ids start at `first_node_id`
    pub fn starting_at(first_node_id: usize) -> Self {
        Self {
            first_node_id,
            ..Self::default()
        }
    }

    /// Open a node under the currently open one
    pub fn push_begin(&mut self, begin: BeginEntry) {
        let node_id = self.first_node_id + self.tasks.len();
        let parent_id = self.open.map(|index| self.tasks[index].node_id);
        self.tasks.push(TraversalTask {
            begin,
            end: None,
            node_id,
            end_index: None,
            parent_id,
        });
        self.open = Some(self.tasks.len() - 1);
    }

    /// Close the currently open node. An end with nothing open is counted
    /// and dropped; returns whether it was accepted.
    pub fn push_end(&mut self, end: EndEntry) -> bool {
        let Some(index) = self.open else {
            self.unmatched_ends += 1;
            return false;
        };
        let len = self.tasks.len();
        let first = self.first_node_id;
        let task = &mut self.tasks[index];
        task.end = Some(end);
        task.end_index = Some(len);
        self.open = task.parent_id.map(|id| id - first);
        true
    }

    pub fn tasks(&self) -> &[TraversalTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Node id the next forest should start at to keep ids unique
    pub fn next_node_id(&self) -> usize {
        self.first_node_id + self.tasks.len()
    }

    pub fn unmatched_ends(&self) -> usize {
        self.unmatched_ends
    }

    /// Nodes left open when the input ran out
    pub fn unclosed(&self) -> usize {
        self.tasks.iter().filter(|t| t.end.is_none()).count()
    }

    pub fn roots(&self) -> impl Iterator<Item = &TraversalTask> {
        self.tasks.iter().filter(|t| t.is_root())
    }

    /// Direct children of `node_id`, in discovery order
    pub fn children(&self, node_id: usize) -> impl Iterator<Item = &TraversalTask> {
        self.tasks
            .iter()
            .filter(move |t| t.parent_id == Some(node_id))
    }

    /// Depth of every task (roots are depth 1), indexed like `tasks()`
    pub fn depths(&self) -> Vec<usize> {
        let mut depths: Vec<usize> = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let depth = task
                .parent_id
                .map_or(1, |id| depths[id - self.first_node_id] + 1);
            depths.push(depth);
        }
        depths
    }

    /// Walk the forest depth first, opening nodes in discovery order and
    /// closing each after its subtree
    pub fn render<R: TreeRenderer + ?Sized>(&self, renderer: &mut R) -> io::Result<()> {
        let mut open_set: Vec<usize> = Vec::new();
        for (i, task) in self.tasks.iter().enumerate() {
            while let Some(&top) = open_set.last() {
                if i < self.tasks[top].end_index.unwrap_or(usize::MAX) {
                    break;
                }
                renderer.close_node(&self.tasks[top])?;
                open_set.pop();
            }
            renderer.open_node(task)?;
            open_set.push(i);
        }
        while let Some(top) = open_set.pop() {
            renderer.close_node(&self.tasks[top])?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.first_node_id = self.next_node_id();
        self.tasks.clear();
        self.open = None;
        self.unmatched_ends = 0;
    }
}

/// Format-specific rendering of a reconstructed forest
pub trait TreeRenderer {
    /// Written once, before the first tree
    fn begin_document(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Written once, after the last tree
    fn end_document(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn begin_tree(&mut self, source_name: Option<&str>) -> io::Result<()>;
    fn end_tree(&mut self) -> io::Result<()>;
    fn open_node(&mut self, task: &TraversalTask) -> io::Result<()>;

    fn close_node(&mut self, _task: &TraversalTask) -> io::Result<()> {
        Ok(())
    }
}

/// Buffers each trace into a forest and renders it on `end_trace`
pub struct TreeWriter<R: TreeRenderer> {
    renderer: R,
    forest: EntryForest,
    started: bool,
}

impl<R: TreeRenderer> TreeWriter<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            forest: EntryForest::new(),
            started: false,
        }
    }

    pub fn forest(&self) -> &EntryForest {
        &self.forest
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

impl<R: TreeRenderer> TraceWriter for TreeWriter<R> {
    fn begin_trace(&mut self, source_name: Option<&str>) -> io::Result<()> {
        if !self.started {
            self.started = true;
            self.renderer.begin_document()?;
        }
        self.forest.clear();
        self.renderer.begin_tree(source_name)
    }

    fn end_trace(&mut self) -> io::Result<()> {
        if self.forest.unmatched_ends() > 0 {
            warn!(
                "Dropped {} end entries with no open begin",
                self.forest.unmatched_ends()
            );
        }
        debug!(
            "Rendering forest of {} nodes ({} unclosed)",
            self.forest.len(),
            self.forest.unclosed()
        );
        self.forest.render(&mut self.renderer)?;
        self.renderer.end_tree()
    }

    fn write_begin(&mut self, entry: &BeginEntry) -> io::Result<()> {
        self.forest.push_begin(entry.clone());
        Ok(())
    }

    fn write_end(&mut self, entry: &EndEntry) -> io::Result<()> {
        self.forest.push_end(*entry);
        Ok(())
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.started {
            self.renderer.end_document()?;
        }
        Ok(())
    }
}

/// GraphML graph, one `<node>` per entry and an `<edge>` to each child
pub struct GraphMlRenderer<W: Write> {
    out: W,
    next_edge_id: usize,
}

impl<W: Write> GraphMlRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            next_edge_id: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TreeRenderer for GraphMlRenderer<W> {
    fn begin_document(&mut self) -> io::Result<()> {
        self.out.write_all(GRAPHML_PROLOGUE.as_bytes())
    }

    fn end_document(&mut self) -> io::Result<()> {
        self.out.write_all(b"</graphml>\n")?;
        self.out.flush()
    }

    fn begin_tree(&mut self, _source_name: Option<&str>) -> io::Result<()> {
        self.out.write_all(b"<graph>\n")
    }

    fn end_tree(&mut self) -> io::Result<()> {
        self.out.write_all(b"</graph>\n")?;
        self.out.flush()
    }

    fn open_node(&mut self, task: &TraversalTask) -> io::Result<()> {
        let begin = &task.begin;
        writeln!(self.out, "<node id=\"n{}\">", task.node_id)?;
        write!(
            self.out,
            "  <data key=\"d0\">{}</data>\n  <data key=\"d1\">\"{}\"</data>\n  <data key=\"d2\">\"{}\"</data>\n",
            begin.kind,
            escape_xml(&begin.name),
            escape_xml(&begin.location.to_string())
        )?;
        write!(
            self.out,
            "  <data key=\"d3\">{:.9}</data>\n  <data key=\"d4\">{}</data>\n",
            task.duration(),
            task.memory_delta()
        )?;
        if let Some(origin) = &begin.origin {
            writeln!(
                self.out,
                "  <data key=\"d5\">\"{}\"</data>",
                escape_xml(&origin.to_string())
            )?;
        }
        self.out.write_all(b"</node>\n")?;

        if let Some(parent_id) = task.parent_id {
            writeln!(
                self.out,
                "<edge id=\"e{}\" source=\"n{}\" target=\"n{}\"/>",
                self.next_edge_id, parent_id, task.node_id
            )?;
            self.next_edge_id += 1;
        }
        Ok(())
    }
}

/// Graphviz `digraph` with a labelled node per entry
pub struct GraphvizRenderer<W: Write> {
    out: W,
}

impl<W: Write> GraphvizRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TreeRenderer for GraphvizRenderer<W> {
    fn begin_tree(&mut self, _source_name: Option<&str>) -> io::Result<()> {
        self.out.write_all(b"digraph Trace {\n")
    }

    fn end_tree(&mut self) -> io::Result<()> {
        self.out.write_all(b"}\n")?;
        self.out.flush()
    }

    fn open_node(&mut self, task: &TraversalTask) -> io::Result<()> {
        let begin = &task.begin;
        // Label line breaks are the two characters `\n`, interpreted by dot.
        write!(
            self.out,
            "n{} [label = \"{}\\n{}\\nAt {} Line {} Column {}\\n",
            task.node_id,
            begin.kind,
            escape_xml(&begin.name),
            escape_xml(&begin.location.file),
            begin.location.line,
            begin.location.column
        )?;
        if let Some(origin) = &begin.origin {
            write!(
                self.out,
                "From {} Line {} Column {}\\n",
                escape_xml(&origin.file),
                origin.line,
                origin.column
            )?;
        }
        writeln!(
            self.out,
            "Time: {:.9} seconds Memory: {} bytes\" ];",
            task.duration(),
            task.memory_delta()
        )?;

        if let Some(parent_id) = task.parent_id {
            writeln!(self.out, "n{} -> n{};", parent_id, task.node_id)?;
        }
        Ok(())
    }
}

/// XML with `<Entry>` elements nested like the instantiation tree, one
/// `<Trace>` per trace under a `<Traces>` root
pub struct NestedXmlRenderer<W: Write> {
    out: W,
}

impl<W: Write> NestedXmlRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TreeRenderer for NestedXmlRenderer<W> {
    fn begin_document(&mut self) -> io::Result<()> {
        self.out.write_all(XML_PROLOGUE.as_bytes())?;
        self.out.write_all(b"<Traces>\n")
    }

    fn end_document(&mut self) -> io::Result<()> {
        self.out.write_all(b"</Traces>\n")?;
        self.out.flush()
    }

    fn begin_tree(&mut self, _source_name: Option<&str>) -> io::Result<()> {
        self.out.write_all(b"<Trace>\n")
    }

    fn end_tree(&mut self) -> io::Result<()> {
        self.out.write_all(b"</Trace>\n")?;
        self.out.flush()
    }

    fn open_node(&mut self, task: &TraversalTask) -> io::Result<()> {
        let begin = &task.begin;
        write!(
            self.out,
            "<Entry Kind=\"{}\" Name=\"{}\" Location=\"{}\" ",
            begin.kind,
            escape_xml(&begin.name),
            escape_xml(&begin.location.to_string())
        )?;
        if let Some(origin) = &begin.origin {
            write!(
                self.out,
                "TemplateOrigin=\"{}\" ",
                escape_xml(&origin.to_string())
            )?;
        }
        writeln!(
            self.out,
            "Time=\"{:.9}\" Memory=\"{}\">",
            task.duration(),
            task.memory_delta()
        )
    }

    fn close_node(&mut self, _task: &TraversalTask) -> io::Result<()> {
        self.out.write_all(b"</Entry>\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entries::{EntryKind, SourceLocation};
    use pretty_assertions::assert_eq;

    fn begin(name: &str, timestamp: f64) -> BeginEntry {
        BeginEntry::new(
            EntryKind::TemplateInstantiation,
            name,
            SourceLocation::new("t.cpp", 1, 1),
        )
        .with_timestamp(timestamp)
    }

    fn sample_forest() -> EntryForest {
        // A(B, C)
        let mut forest = EntryForest::new();
        forest.push_begin(begin("A", 0.0));
        forest.push_begin(begin("B", 0.1));
        forest.push_end(EndEntry::new(0.2, 0));
        forest.push_begin(begin("C", 0.3));
        forest.push_end(EndEntry::new(0.4, 0));
        forest.push_end(EndEntry::new(0.5, 0));
        forest
    }

    /// Records open/close calls as a compact string
    #[derive(Default)]
    struct Recorder(String);

    impl TreeRenderer for Recorder {
        fn begin_tree(&mut self, _source_name: Option<&str>) -> io::Result<()> {
            Ok(())
        }

        fn end_tree(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn open_node(&mut self, task: &TraversalTask) -> io::Result<()> {
            self.0.push_str(&task.begin.name);
            self.0.push('(');
            Ok(())
        }

        fn close_node(&mut self, _task: &TraversalTask) -> io::Result<()> {
            self.0.push(')');
            Ok(())
        }
    }

    #[test]
    fn test_forest_reconstruction() {
        let forest = sample_forest();
        let tasks = forest.tasks();
        assert_eq!(tasks.len(), 3);
        assert_eq!(forest.roots().count(), 1);
        assert_eq!(tasks[0].parent_id, None);
        assert_eq!(tasks[1].parent_id, Some(0));
        assert_eq!(tasks[2].parent_id, Some(0));
        assert_eq!(tasks[0].end_index, Some(3));
        assert_eq!(tasks[1].end_index, Some(2));

        let children: Vec<&str> = forest.children(0).map(|t| t.begin.name.as_str()).collect();
        assert_eq!(children, vec!["B", "C"]);
        assert_eq!(forest.depths(), vec![1, 2, 2]);
    }

    #[test]
    fn test_render_nesting() {
        let mut recorder = Recorder::default();
        sample_forest().render(&mut recorder).unwrap();
        assert_eq!(recorder.0, "A(B()C())");
    }

    #[test]
    fn test_unclosed_nodes_close_at_end() {
        let mut forest = EntryForest::new();
        forest.push_begin(begin("A", 0.0));
        forest.push_begin(begin("B", 0.1));
        assert_eq!(forest.unclosed(), 2);

        let mut recorder = Recorder::default();
        forest.render(&mut recorder).unwrap();
        assert_eq!(recorder.0, "A(B())");
        assert_eq!(forest.tasks()[0].duration(), 0.0);
    }

    #[test]
    fn test_unmatched_end_is_dropped() {
        let mut forest = EntryForest::new();
        assert!(!forest.push_end(EndEntry::new(1.0, 0)));
        forest.push_begin(begin("A", 0.0));
        assert!(forest.push_end(EndEntry::new(1.0, 0)));
        assert!(!forest.push_end(EndEntry::new(2.0, 0)));
        assert_eq!(forest.unmatched_ends(), 2);
        assert_eq!(forest.roots().count(), 1);
    }

    #[test]
    fn test_memory_delta_saturates() {
        let mut forest = EntryForest::new();
        forest.push_begin(begin("A", 0.0).with_memory_usage(100));
        forest.push_end(EndEntry::new(1.0, 40));
        assert_eq!(forest.tasks()[0].memory_delta(), 0);
    }

    #[test]
    fn test_node_ids_continue_after_clear() {
        let mut forest = sample_forest();
        forest.clear();
        forest.push_begin(begin("D", 0.0));
        assert_eq!(forest.tasks()[0].node_id, 3);
        forest.push_begin(begin("E", 0.0));
        assert_eq!(forest.tasks()[1].parent_id, Some(3));
        forest.push_end(EndEntry::new(1.0, 0));
        forest.push_end(EndEntry::new(1.0, 0));
        assert_eq!(forest.depths(), vec![1, 2]);
    }

    #[test]
    fn test_nested_xml_output() {
        let mut writer = TreeWriter::new(NestedXmlRenderer::new(Vec::new()));
        writer.begin_trace(None).unwrap();
        writer.write_begin(&begin("f<int>", 0.5)).unwrap();
        writer.write_end(&EndEntry::new(0.75, 64)).unwrap();
        writer.end_trace().unwrap();
        writer.finish().unwrap();

        let xml = String::from_utf8(writer.into_renderer().into_inner()).unwrap();
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" standalone=\"yes\"?>\n<Traces>\n<Trace>\n\
             <Entry Kind=\"TemplateInstantiation\" Name=\"f&lt;int&gt;\" Location=\"t.cpp|1|1\" Time=\"0.250000000\" Memory=\"64\">\n\
             </Entry>\n</Trace>\n</Traces>\n"
        );
    }

    #[test]
    fn test_graphviz_output() {
        let mut writer = TreeWriter::new(GraphvizRenderer::new(Vec::new()));
        writer.begin_trace(None).unwrap();
        writer.write_begin(&begin("A", 0.0)).unwrap();
        writer.write_begin(&begin("B", 0.5)).unwrap();
        writer.write_end(&EndEntry::new(0.75, 0)).unwrap();
        writer.write_end(&EndEntry::new(1.0, 0)).unwrap();
        writer.end_trace().unwrap();

        let dot = String::from_utf8(writer.into_renderer().into_inner()).unwrap();
        assert_eq!(
            dot,
            "digraph Trace {\n\
             n0 [label = \"TemplateInstantiation\\nA\\nAt t.cpp Line 1 Column 1\\nTime: 1.000000000 seconds Memory: 0 bytes\" ];\n\
             n1 [label = \"TemplateInstantiation\\nB\\nAt t.cpp Line 1 Column 1\\nTime: 0.250000000 seconds Memory: 0 bytes\" ];\n\
             n0 -> n1;\n\
             }\n"
        );
    }

    #[test]
    fn test_graphml_edges() {
        let mut writer = TreeWriter::new(GraphMlRenderer::new(Vec::new()));
        writer.begin_trace(None).unwrap();
        for entry in [begin("A", 0.0), begin("B", 0.1)] {
            writer.write_begin(&entry).unwrap();
        }
        writer.write_end(&EndEntry::new(0.2, 0)).unwrap();
        writer.write_begin(&begin("C", 0.3)).unwrap();
        writer.write_end(&EndEntry::new(0.4, 0)).unwrap();
        writer.write_end(&EndEntry::new(0.5, 0)).unwrap();
        writer.end_trace().unwrap();
        writer.finish().unwrap();

        let graphml = String::from_utf8(writer.into_renderer().into_inner()).unwrap();
        assert!(graphml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<graphml"));
        assert!(graphml.contains("<edge id=\"e0\" source=\"n0\" target=\"n1\"/>\n"));
        assert!(graphml.contains("<edge id=\"e1\" source=\"n0\" target=\"n2\"/>\n"));
        assert!(graphml.contains("  <data key=\"d1\">\"A\"</data>\n"));
        assert!(graphml.ends_with("</graph>\n</graphml>\n"));
    }
}
