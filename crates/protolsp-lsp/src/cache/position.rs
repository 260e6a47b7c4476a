use protolsp_ast::{walk, FileNode, Node, SourcePos, SourceSpan, Visitor};
use tower_lsp::lsp_types::{Position, Range};

/// AST positions are 1-based, LSP positions 0-based. Both coordinates
/// are decremented together, and only when both are set.
pub fn lsp_position(pos: SourcePos) -> Position {
    let (mut line, mut col) = (pos.line, pos.col);
    if line > 0 && col > 0 {
        line -= 1;
        col -= 1;
    }
    Position {
        line: line as u32,
        character: col as u32,
    }
}

pub fn lsp_range(span: SourceSpan) -> Range {
    Range {
        start: lsp_position(span.start),
        end: lsp_position(span.end),
    }
}

fn one_based(pos: Position) -> (usize, usize) {
    (pos.line as usize + 1, pos.character as usize + 1)
}

/// A node contains the position when the position's line falls in the
/// node's line range; single-line nodes additionally check the column,
/// both bounds inclusive.
pub fn position_within(span: SourceSpan, pos: Position) -> bool {
    let (line, character) = one_based(pos);
    let (start, end) = (span.start, span.end);
    if start.line == end.line && start.line == line {
        start.col <= character && end.col >= character
    } else {
        start.line <= line && end.line >= line
    }
}

/// How tightly a node wraps the position: the line span for multi-line
/// nodes (column `-1`), the column span for single-line nodes (line
/// `0`). `(-1, -1)` when the position is outside the node.
pub fn position_node_len(span: SourceSpan, pos: Position) -> (i64, i64) {
    if !position_within(span, pos) {
        return (-1, -1);
    }
    let (line, character) = one_based(pos);
    let (start, end) = (span.start, span.end);
    if start.line == end.line {
        let collen = (character as i64 - start.col as i64) + (end.col as i64 - character as i64);
        (0, collen)
    } else {
        let linelen = (line as i64 - start.line as i64) + (end.line as i64 - line as i64);
        (linelen, -1)
    }
}

struct NodesAt<'a> {
    pos: Position,
    nodes: Vec<Node<'a>>,
}

impl<'a> Visitor<'a> for NodesAt<'a> {
    fn visit_node(&mut self, node: Node<'a>) {
        if position_within(node.span(), self.pos) {
            self.nodes.push(node);
        }
    }
}

/// All nodes containing `pos`, in visit order (parents first).
pub fn nodes_at(file: &FileNode, pos: Position) -> Vec<Node<'_>> {
    let mut visitor = NodesAt {
        pos,
        nodes: Vec::new(),
    };
    walk(file, &mut visitor);
    visitor.nodes
}

/// The node wrapping `pos` most tightly: smallest line span first, then
/// smallest column span; earlier visit order breaks remaining ties.
pub fn nearest(file: &FileNode, pos: Position) -> Option<Node<'_>> {
    let mut best: Option<Node<'_>> = None;
    let (mut best_line, mut best_col) = (-1i64, -1i64);

    for node in nodes_at(file, pos) {
        let (linelen, collen) = position_node_len(node.span(), pos);
        if linelen < 0 && collen < 0 {
            continue;
        }
        let assign = match best {
            None => true,
            Some(_) => {
                if linelen > best_line {
                    false
                } else if linelen < best_line {
                    true
                } else {
                    collen >= 0 && collen < best_col
                }
            }
        };
        if assign {
            best = Some(node);
            best_line = linelen;
            best_col = collen;
        }
    }
    best
}

/// Node kind names, for logging.
pub fn type_names(nodes: &[Node<'_>]) -> Vec<&'static str> {
    nodes.iter().map(|n| n.type_name()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use protolsp_parser::{parse, Handler, NoopReporter};

    fn parsed(source: &str) -> FileNode {
        let reporter = NoopReporter;
        let handler = Handler::new(&reporter);
        parse("test.proto", source, &handler)
    }

    fn at(line: u32, character: u32) -> Position {
        Position { line, character }
    }

    // ── conversions ──────────────────────────────────────────────

    #[test]
    fn converts_one_based_to_zero_based() {
        let pos = lsp_position(SourcePos::new(3, 5, 40));
        assert_eq!((pos.line, pos.character), (2, 4));
    }

    #[test]
    fn zeroed_coordinates_stay_put() {
        let pos = lsp_position(SourcePos::new(0, 0, 0));
        assert_eq!((pos.line, pos.character), (0, 0));
    }

    // ── containment ──────────────────────────────────────────────

    #[test]
    fn single_line_node_checks_column() {
        let span = SourceSpan::new(SourcePos::new(1, 5, 4), SourcePos::new(1, 10, 9));
        assert!(position_within(span, at(0, 6)));
        assert!(!position_within(span, at(0, 1)));
        assert!(!position_within(span, at(1, 6)));
    }

    #[test]
    fn multi_line_node_checks_lines_only() {
        let span = SourceSpan::new(SourcePos::new(1, 1, 0), SourcePos::new(4, 2, 50));
        assert!(position_within(span, at(2, 70)));
        assert!(!position_within(span, at(4, 0)));
    }

    // ── nearest ──────────────────────────────────────────────────

    #[test]
    fn nearest_prefers_inner_field_over_outer_message() {
        // the message spans many lines; the field sits on one of them
        let source = "message Outer {\n\n\n\n\n  string name = 1;\n\n\n\n\n}\n";
        let file = parsed(source);
        // the cursor sits on the `=`, covered by the field but by none
        // of its tokens
        let node = nearest(&file, at(5, 14)).expect("node at cursor");
        assert_eq!(node.type_name(), "Field");
    }

    #[test]
    fn nearest_on_single_line_picks_the_tightest_token() {
        let file = parsed("message Foo { string name = 1; }");
        let node = nearest(&file, at(0, 9)).expect("node at cursor");
        assert_eq!(node.type_name(), "Ident");
    }

    #[test]
    fn nodes_at_returns_parents_first() {
        let file = parsed("message Foo { string name = 1; }");
        let names = type_names(&nodes_at(&file, at(0, 22)));
        assert_eq!(names.first(), Some(&"File"));
        assert!(names.contains(&"Message"));
        assert!(names.contains(&"Field"));
        assert!(names.contains(&"Ident"));
    }

    #[test]
    fn import_node_found_inside_import_string() {
        let file = parsed("import \"x/y.proto\";\n");
        let nodes = nodes_at(&file, at(0, 10));
        assert!(type_names(&nodes).contains(&"Import"));
    }
}
