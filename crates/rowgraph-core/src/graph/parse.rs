//! Textual entity graph parsing.
//!
//! Grammar:
//!   list := node (',' node)*
//!   node := ident (':' ident)? ('(' list ')')? ('.key(' list ')')?

use crate::{error::PlanError, graph::SubGraph};

pub(super) fn parse_subgraph(text: &str) -> Result<SubGraph, PlanError> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        text,
        pos: 0,
    };

    let graph = parser.list(None)?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(parser.error("unexpected trailing input"));
    }

    Ok(graph)
}

struct Parser<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn list(&mut self, type_name: Option<String>) -> Result<SubGraph, PlanError> {
        let mut graph = type_name.map_or_else(SubGraph::new, SubGraph::of_type);

        self.skip_ws();
        if self.peek().is_none() || self.peek() == Some(b')') {
            return Ok(graph);
        }

        loop {
            self.node(&mut graph)?;
            self.skip_ws();
            if self.peek() == Some(b',') {
                self.pos += 1;
            } else {
                return Ok(graph);
            }
        }
    }

    fn node(&mut self, graph: &mut SubGraph) -> Result<(), PlanError> {
        let name = self.ident()?;

        self.skip_ws();
        let mut type_name = None;
        if self.peek() == Some(b':') {
            self.pos += 1;
            type_name = Some(self.ident()?);
            self.skip_ws();
        }

        let subgraph = if self.peek() == Some(b'(') {
            Some(self.group(type_name.take())?)
        } else if type_name.is_some() {
            return Err(self.error("type restriction requires a subgraph"));
        } else {
            None
        };

        let key_subgraph = if self.rest().starts_with(".key(") {
            self.pos += ".key".len();
            Some(self.group(None)?)
        } else {
            None
        };

        // repeated names merge into one node
        let node = graph.node_mut(name);
        if subgraph.is_some() {
            node.subgraph = subgraph;
        }
        if key_subgraph.is_some() {
            node.key_subgraph = key_subgraph;
        }

        Ok(())
    }

    fn group(&mut self, type_name: Option<String>) -> Result<SubGraph, PlanError> {
        self.pos += 1;
        let subgraph = self.list(type_name)?;
        self.skip_ws();
        if self.peek() != Some(b')') {
            return Err(self.error("unbalanced parenthesis"));
        }
        self.pos += 1;

        Ok(subgraph)
    }

    fn ident(&mut self) -> Result<String, PlanError> {
        self.skip_ws();
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected attribute name"));
        }

        Ok(self.text[start..self.pos].to_string())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn error(&self, message: &str) -> PlanError {
        PlanError::GraphSyntax {
            offset: self.pos,
            message: message.to_string(),
        }
    }
}
