//! Memory graph to DOT (Graphviz) conversion.
//!
//! The dump is diagnostic output only; its layout may change between versions.
//!
//! # DOT Format
//!
//! - **Stack frames** and **globals** are clusters holding their variables
//! - **Objects** are records labelled with kind, size and level; heap objects are
//!   filled green when valid and red when freed, abstract objects are dashed
//! - **Values** are small ellipses, labelled with their explicit number if known
//! - **Has-value edges** go from objects to values, labelled with the bit range
//! - **Points-to edges** go from values to objects, labelled with offset and specifier
//! - **Inequalities** are red undirected edges between values
//!
//! # Examples
//!
//! ```
//! use smg_rs::state::SmgState;
//!
//! let mut state = SmgState::default();
//! state.push_stack_frame("main");
//! let p = state.add_local_variable("p", 64).unwrap();
//! let node = state.malloc(128, "node").unwrap();
//! state.write_value(p, 0, 64, node).unwrap();
//!
//! let dot = state.smg().to_dot("join", "line 42").unwrap();
//! // Render with: dot -Tsvg join.dot -o join.svg
//! ```

use std::fmt::Write as _;

use crate::edge::HasValueFilter;
use crate::object::{Object, ObjectKind};
use crate::smg::Smg;
use crate::types::{ObjectId, ValueId};

/// Configuration options for DOT output generation.
///
/// # Examples
///
/// ```
/// use smg_rs::dot::DotConfig;
/// use smg_rs::smg::Smg;
///
/// let config = DotConfig {
///     show_null: false,
///     ..DotConfig::default()
/// };
/// let dot = Smg::default().to_dot_with_config("empty", "entry", &config).unwrap();
/// assert!(!dot.contains("NULL"));
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Fill colour of valid heap objects (default: "green")
    pub valid_color: &'static str,
    /// Fill colour of freed heap objects (default: "red")
    pub invalid_color: &'static str,
    /// Colour of inequality edges (default: "red")
    pub neq_color: &'static str,
    /// Style of abstract objects (default: "dashed")
    pub abstract_style: &'static str,
    /// Whether to draw the NULL object and the zero value (default: true)
    pub show_null: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            valid_color: "green",
            invalid_color: "red",
            neq_color: "red",
            abstract_style: "dashed",
            show_null: true,
        }
    }
}

fn object_node(id: ObjectId) -> String {
    if id.is_null() {
        "null".to_string()
    } else {
        format!("o{}", id.id())
    }
}

fn value_node(id: ValueId) -> String {
    format!("v{}", id.id())
}

/// Quotes `s` for use inside a record label.
fn escape(s: &str) -> String {
    s.chars()
        .flat_map(|c| match c {
            '"' | '{' | '}' | '|' | '<' | '>' => vec!['\\', c],
            c => vec![c],
        })
        .collect()
}

impl Smg {
    /// Converts the graph to DOT format.
    ///
    /// `name` becomes the graph name and `location` its caption.
    pub fn to_dot(&self, name: &str, location: &str) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(name, location, &DotConfig::default())
    }

    /// Converts the graph to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, name: &str, location: &str, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph \"{}\" {{", escape(name))?;
        writeln!(dot, "label=\"{}\";", escape(location))?;
        writeln!(dot, "node [shape=record];")?;

        let mut placed = Vec::new();

        for (i, frame) in self.stack_frames().iter().enumerate() {
            writeln!(dot, "subgraph cluster_frame_{} {{", i)?;
            writeln!(dot, "label=\"{}\";", escape(&frame.function))?;
            for (variable, &id) in &frame.variables {
                self.write_object(&mut dot, id, Some(variable.as_str()), config)?;
                placed.push(id);
            }
            writeln!(dot, "}}")?;
        }

        if !self.globals().is_empty() {
            writeln!(dot, "subgraph cluster_globals {{")?;
            writeln!(dot, "label=\"globals\";")?;
            for (variable, &id) in self.globals() {
                self.write_object(&mut dot, id, Some(variable.as_str()), config)?;
                placed.push(id);
            }
            writeln!(dot, "}}")?;
        }

        for object in self.objects() {
            if placed.contains(&object.id) || (object.is_null() && !config.show_null) {
                continue;
            }
            self.write_object(&mut dot, object.id, None, config)?;
        }

        for value in self.values() {
            if value.is_zero() && !config.show_null {
                continue;
            }
            let label = match self.explicit(value) {
                Some(number) => format!("{} = {}", value, number),
                None => value.to_string(),
            };
            writeln!(dot, "{} [shape=ellipse, label=\"{}\"];", value_node(value), label)?;
        }

        for object in self.objects() {
            for edge in self.has_value_edges(&HasValueFilter::object(object.id)) {
                writeln!(
                    dot,
                    "{} -> {} [label=\"[{}b, {}b)\"];",
                    object_node(edge.object),
                    value_node(edge.value),
                    edge.offset,
                    edge.end()
                )?;
            }
        }

        for pt in self.points_to_edges() {
            if pt.value.is_zero() && !config.show_null {
                continue;
            }
            writeln!(
                dot,
                "{} -> {} [label=\"+{}b, {}\"];",
                value_node(pt.value),
                object_node(pt.object),
                pt.offset,
                pt.specifier
            )?;
        }

        for (a, b) in self.neq_pairs() {
            writeln!(
                dot,
                "{} -> {} [dir=none, color={}];",
                value_node(a),
                value_node(b),
                config.neq_color
            )?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }

    fn write_object(
        &self,
        dot: &mut String,
        id: ObjectId,
        variable: Option<&str>,
        config: &DotConfig,
    ) -> Result<(), std::fmt::Error> {
        let Some(object) = self.object(id) else {
            return Ok(());
        };
        let mut attributes = Vec::new();
        if self.is_heap_object(id) {
            let color = if self.is_valid(id) {
                config.valid_color
            } else {
                config.invalid_color
            };
            attributes.push(format!("style=\"filled{}\"", abstract_suffix(object, config)));
            attributes.push(format!("fillcolor={}", color));
        } else if object.kind.is_abstract() {
            attributes.push(format!("style={}", config.abstract_style));
        }
        let label = match variable {
            Some(name) => format!("{} | {}", escape(name), escape(&object.to_string())),
            None => escape(&object.to_string()),
        };
        attributes.insert(0, format!("label=\"{{{}}}\"", label));
        writeln!(dot, "{} [{}];", object_node(id), attributes.join(", "))
    }
}

fn abstract_suffix(object: &Object, config: &DotConfig) -> String {
    match object.kind {
        ObjectKind::Region | ObjectKind::Null => String::new(),
        _ => format!(",{}", config.abstract_style),
    }
}
