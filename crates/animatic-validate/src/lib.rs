//! # Animatic Validate
//!
//! Structural validation of generated scene scripts.
//!
//! A candidate script is parsed into a tree-sitter syntax tree and checked
//! against a fixed contract: the animation library must be imported, at least
//! one class must extend the scene base class, and that class must define the
//! entry method the renderer invokes. Checks run in that order and the first
//! unmet requirement is reported; each requirement has its own error variant
//! so regeneration feedback names the exact defect.
//!
//! Syntax checking is shape-only. Whether the animation logic does anything
//! sensible is the renderer's problem.

use tree_sitter::{Node, Parser, Tree};

use animatic_core::validator::{ScriptValidator, ValidationError};

/// The structural contract a generated scene script must satisfy.
#[derive(Debug, Clone)]
pub struct SceneContract {
    /// Module that must be imported (`import x` or `from x import …`).
    pub module: String,
    /// Base class at least one class declaration must extend.
    pub base_class: String,
    /// Method the scene class must define.
    pub entry_method: String,
}

impl Default for SceneContract {
    fn default() -> Self {
        Self {
            module: "manim".to_string(),
            base_class: "Scene".to_string(),
            entry_method: "construct".to_string(),
        }
    }
}

/// Tree-sitter backed implementation of [`ScriptValidator`].
#[derive(Debug, Clone, Default)]
pub struct StructuralValidator {
    contract: SceneContract,
}

impl StructuralValidator {
    /// Create a validator for a custom contract.
    pub fn new(contract: SceneContract) -> Self {
        Self { contract }
    }

    /// The contract this validator enforces.
    pub fn contract(&self) -> &SceneContract {
        &self.contract
    }
}

impl ScriptValidator for StructuralValidator {
    fn validate(&self, source: &str) -> Result<(), ValidationError> {
        if source.trim().is_empty() {
            return Err(ValidationError::EmptyScript);
        }

        tracing::debug!(chars = source.chars().count(), "validating scene script");

        let tree = parse_python(source).ok_or_else(|| ValidationError::Syntax {
            line: 1,
            message: "parser produced no tree".to_string(),
        })?;
        let root = tree.root_node();

        if root.has_error() {
            let (line, message) = first_syntax_error(root, source);
            return Err(ValidationError::Syntax { line, message });
        }

        let shape = ScriptShape::collect(root, source, &self.contract);
        tracing::debug!(
            has_import = shape.has_import,
            scene_classes = shape.scene_classes.len(),
            "scene script parsed"
        );

        if !shape.has_import {
            return Err(ValidationError::MissingImport {
                module: self.contract.module.clone(),
            });
        }

        let Some(first) = shape.scene_classes.first() else {
            return Err(ValidationError::MissingSceneClass {
                base: self.contract.base_class.clone(),
            });
        };

        if !shape.scene_classes.iter().any(|class| class.has_entry) {
            return Err(ValidationError::MissingEntryMethod {
                class: first.name.clone(),
                method: self.contract.entry_method.clone(),
            });
        }

        tracing::debug!(scene = %first.name, "scene script structure verified");
        Ok(())
    }

    fn extract_scene_name(&self, source: &str) -> Option<String> {
        if source.trim().is_empty() {
            return None;
        }
        let tree = parse_python(source)?;
        let root = tree.root_node();
        if root.has_error() {
            return None;
        }
        let shape = ScriptShape::collect(root, source, &self.contract);
        shape.scene_classes.first().map(|class| class.name.clone())
    }
}

fn parse_python(source: &str) -> Option<Tree> {
    let mut parser = Parser::new();
    let language = tree_sitter_python::LANGUAGE;
    parser.set_language(&language.into()).ok()?;
    parser.parse(source, None)
}

/// One class declaration extending the scene base class.
#[derive(Debug)]
struct SceneClass {
    name: String,
    has_entry: bool,
}

/// Everything the structural checks need, gathered in one tree walk.
#[derive(Debug, Default)]
struct ScriptShape {
    has_import: bool,
    scene_classes: Vec<SceneClass>,
}

impl ScriptShape {
    fn collect(root: Node<'_>, source: &str, contract: &SceneContract) -> Self {
        let mut shape = Self::default();
        walk(root, source.as_bytes(), contract, &mut shape);
        shape
    }
}

fn walk(node: Node<'_>, source: &[u8], contract: &SceneContract, shape: &mut ScriptShape) {
    match node.kind() {
        "import_statement" => {
            if plain_import_matches(node, source, &contract.module) {
                shape.has_import = true;
            }
        }
        "import_from_statement" => {
            if from_import_matches(node, source, &contract.module) {
                shape.has_import = true;
            }
        }
        "class_definition" => {
            if let Some(class) = scene_class(node, source, contract) {
                shape.scene_classes.push(class);
            }
        }
        _ => {}
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        walk(child, source, contract, shape);
    }
}

/// `import manim` / `import manim.animation as anim`
fn plain_import_matches(node: Node<'_>, source: &[u8], module: &str) -> bool {
    let mut cursor = node.walk();
    let matched = node
        .children_by_field_name("name", &mut cursor)
        .any(|name| {
            let target = match name.kind() {
                "aliased_import" => name.child_by_field_name("name"),
                _ => Some(name),
            };
            target
                .and_then(|n| n.utf8_text(source).ok())
                .map(|text| module_matches(text, module))
                .unwrap_or(false)
        });
    matched
}

/// `from manim import *` / `from manim.animation import FadeIn`
fn from_import_matches(node: Node<'_>, source: &[u8], module: &str) -> bool {
    node.child_by_field_name("module_name")
        .and_then(|n| n.utf8_text(source).ok())
        .map(|text| module_matches(text, module))
        .unwrap_or(false)
}

fn module_matches(text: &str, module: &str) -> bool {
    text == module || text.starts_with(&format!("{}.", module))
}

fn scene_class(node: Node<'_>, source: &[u8], contract: &SceneContract) -> Option<SceneClass> {
    let name = node
        .child_by_field_name("name")?
        .utf8_text(source)
        .ok()?
        .to_string();

    let superclasses = node.child_by_field_name("superclasses")?;
    let mut cursor = superclasses.walk();
    let extends_base = superclasses
        .named_children(&mut cursor)
        .any(|base| base_matches(base, source, &contract.base_class));
    if !extends_base {
        return None;
    }

    Some(SceneClass {
        has_entry: class_has_method(node, source, &contract.entry_method),
        name,
    })
}

/// Matches a bare `Scene` identifier or a dotted name ending in `.Scene`.
fn base_matches(node: Node<'_>, source: &[u8], base_class: &str) -> bool {
    let target = match node.kind() {
        "identifier" => Some(node),
        "attribute" => node.child_by_field_name("attribute"),
        _ => None,
    };
    target
        .and_then(|n| n.utf8_text(source).ok())
        .map(|text| text == base_class)
        .unwrap_or(false)
}

fn class_has_method(class_node: Node<'_>, source: &[u8], method: &str) -> bool {
    let Some(body) = class_node.child_by_field_name("body") else {
        return false;
    };
    let mut cursor = body.walk();
    let found = body.named_children(&mut cursor).any(|child| {
        let function = match child.kind() {
            "function_definition" => Some(child),
            "decorated_definition" => child
                .child_by_field_name("definition")
                .filter(|definition| definition.kind() == "function_definition"),
            _ => None,
        };
        function
            .and_then(|f| f.child_by_field_name("name"))
            .and_then(|n| n.utf8_text(source).ok())
            .map(|name| name == method)
            .unwrap_or(false)
    });
    found
}

/// Line and message for the first ERROR or MISSING node in the tree.
fn first_syntax_error(root: Node<'_>, source: &str) -> (usize, String) {
    let Some(node) = find_error_node(root) else {
        return (1, "invalid syntax".to_string());
    };

    let line = node.start_position().row + 1;
    let message = if node.is_missing() {
        format!("missing {}", node.kind())
    } else {
        match node.utf8_text(source.as_bytes()) {
            Ok(text) => {
                let snippet: String = text
                    .lines()
                    .next()
                    .unwrap_or("")
                    .chars()
                    .take(40)
                    .collect();
                if snippet.trim().is_empty() {
                    "unexpected syntax".to_string()
                } else {
                    format!("unexpected '{}'", snippet.trim())
                }
            }
            Err(_) => "unexpected syntax".to_string(),
        }
    };
    (line, message)
}

fn find_error_node<'tree>(node: Node<'tree>) -> Option<Node<'tree>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    if !node.has_error() {
        return None;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = find_error_node(child) {
            return Some(found);
        }
    }
    // the subtree claims an error but no child owns it
    Some(node)
}
