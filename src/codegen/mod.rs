//! Lowering of a workflow tree to MuPIF-flavoured Python source.
//!
//! Generation produces a list of lines indented with one tab per level; [`render`]
//! turns them into the final text.

use crate::error::CodegenError;
use crate::workflow::{Workflow, sanitize_identifier};
use serde::{Deserialize, Serialize};

mod blocks;
mod program;

/// The two shapes of generated program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeForm {
    /// A reusable workflow class exposing `set`, `get` and `solveStep`.
    Class,
    /// A standalone script that runs the workflow once.
    Execution,
}

/// Generator settings, loadable from a JSON config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorOptions {
    pub class_name: String,
    /// Module providing `Workflow`, `TimeStep`, `Property` and friends.
    pub runtime_module: String,
    pub time_units: String,
    /// Slack used when deciding that a time loop reached its target.
    pub time_tolerance: f64,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            class_name: "MyWorkflow".to_string(),
            runtime_module: "mupif".to_string(),
            time_units: "s".to_string(),
            time_tolerance: 1e-6,
        }
    }
}

pub struct CodeGeneratorBuilder {
    options: GeneratorOptions,
}

impl CodeGeneratorBuilder {
    pub fn new(class_name: &str) -> Self {
        Self {
            options: GeneratorOptions {
                class_name: class_name.to_string(),
                ..GeneratorOptions::default()
            },
        }
    }

    pub fn with_class_name(mut self, class_name: &str) -> Self {
        self.options.class_name = class_name.to_string();
        self
    }

    pub fn with_runtime_module(mut self, module: &str) -> Self {
        self.options.runtime_module = module.to_string();
        self
    }

    pub fn with_time_units(mut self, units: &str) -> Self {
        self.options.time_units = units.to_string();
        self
    }

    pub fn with_time_tolerance(mut self, tolerance: f64) -> Self {
        self.options.time_tolerance = tolerance;
        self
    }

    /// Replaces every setting at once, e.g. with options read from a config file.
    pub fn with_options(mut self, options: GeneratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> CodeGenerator {
        CodeGenerator {
            options: self.options,
        }
    }
}

/// Turns a workflow into program text.
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator {
    options: GeneratorOptions,
}

impl CodeGenerator {
    pub fn builder(class_name: &str) -> CodeGeneratorBuilder {
        CodeGeneratorBuilder::new(class_name)
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Assigns code identifiers and lowers the whole tree.
    ///
    /// The workflow is not checked for consistency; callers are expected to run
    /// [`Workflow::check_consistency`] first.
    pub fn generate(
        &self,
        workflow: &mut Workflow,
        form: CodeForm,
    ) -> Result<Vec<String>, CodegenError> {
        let class_name = &self.options.class_name;
        if sanitize_identifier(class_name).as_deref() != Some(class_name.as_str()) {
            return Err(CodegenError::InvalidClassName(class_name.clone()));
        }
        workflow.assign_code_names();
        let lines = program::ProgramWriter::new(workflow, &self.options, form).write()?;
        tracing::info!(
            "generated {} lines of {:?} code for '{}'",
            lines.len(),
            form,
            self.options.class_name
        );
        Ok(lines)
    }

    /// [`generate`](Self::generate) followed by [`render`].
    pub fn generate_source(
        &self,
        workflow: &mut Workflow,
        form: CodeForm,
    ) -> Result<String, CodegenError> {
        self.generate(workflow, form).map(|lines| render(&lines))
    }
}

impl Workflow {
    /// Generates code with default options, naming the class after the workflow.
    pub fn generate_workflow_code(&mut self, form: CodeForm) -> Result<Vec<String>, CodegenError> {
        let generator = CodeGenerator::builder(&self.class_name()).build();
        generator.generate(self, form)
    }

    /// The workflow name as a class identifier, or the default class name if the name
    /// has no usable characters.
    pub fn class_name(&self) -> String {
        sanitize_identifier(self.name())
            .unwrap_or_else(|| GeneratorOptions::default().class_name)
    }
}

/// Expands each leading tab to four spaces and joins the lines.
pub fn render(lines: &[String]) -> String {
    lines
        .iter()
        .map(|line| {
            let depth = line.chars().take_while(|c| *c == '\t').count();
            format!("{}{}", "    ".repeat(depth), &line[depth..])
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single-quoted Python string literal.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if u32::from(c) < 0x20 || c == '\u{7f}' => {
                out.push_str(&format!("\\x{:02x}", u32::from(c)))
            }
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// A Python float literal.
pub(crate) fn float_literal(value: f64) -> String {
    if value.is_nan() {
        "float('nan')".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "float('inf')".to_string()
        } else {
            "float('-inf')".to_string()
        }
    } else {
        format!("{:?}", value)
    }
}

/// Blank lines carry no indentation.
pub(crate) fn indent(level: usize, text: impl AsRef<str>) -> String {
    let text = text.as_ref();
    if text.is_empty() {
        return String::new();
    }
    format!("{}{}", "\t".repeat(level), text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_expands_leading_tabs_only() {
        let lines = vec![
            "class A:".to_string(),
            "\tdef f(self):".to_string(),
            "\t\treturn '\t'".to_string(),
        ];
        assert_eq!(
            render(&lines),
            "class A:\n    def f(self):\n        return '\t'"
        );
    }

    #[test]
    fn quote_escapes_delimiters() {
        assert_eq!(quote("it's"), "'it\\'s'");
        assert_eq!(quote("a\\b"), "'a\\\\b'");
    }

    #[test]
    fn quote_escapes_control_characters() {
        assert_eq!(quote("a\r\nb"), "'a\\r\\nb'");
        assert_eq!(quote("\u{1b}[0m"), "'\\x1b[0m'");
        assert_eq!(quote("bell\u{7}"), "'bell\\x07'");
    }

    #[test]
    fn float_literals_look_like_python() {
        assert_eq!(float_literal(10.0), "10.0");
        assert_eq!(float_literal(0.5), "0.5");
        assert_eq!(float_literal(1e-6), "1e-6");
    }

    #[test]
    fn options_fill_missing_fields_with_defaults() {
        let options: GeneratorOptions =
            serde_json::from_str(r#"{"class_name": "Cantilever"}"#).unwrap();
        assert_eq!(options.class_name, "Cantilever");
        assert_eq!(options.runtime_module, "mupif");
        assert_eq!(options.time_tolerance, 1e-6);
    }
}
