//! Three-layer system message assembly.
//!
//! - Layer 1: `<system_core_prompt>` -- role, principles, base tools (never compressed)
//! - Layer 2: `<pkg_inject_prompt>` -- step context, progress, tools, output contract (never compressed)
//! - Layer 3: conversation history -- user/assistant messages (compression target)

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use stagehand_types::step::StepDefinition;
use thiserror::Error;

use crate::filesystem::FileSystem;
use crate::template;

use super::snapshot::ContextSnapshot;

/// Prompt assembly failure.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("read template {path}: {source}")]
    Template {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Constructs the full system instruction for an LLM node.
pub trait PromptAssembler: Send + Sync {
    /// Build-time instruction (Layer 1 + static Layer 2 body).
    fn build_static(
        &self,
        step: &StepDefinition,
        vars: &HashMap<String, String>,
    ) -> Result<String, PromptError>;

    /// Runtime instruction with a fresh `<WorkflowContext>` injected.
    fn build_dynamic<'a>(
        &'a self,
        step: &'a StepDefinition,
        vars: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, PromptError>>;

    /// Whether runtime rebuild is needed.
    fn has_dynamic_content(&self) -> bool;
}

/// Default [`PromptAssembler`].
///
/// Layer 1 content is loaded once at construction from two filesystem paths;
/// empty or missing files degrade gracefully to empty sections.
pub struct Assembler {
    fs: Arc<dyn FileSystem>,
    core_prompt: String,
    tools_reference: String,
    snapshot: Option<Arc<dyn ContextSnapshot>>,
}

impl Assembler {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        core_prompt_path: &str,
        tools_ref_path: &str,
        snapshot: Option<Arc<dyn ContextSnapshot>>,
    ) -> Self {
        let core_prompt = fs
            .read_file(core_prompt_path)
            .map(|data| String::from_utf8_lossy(&data).into_owned())
            .unwrap_or_default();
        let tools_reference = fs
            .read_file(tools_ref_path)
            .map(|data| String::from_utf8_lossy(&data).into_owned())
            .unwrap_or_default();

        Self {
            fs,
            core_prompt,
            tools_reference,
            snapshot,
        }
    }

    /// Template variable map: step defaults first, caller overrides second.
    /// When the step names an `output_template`, the template file is read
    /// and rendered into the `output_template` variable.
    fn merge_vars(
        &self,
        step: &StepDefinition,
        vars: &HashMap<String, String>,
    ) -> Result<HashMap<String, String>, PromptError> {
        let mut merged = HashMap::new();
        merged.insert(
            "output_path".to_string(),
            step.frontmatter.primary_output().to_string(),
        );
        merged.insert("stage".to_string(), step.frontmatter.step.clone());
        for (k, v) in vars {
            merged.insert(k.clone(), v.clone());
        }

        let template_path = &step.frontmatter.output_template;
        if !template_path.is_empty() {
            let content =
                self.fs
                    .read_file(template_path)
                    .map_err(|source| PromptError::Template {
                        path: template_path.clone(),
                        source,
                    })?;
            let rendered = template::render(&String::from_utf8_lossy(&content), &merged);
            merged.insert("output_template".to_string(), rendered);
        }

        Ok(merged)
    }

    fn write_layer1(&self, out: &mut String) {
        out.push_str("<system_core_prompt>\n");
        out.push_str(&self.core_prompt);
        if !self.tools_reference.is_empty() {
            out.push_str("\n\n<tools_reference>\n");
            out.push_str(&self.tools_reference);
            out.push_str("\n</tools_reference>");
        }
        out.push_str("\n</system_core_prompt>\n\n");
    }

    fn write_static_layer2(&self, out: &mut String, body: &str) {
        out.push_str("<pkg_inject_prompt>\n");
        out.push_str("<pkg_prompt>\n");
        out.push_str(body);
        out.push_str("\n</pkg_prompt>\n");
        out.push_str("</pkg_inject_prompt>");
    }
}

impl PromptAssembler for Assembler {
    fn build_static(
        &self,
        step: &StepDefinition,
        vars: &HashMap<String, String>,
    ) -> Result<String, PromptError> {
        let merged = self.merge_vars(step, vars)?;
        let body = template::render(&step.body, &merged);

        let mut out = String::new();
        self.write_layer1(&mut out);
        self.write_static_layer2(&mut out, &body);
        Ok(out)
    }

    fn build_dynamic<'a>(
        &'a self,
        step: &'a StepDefinition,
        vars: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<String, PromptError>> {
        Box::pin(async move {
            let merged = self.merge_vars(step, vars)?;
            let body = template::render(&step.body, &merged);

            let mut out = String::new();
            self.write_layer1(&mut out);

            out.push_str("<pkg_inject_prompt>\n");
            if let Some(snapshot) = &self.snapshot {
                let context = snapshot.build_snapshot(&step.frontmatter.step, step).await;
                out.push_str(&context);
                out.push('\n');
            }
            out.push_str("<pkg_prompt>\n");
            out.push_str(&body);
            out.push_str("\n</pkg_prompt>\n");
            out.push_str("</pkg_inject_prompt>");

            Ok(out)
        })
    }

    fn has_dynamic_content(&self) -> bool {
        self.snapshot.is_some()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
