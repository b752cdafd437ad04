//! Live `<WorkflowContext>` snapshot builder.
//!
//! The snapshot describes workflow progress, input summaries, available
//! tools, and the output contract for the current step. It is rebuilt at
//! runtime and injected into the Layer 2 system message.

use std::fmt::Write as _;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use stagehand_types::artifact::ArtifactStatus;
use stagehand_types::step::StepDefinition;

use crate::filesystem::FileSystem;
use crate::memory::tracker::ArtifactTracker;

use super::summarizer::InputSummarizer;

/// Builds a runtime context snapshot for injection into system messages.
pub trait ContextSnapshot: Send + Sync {
    fn build_snapshot<'a>(
        &'a self,
        current_step_id: &'a str,
        step: &'a StepDefinition,
    ) -> BoxFuture<'a, String>;
}

/// Returns the tool names for a given tool-set name.
pub type ToolNamesFn = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// Default [`ContextSnapshot`] over interfaces only.
pub struct Snapshot {
    steps: Vec<StepDefinition>,
    tracker: Arc<dyn ArtifactTracker>,
    summarizer: Arc<dyn InputSummarizer>,
    tool_names: Option<ToolNamesFn>,
    fs: Arc<dyn FileSystem>,
}

impl Snapshot {
    /// - `steps`: all step definitions (needed for progress rendering)
    /// - `tracker`: artifact tracker
    /// - `summarizer`: input file summarizer
    /// - `tool_names`: maps a tool-set name to its tool names
    /// - `fs`: filesystem for checking input file/dir existence
    pub fn new(
        steps: Vec<StepDefinition>,
        tracker: Arc<dyn ArtifactTracker>,
        summarizer: Arc<dyn InputSummarizer>,
        tool_names: Option<ToolNamesFn>,
        fs: Arc<dyn FileSystem>,
    ) -> Self {
        Self {
            steps,
            tracker,
            summarizer,
            tool_names,
            fs,
        }
    }

    fn build_progress(&self, current_step_id: &str) -> String {
        let mut out = String::from("  <Progress>\n");

        let artifacts = self.tracker.get_all();
        let total = self.steps.len();
        let mut completed = 0usize;

        for step in &self.steps {
            let sid = &step.frontmatter.step;
            let title = &step.frontmatter.title;
            let output = step.frontmatter.primary_output();

            match artifacts.get(sid) {
                Some(a) if a.status == ArtifactStatus::Completed => {
                    completed += 1;
                    let _ = writeln!(
                        out,
                        "    ✅ {sid} {title} → {output} (已生成, {}行)",
                        a.line_count
                    );
                }
                _ if sid == current_step_id => {
                    let _ = writeln!(out, "    🔄 {sid} {title} → {output} (当前任务)");
                }
                _ => {
                    let _ = writeln!(out, "    ⬚ {sid} {title}");
                }
            }
        }

        let _ = writeln!(out, "    进度: 第{}步/共{}步", completed + 1, total);
        out.push_str("  </Progress>\n");
        out
    }

    async fn build_input_summaries(&self, step: &StepDefinition) -> String {
        let inputs = &step.frontmatter.input;
        if inputs.is_empty() {
            return String::new();
        }

        let mut out = String::from("  <InputSummaries>\n");

        for input_path in inputs {
            let Ok(stat) = self.fs.stat(input_path) else {
                let _ = writeln!(out, "    <File path=\"{input_path}\" status=\"not_found\"/>");
                continue;
            };

            if stat.is_dir {
                self.summarize_dir(&mut out, input_path).await;
            } else {
                let summary = self.summarizer.summarize(input_path).await;
                let _ = writeln!(
                    out,
                    "    <File path=\"{input_path}\">\n      {summary}\n    </File>"
                );
            }
        }

        out.push_str("  </InputSummaries>\n");
        out
    }

    /// Expands a directory one level; nested directories are ignored.
    async fn summarize_dir(&self, out: &mut String, dir: &str) {
        let Ok(entries) = self.fs.read_dir(dir) else {
            let _ = writeln!(out, "    <Dir path=\"{dir}\" status=\"read_error\"/>");
            return;
        };
        for entry in entries {
            if entry.is_dir {
                continue;
            }
            let path = format!("{dir}/{}", entry.name);
            let summary = self.summarizer.summarize(&path).await;
            let _ = writeln!(out, "    <File path=\"{path}\">\n      {summary}\n    </File>");
        }
    }

    fn build_available_tools(&self, step: &StepDefinition) -> String {
        let mut out = String::from("  <AvailableTools>\n");

        let names = step.frontmatter.effective_tools();
        if names.is_empty() {
            out.push_str("    当前步骤无额外工具。内置工具: file_read, file_write, file_list\n");
            out.push_str("  </AvailableTools>\n");
            return out;
        }

        if let Some(tool_names) = &self.tool_names {
            for name in names {
                let tools = tool_names(name);
                if tools.is_empty() {
                    let _ = writeln!(out, "    [{name}] (未加载)");
                } else {
                    let _ = writeln!(
                        out,
                        "    [{name}] {}个工具: {}",
                        tools.len(),
                        tools.join(", ")
                    );
                }
            }
        }

        out.push_str("  </AvailableTools>\n");
        out
    }

    fn build_output_contract(&self, step: &StepDefinition) -> String {
        let mut out = String::from("  <OutputContract>\n");
        for output in step.frontmatter.output.iter() {
            let _ = writeln!(out, "    目标文件: {output}");
        }

        if !step.frontmatter.next.is_empty() {
            let _ = writeln!(out, "    下一步: {}", step.frontmatter.next);
        } else {
            out.push_str("    下一步: (流程结束)\n");
        }

        for (code, target) in &step.frontmatter.fallback {
            let _ = writeln!(out, "    回退[{code}]: → {target}");
        }

        out.push_str("  </OutputContract>\n");
        out
    }
}

impl ContextSnapshot for Snapshot {
    fn build_snapshot<'a>(
        &'a self,
        current_step_id: &'a str,
        step: &'a StepDefinition,
    ) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let mut out = String::from("<WorkflowContext>\n");
            out.push_str(&self.build_progress(current_step_id));
            out.push_str(&self.build_input_summaries(step).await);
            out.push_str(&self.build_available_tools(step));
            out.push_str(&self.build_output_contract(step));
            out.push_str("</WorkflowContext>");
            out
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
