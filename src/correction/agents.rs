//! Prompt roles of the correction pipeline.
//!
//! Five roles talk to the completion endpoint: the generator, the judge and
//! one corrector per phase. Each has a system prompt and a user template
//! whose `{prompt}`, `{workflow}`, `{static_check}`, `{judgement}` and
//! `{vulnerabilities}` placeholders are filled from [`PromptVars`].

use std::sync::OnceLock;

use regex::{Captures, Regex};

const GENERATOR_SYSTEM_PROMPT: &str = r#"You are an expert devops engineer. Please generate a YAML file based on the user's input below. No additional explanation is needed. The output format should be ```yaml <Workflow>```.
Use the repository information provided after the request (file listing, README, CONTRIBUTING guidelines, build manifests and existing workflows) to understand the structure of the project and to produce a workflow that fits it."#;

const GENERATOR_TEMPLATE: &str = "{prompt}";

const GENERATOR_CONTEXT_TEMPLATE: &str = r#"{prompt}

Repository information:
{context}"#;

const JUDGE_SYSTEM_PROMPT: &str = "You are an expert DevOps engineer. Carefully evaluate whether the provided GitHub Actions workflow accurately and completely implements the requirements described in the accompanying prompt.";

const JUDGE_TEMPLATE: &str = r#"Please use the following Likert scale to rate how well the workflow fulfills the instructions (with 1 being the lowest and 5 being the highest):

1. Strongly Disagree – The workflow does not follow the instructions at all.
2. Disagree – The workflow follows the instructions in only a few aspects, with major omissions or errors.
3. Neutral – The workflow partially follows the instructions, but there are significant places where it falls short or deviates.
4. Agree – The workflow generally follows the instructions, with only minor issues or omissions.
5. Strongly Agree – The workflow fully and accurately implements all requirements described in the prompt.

**Instructions:**
- Do **not** allow the length, formatting, or verbosity of the response to affect your judgment.
- Assess only the accuracy and completeness of implementation relative to the prompt's requirements.
- First, clearly explain your reasoning, referencing specific aspects of the workflow and prompt as needed.

Then, conclude with your rating in the following format: Therefore, I would rate the workflow with a score of **X out of 5**.

Here's the description of the workflow:
{prompt}

Here's the workflow:
{workflow}"#;

const CORRECTOR_SYSTEM_PROMPT: &str = "You are an expert devops engineer. Please correct the YAML file generated by the generator tool. No additional explanation is needed. The output format should be ```yaml <Workflow>```.";

const SYNTAX_CORRECTOR_TEMPLATE: &str = r#"Description:
{prompt}
Workflow:
{workflow}
Static analysis results:
{static_check}"#;

const INTENT_CORRECTOR_TEMPLATE: &str = r#"Description:
{prompt}
Workflow:
{workflow}
Judgement:
{judgement}"#;

const VULNERABILITY_CORRECTOR_TEMPLATE: &str = r#"Description:
{prompt}
Workflow:
{workflow}
Vulnerability analysis results:
{vulnerabilities}"#;

/// Placeholder text for an absent workflow.
pub const EMPTY_WORKFLOW: &str = "None";

/// A prompt role of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Generator,
    Judge,
    SyntaxCorrector,
    IntentCorrector,
    VulnerabilityCorrector,
}

impl AgentRole {
    /// Identifier used in logs and storylines.
    pub fn identifier(&self) -> &'static str {
        match self {
            AgentRole::Generator => "generator_agent",
            AgentRole::Judge => "judge_agent",
            AgentRole::SyntaxCorrector => "syntax_corrector_agent",
            AgentRole::IntentCorrector => "judge_corrector_agent",
            AgentRole::VulnerabilityCorrector => "vulnerability_corrector_agent",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        match self {
            AgentRole::Generator => GENERATOR_SYSTEM_PROMPT,
            AgentRole::Judge => JUDGE_SYSTEM_PROMPT,
            AgentRole::SyntaxCorrector
            | AgentRole::IntentCorrector
            | AgentRole::VulnerabilityCorrector => CORRECTOR_SYSTEM_PROMPT,
        }
    }

    pub fn template(&self) -> &'static str {
        match self {
            AgentRole::Generator => GENERATOR_TEMPLATE,
            AgentRole::Judge => JUDGE_TEMPLATE,
            AgentRole::SyntaxCorrector => SYNTAX_CORRECTOR_TEMPLATE,
            AgentRole::IntentCorrector => INTENT_CORRECTOR_TEMPLATE,
            AgentRole::VulnerabilityCorrector => VULNERABILITY_CORRECTOR_TEMPLATE,
        }
    }

    /// Render this role's user prompt.
    pub fn render(&self, vars: &PromptVars<'_>) -> String {
        render_template(self.template(), vars)
    }
}

/// Values substituted into prompt templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptVars<'a> {
    pub prompt: &'a str,
    pub workflow: Option<&'a str>,
    pub static_check: &'a str,
    pub judgement: &'a str,
    pub vulnerabilities: &'a str,
    pub context: &'a str,
}

impl<'a> PromptVars<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }

    pub fn with_workflow(mut self, workflow: Option<&'a str>) -> Self {
        self.workflow = workflow;
        self
    }

    pub fn with_static_check(mut self, static_check: &'a str) -> Self {
        self.static_check = static_check;
        self
    }

    pub fn with_judgement(mut self, judgement: &'a str) -> Self {
        self.judgement = judgement;
        self
    }

    pub fn with_vulnerabilities(mut self, vulnerabilities: &'a str) -> Self {
        self.vulnerabilities = vulnerabilities;
        self
    }

    fn lookup(&self, key: &str) -> Option<&'a str> {
        match key {
            "prompt" => Some(self.prompt),
            "workflow" => Some(self.workflow.unwrap_or(EMPTY_WORKFLOW)),
            "static_check" => Some(self.static_check),
            "judgement" => Some(self.judgement),
            "vulnerabilities" => Some(self.vulnerabilities),
            "context" => Some(self.context),
            _ => None,
        }
    }
}

fn placeholder_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(\w+)\}").ok()).as_ref()
}

/// Substitute known placeholders in one pass.
///
/// Substituted text is never re-scanned and unknown placeholders are left
/// untouched, so workflow expressions such as `${{ github.ref }}` survive.
pub fn render_template(template: &str, vars: &PromptVars<'_>) -> String {
    let Some(re) = placeholder_regex() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures<'_>| match vars.lookup(&caps[1]) {
        Some(value) => value.to_string(),
        None => caps[0].to_string(),
    })
    .into_owned()
}

/// Generator prompt, enriched with repository context when available.
pub fn generator_prompt(prompt: &str, context: Option<&str>) -> String {
    match context {
        Some(context) if !context.trim().is_empty() => {
            let vars = PromptVars {
                context,
                ..PromptVars::new(prompt)
            };
            render_template(GENERATOR_CONTEXT_TEMPLATE, &vars)
        }
        _ => AgentRole::Generator.render(&PromptVars::new(prompt)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_syntax_corrector() {
        let vars = PromptVars::new("Build on push")
            .with_workflow(Some("name: CI"))
            .with_static_check("error: test.yml:1:1 - bad");
        let text = AgentRole::SyntaxCorrector.render(&vars);
        assert_eq!(
            text,
            "Description:\nBuild on push\nWorkflow:\nname: CI\nStatic analysis results:\nerror: test.yml:1:1 - bad"
        );
    }

    #[test]
    fn test_render_leaves_expressions_alone() {
        let workflow = "run: echo ${{ github.ref }} {judgement} ${{secrets}}";
        let vars = PromptVars::new("p")
            .with_workflow(Some(workflow))
            .with_judgement("JUDGED");
        let text = AgentRole::IntentCorrector.render(&vars);
        assert!(text.contains(workflow));
        assert!(text.ends_with("Judgement:\nJUDGED"));
    }

    #[test]
    fn test_absent_workflow_rendered_as_none() {
        let text = AgentRole::Judge.render(&PromptVars::new("p"));
        assert!(text.ends_with("Here's the workflow:\nNone"));
        assert!(text.contains("score of **X out of 5**"));
    }

    #[test]
    fn test_generator_prompt_context() {
        assert_eq!(generator_prompt("Build it", None), "Build it");
        assert_eq!(generator_prompt("Build it", Some("  ")), "Build it");
        let enriched = generator_prompt("Build it", Some("README:\n# Demo"));
        assert!(enriched.starts_with("Build it\n\nRepository information:\n"));
        assert!(enriched.ends_with("# Demo"));
    }

    #[test]
    fn test_identifiers_and_system_prompts() {
        assert_eq!(AgentRole::IntentCorrector.identifier(), "judge_corrector_agent");
        assert_eq!(
            AgentRole::SyntaxCorrector.system_prompt(),
            AgentRole::VulnerabilityCorrector.system_prompt()
        );
        assert!(AgentRole::Generator.system_prompt().contains("```yaml"));
    }
}
