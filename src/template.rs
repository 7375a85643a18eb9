use crate::{
    error::{Error, Result},
    stage::Stage,
};
use tera::{Context, Tera};

/// Inputs substituted into a stage prompt.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PromptInputs<'a> {
    /// The merge artifact
    pub(crate) code: &'a str,

    /// The requirements specification, for stages that build on it
    pub(crate) requirements: Option<&'a str>,
}

/// Template engine for rendering stage prompts.
pub(crate) struct PromptRenderer {
    tera: Tera,
}

impl PromptRenderer {
    /// Creates a renderer with the built-in prompt templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to parse.
    pub(crate) fn new() -> Result<Self> {
        let mut tera = Tera::default();

        // Templates are registered without an extension so tera never autoescapes source code
        Self::register_builtin_templates(&mut tera)?;

        Ok(Self { tera })
    }

    fn register_builtin_templates(tera: &mut Tera) -> Result<()> {
        let templates = [
            (
                Stage::Requirements.template_name(),
                include_str!("../templates/requirements.tera"),
            ),
            (
                Stage::DetailedSpec.template_name(),
                include_str!("../templates/detailed-spec.tera"),
            ),
            (
                Stage::Refactoring.template_name(),
                include_str!("../templates/refactoring.tera"),
            ),
        ];

        for (name, source) in templates {
            tera.add_raw_template(name, source)
                .map_err(|e| Error::template(name, e))?;
        }

        Ok(())
    }

    /// Renders the prompt for `stage`.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub(crate) fn render(&self, stage: Stage, inputs: PromptInputs<'_>) -> Result<String> {
        let template_name = stage.template_name();

        let mut context = Context::new();
        context.insert("code", inputs.code);
        context.insert("requirements", inputs.requirements.unwrap_or_default());
        context.insert("sections", stage.outline());

        self.tera
            .render(template_name, &context)
            .map_err(|e| Error::template(template_name, e))
    }
}
