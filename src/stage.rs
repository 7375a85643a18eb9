//! Document stages that turn the merge artifact into documentation.
//!
//! Each stage reads one or more earlier artifacts from the document
//! directory, renders a prompt, asks the completion service, and writes the
//! answer next to its inputs.

use crate::error::{Error, Result};
use std::path::Path;

/// A document generation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Functional requirements specification
    Requirements,
    /// Detailed program specification built on the requirements
    DetailedSpec,
    /// Refactoring critique
    Refactoring,
}

/// An artifact a stage reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageInput {
    /// The merge artifact
    MergedSource,
    /// The output of another stage
    Document(Stage),
}

impl Stage {
    /// Returns the ID string for this stage.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::DetailedSpec => "detailed-spec",
            Self::Refactoring => "refactoring",
        }
    }

    /// Returns all stages in execution order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Requirements, Self::DetailedSpec, Self::Refactoring]
    }

    /// Parse a stage from its ID.
    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            "requirements" => Some(Self::Requirements),
            "detailed-spec" => Some(Self::DetailedSpec),
            "refactoring" => Some(Self::Refactoring),
            _ => None,
        }
    }

    /// File name of the document this stage writes.
    #[must_use]
    pub const fn output_file(self) -> &'static str {
        match self {
            Self::Requirements => "requirements_spec.txt",
            Self::DetailedSpec => "detailed_program_spec.txt",
            Self::Refactoring => "check_refactoring.txt",
        }
    }

    /// Name of the prompt template for this stage.
    #[must_use]
    pub const fn template_name(self) -> &'static str {
        self.id()
    }

    /// Artifacts the stage reads, in prompt order.
    #[must_use]
    pub const fn inputs(self) -> &'static [StageInput] {
        match self {
            Self::Requirements | Self::Refactoring => &[StageInput::MergedSource],
            Self::DetailedSpec => &[
                StageInput::Document(Self::Requirements),
                StageInput::MergedSource,
            ],
        }
    }

    /// System message sent with the prompt.
    #[must_use]
    pub const fn system_prompt(self) -> &'static str {
        match self {
            Self::Requirements => "You are an assistant that writes software requirements specifications.",
            Self::DetailedSpec => {
                "You are an experienced software architect. You analyse source code and \
                 specifications and write comprehensive program specifications that go \
                 down to implementation details."
            }
            Self::Refactoring => {
                "You are an experienced software engineer. You analyse code quality and give \
                 concrete, practical refactoring suggestions grounded in SOLID and clean code \
                 principles."
            }
        }
    }

    /// Section headings the prompt asks the model to produce, in order.
    #[must_use]
    pub const fn outline(self) -> &'static [&'static str] {
        match self {
            Self::Requirements => &[
                "# Functional Requirements Specification",
                "## 1. System Overview",
                "## 2. Functional Requirements",
                "## 3. Non-functional Requirements",
                "## 4. Technical Requirements",
            ],
            Self::DetailedSpec => &[
                "# Program Specification",
                "## 1. System Overview",
                "## 2. Files: Roles and Details",
                "## 3. Functions: Roles and Details",
                "## 4. Non-functional Requirements",
                "## 5. Technical Requirements",
                "## 6. Usage and Caveats",
            ],
            Self::Refactoring => &[
                "Refactoring Suggestions:",
                "### 1. Separation of Responsibilities (Single Responsibility Principle)",
                "### 2. Duplicated Functions",
                "### 3. Unused Functions",
                "### 4. Functions Reading External Files",
                "### 5. Excessive Error Logging",
            ],
        }
    }

    /// Headings that must appear in the generated document.
    ///
    /// The requirements document is free-form and only has to be non-empty.
    #[must_use]
    pub const fn required_sections(self) -> &'static [&'static str] {
        match self {
            Self::Requirements => &[],
            Self::DetailedSpec | Self::Refactoring => self.outline(),
        }
    }

    /// Checks a generated document for its required sections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the first missing section, or the
    /// empty-document condition.
    pub fn validate(self, document: &Path, content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(Error::validation(document, "(document is empty)"));
        }

        match self
            .required_sections()
            .iter()
            .find(|section| !content.contains(*section))
        {
            Some(section) => Err(Error::validation(document, *section)),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_round_trip() {
        for stage in Stage::all() {
            assert_eq!(Stage::from_id(stage.id()), Some(*stage));
        }
        assert_eq!(Stage::from_id("merge"), None);
    }

    #[test]
    fn test_detailed_spec_reads_requirements_first() {
        assert_eq!(
            Stage::DetailedSpec.inputs(),
            [
                StageInput::Document(Stage::Requirements),
                StageInput::MergedSource
            ]
        );
    }

    #[test]
    fn test_validate_accepts_complete_document() {
        let content = Stage::Refactoring
            .outline()
            .iter()
            .map(|s| format!("{s}\nSome advice.\n"))
            .collect::<String>();

        assert!(Stage::Refactoring
            .validate(Path::new("check_refactoring.txt"), &content)
            .is_ok());
    }

    #[test]
    fn test_validate_reports_first_missing_section() {
        let content = "# Program Specification\n## 1. System Overview\nText\n";
        let err = Stage::DetailedSpec
            .validate(Path::new("detailed_program_spec.txt"), content)
            .unwrap_err();

        match err {
            Error::Validation { section, .. } => assert_eq!(section, "## 2. Files: Roles and Details"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_requirements_only_need_content() {
        let path = Path::new("requirements_spec.txt");
        assert!(Stage::Requirements.validate(path, "anything").is_ok());
        assert!(Stage::Requirements.validate(path, "  \n").is_err());
    }

    #[test]
    fn test_output_files_are_distinct() {
        let mut names: Vec<_> = Stage::all().iter().map(|s| s.output_file()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), 3);
    }
}
