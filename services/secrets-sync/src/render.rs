//! Renders a secret's templates into file contents.

use crate::error::RenderError;
use crate::secret::Secret;
use crate::template::Template;
use std::fmt;
use std::path::PathBuf;
use sync_vault_client::FetchResult;

/// Rendered content destined for one file.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// Target path
    pub path: PathBuf,
    /// Permission bits
    pub mode: u32,
    /// File content
    pub content: Vec<u8>,
}

impl fmt::Debug for RenderedFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedFile")
            .field("path", &self.path)
            .field("mode", &format_args!("{:#o}", self.mode))
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .finish()
    }
}

/// Parsed templates for one secret, paired with their target files.
#[derive(Debug, Clone)]
pub struct SecretRenderer {
    bindings: Vec<Binding>,
}

#[derive(Debug, Clone)]
struct Binding {
    label: String,
    template: Template,
    path: PathBuf,
    mode: u32,
}

impl SecretRenderer {
    /// Parse every template of `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::TemplateSyntax`] for the first template that
    /// fails to parse.
    pub fn new(secret: &Secret) -> Result<Self, RenderError> {
        let bindings = secret
            .bindings()
            .map(|(entry, file)| {
                let template = Template::parse(&entry.expression)
                    .map_err(|e| RenderError::from_template(&entry.label, e))?;
                Ok(Binding {
                    label: entry.label.clone(),
                    template,
                    path: file.path.clone(),
                    mode: file.mode,
                })
            })
            .collect::<Result<_, RenderError>>()?;
        Ok(Self { bindings })
    }

    /// Render every file. Either all files render or none do.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MissingField`] when a template references a
    /// field absent from `fetched`.
    pub fn render(&self, fetched: &FetchResult) -> Result<Vec<RenderedFile>, RenderError> {
        self.bindings
            .iter()
            .map(|binding| {
                let content = binding
                    .template
                    .render(&fetched.values)
                    .map_err(|e| RenderError::from_template(&binding.label, e))?;
                Ok(RenderedFile {
                    path: binding.path.clone(),
                    mode: binding.mode,
                    content: content.into_bytes(),
                })
            })
            .collect()
    }
}

/// Parse and render `secret` against `fetched` in one step.
///
/// # Errors
///
/// Returns the first syntax or missing-field error.
pub fn render(secret: &Secret, fetched: &FetchResult) -> Result<Vec<RenderedFile>, RenderError> {
    SecretRenderer::new(secret)?.render(fetched)
}
