//! Post-processing hooks applied to fetched document bodies.

/// Rewrites document bodies after they are fetched.
///
/// Both methods default to returning their input, so implementors override
/// only the format they care about.
pub trait DocumentTransform: Send + Sync {
    /// Processes the rendered HTML body (token mode only).
    fn process_html(&self, html: &str) -> String {
        html.to_string()
    }

    /// Processes the markdown body after the properties preamble is removed.
    fn process_markdown(&self, markdown: &str) -> String {
        markdown.to_string()
    }
}

/// Leaves bodies untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl DocumentTransform for IdentityTransform {}
