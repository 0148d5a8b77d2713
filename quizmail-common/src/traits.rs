//! Collaborator contracts implemented by the surrounding product.

use std::fmt;

use crate::envelope::Mailbox;
use crate::message::Category;

/// A rendered template: subject and HTML body with placeholders already
/// substituted. The delivery subsystem treats both as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTemplate {
    pub subject: String,
    pub html: String,
}

/// Template rendering collaborator.
pub trait TemplateRenderer: Send + Sync + fmt::Debug {
    /// Render the template for a category in the given locale.
    fn render(&self, category: Category, locale: &str) -> RenderedTemplate;
}

/// Directory of addresses eligible for operational alerts.
pub trait AdminDirectory: Send + Sync + fmt::Debug {
    fn admin_recipients(&self) -> Vec<Mailbox>;
}
