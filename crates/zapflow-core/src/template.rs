use crate::{domain::Contact, errors::Error, Result};

/// Token replaced with the contact's name.
pub const NAME_PLACEHOLDER: &str = "{nome}";

pub const DEFAULT_TEMPLATE: &str = "Olá {nome}, tudo bem?

Sou corretor de imóveis e estou com clientes procurando apartamentos no seu condomínio.

Você teria interesse em vender o seu imóvel ou ouvir uma proposta sem compromisso?";

/// Session-wide message template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    content: String,
}

impl Default for Template {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl Template {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn set(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    pub fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(Error::Template("message template is empty".to_string()));
        }
        Ok(())
    }

    /// Substitute the first placeholder with the contact's name, or drop it
    /// when the contact has none.
    pub fn render(&self, contact: &Contact) -> String {
        self.content
            .replacen(NAME_PLACEHOLDER, contact.name.as_deref().unwrap_or(""), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_inserts_name() {
        let t = Template::new("Olá {nome}, tudo bem?");
        let c = Contact::new("11999998888", "5511999998888", Some("João".to_string()));
        assert_eq!(t.render(&c), "Olá João, tudo bem?");
    }

    #[test]
    fn render_removes_placeholder_without_name() {
        let t = Template::new("Olá {nome}, tudo bem?");
        let c = Contact::new("11999998888", "5511999998888", None);
        assert_eq!(t.render(&c), "Olá , tudo bem?");
    }

    #[test]
    fn only_first_placeholder_is_substituted() {
        let t = Template::new("{nome} {nome}");
        let c = Contact::new("11999998888", "5511999998888", Some("Ana".to_string()));
        assert_eq!(t.render(&c), "Ana {nome}");
    }

    #[test]
    fn blank_template_is_rejected() {
        assert!(Template::new("  \n ").validate().is_err());
        assert!(Template::default().validate().is_ok());
    }
}
