use crate::toml::errors::TomlError;
use crate::toml::sections::{scan_sections, SectionSpan};
use toml_edit::{DocumentMut, Item};

/// How a top-level key holding a list of `{ resource = ... }` tables is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceList {
    Missing,
    /// `[[key]]` sections
    Tables(Vec<String>),
    /// `key = [{ resource = ... }, ...]`
    Inline(Vec<String>),
    /// The key holds something else
    Other,
}

impl ResourceList {
    pub fn contains(&self, resource: &str) -> bool {
        match self {
            ResourceList::Tables(resources) | ResourceList::Inline(resources) => {
                resources.iter().any(|r| r == resource)
            }
            _ => false,
        }
    }
}

/// A TOML file checked with `toml_edit` and split into header sections.
pub struct TomlTarget {
    document: DocumentMut,
    sections: Vec<SectionSpan>,
}

impl TomlTarget {
    pub fn parse(content: &str) -> Result<Self, TomlError> {
        let document = parse_document(content)?;
        let sections = scan_sections(content)?;
        Ok(Self { document, sections })
    }

    /// Whether `key` exists at the root, as a key or as a table.
    pub fn contains_key(&self, key: &str) -> bool {
        self.document.contains_key(key)
    }

    pub fn resource_list(&self, key: &str) -> ResourceList {
        match self.document.get(key) {
            None => ResourceList::Missing,
            Some(Item::ArrayOfTables(tables)) => ResourceList::Tables(
                tables
                    .iter()
                    .filter_map(|table| table.get("resource").and_then(Item::as_str))
                    .map(str::to_string)
                    .collect(),
            ),
            Some(item) => match item.as_array() {
                Some(array) => ResourceList::Inline(
                    array
                        .iter()
                        .filter_map(|value| value.as_inline_table())
                        .filter_map(|table| table.get("resource"))
                        .filter_map(|value| value.as_str())
                        .map(str::to_string)
                        .collect(),
                ),
                None => ResourceList::Other,
            },
        }
    }

    pub fn sections(&self) -> &[SectionSpan] {
        &self.sections
    }

    /// Last `[[key]]` section.
    pub fn last_array_section(&self, key: &str) -> Option<&SectionSpan> {
        self.sections
            .iter()
            .filter(|section| section.array && section.path.parts() == [key])
            .last()
    }
}

pub fn validate_document(content: &str) -> Result<(), TomlError> {
    parse_document(content).map(|_| ())
}

fn parse_document(content: &str) -> Result<DocumentMut, TomlError> {
    content
        .parse::<DocumentMut>()
        .map_err(|err| TomlError::InvalidTomlSyntax {
            message: err.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_lists() {
        let content = "[[imports]]\nresource = \"a.toml\"\n\n[[imports]]\nresource = \"b.toml\"\n";
        let target = TomlTarget::parse(content).unwrap();
        assert_eq!(
            target.resource_list("imports"),
            ResourceList::Tables(vec!["a.toml".to_string(), "b.toml".to_string()])
        );
        assert!(target.resource_list("imports").contains("b.toml"));
        assert_eq!(target.last_array_section("imports").unwrap().header_start, 33);
        assert_eq!(target.resource_list("framework"), ResourceList::Missing);

        let inline = TomlTarget::parse("imports = [{ resource = \"a.toml\" }]\n").unwrap();
        assert_eq!(
            inline.resource_list("imports"),
            ResourceList::Inline(vec!["a.toml".to_string()])
        );

        let other = TomlTarget::parse("imports = \"a.toml\"\n").unwrap();
        assert_eq!(other.resource_list("imports"), ResourceList::Other);
    }

    #[test]
    fn test_contains_key() {
        let target = TomlTarget::parse("[AcmeBlogBundle]\nprefix = \"/\"\n").unwrap();
        assert!(target.contains_key("AcmeBlogBundle"));
        assert!(!target.contains_key("prefix"));
    }

    #[test]
    fn test_invalid_syntax() {
        assert!(matches!(
            TomlTarget::parse("a = [\n"),
            Err(TomlError::InvalidTomlSyntax { .. })
        ));
    }
}
