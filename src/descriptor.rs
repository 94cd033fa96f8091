//! The bundle being registered: its identity and the names derived from it.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const RESERVED_WORDS: &[&str] = &[
    "abstract", "and", "array", "as", "break", "callable", "case", "catch", "class", "clone",
    "const", "continue", "declare", "default", "do", "echo", "else", "elseif", "empty",
    "enddeclare", "endfor", "endforeach", "endif", "endswitch", "endwhile", "eval", "exit",
    "extends", "final", "finally", "fn", "for", "foreach", "function", "global", "goto", "if",
    "implements", "include", "instanceof", "insteadof", "interface", "isset", "list", "match",
    "namespace", "new", "or", "print", "private", "protected", "public", "readonly", "require",
    "return", "static", "switch", "throw", "trait", "try", "unset", "use", "var", "while", "xor",
    "yield",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("the namespace is required")]
    EmptyNamespace,

    #[error("the namespace \"{0}\" contains invalid characters")]
    InvalidNamespace(String),

    #[error("the namespace cannot contain PHP reserved words (\"{0}\")")]
    ReservedWord(String),

    #[error("the namespace must end with Bundle")]
    MissingBundleSuffix,

    #[error("the namespace must contain a vendor namespace (e.g. \"VendorName\\{0}\" instead of simply \"{0}\")")]
    MissingVendor(String),

    #[error("the bundle name \"{0}\" contains invalid characters")]
    InvalidBundleName(String),

    #[error("the bundle name must end with Bundle")]
    BundleNameSuffix,

    #[error("format \"{0}\" is not supported (expected annotation, yml, xml or php)")]
    InvalidFormat(String),
}

/// Format of the bundle's own configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConfigurationFormat {
    #[default]
    Annotation,
    Yml,
    Xml,
    Php,
}

impl ConfigurationFormat {
    /// Format used when none is given: shared bundles ship XML configuration.
    pub fn default_for(shared: bool) -> Self {
        if shared {
            ConfigurationFormat::Xml
        } else {
            ConfigurationFormat::Annotation
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConfigurationFormat::Annotation => "annotation",
            ConfigurationFormat::Yml => "yml",
            ConfigurationFormat::Xml => "xml",
            ConfigurationFormat::Php => "php",
        }
    }

    /// File extension used for generated configuration files.
    pub fn extension(self) -> &'static str {
        match self {
            ConfigurationFormat::Annotation | ConfigurationFormat::Yml => "yml",
            ConfigurationFormat::Xml => "xml",
            ConfigurationFormat::Php => "php",
        }
    }
}

impl FromStr for ConfigurationFormat {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annotation" => Ok(ConfigurationFormat::Annotation),
            "yml" | "yaml" => Ok(ConfigurationFormat::Yml),
            "xml" => Ok(ConfigurationFormat::Xml),
            "php" => Ok(ConfigurationFormat::Php),
            _ => Err(DescriptorError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ConfigurationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bundle: namespace, short name, configuration format and whether it is
/// shared across applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleDescriptor {
    namespace: String,
    name: String,
    format: ConfigurationFormat,
    shared: bool,
}

impl BundleDescriptor {
    /// Validate and build a descriptor.
    ///
    /// `/` is accepted as namespace separator. The `Bundle` suffix is added
    /// to the namespace and name when missing. Without an explicit name the
    /// namespace with its separators removed is used.
    pub fn new(
        namespace: &str,
        name: Option<&str>,
        format: ConfigurationFormat,
        shared: bool,
    ) -> Result<Self, DescriptorError> {
        let namespace = validate_namespace(&add_bundle_suffix(namespace), shared)?;
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => add_bundle_suffix(name),
            None => namespace.replace('\\', ""),
        };
        let name = validate_bundle_name(&name)?;

        Ok(Self {
            namespace,
            name,
            format,
            shared,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Short name, e.g. `AcmeBlogBundle`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified class name, e.g. `Acme\BlogBundle\AcmeBlogBundle`.
    pub fn class_name(&self) -> String {
        format!("{}\\{}", self.namespace, self.name)
    }

    pub fn format(&self) -> ConfigurationFormat {
        self.format
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Shared bundles load their services through their own extension.
    pub fn needs_services_import(&self) -> bool {
        !self.shared
    }

    pub fn services_configuration_filename(&self) -> String {
        format!("services.{}", self.format.extension())
    }

    /// Resource path of the services file, e.g.
    /// `@AcmeBlogBundle/Resources/config/services.yml`.
    pub fn services_resource(&self) -> String {
        format!(
            "@{}/Resources/config/{}",
            self.name,
            self.services_configuration_filename()
        )
    }
}

/// Append `Bundle` unless already present; empty input stays empty.
pub fn add_bundle_suffix(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() || name.ends_with("Bundle") {
        name.to_string()
    } else {
        format!("{name}Bundle")
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_alphabetic() => {
            chars.all(|c| c == '_' || c.is_alphanumeric())
        }
        _ => false,
    }
}

fn validate_namespace(namespace: &str, require_vendor: bool) -> Result<String, DescriptorError> {
    let namespace = namespace.replace('/', "\\");
    let namespace = namespace.trim_matches('\\').to_string();
    if namespace.is_empty() {
        return Err(DescriptorError::EmptyNamespace);
    }

    for segment in namespace.split('\\') {
        if !is_identifier(segment) {
            return Err(DescriptorError::InvalidNamespace(namespace.clone()));
        }
        let lower = segment.to_ascii_lowercase();
        if RESERVED_WORDS.contains(&lower.as_str()) {
            return Err(DescriptorError::ReservedWord(segment.to_string()));
        }
    }

    if !namespace.ends_with("Bundle") {
        return Err(DescriptorError::MissingBundleSuffix);
    }

    if require_vendor && !namespace.contains('\\') {
        return Err(DescriptorError::MissingVendor(namespace));
    }

    Ok(namespace)
}

fn validate_bundle_name(name: &str) -> Result<String, DescriptorError> {
    if !is_identifier(name) {
        return Err(DescriptorError::InvalidBundleName(name.to_string()));
    }
    if !name.ends_with("Bundle") {
        return Err(DescriptorError::BundleNameSuffix);
    }
    Ok(name.to_string())
}
