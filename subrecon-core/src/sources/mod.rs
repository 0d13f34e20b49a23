//! Discovery source contracts.
//!
//! A source is either an external command-line tool or a remote HTTP API.
//! The two kinds share a name and differ in how they are driven. The
//! contract for each kind lives in the type: a tool carries an argv
//! builder, an API carries a URL template plus a payload parser, so a
//! structurally malformed descriptor cannot reach a runner. The one check
//! left to runtime is the parser's output shape.

pub mod builtin;
mod loader;

pub use loader::{load_sources, selected_names, LoadOptions};

use std::collections::BTreeSet;

use thiserror::Error;

/// Domain handed to contract probes; never contacted.
pub(crate) const PROBE_DOMAIN: &str = "example.com";

/// Builds the argv for one tool invocation. The first element is the
/// executable base name; no shell is involved at any point.
pub type BuildCommandFn = fn(&str) -> Vec<String>;

/// Turns a decoded API payload into candidate subdomains.
pub type ParseFn = fn(ApiPayload) -> Result<BTreeSet<String>, ParseError>;

/// Decoded response body handed to a parser.
#[derive(Debug, Clone)]
pub enum ApiPayload {
    Json(serde_json::Value),
    Text(String),
}

/// How an API response body is decoded before parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PayloadFormat {
    #[default]
    Json,
    Text,
}

/// Where an API source finds its credential.
#[derive(Debug, Clone)]
pub enum ApiAuth {
    /// `Authorization: Bearer <value>` read from the named environment
    /// variable. The header is omitted when the variable is unset.
    BearerEnv { var: String },
    /// A verbatim header sent as-is.
    Header { name: String, value: String },
}

/// The tool half of the source contract.
#[derive(Debug, Clone)]
pub struct ToolSource {
    pub build_command: BuildCommandFn,
}

/// The API half of the source contract.
#[derive(Debug, Clone)]
pub struct ApiSource {
    /// URL with a literal `{domain}` placeholder.
    pub url_template: String,
    pub format: PayloadFormat,
    pub parse: ParseFn,
    pub auth: Option<ApiAuth>,
}

#[derive(Debug, Clone)]
pub enum SourceKind {
    Tool(ToolSource),
    Api(ApiSource),
}

/// One discovery source. Immutable once loaded; shared read-only across
/// concurrent runners.
#[derive(Debug, Clone)]
pub struct SourceDescriptor {
    pub name: String,
    pub kind: SourceKind,
}

impl SourceDescriptor {
    pub fn tool(name: impl Into<String>, build_command: BuildCommandFn) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Tool(ToolSource { build_command }),
        }
    }

    pub fn api(
        name: impl Into<String>,
        url_template: impl Into<String>,
        format: PayloadFormat,
        parse: ParseFn,
    ) -> Self {
        Self {
            name: name.into(),
            kind: SourceKind::Api(ApiSource {
                url_template: url_template.into(),
                format,
                parse,
                auth: None,
            }),
        }
    }

    pub fn with_auth(mut self, auth: ApiAuth) -> Self {
        if let SourceKind::Api(api) = &mut self.kind {
            api.auth = Some(auth);
        }
        self
    }

    pub fn kind_label(&self) -> &'static str {
        match self.kind {
            SourceKind::Tool(_) => "tool",
            SourceKind::Api(_) => "api",
        }
    }

    /// Checks the parts of the contract the types cannot guarantee.
    pub fn check_contract(&self) -> Result<(), ContractViolation> {
        if self.name.trim().is_empty() {
            return Err(ContractViolation::EmptyName);
        }
        match &self.kind {
            SourceKind::Tool(tool) => {
                let argv = (tool.build_command)(PROBE_DOMAIN);
                match argv.first() {
                    Some(program) if !program.trim().is_empty() => Ok(()),
                    _ => Err(ContractViolation::EmptyCommand {
                        name: self.name.clone(),
                    }),
                }
            }
            SourceKind::Api(api) => {
                if api.url_template.contains("{domain}") {
                    Ok(())
                } else {
                    Err(ContractViolation::MissingPlaceholder {
                        name: self.name.clone(),
                    })
                }
            }
        }
    }
}

/// A descriptor that does not satisfy the source contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractViolation {
    #[error("source has an empty name")]
    EmptyName,
    #[error("tool `{name}` built an empty command line")]
    EmptyCommand { name: String },
    #[error("api `{name}` url template is missing the `{{domain}}` placeholder")]
    MissingPlaceholder { name: String },
}

/// Raised by a parser when the payload does not have the shape the source
/// advertises.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected response shape: {reason}")]
pub struct ParseError {
    reason: String,
}

impl ParseError {
    pub fn shape(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
