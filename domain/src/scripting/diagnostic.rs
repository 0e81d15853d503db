//! Diagnostics produced while running script content.
//!
//! These are meant for content authors. They never abort the host; every one of
//! them ends up in a single diagnostic sink.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// An entry file or include failed to parse or raised at top level.
    Load,
    /// Read or write of an undeclared member on a bound type.
    Access,
    /// A callback raised while the bridge was invoking it.
    Callback,
    /// Any other error raised by script code.
    Runtime,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Access => "access",
            Self::Callback => "callback",
            Self::Runtime => "runtime",
        }
    }
}

/// `file:line` of the script code that caused a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: Option<u32>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.file, line),
            None => f.write_str(&self.file),
        }
    }
}

/// How an unknown member was touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberAccess {
    Read,
    Write,
    /// Write to a property that only has a getter.
    ReadOnlyWrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptDiagnostic {
    pub kind: DiagnosticKind,
    pub location: Option<SourceLocation>,
    pub message: String,
    /// Originating module, event or slot.
    pub context: Option<String>,
}

impl ScriptDiagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            location: None,
            message: message.into(),
            context: None,
        }
    }

    /// Diagnostic for a guarded member access naming both type and member.
    pub fn member_access(type_name: &str, key: &str, access: MemberAccess) -> Self {
        let message = match access {
            MemberAccess::Read => {
                format!("Attempted to access \"{}\" in type \"{}\"", key, type_name)
            }
            MemberAccess::Write => {
                format!("Attempted to assign to \"{}\" in type \"{}\"", key, type_name)
            }
            MemberAccess::ReadOnlyWrite => format!(
                "Attempted to assign to \"{}\" in type \"{}\": \"{}\" is read-only",
                key, type_name, key
            ),
        };
        Self::new(DiagnosticKind::Access, message)
    }

    pub fn at(mut self, location: Option<SourceLocation>) -> Self {
        self.location = location;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl fmt::Display for ScriptDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "[Script Error] in {}\n{}", location, self.message)?,
            None => write!(f, "[Script Error] {}", self.message)?,
        }
        if let Some(context) = &self.context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}
