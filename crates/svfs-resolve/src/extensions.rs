//! Extension registry and the built-in module handlers.
//!
//! The registry's order is the probe order used when a specifier names no
//! extension. Each extension maps to an [`ExtensionHandler`] that turns file
//! text into a [`LoadedModule`].

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ResolveError, ResolveResult};

const BOM: char = '\u{feff}';

/// A module produced by an extension handler.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LoadedModule {
    /// Program text ready to be compiled by the host.
    Program { filename: String, source: String },
    /// A parsed structured-data document.
    Data { filename: String, value: Value },
}

impl LoadedModule {
    pub fn filename(&self) -> &str {
        match self {
            Self::Program { filename, .. } | Self::Data { filename, .. } => filename,
        }
    }
}

/// Turns the text of a file into a module.
pub trait ExtensionHandler: Send + Sync {
    fn compile(&self, filename: &str, text: &str) -> ResolveResult<LoadedModule>;
}

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix(BOM).unwrap_or(text)
}

/// Handler for `.js`: hands back the text without its byte-order mark.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProgramText;

impl ExtensionHandler for ProgramText {
    fn compile(&self, filename: &str, text: &str) -> ResolveResult<LoadedModule> {
        Ok(LoadedModule::Program {
            filename: filename.to_string(),
            source: strip_bom(text).to_string(),
        })
    }
}

/// Handler for `.json`: parses the text, errors carry the filename.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuredData;

impl ExtensionHandler for StructuredData {
    fn compile(&self, filename: &str, text: &str) -> ResolveResult<LoadedModule> {
        let value = serde_json::from_str(strip_bom(text)).map_err(|source| {
            ResolveError::MalformedDocument {
                path: filename.to_string(),
                source,
            }
        })?;
        Ok(LoadedModule::Data {
            filename: filename.to_string(),
            value,
        })
    }
}

/// Ordered extension → handler table.
#[derive(Clone)]
pub struct Extensions {
    handlers: Vec<(String, Arc<dyn ExtensionHandler>)>,
}

impl Extensions {
    pub const DEFAULT_EXTENSION: &'static str = ".js";

    pub fn empty() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register `handler` for `extension`. Re-registering an extension keeps
    /// its original probe position.
    pub fn register(
        &mut self,
        extension: impl Into<String>,
        handler: impl ExtensionHandler + 'static,
    ) {
        let extension = extension.into();
        let handler: Arc<dyn ExtensionHandler> = Arc::new(handler);
        match self.handlers.iter_mut().find(|(ext, _)| *ext == extension) {
            Some(slot) => slot.1 = handler,
            None => self.handlers.push((extension, handler)),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(ext, _)| ext.as_str())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler for `filename`: the longest registered suffix wins, otherwise
    /// the `.js` handler when one is registered.
    pub fn handler_for(&self, filename: &str) -> Option<&dyn ExtensionHandler> {
        self.handlers
            .iter()
            .filter(|(ext, _)| filename.ends_with(ext.as_str()))
            .max_by_key(|(ext, _)| ext.len())
            .or_else(|| {
                self.handlers
                    .iter()
                    .find(|(ext, _)| ext == Self::DEFAULT_EXTENSION)
            })
            .map(|(_, handler)| handler.as_ref())
    }
}

impl Default for Extensions {
    fn default() -> Self {
        let mut extensions = Self::empty();
        extensions.register(".js", ProgramText);
        extensions.register(".json", StructuredData);
        extensions
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
