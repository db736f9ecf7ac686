use serde_json::Value;

use crate::error::{ResolveError, ResolveResult};

pub const DESCRIPTOR_FILE: &str = "package.json";

/// The parts of a package descriptor the resolver cares about.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackageDescriptor {
    main: Option<String>,
}

impl PackageDescriptor {
    /// Parse descriptor text. Invalid JSON is fatal; a document that is not an
    /// object, or whose `main` is missing, empty or not a string, simply has
    /// no main.
    pub fn parse(text: &str, path: &str) -> ResolveResult<Self> {
        let value: Value =
            serde_json::from_str(text).map_err(|source| ResolveError::MalformedDescriptor {
                path: path.to_string(),
                source,
            })?;
        let main = value
            .get("main")
            .and_then(Value::as_str)
            .filter(|main| !main.is_empty())
            .map(str::to_string);
        Ok(Self { main })
    }

    pub fn main(&self) -> Option<&str> {
        self.main.as_deref()
    }

    pub fn into_main(self) -> Option<String> {
        self.main
    }
}
