//! Connection options and compatibility levels.

use crate::attribute::ErrorMode;
use crate::fetch::FetchMode;
use crate::object::{ClassDef, ClassRegistry};

/// Which generation of the reference MySQL-API driver to emulate.
///
/// The generations differ in how BOTH rows are laid out, whether native
/// scalar types survive fetching, whether an explicit null fetch mode is
/// accepted, and in the default error mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompatLevel {
    /// 7.x series
    V7,
    /// 8.0 series
    V80,
    /// 8.1 and later
    #[default]
    V81,
}

impl CompatLevel {
    /// Does the engine hand back native integers and floats?
    ///
    /// Older generations always return text, whatever the stringify flag says.
    pub fn native_types(self) -> bool {
        self >= CompatLevel::V81
    }

    /// BOTH rows append every column under the next free integer key.
    pub fn sequential_both_keys(self) -> bool {
        self == CompatLevel::V7
    }

    /// Is an explicit null fetch mode a synonym for "use the default"?
    pub fn accepts_null_mode(self) -> bool {
        self >= CompatLevel::V81
    }

    pub fn default_error_mode(self) -> ErrorMode {
        match self {
            CompatLevel::V7 => ErrorMode::Silent,
            CompatLevel::V80 | CompatLevel::V81 => ErrorMode::Exception,
        }
    }
}

/// Options applied when a connection is opened.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub compat: CompatLevel,
    /// Defaults to the compatibility level's error mode
    pub error_mode: Option<ErrorMode>,
    pub default_fetch_mode: FetchMode,
    pub stringify_fetches: bool,
    pub read_only: bool,
    pub busy_timeout_ms: u32,
    pub classes: ClassRegistry,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            compat: CompatLevel::default(),
            error_mode: None,
            default_fetch_mode: FetchMode::Both,
            stringify_fetches: true,
            read_only: false,
            busy_timeout_ms: 5000,
            classes: ClassRegistry::default(),
        }
    }
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compat(mut self, compat: CompatLevel) -> Self {
        self.compat = compat;
        self
    }

    pub fn error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = Some(mode);
        self
    }

    pub fn default_fetch_mode(mut self, mode: FetchMode) -> Self {
        self.default_fetch_mode = mode;
        self
    }

    pub fn stringify_fetches(mut self, stringify: bool) -> Self {
        self.stringify_fetches = stringify;
        self
    }

    /// Open the storage read-only; the file must already exist.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }

    /// Replace the class registry used by CLASS fetches.
    pub fn classes(mut self, classes: ClassRegistry) -> Self {
        self.classes = classes;
        self
    }

    /// Register one more class for CLASS fetches.
    pub fn class(mut self, class: ClassDef) -> Self {
        self.classes.register(class);
        self
    }

    pub(crate) fn effective_error_mode(&self) -> ErrorMode {
        self.error_mode
            .unwrap_or_else(|| self.compat.default_error_mode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compat_capabilities() {
        assert!(CompatLevel::V81.native_types());
        assert!(!CompatLevel::V80.native_types());
        assert!(CompatLevel::V7.sequential_both_keys());
        assert!(!CompatLevel::V80.sequential_both_keys());
        assert!(!CompatLevel::V80.accepts_null_mode());
        assert_eq!(CompatLevel::default(), CompatLevel::V81);
    }

    #[test]
    fn test_error_mode_defaults() {
        assert_eq!(ConnectOptions::new().effective_error_mode(), ErrorMode::Exception);
        let legacy = ConnectOptions::new().compat(CompatLevel::V7);
        assert_eq!(legacy.effective_error_mode(), ErrorMode::Silent);
        let explicit = legacy.error_mode(ErrorMode::Warning);
        assert_eq!(explicit.effective_error_mode(), ErrorMode::Warning);
    }

    #[test]
    fn test_builder_registers_classes() {
        let options = ConnectOptions::new()
            .class(ClassDef::new("Row"))
            .stringify_fetches(false)
            .busy_timeout(10);
        assert!(options.classes.contains("row"));
        assert!(!options.stringify_fetches);
        assert_eq!(options.busy_timeout_ms, 10);
    }
}
