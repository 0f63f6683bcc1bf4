//! Extension registry: entities, entity prefixes, directives and formats
//!
//! The grammar consults the registry whenever it meets a `!`-prefixed value
//! it does not recognize itself. Handlers push whatever they produce straight
//! into the receiver of the value position. Closures with a matching
//! signature implement the handler traits, so simple extensions need no
//! dedicated types.

use crate::rx::{Ucrx, UcrxContext, UcrxOutcome, UcrxPush};
use crate::value::UcValue;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Handler of entities matched exactly or by prefix
pub trait UcEntityHandler: Send + Sync {
    /// Handles an entity
    ///
    /// Exact-match handlers receive the whole entity, prefix handlers the
    /// part after the prefix. Returning [`UcrxOutcome::Unsupported`] passes
    /// the entity to the next matching handler.
    fn handle(&self, rx: &mut dyn Ucrx, cx: &mut UcrxContext, entity: &str) -> UcrxOutcome;

    /// Returns a description of the entities this handler supports
    fn description(&self) -> &str {
        "Custom entity handler"
    }
}

impl<F> UcEntityHandler for F
where
    F: Fn(&mut dyn Ucrx, &mut UcrxContext, &str) -> UcrxOutcome + Send + Sync,
{
    fn handle(&self, rx: &mut dyn Ucrx, cx: &mut UcrxContext, entity: &str) -> UcrxOutcome {
        self(rx, cx, entity)
    }
}

/// Handler of `!name(args)value` directives
pub trait UcDirectiveHandler: Send + Sync {
    /// Handles a directive given its parsed arguments and raw trailing value
    fn handle(
        &self,
        rx: &mut dyn Ucrx,
        cx: &mut UcrxContext,
        args: &UcValue,
        value: &str,
    ) -> UcrxOutcome;

    fn description(&self) -> &str {
        "Custom directive handler"
    }
}

impl<F> UcDirectiveHandler for F
where
    F: Fn(&mut dyn Ucrx, &mut UcrxContext, &UcValue, &str) -> UcrxOutcome + Send + Sync,
{
    fn handle(
        &self,
        rx: &mut dyn Ucrx,
        cx: &mut UcrxContext,
        args: &UcValue,
        value: &str,
    ) -> UcrxOutcome {
        self(rx, cx, args, value)
    }
}

/// Handler of `!format'name(data)` values
pub trait UcFormatHandler: Send + Sync {
    /// Handles the raw data of a formatted value
    fn handle(&self, rx: &mut dyn Ucrx, cx: &mut UcrxContext, data: &str) -> UcrxOutcome;

    fn description(&self) -> &str {
        "Custom format handler"
    }
}

impl<F> UcFormatHandler for F
where
    F: Fn(&mut dyn Ucrx, &mut UcrxContext, &str) -> UcrxOutcome + Send + Sync,
{
    fn handle(&self, rx: &mut dyn Ucrx, cx: &mut UcrxContext, data: &str) -> UcrxOutcome {
        self(rx, cx, data)
    }
}

/// Bundle of related registrations
pub trait UcExtension {
    /// Returns the name of the extension
    fn name(&self) -> &str;

    /// Returns a description of what the extension adds
    fn description(&self) -> &str {
        "URI Charge extension"
    }

    /// Registers the extension's handlers
    fn register(&self, extensions: &mut UcExtensions);
}

/// Extension registry
pub struct UcExtensions {
    entities: HashMap<String, Box<dyn UcEntityHandler>>,
    /// Longest prefix first; first registered first within the same length
    prefixes: Vec<(String, Box<dyn UcEntityHandler>)>,
    directives: HashMap<String, Box<dyn UcDirectiveHandler>>,
    formats: HashMap<String, Box<dyn UcFormatHandler>>,
}

impl fmt::Debug for UcExtensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entities: Vec<&String> = self.entities.keys().collect();
        entities.sort();
        let mut directives: Vec<&String> = self.directives.keys().collect();
        directives.sort();
        let mut formats: Vec<&String> = self.formats.keys().collect();
        formats.sort();

        f.debug_struct("UcExtensions")
            .field("entities", &entities)
            .field(
                "prefixes",
                &self.prefixes.iter().map(|(p, _)| p).collect::<Vec<_>>(),
            )
            .field("directives", &directives)
            .field("formats", &formats)
            .finish()
    }
}

impl Default for UcExtensions {
    /// Registry with the standard number entities
    fn default() -> Self {
        let mut extensions = Self::empty();
        extensions.add_entity("!Infinity", |rx, cx, _| rx.push_number(f64::INFINITY, cx));
        extensions.add_entity("!-Infinity", |rx, cx, _| {
            rx.push_number(f64::NEG_INFINITY, cx)
        });
        extensions.add_entity("!NaN", |rx, cx, _| rx.push_number(f64::NAN, cx));
        extensions
    }
}

impl UcExtensions {
    /// Registry without any handlers
    pub fn empty() -> Self {
        Self {
            entities: HashMap::new(),
            prefixes: Vec::new(),
            directives: HashMap::new(),
            formats: HashMap::new(),
        }
    }

    /// Registers an exact-match entity handler, e.g. for `!now`
    pub fn add_entity<F>(&mut self, entity: impl Into<String>, handler: F)
    where
        F: Fn(&mut dyn Ucrx, &mut UcrxContext, &str) -> UcrxOutcome + Send + Sync + 'static,
    {
        self.add_entity_handler(entity, Box::new(handler));
    }

    pub fn add_entity_handler(&mut self, entity: impl Into<String>, handler: Box<dyn UcEntityHandler>) {
        self.entities.insert(entity.into(), handler);
    }

    /// Registers a prefix handler, e.g. for `!date:`
    pub fn add_prefix<F>(&mut self, prefix: impl Into<String>, handler: F)
    where
        F: Fn(&mut dyn Ucrx, &mut UcrxContext, &str) -> UcrxOutcome + Send + Sync + 'static,
    {
        self.add_prefix_handler(prefix, Box::new(handler));
    }

    pub fn add_prefix_handler(&mut self, prefix: impl Into<String>, handler: Box<dyn UcEntityHandler>) {
        self.prefixes.push((prefix.into(), handler));
        // Stable: registration order is kept within a length class
        self.prefixes.sort_by_key(|(prefix, _)| Reverse(prefix.len()));
    }

    /// Registers a directive handler by its name including `!`, e.g. `!plus`
    pub fn add_directive<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut dyn Ucrx, &mut UcrxContext, &UcValue, &str) -> UcrxOutcome
            + Send
            + Sync
            + 'static,
    {
        self.add_directive_handler(name, Box::new(handler));
    }

    pub fn add_directive_handler(
        &mut self,
        name: impl Into<String>,
        handler: Box<dyn UcDirectiveHandler>,
    ) {
        self.directives.insert(name.into(), handler);
    }

    /// Registers a format handler by format name, e.g. `base64`
    pub fn add_format<F>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut dyn Ucrx, &mut UcrxContext, &str) -> UcrxOutcome + Send + Sync + 'static,
    {
        self.add_format_handler(name, Box::new(handler));
    }

    pub fn add_format_handler(&mut self, name: impl Into<String>, handler: Box<dyn UcFormatHandler>) {
        self.formats.insert(name.into(), handler);
    }

    /// Registers an extension bundle
    pub fn add_extension(&mut self, extension: &dyn UcExtension) {
        trace!(
            extension = extension.name(),
            description = extension.description(),
            "registering extension"
        );
        extension.register(self);
    }

    /// Builder-style [`UcExtensions::add_extension`]
    pub fn with_extension<E: UcExtension>(mut self, extension: E) -> Self {
        self.add_extension(&extension);
        self
    }

    /// Offers an entity to the matching handlers
    ///
    /// The exact-match handler goes first, then prefix handlers from the
    /// longest prefix down. Returns [`UcrxOutcome::Unsupported`] when nobody
    /// claimed the entity.
    pub fn handle_entity(&self, entity: &str, rx: &mut dyn Ucrx, cx: &mut UcrxContext) -> UcrxOutcome {
        if let Some(handler) = self.entities.get(entity) {
            match handler.handle(rx, cx, entity) {
                UcrxOutcome::Unsupported => {}
                outcome => return outcome,
            }
        }

        for (prefix, handler) in &self.prefixes {
            if let Some(rest) = entity.strip_prefix(prefix.as_str()) {
                match handler.handle(rx, cx, rest) {
                    UcrxOutcome::Unsupported => {}
                    outcome => return outcome,
                }
            }
        }

        UcrxOutcome::Unsupported
    }

    pub fn directive(&self, name: &str) -> Option<&dyn UcDirectiveHandler> {
        self.directives.get(name).map(|handler| handler.as_ref())
    }

    pub fn format(&self, name: &str) -> Option<&dyn UcFormatHandler> {
        self.formats.get(name).map(|handler| handler.as_ref())
    }

    pub fn has_directive(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rx::UcValueRx;

    fn tag(label: &'static str) -> impl Fn(&mut dyn Ucrx, &mut UcrxContext, &str) -> UcrxOutcome {
        move |rx, cx, rest| rx.push_string(&format!("{}:{}", label, rest), cx)
    }

    fn handle(extensions: &UcExtensions, entity: &str) -> Option<UcValue> {
        let mut rx = UcValueRx::new();
        let mut cx = UcrxContext::new();
        extensions.handle_entity(entity, &mut rx, &mut cx);
        rx.into_value()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut extensions = UcExtensions::empty();
        extensions.add_prefix("!test:", tag("short"));
        extensions.add_prefix("!test:longer:", tag("long"));

        assert_eq!(
            handle(&extensions, "!test:longer:value"),
            Some(UcValue::from("long:value"))
        );
        assert_eq!(
            handle(&extensions, "!test:other"),
            Some(UcValue::from("short:other"))
        );
    }

    #[test]
    fn test_first_registered_wins_within_length() {
        let mut extensions = UcExtensions::empty();
        extensions.add_prefix("!ab", tag("first"));
        extensions.add_prefix("!ab", tag("second"));

        assert_eq!(handle(&extensions, "!abc"), Some(UcValue::from("first:c")));
    }

    #[test]
    fn test_unsupported_passes_to_next_prefix() {
        let mut extensions = UcExtensions::empty();
        extensions.add_prefix("!x:", tag("general"));
        extensions.add_prefix("!x:y:", |_rx: &mut dyn Ucrx, _cx: &mut UcrxContext, _rest: &str| {
            UcrxOutcome::Unsupported
        });

        assert_eq!(handle(&extensions, "!x:y:z"), Some(UcValue::from("general:y:z")));
    }

    #[test]
    fn test_exact_entity_before_prefix() {
        let mut extensions = UcExtensions::empty();
        extensions.add_prefix("!a", tag("prefix"));
        extensions.add_entity("!ab", tag("exact"));

        assert_eq!(handle(&extensions, "!ab"), Some(UcValue::from("exact:!ab")));
        assert_eq!(handle(&extensions, "!abc"), Some(UcValue::from("prefix:bc")));
        assert_eq!(handle(&extensions, "!zzz"), None);
    }

    #[test]
    fn test_default_number_entities() {
        let extensions = UcExtensions::default();
        assert_eq!(
            handle(&extensions, "!Infinity"),
            Some(UcValue::Number(f64::INFINITY))
        );
        match handle(&extensions, "!NaN") {
            Some(UcValue::Number(value)) => assert!(value.is_nan()),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(handle(&UcExtensions::empty(), "!NaN"), None);
    }

    struct Units;

    impl UcExtension for Units {
        fn name(&self) -> &str {
            "units"
        }

        fn register(&self, extensions: &mut UcExtensions) {
            extensions.add_prefix("!px:", |rx, cx, rest| match rest.parse::<f64>() {
                Ok(value) => rx.push_number(value, cx),
                Err(_) => UcrxOutcome::Unsupported,
            });
        }
    }

    #[test]
    fn test_extension_bundle() {
        let extensions = UcExtensions::empty().with_extension(Units);
        assert_eq!(handle(&extensions, "!px:12"), Some(UcValue::Number(12.0)));
        assert_eq!(handle(&extensions, "!px:big"), None);
    }
}
