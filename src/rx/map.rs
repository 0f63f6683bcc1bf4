use super::{UcValueRx, Ucrx, UcrxContext, UcrxOutcome};
use crate::error::UcrxRejection;
use crate::value::UcValue;
use indexmap::IndexMap;
use num_bigint::BigInt;

/// Value builder restricted to a set of type names
///
/// Type names are those of [`UcValue::type_name`]; `"any"` accepts
/// everything. When `"list"` is accepted, a value of a refused type is taken
/// as the only item of a list, which later items extend.
#[derive(Debug)]
pub struct UcTypedRx {
    types: &'static [&'static str],
    inner: UcValueRx,
    /// The inner list holds a lone value as item 0
    single_item: bool,
}

impl UcTypedRx {
    pub fn new(types: &'static [&'static str]) -> Self {
        Self {
            types,
            inner: UcValueRx::new(),
            single_item: false,
        }
    }

    pub fn into_value(self) -> Option<UcValue> {
        self.inner.into_value()
    }

    fn accepts(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| *t == type_name || *t == "any")
    }

    /// Receiver for a value whose type is refused, if lists are accepted
    fn list_item(&mut self, cx: &mut UcrxContext) -> Option<&mut UcValueRx> {
        if !self.single_item {
            if !self.accepts("list") || !self.inner.is_empty() {
                return None;
            }
            self.inner.and(cx);
            self.inner.nested(cx);
            self.single_item = true;
        }
        self.inner.last_item()
    }

    fn route(
        &mut self,
        type_name: &str,
        cx: &mut UcrxContext,
        push: impl FnOnce(&mut UcValueRx, &mut UcrxContext) -> UcrxOutcome,
    ) -> UcrxOutcome {
        if self.accepts(type_name) {
            return push(&mut self.inner, cx);
        }
        match self.list_item(cx) {
            Some(item) => push(item, cx),
            None => UcrxOutcome::Unsupported,
        }
    }
}

impl Ucrx for UcTypedRx {
    fn types(&self) -> &'static [&'static str] {
        self.types
    }

    fn bol(&mut self, value: bool, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("boolean", cx, |rx, cx| rx.bol(value, cx))
    }

    fn big(&mut self, value: &BigInt, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("bigint", cx, |rx, cx| rx.big(value, cx))
    }

    fn num(&mut self, value: f64, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("number", cx, |rx, cx| rx.num(value, cx))
    }

    fn str(&mut self, value: &str, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("string", cx, |rx, cx| rx.str(value, cx))
    }

    fn nul(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("null", cx, |rx, cx| rx.nul(cx))
    }

    fn ent(&mut self, entity: &str, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("entity", cx, |rx, cx| rx.ent(entity, cx))
    }

    fn fmt(&mut self, format: &str, data: &str, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("format", cx, |rx, cx| rx.fmt(format, data, cx))
    }

    fn any(&mut self, value: &UcValue, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route(value.type_name(), cx, |rx, cx| rx.any(value, cx))
    }

    fn and(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        if !self.accepts("list") {
            return UcrxOutcome::Unsupported;
        }
        if self.single_item {
            // The open list already holds the lone value
            self.single_item = false;
            return UcrxOutcome::Accepted;
        }
        self.inner.and(cx)
    }

    fn nested(&mut self, cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        self.inner.nested(cx)
    }

    fn end(&mut self, cx: &mut UcrxContext) {
        self.inner.end(cx)
    }

    fn for_key(&mut self, key: &str, cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        if self.accepts("map") {
            return self.inner.for_key(key, cx);
        }
        self.list_item(cx)?.for_key(key, cx)
    }

    fn map(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        self.route("map", cx, |rx, cx| rx.map(cx))
    }
}

#[derive(Debug)]
struct UcMapEntry {
    rx: UcTypedRx,
    required: bool,
    present: bool,
}

/// Map receiver with declared entries
///
/// Declared entries are typed; required ones missing at map end are reported
/// once as `missingEntries`. Unknown keys are rejected as `unexpectedEntry`
/// unless the map is [`UcMapRx::open`].
#[derive(Debug, Default)]
pub struct UcMapRx {
    entries: IndexMap<String, UcMapEntry>,
    extra: Option<IndexMap<String, UcValueRx>>,
}

impl UcMapRx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares an optional entry
    pub fn entry(mut self, key: impl Into<String>, types: &'static [&'static str]) -> Self {
        self.entries.insert(
            key.into(),
            UcMapEntry {
                rx: UcTypedRx::new(types),
                required: false,
                present: false,
            },
        );
        self
    }

    /// Declares a required entry
    pub fn required(mut self, key: impl Into<String>, types: &'static [&'static str]) -> Self {
        self.entries.insert(
            key.into(),
            UcMapEntry {
                rx: UcTypedRx::new(types),
                required: true,
                present: false,
            },
        );
        self
    }

    /// Accepts undeclared keys with any value
    pub fn open(mut self) -> Self {
        self.extra.get_or_insert_with(IndexMap::new);
        self
    }

    /// Declared entries first, then undeclared ones
    pub fn into_value(self) -> UcValue {
        let mut map = IndexMap::new();
        for (key, entry) in self.entries {
            if let Some(value) = entry.rx.into_value() {
                map.insert(key, value);
            }
        }
        for (key, rx) in self.extra.unwrap_or_default() {
            if let Some(value) = rx.into_value() {
                map.insert(key, value);
            }
        }
        UcValue::Map(map)
    }
}

impl Ucrx for UcMapRx {
    fn types(&self) -> &'static [&'static str] {
        &["map"]
    }

    fn for_key(&mut self, key: &str, cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.present = true;
            entry.rx = UcTypedRx::new(entry.rx.types);
            return Some(&mut entry.rx);
        }

        match &mut self.extra {
            Some(extra) => {
                let slot = extra.entry(key.to_string()).or_default();
                *slot = UcValueRx::new();
                Some(slot)
            }
            None => {
                cx.reject(UcrxRejection::unexpected_entry(key));
                None
            }
        }
    }

    fn map(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        let missing: Vec<&str> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.required && !entry.present)
            .map(|(key, _)| key.as_str())
            .collect();

        if missing.is_empty() {
            UcrxOutcome::Accepted
        } else {
            cx.reject(UcrxRejection::missing_entries(missing))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{UcrxRejectionCode, UcrxRejectionDetails};
    use crate::rx::{UcrxKeyTarget, UcrxPush};

    #[test]
    fn test_missing_entries_reported_once() {
        let mut rx = UcMapRx::new()
            .required("id", &["number"])
            .required("name", &["string"])
            .entry("note", &["string"]);
        let mut cx = UcrxContext::new();

        if let UcrxKeyTarget::Entry(id) = rx.enter_key("id", &mut cx) {
            id.push_number(7.0, &mut cx);
        }
        assert_eq!(rx.push_map_end(&mut cx), UcrxOutcome::Rejected);

        let rejections = cx.take_rejections();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].code, UcrxRejectionCode::MissingEntries);
        assert_eq!(
            rejections[0].details,
            UcrxRejectionDetails::Entries(vec!["name".to_string()])
        );
    }

    #[test]
    fn test_unexpected_entry_is_skipped() {
        let mut rx = UcMapRx::new().entry("a", &["any"]);
        let mut cx = UcrxContext::new();

        assert!(matches!(rx.enter_key("b", &mut cx), UcrxKeyTarget::Skip));
        assert_eq!(
            cx.last_rejection().map(|r| r.code),
            Some(UcrxRejectionCode::UnexpectedEntry)
        );
    }

    #[test]
    fn test_open_map_keeps_extra_keys() {
        let mut rx = UcMapRx::new().entry("a", &["number"]).open();
        let mut cx = UcrxContext::new();

        if let UcrxKeyTarget::Entry(b) = rx.enter_key("b", &mut cx) {
            b.push_string("x", &mut cx);
        }
        if let UcrxKeyTarget::Entry(a) = rx.enter_key("a", &mut cx) {
            a.push_number(1.0, &mut cx);
        }
        rx.push_map_end(&mut cx);

        assert_eq!(
            rx.into_value(),
            UcValue::map([("a", UcValue::Number(1.0)), ("b", UcValue::from("x"))])
        );
    }

    #[test]
    fn test_list_entry_takes_lone_value_as_item() {
        let mut rx = UcTypedRx::new(&["list"]);
        let mut cx = UcrxContext::new();

        assert_eq!(rx.push_string("a", &mut cx), UcrxOutcome::Accepted);
        assert_eq!(rx.push_list(&mut cx), UcrxOutcome::Accepted);
        rx.nested(&mut cx).unwrap().push_string("b", &mut cx);
        rx.end(&mut cx);

        assert_eq!(cx.pending(), 0);
        assert_eq!(
            rx.into_value(),
            Some(UcValue::list([UcValue::from("a"), UcValue::from("b")]))
        );
    }

    #[test]
    fn test_list_entry_takes_lone_map_as_item() {
        let mut rx = UcTypedRx::new(&["list"]);
        let mut cx = UcrxContext::new();

        if let UcrxKeyTarget::Entry(host) = rx.enter_key("host", &mut cx) {
            host.push_string("a", &mut cx);
        }
        rx.push_map_end(&mut cx);

        assert_eq!(cx.pending(), 0);
        assert_eq!(
            rx.into_value(),
            Some(UcValue::list([UcValue::map([("host", UcValue::from("a"))])]))
        );
    }
}
