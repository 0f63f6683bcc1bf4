use super::{Ucrx, UcrxContext, UcrxOutcome};
use crate::value::UcValue;
use indexmap::IndexMap;
use num_bigint::BigInt;

/// Receiver building a generic [`UcValue`]
///
/// List items and entry values are received by child builders owned by this
/// one, so nested receivers can be handed out as plain `&mut` borrows.
///
/// A list announced with `and` after a value was received keeps that value
/// as item 0. This is how a single value turns into the first list item once
/// a second one shows up.
#[derive(Debug, Default)]
pub struct UcValueRx {
    state: UcValueState,
}

#[derive(Debug, Default)]
enum UcValueState {
    #[default]
    Empty,
    Value(UcValue),
    /// Items; `open` until `end`
    List { items: Vec<UcValueRx>, open: bool },
    Map(IndexMap<String, UcValueRx>),
}

impl UcValueRx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing was received
    pub fn is_empty(&self) -> bool {
        matches!(self.state, UcValueState::Empty)
    }

    /// Finishes building, returning `None` if nothing was received
    ///
    /// Items and entries whose builders received nothing (rejected or skipped
    /// subtrees) are left out.
    pub fn into_value(self) -> Option<UcValue> {
        match self.state {
            UcValueState::Empty => None,
            UcValueState::Value(value) => Some(value),
            UcValueState::List { items, .. } => Some(UcValue::list(
                items.into_iter().filter_map(UcValueRx::into_value),
            )),
            UcValueState::Map(entries) => Some(UcValue::Map(
                entries
                    .into_iter()
                    .filter_map(|(key, rx)| rx.into_value().map(|value| (key, value)))
                    .collect(),
            )),
        }
    }

    /// Receiver of the most recent list item
    pub(super) fn last_item(&mut self) -> Option<&mut UcValueRx> {
        match &mut self.state {
            UcValueState::List { items, .. } => items.last_mut(),
            _ => None,
        }
    }

    fn set(&mut self, value: UcValue) -> UcrxOutcome {
        self.state = UcValueState::Value(value);
        UcrxOutcome::Accepted
    }
}

impl Ucrx for UcValueRx {
    fn types(&self) -> &'static [&'static str] {
        &["any"]
    }

    fn bol(&mut self, value: bool, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(UcValue::Bool(value))
    }

    fn big(&mut self, value: &BigInt, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(UcValue::BigInt(value.clone()))
    }

    fn num(&mut self, value: f64, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(UcValue::Number(value))
    }

    fn str(&mut self, value: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(UcValue::String(value.to_string()))
    }

    fn nul(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(UcValue::Null)
    }

    fn ent(&mut self, entity: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(UcValue::Entity(entity.to_string()))
    }

    fn fmt(&mut self, format: &str, data: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(UcValue::Formatted {
            format: format.to_string(),
            data: data.to_string(),
        })
    }

    fn any(&mut self, value: &UcValue, _cx: &mut UcrxContext) -> UcrxOutcome {
        self.set(value.clone())
    }

    fn and(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        let items = match std::mem::take(&mut self.state) {
            UcValueState::Empty => Vec::new(),
            UcValueState::List { items, open: true } => items,
            received => vec![UcValueRx { state: received }],
        };
        self.state = UcValueState::List { items, open: true };
        UcrxOutcome::Accepted
    }

    fn nested(&mut self, _cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        match &mut self.state {
            UcValueState::List { items, .. } => {
                items.push(UcValueRx::new());
                items.last_mut().map(|item| item as &mut dyn Ucrx)
            }
            _ => None,
        }
    }

    fn end(&mut self, _cx: &mut UcrxContext) {
        if let UcValueState::List { open, .. } = &mut self.state {
            *open = false;
        }
    }

    fn for_key(&mut self, key: &str, _cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        if !matches!(self.state, UcValueState::Map(_)) {
            self.state = UcValueState::Map(IndexMap::new());
        }
        match &mut self.state {
            UcValueState::Map(entries) => {
                // Repeated keys override earlier values
                let slot = entries.entry(key.to_string()).or_default();
                *slot = UcValueRx::new();
                Some(slot)
            }
            _ => None,
        }
    }

    fn map(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        if !matches!(self.state, UcValueState::Map(_)) {
            self.state = UcValueState::Map(IndexMap::new());
        }
        UcrxOutcome::Accepted
    }
}
