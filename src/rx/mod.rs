//! Charge receiver protocol
//!
//! The grammar driver never builds values itself. It pushes what it
//! recognizes into a [`Ucrx`]: primitives through the typed methods, lists
//! through `and` / `nested` / `end`, maps through `for_key` / `map`. A
//! receiver implements only the methods for the types it accepts; everything
//! else answers [`UcrxOutcome::Unsupported`] and the [`UcrxPush`] helpers fall
//! back to [`Ucrx::any`] before rejecting with `unexpectedType`.

mod handle;
mod map;
mod opaque;
mod value;

pub use handle::{UcrxHandle, UcrxHandleState};
pub use map::{UcMapRx, UcTypedRx};
pub use opaque::OpaqueUcrx;
pub use value::UcValueRx;

use crate::error::{UcPathStep, UcrxRejection, UcrxRejectionCode};
use crate::value::UcValue;
use num_bigint::BigInt;
use smallvec::SmallVec;

/// Result of pushing something into a receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UcrxOutcome {
    /// The receiver took the value
    Accepted,
    /// The receiver does not implement this method; try a fallback
    Unsupported,
    /// The receiver reported a rejection through the context
    Rejected,
}

impl UcrxOutcome {
    pub fn is_accepted(self) -> bool {
        self == UcrxOutcome::Accepted
    }
}

/// Per-parse receiver context: current path and rejections raised so far
#[derive(Debug, Default)]
pub struct UcrxContext {
    path: SmallVec<[UcPathStep; 8]>,
    rejections: Vec<UcrxRejection>,
}

impl UcrxContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path from the document root to the value being received
    pub fn path(&self) -> &[UcPathStep] {
        &self.path
    }

    /// Descends into a map entry or list item
    pub fn enter(&mut self, step: UcPathStep) {
        self.path.push(step);
    }

    /// Returns from the innermost entry or item
    pub fn leave(&mut self) {
        self.path.pop();
    }

    /// Records a rejection at the current path
    pub fn reject(&mut self, rejection: UcrxRejection) -> UcrxOutcome {
        let rejection = rejection.at(&self.path);
        self.rejections.push(rejection);
        UcrxOutcome::Rejected
    }

    /// Number of rejections waiting to be funneled to the reader
    pub fn pending(&self) -> usize {
        self.rejections.len()
    }

    /// Most recent pending rejection
    pub fn last_rejection(&self) -> Option<&UcrxRejection> {
        self.rejections.last()
    }

    /// Drains pending rejections
    pub fn take_rejections(&mut self) -> Vec<UcrxRejection> {
        std::mem::take(&mut self.rejections)
    }
}

/// Charge receiver
///
/// Every method has a default returning [`UcrxOutcome::Unsupported`] (or
/// `None` for the methods producing nested receivers), so implementations
/// only spell out what they accept.
pub trait Ucrx {
    /// Names of the value types this receiver accepts, for error messages
    fn types(&self) -> &'static [&'static str];

    fn bol(&mut self, _value: bool, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    fn big(&mut self, _value: &BigInt, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    fn num(&mut self, _value: f64, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    fn str(&mut self, _value: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    fn nul(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    /// Entity text, including the leading `!`
    fn ent(&mut self, _entity: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    /// Formatted data (`!format'name(data)`)
    fn fmt(&mut self, _format: &str, _data: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    /// Fallback for any value the typed methods did not accept
    fn any(&mut self, _value: &UcValue, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    /// Announces that the value is a list
    fn and(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }

    /// Receiver for the next list item
    fn nested(&mut self, _cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        None
    }

    /// Closes a list opened by [`Ucrx::and`]
    fn end(&mut self, _cx: &mut UcrxContext) {}

    /// Receiver for a map entry value
    ///
    /// Returning `None` without a rejection means the receiver does not accept
    /// maps at all.
    fn for_key(&mut self, _key: &str, _cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        None
    }

    /// Closes a map
    fn map(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Unsupported
    }
}

/// Where a map entry value goes
pub enum UcrxKeyTarget<'a> {
    /// Receiver for the entry value
    Entry(&'a mut dyn Ucrx),
    /// The entry was rejected; its value should be skipped
    Skip,
    /// The receiver is not a map; the rest of the map should be skipped
    NotMap,
}

/// Push helpers applying the `any` fallback and the rejection rules
pub trait UcrxPush: Ucrx {
    fn push_bool(&mut self, value: bool, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.bol(value, cx) {
            UcrxOutcome::Unsupported => self.push_any(UcValue::Bool(value), cx),
            outcome => outcome,
        }
    }

    fn push_number(&mut self, value: f64, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.num(value, cx) {
            UcrxOutcome::Unsupported => self.push_any(UcValue::Number(value), cx),
            outcome => outcome,
        }
    }

    fn push_bigint(&mut self, value: &BigInt, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.big(value, cx) {
            UcrxOutcome::Unsupported => self.push_any(UcValue::BigInt(value.clone()), cx),
            outcome => outcome,
        }
    }

    fn push_string(&mut self, value: &str, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.str(value, cx) {
            UcrxOutcome::Unsupported => self.push_any(UcValue::String(value.to_string()), cx),
            outcome => outcome,
        }
    }

    fn push_null(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.nul(cx) {
            UcrxOutcome::Unsupported => self.push_any(UcValue::Null, cx),
            outcome => outcome,
        }
    }

    fn push_entity(&mut self, entity: &str, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.ent(entity, cx) {
            UcrxOutcome::Unsupported => {
                match self.any(&UcValue::Entity(entity.to_string()), cx) {
                    UcrxOutcome::Unsupported => {
                        cx.reject(UcrxRejection::unrecognized_entity(entity))
                    }
                    outcome => outcome,
                }
            }
            outcome => outcome,
        }
    }

    fn push_format(&mut self, format: &str, data: &str, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.fmt(format, data, cx) {
            UcrxOutcome::Unsupported => {
                let value = UcValue::Formatted {
                    format: format.to_string(),
                    data: data.to_string(),
                };
                match self.any(&value, cx) {
                    UcrxOutcome::Unsupported => {
                        cx.reject(UcrxRejection::unrecognized_format(format))
                    }
                    outcome => outcome,
                }
            }
            outcome => outcome,
        }
    }

    /// Announces a list, rejecting receivers that do not take lists
    fn push_list(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.and(cx) {
            UcrxOutcome::Unsupported => {
                let types = self.types();
                cx.reject(UcrxRejection::unexpected_type("list", types))
            }
            outcome => outcome,
        }
    }

    /// Pushes `!!`
    fn push_empty_list(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        let outcome = self.push_list(cx);
        if outcome.is_accepted() {
            self.end(cx);
        }
        outcome
    }

    /// Closes a map, rejecting receivers that do not take maps
    fn push_map_end(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.map(cx) {
            UcrxOutcome::Unsupported => {
                let types = self.types();
                cx.reject(UcrxRejection::unexpected_type("map", types))
            }
            outcome => outcome,
        }
    }

    /// Resolves the receiver for a map entry
    fn enter_key(&mut self, key: &str, cx: &mut UcrxContext) -> UcrxKeyTarget<'_> {
        let types = self.types();
        let pending = cx.pending();

        match self.for_key(key, cx) {
            Some(entry_rx) => UcrxKeyTarget::Entry(entry_rx),
            None if cx.pending() == pending => {
                cx.reject(UcrxRejection::unexpected_type("map", types));
                UcrxKeyTarget::NotMap
            }
            None => match cx.last_rejection() {
                Some(rejection) if rejection.code == UcrxRejectionCode::UnexpectedType => {
                    UcrxKeyTarget::NotMap
                }
                _ => UcrxKeyTarget::Skip,
            },
        }
    }

    /// Falls back to [`Ucrx::any`], then rejects with `unexpectedType`
    fn push_any(&mut self, value: UcValue, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.any(&value, cx) {
            UcrxOutcome::Unsupported => {
                let types = self.types();
                cx.reject(UcrxRejection::unexpected_type(value.type_name(), types))
            }
            outcome => outcome,
        }
    }
}

impl<T: Ucrx + ?Sized> UcrxPush for T {}
