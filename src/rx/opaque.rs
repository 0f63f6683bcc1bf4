use super::{Ucrx, UcrxContext, UcrxOutcome};
use crate::value::UcValue;
use num_bigint::BigInt;

/// Receiver that accepts and discards everything
///
/// Rejected subtrees are routed here so the surrounding document is still
/// checked for structural validity.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpaqueUcrx;

impl Ucrx for OpaqueUcrx {
    fn types(&self) -> &'static [&'static str] {
        &["any"]
    }

    fn bol(&mut self, _value: bool, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn big(&mut self, _value: &BigInt, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn num(&mut self, _value: f64, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn str(&mut self, _value: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn nul(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn ent(&mut self, _entity: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn fmt(&mut self, _format: &str, _data: &str, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn any(&mut self, _value: &UcValue, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn and(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }

    fn nested(&mut self, _cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        Some(self)
    }

    fn for_key(&mut self, _key: &str, _cx: &mut UcrxContext) -> Option<&mut dyn Ucrx> {
        Some(self)
    }

    fn map(&mut self, _cx: &mut UcrxContext) -> UcrxOutcome {
        UcrxOutcome::Accepted
    }
}
