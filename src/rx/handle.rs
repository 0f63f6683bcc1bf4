use super::{OpaqueUcrx, Ucrx, UcrxContext, UcrxOutcome, UcrxPush};
use crate::error::UcPathStep;

/// Single-value-or-list decision of a [`UcrxHandle`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum UcrxHandleState {
    /// Nothing received yet
    #[default]
    Undecided,
    /// One item pushed straight into the receiver; a single value unless another follows
    Single,
    /// The receiver was told this is a list; items go through `nested`
    List,
    /// The receiver refused the list; remaining items are discarded
    Rejected,
}

/// Wraps a receiver for a value context that may turn out to be a list
///
/// The first item goes straight into the receiver, so its rejections surface
/// before anything after it is read. A second item (or a comma) promotes the
/// context to a list: the receiver gets `and` and turns the value it holds
/// into item 0, and later items stream into `nested` receivers.
pub struct UcrxHandle<'r> {
    rx: &'r mut dyn Ucrx,
    state: UcrxHandleState,
    items: usize,
    in_item: bool,
    opaque: OpaqueUcrx,
}

impl<'r> UcrxHandle<'r> {
    pub fn new(rx: &'r mut dyn Ucrx) -> Self {
        Self {
            rx,
            state: UcrxHandleState::Undecided,
            items: 0,
            in_item: false,
            opaque: OpaqueUcrx,
        }
    }

    pub fn state(&self) -> UcrxHandleState {
        self.state
    }

    pub fn is_list(&self) -> bool {
        self.state == UcrxHandleState::List
    }

    /// Declares the context a list before any item arrives
    pub fn begin_list(&mut self, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.state {
            UcrxHandleState::Undecided => {
                let outcome = self.rx.push_list(cx);
                self.state = if outcome.is_accepted() {
                    UcrxHandleState::List
                } else {
                    UcrxHandleState::Rejected
                };
                outcome
            }
            UcrxHandleState::Single => {
                self.promote(cx);
                self.outcome()
            }
            _ => self.outcome(),
        }
    }

    /// Item separator seen
    pub fn separator(&mut self, cx: &mut UcrxContext) {
        match self.state {
            UcrxHandleState::Undecided => {
                self.begin_list(cx);
            }
            UcrxHandleState::Single => self.promote(cx),
            _ => {}
        }
    }

    /// Receiver for the next item
    ///
    /// Must be paired with [`UcrxHandle::leave_item`] once the item is read.
    pub fn item(&mut self, cx: &mut UcrxContext) -> &mut dyn Ucrx {
        self.in_item = false;
        match self.state {
            UcrxHandleState::Undecided => {
                self.state = UcrxHandleState::Single;
                return &mut *self.rx;
            }
            UcrxHandleState::Single => self.promote(cx),
            _ => {}
        }

        match self.state {
            UcrxHandleState::List => {
                cx.enter(UcPathStep::Index(self.items));
                self.items += 1;
                self.in_item = true;
                match self.rx.nested(cx) {
                    Some(item_rx) => item_rx,
                    None => &mut self.opaque as &mut dyn Ucrx,
                }
            }
            _ => &mut self.opaque as &mut dyn Ucrx,
        }
    }

    /// Finishes the item started by [`UcrxHandle::item`]
    pub fn leave_item(&mut self, cx: &mut UcrxContext) {
        if self.in_item {
            cx.leave();
            self.in_item = false;
        }
    }

    /// Closes the context
    pub fn close(self, cx: &mut UcrxContext) -> UcrxOutcome {
        match self.state {
            UcrxHandleState::Undecided | UcrxHandleState::Single => UcrxOutcome::Accepted,
            UcrxHandleState::List => {
                self.rx.end(cx);
                UcrxOutcome::Accepted
            }
            UcrxHandleState::Rejected => UcrxOutcome::Rejected,
        }
    }

    fn outcome(&self) -> UcrxOutcome {
        match self.state {
            UcrxHandleState::Rejected => UcrxOutcome::Rejected,
            _ => UcrxOutcome::Accepted,
        }
    }

    /// Single value becomes item 0 of a list
    fn promote(&mut self, cx: &mut UcrxContext) {
        self.state = if self.rx.push_list(cx).is_accepted() {
            UcrxHandleState::List
        } else {
            UcrxHandleState::Rejected
        };
        self.items = 1;
    }
}
