//! In-memory application state, mutated only through dispatched actions.

pub mod chat;
pub mod credit;

pub use chat::{ChatAction, ChatState};
pub use credit::{CreditAction, CreditState};

use serde::Serialize;
use tokio::sync::watch;

#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct RootState {
    pub credit: CreditState,
    pub chat: ChatState,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Credit(CreditAction),
    Chat(ChatAction),
}

impl From<CreditAction> for Action {
    fn from(action: CreditAction) -> Self {
        Action::Credit(action)
    }
}

impl From<ChatAction> for Action {
    fn from(action: ChatAction) -> Self {
        Action::Chat(action)
    }
}

impl RootState {
    /// Applies `action` in place. Each slice only sees its own actions.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Credit(action) => self.credit.apply(action),
            Action::Chat(action) => self.chat.apply(action),
        }
    }

    /// Pure form of [`RootState::apply`].
    pub fn reduce(mut self, action: impl Into<Action>) -> Self {
        self.apply(action.into());
        self
    }
}

/// Holder of the current [`RootState`]; subscribers are woken after every dispatch.
#[derive(Debug)]
pub struct Store {
    state: watch::Sender<RootState>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(RootState::default())
    }
}

impl Store {
    pub fn new(initial: RootState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    pub fn dispatch(&self, action: impl Into<Action>) {
        let action = action.into();
        log::debug!("Dispatching {:?}", action);
        self.state.send_modify(|state| state.apply(action));
    }

    pub fn snapshot(&self) -> RootState {
        self.state.borrow().clone()
    }

    pub fn credit(&self) -> u64 {
        self.state.borrow().credit.user_credit
    }

    pub fn chat(&self) -> ChatState {
        self.state.borrow().chat.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RootState> {
        self.state.subscribe()
    }
}
