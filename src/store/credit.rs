use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreditState {
    pub user_credit: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreditAction {
    Set(u64),
    Add(u64),
    /// Floors at zero.
    Subtract(u64),
    Reset,
}

impl CreditState {
    pub fn apply(&mut self, action: CreditAction) {
        self.user_credit = match action {
            CreditAction::Set(amount) => amount,
            CreditAction::Add(amount) => self.user_credit.saturating_add(amount),
            CreditAction::Subtract(amount) => self.user_credit.saturating_sub(amount),
            CreditAction::Reset => 0,
        };
    }
}
