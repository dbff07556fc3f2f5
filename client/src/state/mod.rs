//! Client-held state written by the event channel and read by the dashboard.
//!
//! SYSTEM CONTEXT
//! ==============
//! `inbox` holds conversations, `ui` holds user-facing flags, `session` gates
//! activation, and `store` is the shared container the others live in.

pub mod inbox;
pub mod session;
pub mod store;
pub mod ui;

use self::inbox::InboxState;
use self::store::Store;
use self::ui::UiState;

/// State handles the event channel writes into.
#[derive(Clone, Debug, Default)]
pub struct Stores {
    pub inbox: Store<InboxState>,
    pub ui: Store<UiState>,
}
