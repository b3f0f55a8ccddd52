//! Deal versions and their line items.
//!
//! Pure pieces (naming, the lifecycle guard, the synced-version resolver, the
//! line-item diff) sit next to the sessions that drive them against a
//! `Database`:
//!
//! - `CreateSession`: name, seed, and create a new version
//! - `EditSession`: edit a draft's line items and save the diff in one batch
//! - `VersionBrowser`: list versions, select one, approve or delete

pub mod browser;
pub mod catalog;
pub mod create;
pub mod diff;
pub mod edit;
pub mod lifecycle;
pub mod line_item;
pub mod naming;
pub mod notify;
pub mod sync;
pub mod workflow;

pub use browser::{FetchOutcome, LineItemFetch, VersionBrowser};
pub use catalog::ProductCatalog;
pub use create::CreateSession;
pub use diff::{LineItemDiff, diff};
pub use edit::EditSession;
pub use lifecycle::{VersionAction, available_actions, ensure_permitted, is_permitted};
pub use line_item::{LineItem, LineItemEdit, WorkingSet, normalize_amount};
pub use naming::generate_name;
pub use notify::{RefreshBus, RefreshSignal, RefreshSubscription, RefreshTopic};
pub use sync::find_synced;
pub use workflow::{AutoConfirm, OperatorPrompt, SaveGate, SaveTicket, classify_stage};
