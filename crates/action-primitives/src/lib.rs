//! Page collaborator port for checkout automation
//!
//! This crate defines the boundary between the checkout engine and whatever
//! drives the browser:
//! - `BrowserPort` hands out pages, `PagePort` performs navigation, waits,
//!   clicks, fills, selects and read-only DOM inspection
//! - typed wait states, navigation tiers and page conditions
//! - `ScriptedPage`, an in-memory storefront used for rehearsals and tests

pub mod errors;
mod primitives;
pub mod scripted;
pub mod types;

pub use errors::*;
pub use primitives::*;
pub use scripted::{Effect, PageCall, ScriptedBrowser, ScriptedElement, ScriptedPage};
pub use types::*;
