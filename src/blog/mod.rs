//! Blog records: authors and their entries
//!
//! - `model`: record and input types, field limits
//! - `store`: create / read / update / delete over a `Database`
//! - `cursor`: lazy listing by publication time

pub mod cursor;
pub mod model;
pub mod store;

pub use cursor::{CursorPosition, EntryCursor};
pub use model::{Author, BlogStats, Entry, EntryUpdate, EntryWithAuthor, NewAuthor, NewEntry, Order};
pub use store::BlogStore;
