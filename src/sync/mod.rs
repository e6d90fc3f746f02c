//! Client-side synchronization of editing sessions
//!
//! Local state is authoritative while editing: changes apply immediately and
//! reach the server through a debounced [`Autosaver`]. The server keeps no
//! merge logic; the last write for a course or presentation wins.

pub mod autosave;
pub mod selection;

pub use autosave::{
    Autosaver, Persist, SyncEvent, SyncState, DOCUMENT_DEBOUNCE, SELECTION_DEBOUNCE,
};
pub use selection::BlockSelection;
