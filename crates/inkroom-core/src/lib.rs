//! Inkroom Core Library
//!
//! Geometry, element store, interaction engine and sync client for the
//! Inkroom shared canvas. Rendering is left to the embedding application.

pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod geometry;
pub mod history;
pub mod input;
pub mod interaction;
pub mod selection;
pub mod shapes;
pub mod sync;
pub mod tools;

pub use camera::Camera;
pub use canvas::{ElementPatch, ElementStore, MutationIntent, ZOrder};
pub use collaboration::{ConnectionState, SyncClient, SyncEvent};
pub use history::History;
pub use input::{Key, KeyEvent, Modifiers, PointerEvent};
pub use interaction::{Interaction, InteractionState};
pub use selection::{HandleKind, SelectMode, Selection};
pub use shapes::{Element, ElementId, ElementKind, ElementStyle, Shape};
pub use sync::{ClientMessage, ElementRecord, ServerMessage, Transport, TransportError, TransportEvent, WireError, WirePath};
#[cfg(not(target_arch = "wasm32"))]
pub use sync::NativeWebSocket;
pub use tools::{ToolKind, ToolManager};
