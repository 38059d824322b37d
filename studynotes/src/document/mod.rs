//! Document module
//!
//! Live, in-memory editing state:
//! - `text`: text buffer with change notification and dirty tracking
//! - `ink`: vector ink strokes and the stroke canvas
//! - `formatting`: text presentation attributes

pub mod formatting;
pub mod ink;
pub mod text;

pub use formatting::{TextAlignment, TextFormatting};
pub use ink::{decode_strokes, encode_strokes, DrawingStroke, Point, StrokeBuilder, StrokeCanvas, StrokeKind};
pub use text::{DocumentProperty, SubscriptionId, TextDocument, TextSnapshot};
