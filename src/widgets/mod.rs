pub mod panel;
pub mod widget;

pub use panel::{Border, Panel};
pub use widget::{AsAny, Color, Rect, Widget, WidgetFlags};
