//! Composite controls built on the action driver: tab bars, scrollbars,
//! switches and option panels.

pub mod navbar;
pub mod scroll;
pub mod setting;
pub mod switch;


pub use navbar::{NavIndex, Navbar, NavbarInfo, TabStyle};
pub use scroll::{Scroll, ScrollConfig};
pub use setting::{OptionRequest, Setting};
pub use switch::{Switch, SwitchStatus, UNKNOWN};
