//! TUI module for terminal user interfaces

mod scan_view;

pub use scan_view::ScanApp;
