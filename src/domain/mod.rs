pub mod controller;
pub mod debounce;
pub mod gestures;
pub mod models;
pub mod motion_window;
pub mod orientation;
pub mod settings;
