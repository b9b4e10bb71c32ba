pub mod api;
pub mod config;
pub mod data_models;
pub mod error;
pub mod highlight;
pub mod pipeline;
pub mod render;
pub mod security;
pub mod shortcode;
pub mod widget;
