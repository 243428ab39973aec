//! DATMant: manual annotation of road-surface orthoframes.
//!
//! Paints pavement defects and paved-area corrections as two mask layers over
//! an orthoframe, with per-layer undo, and writes them back next to the image.

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod input;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;
pub mod view;
