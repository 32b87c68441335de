// UI module - presentation contract between state holders and renderers
//
// This module contains:
// - RenderBridge: Runs renderers against manager or aggregator state streams
// - Presentation settings: Per-state text settings and the Close action

pub mod bridge;
pub mod presentation;

pub use bridge::{RenderBridge, Renderer, RendererHandle, TracingRenderer};
pub use presentation::{
    close_action, DefaultPresentation, FailurePresentation, LoadingPresentation,
    PresentationProvider, PresentationSettings, SuccessPresentation,
};
