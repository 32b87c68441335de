// RenderBridge - Connects state streams to renderers on the tokio runtime
//
// A renderer is anything that can draw a LoadableState: a terminal line, a HUD window, a test
// double. The bridge owns the subscription loop:
// 1. Render the state current at attach time
// 2. Re-render on every change notification
// 3. Stop when the source is dropped or the handle is detached

use super::presentation::{DefaultPresentation, PresentationProvider};
use crate::metrics::Metrics;
use crate::models::{DebugOptions, LoadableState};
use crate::state::{GlobalStateAggregator, LoadingManager, StateChange};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

/// A surface that draws a [`LoadableState`]
#[cfg_attr(test, mockall::automock)]
pub trait Renderer: Send {
    fn render(&mut self, state: &LoadableState);
}

/// Runs renderers against state streams on a tokio runtime
///
/// # Example
/// ```ignore
/// let bridge = RenderBridge::new(runtime.handle().clone(), metrics);
/// let hud = bridge.attach_manager(&manager, TracingRenderer::new("upload", debug));
///
/// // later
/// hud.detach();
/// ```
#[derive(Clone)]
pub struct RenderBridge {
    tokio_handle: tokio::runtime::Handle,
    metrics: Arc<Metrics>,
}

impl RenderBridge {
    pub fn new(tokio_handle: tokio::runtime::Handle, metrics: Arc<Metrics>) -> Self {
        Self {
            tokio_handle,
            metrics,
        }
    }

    /// Draw `manager`'s state with `renderer` until the manager is dropped
    pub fn attach_manager<R>(&self, manager: &LoadingManager, renderer: R) -> RendererHandle
    where
        R: Renderer + 'static,
    {
        // Subscribe before the snapshot so no transition falls between them
        let receiver = manager.subscribe();
        self.attach(receiver, renderer, manager.state())
    }

    /// Draw the aggregator's merged state with `renderer` until the aggregator is dropped
    pub fn attach_aggregator<R>(
        &self,
        aggregator: &GlobalStateAggregator,
        renderer: R,
    ) -> RendererHandle
    where
        R: Renderer + 'static,
    {
        let receiver = aggregator.subscribe_changes();
        self.attach(receiver, renderer, aggregator.state())
    }

    /// Render `initial`, then every state delivered on `receiver`
    ///
    /// A notification whose state equals the last one drawn is skipped.
    pub fn attach<R>(
        &self,
        receiver: broadcast::Receiver<StateChange>,
        renderer: R,
        initial: LoadableState,
    ) -> RendererHandle
    where
        R: Renderer + 'static,
    {
        let task = self.tokio_handle.spawn(render_loop(
            receiver,
            renderer,
            initial,
            Arc::clone(&self.metrics),
        ));
        RendererHandle { task }
    }
}

async fn render_loop<R: Renderer>(
    mut receiver: broadcast::Receiver<StateChange>,
    mut renderer: R,
    initial: LoadableState,
    metrics: Arc<Metrics>,
) {
    renderer.render(&initial);
    metrics.record_render();
    let mut drawn = initial;

    loop {
        match receiver.recv().await {
            Ok(change) => {
                if change.current == drawn {
                    continue;
                }
                renderer.render(&change.current);
                metrics.record_render();
                drawn = change.current;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(
                    "Renderer lagged - {} state changes were skipped",
                    skipped
                );
                metrics.record_renders_skipped(skipped);
            }
            Err(RecvError::Closed) => {
                tracing::debug!("State source dropped - renderer stopped");
                break;
            }
        }
    }
}

/// Handle to an attached renderer
///
/// Dropping the handle leaves the renderer running; call [`detach`](Self::detach) to stop it.
#[derive(Debug)]
pub struct RendererHandle {
    task: JoinHandle<()>,
}

impl RendererHandle {
    /// Stop rendering immediately
    pub fn detach(self) {
        self.task.abort();
    }

    pub fn is_attached(&self) -> bool {
        !self.task.is_finished()
    }

    /// Wait until the state source is dropped and the renderer stops
    pub async fn finished(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// Renderer that writes every state to the log
pub struct TracingRenderer {
    label: String,
    debug: DebugOptions,
    provider: Arc<dyn PresentationProvider>,
}

impl TracingRenderer {
    pub fn new(label: impl Into<String>, debug: DebugOptions) -> Self {
        Self::with_provider(label, debug, Arc::new(DefaultPresentation))
    }

    pub fn with_provider(
        label: impl Into<String>,
        debug: DebugOptions,
        provider: Arc<dyn PresentationProvider>,
    ) -> Self {
        Self {
            label: label.into(),
            debug,
            provider,
        }
    }
}

impl Renderer for TracingRenderer {
    fn render(&mut self, state: &LoadableState) {
        match self.provider.describe(state) {
            Some(text) => tracing::info!("[{}] {}", self.label, text),
            None => tracing::info!("[{}] (hidden)", self.label),
        }

        if self.debug.inspection_enabled {
            tracing::debug!(
                "[{}] inspect: kind={:?} state={} retry={}",
                self.label,
                state.kind(),
                state,
                state.retry_action().is_some()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LoadingManagerSettings;
    use mockall::Sequence;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn bridge() -> RenderBridge {
        RenderBridge::new(tokio::runtime::Handle::current(), Arc::new(Metrics::new()))
    }

    #[tokio::test]
    async fn test_renders_initial_then_changes_in_order() {
        let manager = LoadingManager::new(
            LoadableState::None,
            LoadingManagerSettings::new(Duration::from_secs(60)),
        );

        let mut renderer = MockRenderer::new();
        let mut seq = Sequence::new();
        renderer
            .expect_render()
            .withf(LoadableState::is_none)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        renderer
            .expect_render()
            .withf(LoadableState::is_loading)
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());
        renderer
            .expect_render()
            .withf(|state| state.message() == Some("saved"))
            .times(1)
            .in_sequence(&mut seq)
            .return_const(());

        let bridge = bridge();
        let handle = bridge.attach_manager(&manager, renderer);

        manager.show_loading();
        manager.show_success("saved");
        drop(manager);

        assert!(handle.finished().await.is_ok());
        assert_eq!(bridge.metrics.renders.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_detach_stops_rendering() {
        let manager = LoadingManager::default();
        let mut renderer = MockRenderer::new();
        renderer.expect_render().times(0..).return_const(());

        let handle = bridge().attach_manager(&manager, renderer);
        assert!(handle.is_attached());
        handle.detach();

        assert!(manager.show_loading().is_some());
    }

    #[tokio::test]
    async fn test_aggregator_renderer() {
        let manager = LoadingManager::default();
        let aggregator = GlobalStateAggregator::new();
        aggregator.subscribe([&manager]);

        let mut renderer = MockRenderer::new();
        renderer
            .expect_render()
            .withf(LoadableState::is_none)
            .times(1)
            .return_const(());
        renderer
            .expect_render()
            .withf(LoadableState::is_loading)
            .times(1)
            .return_const(());

        let handle = bridge().attach_aggregator(&aggregator, renderer);
        manager.show_loading();
        drop(aggregator);

        assert!(handle.finished().await.is_ok());
    }

    #[test]
    fn test_tracing_renderer_handles_every_state() {
        let mut renderer = TracingRenderer::new(
            "test",
            DebugOptions {
                inspection_enabled: true,
            },
        );

        renderer.render(&LoadableState::None);
        renderer.render(&LoadableState::Loading);
        renderer.render(&LoadableState::success(42));
        renderer.render(&LoadableState::failure(anyhow::anyhow!("boom"), None));
    }
}
