//! The two narrow interfaces to the outside: where trees get drawn and where
//! the credential comes from.

use component_tree::ComponentNode;

use crate::client::WeakClientHandle;
use crate::error::SessionError;
use crate::state::RenderTarget;

/// Supplies the bearer credential. Consulted when a connection attempt
/// starts; `None` makes `connect()` a no-op.
pub trait TokenProvider: Send + 'static {
    fn token(&self) -> Option<String>;
}

/// A fixed credential, or none.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }
}

impl TokenProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

impl<F> TokenProvider for F
where
    F: Fn() -> Option<String> + Send + 'static,
{
    fn token(&self) -> Option<String> {
        self()
    }
}

/// Displays component forests. Rendering happens on the session loop, so
/// implementations should hand heavy work off rather than block.
pub trait RenderSink: Send + 'static {
    fn render(&mut self, target: RenderTarget, forest: &[ComponentNode], saver: &SaveHandle);

    /// The message list was replaced wholesale.
    fn reset(&mut self) {}
}

/// Sink that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl RenderSink for NullSink {
    fn render(&mut self, _target: RenderTarget, _forest: &[ComponentNode], _saver: &SaveHandle) {}
}

/// Save callback handed to the render sink alongside each forest.
#[derive(Clone)]
pub struct SaveHandle {
    client: WeakClientHandle,
}

impl SaveHandle {
    pub(crate) fn new(client: WeakClientHandle) -> Self {
        Self { client }
    }

    /// `Ok(true)` once the server confirms, `Ok(false)` when offline.
    pub async fn save(
        &self,
        component_data: ComponentNode,
        component_type: &str,
        title: Option<String>,
    ) -> Result<bool, SessionError> {
        let client = self.client.upgrade().ok_or(SessionError::ClientClosed)?;
        let saved = client
            .save_component(component_data, component_type, title)
            .await?;
        Ok(saved.is_some())
    }
}
