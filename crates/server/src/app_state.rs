use realtime::LocalHub;
use server_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    /// Present when websocket subscribers are served in-process.
    pub(crate) hub: Option<LocalHub>,
}
