use server_api::{session::SessionConfig, ApiContext};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
    pub(crate) session: SessionConfig,
}
