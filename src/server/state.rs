use crate::server::hub::Hub;

#[derive(Clone)]
pub(crate) struct ServerState {
  pub hub: Hub,
}

impl ServerState {
  pub fn new(hub: Hub) -> Self {
    Self { hub }
  }
}
