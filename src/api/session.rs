use std::sync::{Arc, PoisonError, RwLock};

/// Bearer token of the signed-in user, shared between the HTTP wrapper and
/// the auth service.
#[derive(Debug, Clone, Default)]
pub struct Session {
  token: Arc<RwLock<Option<String>>>,
}

impl Session {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn token(&self) -> Option<String> {
    self
      .token
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn set_token(&self, token: impl Into<String>) {
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
  }

  pub fn clear(&self) {
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
  }

  pub fn is_signed_in(&self) -> bool {
    self.token().is_some()
  }
}
