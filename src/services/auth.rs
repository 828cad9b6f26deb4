use tracing::info;

use crate::api::types::{AuthResponse, Credentials, GoogleCredential, Registration, User};
use crate::api::{ApiResult, RequestDescriptor, Session};
use crate::cache::Tag;
use crate::query::{MutationEndpoint, QueryApi, QueryEndpoint};

pub struct Login;

impl MutationEndpoint for Login {
  const NAME: &'static str = "login";
  type Arg = Credentials;
  type Output = AuthResponse;

  fn request(credentials: &Self::Arg) -> ApiResult<RequestDescriptor> {
    RequestDescriptor::post("auth/login").json(credentials)
  }

  // Invalidation happens once the new token is stored
  fn invalidates_tags(_credentials: &Self::Arg) -> Vec<Tag> {
    Vec::new()
  }
}

pub struct GoogleLogin;

impl MutationEndpoint for GoogleLogin {
  const NAME: &'static str = "googleLogin";
  type Arg = GoogleCredential;
  type Output = AuthResponse;

  fn request(credential: &Self::Arg) -> ApiResult<RequestDescriptor> {
    RequestDescriptor::post("v1/auth/google").json(credential)
  }

  fn invalidates_tags(_credential: &Self::Arg) -> Vec<Tag> {
    Vec::new()
  }
}

pub struct Register;

impl MutationEndpoint for Register {
  const NAME: &'static str = "register";
  type Arg = Registration;
  type Output = AuthResponse;

  fn request(registration: &Self::Arg) -> ApiResult<RequestDescriptor> {
    RequestDescriptor::post("v1/auth/register").json(registration)
  }

  fn invalidates_tags(_registration: &Self::Arg) -> Vec<Tag> {
    Vec::new()
  }
}

pub struct CurrentUser;

impl QueryEndpoint for CurrentUser {
  const NAME: &'static str = "getCurrentUser";
  type Arg = ();
  type Output = User;

  fn request(_arg: &Self::Arg) -> ApiResult<RequestDescriptor> {
    Ok(RequestDescriptor::get("v1/users/me/"))
  }

  fn provides_tags(_arg: &Self::Arg) -> Vec<Tag> {
    vec![Tag::Users, Tag::Session]
  }
}

/// Sign-in, registration and sign-out.
///
/// A successful sign-in stores the token on the shared [`Session`] and then
/// invalidates every tag, so all mounted queries refetch as the new user.
#[derive(Clone)]
pub struct AuthService {
  api: QueryApi,
  session: Session,
}

impl AuthService {
  pub fn new(api: QueryApi, session: Session) -> Self {
    Self { api, session }
  }

  pub fn session(&self) -> &Session {
    &self.session
  }

  pub async fn login(&self, email: &str, password: &str) -> ApiResult<AuthResponse> {
    let response = self
      .api
      .mutate::<Login>(Credentials {
        email: email.to_string(),
        password: password.to_string(),
      })
      .await?;
    self.start_session(&response);
    Ok(response)
  }

  pub async fn login_with_google(&self, token: &str) -> ApiResult<AuthResponse> {
    let response = self
      .api
      .mutate::<GoogleLogin>(GoogleCredential {
        token: token.to_string(),
      })
      .await?;
    self.start_session(&response);
    Ok(response)
  }

  pub async fn register(&self, registration: Registration) -> ApiResult<AuthResponse> {
    let response = self.api.mutate::<Register>(registration).await?;
    self.start_session(&response);
    Ok(response)
  }

  pub async fn current_user(&self) -> ApiResult<User> {
    self.api.fetch::<CurrentUser>(()).await
  }

  /// Forget the token and every cached result.
  pub fn logout(&self) {
    self.session.clear();
    self.api.reset();
    info!("signed out");
  }

  fn start_session(&self, response: &AuthResponse) {
    self.session.set_token(response.token.clone());
    self.api.invalidate_tags(Tag::ALL);
    info!(
      user = response.user.as_ref().map(|u| u.email.as_str()).unwrap_or("unknown"),
      "signed in"
    );
  }
}
