//! Authentication hook for recovering a caller's identity.
//!
//! Roomcast doesn't check credentials itself. An upstream gateway does
//! that, decides which room the caller may enter, and forwards the
//! upgrade request. The [`Authenticator`] trait turns that request into
//! an [`Identity`], and the hub trusts the result completely.

use std::future::Future;

use roomcast_protocol::Identity;
use roomcast_transport::ConnectRequest;

use crate::SessionError;

/// Maps an upgrade request to the caller's identity.
///
/// # Example
///
/// ```rust
/// use roomcast_protocol::Identity;
/// use roomcast_session::{Authenticator, SessionError};
/// use roomcast_transport::ConnectRequest;
///
/// /// Puts everybody in one room, named after the `name` query parameter.
/// struct LobbyAuthenticator;
///
/// impl Authenticator for LobbyAuthenticator {
///     async fn authenticate(
///         &self,
///         request: &ConnectRequest,
///     ) -> Result<Identity, SessionError> {
///         let name = request
///             .query_param("name")
///             .ok_or_else(|| SessionError::AuthFailed("name required".into()))?;
///         Ok(Identity::new("lobby", name, name))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns the identity for `request`, or
    /// [`SessionError::AuthFailed`] if it carries none.
    fn authenticate(
        &self,
        request: &ConnectRequest,
    ) -> impl Future<Output = Result<Identity, SessionError>> + Send;
}

/// Trusts identity fields placed on the request by an upstream gateway.
///
/// - room id: the path segment after `ws` (`/ws/{roomId}`, also under a
///   prefix such as `/api/ws/{roomId}`), else the `roomId` query parameter
/// - user id: the `x-user-id` header, else the `userId` query parameter
/// - display name: the `x-user-name` header, else the `userName` query
///   parameter, else the user id
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayAuthenticator;

impl GatewayAuthenticator {
    /// The synchronous core of [`Authenticator::authenticate`].
    pub fn identify(
        &self,
        request: &ConnectRequest,
    ) -> Result<Identity, SessionError> {
        let room_id = room_from_path(request)
            .or_else(|| request.query_param("roomId"))
            .filter(|room| !room.is_empty())
            .ok_or_else(|| SessionError::AuthFailed("missing room id".into()))?;

        let user_id = request
            .header("x-user-id")
            .or_else(|| request.query_param("userId"))
            .filter(|user| !user.is_empty())
            .ok_or_else(|| SessionError::AuthFailed("missing user id".into()))?;

        let display_name = request
            .header("x-user-name")
            .or_else(|| request.query_param("userName"))
            .filter(|name| !name.is_empty())
            .unwrap_or(user_id);

        Ok(Identity::new(room_id, user_id, display_name))
    }
}

impl Authenticator for GatewayAuthenticator {
    async fn authenticate(
        &self,
        request: &ConnectRequest,
    ) -> Result<Identity, SessionError> {
        self.identify(request)
    }
}

/// `r1` in `/ws/r1` or `/api/ws/r1`.
fn room_from_path(request: &ConnectRequest) -> Option<&str> {
    let segments: Vec<&str> = request.path_segments().collect();
    match segments.as_slice() {
        [.., "ws", room] => Some(*room),
        _ => None,
    }
}
