//! State authority: single writer, many readers
//!
//! Only the session server can obtain an [`AuthorityToken`], and every write
//! to an [`AuthoritativeState`] has to present one. Observers hold a mirror
//! fed by snapshots instead (see [`super::mirror`]).

use super::timer::Tick;

/// Which side of the session this process is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Owns the canonical state and advances it every tick
    Server,
    /// Observes replicated state only
    Client,
}

impl SessionRole {
    pub fn from_is_server(is_server: bool) -> Self {
        if is_server {
            Self::Server
        } else {
            Self::Client
        }
    }

    /// Hand out the write token. Clients never get one.
    pub fn claim_authority(self) -> Option<AuthorityToken> {
        match self {
            SessionRole::Server => Some(AuthorityToken { _private: () }),
            SessionRole::Client => None,
        }
    }
}

/// Proof that the holder is the state authority for a session
#[derive(Debug)]
pub struct AuthorityToken {
    _private: (),
}

/// Value readable by anyone and writable only with an [`AuthorityToken`]
#[derive(Debug, Clone)]
pub struct AuthoritativeState<T> {
    value: T,
    version: u64,
}

impl<T> AuthoritativeState<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    pub fn read(&self) -> &T {
        &self.value
    }

    pub fn write(&mut self, _token: &AuthorityToken, value: T) {
        self.value = value;
        self.version += 1;
    }

    pub fn modify<R>(&mut self, _token: &AuthorityToken, f: impl FnOnce(&mut T) -> R) -> R {
        self.version += 1;
        f(&mut self.value)
    }

    /// Bumped on every write
    pub fn version(&self) -> u64 {
        self.version
    }
}

/// Outbound serialization hook invoked by the networking layer
pub trait Replicate {
    type Snapshot;

    fn snapshot(&self, now: Tick) -> Self::Snapshot;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_gets_a_token() {
        assert!(SessionRole::from_is_server(true).claim_authority().is_some());
        assert!(SessionRole::from_is_server(false).claim_authority().is_none());
    }

    #[test]
    fn writes_bump_version() {
        let token = SessionRole::Server.claim_authority().unwrap();
        let mut state = AuthoritativeState::new(1u32);

        assert_eq!(state.version(), 0);
        state.write(&token, 5);
        let doubled = state.modify(&token, |v| {
            *v *= 2;
            *v
        });

        assert_eq!(doubled, 10);
        assert_eq!(*state.read(), 10);
        assert_eq!(state.version(), 2);
    }
}
