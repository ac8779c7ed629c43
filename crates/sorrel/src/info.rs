use crate::StateSet;
use std::{
    fmt::{self, Debug, Display, Formatter},
    net::SocketAddr,
};

/// Information about a running (or starting) server, passed to
/// [`Handler::init`][crate::Handler::init].
#[derive(Debug, Default)]
pub struct Info {
    description: String,
    local_addr: Option<SocketAddr>,
    state: StateSet,
}

impl Info {
    /// a human-readable description of the server
    pub fn description(&self) -> &str {
        &self.description
    }

    /// the bound listener address, when the server has one
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// shared startup state for handlers to read or extend
    pub fn state(&self) -> &StateSet {
        &self.state
    }

    /// mutable shared startup state
    pub fn state_mut(&mut self) -> &mut StateSet {
        &mut self.state
    }

    pub(crate) fn new(description: String, local_addr: Option<SocketAddr>) -> Self {
        Self {
            description,
            local_addr,
            state: StateSet::new(),
        }
    }
}

impl Display for Info {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.local_addr {
            Some(addr) => write!(f, "{} listening on {addr}", self.description),
            None => f.write_str(&self.description),
        }
    }
}

impl From<&str> for Info {
    fn from(description: &str) -> Self {
        Self::new(description.into(), None)
    }
}
