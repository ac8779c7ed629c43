use crate::{Conn, Upgrade};

/// What to do with the connection after one request-response cycle.
#[derive(Debug)]
pub enum ConnectionStatus<Transport> {
    /// the connection is at an end, either by policy or because the
    /// client went away
    Close,

    /// another request was (or will be) parsed from the same
    /// transport
    Conn(Conn<Transport>),

    /// a successful protocol upgrade has taken ownership of the
    /// transport; http parsing on it is over
    Upgrade(Upgrade<Transport>),
}
