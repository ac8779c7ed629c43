use crate::RouteValues;
use sorrel::Conn;

/// Extension trait to retrieve captured route values from a conn
/// inside a handler dispatched by a [`Router`][crate::Router].
pub trait RouterConnExt {
    /// the captured route value for this name, if the matched
    /// template had such a capture
    fn route_param(&self, name: &str) -> Option<&str>;

    /// all captured route values, when a pattern route matched
    fn route_params(&self) -> Option<&RouteValues>;
}

impl RouterConnExt for Conn {
    fn route_param(&self, name: &str) -> Option<&str> {
        self.route_params().and_then(|values| values.get(name))
    }

    fn route_params(&self) -> Option<&RouteValues> {
        self.state().get()
    }
}
