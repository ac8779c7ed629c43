use chrono::{DateTime, NaiveDate, Utc};
use sorrel::Conn;
use sorrel_http::forms::QueryParams;
use sorrel_router::{RouteValues, RouterConnExt};
use thiserror::Error;
use uuid::Uuid;

/// A failure to bind a named parameter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParamError {
    /// The parameter was absent from both route values and the query
    /// string. The route is treated as not matched and dispatch falls
    /// through.
    #[error("missing parameter {0}")]
    Missing(String),

    /// The parameter was present but could not be coerced to the
    /// requested type. Answered as a 500.
    #[error("could not parse parameter {0}")]
    Invalid(String),
}

/// Primitive coercion for named parameters.
///
/// Implemented for strings, integers, floats, booleans, [`Uuid`],
/// [`DateTime<Utc>`], and [`NaiveDate`]; `Option<T>` of each comes
/// via [`Params::optional`].
pub trait FromParam: Sized {
    /// parse from the raw decoded parameter
    fn from_param(raw: &str) -> Option<Self>;
}

impl FromParam for String {
    fn from_param(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl FromParam for bool {
    fn from_param(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("true") || raw == "1" {
            Some(true)
        } else if raw.eq_ignore_ascii_case("false") || raw == "0" {
            Some(false)
        } else {
            None
        }
    }
}

macro_rules! from_param_via_from_str {
    ($($ty:ty),+) => {
        $(
            impl FromParam for $ty {
                fn from_param(raw: &str) -> Option<Self> {
                    raw.parse().ok()
                }
            }
        )+
    };
}

from_param_via_from_str!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, Uuid
);

impl FromParam for DateTime<Utc> {
    fn from_param(raw: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }
}

impl FromParam for NaiveDate {
    fn from_param(raw: &str) -> Option<Self> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
    }
}

/// The named-parameter lookup handed to [`api`][crate::api] handlers.
///
/// Route values take precedence over query-string parameters when
/// names collide. Route value names compare exactly; query parameter
/// names compare case-insensitively, matching their stores.
#[derive(Debug, Clone, Default)]
pub struct Params {
    route: RouteValues,
    query: QueryParams,
}

impl Params {
    /// capture the parameter sources from a conn
    pub fn from_conn(conn: &Conn) -> Self {
        Self {
            route: conn.route_params().cloned().unwrap_or_default(),
            query: QueryParams::parse(conn.querystring()),
        }
    }

    /// the raw value for this name, route values first
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.route.get(name).or_else(|| self.query.get(name))
    }

    /// Bind a required parameter. Absence is a
    /// [`ParamError::Missing`]; a value that will not coerce is a
    /// [`ParamError::Invalid`].
    pub fn required<T: FromParam>(&self, name: &str) -> Result<T, ParamError> {
        let raw = self
            .raw(name)
            .ok_or_else(|| ParamError::Missing(name.to_string()))?;
        T::from_param(raw).ok_or_else(|| ParamError::Invalid(name.to_string()))
    }

    /// Bind an optional parameter: `Ok(None)` when absent, but still
    /// [`ParamError::Invalid`] when present and uncoercible.
    pub fn optional<T: FromParam>(&self, name: &str) -> Result<Option<T>, ParamError> {
        match self.raw(name) {
            None => Ok(None),
            Some(raw) => T::from_param(raw)
                .map(Some)
                .ok_or_else(|| ParamError::Invalid(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn coercions() {
        assert_eq!(i64::from_param("-7"), Some(-7));
        assert_eq!(u8::from_param("256"), None);
        assert_eq!(f64::from_param("2.5"), Some(2.5));
        assert_eq!(bool::from_param("TRUE"), Some(true));
        assert_eq!(bool::from_param("0"), Some(false));
        assert_eq!(bool::from_param("yes"), None);
        assert!(Uuid::from_param("not-a-uuid").is_none());
        assert!(Uuid::from_param("67e55044-10b1-426f-9247-bb680e5fe0c8").is_some());
        assert!(DateTime::<Utc>::from_param("2026-01-02T03:04:05Z").is_some());
        assert_eq!(
            NaiveDate::from_param("2026-01-02"),
            NaiveDate::from_ymd_opt(2026, 1, 2)
        );
    }
}
