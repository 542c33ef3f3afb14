//! Update requests against an EdgeMart

use url::Url;

use crate::mart::EdgeMart;
use crate::mart_url::UrlError;

const ACTION: &str = "update";

/// Request to replace one record in a mart.
#[derive(Debug)]
pub struct Update<'a, T> {
    mart: &'a EdgeMart,
    record: T,
}

impl<'a, T> Update<'a, T> {
    pub fn new(mart: &'a EdgeMart, record: T) -> Self {
        Self { mart, record }
    }

    pub fn mart(&self) -> &EdgeMart {
        self.mart
    }

    pub fn record(&self) -> &T {
        &self.record
    }

    /// The mart's URL with `action=update` appended.
    pub fn to_uri(&self) -> Result<Url, UrlError> {
        Ok(Url::parse(&format!("{}&action={ACTION}", self.mart.url()))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mart::{Transport, TransportError};
    use oinq_exec::RawRow;
    use std::sync::Arc;

    struct Never;

    impl Transport for Never {
        fn send(&self, endpoint: &Url, _: &str, _: &str) -> Result<Vec<RawRow>, TransportError> {
            Err(TransportError::Unreachable(endpoint.to_string()))
        }
    }

    #[test]
    fn test_update_uri() {
        let mart =
            EdgeMart::connect("edgespring://Update-Unit?edgemart=people", Arc::new(Never)).unwrap();
        let update = Update::new(&mart, ("Ann", 31));

        assert_eq!(
            update.to_uri().unwrap().as_str(),
            "edgespring://update-unit:8000?edgemart=people&action=update"
        );
        assert_eq!(update.record().0, "Ann");
    }
}
