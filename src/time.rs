use log::error;
use serde::{Serialize, Serializer};
use ::time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Unix seconds in the database, RFC 3339 on the wire.
#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq)]
#[derive(sqlx::Type)]
#[sqlx(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    pub fn now() -> Result<Self, ()> {
        use std::time::SystemTime;

        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|duration| duration.as_secs() as i64)
            .map(Self)
            .map_err(|e| {
                error!("couldn't get time: {e:?}");
            })
    }

    #[cfg(test)]
    pub fn from_i64(secs: i64) -> Self {
        Self(secs)
    }

    fn rfc3339(&self) -> Option<String> {
        OffsetDateTime::from_unix_timestamp(self.0)
            .ok()
            .and_then(|when| when.format(&Rfc3339).ok())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.rfc3339() {
            Some(s) => serializer.serialize_str(&s),
            None => serializer.serialize_i64(self.0),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn serializes_as_rfc3339() {
        let json = serde_json::to_string(&Timestamp::from_i64(86_400)).unwrap();
        assert_eq!(json, r#""1970-01-02T00:00:00Z""#);
    }
}
