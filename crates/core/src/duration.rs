//! Serde codecs for `std::time::Duration` fields expressed in whole seconds.
//!
//! Encoding a duration with a sub-second part is an error rather than a
//! silent truncation.

use std::time::Duration;

use serde::{ser, Deserialize, Deserializer, Serialize, Serializer};

fn whole_secs<E: ser::Error>(duration: Duration) -> Result<u64, E> {
    if duration.subsec_nanos() == 0 {
        Ok(duration.as_secs())
    } else {
        Err(E::custom(format!(
            "duration {duration:?} is not a whole number of seconds"
        )))
    }
}

/// Required duration encoded as seconds.
pub mod secs {
    use super::{whole_secs, Deserialize, Deserializer, Duration, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        whole_secs::<S::Error>(*duration)?.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Optional duration encoded as seconds.
pub mod option_secs {
    use super::{whole_secs, Deserialize, Deserializer, Duration, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        duration: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        duration
            .map(whole_secs::<S::Error>)
            .transpose()?
            .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
