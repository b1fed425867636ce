//! SNMP v2c reading source for the Deva DB44 FM monitor

use std::{net::ToSocketAddrs, time::Duration};

use chrono::Utc;
use snmp::{SyncSession, Value};
use tracing::info;

use crate::{capture::ReadingSource, error::AcquisitionError, reading::Reading};

/// .1.3.6.1.4.1.35833.5.3.1.0
pub const TUNER_FREQ_OID: &[u32] = &[1, 3, 6, 1, 4, 1, 35833, 5, 3, 1, 0];
/// .1.3.6.1.4.1.35833.5.3.2.0
pub const RF_LEVEL_OID: &[u32] = &[1, 3, 6, 1, 4, 1, 35833, 5, 3, 2, 0];

pub struct SnmpSource {
    session: SyncSession,
    target: String,
}

impl SnmpSource {
    /// Open a session against the monitor. `timeout` bounds every request.
    pub fn connect(
        ip: &str,
        port: u16,
        community: &str,
        timeout: Duration,
    ) -> std::io::Result<Self> {
        let target = format!("{ip}:{port}");
        // Resolve up front so a bad address fails at startup, not on every tick
        let addr = target.to_socket_addrs()?.next().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "address did not resolve")
        })?;
        let session = SyncSession::new(addr, community.as_bytes(), Some(timeout), 0)?;
        info!(%target, "Opened SNMP session");
        Ok(Self { session, target })
    }

    fn get(&mut self, oid: &[u32]) -> Result<f64, AcquisitionError> {
        let mut pdu = self
            .session
            .get(oid)
            .map_err(|e| AcquisitionError::Request(format!("{e:?}")))?;
        if pdu.error_status != 0 {
            return Err(AcquisitionError::Malformed(format!(
                "agent returned error status {}",
                pdu.error_status
            )));
        }
        match pdu.varbinds.next() {
            Some((_, value)) => value_to_f64(&value),
            None => Err(AcquisitionError::Malformed("empty response".to_owned())),
        }
    }
}

impl ReadingSource for SnmpSource {
    fn poll(&mut self) -> Result<Reading, AcquisitionError> {
        let frequency = self.get(TUNER_FREQ_OID)?;
        let level = self.get(RF_LEVEL_OID)?;
        Ok(Reading::new(Utc::now(), frequency, level))
    }

    fn close(self) {
        info!(target = %self.target, "Closing SNMP session");
    }
}

fn value_to_f64(value: &Value) -> Result<f64, AcquisitionError> {
    match *value {
        Value::Integer(v) => Ok(v as f64),
        Value::Counter32(v) | Value::Unsigned32(v) | Value::Timeticks(v) => Ok(v as f64),
        Value::Counter64(v) => Ok(v as f64),
        ref other => Err(AcquisitionError::Malformed(format!(
            "expected a number, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values() {
        assert_eq!(value_to_f64(&Value::Integer(-12)).unwrap(), -12.0);
        assert_eq!(value_to_f64(&Value::Unsigned32(88000)).unwrap(), 88000.0);
        assert_eq!(value_to_f64(&Value::Counter64(1 << 40)).unwrap(), (1u64 << 40) as f64);
    }

    #[test]
    fn test_non_numeric_value() {
        assert!(matches!(
            value_to_f64(&Value::OctetString(b"88.0")),
            Err(AcquisitionError::Malformed(_))
        ));
        assert!(value_to_f64(&Value::Null).is_err());
    }
}
