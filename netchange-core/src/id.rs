/// Derives a `DeviceChange` id from its parent `NetworkChange` id and the
/// target device's identity, per spec.md §3: `{NC.ID}:{deviceID}:{deviceVersion}`.
///
/// This is a pure function so the NCC (which creates `DeviceChange` rows) and
/// any future caller (tests, northbound observers) always agree on the id
/// without needing to read anything back from the store.
pub fn device_change_id(network_change_id: &str, device_id: &str, device_version: &str) -> String {
    format!("{network_change_id}:{device_id}:{device_version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_colon_separated_id() {
        assert_eq!(device_change_id("change-1", "device-2", "1.0"), "change-1:device-2:1.0");
    }

    #[test]
    fn distinct_devices_yield_distinct_ids() {
        let a = device_change_id("change-1", "device-1", "1.0");
        let b = device_change_id("change-1", "device-2", "1.0");
        assert_ne!(a, b);
    }
}
