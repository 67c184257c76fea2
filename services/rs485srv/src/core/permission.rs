//! Operation permission checks

use super::connection::DeviceConnection;
use super::types::PermissionDecision;

/// Decide whether `operation` may run on `connection`.
///
/// `read*` operations need an authenticated link, `write*` additionally need
/// the write flag. Anything else is refused.
pub fn check_operation(connection: Option<&DeviceConnection>, operation: &str) -> PermissionDecision {
    let Some(connection) = connection else {
        return PermissionDecision::deny("device not registered");
    };
    if !connection.is_connected() {
        return PermissionDecision::deny("device not connected");
    }
    if !connection.is_authenticated() {
        return PermissionDecision::deny("device not authenticated");
    }

    if operation.starts_with("read") {
        PermissionDecision::Permit
    } else if operation.starts_with("write") {
        if connection.write_enabled() {
            PermissionDecision::Permit
        } else {
            PermissionDecision::deny("write disabled")
        }
    } else {
        PermissionDecision::deny("unsupported operation")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::serial::SerialConfig;

    fn connected() -> DeviceConnection {
        let conn = DeviceConnection::new(1, "PLC", SerialConfig::default());
        conn.connect(0);
        conn
    }

    #[test]
    fn test_write_follows_flag() {
        let conn = connected();
        assert_eq!(
            check_operation(Some(&conn), "write_single_register"),
            PermissionDecision::Permit
        );
        conn.set_write_enabled(false);
        assert_eq!(
            check_operation(Some(&conn), "write_single_register"),
            PermissionDecision::deny("write disabled")
        );
        assert!(check_operation(Some(&conn), "read_holding_registers").is_permitted());
        assert!(check_operation(Some(&conn), "read").is_permitted());
    }

    #[test]
    fn test_disconnected_denied_unconditionally() {
        let conn = connected();
        conn.disconnect();
        for op in ["read", "read_input_registers", "write", "write_multiple_registers"] {
            assert_eq!(
                check_operation(Some(&conn), op),
                PermissionDecision::deny("device not connected")
            );
        }
        assert!(!check_operation(None, "read").is_permitted());
    }

    #[test]
    fn test_unknown_operation() {
        let conn = connected();
        assert_eq!(
            check_operation(Some(&conn), "factory_reset"),
            PermissionDecision::deny("unsupported operation")
        );
    }
}
