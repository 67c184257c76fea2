//! Per-function business handlers

use super::types::BusinessOutcome;
use crate::protocols::rs485::BusinessData;

fn no_values(function_code: u8) -> BusinessOutcome {
    BusinessOutcome::NoData {
        function_code,
        reason: "values could not be decoded".to_string(),
    }
}

/// Summarise decoded business data into the result returned to callers
pub fn handle_business_data(function_code: u8, data: &BusinessData) -> BusinessOutcome {
    match data {
        BusinessData::CoilRead { values: Some(values) } => BusinessOutcome::CoilStatus {
            total: values.len(),
            active: values.iter().filter(|&&on| on).count(),
        },
        BusinessData::RegisterRead { values: Some(values) } if !values.is_empty() => {
            let sum: u64 = values.iter().map(|&v| u64::from(v)).sum();
            BusinessOutcome::RegisterSummary {
                count: values.len(),
                sum,
                average: sum as f64 / values.len() as f64,
                min: values.iter().copied().min().unwrap_or_default(),
                max: values.iter().copied().max().unwrap_or_default(),
            }
        },
        BusinessData::SingleCoilWrite { address, value } => BusinessOutcome::CoilWriteAck {
            address: *address,
            value: *value,
        },
        BusinessData::SingleRegisterWrite { address, value } => BusinessOutcome::RegisterWriteAck {
            address: *address,
            value: *value,
        },
        BusinessData::MultipleCoilsWrite {
            address,
            quantity,
            values,
        } => BusinessOutcome::MultipleWriteAck {
            address: *address,
            quantity: *quantity,
            written: values.as_ref().map_or(0, |v| v.len().min(usize::from(*quantity))),
        },
        BusinessData::MultipleRegistersWrite {
            address,
            quantity,
            values: Some(values),
        } => BusinessOutcome::MultipleWriteAck {
            address: *address,
            quantity: *quantity,
            written: values.len(),
        },
        BusinessData::Raw { data } => BusinessOutcome::Passthrough {
            function_code,
            length: data.len(),
        },
        BusinessData::Unavailable { reason } => BusinessOutcome::NoData {
            function_code,
            reason: reason.clone(),
        },
        BusinessData::CoilRead { values: None }
        | BusinessData::RegisterRead { .. }
        | BusinessData::MultipleRegistersWrite { values: None, .. } => no_values(function_code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::rs485::decode_business_data;

    #[test]
    fn test_register_summary() {
        let data = decode_business_data(0x03, &[0x00, 0x0A, 0x00, 0x14, 0x00, 0x03]);
        assert_eq!(
            handle_business_data(0x03, &data),
            BusinessOutcome::RegisterSummary {
                count: 3,
                sum: 33,
                average: 11.0,
                min: 3,
                max: 20,
            }
        );
    }

    #[test]
    fn test_coil_status() {
        let data = decode_business_data(0x01, &[0x05]);
        assert_eq!(
            handle_business_data(0x01, &data),
            BusinessOutcome::CoilStatus { total: 8, active: 2 }
        );
    }

    #[test]
    fn test_write_echo() {
        let data = decode_business_data(0x06, &[0x00, 0x10, 0x01, 0x2C]);
        assert_eq!(
            handle_business_data(0x06, &data),
            BusinessOutcome::RegisterWriteAck {
                address: 0x10,
                value: 300
            }
        );

        // Ten coils declared, sixteen bits on the wire
        let data = decode_business_data(0x0F, &[0x00, 0x20, 0x00, 0x0A, 0xCD, 0x01]);
        assert_eq!(
            handle_business_data(0x0F, &data),
            BusinessOutcome::MultipleWriteAck {
                address: 0x20,
                quantity: 10,
                written: 10
            }
        );
    }

    #[test]
    fn test_missing_values_is_no_data() {
        let data = decode_business_data(0x03, &[0x00]);
        assert!(matches!(
            handle_business_data(0x03, &data),
            BusinessOutcome::NoData { function_code: 0x03, .. }
        ));
        let data = decode_business_data(0x2B, &[0x0E]);
        assert_eq!(
            handle_business_data(0x2B, &data),
            BusinessOutcome::Passthrough {
                function_code: 0x2B,
                length: 1
            }
        );
    }
}
