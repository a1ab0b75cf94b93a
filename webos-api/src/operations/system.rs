//! Power control

use crate::capability::Capability;
use crate::operation::SsapOperation;
use crate::types::Acknowledgement;

/// Turn the TV off
///
/// The TV usually drops the connection shortly after acknowledging.
pub struct TurnOffOperation;

impl SsapOperation for TurnOffOperation {
    type Request = ();
    type Response = Acknowledgement;

    const CAPABILITY: Capability = Capability::TurnOff;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_turn_off_has_no_payload() {
        assert_eq!(TurnOffOperation::build_payload(&()).unwrap(), None);
        assert!(TurnOffOperation::parse_response(&json!({})).is_ok());
        assert_eq!(TurnOffOperation::CAPABILITY.uri(), "ssap://system/turnOff");
    }
}
