//! Channel and connection identifier types.
//!
//! Both identifiers are opaque strings: the engine never interprets them
//! beyond using them as keys.

/// Maximum channel name length.
pub const MAX_CHANNEL_NAME_LENGTH: usize = 256;

/// A channel identifier, unique per topic.
pub type ChannelId = String;

/// A connection identifier, stable for one client session.
pub type ConnId = String;

/// Validate a channel name.
///
/// Channel identifiers are opaque, so only structural limits are checked.
///
/// # Errors
///
/// Returns an error message if the channel name is invalid.
pub fn validate_channel_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Channel name cannot be empty");
    }
    if name.len() > MAX_CHANNEL_NAME_LENGTH {
        return Err("Channel name too long");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_validation() {
        assert!(validate_channel_name("chat:lobby").is_ok());
        assert!(validate_channel_name("$3_0").is_ok());
        assert!(validate_channel_name("").is_err());

        let long_name = "a".repeat(MAX_CHANNEL_NAME_LENGTH + 1);
        assert!(validate_channel_name(&long_name).is_err());
    }
}
