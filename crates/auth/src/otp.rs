//! One-time sign-in codes.

use rand::Rng;
use tracing::info;

use crate::AuthError;

pub const OTP_LENGTH: usize = 6;

/// Hands a freshly generated code to the user. Mail transport lives outside
/// this crate; the server wires in whatever sender it has.
pub trait CodeSender: Send + Sync {
    fn deliver(&self, email: &str, code: &str) -> Result<(), AuthError>;
}

/// Writes the code to the log. Used in development and by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCodeSender;

impl CodeSender for TracingCodeSender {
    fn deliver(&self, email: &str, code: &str) -> Result<(), AuthError> {
        info!(email = %email, code = %code, "one-time code issued");
        Ok(())
    }
}

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..OTP_LENGTH)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_six_ascii_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), OTP_LENGTH);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
