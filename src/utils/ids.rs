use rand::Rng;
use rand::distributions::Alphanumeric;

/// Opaque session identifier for a booking intent, e.g. `sess_x9K2...`.
pub fn new_session_id() -> String {
    format!("sess_{}", random_token(24))
}

/// Human-shareable booking reference, e.g. `BK-7F3KQ9ZP2M`. Uniqueness is
/// guarded by the unique index on `bookings.booking_reference`; callers
/// retry on conflict.
pub fn new_booking_reference() -> String {
    format!("BK-{}", random_token(10).to_uppercase())
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_shape() {
        let id = new_session_id();
        assert!(id.starts_with("sess_"));
        assert_eq!(id.len(), "sess_".len() + 24);
        assert!(id["sess_".len()..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn booking_reference_shape() {
        let reference = new_booking_reference();
        assert!(reference.starts_with("BK-"));
        assert_eq!(reference.len(), 13);
        assert!(
            reference[3..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn references_are_not_repeating() {
        let a = new_booking_reference();
        let b = new_booking_reference();
        assert_ne!(a, b);
    }
}
