use rand::Rng;

/// Generate a pickup code: four random decimal digits, leading zeros allowed.
///
/// Codes are not checked for collisions against other open orders. The code only authorises
/// collection together with the order id, which staff already have on screen, so the blast
/// radius of a collision is one guessable order per stall.
pub fn new_pickup_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:04}", rng.gen_range(0..10_000))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn codes_are_four_decimal_digits() {
        for _ in 0..1000 {
            let code = new_pickup_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
