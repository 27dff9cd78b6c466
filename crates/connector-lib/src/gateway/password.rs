//! Throwaway passwords for newly created remote customers

use rand::Rng;

/// Number of characters in a generated password
pub const PASSWORD_LENGTH: usize = 16;

const FIRST_CODE: u8 = 45;
const LAST_CODE: u8 = 122;

/// `.` `/`, `:` through `@`, `[` through `` ` ``
const EXCLUDED: [(u8, u8); 3] = [(46, 47), (58, 64), (91, 96)];

fn is_excluded(code: u8) -> bool {
    EXCLUDED
        .iter()
        .any(|&(low, high)| (low..=high).contains(&code))
}

/// Draw a password from `-`, digits and ASCII letters
pub fn random_password<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut password = String::with_capacity(PASSWORD_LENGTH);
    while password.len() < PASSWORD_LENGTH {
        let code = rng.gen_range(FIRST_CODE..=LAST_CODE);
        if !is_excluded(code) {
            password.push(char::from(code));
        }
    }
    password
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn allowed(c: char) -> bool {
        c == '-' || c.is_ascii_digit() || c.is_ascii_alphabetic()
    }

    #[test]
    fn test_password_length_and_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let password = random_password(&mut rng);
            assert_eq!(password.len(), PASSWORD_LENGTH);
            assert!(password.chars().all(allowed), "bad password {password}");
        }
    }

    #[test]
    fn test_excluded_ranges() {
        for code in FIRST_CODE..=LAST_CODE {
            assert_eq!(is_excluded(code), !allowed(char::from(code)), "code {code}");
        }
    }

    #[test]
    fn test_passwords_differ() {
        let mut rng = rand::thread_rng();
        assert_ne!(random_password(&mut rng), random_password(&mut rng));
    }
}
